//! End-to-end historization scenarios
//!
//! Each test drives the engine through one complete load: unchanged feed,
//! update, technical deletion, insertion, reappearance after deletion and
//! null/value exchange. Outputs are compared as multisets of rendered
//! rows; row order is not part of the contract.

use arrow_array::cast::AsArray;
use arrow_array::types::{Int64Type, TimestampMicrosecondType};
use arrow_array::{
    Array, Float64Array, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::{DateTime, Utc};
use histlake::prelude::*;
use std::sync::Arc;

const T_OLD: i64 = 1_000_000;
const T_NEW: i64 = 2_000_000;
const OFFSET: i64 = 1_000; // 1 ms in microseconds
const D: i64 = DOOMSDAY_MICROS;

fn ts_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

fn at(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap()
}

fn pk() -> Vec<String> {
    vec!["id".to_string(), "name".to_string()]
}

/// History over (id, name, age, status) with validity bounds
fn history(rows: &[(i64, &str, i64, &str, i64, i64)]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
        Field::new("status", DataType::Utf8, false),
        Field::new(CAPTURED_FIELD, ts_type(), false),
        Field::new(DELIMITED_FIELD, ts_type(), false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.3).collect::<Vec<_>>(),
            )),
            Arc::new(
                TimestampMicrosecondArray::from(rows.iter().map(|r| r.4).collect::<Vec<_>>())
                    .with_timezone("UTC"),
            ),
            Arc::new(
                TimestampMicrosecondArray::from(rows.iter().map(|r| r.5).collect::<Vec<_>>())
                    .with_timezone("UTC"),
            ),
        ],
    )
    .unwrap()
}

fn feed(rows: &[(i64, &str, i64, &str)]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("age", DataType::Int64, false),
        Field::new("status", DataType::Utf8, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            )),
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.3).collect::<Vec<_>>(),
            )),
        ],
    )
    .unwrap()
}

/// Render every row as a pipe-joined string and sort, for multiset
/// comparison independent of row order
fn rows_of(batch: &RecordBatch) -> Vec<String> {
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let mut parts = Vec::with_capacity(batch.num_columns());
        for col in batch.columns() {
            let cell = if col.is_null(i) {
                "null".to_string()
            } else {
                match col.data_type() {
                    DataType::Int64 => col.as_primitive::<Int64Type>().value(i).to_string(),
                    DataType::Utf8 => col.as_string::<i32>().value(i).to_string(),
                    DataType::Timestamp(TimeUnit::Microsecond, _) => col
                        .as_primitive::<TimestampMicrosecondType>()
                        .value(i)
                        .to_string(),
                    other => panic!("unexpected column type {other} in test data"),
                }
            };
            parts.push(cell);
        }
        out.push(parts.join("|"));
    }
    out.sort();
    out
}

fn run(history: &RecordBatch, feed: &RecordBatch) -> RecordBatch {
    historize(
        history,
        feed,
        &pk(),
        at(T_NEW),
        &HistorizeOptions::default(),
    )
    .unwrap()
}

#[test]
fn test_unchanged_load_keeps_history_identical() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    let f = feed(&[
        (123, "Egon", 23, "healthy"),
        (124, "Erna", 27, "healthy"),
    ]);

    let out = run(&h, &f);
    assert_eq!(rows_of(&out), rows_of(&h));
}

#[test]
fn test_single_update_closes_and_reopens() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    let f = feed(&[(123, "Egon", 23, "sick"), (124, "Erna", 27, "healthy")]);

    let out = run(&h, &f);
    let expected = history(&[
        (123, "Egon", 23, "healthy", T_OLD, T_NEW - OFFSET),
        (123, "Egon", 23, "sick", T_NEW, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    assert_eq!(rows_of(&out), rows_of(&expected));
}

#[test]
fn test_technical_deletion_closes_missing_key() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    let f = feed(&[(124, "Erna", 27, "healthy")]);

    let out = run(&h, &f);
    let expected = history(&[
        (123, "Egon", 23, "healthy", T_OLD, T_NEW - OFFSET),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    assert_eq!(rows_of(&out), rows_of(&expected));
}

#[test]
fn test_insertion_opens_new_key() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    let f = feed(&[
        (123, "Egon", 23, "healthy"),
        (124, "Erna", 27, "healthy"),
        (125, "Edeltraut", 54, "healthy"),
    ]);

    let out = run(&h, &f);
    let expected = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
        (125, "Edeltraut", 54, "healthy", T_NEW, D),
    ]);
    assert_eq!(rows_of(&out), rows_of(&expected));
}

#[test]
fn test_reappearance_after_past_deletion_opens_new_row() {
    let t_old_del = 500_000;
    let t_close_del = 800_000;
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", t_old_del, t_close_del),
    ]);
    let f = feed(&[(123, "Egon", 23, "healthy"), (124, "Erna", 28, "healthy")]);

    let out = run(&h, &f);
    let expected = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", t_old_del, t_close_del),
        (124, "Erna", 28, "healthy", T_NEW, D),
    ]);
    assert_eq!(rows_of(&out), rows_of(&expected));
}

#[test]
fn test_null_value_swap_counts_as_change() {
    // pk = [id]; the two payload columns exchange a null and a value
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("a", DataType::Utf8, true),
        Field::new("b", DataType::Utf8, true),
        Field::new(CAPTURED_FIELD, ts_type(), false),
        Field::new(DELIMITED_FIELD, ts_type(), false),
    ]));
    let h = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(StringArray::from(vec![None::<&str>])),
            Arc::new(StringArray::from(vec![Some("value")])),
            Arc::new(TimestampMicrosecondArray::from(vec![T_OLD]).with_timezone("UTC")),
            Arc::new(TimestampMicrosecondArray::from(vec![D]).with_timezone("UTC")),
        ],
    )
    .unwrap();

    let feed_schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("a", DataType::Utf8, true),
        Field::new("b", DataType::Utf8, true),
    ]));
    let f = RecordBatch::try_new(
        feed_schema,
        vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(StringArray::from(vec![Some("value")])),
            Arc::new(StringArray::from(vec![None::<&str>])),
        ],
    )
    .unwrap();

    let out = historize(
        &h,
        &f,
        &["id".to_string()],
        at(T_NEW),
        &HistorizeOptions::default(),
    )
    .unwrap();

    let rendered = rows_of(&out);
    assert_eq!(rendered.len(), 2);
    assert!(rendered.contains(&format!("1|null|value|{}|{}", T_OLD, T_NEW - OFFSET)));
    assert!(rendered.contains(&format!("1|value|null|{}|{}", T_NEW, D)));
}

#[test]
fn test_float_payload_compares_by_bits() {
    // pk = [id]; the payload is a float column. A re-delivered NaN is not
    // a change; flipping 0.0 to -0.0 is one.
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("value", DataType::Float64, true),
        Field::new(CAPTURED_FIELD, ts_type(), false),
        Field::new(DELIMITED_FIELD, ts_type(), false),
    ]));
    let h = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Float64Array::from(vec![Some(f64::NAN), Some(0.0)])),
            Arc::new(TimestampMicrosecondArray::from(vec![T_OLD, T_OLD]).with_timezone("UTC")),
            Arc::new(TimestampMicrosecondArray::from(vec![D, D]).with_timezone("UTC")),
        ],
    )
    .unwrap();

    let feed_schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("value", DataType::Float64, true),
    ]));
    let f = RecordBatch::try_new(
        feed_schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Float64Array::from(vec![Some(f64::NAN), Some(-0.0)])),
        ],
    )
    .unwrap();

    let out = historize(
        &h,
        &f,
        &["id".to_string()],
        at(T_NEW),
        &HistorizeOptions::default(),
    )
    .unwrap();

    let ids = out
        .column_by_name("id")
        .unwrap()
        .as_primitive::<Int64Type>();
    let captured = out
        .column_by_name(CAPTURED_FIELD)
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();
    let delimited = out
        .column_by_name(DELIMITED_FIELD)
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();

    let mut nan_key = Vec::new();
    let mut zero_key = Vec::new();
    for i in 0..out.num_rows() {
        match ids.value(i) {
            1 => nan_key.push((captured.value(i), delimited.value(i))),
            2 => zero_key.push((captured.value(i), delimited.value(i))),
            other => panic!("unexpected key {other}"),
        }
    }
    zero_key.sort_unstable();

    assert_eq!(nan_key, vec![(T_OLD, D)], "NaN payload must stay unchanged");
    assert_eq!(
        zero_key,
        vec![(T_OLD, T_NEW - OFFSET), (T_NEW, D)],
        "0.0 to -0.0 must close and reopen"
    );
}

#[test]
fn test_empty_feed_is_mass_technical_deletion() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
    ]);
    let f = feed(&[]);

    let out = run(&h, &f);
    let expected = history(&[
        (123, "Egon", 23, "healthy", T_OLD, T_NEW - OFFSET),
        (124, "Erna", 27, "healthy", T_OLD, T_NEW - OFFSET),
    ]);
    assert_eq!(rows_of(&out), rows_of(&expected));
}

#[test]
fn test_empty_history_opens_every_feed_row() {
    let h = history(&[]);
    let f = feed(&[(123, "Egon", 23, "healthy"), (124, "Erna", 27, "healthy")]);

    let out = run(&h, &f);
    let expected = history(&[
        (123, "Egon", 23, "healthy", T_NEW, D),
        (124, "Erna", 27, "healthy", T_NEW, D),
    ]);
    assert_eq!(rows_of(&out), rows_of(&expected));
}

#[test]
fn test_initial_history_matches_empty_history_run() {
    let f = feed(&[(123, "Egon", 23, "healthy"), (124, "Erna", 27, "healthy")]);

    let bootstrapped =
        initial_history(&f, &pk(), at(T_NEW), &HistorizeOptions::default()).unwrap();
    let via_engine = run(&history(&[]), &f);
    assert_eq!(rows_of(&bootstrapped), rows_of(&via_engine));
}

#[test]
fn test_current_snapshot_extracts_open_business_rows() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", 500_000, 800_000),
    ]);

    let snapshot = current_snapshot(&h, doomsday()).unwrap();
    assert_eq!(snapshot.num_rows(), 1);
    assert_eq!(snapshot.num_columns(), 4, "technical columns dropped");
    assert_eq!(rows_of(&snapshot), vec!["123|Egon|23|healthy".to_string()]);
}

#[test]
fn test_output_is_deterministic() {
    let h = history(&[
        (123, "Egon", 23, "healthy", T_OLD, D),
        (124, "Erna", 27, "healthy", T_OLD, D),
        (125, "Edeltraut", 54, "old", 500_000, 800_000),
    ]);
    let f = feed(&[(123, "Egon", 23, "sick"), (126, "Emil", 8, "new")]);

    let first = run(&h, &f);
    let second = run(&h, &f);
    // Ordered comparison on purpose: reruns must agree byte for byte,
    // not just as multisets
    let ordered = |b: &RecordBatch| {
        (0..b.num_rows())
            .map(|i| {
                b.columns()
                    .iter()
                    .map(|c| format!("{:?}", c.slice(i, 1)))
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(ordered(&first), ordered(&second));
}
