//! Row-level operations over Arrow record batches
//!
//! The historization engine only needs a handful of tabular primitives:
//! per-row key extraction, null-sensitive row equality, row selection and
//! concatenation. They are collected here so the engine modules stay free
//! of downcasting.

use crate::{Error, Result};
use arrow::compute::kernels::boolean::and;
use arrow::compute::kernels::cmp::not_distinct;
use arrow::compute::{concat_batches, filter_record_batch, take};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Date64Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{
    Array, ArrayRef, BooleanArray, Int32Array, Int64Array, RecordBatch,
    TimestampMicrosecondArray, UInt32Array,
};
use arrow_schema::{DataType, SchemaRef, TimeUnit};
use std::sync::Arc;

/// One primary-key component as an owned, hashable scalar.
///
/// Signed and temporal values widen to `i64`, unsigned to `u64`; floats are
/// carried as their IEEE-754 bits and compare exactly. Both sides of a
/// comparison always come from columns of the same declared type, so
/// widening never conflates distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    FloatBits(u64),
    Str(String),
    Bytes(Vec<u8>),
}

/// A composite row key: one [`KeyValue`] per primary-key column
pub type RowKey = Vec<KeyValue>;

/// Extract the composite key of every row of `batch`.
///
/// A row with a null in any key component yields `None`: a null key never
/// equals another null key, so such rows are classified but never matched.
pub fn row_keys(batch: &RecordBatch, columns: &[String]) -> Result<Vec<Option<RowKey>>> {
    let mut per_column = Vec::with_capacity(columns.len());
    for name in columns {
        let col = batch
            .column_by_name(name)
            .ok_or_else(|| Error::Config(format!("key column '{}' not found", name)))?;
        per_column.push(column_key_values(col)?);
    }

    let mut keys = Vec::with_capacity(batch.num_rows());
    'rows: for row in 0..batch.num_rows() {
        let mut key = Vec::with_capacity(columns.len());
        for values in &per_column {
            match &values[row] {
                Some(v) => key.push(v.clone()),
                None => {
                    keys.push(None);
                    continue 'rows;
                }
            }
        }
        keys.push(Some(key));
    }
    Ok(keys)
}

/// Extract one column's values as owned key scalars
fn column_key_values(col: &ArrayRef) -> Result<Vec<Option<KeyValue>>> {
    macro_rules! primitive {
        ($ty:ty, $variant:ident, $conv:expr) => {{
            let arr = col.as_primitive::<$ty>();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(KeyValue::$variant(($conv)(arr.value(i))))
                    }
                })
                .collect()
        }};
    }

    let values: Vec<Option<KeyValue>> = match col.data_type() {
        DataType::Boolean => {
            let arr = col.as_boolean();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(KeyValue::Bool(arr.value(i)))
                    }
                })
                .collect()
        }
        DataType::Int8 => primitive!(Int8Type, Int, |v| v as i64),
        DataType::Int16 => primitive!(Int16Type, Int, |v| v as i64),
        DataType::Int32 => primitive!(Int32Type, Int, |v| v as i64),
        DataType::Int64 => primitive!(Int64Type, Int, |v| v),
        DataType::UInt8 => primitive!(UInt8Type, UInt, |v| v as u64),
        DataType::UInt16 => primitive!(UInt16Type, UInt, |v| v as u64),
        DataType::UInt32 => primitive!(UInt32Type, UInt, |v| v as u64),
        DataType::UInt64 => primitive!(UInt64Type, UInt, |v| v),
        DataType::Float32 => primitive!(Float32Type, FloatBits, |v: f32| v.to_bits() as u64),
        DataType::Float64 => primitive!(Float64Type, FloatBits, |v: f64| v.to_bits()),
        DataType::Date32 => primitive!(Date32Type, Int, |v| v as i64),
        DataType::Date64 => primitive!(Date64Type, Int, |v| v),
        DataType::Timestamp(TimeUnit::Second, _) => {
            primitive!(TimestampSecondType, Int, |v| v)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            primitive!(TimestampMillisecondType, Int, |v| v)
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            primitive!(TimestampMicrosecondType, Int, |v| v)
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            primitive!(TimestampNanosecondType, Int, |v| v)
        }
        DataType::Utf8 => {
            let arr = col.as_string::<i32>();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(KeyValue::Str(arr.value(i).to_string()))
                    }
                })
                .collect()
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(KeyValue::Str(arr.value(i).to_string()))
                    }
                })
                .collect()
        }
        DataType::Binary => {
            let arr = col.as_binary::<i32>();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(KeyValue::Bytes(arr.value(i).to_vec()))
                    }
                })
                .collect()
        }
        DataType::LargeBinary => {
            let arr = col.as_binary::<i64>();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(KeyValue::Bytes(arr.value(i).to_vec()))
                    }
                })
                .collect()
        }
        other => {
            return Err(Error::Config(format!(
                "unsupported primary-key column type {}",
                other
            )))
        }
    };
    Ok(values)
}

/// Null-sensitive row equality between two equal-length batches.
///
/// Two nulls are equal; a null and a non-null are not; non-null values
/// compare by type-native equality. Float columns are compared by their
/// exact IEEE-754 bits: NaN equals itself and 0.0 differs from -0.0, so a
/// re-delivered snapshot never reads as a change. Columns named in `skip`
/// are excluded from the comparison (the right-hand batch does not need
/// to carry them).
pub fn payload_equal_mask(
    left: &RecordBatch,
    right: &RecordBatch,
    skip: &[&str],
) -> Result<BooleanArray> {
    let mut mask = BooleanArray::from(vec![true; left.num_rows()]);
    for (idx, field) in left.schema().fields().iter().enumerate() {
        if skip.contains(&field.name().as_str()) {
            continue;
        }
        let right_col = right.column_by_name(field.name()).ok_or_else(|| {
            Error::SchemaIncompatible(format!(
                "column '{}' missing from comparison partner",
                field.name()
            ))
        })?;
        let equal = not_distinct(
            &comparison_operand(left.column(idx)),
            &comparison_operand(right_col),
        )?;
        mask = and(&mask, &equal)?;
    }
    Ok(mask)
}

/// Reinterpret a float column as its IEEE-754 bit patterns so the equality
/// kernel compares exactly; `not_distinct` alone would equate 0.0 with
/// -0.0 and distinguish NaN from itself. Other columns pass through.
fn comparison_operand(col: &ArrayRef) -> ArrayRef {
    match col.data_type() {
        DataType::Float32 => {
            let arr = col.as_primitive::<Float32Type>();
            let bits: Int32Array = (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(arr.value(i).to_bits() as i32)
                    }
                })
                .collect();
            Arc::new(bits)
        }
        DataType::Float64 => {
            let arr = col.as_primitive::<Float64Type>();
            let bits: Int64Array = (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        None
                    } else {
                        Some(arr.value(i).to_bits() as i64)
                    }
                })
                .collect();
            Arc::new(bits)
        }
        _ => col.clone(),
    }
}

/// Select the rows of `batch` at `indices`, preserving the schema
pub fn take_rows(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

/// Keep the rows of `batch` where `mask` is true
pub fn filter_rows(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    Ok(filter_record_batch(batch, mask)?)
}

/// Concatenate batches sharing `schema` into one, preserving part order
pub fn concat_tables(schema: &SchemaRef, parts: &[RecordBatch]) -> Result<RecordBatch> {
    Ok(concat_batches(schema, parts)?)
}

/// Borrow a column as a microsecond timestamp array
pub fn timestamp_micros<'a>(
    batch: &'a RecordBatch,
    column: &str,
) -> Result<&'a TimestampMicrosecondArray> {
    batch
        .column_by_name(column)
        .and_then(|c| c.as_primitive_opt::<TimestampMicrosecondType>())
        .ok_or_else(|| {
            Error::Config(format!("column '{}' is not a microsecond timestamp", column))
        })
}
