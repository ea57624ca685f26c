//! Column-set alignment between a historized table and a snapshot feed
//!
//! Snapshot feeds routinely gain or lose columns over time. Aligning both
//! sides onto one unified schema up front reduces historization to a single
//! uniform-schema comparison. Columns missing on one side are filled with
//! nulls there; technical columns are preserved on the history side only.

use crate::{Error, Result};
use arrow_array::{new_null_array, ArrayRef, RecordBatch};
use arrow_schema::{Field, Schema};
use std::sync::Arc;

/// Align the column sets of `history` and `feed` onto a shared schema.
///
/// Returns `(history, feed)` rebuilt over the unified business schema:
/// columns present on both sides first (in history order), then feed-only
/// columns (in feed order), then history-only columns. A column missing on
/// one side is added there as all-null with its nullability forced true;
/// shared columns take the union of both sides' nullability. The `ignore`
/// columns (the technical timestamps) are excluded from comparison and
/// re-appended unchanged to the history side.
///
/// Fails with [`Error::SchemaIncompatible`] when a shared column carries
/// conflicting types, or when the feed carries an `ignore` column.
pub fn align(
    history: &RecordBatch,
    feed: &RecordBatch,
    ignore: &[&str],
) -> Result<(RecordBatch, RecordBatch)> {
    let history_schema = history.schema();
    let feed_schema = feed.schema();

    for name in ignore {
        if feed_schema.column_with_name(name).is_some() {
            return Err(Error::SchemaIncompatible(format!(
                "feed must not carry reserved column '{}'",
                name
            )));
        }
    }

    let history_business: Vec<&Arc<Field>> = history_schema
        .fields()
        .iter()
        .filter(|f| !ignore.contains(&f.name().as_str()))
        .collect();

    // Shared columns in history order, feed-only appended in feed order,
    // history-only last. Deterministic and independent of row data.
    let mut unified: Vec<Field> = Vec::new();
    for h in &history_business {
        if let Some((_, f)) = feed_schema.column_with_name(h.name()) {
            if h.data_type() != f.data_type() {
                return Err(Error::SchemaIncompatible(format!(
                    "column '{}' is {} in history but {} in feed",
                    h.name(),
                    h.data_type(),
                    f.data_type()
                )));
            }
            unified.push(Field::new(
                h.name(),
                h.data_type().clone(),
                h.is_nullable() || f.is_nullable(),
            ));
        }
    }
    for f in feed_schema.fields() {
        if history_schema.column_with_name(f.name()).is_none() {
            unified.push(Field::new(f.name(), f.data_type().clone(), true));
        }
    }
    for h in &history_business {
        if feed_schema.column_with_name(h.name()).is_none() {
            unified.push(Field::new(h.name(), h.data_type().clone(), true));
        }
    }

    let feed_aligned_schema = Arc::new(Schema::new(unified.clone()));

    let mut history_fields = unified;
    for name in ignore {
        if let Some((idx, _)) = history_schema.column_with_name(name) {
            history_fields.push(history_schema.field(idx).clone());
        }
    }
    let history_aligned_schema = Arc::new(Schema::new(history_fields));

    let history_columns = gather_columns(&history_aligned_schema, history)?;
    let feed_columns = gather_columns(&feed_aligned_schema, feed)?;

    let history_aligned = RecordBatch::try_new(history_aligned_schema, history_columns)?;
    let feed_aligned = RecordBatch::try_new(feed_aligned_schema, feed_columns)?;
    Ok((history_aligned, feed_aligned))
}

/// Project `source` onto `target`, null-filling columns it does not have
fn gather_columns(target: &Schema, source: &RecordBatch) -> Result<Vec<ArrayRef>> {
    let mut columns = Vec::with_capacity(target.fields().len());
    for field in target.fields() {
        match source.column_by_name(field.name()) {
            Some(col) => columns.push(col.clone()),
            None => columns.push(new_null_array(field.data_type(), source.num_rows())),
        }
    }
    Ok(columns)
}
