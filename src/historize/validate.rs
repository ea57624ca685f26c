//! Input validation for historized tables
//!
//! The engine refuses to transform a history that already violates the
//! interval invariants; it would only produce garbage output. All checks
//! report the lowest offending row index so identical inputs yield the
//! identical error.

use crate::schema::{technical_timestamp_type, CAPTURED_FIELD, DELIMITED_FIELD};
use crate::table::{row_keys, timestamp_micros, RowKey};
use crate::{Error, Result};
use arrow_array::{Array, RecordBatch, TimestampMicrosecondArray};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Fetch a technical timestamp column, checking name, type and null-freedom
pub(crate) fn technical_column<'a>(
    history: &'a RecordBatch,
    name: &str,
) -> Result<&'a TimestampMicrosecondArray> {
    let schema = history.schema();
    let (_, field) = schema.column_with_name(name).ok_or_else(|| {
        Error::MalformedHistory(format!("missing technical column '{}'", name))
    })?;
    if field.data_type() != &technical_timestamp_type() {
        return Err(Error::MalformedHistory(format!(
            "technical column '{}' must be {}, found {}",
            name,
            technical_timestamp_type(),
            field.data_type()
        )));
    }
    let array = timestamp_micros(history, name).map_err(|_| {
        Error::MalformedHistory(format!("technical column '{}' has unexpected layout", name))
    })?;
    if array.null_count() > 0 {
        return Err(Error::MalformedHistory(format!(
            "technical column '{}' contains nulls",
            name
        )));
    }
    Ok(array)
}

/// Check that `history` is a well-formed historized table.
///
/// Verifies the technical columns (presence, type, no nulls), that every
/// row's interval is non-empty (`captured < delimited`), that intervals of
/// one key never overlap, and that no key has more than one open row.
/// Rows whose key contains a null are exempt from the per-key checks: a
/// null key never equals another null key.
pub fn validate_history(
    history: &RecordBatch,
    primary_key: &[String],
    doomsday: DateTime<Utc>,
) -> Result<()> {
    let captured = technical_column(history, CAPTURED_FIELD)?;
    let delimited = technical_column(history, DELIMITED_FIELD)?;
    let doomsday = doomsday.timestamp_micros();

    for i in 0..history.num_rows() {
        if captured.value(i) >= delimited.value(i) {
            return Err(Error::MalformedHistory(format!(
                "row {} has an empty validity interval",
                i
            )));
        }
    }

    let keys = row_keys(history, primary_key)?;
    let mut groups: HashMap<&RowKey, Vec<usize>> = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        if let Some(k) = key {
            groups.entry(k).or_default().push(i);
        }
    }

    // Per-key checks in first-occurrence order, so error reporting does not
    // depend on hash iteration order
    let mut checked: HashSet<&RowKey> = HashSet::new();
    for key in keys.iter().flatten() {
        if !checked.insert(key) {
            continue;
        }
        let rows = &groups[key];

        let open: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&i| delimited.value(i) == doomsday)
            .collect();
        if open.len() > 1 {
            return Err(Error::HistoryInvariantViolated(format!(
                "key has {} open rows (rows {} and {})",
                open.len(),
                open[0],
                open[1]
            )));
        }

        let mut intervals: Vec<(i64, i64, usize)> = rows
            .iter()
            .map(|&i| (captured.value(i), delimited.value(i), i))
            .collect();
        intervals.sort_unstable();
        for pair in intervals.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(Error::MalformedHistory(format!(
                    "overlapping validity intervals for one key (rows {} and {})",
                    pair[0].2, pair[1].2
                )));
            }
        }
    }

    Ok(())
}
