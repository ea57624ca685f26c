//! Historization engine orchestration
//!
//! `historize` composes schema alignment, four-way classification and
//! interval rewriting into one deterministic transformation. For fixed
//! inputs and fixed `(reference, offset, doomsday)` the output is
//! bit-identical across runs: every step iterates rows in input order and
//! hash maps are used for lookup only.

use super::intervals::{close_rows, open_rows};
use super::partition::classify;
use super::validate::{technical_column, validate_history};
use super::HistorizeOptions;
use crate::schema::{self, is_technical, technical_fields, CAPTURED_FIELD, DELIMITED_FIELD};
use crate::table::{concat_tables, filter_rows, row_keys, RowKey};
use crate::{Error, Result};
use arrow_array::{BooleanArray, RecordBatch};
use arrow_schema::Schema;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolved run instants in epoch microseconds
struct RunInstants {
    reference: i64,
    offset: i64,
    doomsday: i64,
}

impl RunInstants {
    fn resolve(
        primary_key: &[String],
        reference: DateTime<Utc>,
        options: &HistorizeOptions,
    ) -> Result<Self> {
        if primary_key.is_empty() {
            return Err(Error::Config("primary key must not be empty".to_string()));
        }
        for name in primary_key {
            if is_technical(name) {
                return Err(Error::Config(format!(
                    "primary key must not name the technical column '{}'",
                    name
                )));
            }
        }
        let offset = options
            .offset
            .num_microseconds()
            .ok_or_else(|| Error::Config("offset overflows the microsecond range".to_string()))?;
        if offset <= 0 {
            return Err(Error::Config(
                "offset must be positive and at least one microsecond".to_string(),
            ));
        }
        let reference = reference.timestamp_micros();
        let doomsday = options.doomsday.timestamp_micros();
        if doomsday <= reference {
            return Err(Error::Config(
                "doomsday must lie strictly after the reference timestamp".to_string(),
            ));
        }
        Ok(Self {
            reference,
            offset,
            doomsday,
        })
    }
}

/// Historize a snapshot feed against an existing historized table.
///
/// Returns the new historized table: open rows whose key and payload
/// survive in the feed are kept, changed or disappeared keys have their
/// open interval closed at `reference - offset`, new and changed feed rows
/// open at `reference`, and already-closed rows pass through untouched.
/// Schemas are aligned first, so the feed may add, drop or reorder columns
/// relative to the history.
///
/// An empty feed closes every open row (mass technical deletion); an empty
/// history opens every feed row. Neither is an error.
pub fn historize(
    history: &RecordBatch,
    feed: &RecordBatch,
    primary_key: &[String],
    reference: DateTime<Utc>,
    options: &HistorizeOptions,
) -> Result<RecordBatch> {
    let run = RunInstants::resolve(primary_key, reference, options)?;
    for name in primary_key {
        if history.column_by_name(name).is_none() {
            return Err(Error::Config(format!(
                "primary key column '{}' not found in history",
                name
            )));
        }
        if feed.column_by_name(name).is_none() {
            return Err(Error::Config(format!(
                "primary key column '{}' not found in feed",
                name
            )));
        }
    }

    validate_history(history, primary_key, options.doomsday)?;

    let (history_aligned, feed_aligned) =
        schema::align(history, feed, &[CAPTURED_FIELD, DELIMITED_FIELD])?;
    debug!(
        columns = feed_aligned.num_columns(),
        "aligned history and feed schemas"
    );

    let parts = classify(&history_aligned, &feed_aligned, primary_key, run.doomsday)?;
    debug!(
        unchanged = parts.unchanged_open.num_rows(),
        closing = parts.closing.num_rows(),
        opening = parts.opening.num_rows(),
        carried = parts.carried_closed.num_rows(),
        "classified rows"
    );

    check_reference_clears_closing_rows(&parts.closing, &run)?;
    let closed = close_rows(&parts.closing, run.reference - run.offset)?;
    let opened = open_rows(
        &parts.opening,
        history_aligned.schema(),
        run.reference,
        run.doomsday,
    )?;

    let result = concat_tables(
        &history_aligned.schema(),
        &[parts.unchanged_open, closed, opened, parts.carried_closed],
    )?;
    info!(rows = result.num_rows(), "historization complete");
    Ok(result)
}

/// Closing at `reference - offset` must stay strictly after the lower
/// bound of every row being closed, or the closed interval would be empty.
/// Rows that stay open are exempt, so re-running an unchanged load with
/// the previous reference remains a no-op.
fn check_reference_clears_closing_rows(closing: &RecordBatch, run: &RunInstants) -> Result<()> {
    let captured = technical_column(closing, CAPTURED_FIELD)?;
    for i in 0..closing.num_rows() {
        if captured.value(i) >= run.reference - run.offset {
            return Err(Error::Config(format!(
                "reference must lie at least the offset after every row being closed (row {})",
                i
            )));
        }
    }
    Ok(())
}

/// Extract the business-column snapshot of the currently open rows.
///
/// This is the feed that would leave `history` unchanged if historized
/// against it.
pub fn current_snapshot(history: &RecordBatch, doomsday: DateTime<Utc>) -> Result<RecordBatch> {
    let delimited = technical_column(history, DELIMITED_FIELD)?;
    let doomsday = doomsday.timestamp_micros();
    let mask: Vec<bool> = (0..history.num_rows())
        .map(|i| delimited.value(i) == doomsday)
        .collect();
    let open = filter_rows(history, &BooleanArray::from(mask))?;

    let business: Vec<usize> = open
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !is_technical(f.name()))
        .map(|(idx, _)| idx)
        .collect();
    Ok(open.project(&business)?)
}

/// Bootstrap a historized table from the first snapshot of an entity.
///
/// Every feed row becomes an open row captured at `reference`. Equivalent
/// to historizing against an empty history, for callers that have no
/// historized schema to hand yet.
pub fn initial_history(
    feed: &RecordBatch,
    primary_key: &[String],
    reference: DateTime<Utc>,
    options: &HistorizeOptions,
) -> Result<RecordBatch> {
    let run = RunInstants::resolve(primary_key, reference, options)?;
    for name in primary_key {
        if feed.column_by_name(name).is_none() {
            return Err(Error::Config(format!(
                "primary key column '{}' not found in feed",
                name
            )));
        }
    }
    for field in feed.schema().fields() {
        if is_technical(field.name()) {
            return Err(Error::SchemaIncompatible(format!(
                "feed must not carry reserved column '{}'",
                field.name()
            )));
        }
    }

    let keys = row_keys(feed, primary_key)?;
    let mut by_key: HashMap<&RowKey, usize> = HashMap::with_capacity(keys.len());
    for (j, key) in keys.iter().enumerate() {
        if let Some(k) = key {
            if let Some(previous) = by_key.insert(k, j) {
                return Err(Error::FeedInvariantViolated(format!(
                    "duplicate primary key in feed (rows {} and {})",
                    previous, j
                )));
            }
        }
    }

    let mut fields: Vec<_> = feed
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.extend(technical_fields());
    let schema = Arc::new(Schema::new(fields));

    let result = open_rows(feed, schema, run.reference, run.doomsday)?;
    info!(rows = result.num_rows(), "initial history created");
    Ok(result)
}
