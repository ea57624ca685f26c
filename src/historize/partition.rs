//! Four-way row classification
//!
//! The semantic core of historization: every open history row and every
//! feed row falls into exactly one of four sets. Everything downstream is
//! a timestamp rewrite.
//!
//! - `unchanged_open`: open history rows whose key and payload match a
//!   feed row exactly
//! - `closing`: open history rows superseded by a changed feed row, or
//!   whose key disappeared from the feed (technical delete)
//! - `opening`: feed rows introducing a new key or superseding a closing
//!   row
//! - `carried_closed`: already-closed history rows, passed through

use crate::schema::{CAPTURED_FIELD, DELIMITED_FIELD};
use crate::table::{
    filter_rows, payload_equal_mask, row_keys, take_rows, timestamp_micros, RowKey,
};
use crate::{Error, Result};
use arrow_array::{BooleanArray, RecordBatch, UInt32Array};
use std::collections::HashMap;

/// The four disjoint row sets produced by [`classify`]
#[derive(Debug)]
pub(crate) struct RowPartitions {
    pub unchanged_open: RecordBatch,
    pub closing: RecordBatch,
    pub opening: RecordBatch,
    pub carried_closed: RecordBatch,
}

/// Classify the rows of an aligned history/feed pair.
///
/// Both inputs must share the aligned business schema; `history` carries
/// the technical columns in addition. Key and payload comparisons are
/// null-sensitive: null == null for payload, while a row with a null key
/// component matches nothing, not even another null key.
pub(crate) fn classify(
    history: &RecordBatch,
    feed: &RecordBatch,
    primary_key: &[String],
    doomsday_micros: i64,
) -> Result<RowPartitions> {
    let delimited = timestamp_micros(history, DELIMITED_FIELD).map_err(|_| {
        Error::MalformedHistory(format!("missing technical column '{}'", DELIMITED_FIELD))
    })?;

    let open_mask: Vec<bool> = (0..history.num_rows())
        .map(|i| delimited.value(i) == doomsday_micros)
        .collect();
    let closed_mask: Vec<bool> = open_mask.iter().map(|b| !b).collect();
    let open = filter_rows(history, &BooleanArray::from(open_mask))?;
    let carried_closed = filter_rows(history, &BooleanArray::from(closed_mask))?;

    let feed_keys = row_keys(feed, primary_key)?;
    let mut feed_by_key: HashMap<&RowKey, usize> = HashMap::with_capacity(feed_keys.len());
    for (j, key) in feed_keys.iter().enumerate() {
        if let Some(k) = key {
            if let Some(previous) = feed_by_key.insert(k, j) {
                return Err(Error::FeedInvariantViolated(format!(
                    "duplicate primary key in feed (rows {} and {})",
                    previous, j
                )));
            }
        }
    }

    let open_keys = row_keys(&open, primary_key)?;
    let mut open_by_key: HashMap<&RowKey, usize> = HashMap::with_capacity(open_keys.len());
    for (i, key) in open_keys.iter().enumerate() {
        if let Some(k) = key {
            if let Some(previous) = open_by_key.insert(k, i) {
                return Err(Error::HistoryInvariantViolated(format!(
                    "duplicate open rows for one key in history (rows {} and {})",
                    previous, i
                )));
            }
        }
    }

    // Pair each open history row with the feed row sharing its key. Rows
    // without a partner (deleted keys, null keys) close unconditionally.
    let mut pair_history: Vec<u32> = Vec::new();
    let mut pair_feed: Vec<u32> = Vec::new();
    for (i, key) in open_keys.iter().enumerate() {
        if let Some(&j) = key.as_ref().and_then(|k| feed_by_key.get(k)) {
            pair_history.push(i as u32);
            pair_feed.push(j as u32);
        }
    }

    let mut unchanged = vec![false; open.num_rows()];
    let mut matched_feed = vec![false; feed.num_rows()];
    if !pair_history.is_empty() {
        let skip: Vec<&str> = primary_key
            .iter()
            .map(String::as_str)
            .chain([CAPTURED_FIELD, DELIMITED_FIELD])
            .collect();
        let history_side = take_rows(&open, &UInt32Array::from(pair_history.clone()))?;
        let feed_side = take_rows(feed, &UInt32Array::from(pair_feed.clone()))?;
        let equal = payload_equal_mask(&history_side, &feed_side, &skip)?;
        for p in 0..pair_history.len() {
            if equal.value(p) {
                unchanged[pair_history[p] as usize] = true;
                matched_feed[pair_feed[p] as usize] = true;
            }
        }
    }

    let closing_mask: Vec<bool> = unchanged.iter().map(|b| !b).collect();
    let opening_mask: Vec<bool> = matched_feed.iter().map(|b| !b).collect();
    let unchanged_open = filter_rows(&open, &BooleanArray::from(unchanged))?;
    let closing = filter_rows(&open, &BooleanArray::from(closing_mask))?;
    let opening = filter_rows(feed, &BooleanArray::from(opening_mask))?;

    Ok(RowPartitions {
        unchanged_open,
        closing,
        opening,
        carried_closed,
    })
}
