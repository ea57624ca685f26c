//! Validity interval rewriting
//!
//! Open intervals carry the doomsday sentinel as their upper bound.
//! Closing an interval replaces the sentinel with `reference - offset`;
//! opening one sets its lower bound to `reference`. The offset keeps a
//! closed interval strictly below its successor.

use crate::schema::DELIMITED_FIELD;
use crate::Result;
use arrow_array::{RecordBatch, TimestampMicrosecondArray};
use arrow_schema::SchemaRef;
use std::sync::Arc;

/// Close every row of `batch` at `delimit_at` (epoch microseconds)
pub(crate) fn close_rows(batch: &RecordBatch, delimit_at: i64) -> Result<RecordBatch> {
    let idx = batch.schema().index_of(DELIMITED_FIELD)?;
    let delimited =
        TimestampMicrosecondArray::from(vec![delimit_at; batch.num_rows()]).with_timezone("UTC");
    let mut columns = batch.columns().to_vec();
    columns[idx] = Arc::new(delimited);
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

/// Open every row of the business-column batch `feed` at `captured_at`,
/// appending technical columns to produce a batch of `schema`
pub(crate) fn open_rows(
    feed: &RecordBatch,
    schema: SchemaRef,
    captured_at: i64,
    doomsday: i64,
) -> Result<RecordBatch> {
    let rows = feed.num_rows();
    let mut columns = feed.columns().to_vec();
    columns.push(Arc::new(
        TimestampMicrosecondArray::from(vec![captured_at; rows]).with_timezone("UTC"),
    ));
    columns.push(Arc::new(
        TimestampMicrosecondArray::from(vec![doomsday; rows]).with_timezone("UTC"),
    ));
    Ok(RecordBatch::try_new(schema, columns)?)
}
