//! # Histlake
//!
//! An SCD Type-2 historization engine for snapshot feeds over Arrow record
//! batches.
//!
//! Histlake keeps the full change history of slowly changing entities:
//! every business-key row carries a `[captured, delimited)` validity
//! interval, rows are never mutated in place, and a key disappearing from
//! the feed is closed as a technical deletion.
//!
//! ## Key Features
//!
//! - **Lossless change tracking**: changes close the previous version and
//!   open a new one; nothing is overwritten
//! - **Schema evolution built in**: feeds may add, drop or reorder columns;
//!   both sides are aligned onto one unified schema before comparison
//! - **Null-sensitive comparison**: null equals null, a null/value exchange
//!   counts as a change, floats compare by their exact bits
//! - **Deterministic**: fixed inputs and a fixed reference instant produce
//!   bit-identical output, and identical inputs report identical errors
//!
//! ## Architecture
//!
//! - **Schema aligner**: reconciles the column sets of history and feed
//! - **Partitioner**: splits rows into unchanged / closing / opening /
//!   carried-closed
//! - **Interval rewriter**: closes intervals at `reference - offset`,
//!   opens new ones at `reference` with the doomsday sentinel

pub mod historize;
pub mod schema;
pub mod table;

mod error;

pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::historize::{
        current_snapshot, historize, initial_history, validate_history, HistorizeOptions,
    };
    pub use crate::schema::{align, doomsday, CAPTURED_FIELD, DELIMITED_FIELD, DOOMSDAY_MICROS};
    pub use crate::{Error, Result};
}
