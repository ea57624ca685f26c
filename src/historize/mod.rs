//! SCD Type-2 historization of snapshot feeds
//!
//! Given an existing historized table and a freshly arrived snapshot of
//! the same logical entity, compute the new historized table: each
//! business-key row carries a temporal validity interval, changes over
//! time are preserved losslessly, and disappeared keys are closed as
//! technical deletions.
//!
//! The engine is a pure function over in-memory record batches. It opens
//! no files, spawns no tasks and holds no shared state; memory stays
//! proportional to the two inputs.

mod engine;
mod intervals;
mod partition;
mod validate;

pub use engine::{current_snapshot, historize, initial_history};
pub use validate::validate_history;

use crate::schema;
use chrono::{DateTime, Duration, Utc};

/// Options for a historization run
#[derive(Debug, Clone)]
pub struct HistorizeOptions {
    /// Gap between a closed interval's upper bound and the successor's
    /// lower bound. Must be positive; defaults to one millisecond.
    pub offset: Duration,
    /// Upper bound carried by open rows. Defaults to the doomsday
    /// sentinel; any stable far-future instant works, provided it lies
    /// strictly after every reference timestamp the table will see.
    pub doomsday: DateTime<Utc>,
}

impl Default for HistorizeOptions {
    fn default() -> Self {
        Self {
            offset: Duration::milliseconds(1),
            doomsday: schema::doomsday(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = HistorizeOptions::default();
        assert_eq!(options.offset, Duration::milliseconds(1));
        assert_eq!(
            options.doomsday.timestamp_micros(),
            schema::DOOMSDAY_MICROS
        );
    }
}
