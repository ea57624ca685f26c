//! Schema definitions for historized tables
//!
//! A historized table carries all business columns of the entity plus two
//! reserved technical timestamp columns bounding each row's validity
//! interval. Open rows carry the doomsday sentinel as their upper bound.

mod align;

pub use align::align;

use arrow_schema::{DataType, Field, TimeUnit};
use chrono::{DateTime, Utc};

/// Validity lower bound (inclusive): the instant a row became valid
pub const CAPTURED_FIELD: &str = "captured";
/// Validity upper bound (exclusive): the instant a row ceased being valid
pub const DELIMITED_FIELD: &str = "delimited";

/// Epoch microseconds of the doomsday sentinel, `5875-06-03T00:00:00Z`.
///
/// Open rows carry this value in `delimited`. Downstream consumers must
/// treat it as "currently open", never as a calendar date. Microsecond
/// resolution is deliberate: the sentinel does not fit in an `i64` of
/// nanoseconds.
pub const DOOMSDAY_MICROS: i64 = 123_243_120_000_000_000;

/// The doomsday sentinel as a `DateTime<Utc>`
pub fn doomsday() -> DateTime<Utc> {
    DateTime::from_timestamp_micros(DOOMSDAY_MICROS).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Arrow type of the technical timestamp columns
pub fn technical_timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// The `captured` field (non-null)
pub fn captured_field() -> Field {
    Field::new(CAPTURED_FIELD, technical_timestamp_type(), false)
}

/// The `delimited` field (non-null)
pub fn delimited_field() -> Field {
    Field::new(DELIMITED_FIELD, technical_timestamp_type(), false)
}

/// Both technical fields, in output order
pub fn technical_fields() -> [Field; 2] {
    [captured_field(), delimited_field()]
}

/// Whether a column name is reserved for a technical column
pub fn is_technical(name: &str) -> bool {
    name == CAPTURED_FIELD || name == DELIMITED_FIELD
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_doomsday_is_far_future() {
        let d = doomsday();
        assert_eq!(d.year(), 5875);
        assert_eq!(d.timestamp_micros(), DOOMSDAY_MICROS);
    }

    #[test]
    fn test_technical_fields() {
        let [captured, delimited] = technical_fields();
        assert_eq!(captured.name(), CAPTURED_FIELD);
        assert_eq!(delimited.name(), DELIMITED_FIELD);
        assert!(!captured.is_nullable());
        assert!(!delimited.is_nullable());
        assert_eq!(captured.data_type(), &technical_timestamp_type());
    }

    #[test]
    fn test_is_technical() {
        assert!(is_technical("captured"));
        assert!(is_technical("delimited"));
        assert!(!is_technical("id"));
    }
}
