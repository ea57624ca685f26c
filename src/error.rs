//! Error types for histlake

/// Result type alias for histlake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for histlake
///
/// Every error is fatal at the engine boundary: the engine never produces a
/// partially historized table, and identical inputs report the identical
/// error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Arrow-related errors
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    /// A column present on both sides carries conflicting types, or the
    /// feed carries a reserved technical column
    #[error("Incompatible schemas: {0}")]
    SchemaIncompatible(String),
    /// The history table is missing or mistypes its technical columns, or
    /// violates interval ordering on input
    #[error("Malformed history: {0}")]
    MalformedHistory(String),
    /// The incoming feed contains duplicate primary keys
    #[error("Feed invariant violated: {0}")]
    FeedInvariantViolated(String),
    /// The history contains more than one open row for the same key
    #[error("History invariant violated: {0}")]
    HistoryInvariantViolated(String),
    /// Configuration errors (empty key, unknown key column, bad offset,
    /// doomsday/reference ordering)
    #[error("Configuration error: {0}")]
    Config(String),
}
