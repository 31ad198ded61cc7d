use std::time::Duration;

/// One scheduled count query.
///
/// `name` and `query` together form the label pair of the published sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Value of the `name` label; expected but not required to be unique.
    pub name: String,
    /// Schema the connection is opened against.
    pub database: String,
    /// SQL returning exactly one row with one integer column.
    pub query: String,
    /// Period between ticks. Always non-zero once loaded.
    pub interval: Duration,
}
