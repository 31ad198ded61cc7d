use thiserror::Error;

/// Failure of a single connect/query/close step against the database.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("unexpected result shape: {0}")]
    Shape(String),
    #[error("close failed: {0}")]
    Close(String),
}

impl ExecError {
    /// True for failures that happened before a connection existed.
    pub fn is_connect(&self) -> bool {
        matches!(self, ExecError::Connect(_))
    }
}
