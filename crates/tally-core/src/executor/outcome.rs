use std::fmt;

/// Result of one tick of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The count was read and published.
    Success { count: i64 },
    /// No connection could be opened; the query was not sent.
    ConnectFailure { detail: String },
    /// Connected, but the query failed or returned an unusable result.
    QueryFailure { detail: String },
    /// Cancellation was already requested; nothing was attempted.
    Cancelled,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::ConnectFailure { .. } | ExecutionOutcome::QueryFailure { .. }
        )
    }

    /// Short symbolic name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::ConnectFailure { .. } => "connect_failure",
            ExecutionOutcome::QueryFailure { .. } => "query_failure",
            ExecutionOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success { count } => write!(f, "success (count={count})"),
            ExecutionOutcome::ConnectFailure { detail } => write!(f, "connect failure: {detail}"),
            ExecutionOutcome::QueryFailure { detail } => write!(f, "query failure: {detail}"),
            ExecutionOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}
