//! Scheduled query execution for the tally exporter.
//!
//! - [`backend`] abstracts "open a connection, read one count, close".
//! - [`executor`] runs one tick of one query and publishes on success.
//! - [`scheduler`] drives one independent loop per configured query.
pub mod backend;
pub use backend::{Connector, CountConnection};
#[cfg(feature = "mysql")]
pub use backend::MySqlConnector;

pub mod error;
pub use error::ExecError;

pub mod executor;
pub use executor::{ExecutionOutcome, QueryExecutor};

pub mod scheduler;
pub use scheduler::{LoopState, LoopStatus, Scheduler, SchedulerHandle, ShutdownTimeout};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use tokio_util::sync::CancellationToken;
