use async_trait::async_trait;
use tally_model::ConnectionParameters;

use crate::error::ExecError;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "mysql")]
pub use mysql::MySqlConnector;

/// Opens one fresh, unpooled connection per call.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: CountConnection;

    async fn connect(
        &self,
        params: &ConnectionParameters,
        database: &str,
    ) -> Result<Self::Connection, ExecError>;
}

/// A live connection able to evaluate a scalar count query.
#[async_trait]
pub trait CountConnection: Send {
    /// Run `sql`; it must yield exactly one row with one integer column.
    async fn fetch_count(&mut self, sql: &str) -> Result<i64, ExecError>;

    /// Release the connection. Dropping without closing must also release it.
    async fn close(self) -> Result<(), ExecError>
    where
        Self: Sized;
}
