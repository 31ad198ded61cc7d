use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tally_model::ConnectionParameters;

use crate::backend::{Connector, CountConnection};
use crate::error::ExecError;

/// [`Connector`] backed by a single `sqlx` MySQL connection per tick.
#[derive(Debug, Clone, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }

    fn options(params: &ConnectionParameters, database: &str) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .password(params.password.expose())
            .database(database)
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlCountConnection;

    async fn connect(
        &self,
        params: &ConnectionParameters,
        database: &str,
    ) -> Result<Self::Connection, ExecError> {
        let opts = Self::options(params, database);
        let inner = MySqlConnection::connect_with(&opts)
            .await
            .map_err(|e| ExecError::Connect(e.to_string()))?;
        Ok(MySqlCountConnection { inner })
    }
}

pub struct MySqlCountConnection {
    inner: MySqlConnection,
}

#[async_trait]
impl CountConnection for MySqlCountConnection {
    async fn fetch_count(&mut self, sql: &str) -> Result<i64, ExecError> {
        // Stop reading after the second row; the shape is already wrong by then.
        let mut rows = sqlx::query(sql).fetch(&mut self.inner);
        let first = rows.try_next().await.map_err(query_error)?;
        let extra = rows.try_next().await.map_err(query_error)?.is_some();
        drop(rows);

        match first {
            Some(row) if !extra => single_count(&row),
            Some(_) => Err(ExecError::Shape("expected exactly one row, got more".into())),
            None => Err(ExecError::Shape("expected exactly one row, got none".into())),
        }
    }

    async fn close(self) -> Result<(), ExecError> {
        self.inner
            .close()
            .await
            .map_err(|e| ExecError::Close(e.to_string()))
    }
}

fn query_error(e: sqlx::Error) -> ExecError {
    ExecError::Query(e.to_string())
}

/// Column types whose wire value is text that may spell an integer.
const TEXTUAL_TYPES: &[&str] = &[
    "DECIMAL", "CHAR", "VARCHAR", "TEXT", "TINYTEXT", "MEDIUMTEXT", "LONGTEXT",
];

fn single_count(row: &MySqlRow) -> Result<i64, ExecError> {
    if row.len() != 1 {
        return Err(ExecError::Shape(format!(
            "expected exactly one column, got {}",
            row.len()
        )));
    }

    // COUNT(*) is BIGINT, but unsigned and narrower integer columns are fine too.
    if let Ok(v) = row.try_get::<i64, _>(0) {
        return Ok(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(0) {
        return i64::try_from(v)
            .map_err(|_| ExecError::Shape(format!("count {v} does not fit into i64")));
    }

    let column = &row.columns()[0];
    let type_name = column.type_info().name();
    if TEXTUAL_TYPES.contains(&type_name) {
        // SUM() yields DECIMAL, which arrives as text.
        let text: String = row
            .try_get_unchecked(0)
            .map_err(|e| ExecError::Shape(format!("column `{}`: {e}", column.name())))?;
        return count_from_text(&text);
    }

    Err(ExecError::Shape(format!(
        "column `{}` has non-integer type {type_name}",
        column.name(),
    )))
}

/// Parse a textual count such as `42`, `+7` or `42.000`.
///
/// A non-zero fractional part is rejected rather than truncated.
fn count_from_text(text: &str) -> Result<i64, ExecError> {
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));

    if !fraction.bytes().all(|b| b == b'0') {
        return Err(ExecError::Shape(format!("value `{text}` is not a whole number")));
    }
    whole
        .parse::<i64>()
        .map_err(|e| ExecError::Shape(format!("value `{text}` is not an integer count: {e}")))
}
