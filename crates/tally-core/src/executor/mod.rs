mod outcome;
pub use outcome::ExecutionOutcome;

use tally_model::{ConnectionParameters, QuerySpec};
use tally_prometheus::QueryMetrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{Connector, CountConnection};

/// Runs one connect-query-close cycle and publishes the count on success.
///
/// A failed attempt never touches the published sample: whatever the last
/// successful tick stored (or nothing) stays visible.
pub struct QueryExecutor<C> {
    connector: C,
    metrics: QueryMetrics,
}

impl<C> QueryExecutor<C>
where
    C: Connector,
{
    pub fn new(connector: C, metrics: QueryMetrics) -> Self {
        Self { connector, metrics }
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.metrics
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(query_name = %spec.name, database = %spec.database, endpoint = %conn.endpoint())
    )]
    pub async fn run(
        &self,
        conn: &ConnectionParameters,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        if cancel.is_cancelled() {
            debug!("cancelled before start; skipping");
            return ExecutionOutcome::Cancelled;
        }

        debug!("attempting connection");
        let mut session = match self.connector.connect(conn, &spec.database).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    query_name = %spec.name,
                    database = %spec.database,
                    query = %spec.query,
                    error = %e,
                    "cannot connect to database"
                );
                return ExecutionOutcome::ConnectFailure {
                    detail: e.to_string(),
                };
            }
        };
        debug!("connection established");

        debug!(query = %spec.query, "running query");
        let fetched = session.fetch_count(&spec.query).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close connection");
        }

        match fetched {
            Ok(count) => {
                self.metrics.set_count(&spec.name, &spec.query, count as f64);
                info!(
                    query_name = %spec.name,
                    database = %spec.database,
                    count,
                    "query complete"
                );
                ExecutionOutcome::Success { count }
            }
            Err(e) => {
                error!(
                    query_name = %spec.name,
                    database = %spec.database,
                    query = %spec.query,
                    error = %e,
                    "query failed; keeping previous sample"
                );
                ExecutionOutcome::QueryFailure {
                    detail: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tracing_subscriber::EnvFilter;

    use super::*;
    use crate::testing::{MockConnector, MockStep, connection};

    fn spec(name: &str, database: &str) -> QuerySpec {
        QuerySpec {
            name: name.to_string(),
            database: database.to_string(),
            query: format!("SELECT COUNT(*) FROM {name}"),
            interval: Duration::from_secs(1),
        }
    }

    fn executor(connector: MockConnector) -> QueryExecutor<MockConnector> {
        QueryExecutor::new(connector, QueryMetrics::new().unwrap())
    }

    #[tokio::test]
    async fn success_publishes_count() {
        let mock = MockConnector::constant(42);
        let exec = executor(mock.clone());
        let spec = spec("users", "app");

        let outcome = exec.run(&connection(), &spec, &CancellationToken::new()).await;

        assert_eq!(outcome, ExecutionOutcome::Success { count: 42 });
        assert_eq!(exec.metrics().sample("users", &spec.query), Some(42.0));
        assert_eq!(mock.opened(), 1);
        assert_eq!(mock.released(), 1);
    }

    #[tokio::test]
    async fn connect_failure_skips_query_and_publishes_nothing() {
        let mock = MockConnector::new(|_, _| MockStep::ConnectError("refused".into()));
        let exec = executor(mock.clone());
        let spec = spec("users", "app");

        let outcome = exec.run(&connection(), &spec, &CancellationToken::new()).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::ConnectFailure { ref detail } if detail.contains("refused")
        ));
        assert_eq!(mock.queries("app"), 0);
        assert_eq!(exec.metrics().sample("users", &spec.query), None);
    }

    #[tokio::test]
    async fn query_failure_keeps_previous_sample_and_closes_connection() {
        let mock = MockConnector::new(|_, attempt| {
            if attempt == 0 {
                MockStep::Count(5)
            } else {
                MockStep::QueryError("table is locked".into())
            }
        });
        let exec = executor(mock.clone());
        let spec = spec("jobs", "queue");
        let cancel = CancellationToken::new();

        assert!(exec.run(&connection(), &spec, &cancel).await.is_success());
        let outcome = exec.run(&connection(), &spec, &cancel).await;

        assert!(matches!(outcome, ExecutionOutcome::QueryFailure { .. }));
        assert_eq!(exec.metrics().sample("jobs", &spec.query), Some(5.0));
        assert_eq!(mock.opened(), 2);
        assert_eq!(mock.released(), 2);
    }

    #[tokio::test]
    async fn failure_before_first_success_leaves_sample_absent() {
        let mock = MockConnector::new(|_, _| MockStep::QueryError("no rows".into()));
        let exec = executor(mock);
        let spec = spec("empty", "app");

        let outcome = exec.run(&connection(), &spec, &CancellationToken::new()).await;

        assert!(outcome.is_failure());
        assert_eq!(exec.metrics().sample("empty", &spec.query), None);
        assert!(exec.metrics().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_skips_everything() {
        let mock = MockConnector::constant(1);
        let exec = executor(mock.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = exec.run(&connection(), &spec("x", "app"), &cancel).await;

        assert_eq!(outcome, ExecutionOutcome::Cancelled);
        assert_eq!(mock.attempts("app"), 0);
    }

    /// Collects formatted log output for one test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn info_subscriber(out: Captured) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("info"))
            .with_ansi(false)
            .with_writer(move || out.clone())
            .finish()
    }

    #[tokio::test]
    async fn failures_name_the_database_at_info_level() {
        let out = Captured::default();
        let _guard = tracing::subscriber::set_default(info_subscriber(out.clone()));

        let refused = MockConnector::new(|_, _| MockStep::ConnectError("refused".into()));
        executor(refused)
            .run(&connection(), &spec("orders", "shop_db"), &CancellationToken::new())
            .await;

        let locked = MockConnector::new(|_, _| MockStep::QueryError("locked".into()));
        executor(locked)
            .run(&connection(), &spec("jobs", "queue_db"), &CancellationToken::new())
            .await;

        let logs = out.text();
        let connect = logs
            .lines()
            .find(|l| l.contains("cannot connect"))
            .expect("connect failure logged");
        assert!(connect.contains("database=shop_db"), "{connect}");
        assert!(connect.contains("query_name=orders"), "{connect}");
        assert!(connect.contains("refused"), "{connect}");

        let query = logs
            .lines()
            .find(|l| l.contains("query failed"))
            .expect("query failure logged");
        assert!(query.contains("database=queue_db"), "{query}");
        assert!(query.contains("SELECT COUNT(*) FROM jobs"), "{query}");
        assert!(query.contains("locked"), "{query}");
    }

    #[tokio::test]
    async fn success_logs_count_at_info_level() {
        let out = Captured::default();
        let _guard = tracing::subscriber::set_default(info_subscriber(out.clone()));

        executor(MockConnector::constant(17))
            .run(&connection(), &spec("users", "app"), &CancellationToken::new())
            .await;

        let logs = out.text();
        let done = logs
            .lines()
            .find(|l| l.contains("query complete"))
            .expect("success logged");
        assert!(done.contains("count=17"), "{done}");
        assert!(done.contains("database=app"), "{done}");
    }

    #[test]
    fn outcome_kinds() {
        assert_eq!(ExecutionOutcome::Success { count: 1 }.kind(), "success");
        assert_eq!(ExecutionOutcome::Cancelled.kind(), "cancelled");
        assert!(!ExecutionOutcome::Cancelled.is_failure());
        assert_eq!(
            ExecutionOutcome::QueryFailure { detail: "boom".into() }.to_string(),
            "query failure: boom"
        );
    }
}
