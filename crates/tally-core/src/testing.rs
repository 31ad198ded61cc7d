//! In-memory [`Connector`] for exercising executors and schedulers without a
//! database server.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tally_model::ConnectionParameters;

use crate::backend::{Connector, CountConnection};
use crate::error::ExecError;

/// What one scripted attempt does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    Count(i64),
    ConnectError(String),
    QueryError(String),
}

type Script = dyn Fn(&str, u64) -> MockStep + Send + Sync;

/// Scripted connector keyed by database name.
///
/// The script receives the database name and the zero-based attempt number for
/// that database. Every query sleeps for the configured delay before answering.
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Inner>,
}

struct Inner {
    script: Box<Script>,
    delay: Duration,
    attempts: Mutex<HashMap<String, u64>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<HashMap<String, usize>>,
    queries: Mutex<HashMap<String, u64>>,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl MockConnector {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, u64) -> MockStep + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                script: Box::new(script),
                delay: Duration::ZERO,
                attempts: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                max_in_flight: Mutex::new(HashMap::new()),
                queries: Mutex::new(HashMap::new()),
                opened: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }),
        }
    }

    /// Always answers `count`.
    pub fn constant(count: i64) -> Self {
        Self::new(move |_, _| MockStep::Count(count))
    }

    /// Make every query take `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        let inner = Arc::try_unwrap(self.inner)
            .unwrap_or_else(|_| panic!("with_delay must be called before cloning"));
        Self {
            inner: Arc::new(Inner { delay, ..inner }),
        }
    }

    /// Connection attempts made against `database`.
    pub fn attempts(&self, database: &str) -> u64 {
        lock(&self.inner.attempts).get(database).copied().unwrap_or(0)
    }

    /// Queries that reached the "server" for `database`.
    pub fn queries(&self, database: &str) -> u64 {
        lock(&self.inner.queries).get(database).copied().unwrap_or(0)
    }

    /// Highest number of simultaneously open connections seen for `database`.
    pub fn max_in_flight(&self, database: &str) -> usize {
        lock(&self.inner.max_in_flight)
            .get(database)
            .copied()
            .unwrap_or(0)
    }

    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(
        &self,
        _params: &ConnectionParameters,
        database: &str,
    ) -> Result<Self::Connection, ExecError> {
        let attempt = {
            let mut attempts = lock(&self.inner.attempts);
            let n = attempts.entry(database.to_string()).or_insert(0);
            let attempt = *n;
            *n += 1;
            attempt
        };

        let step = (self.inner.script)(database, attempt);
        if let MockStep::ConnectError(reason) = step {
            return Err(ExecError::Connect(reason));
        }

        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        {
            let mut in_flight = lock(&self.inner.in_flight);
            let now = in_flight.entry(database.to_string()).or_insert(0);
            *now += 1;
            let mut max = lock(&self.inner.max_in_flight);
            let peak = max.entry(database.to_string()).or_insert(0);
            *peak = (*peak).max(*now);
        }

        Ok(MockConnection {
            inner: Arc::clone(&self.inner),
            database: database.to_string(),
            step,
            released: false,
        })
    }
}

pub struct MockConnection {
    inner: Arc<Inner>,
    database: String,
    step: MockStep,
    released: bool,
}

impl MockConnection {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.inner.released.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = lock(&self.inner.in_flight).get_mut(&self.database) {
            *n = n.saturating_sub(1);
        }
    }
}

#[async_trait]
impl CountConnection for MockConnection {
    async fn fetch_count(&mut self, _sql: &str) -> Result<i64, ExecError> {
        *lock(&self.inner.queries)
            .entry(self.database.clone())
            .or_insert(0) += 1;

        if !self.inner.delay.is_zero() {
            tokio::time::sleep(self.inner.delay).await;
        }
        match &self.step {
            MockStep::Count(n) => Ok(*n),
            MockStep::QueryError(reason) => Err(ExecError::Query(reason.clone())),
            MockStep::ConnectError(_) => unreachable!("connect errors never yield a connection"),
        }
    }

    async fn close(mut self) -> Result<(), ExecError> {
        self.release();
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.release();
    }
}

/// Connection parameters pointing nowhere.
pub fn connection() -> ConnectionParameters {
    ConnectionParameters {
        host: "127.0.0.1".to_string(),
        port: 3306,
        user: "tester".to_string(),
        password: tally_model::Secret::new("not-a-real-password"),
    }
}
