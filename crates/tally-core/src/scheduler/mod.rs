mod state;
pub use state::{LoopState, LoopStatus};

use std::sync::Arc;
use std::time::Duration;

use tally_model::{ConnectionParameters, QuerySpec};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::backend::Connector;
use crate::executor::QueryExecutor;

/// Floor applied to intervals that bypassed config validation.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Loops that were still executing when the grace period ran out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{pending} query loop(s) still running after {grace:?}; aborted")]
pub struct ShutdownTimeout {
    pub pending: usize,
    pub grace: Duration,
}

/// Starts one independent timer loop per query.
pub struct Scheduler<C> {
    executor: Arc<QueryExecutor<C>>,
    connection: Arc<ConnectionParameters>,
}

impl<C> Scheduler<C>
where
    C: Connector,
{
    pub fn new(executor: QueryExecutor<C>, connection: ConnectionParameters) -> Self {
        Self {
            executor: Arc::new(executor),
            connection: Arc::new(connection),
        }
    }

    /// Spawn a loop for every query. All loops stop once `cancel` fires.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, queries: &[QuerySpec], cancel: &CancellationToken) -> SchedulerHandle {
        let mut tasks = JoinSet::new();
        let mut statuses = Vec::with_capacity(queries.len());

        for spec in queries {
            let status = LoopStatus::new(spec.name.clone());
            statuses.push(status.clone());
            tasks.spawn(query_loop(
                Arc::clone(&self.executor),
                Arc::clone(&self.connection),
                spec.clone(),
                status,
                cancel.clone(),
            ));
        }

        info!(queries = statuses.len(), "scheduler started");
        SchedulerHandle {
            tasks,
            statuses,
            cancel: cancel.clone(),
        }
    }
}

/// Running loops started by [`Scheduler::start`].
pub struct SchedulerHandle {
    tasks: JoinSet<()>,
    statuses: Vec<LoopStatus>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    pub fn statuses(&self) -> &[LoopStatus] {
        &self.statuses
    }

    /// Snapshot of `(query name, state)` in configuration order.
    pub fn states(&self) -> Vec<(String, LoopState)> {
        self.statuses
            .iter()
            .map(|s| (s.name().to_string(), s.get()))
            .collect()
    }

    /// Cancel all loops and wait up to `grace` for them to exit.
    ///
    /// Loops blocked in a database call past the grace period are aborted.
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), ShutdownTimeout> {
        self.cancel.cancel();

        if time::timeout(grace, drain(&mut self.tasks)).await.is_ok() {
            info!("all query loops stopped");
            return Ok(());
        }

        let pending = self.tasks.len();
        self.tasks.abort_all();
        warn!(pending, grace = ?grace, "query loops did not stop within grace period");
        Err(ShutdownTimeout { pending, grace })
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined
            && e.is_panic()
        {
            error!(error = %e, "query loop panicked");
        }
    }
}

async fn query_loop<C>(
    executor: Arc<QueryExecutor<C>>,
    connection: Arc<ConnectionParameters>,
    spec: QuerySpec,
    status: LoopStatus,
    cancel: CancellationToken,
) where
    C: Connector,
{
    let period = if spec.interval.is_zero() {
        warn!(
            query_name = %spec.name,
            min_interval = ?MIN_INTERVAL,
            "zero interval; using minimum"
        );
        MIN_INTERVAL
    } else {
        spec.interval
    };

    // First tick one full period after start; late ticks are delayed, never bursted.
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(query_name = %spec.name, interval = ?period, "query loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancel.is_cancelled() {
            break;
        }

        status.set(LoopState::Running);
        let outcome = executor.run(&connection, &spec, &cancel).await;
        status.set(LoopState::Idle);
        trace!(query_name = %spec.name, outcome = outcome.kind(), "tick finished");
    }

    status.set(LoopState::Stopped);
    debug!(query_name = %spec.name, "query loop stopped");
}
