use std::net::SocketAddr;
use std::time::Duration;

use tally_api::{MetricsApi, MetricsServer};
use tally_core::{Connector, QueryExecutor, Scheduler, SchedulerHandle};
use tally_model::ExporterConfig;
use tally_prometheus::QueryMetrics;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ExporterError;

/// A fully wired exporter whose metrics listener is already bound.
///
/// Construction fails if the port cannot be bound, before any query runs.
pub struct Exporter<C> {
    config: ExporterConfig,
    metrics: QueryMetrics,
    scheduler: Scheduler<C>,
    server: MetricsServer,
}

impl<C> Exporter<C>
where
    C: Connector,
{
    pub async fn bind(config: ExporterConfig, connector: C) -> Result<Self, ExporterError> {
        let metrics = QueryMetrics::new()?;
        let server =
            MetricsServer::bind(&config.listen_addr(), MetricsApi::new(metrics.clone())).await?;

        let executor = QueryExecutor::new(connector, metrics.clone());
        let scheduler = Scheduler::new(executor, config.connection.clone());

        Ok(Self {
            config,
            metrics,
            scheduler,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn metrics(&self) -> &QueryMetrics {
        &self.metrics
    }

    /// Run until `cancel` fires, then drain the server and the query loops.
    ///
    /// Both drains share one grace period. Overrunning it is logged, not
    /// returned; only a server that dies on its own is an error.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ExporterError> {
        let Exporter {
            config,
            scheduler,
            server,
            ..
        } = self;
        let grace = config.shutdown_grace;

        info!(
            addr = %server.local_addr(),
            db = %config.connection.endpoint(),
            queries = config.queries.len(),
            "exporter starting"
        );

        let loops = scheduler.start(&config.queries, &cancel);
        let mut server_task = tokio::spawn(server.serve(cancel.clone().cancelled_owned()));

        let early_exit = tokio::select! {
            _ = cancel.cancelled() => None,
            joined = &mut server_task => Some(joined),
        };

        if let Some(joined) = early_exit {
            cancel.cancel();
            let _ = loops.shutdown(grace).await;
            return match joined {
                Ok(Ok(())) => Err(ExporterError::ServerTask("stopped unexpectedly".into())),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(ExporterError::ServerTask(e.to_string())),
            };
        }

        info!(grace = ?grace, "shutdown started");
        tokio::join!(drain_server(server_task, grace), drain_loops(loops, grace));
        info!("shutdown complete");
        Ok(())
    }
}

async fn drain_server(
    mut task: JoinHandle<Result<(), tally_api::ApiError>>,
    grace: Duration,
) {
    match time::timeout(grace, &mut task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "metrics server failed during shutdown"),
        Ok(Err(e)) => error!(error = %e, "metrics server task panicked"),
        Err(_) => {
            task.abort();
            warn!(grace = ?grace, "metrics server did not drain within grace period");
        }
    }
}

async fn drain_loops(loops: SchedulerHandle, grace: Duration) {
    if let Err(e) = loops.shutdown(grace).await {
        warn!(error = %e, "shutdown timeout");
    }
}
