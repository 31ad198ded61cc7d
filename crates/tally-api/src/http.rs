use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::State, http::header, response::IntoResponse, routing::get};
use tally_prometheus::QueryMetrics;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::ApiError;

/// The only route served.
pub const METRICS_PATH: &str = "/metrics";

/// Router builder for the scrape endpoint.
pub struct MetricsApi {
    metrics: QueryMetrics,
}

impl MetricsApi {
    pub fn new(metrics: QueryMetrics) -> Self {
        Self { metrics }
    }

    /// Routes:
    /// - GET /metrics - Prometheus text exposition of every sample
    pub fn router(self) -> Router {
        Router::new()
            .route(METRICS_PATH, get(scrape))
            .with_state(self.metrics)
    }
}

/// GET /metrics
async fn scrape(State(metrics): State<QueryMetrics>) -> Result<impl IntoResponse, ApiError> {
    let body = metrics.scrape()?;
    debug!(bytes = body.len(), "scrape served");
    Ok(([(header::CONTENT_TYPE, metrics.content_type())], body))
}

/// Bound listener plus router, ready to serve.
///
/// Binding is separate from serving so a bad port fails startup before any
/// query loop is spawned.
pub struct MetricsServer {
    listener: TcpListener,
    router: Router,
    addr: SocketAddr,
}

impl MetricsServer {
    pub async fn bind(addr: &str, api: MetricsApi) -> Result<Self, ApiError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ApiError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let addr = listener.local_addr().map_err(|source| ApiError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        Ok(Self {
            listener,
            router: api.router(),
            addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves, then stop accepting and let in-flight
    /// scrapes finish.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr;
        info!(%addr, path = METRICS_PATH, "metrics endpoint listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiError::Serve { addr, source })?;

        info!(%addr, "metrics endpoint stopped");
        Ok(())
    }
}
