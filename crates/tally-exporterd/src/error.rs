use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("metrics registry: {0}")]
    Metrics(#[from] tally_prometheus::MetricsError),

    #[error(transparent)]
    Api(#[from] tally_api::ApiError),

    #[error("metrics server task ended abnormally: {0}")]
    ServerTask(String),
}
