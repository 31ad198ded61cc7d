//! `/metrics` endpoint for the tally exporter.
mod error;
pub use error::ApiError;

mod http;
pub use http::{METRICS_PATH, MetricsApi, MetricsServer};

pub use axum;
