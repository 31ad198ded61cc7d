//! Prometheus registry adapter for the tally exporter.
//!
//! [`QueryMetrics`] owns a private [`prometheus::Registry`] holding exactly one
//! gauge family, labeled by query name and SQL text. Executors publish into it
//! with [`QueryMetrics::set_count`]; the HTTP layer renders it with
//! [`QueryMetrics::scrape`].
//!
//! ## Example
//! ```rust
//! use tally_prometheus::QueryMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = QueryMetrics::new()?;
//! metrics.set_count("users", "SELECT COUNT(*) FROM users", 42.0);
//!
//! let body = metrics.scrape()?;
//! let sample = r#"mysql_query_exporter{name="users",query="SELECT COUNT(*) FROM users"} 42"#;
//! assert!(body.contains(sample));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `mysql_query_exporter{name, query}` - Gauge, latest successful count
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`; see `tally-api`.

mod backend;
pub use backend::{METRIC_HELP, METRIC_NAME, MetricsError, QueryMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
