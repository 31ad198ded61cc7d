//! Configuration model for the tally exporter.
//!
//! The exporter is driven by a single YAML document loaded once at startup:
//! database connection parameters shared by every query, and the list of
//! [`QuerySpec`]s that each get their own scheduled loop.
//!
//! ```rust
//! use tally_model::load_from_str;
//!
//! let cfg = load_from_str(
//!     r#"
//! exporter_port: 9104
//! db_host: db.internal
//! db_port: 3306
//! db_user: exporter
//! db_password: hunter2
//! queries:
//!   - name: pending_orders
//!     database: shop
//!     query: SELECT COUNT(*) FROM orders WHERE state = 'pending'
//!     interval: 30
//! "#,
//! )
//! .unwrap();
//! assert_eq!(cfg.queries.len(), 1);
//! ```
mod config;
pub use config::{
    ConnectionParameters, DEFAULT_CONFIG_PATH, ExporterConfig, QuerySpec, Secret, load,
    load_from_str,
};

mod error;
pub use error::ConfigError;
