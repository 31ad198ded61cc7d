mod connection;
mod exporter;
mod query;

use std::fs;
use std::path::Path;

pub use connection::{ConnectionParameters, Secret};
pub use exporter::ExporterConfig;
pub use query::QuerySpec;

use crate::error::ConfigError;
use exporter::RawConfig;

/// Path used when the operator does not pass one.
pub const DEFAULT_CONFIG_PATH: &str = "query_config.yaml";

/// Read, parse and validate the config file at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<ExporterConfig, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&s)
}

/// Parse and validate an in-memory config document.
pub fn load_from_str(s: &str) -> Result<ExporterConfig, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(s)?;
    raw.into_config()
}
