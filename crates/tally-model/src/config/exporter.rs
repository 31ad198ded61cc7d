use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::{ConnectionParameters, QuerySpec, Secret};
use crate::error::ConfigError;

/// Fully loaded and validated exporter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Listen address of the metrics endpoint (default `0.0.0.0`).
    pub exporter_host: String,
    /// TCP port of the metrics endpoint.
    pub exporter_port: u16,
    pub connection: ConnectionParameters,
    /// Queries in document order.
    pub queries: Vec<QuerySpec>,
    /// Upper bound on HTTP drain and loop wind-down at shutdown.
    pub shutdown_grace: Duration,
}

impl ExporterConfig {
    /// `host:port` the metrics endpoint binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.exporter_host, self.exporter_port)
    }
}

/// On-disk document shape.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    exporter_port: u16,
    #[serde(default = "default_exporter_host")]
    exporter_host: String,

    db_host: String,
    db_port: u16,
    db_user: String,
    db_password: String,

    queries: Vec<RawQuery>,

    #[serde(default = "default_shutdown_grace_secs")]
    shutdown_grace_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuery {
    name: String,
    database: String,
    query: String,
    /// Bare integers are seconds; strings use humantime syntax (`30s`, `1m 30s`).
    #[serde(deserialize_with = "deserialize_interval")]
    interval: Duration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInterval {
    Seconds(u64),
    Human(#[serde(with = "humantime_serde")] Duration),
}

fn deserialize_interval<'de, D>(de: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match RawInterval::deserialize(de)? {
        RawInterval::Seconds(secs) => Duration::from_secs(secs),
        RawInterval::Human(d) => d,
    })
}

fn default_exporter_host() -> String {
    "0.0.0.0".into()
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl RawConfig {
    /// Validate and convert into the in-memory model.
    pub(crate) fn into_config(self) -> Result<ExporterConfig, ConfigError> {
        self.validate()?;

        let queries = self
            .queries
            .into_iter()
            .map(|q| QuerySpec {
                name: q.name,
                database: q.database,
                query: q.query,
                interval: q.interval,
            })
            .collect();

        Ok(ExporterConfig {
            exporter_host: self.exporter_host,
            exporter_port: self.exporter_port,
            connection: ConnectionParameters {
                host: self.db_host,
                port: self.db_port,
                user: self.db_user,
                password: Secret::new(self.db_password),
            },
            queries,
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.exporter_port == 0 {
            return Err(ConfigError::Invalid(
                "exporter_port must be between 1 and 65535".into(),
            ));
        }
        if self.db_port == 0 {
            return Err(ConfigError::Invalid(
                "db_port must be between 1 and 65535".into(),
            ));
        }
        if self.db_host.trim().is_empty() {
            return Err(ConfigError::Invalid("db_host must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for (idx, q) in self.queries.iter().enumerate() {
            if q.interval.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "queries[{idx}] ({}): interval must be positive",
                    q.name
                )));
            }
            if q.query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "queries[{idx}] ({}): query must not be empty",
                    q.name
                )));
            }
            if !seen.insert(q.name.as_str()) {
                warn!(
                    query_name = %q.name,
                    "duplicate query name; samples are still distinguished by query text"
                );
            }
        }
        Ok(())
    }
}
