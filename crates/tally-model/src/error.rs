use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn is_io(&self) -> bool {
        matches!(self, ConfigError::Io { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, ConfigError::Parse(_))
    }
}
