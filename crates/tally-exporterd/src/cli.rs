use std::path::PathBuf;

use clap::Parser;
use tally_model::DEFAULT_CONFIG_PATH;
use tally_observe::LoggerFormat;

/// Publishes scheduled SQL count queries as Prometheus gauges.
#[derive(Debug, Parser)]
#[command(name = "tally-exporterd", version, about)]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short = 'c', long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log filter directives (e.g. `info`, `debug,sqlx=warn`).
    #[arg(long, env = "TALLY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: text, json or journald.
    #[arg(long, env = "TALLY_LOG_FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,
}

/// Accept the single-dash long form (`-config path`, `-config=path`).
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            if arg == "-config" || arg.starts_with("-config=") {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}
