use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tally_core::MySqlConnector;
use tally_exporterd::{Args, Exporter, cancel_on_signal, normalize_args};
use tally_observe::{LoggerConfig, logger_init};

fn main() -> anyhow::Result<()> {
    let args = Args::parse_from(normalize_args(std::env::args()));

    // 1) Logger, while still single-threaded so the local UTC offset resolves
    let log_cfg = LoggerConfig::new(args.log_format, args.log_level.clone());
    logger_init(&log_cfg)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime
        .block_on(run(args))
        .inspect_err(|e| error!("{e:#}"))
}

async fn run(args: Args) -> anyhow::Result<()> {
    // 2) Config
    let path = args.config.display().to_string();
    info!(path = %path, "loading configuration");
    let config = tally_model::load(&args.config)
        .with_context(|| format!("failed to load configuration from {path}"))?;
    info!(
        queries = config.queries.len(),
        port = config.exporter_port,
        "configuration loaded"
    );

    // 3) Bind endpoint and wire the pipeline
    let exporter = Exporter::bind(config, MySqlConnector::new())
        .await
        .context("failed to start metrics endpoint")?;

    // 4) Signals -> cancellation
    let cancel = CancellationToken::new();
    let signals = cancel_on_signal(cancel.clone());

    // 5) Serve until cancelled
    exporter.run(cancel).await?;
    signals.abort();

    info!("exiting");
    Ok(())
}
