//! OTC Signal Engine Entry Point

use anyhow::{Context, Result};
use otc_signals::{EngineConfig, InstrumentWorker, LogAlertSink, SyntheticFeed};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting OTC multi-timeframe signal engine");

    let config = load_config().context("failed to load engine configuration")?;
    config
        .validate()
        .context("engine configuration is invalid")?;

    info!(
        instruments = config.instruments.len(),
        threshold = config.scoring.signal_threshold,
        "configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(config.instruments.len());
    for instrument in &config.instruments {
        let feed = SyntheticFeed::new(
            config.role_timeframes().to_vec(),
            config.market.poll_interval_secs,
        );
        let sink = LogAlertSink::new(config.scoring.max_alert_reasons);
        let worker = InstrumentWorker::new(instrument.clone(), config.clone(), feed, sink);
        handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    }

    info!("signal engine running, press Ctrl+C to stop");

    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down signal engine");
    shutdown_tx
        .send(true)
        .context("failed to broadcast shutdown")?;

    for handle in handles {
        handle.await.context("worker task panicked")?;
    }

    info!("all workers stopped");
    Ok(())
}

fn load_config() -> Result<EngineConfig> {
    match std::env::var("OTC_SIGNALS_CONFIG") {
        Ok(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("failed to load config file {path}")),
        Err(_) => Ok(EngineConfig::from_env()),
    }
}
