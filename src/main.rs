use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use gameres_gate::config::GateConfig;
use gameres_gate::logging_layer;
use gameres_gate::supervisor::Supervisor;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = GateConfig::parse();
    logging_layer::init(config.log_format);

    // Single provider for every TLS client in the process.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, shutting down"),
            Err(e) => tracing::warn!(error = %e, "cannot listen for interrupt, shutting down"),
        }
        signal.cancel();
    });

    Supervisor::new(config)
        .run(shutdown)
        .await
        .context("gate failed")?;
    Ok(())
}
