use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use evm_balance_exporter::{
    api, config::ExporterConfig, metrics::PrometheusSink, monitor::ExporterSupervisor,
    rpc::EvmRpcClient,
};

#[derive(Debug, Parser)]
#[command(
    name = "evm-balance-exporter",
    about = "Prometheus exporter for ERC-20 token balances across EVM networks"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "CONFIG_PATH", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = ExporterConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    info!(
        networks = config.networks.len(),
        port = config.port,
        "configuration loaded"
    );

    let sink = Arc::new(PrometheusSink::new().context("failed to build metrics registry")?);
    let supervisor = Arc::new(ExporterSupervisor::start(&config, sink.clone(), |target| {
        EvmRpcClient::new(&target.rpc_url)
            .map(Arc::new)
            .map_err(anyhow::Error::from)
    })?);

    let server = tokio::spawn(api::serve(config.port, supervisor.clone(), sink.clone()));

    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    supervisor.stop().await;
    server.abort();
    Ok(())
}
