use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vdl_exporter::collectors::connections::ConnectionSource;
use vdl_exporter::collectors::Collector;
use vdl_exporter::{api, config};

/// Exports installed packages and open/authorized ports as Prometheus gauges.
#[derive(Parser, Debug)]
#[command(name = "vdl-exporter", version, about)]
struct Cli {
    /// Path to a TOML configuration file (optional).
    #[arg(short, long)]
    config: Option<String>,

    /// Address and port to listen on.
    #[arg(short, long)]
    listen: Option<String>,

    /// Seconds between two collection passes.
    #[arg(long)]
    scrape_interval_secs: Option<u64>,

    /// File listing package names to exclude, one per line.
    #[arg(long)]
    exclude_packages_file: Option<PathBuf>,

    /// Where open ports are read from.
    #[arg(long, value_enum)]
    connection_source: Option<ConnectionSource>,

    /// Fill the `interface` label of open ports.
    #[arg(long)]
    resolve_interfaces: bool,
}

impl Cli {
    /// Config file values, overridden by whatever was given on the command line.
    fn into_config(self) -> Result<config::ExporterConfig> {
        let mut cfg = match self.config {
            Some(ref path) => config::ExporterConfig::from_file(path)?,
            None => config::ExporterConfig::default(),
        };
        if let Some(listen) = self.listen {
            cfg.listen_address = listen;
        }
        if let Some(secs) = self.scrape_interval_secs {
            cfg.scrape_interval_secs = secs;
        }
        if let Some(path) = self.exclude_packages_file {
            cfg.exclude_packages_file = Some(path);
        }
        if let Some(source) = self.connection_source {
            cfg.connection_source = source;
        }
        cfg.resolve_interfaces |= self.resolve_interfaces;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vdl_exporter=info,tower_http=info".into()),
        )
        .init();

    let cfg = Cli::parse().into_config()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting vdl-exporter"
    );

    let exclude = cfg.load_exclusions()?;
    info!(
        listen = %cfg.listen_address,
        interval = cfg.scrape_interval_secs,
        excluded = exclude.len(),
        source = ?cfg.connection_source,
        "Configuration loaded"
    );

    let collector = Arc::new(Collector::from_config(&cfg, exclude)?);

    // Populate the gauges before the first scrape.
    if let Err(e) = collector.refresh().await {
        error!("Initial collection failed: {e}");
    }

    let cancel = CancellationToken::new();
    let periodic = collector.clone().start(
        Duration::from_secs(cfg.scrape_interval_secs),
        cancel.clone(),
    )?;

    let app = api::router(api::AppState::new(collector));
    let listener = tokio::net::TcpListener::bind(&cfg.listen_address).await?;
    info!(addr = %cfg.listen_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    periodic.await?;
    info!("Exporter stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, cancelling `cancel`.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown requested");
    cancel.cancel();
}
