//! Exports SCOM performance data and monitor health as Prometheus metrics, and ships alerts
//! and events to Loki.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures::future::select_all;
use scom_bootable::Bootable;
use scom_collector::{CollectorConfig, ScomCollector};
use scom_config::ExporterConfig;
use scom_exporter::{Error, MetricsServer, Result, router};
use scom_gateway::{ManagementGateway, Reconnecting};
use scom_gateway_http::HttpGateway;
use scom_logs::{BookmarkStore, LogShipper, LokiSink, ShipperConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the settings file
    #[arg(long, env = "SCOM_EXPORTER_CONFIG", default_value = "appsettings.json")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt().with_env_filter(filter).finish(),
    )?;

    info!("loading settings from {}", args.config.display());
    let config = ExporterConfig::load(&args.config)?;

    let gateway = Arc::new(Reconnecting::new(
        HttpGateway::connect(&config.connection).await?,
    ));
    info!(
        "exporting management group {}",
        gateway.inner().management_group_name()
    );

    // The process collector lives in the default registry.
    let registry = prometheus::default_registry();

    let collector = ScomCollector::new(
        Arc::clone(&gateway),
        CollectorConfig::from(&config),
        registry,
    )?;
    let server = MetricsServer::new(config.listen_address, router(collector.clone(), registry)?);

    let mut services: Vec<Box<dyn Bootable>> = vec![Box::new(collector), Box::new(server)];

    let shipper_config = ShipperConfig::from(&config);
    if shipper_config.is_enabled() {
        let sink = LokiSink::new(&config.loki_endpoint, registry)?;
        services.push(Box::new(LogShipper::new(
            gateway,
            sink,
            BookmarkStore::new(&config.bookmark_path),
            shipper_config,
            registry,
        )?));
    } else {
        info!("alert and event export disabled");
    }

    for service in &services {
        service.start().await.map_err(|source| Error::Bootable {
            name: service.bootable_name().to_string(),
            source,
        })?;
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
        _ = select_all(services.iter().map(|service| service.wait())) => {
            error!("a service exited unexpectedly, shutting down");
        }
    }

    for service in services.iter().rev() {
        if let Err(e) = service.shutdown().await {
            error!("{} failed to shut down: {e}", service.bootable_name());
        }
    }

    Ok(())
}
