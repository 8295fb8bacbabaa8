use std::net::SocketAddr;

use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the exporter from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// The listen address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Listen address.
        address: SocketAddr,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A service failed to start or stop.
    #[error("{name}: {source}")]
    Bootable {
        /// Service name.
        name: String,
        /// The underlying error.
        source: scom_bootable::BootableError,
    },

    /// The collector could not be created.
    #[error(transparent)]
    Collector(#[from] scom_collector::Error),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] scom_config::Error),

    /// The management server could not be reached.
    #[error(transparent)]
    Gateway(#[from] scom_gateway_http::Error),

    /// The log shipper could not be created.
    #[error(transparent)]
    Logs(#[from] scom_logs::Error),

    /// A metric could not be registered.
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// Could not set global default subscriber.
    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::subscriber::SetGlobalDefaultError),
}
