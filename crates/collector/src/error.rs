use scom_gateway::{GatewayError, GatewayErrorKind};
use thiserror::Error;

/// Errors from topology refreshes and scrape cycles.
#[derive(Debug, Error)]
pub enum Error {
    /// The management server query failed.
    #[error("gateway error ({kind}): {message}")]
    Gateway {
        /// Kind of the underlying gateway error.
        kind: GatewayErrorKind,
        /// Rendered gateway error.
        message: String,
    },

    /// Internal metrics could not be registered.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    pub(crate) fn gateway<E>(error: E) -> Self
    where
        E: GatewayError,
    {
        Self::Gateway {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Errors returned when rendering an exposition.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Metric export is enabled but no scrape cycle has completed yet.
    #[error("metric collection has not been completed yet")]
    NotYetCollected,

    /// No monitoring group has the requested full name.
    #[error("no monitoring group found with full name '{0}'")]
    GroupNotFound(String),

    /// The group exists but its membership was not resolved.
    #[error("no monitoring objects found for group with full name '{0}'")]
    MembershipNotFound(String),

    /// The registry could not be encoded.
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    /// A gauge update pass did not complete.
    #[error("gauge update task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, Error>;
