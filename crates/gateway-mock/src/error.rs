//! Error types for the mock gateway implementation.

use crate::Operation;

use scom_gateway::{GatewayError, GatewayErrorKind};
use thiserror::Error;

/// Error type for the mock gateway implementation.
#[derive(Debug, Error)]
pub enum Error {
    /// A failure queued with [`crate::MockGateway::fail_next`].
    #[error("Injected {kind} failure in {operation:?}")]
    Injected {
        /// The operation that failed.
        operation: Operation,
        /// The kind of failure.
        kind: GatewayErrorKind,
    },

    /// A series marked with [`crate::MockGateway::fail_series`] was read.
    #[error("Series values unavailable: {0}")]
    SeriesUnavailable(String),
}

impl GatewayError for Error {
    fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Injected { kind, .. } => *kind,
            Self::SeriesUnavailable(_) => GatewayErrorKind::Other,
        }
    }
}
