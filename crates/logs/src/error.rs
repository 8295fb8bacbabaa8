use std::path::PathBuf;

use scom_gateway::GatewayErrorKind;
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while shipping logs.
#[derive(Debug, Error)]
pub enum Error {
    /// The bookmark file could not be read or written.
    #[error("bookmark file {path}: {source}")]
    Bookmark {
        /// Path of the bookmark file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The push body could not be compressed.
    #[error("failed to compress push body: {0}")]
    Compress(std::io::Error),

    /// The push body could not be serialized.
    #[error("failed to serialize push body: {0}")]
    Encode(#[from] serde_json::Error),

    /// Alerts or events could not be read from the management server.
    #[error("{kind} gateway error: {message}")]
    Gateway {
        /// Kind reported by the gateway.
        kind: GatewayErrorKind,
        /// Rendered gateway error.
        message: String,
    },

    /// The push request did not get a response.
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The push URL could not be derived from the endpoint.
    #[error("invalid log endpoint: {0}")]
    InvalidEndpoint(url::ParseError),

    /// A metric could not be registered.
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// The log endpoint answered with a non-success status.
    #[error("push rejected with status {status}: {body}")]
    Rejected {
        /// Response status.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
}

impl Error {
    pub(crate) fn gateway<E: scom_gateway::GatewayError>(e: E) -> Self {
        Self::Gateway {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}
