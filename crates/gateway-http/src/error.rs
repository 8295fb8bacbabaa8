use reqwest::StatusCode;
use scom_gateway::{GatewayError, GatewayErrorKind};
use thiserror::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`crate::HttpGateway`].
#[derive(Debug, Error)]
pub enum Error {
    /// The management server could not be reached or did not answer in time.
    #[error("management server unreachable: {0}")]
    Unreachable(reqwest::Error),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    /// The response body could not be decoded.
    #[error("invalid response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// The underlying error.
        source: reqwest::Error,
    },

    /// The management server address is not usable.
    #[error("invalid management server address {address}: {source}")]
    InvalidAddress {
        /// Configured address.
        address: String,
        /// The underlying error.
        source: url::ParseError,
    },

    /// The management server answered with an error status.
    #[error("{url} returned {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: StatusCode,
    },
}

impl GatewayError for Error {
    fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::Unreachable(_) => GatewayErrorKind::Disconnected,
            Self::Status { status, .. } if *status == StatusCode::NOT_FOUND => {
                GatewayErrorKind::NotFound
            }
            Self::Status { status, .. }
                if *status == StatusCode::SERVICE_UNAVAILABLE
                    || *status == StatusCode::UNAUTHORIZED =>
            {
                GatewayErrorKind::Disconnected
            }
            _ => GatewayErrorKind::Other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            Self::Unreachable(e)
        } else {
            let url = e.url().map(ToString::to_string).unwrap_or_default();
            Self::Decode { url, source: e }
        }
    }
}
