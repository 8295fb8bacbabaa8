use std::error::Error;
use std::fmt::{self, Debug};

/// Marker trait for `ManagementGateway` errors
pub trait GatewayError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> GatewayErrorKind;
}

/// The kind of gateway error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GatewayErrorKind {
    /// The session with the management server was lost
    Disconnected,

    /// The requested object does not exist
    NotFound,

    /// Other/unknown error
    Other,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
