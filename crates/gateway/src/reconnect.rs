use crate::{GatewayError, GatewayErrorKind, ManagementGateway};

use std::future::Future;

use tracing::{info, warn};

/// Wraps a gateway so every call survives one dropped session.
///
/// A call that fails with [`GatewayErrorKind::Disconnected`] triggers a single reconnect
/// followed by a single retry. Any other failure, a failed reconnect or a second
/// disconnect is returned to the caller unchanged.
#[derive(Debug)]
pub struct Reconnecting<G>
where
    G: ManagementGateway,
{
    inner: G,
}

impl<G> Reconnecting<G>
where
    G: ManagementGateway,
{
    /// Wraps `inner`.
    pub const fn new(inner: G) -> Self {
        Self { inner }
    }

    /// The wrapped gateway.
    pub const fn inner(&self) -> &G {
        &self.inner
    }

    /// Name of the management group the wrapped gateway is connected to.
    pub fn management_group_name(&self) -> &str {
        self.inner.management_group_name()
    }

    /// Runs `operation` against the wrapped gateway, reconnecting and retrying once on a
    /// disconnect.
    ///
    /// # Errors
    ///
    /// Returns the error of the retry, of the reconnect, or of the first attempt when it was
    /// not a disconnect.
    pub async fn call<'a, T, F, Fut>(&'a self, operation: F) -> Result<T, G::Error>
    where
        F: Fn(&'a G) -> Fut,
        Fut: Future<Output = Result<T, G::Error>>,
    {
        match operation(&self.inner).await {
            Err(e) if e.kind() == GatewayErrorKind::Disconnected => {
                warn!("management server session lost ({e}), reconnecting");
                self.inner.reconnect().await?;
                info!("reconnected to management server, retrying call");
                operation(&self.inner).await
            }
            result => result,
        }
    }
}
