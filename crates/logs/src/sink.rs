use crate::error::{Error, Result};
use crate::metrics::register_push_counter;
use crate::stream::PushRequest;

use std::io::Write;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use prometheus::{IntCounterVec, Registry};
use reqwest::Client;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tracing::debug;
use url::Url;

/// Path of the push API below the configured endpoint.
pub const PUSH_PATH: &str = "loki/api/v1/push";

const MAX_LOGGED_BODY: usize = 512;

/// Destination of shipped log streams.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    /// Pushes one request.
    async fn push(&self, request: &PushRequest) -> Result<()>;
}

/// Pushes streams to a Loki compatible endpoint as gzip compressed JSON.
#[derive(Clone, Debug)]
pub struct LokiSink {
    client: Client,
    push_url: Url,
    responses: IntCounterVec,
}

impl LokiSink {
    /// Creates a sink for `endpoint` and registers its response counter into `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the push URL cannot be derived or the counter is already
    /// registered.
    pub fn new(endpoint: &Url, registry: &Registry) -> Result<Self> {
        let mut base = endpoint.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let push_url = base.join(PUSH_PATH).map_err(Error::InvalidEndpoint)?;

        Ok(Self {
            client: Client::new(),
            push_url,
            responses: register_push_counter(registry)?,
        })
    }

    /// Where requests are posted.
    #[must_use]
    pub const fn push_url(&self) -> &Url {
        &self.push_url
    }
}

#[async_trait]
impl LogSink for LokiSink {
    async fn push(&self, request: &PushRequest) -> Result<()> {
        let body = gzip_json(request)?;
        debug!(
            "pushing {} entries ({} bytes) to {}",
            request.entry_count(),
            body.len(),
            self.push_url
        );

        let response = match self
            .client
            .post(self.push_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.responses.with_label_values(&["unknown"]).inc();
                return Err(e.into());
            }
        };

        let status = response.status();
        self.responses.with_label_values(&[status.as_str()]).inc();

        if status.is_success() {
            return Ok(());
        }

        let mut body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read response content".to_string());
        if let Some((cut, _)) = body.char_indices().nth(MAX_LOGGED_BODY) {
            body.truncate(cut);
        }

        Err(Error::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Serializes `value` as JSON and gzips it.
///
/// # Errors
///
/// Returns an error if serialization or compression fails.
pub fn gzip_json(value: &impl serde::Serialize) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(Error::Compress)?;
    encoder.finish().map_err(Error::Compress)
}
