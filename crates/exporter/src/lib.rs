//! HTTP front door of the SCOM exporter.
//!
//! `GET /metrics` renders the exporter's own metrics, `GET /metrics/{group}` renders the
//! cached SCOM metrics of one monitoring group, or of everything for `all`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{IntCounter, Registry, TEXT_FORMAT, register_int_counter_with_registry};
use scom_bootable::{BackgroundTasks, Bootable, BootableError};
use scom_collector::{ExportError, ScomCollector};
use scom_gateway::{ManagementGateway, TraversalDepth};
use serde::Deserialize;
use tracing::{Instrument, debug, info, info_span, warn};

/// Query string of a scrape request.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ScrapeQuery {
    /// Accepted for compatibility; membership is always resolved recursively.
    #[serde(default)]
    pub depth: TraversalDepth,
}

struct AppState<G>
where
    G: ManagementGateway,
{
    collector: ScomCollector<G>,
    requests: IntCounter,
}

impl<G> Clone for AppState<G>
where
    G: ManagementGateway,
{
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
            requests: self.requests.clone(),
        }
    }
}

/// Builds the scrape router and registers its request counter into `registry`.
///
/// # Errors
///
/// Returns an error if the counter is already registered.
pub fn router<G>(collector: ScomCollector<G>, registry: &Registry) -> Result<Router>
where
    G: ManagementGateway,
{
    let requests = register_int_counter_with_registry!(
        "process_scrape_request_count",
        "Total number of scrape requests",
        registry
    )?;

    Ok(Router::new()
        .route("/metrics", get(internal_metrics::<G>))
        .route("/metrics/{group}", get(group_metrics::<G>))
        .with_state(AppState {
            collector,
            requests,
        }))
}

async fn internal_metrics<G>(
    State(state): State<AppState<G>>,
    Query(query): Query<ScrapeQuery>,
) -> Response
where
    G: ManagementGateway,
{
    scrape(state, String::new(), query).await
}

async fn group_metrics<G>(
    State(state): State<AppState<G>>,
    Path(group): Path<String>,
    Query(query): Query<ScrapeQuery>,
) -> Response
where
    G: ManagementGateway,
{
    scrape(state, group, query).await
}

async fn scrape<G>(state: AppState<G>, group: String, query: ScrapeQuery) -> Response
where
    G: ManagementGateway,
{
    state.requests.inc();
    let span = info_span!("scrape", group = %group, depth = %query.depth);

    async move {
        match state.collector.export(&group).await {
            Ok(body) => {
                debug!("rendered {} bytes", body.len());
                ([(CONTENT_TYPE, TEXT_FORMAT)], body).into_response()
            }
            Err(e) => {
                warn!("scrape failed: {e}");
                (status_of(&e), e.to_string()).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// HTTP status of a failed export.
#[must_use]
pub const fn status_of(error: &ExportError) -> StatusCode {
    match error {
        ExportError::GroupNotFound(_) | ExportError::MembershipNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ExportError::NotYetCollected => StatusCode::SERVICE_UNAVAILABLE,
        ExportError::Encode(_) | ExportError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serves a router until shut down.
pub struct MetricsServer {
    listen_address: SocketAddr,
    router: Router,
    tasks: BackgroundTasks,
}

impl MetricsServer {
    /// Creates a server for `router`. Nothing is bound until started.
    #[must_use]
    pub fn new(listen_address: SocketAddr, router: Router) -> Self {
        Self {
            listen_address,
            router,
            tasks: BackgroundTasks::new(),
        }
    }
}

#[async_trait]
impl Bootable for MetricsServer {
    fn bootable_name(&self) -> &str {
        "MetricsServer"
    }

    async fn start(&self) -> std::result::Result<(), BootableError> {
        let listener = tokio::net::TcpListener::bind(self.listen_address)
            .await
            .map_err(|source| Error::Bind {
                address: self.listen_address,
                source,
            })?;
        info!("listening on http://{}/metrics", self.listen_address);

        let router = self.router.clone();
        self.tasks
            .spawn("http server", async move {
                if let Err(e) = axum::serve(listener, router).await {
                    warn!("http server exited: {e}");
                }
            })
            .await;

        Ok(())
    }

    async fn shutdown(&self) -> std::result::Result<(), BootableError> {
        info!("http server shutting down");
        self.tasks.shutdown().await;
        Ok(())
    }

    async fn wait(&self) {
        self.tasks.wait().await;
    }
}
