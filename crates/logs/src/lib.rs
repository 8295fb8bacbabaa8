//! Ships management server alerts and events to a Loki compatible endpoint.
//!
//! Every interval the [`LogShipper`] reads the bookmark, fetches the alerts raised and the
//! events generated since then, groups them into labelled streams and pushes them to a
//! [`LogSink`]. The bookmark is then moved to the current time whatever the outcome.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bookmark;
mod error;
mod metrics;
mod record;
mod sink;
mod stream;

pub use bookmark::BookmarkStore;
pub use error::{Error, Result};
pub use metrics::ShipperMetrics;
pub use record::{LogRecord, NULL_FIELD};
pub use sink::{LogSink, LokiSink, PUSH_PATH, gzip_json};
pub use stream::{
    LogEntry, LogStream, NO_DESCRIPTION, PushRequest, alert_streams, event_streams,
};

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use prometheus::Registry;
use scom_bootable::{BackgroundTasks, Bootable, BootableError};
use scom_config::ExporterConfig;
use scom_gateway::{Alert, Event, ManagementGateway, Reconnecting};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Log shipper configuration.
#[derive(Clone, Debug)]
pub struct ShipperConfig {
    /// Delay between cycles, and the lookback when there is no bookmark.
    pub interval: Duration,
    /// Whether alerts are shipped.
    pub alerts: bool,
    /// Whether events are shipped.
    pub events: bool,
}

impl ShipperConfig {
    /// Whether there is anything to ship at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.alerts || self.events
    }
}

impl From<&ExporterConfig> for ShipperConfig {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            interval: config.scrape_interval,
            alerts: config.export.alerts,
            events: config.export.events,
        }
    }
}

/// Outcome of one shipping cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Lower bound used for the queries.
    pub since: Option<DateTime<Utc>>,
    /// Streams built from the fetched records.
    pub streams: usize,
    /// Records fetched.
    pub entries: usize,
    /// Whether the sink accepted the push. `false` when nothing was pushed.
    pub pushed: bool,
    /// Bookmark stored at the end of the cycle.
    pub bookmark: Option<DateTime<Utc>>,
}

struct Inner<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    gateway: Arc<Reconnecting<G>>,
    sink: S,
    bookmark: BookmarkStore,
    config: ShipperConfig,
    metrics: ShipperMetrics,
}

/// Periodically ships alerts and events.
pub struct LogShipper<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    inner: Arc<Inner<G, S>>,
    tasks: Arc<BackgroundTasks>,
}

impl<G, S> LogShipper<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    /// Creates a shipper and registers its counters into `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the counters are already registered.
    pub fn new(
        gateway: Arc<Reconnecting<G>>,
        sink: S,
        bookmark: BookmarkStore,
        config: ShipperConfig,
        registry: &Registry,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                gateway,
                sink,
                bookmark,
                config,
                metrics: ShipperMetrics::register(registry)?,
            }),
            tasks: Arc::new(BackgroundTasks::new()),
        })
    }

    /// Runs one cycle. Never fails; problems are logged and reflected in the report.
    pub async fn run_cycle(&self) -> CycleReport {
        self.inner.run_cycle().await
    }
}

impl<G, S> Inner<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    async fn run_cycle(&self) -> CycleReport {
        let since = self
            .bookmark
            .load(self.config.interval)
            .await
            .trunc_subsecs(0);
        let mut report = CycleReport {
            since: Some(since),
            ..CycleReport::default()
        };

        let started = Instant::now();
        let fetched = tokio::try_join!(self.fetch_alerts(since), self.fetch_events(since));
        self.metrics
            .fetch_duration
            .set(started.elapsed().as_secs_f64() * 1000.0);

        match fetched {
            Ok((alerts, events)) => {
                debug!(
                    alerts = alerts.len(),
                    events = events.len(),
                    "fetched records since {since}"
                );
                let mut request = PushRequest {
                    streams: alert_streams(&alerts),
                };
                request.streams.extend(event_streams(&events));
                report.streams = request.streams.len();
                report.entries = request.entry_count();

                if !request.is_empty() {
                    let streams = u64::try_from(report.streams).unwrap_or(u64::MAX);
                    self.metrics.total.inc_by(streams);
                    self.metrics
                        .last_round
                        .set(i64::try_from(report.streams).unwrap_or(i64::MAX));

                    match self.sink.push(&request).await {
                        Ok(()) => {
                            report.pushed = true;
                            info!(
                                streams = report.streams,
                                entries = report.entries,
                                "pushed logs"
                            );
                        }
                        Err(e) => warn!("exception while pushing logs: {e}"),
                    }
                }
            }
            Err(e) => error!("error while fetching alerts and events: {e}"),
        }

        let now = Utc::now();
        match self.bookmark.save(now).await {
            Ok(()) => report.bookmark = Some(now),
            Err(e) => error!("unable to advance bookmark: {e}"),
        }

        report
    }

    async fn fetch_alerts(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        if !self.config.alerts {
            return Ok(Vec::new());
        }

        self.gateway
            .call(move |g| g.alerts_since(since))
            .await
            .map_err(Error::gateway)
    }

    async fn fetch_events(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        if !self.config.events {
            return Ok(Vec::new());
        }

        self.gateway
            .call(move |g| g.events_since(since))
            .await
            .map_err(Error::gateway)
    }

    async fn ship_loop(self: Arc<Self>) {
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.config.interval).await;
        }
    }
}

impl<G, S> Clone for LogShipper<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<G, S> Debug for LogShipper<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogShipper")
            .field("bookmark", &self.inner.bookmark)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<G, S> Bootable for LogShipper<G, S>
where
    G: ManagementGateway,
    S: LogSink,
{
    fn bootable_name(&self) -> &str {
        "LogShipper"
    }

    async fn start(&self) -> std::result::Result<(), BootableError> {
        if !self.inner.config.is_enabled() {
            info!("alert and event export are disabled, not shipping logs");
            return Ok(());
        }

        info!(
            "starting log shipper (alerts: {}, events: {}, bookmark: {})",
            self.inner.config.alerts,
            self.inner.config.events,
            self.inner.bookmark.path().display()
        );
        self.tasks
            .spawn("log shipping", Arc::clone(&self.inner).ship_loop())
            .await;

        Ok(())
    }

    async fn shutdown(&self) -> std::result::Result<(), BootableError> {
        info!("shutting down log shipper");
        self.tasks.shutdown().await;
        Ok(())
    }

    async fn wait(&self) {
        self.tasks.wait().await;
    }
}
