//! Topology cache, metric scrape loop and registry partitioner.
//!
//! A [`ScomCollector`] keeps two immutable snapshots, the management group topology and the
//! latest metrics, each replaced by a single pointer swap. Two background loops produce
//! them and share one gate so they never run at the same time. Readers never take the gate.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod metrics;
mod partition;
mod scrape;
mod topology;

pub use error::{Error, ExportError, Result};
pub use metrics::CollectorMetrics;
pub use partition::{ALL_PARTITION, Partitions, RegistryPartition, encode_registry};
pub use scrape::{
    InstanceHealth, LOOKBACK_SECONDS, MetricSeries, MetricsSnapshot, RequestWindow, monitor_help,
};
pub use topology::TopologySnapshot;

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use chrono::Utc;
use prometheus::Registry;
use scom_bootable::{BackgroundTasks, Bootable, BootableError};
use scom_config::{CounterMap, ExporterConfig, RuleFilter};
use scom_gateway::{ManagementGateway, Reconnecting};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Delay between the end of one topology refresh and the start of the next.
pub const TOPOLOGY_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Collector configuration.
#[derive(Clone, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct CollectorConfig {
    /// Which rules are collected.
    pub rule_filter: RuleFilter,
    /// Metric name overrides.
    pub counter_map: CounterMap,
    /// Scrape loop interval.
    pub scrape_interval: Duration,
    /// Topology refresh delay.
    pub refresh_interval: Duration,
    /// Whether performance metrics are collected.
    pub export_metrics: bool,
    /// Whether monitor states are collected.
    pub export_monitors: bool,
}

impl From<&ExporterConfig> for CollectorConfig {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            rule_filter: config.rule_filter.clone(),
            counter_map: config.counter_map.clone(),
            scrape_interval: config.scrape_interval,
            refresh_interval: TOPOLOGY_REFRESH_INTERVAL,
            export_metrics: config.export.metrics,
            export_monitors: config.export.monitors,
        }
    }
}

struct Inner<G>
where
    G: ManagementGateway,
{
    gateway: Arc<Reconnecting<G>>,
    config: CollectorConfig,
    topology: ArcSwap<TopologySnapshot>,
    snapshot: ArcSwapOption<MetricsSnapshot>,
    gate: Mutex<()>,
    partitions: Partitions,
    internal_registry: Registry,
    metrics: CollectorMetrics,
}

/// Caches the management group topology and its latest metrics, and renders them per group.
pub struct ScomCollector<G>
where
    G: ManagementGateway,
{
    inner: Arc<Inner<G>>,
    tasks: Arc<BackgroundTasks>,
}

impl<G> ScomCollector<G>
where
    G: ManagementGateway,
{
    /// Creates a collector and registers its internal metrics into `registry`.
    ///
    /// `registry` is also what an export without a group renders.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal metrics are already registered.
    pub fn new(
        gateway: Arc<Reconnecting<G>>,
        config: CollectorConfig,
        registry: &Registry,
    ) -> Result<Self> {
        info!(
            "creating collector for {} (scrape interval {:?}, refresh interval {:?})",
            gateway.management_group_name(),
            config.scrape_interval,
            config.refresh_interval
        );

        Ok(Self {
            inner: Arc::new(Inner {
                gateway,
                config,
                topology: ArcSwap::from_pointee(TopologySnapshot::default()),
                snapshot: ArcSwapOption::empty(),
                gate: Mutex::new(()),
                partitions: Partitions::new(),
                internal_registry: registry.clone(),
                metrics: CollectorMetrics::register(registry)?,
            }),
            tasks: Arc::new(BackgroundTasks::new()),
        })
    }

    /// The current topology snapshot.
    #[must_use]
    pub fn topology(&self) -> Arc<TopologySnapshot> {
        self.inner.topology.load_full()
    }

    /// The latest metrics snapshot, if a scrape cycle has completed.
    #[must_use]
    pub fn metrics_snapshot(&self) -> Option<Arc<MetricsSnapshot>> {
        self.inner.snapshot.load_full()
    }

    /// Refreshes the topology once. On failure the previous snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns the gateway error that aborted the refresh.
    pub async fn refresh_topology(&self) -> Result<()> {
        self.inner.refresh_topology().await
    }

    /// Runs one scrape cycle. On failure the previous snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns the gateway error that aborted the cycle.
    pub async fn scrape(&self) -> Result<()> {
        let _gate = self.inner.gate.lock().await;
        self.inner.scrape().await
    }

    /// Renders an exposition.
    ///
    /// An empty `group` renders the internal registry only. `"all"` (any case) renders every
    /// cached sample and state. Anything else is resolved to a root group by full name and
    /// renders that group's members only.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics have not been collected yet, the group is unknown, or the
    /// rendering fails.
    pub async fn export(&self, group: &str) -> std::result::Result<String, ExportError> {
        if group.is_empty() {
            return Ok(encode_registry(&self.inner.internal_registry)?);
        }

        let snapshot = match self.inner.snapshot.load_full() {
            Some(snapshot) => snapshot,
            None if self.inner.config.export_metrics => return Err(ExportError::NotYetCollected),
            None => Arc::new(MetricsSnapshot::default()),
        };

        let (partition, members) = if group.eq_ignore_ascii_case(ALL_PARTITION) {
            (self.inner.partitions.get_or_create(ALL_PARTITION), None)
        } else {
            let topology = self.inner.topology.load();
            let resolved = topology
                .group_by_name(group)
                .ok_or_else(|| ExportError::GroupNotFound(group.to_string()))?;
            let members = topology
                .group_membership
                .get(&resolved.id)
                .cloned()
                .ok_or_else(|| ExportError::MembershipNotFound(group.to_string()))?;

            (
                self.inner.partitions.get_or_create(&resolved.full_name),
                Some(members),
            )
        };

        let metric_pass = {
            let (inner, partition, snapshot, members) = (
                Arc::clone(&self.inner),
                Arc::clone(&partition),
                Arc::clone(&snapshot),
                members.clone(),
            );
            tokio::task::spawn_blocking(move || {
                partition.update_metrics(
                    &snapshot,
                    members.as_deref(),
                    &inner.config.counter_map,
                    inner.gateway.management_group_name(),
                );
            })
        };
        let monitor_pass = {
            let (inner, partition) = (Arc::clone(&self.inner), Arc::clone(&partition));
            tokio::task::spawn_blocking(move || {
                partition.update_monitors(
                    &snapshot,
                    members.as_deref(),
                    inner.gateway.management_group_name(),
                );
            })
        };
        tokio::try_join!(metric_pass, monitor_pass)?;

        Ok(partition.encode()?)
    }

    /// Number of registry partitions created so far, `"all"` included.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.inner.partitions.len()
    }
}

impl<G> Inner<G>
where
    G: ManagementGateway,
{
    async fn refresh_topology(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        let started = Instant::now();

        match TopologySnapshot::fetch(&self.gateway, &self.config.rule_filter).await {
            Ok(topology) => {
                self.metrics.rules.set(count(topology.rules.len()));
                self.metrics.classes.set(count(topology.classes.len()));
                self.metrics.instances.set(count(topology.instances.len()));
                self.metrics.groups.set(count(topology.groups.len()));
                self.metrics
                    .monitoring_objects
                    .set(count(topology.monitoring_object_count()));
                self.metrics.refreshes.inc();

                info!(
                    rules = topology.rules.len(),
                    classes = topology.classes.len(),
                    groups = topology.groups.len(),
                    instances = topology.instances.len(),
                    monitors = topology.monitors.len(),
                    "topology refreshed in {:?}",
                    started.elapsed()
                );
                self.topology.store(Arc::new(topology));
                Ok(())
            }
            Err(e) => {
                self.metrics.refresh_errors.inc();
                Err(Error::gateway(e))
            }
        }
    }

    /// Caller must hold the gate.
    async fn scrape(&self) -> Result<()> {
        let topology = self.topology.load_full();

        let (window, series) = if self.config.export_metrics {
            let (window, series) = scrape::collect_series(&self.gateway, &topology)
                .await
                .map_err(Error::gateway)?;
            (Some(window), series)
        } else {
            (None, Vec::new())
        };

        let health = if self.config.export_monitors {
            scrape::collect_health(&self.gateway, &topology)
                .await
                .map_err(Error::gateway)?
        } else {
            Vec::new()
        };

        debug!(
            series = series.len(),
            instances_with_health = health.len(),
            "scrape collected"
        );
        self.snapshot.store(Some(Arc::new(MetricsSnapshot {
            window,
            series,
            health,
            collected_at: Some(Utc::now()),
        })));

        Ok(())
    }

    async fn refresh_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(self.config.refresh_interval).await;

            if let Err(e) = self.refresh_topology().await {
                error!("error while retrieving SCOM configuration: {e}");
            }
        }
    }

    async fn scrape_loop(self: Arc<Self>) {
        let interval = self.config.scrape_interval;

        loop {
            let elapsed = {
                let _gate = self.gate.lock().await;
                let started = Instant::now();

                if let Err(e) = self.scrape().await {
                    error!("error while scraping: {e}");
                }

                started.elapsed()
            };

            self.metrics.scrape_duration.observe(elapsed.as_secs_f64());
            self.metrics.scrape_requests.inc();
            self.metrics.scrape_last.set(Utc::now().timestamp());

            if elapsed > interval {
                self.metrics.scrape_overlaps.inc();
                warn!(
                    "SCOM scrape duration is overlapping with scrape interval. Scrape duration: {:.3}s, Scrape interval: {:.3}s",
                    elapsed.as_secs_f64(),
                    interval.as_secs_f64()
                );
            }

            tokio::time::sleep(interval.saturating_sub(elapsed)).await;
        }
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl<G> Clone for ScomCollector<G>
where
    G: ManagementGateway,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<G> Debug for ScomCollector<G>
where
    G: ManagementGateway,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScomCollector")
            .field("management_group", &self.inner.gateway.management_group_name())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<G> Bootable for ScomCollector<G>
where
    G: ManagementGateway,
{
    fn bootable_name(&self) -> &str {
        "ScomCollector"
    }

    async fn start(&self) -> std::result::Result<(), BootableError> {
        info!("starting SCOM collector");

        if let Err(e) = self.inner.refresh_topology().await {
            error!("initial topology refresh failed, continuing with an empty topology: {e}");
        }

        self.tasks
            .spawn("topology refresh", Arc::clone(&self.inner).refresh_loop())
            .await;
        self.tasks
            .spawn("metric scrape", Arc::clone(&self.inner).scrape_loop())
            .await;

        Ok(())
    }

    async fn shutdown(&self) -> std::result::Result<(), BootableError> {
        info!("shutting down SCOM collector");
        self.tasks.shutdown().await;
        Ok(())
    }

    async fn wait(&self) {
        self.tasks.wait().await;
    }
}
