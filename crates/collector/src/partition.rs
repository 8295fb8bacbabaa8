use crate::scrape::{MetricsSnapshot, monitor_help};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use scom_config::CounterMap;
use scom_gateway::InstanceId;
use scom_naming::sanitize_metric_name;
use tracing::{debug, warn};

/// Key of the partition that exports every instance.
pub const ALL_PARTITION: &str = "all";

const METRIC_LABELS: &[&str] = &["instance_path", "tag"];
const MONITOR_LABELS: &[&str] = &["instance_path"];

/// An isolated registry plus the gauges created in it so far.
///
/// Gauges are created on first use and kept for the lifetime of the process. A name whose
/// registration failed is remembered so the failure is only logged once.
pub struct RegistryPartition {
    name: String,
    registry: Registry,
    metric_gauges: Mutex<HashMap<String, Option<GaugeVec>>>,
    monitor_gauges: Mutex<HashMap<String, Option<GaugeVec>>>,
}

impl RegistryPartition {
    fn new(name: &str) -> Self {
        debug!("creating registry partition {name}");
        Self {
            name: name.to_string(),
            registry: Registry::new(),
            metric_gauges: Mutex::new(HashMap::new()),
            monitor_gauges: Mutex::new(HashMap::new()),
        }
    }

    /// Partition key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Updates one gauge per series from the snapshot's samples.
    ///
    /// Only samples whose instance is in `members` are applied, unless `members` is `None`.
    pub fn update_metrics(
        &self,
        snapshot: &MetricsSnapshot,
        members: Option<&HashSet<InstanceId>>,
        counter_map: &CounterMap,
        management_group: &str,
    ) {
        let mut gauges = self.metric_gauges.lock();

        for series in &snapshot.series {
            let samples: Vec<_> = series
                .samples
                .iter()
                .filter(|sample| members.is_none_or(|m| m.contains(&sample.series.instance_id)))
                .collect();
            if samples.is_empty() {
                continue;
            }
            let Some(canonical) = series.metric_name() else {
                continue;
            };

            let gauge = gauges.entry(canonical).or_insert_with_key(|canonical| {
                let name = counter_map
                    .get(&series.rule.name)
                    .unwrap_or(canonical.as_str());
                self.register_gauge(name, &series.help(), METRIC_LABELS)
            });
            let Some(gauge) = gauge else {
                continue;
            };

            for sample in samples {
                let Some(value) = sample.value.sample_value else {
                    continue;
                };
                let instance_path = sample.series.instance_path.as_ref().map_or_else(
                    || management_group.to_string(),
                    |path| format!("{path}/{}", sample.series.instance_display_name),
                );
                gauge
                    .with_label_values(&[instance_path.as_str(), sample.series.instance_name.as_str()])
                    .set(value);
            }
        }
    }

    /// Updates one gauge per monitor from the snapshot's health states.
    ///
    /// Only instances in `members` are applied, unless `members` is `None`.
    pub fn update_monitors(
        &self,
        snapshot: &MetricsSnapshot,
        members: Option<&HashSet<InstanceId>>,
        management_group: &str,
    ) {
        let mut gauges = self.monitor_gauges.lock();

        for health in snapshot
            .health
            .iter()
            .filter(|health| members.is_none_or(|m| m.contains(&health.instance.id)))
        {
            let instance_path = health.instance.path.as_deref().unwrap_or(management_group);

            for (monitor, state) in &health.states {
                let name = sanitize_metric_name(&format!("scom_monitor_{}_state", monitor.name));
                let gauge = gauges.entry(name).or_insert_with_key(|name| {
                    self.register_gauge(name, &monitor_help(monitor), MONITOR_LABELS)
                });
                if let Some(gauge) = gauge {
                    gauge
                        .with_label_values(&[instance_path])
                        .set(f64::from(state.value()));
                }
            }
        }
    }

    /// Renders the partition in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> prometheus::Result<String> {
        encode_registry(&self.registry)
    }

    fn register_gauge(&self, name: &str, help: &str, labels: &[&str]) -> Option<GaugeVec> {
        GaugeVec::new(Opts::new(name, help), labels)
            .and_then(|gauge| {
                self.registry.register(Box::new(gauge.clone()))?;
                Ok(gauge)
            })
            .inspect_err(|e| {
                warn!("unable to create gauge {name} in partition {}: {e}", self.name);
            })
            .ok()
    }
}

/// Renders a registry in the text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_registry(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Lazily created registry partitions, keyed by `"all"` or a group's full name.
pub struct Partitions {
    partitions: Mutex<HashMap<String, Arc<RegistryPartition>>>,
}

impl Partitions {
    /// Creates the set with the `"all"` partition in place.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: Mutex::new(HashMap::from([(
                ALL_PARTITION.to_string(),
                Arc::new(RegistryPartition::new(ALL_PARTITION)),
            )])),
        }
    }

    /// Returns the partition for `key`, creating it on first use.
    pub fn get_or_create(&self, key: &str) -> Arc<RegistryPartition> {
        Arc::clone(
            self.partitions
                .lock()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(RegistryPartition::new(key))),
        )
    }

    /// Number of partitions created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.lock().len()
    }

    /// Always false; the `"all"` partition exists from the start.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.lock().is_empty()
    }
}

impl Default for Partitions {
    fn default() -> Self {
        Self::new()
    }
}
