use crate::topology::TopologySnapshot;

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::{StreamExt, stream};
use indexmap::IndexMap;
use scom_gateway::{
    Class, ClassId, HealthState, Instance, InstanceId, ManagementGateway, Monitor, MonitorId,
    PerformanceSample, Reconnecting, Rule, RuleId,
};
use tracing::{debug, warn};

/// How far back performance values are read, in seconds, regardless of the scrape interval.
pub const LOOKBACK_SECONDS: i64 = 10_000;

const VALUE_FETCH_CONCURRENCY: usize = 32;

const MONITOR_STATE_LEGEND: &str = "(0=UNINITIALIZED, 1=HEALTHY, 2=WARNING, 3=ERROR)";

/// The time range performance values were read from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestWindow {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Inclusive end.
    pub end: DateTime<Utc>,
}

impl RequestWindow {
    fn ending_now() -> Self {
        let end = Utc::now();
        Self {
            start: end - ChronoDuration::seconds(LOOKBACK_SECONDS),
            end,
        }
    }
}

/// The latest samples of every series collected by one rule for one class.
#[derive(Clone, Debug)]
pub struct MetricSeries {
    /// The collecting rule.
    pub rule: Rule,
    /// The class the rule targets.
    pub class: Class,
    /// One sample per series, latest in the window.
    pub samples: Vec<PerformanceSample>,
}

impl MetricSeries {
    /// Canonical metric name, derived from the class and the first sample's counter.
    #[must_use]
    pub fn metric_name(&self) -> Option<String> {
        self.samples
            .first()
            .map(|sample| scom_naming::metric_name(&self.class.name, &sample.metadata()))
    }

    /// Help text: the rule description on one line, or the rule name.
    #[must_use]
    pub fn help(&self) -> String {
        self.rule
            .description
            .as_deref()
            .map(fold_lines)
            .filter(|help| !help.trim().is_empty())
            .unwrap_or_else(|| self.rule.name.clone())
    }
}

/// Monitor states of one instance.
#[derive(Clone, Debug)]
pub struct InstanceHealth {
    /// The instance.
    pub instance: Instance,
    /// State of every known monitor that reported on the instance.
    pub states: Vec<(Monitor, HealthState)>,
}

/// Result of one scrape cycle. Replaced as a whole, never modified.
#[derive(Clone, Debug, Default)]
pub struct MetricsSnapshot {
    /// Performance value window; `None` when metric export is disabled.
    pub window: Option<RequestWindow>,
    /// Samples grouped by rule and class.
    pub series: Vec<MetricSeries>,
    /// Monitor states; empty when monitor export is disabled.
    pub health: Vec<InstanceHealth>,
    /// When the cycle finished.
    pub collected_at: Option<DateTime<Utc>>,
}

/// Help text of a monitor state gauge.
#[must_use]
pub fn monitor_help(monitor: &Monitor) -> String {
    let description = monitor
        .description
        .as_deref()
        .map(fold_lines)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| monitor.name.clone());

    format!("{description} {MONITOR_STATE_LEGEND}")
}

fn fold_lines(text: &str) -> String {
    text.replace("\r\n", " ").replace('\n', " ")
}

pub(crate) async fn collect_series<G>(
    gateway: &Reconnecting<G>,
    topology: &TopologySnapshot,
) -> Result<(RequestWindow, Vec<MetricSeries>), G::Error>
where
    G: ManagementGateway,
{
    let window = RequestWindow::ending_now();
    let rule_ids: Vec<RuleId> = topology.rules.keys().copied().collect();
    if rule_ids.is_empty() {
        return Ok((window, Vec::new()));
    }

    let rule_ids = rule_ids.as_slice();
    let all_series = gateway.call(move |g| g.performance_series(rule_ids)).await?;
    debug!("reading values of {} performance series", all_series.len());

    let samples: Vec<PerformanceSample> = stream::iter(all_series)
        .map(|series| async move {
            let values = {
                let series = &series;
                gateway
                    .call(move |g| g.performance_values(series, window.start, window.end))
                    .await
            };

            match values {
                Ok(values) => values
                    .into_iter()
                    .max_by_key(|value| value.time_sampled)
                    .map(|value| PerformanceSample { series, value }),
                Err(e) => {
                    warn!("skipping series {} ({}): {e}", series.id, series.counter_name);
                    None
                }
            }
        })
        .buffered(VALUE_FETCH_CONCURRENCY)
        .filter_map(|sample| async move { sample })
        .collect()
        .await;

    let mut grouped: IndexMap<(RuleId, ClassId), MetricSeries> = IndexMap::new();
    for sample in samples {
        let Some(rule) = topology.rules.get(&sample.series.rule_id) else {
            debug!("series {} has no known rule", sample.series.id);
            continue;
        };
        let Some(class) = topology.classes.get(&rule.target_class_id) else {
            debug!("rule {} targets an unknown class", rule.name);
            continue;
        };

        grouped
            .entry((rule.id, class.id))
            .or_insert_with(|| MetricSeries {
                rule: rule.clone(),
                class: class.clone(),
                samples: Vec::new(),
            })
            .samples
            .push(sample);
    }

    Ok((window, grouped.into_values().collect()))
}

pub(crate) async fn collect_health<G>(
    gateway: &Reconnecting<G>,
    topology: &TopologySnapshot,
) -> Result<Vec<InstanceHealth>, G::Error>
where
    G: ManagementGateway,
{
    let instance_ids: Vec<InstanceId> = topology.instances.keys().copied().collect();
    let monitor_ids: Vec<MonitorId> = topology.monitors.keys().copied().collect();
    if instance_ids.is_empty() || monitor_ids.is_empty() {
        return Ok(Vec::new());
    }

    let (instance_ids, monitor_ids) = (instance_ids.as_slice(), monitor_ids.as_slice());
    let states = gateway
        .call(move |g| g.monitor_states(instance_ids, monitor_ids))
        .await?;

    let mut by_instance: IndexMap<InstanceId, Vec<(Monitor, HealthState)>> = IndexMap::new();
    let mut unknown_monitors: HashMap<MonitorId, usize> = HashMap::new();
    for state in states {
        match topology.monitors.get(&state.monitor_id) {
            Some(monitor) => by_instance
                .entry(state.instance_id)
                .or_default()
                .push((monitor.clone(), state.health_state)),
            None => *unknown_monitors.entry(state.monitor_id).or_default() += 1,
        }
    }
    if !unknown_monitors.is_empty() {
        debug!("ignored states of {} unknown monitors", unknown_monitors.len());
    }

    Ok(by_instance
        .into_iter()
        .filter_map(|(instance_id, states)| {
            topology
                .instances
                .get(&instance_id)
                .map(|instance| InstanceHealth {
                    instance: instance.clone(),
                    states,
                })
        })
        .collect())
}
