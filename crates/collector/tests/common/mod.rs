#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use prometheus::Registry;
use scom_collector::{CollectorConfig, ScomCollector};
use scom_config::{CounterMap, RuleFilter};
use scom_gateway::{
    Class, ClassId, Group, GroupId, HealthState, Instance, InstanceId, Monitor, MonitorId,
    MonitorState, PerformanceSeries, PerformanceValue, Reconnecting, Rule, RuleCategory, RuleId,
    SeriesId,
};
use scom_gateway_mock::MockGateway;

pub const MANAGEMENT_GROUP: &str = "MG01";

/// A small management group: one disk class with three disks, one performance rule, one
/// monitor and a group holding the first two disks.
pub struct Fixture {
    pub class: Class,
    pub rule: Rule,
    pub disks: Vec<Instance>,
    pub series: Vec<PerformanceSeries>,
    pub monitor: Monitor,
    pub group: Group,
}

impl Fixture {
    pub fn new() -> Self {
        let class = Class {
            id: ClassId::new_v4(),
            name: "Contoso.LogicalDisk".to_string(),
            display_name: "Logical disk".to_string(),
        };
        let rule = perf_rule("Contoso.Disk.FreeSpace", class.id);
        let disks: Vec<Instance> = ["srv01", "srv02", "srv03"]
            .iter()
            .map(|server| Instance {
                id: InstanceId::new_v4(),
                path: Some((*server).to_string()),
                display_name: "C:".to_string(),
                full_name: format!("Contoso.LogicalDisk:{server};C:"),
            })
            .collect();
        let series = disks
            .iter()
            .map(|disk| PerformanceSeries {
                id: SeriesId::new_v4(),
                rule_id: rule.id,
                instance_id: disk.id,
                counter_name: "% Free Space".to_string(),
                object_name: "LogicalDisk".to_string(),
                instance_name: "C:".to_string(),
                rule_display_name: "Free space".to_string(),
                rule_description: String::new(),
                instance_path: disk.path.clone(),
                instance_display_name: disk.display_name.clone(),
            })
            .collect();
        let monitor = Monitor {
            id: MonitorId::new_v4(),
            name: "Contoso.Disk.Health".to_string(),
            display_name: "Disk health".to_string(),
            description: Some("Disk health rollup".to_string()),
        };
        let group = Group {
            id: GroupId::new_v4(),
            full_name: "Contoso.Servers.Group".to_string(),
            display_name: "Contoso servers".to_string(),
        };

        Self {
            class,
            rule,
            disks,
            series,
            monitor,
            group,
        }
    }

    /// A mock seeded with the fixture; disk `i` reports `10 * (i + 1)` and is healthy.
    pub fn gateway(&self) -> MockGateway {
        let now = Utc::now();
        let mut gateway = MockGateway::new(MANAGEMENT_GROUP)
            .with_class(self.class.clone())
            .with_rule(self.rule.clone())
            .with_instances(self.class.id, self.disks.clone())
            .with_monitor(self.monitor.clone())
            .with_group(self.group.clone(), self.disks[..2].to_vec());

        for (i, (series, disk)) in self.series.iter().zip(&self.disks).enumerate() {
            let latest = 10.0 * (i as f64 + 1.0);
            gateway = gateway
                .with_series(
                    series.clone(),
                    vec![
                        PerformanceValue {
                            sample_value: Some(latest),
                            time_sampled: now - ChronoDuration::seconds(30),
                        },
                        PerformanceValue {
                            sample_value: Some(99.0),
                            time_sampled: now - ChronoDuration::seconds(300),
                        },
                    ],
                )
                .with_monitor_state(MonitorState {
                    instance_id: disk.id,
                    monitor_id: self.monitor.id,
                    health_state: HealthState::Healthy,
                });
        }

        gateway
    }
}

pub fn perf_rule(name: &str, target_class_id: ClassId) -> Rule {
    Rule {
        id: RuleId::new_v4(),
        name: name.to_string(),
        display_name: name.to_string(),
        description: Some(format!("{name} description")),
        target_class_id,
        enabled: true,
        category: RuleCategory::PerformanceCollection,
    }
}

pub fn config(scrape_interval: Duration) -> CollectorConfig {
    CollectorConfig {
        rule_filter: RuleFilter::All,
        counter_map: CounterMap::default(),
        scrape_interval,
        refresh_interval: Duration::from_secs(300),
        export_metrics: true,
        export_monitors: true,
    }
}

pub fn collector(
    gateway: MockGateway,
    config: CollectorConfig,
) -> (ScomCollector<MockGateway>, Arc<Reconnecting<MockGateway>>, Registry) {
    let gateway = Arc::new(Reconnecting::new(gateway));
    let registry = Registry::new();
    let collector = ScomCollector::new(Arc::clone(&gateway), config, &registry).unwrap();

    (collector, gateway, registry)
}

/// Value of an unlabelled metric in the exposition text.
pub fn metric_value(exposition: &str, name: &str) -> Option<f64> {
    exposition.lines().find_map(|line| {
        let (metric, value) = line.split_once(' ')?;
        (metric == name).then(|| value.parse().ok()).flatten()
    })
}
