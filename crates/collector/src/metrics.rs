//! Self-observability metrics of the collector

use prometheus::{
    Histogram, IntCounter, IntGauge, Registry, register_histogram_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry,
};

/// Collector metrics, registered into the process registry.
#[derive(Clone, Debug)]
pub struct CollectorMetrics {
    /// Rules in the current topology.
    pub rules: IntGauge,
    /// Classes in the current topology.
    pub classes: IntGauge,
    /// Instances in the current topology.
    pub instances: IntGauge,
    /// Root groups in the current topology.
    pub groups: IntGauge,
    /// Distinct group members in the current topology.
    pub monitoring_objects: IntGauge,
    /// Successful topology refreshes.
    pub refreshes: IntCounter,
    /// Failed topology refreshes.
    pub refresh_errors: IntCounter,
    /// Scrape cycles run.
    pub scrape_requests: IntCounter,
    /// Unix time of the last scrape cycle.
    pub scrape_last: IntGauge,
    /// Scrape cycle duration.
    pub scrape_duration: Histogram,
    /// Scrape cycles that outlasted the scrape interval.
    pub scrape_overlaps: IntCounter,
}

impl CollectorMetrics {
    /// Registers the collector metrics into `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric is already registered.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            rules: register_int_gauge_with_registry!(
                "process_scom_rules_count",
                "number of rules found in SCOM environment",
                registry
            )?,
            classes: register_int_gauge_with_registry!(
                "process_scom_classes_count",
                "number of classes found in SCOM environment",
                registry
            )?,
            instances: register_int_gauge_with_registry!(
                "process_scom_instances_count",
                "number of instances found in SCOM environment",
                registry
            )?,
            groups: register_int_gauge_with_registry!(
                "process_scom_groups_count",
                "number of groups found in SCOM environment",
                registry
            )?,
            monitoring_objects: register_int_gauge_with_registry!(
                "process_scom_monitoringobjects_count",
                "number of monitoring objects found in SCOM environment",
                registry
            )?,
            refreshes: register_int_counter_with_registry!(
                "process_scom_configuration_refresh_count",
                "number of SCOM configuration changes since uptime",
                registry
            )?,
            refresh_errors: register_int_counter_with_registry!(
                "process_scom_configuration_refresh_errors_count",
                "number of failed SCOM configuration refreshes since uptime",
                registry
            )?,
            scrape_requests: register_int_counter_with_registry!(
                "process_scom_metrics_scrape_request_count",
                "number of SCOM metrics scrape requests since uptime",
                registry
            )?,
            scrape_last: register_int_gauge_with_registry!(
                "process_scom_metrics_scrape_last",
                "last time SCOM metrics were scraped",
                registry
            )?,
            scrape_duration: register_histogram_with_registry!(
                "process_scom_metrics_scrape_duration_seconds",
                "duration of retrieval of SCOM metrics",
                vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
                registry
            )?,
            scrape_overlaps: register_int_counter_with_registry!(
                "process_scom_metrics_scrape_overlap_count",
                "number of SCOM scrape cycles that took longer than the scrape interval",
                registry
            )?,
        })
    }
}
