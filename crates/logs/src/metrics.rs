use prometheus::{
    Gauge, IntCounter, IntCounterVec, IntGauge, Registry, register_gauge_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry,
};

/// Counters of the log shipping loop.
#[derive(Clone, Debug)]
pub struct ShipperMetrics {
    /// Entries pushed since startup.
    pub total: IntCounter,
    /// Entries pushed by the last cycle that had any.
    pub last_round: IntGauge,
    /// Milliseconds the last fetch took.
    pub fetch_duration: Gauge,
}

impl ShipperMetrics {
    /// Registers the counters into `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a counter is already registered.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            total: register_int_counter_with_registry!(
                "loki_logs_total_count",
                "Total amount of logs sent",
                registry
            )?,
            last_round: register_int_gauge_with_registry!(
                "loki_logs_last_round_count",
                "Total amount of logs sent in the previous scrape",
                registry
            )?,
            fetch_duration: register_gauge_with_registry!(
                "loki_logs_fetch_duration",
                "How long it takes to fetch alerts and events",
                registry
            )?,
        })
    }
}

/// Push responses by status, `unknown` when no response arrived.
pub(crate) fn register_push_counter(registry: &Registry) -> prometheus::Result<IntCounterVec> {
    register_int_counter_vec_with_registry!("http_loki_push", "Http status", &["status"], registry)
}
