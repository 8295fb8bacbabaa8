use std::fmt;

use chrono::{DateTime, Utc};
use scom_naming::CounterMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random id.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Id of a collection rule.
    RuleId
);
id_type!(
    /// Id of a management pack class.
    ClassId
);
id_type!(
    /// Id of a monitoring group.
    GroupId
);
id_type!(
    /// Id of a monitoring object.
    InstanceId
);
id_type!(
    /// Id of a health monitor.
    MonitorId
);
id_type!(
    /// Id of a performance data series.
    SeriesId
);

/// Category a rule is registered under.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum RuleCategory {
    /// Rules that collect performance counters.
    PerformanceCollection,
    /// Rules that collect events.
    EventCollection,
    /// Rules that raise alerts.
    Alert,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// A collection rule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rule {
    /// Rule id.
    pub id: RuleId,
    /// Internal name, used for filtering and name overrides.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// The class this rule targets.
    pub target_class_id: ClassId,
    /// Whether the rule is enabled.
    pub enabled: bool,
    /// Rule category.
    pub category: RuleCategory,
}

/// A management pack class.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Class {
    /// Class id.
    pub id: ClassId,
    /// Internal name.
    pub name: String,
    /// Display name.
    pub display_name: String,
}

/// A monitoring group.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Group {
    /// Group id.
    pub id: GroupId,
    /// Fully qualified name, used to address the group over HTTP.
    pub full_name: String,
    /// Display name.
    pub display_name: String,
}

/// A monitoring object.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// Instance id.
    pub id: InstanceId,
    /// Display path; hosted objects have one, top level objects do not.
    pub path: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Fully qualified name.
    pub full_name: String,
}

/// A health monitor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Monitor {
    /// Monitor id.
    pub id: MonitorId,
    /// Internal name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Free-text description.
    pub description: Option<String>,
}

/// Health of an instance with respect to a monitor.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[repr(u8)]
pub enum HealthState {
    /// No state has been computed yet.
    #[default]
    Uninitialized = 0,
    /// Healthy.
    Healthy = 1,
    /// Warning.
    Warning = 2,
    /// Error.
    Error = 3,
}

impl HealthState {
    /// Numeric value exported for this state.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

/// Current state of one monitor on one instance.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MonitorState {
    /// The monitored instance.
    pub instance_id: InstanceId,
    /// The monitor.
    pub monitor_id: MonitorId,
    /// Health state.
    pub health_state: HealthState,
}

/// A performance data series: one counter collected by one rule on one instance.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PerformanceSeries {
    pub id: SeriesId,
    pub rule_id: RuleId,
    pub instance_id: InstanceId,
    pub counter_name: String,
    pub object_name: String,
    pub instance_name: String,
    pub rule_display_name: String,
    pub rule_description: String,
    pub instance_path: Option<String>,
    pub instance_display_name: String,
}

impl PerformanceSeries {
    /// Borrows the free-text fields the naming engine works on.
    #[must_use]
    pub fn metadata(&self) -> CounterMetadata<'_> {
        CounterMetadata {
            counter_name: &self.counter_name,
            object_name: &self.object_name,
            instance_name: &self.instance_name,
            rule_display_name: &self.rule_display_name,
            rule_description: &self.rule_description,
            instance_path: self.instance_path.as_deref().unwrap_or_default(),
            instance_display_name: &self.instance_display_name,
        }
    }
}

/// One sampled value of a series.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PerformanceValue {
    /// Sampled value, absent when the agent reported none.
    pub sample_value: Option<f64>,
    /// When the value was sampled.
    pub time_sampled: DateTime<Utc>,
}

/// Latest value of a series inside a request window.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceSample {
    pub series: PerformanceSeries,
    pub value: PerformanceValue,
}

impl PerformanceSample {
    /// See [`PerformanceSeries::metadata`].
    #[must_use]
    pub fn metadata(&self) -> CounterMetadata<'_> {
        self.series.metadata()
    }
}

/// How far related-object queries walk the containment graph.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum TraversalDepth {
    /// Direct relations only.
    #[default]
    OneLevel,
    /// The full transitive closure.
    Recursive,
}

impl fmt::Display for TraversalDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Alert severity.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AlertSeverity {
    Information,
    Warning,
    Error,
    MatchMonitorHealth,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Alert priority.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AlertPriority {
    Low,
    Normal,
    High,
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A monitoring alert.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub severity: AlertSeverity,
    pub priority: AlertPriority,
    pub resolution_state: u8,
    pub category: String,
    pub is_monitor_alert: bool,
    pub repeat_count: u32,
    pub owner: Option<String>,
    pub net_bios_computer_name: Option<String>,
    pub monitoring_object_id: InstanceId,
    pub monitoring_object_full_name: String,
    pub monitoring_object_display_name: String,
    pub monitoring_object_path: Option<String>,
    pub time_raised: DateTime<Utc>,
    pub time_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A monitoring event.
#[allow(missing_docs)]
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub number: u32,
    pub channel: String,
    pub logging_computer: String,
    pub publisher_name: String,
    pub level: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub user_name: Option<String>,
    pub monitoring_object_id: InstanceId,
    pub monitoring_object_full_name: String,
    pub monitoring_object_display_name: String,
    pub time_generated: DateTime<Utc>,
    pub time_added: DateTime<Utc>,
}
