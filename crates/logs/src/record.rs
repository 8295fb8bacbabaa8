use chrono::{DateTime, SecondsFormat, Utc};
use scom_gateway::{Alert, Event};
use serde_json::{Map, Value};

/// Placeholder for absent field values in a flattened record.
pub const NULL_FIELD: &str = "null";

/// A record that is shipped verbatim next to its log line.
///
/// Each kind lists its scalar fields explicitly, in a fixed order. Nested values are not
/// part of the table and are therefore never shipped.
pub trait LogRecord {
    /// Field name and rendered value, `None` for absent values.
    fn fields(&self) -> Vec<(&'static str, Option<String>)>;

    /// The fields as a flat JSON object of strings.
    fn flatten(&self) -> Map<String, Value> {
        self.fields()
            .into_iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    Value::String(value.unwrap_or_else(|| NULL_FIELD.to_string())),
                )
            })
            .collect()
    }
}

fn time(value: DateTime<Utc>) -> Option<String> {
    Some(value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn text(value: &str) -> Option<String> {
    Some(value.to_string())
}

impl LogRecord for Alert {
    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("Id", Some(self.id.to_string())),
            ("Name", text(&self.name)),
            ("Description", self.description.clone()),
            ("Severity", Some(self.severity.to_string())),
            ("Priority", Some(self.priority.to_string())),
            ("ResolutionState", Some(self.resolution_state.to_string())),
            ("Category", text(&self.category)),
            ("IsMonitorAlert", Some(self.is_monitor_alert.to_string())),
            ("RepeatCount", Some(self.repeat_count.to_string())),
            ("Owner", self.owner.clone()),
            ("NetbiosComputerName", self.net_bios_computer_name.clone()),
            ("MonitoringObjectId", Some(self.monitoring_object_id.to_string())),
            ("MonitoringObjectFullName", text(&self.monitoring_object_full_name)),
            (
                "MonitoringObjectDisplayName",
                text(&self.monitoring_object_display_name),
            ),
            ("MonitoringObjectPath", self.monitoring_object_path.clone()),
            ("TimeRaised", time(self.time_raised)),
            ("TimeAdded", time(self.time_added)),
            ("LastModified", time(self.last_modified)),
        ]
    }
}

impl LogRecord for Event {
    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("Id", Some(self.id.to_string())),
            ("Number", Some(self.number.to_string())),
            ("Channel", text(&self.channel)),
            ("LoggingComputer", text(&self.logging_computer)),
            ("PublisherName", text(&self.publisher_name)),
            ("LevelId", text(&self.level)),
            ("Category", self.category.clone()),
            ("Description", self.description.clone()),
            ("User", self.user_name.clone()),
            ("MonitoringObjectId", Some(self.monitoring_object_id.to_string())),
            ("MonitoringObjectFullName", text(&self.monitoring_object_full_name)),
            (
                "MonitoringObjectDisplayName",
                text(&self.monitoring_object_display_name),
            ),
            ("TimeGenerated", time(self.time_generated)),
            ("TimeAdded", time(self.time_added)),
        ]
    }
}
