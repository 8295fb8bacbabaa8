use crate::record::LogRecord;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use scom_gateway::{Alert, Event};
use serde::Serialize;
use serde_json::{Map, Value};

/// Log line of an event without a description.
pub const NO_DESCRIPTION: &str = "No Description Available";

/// One log line: millisecond timestamp, text and the flattened record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry(pub String, pub String, pub Map<String, Value>);

impl LogEntry {
    fn new(at: DateTime<Utc>, line: String, record: &impl LogRecord) -> Self {
        Self(at.timestamp_millis().to_string(), line, record.flatten())
    }
}

/// Entries sharing one label set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogStream {
    /// Stream labels.
    pub stream: IndexMap<String, String>,
    /// Entries in fetch order.
    pub values: Vec<LogEntry>,
}

/// Body of a push request.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PushRequest {
    /// All streams of one cycle.
    pub streams: Vec<LogStream>,
}

impl PushRequest {
    /// Number of entries across all streams.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.streams.iter().map(|stream| stream.values.len()).sum()
    }

    /// Whether there is nothing to push.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn group<T, K>(
    records: &[T],
    key: impl Fn(&T) -> K,
    labels: impl Fn(&K) -> IndexMap<String, String>,
    entry: impl Fn(&T) -> LogEntry,
) -> Vec<LogStream>
where
    K: Eq + std::hash::Hash,
{
    let mut grouped: IndexMap<K, Vec<LogEntry>> = IndexMap::new();
    for record in records {
        grouped.entry(key(record)).or_default().push(entry(record));
    }

    grouped
        .into_iter()
        .map(|(key, values)| LogStream {
            stream: labels(&key),
            values,
        })
        .collect()
}

fn labels<const N: usize>(pairs: [(&str, &str); N]) -> IndexMap<String, String> {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Groups alerts by monitoring object, severity and priority.
#[must_use]
pub fn alert_streams(alerts: &[Alert]) -> Vec<LogStream> {
    group(
        alerts,
        |alert| {
            (
                alert.monitoring_object_full_name.clone(),
                alert.severity.to_string(),
                alert.priority.to_string(),
            )
        },
        |(object, severity, priority)| {
            labels([
                ("type", "alert"),
                ("monitoring_object_full_path", object.as_str()),
                ("severity", severity.as_str()),
                ("priority", priority.as_str()),
            ])
        },
        |alert| LogEntry::new(alert.time_raised, alert.name.clone(), alert),
    )
}

/// Groups events by monitoring object, channel and logging computer.
#[must_use]
pub fn event_streams(events: &[Event]) -> Vec<LogStream> {
    group(
        events,
        |event| {
            (
                event.monitoring_object_full_name.clone(),
                event.channel.clone(),
                event.logging_computer.clone(),
            )
        },
        |(object, channel, computer)| {
            labels([
                ("type", "event"),
                ("monitoring_object_full_path", object.as_str()),
                ("channel", channel.as_str()),
                ("computer", computer.as_str()),
            ])
        },
        |event| {
            let line = event
                .description
                .as_deref()
                .filter(|description| !description.is_empty())
                .unwrap_or(NO_DESCRIPTION);
            LogEntry::new(event.time_generated, line.to_string(), event)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::record::tests::{alert, event};

    use chrono::TimeZone;
    use scom_gateway::AlertSeverity;

    #[test]
    fn test_alerts_grouped_by_object_and_severity() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let alerts = vec![
            alert("srv01", AlertSeverity::Error, at),
            alert("srv01", AlertSeverity::Error, at),
            alert("srv01", AlertSeverity::Warning, at),
            alert("srv02", AlertSeverity::Error, at),
        ];

        let streams = alert_streams(&alerts);

        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].values.len(), 2);
        assert_eq!(streams[0].stream["type"], "alert");
        assert_eq!(streams[0].stream["monitoring_object_full_path"], "srv01");
        assert_eq!(streams[0].stream["severity"], "Error");
        assert_eq!(streams[0].stream["priority"], "Normal");
        assert_eq!(streams[0].values[0].0, "1709294400000");
        assert_eq!(streams[0].values[0].1, "srv01 is unhealthy");
    }

    #[test]
    fn test_events_without_description_get_placeholder() {
        let at = Utc::now();
        let events = vec![
            event("srv01", "System", None, at),
            event("srv01", "System", Some(""), at),
            event("srv01", "Application", Some("Service started"), at),
        ];

        let streams = event_streams(&events);

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].stream["channel"], "System");
        assert_eq!(streams[0].stream["computer"], "srv01.contoso.com");
        assert!(streams[0].values.iter().all(|entry| entry.1 == NO_DESCRIPTION));
        assert_eq!(streams[1].values[0].1, "Service started");
    }

    #[test]
    fn test_push_request_wire_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let request = PushRequest {
            streams: alert_streams(&[alert("srv01", AlertSeverity::Error, at)]),
        };

        let json = serde_json::to_value(&request).unwrap();
        let entry = &json["streams"][0]["values"][0];

        assert_eq!(json["streams"][0]["stream"]["type"], "alert");
        assert_eq!(entry[0], "1709294400000");
        assert_eq!(entry[1], "srv01 is unhealthy");
        assert_eq!(entry[2]["MonitoringObjectFullName"], "srv01");
        assert_eq!(request.entry_count(), 1);
    }
}
