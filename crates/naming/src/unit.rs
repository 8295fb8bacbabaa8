use std::fmt;

use crate::CounterMetadata;

const TIME_KEYWORDS: &[&str] = &[
    "Latency",
    "Processing Time",
    "Wait Time",
    "Up Time",
    "Idle Time",
    "Ready Time",
    "Summation",
    "IOPS",
    "ms",
    "sec",
    "cpu idle",
];

const COUNT_KEYWORDS: &[&str] = &[
    "Size",
    "Count",
    "Number",
    "Connections",
    "Threads",
    "Errors",
    "Data Items",
    "Alerts",
    "Workflows",
    "Modules",
    "Uploads",
    "Avg. Batch Size",
];

const SIZE_KEYWORDS: &[&str] = &["Memory", "KiloBytes", "Working Set", "Bytes", "GB"];

const THROUGHPUT_KEYWORDS: &[&str] = &["Network Usage", "Disk Usage", "Activity Usage"];

const PERCENTAGE_KEYWORDS: &[&str] = &[
    "Percentage",
    "% Used",
    "% Free",
    "% Activity",
    "% CPU",
    "% Memory",
    "%",
    "agent processor utilization",
    "Read Cache Hit Rate",
    "Percent",
];

const RATE_KEYWORDS: &[&str] = &["Rate", "Throughput", "Items/sec", "Batches/sec", "Errors/sec"];

const FREQUENCY_KEYWORDS: &[&str] = &["MHz", "Average CPU time"];

/// Unit attached to an exported counter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Unit {
    /// Plain bytes.
    Bytes,
    /// Kibibytes.
    Kibibytes,
    /// Mebibytes.
    Mebibytes,
    /// Gibibytes.
    Gibibytes,
    /// Percentage (0-100).
    Percentage,
    /// Megahertz.
    Megahertz,
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Dimensionless count.
    Count,
    /// Kibibytes per second.
    KibibytesPerSecond,
    /// Bytes per second.
    BytesPerSecond,
    /// The rule describes a maximum rather than a unit.
    Maximum,
    /// Nothing in the metadata gave the unit away.
    Unknown,
}

impl Unit {
    /// The suffix appended to metric names.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Bytes => "_bytes",
            Self::Kibibytes => "_kibibytes",
            Self::Mebibytes => "_mebibytes",
            Self::Gibibytes => "_gibibytes",
            Self::Percentage => "_percentage",
            Self::Megahertz => "_megahertz",
            Self::Nanoseconds => "_nanoseconds",
            Self::Microseconds => "_microseconds",
            Self::Milliseconds => "_milliseconds",
            Self::Seconds => "_seconds",
            Self::Count => "_count",
            Self::KibibytesPerSecond => "_kibibytessecond",
            Self::BytesPerSecond => "_bytessecond",
            Self::Maximum => "maximum",
            Self::Unknown => "_unknown_unit",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Infers the unit of a counter from its metadata.
///
/// Tiers are tried in a fixed order and the first hit wins. Inside a tier, keywords are
/// tried in declaration order and the first keyword found anywhere in the counter name
/// decides, regardless of where it occurs.
#[must_use]
pub fn infer_unit(metadata: &CounterMetadata<'_>) -> Unit {
    let counter = metadata.counter_name;

    // "Capacity" shows up across unrelated unit families, only the other fields can tell
    if contains_ci(counter, "Capacity") {
        if let Some(unit) = metadata.fields().into_iter().find_map(capacity_hint) {
            return unit;
        }
    }

    if let Some(keyword) = first_keyword(counter, TIME_KEYWORDS) {
        return match keyword {
            "IOPS" => Unit::Seconds,
            "ms" => Unit::Milliseconds,
            "cpu idle" if metadata.instance_name == "millisecond" => Unit::Milliseconds,
            _ => metadata
                .fields()
                .into_iter()
                .find_map(time_hint)
                .unwrap_or(Unit::Seconds),
        };
    }

    if first_keyword(counter, COUNT_KEYWORDS).is_some() {
        return Unit::Count;
    }

    if let Some(keyword) = first_keyword(counter, SIZE_KEYWORDS) {
        return match keyword {
            "GB" => Unit::Gibibytes,
            "Memory" => metadata
                .fields()
                .into_iter()
                .find_map(memory_hint)
                .unwrap_or(Unit::Bytes),
            _ => Unit::Bytes,
        };
    }

    if first_keyword(counter, THROUGHPUT_KEYWORDS).is_some() {
        return Unit::KibibytesPerSecond;
    }

    if first_keyword(counter, PERCENTAGE_KEYWORDS).is_some() {
        return Unit::Percentage;
    }

    if let Some(keyword) = first_keyword(counter, RATE_KEYWORDS) {
        return if keyword == "Throughput" {
            Unit::BytesPerSecond
        } else {
            Unit::Seconds
        };
    }

    if first_keyword(counter, FREQUENCY_KEYWORDS).is_some() {
        return Unit::Megahertz;
    }

    description_hint(metadata.rule_description).unwrap_or(Unit::Unknown)
}

fn capacity_hint(value: &str) -> Option<Unit> {
    // any "bytes" spelling, kiloBytes included, reads as plain bytes
    if contains_ci(value, "bytes") {
        Some(Unit::Bytes)
    } else if value.eq_ignore_ascii_case("percent") {
        Some(Unit::Percentage)
    } else if value.eq_ignore_ascii_case("megaHertz") {
        Some(Unit::Megahertz)
    } else if value.eq_ignore_ascii_case("microseconds") {
        Some(Unit::Microseconds)
    } else {
        None
    }
}

fn time_hint(value: &str) -> Option<Unit> {
    if contains_ci(value, "millisecond") {
        Some(Unit::Milliseconds)
    } else if contains_ci(value, "microsecond") {
        Some(Unit::Microseconds)
    } else if contains_ci(value, "nanosecond") {
        Some(Unit::Nanoseconds)
    } else {
        None
    }
}

fn memory_hint(value: &str) -> Option<Unit> {
    if contains_ci(value, "kiloBytes") {
        Some(Unit::Kibibytes)
    } else if contains_ci(value, "megaBytes") {
        Some(Unit::Mebibytes)
    } else if contains_ci(value, "gigabytes") {
        Some(Unit::Gibibytes)
    } else if contains_ci(value, "percent") {
        Some(Unit::Percentage)
    } else {
        None
    }
}

fn description_hint(description: &str) -> Option<Unit> {
    if description.is_empty() {
        None
    } else if contains_ci(description, "IOPS") {
        Some(Unit::Seconds)
    } else if contains_ci(description, "percent") {
        Some(Unit::Percentage)
    } else if contains_ci(description, "maximum") {
        Some(Unit::Maximum)
    } else {
        None
    }
}

fn first_keyword(haystack: &str, keywords: &[&'static str]) -> Option<&'static str> {
    keywords
        .iter()
        .copied()
        .find(|keyword| contains_ci(haystack, keyword))
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(needle.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn counter(name: &str) -> CounterMetadata<'_> {
        CounterMetadata {
            counter_name: name,
            ..CounterMetadata::default()
        }
    }

    #[test]
    fn test_percentage_keyword() {
        assert_eq!(
            infer_unit(&counter("Disk Free Space Percentage")),
            Unit::Percentage
        );
        assert_eq!(infer_unit(&counter("% Processor Time")), Unit::Percentage);
        assert_eq!(infer_unit(&counter("% Free Space")), Unit::Percentage);
    }

    #[test]
    fn test_generic_bytes() {
        assert_eq!(infer_unit(&counter("Available MBytes")), Unit::Bytes);
    }

    #[test]
    fn test_gigabytes_keyword() {
        assert_eq!(infer_unit(&counter("Free GB")), Unit::Gibibytes);
    }

    #[test]
    fn test_capacity_scans_fields_before_keywords() {
        let meta = CounterMetadata {
            counter_name: "Capacity Percentage",
            instance_name: "gigaBytes",
            ..CounterMetadata::default()
        };

        assert_eq!(infer_unit(&meta), Unit::Bytes);
    }

    #[test]
    fn test_capacity_sized_bytes_hint_is_plain_bytes() {
        let meta = CounterMetadata {
            counter_name: "Datastore Capacity",
            instance_name: "kiloBytes",
            ..CounterMetadata::default()
        };

        assert_eq!(infer_unit(&meta), Unit::Bytes);
    }

    #[test]
    fn test_capacity_percent_hint() {
        let meta = CounterMetadata {
            counter_name: "Datastore Capacity",
            instance_name: "percent",
            ..CounterMetadata::default()
        };

        assert_eq!(infer_unit(&meta), Unit::Percentage);
    }

    #[test]
    fn test_capacity_without_hint_falls_through() {
        assert_eq!(infer_unit(&counter("Capacity Percentage")), Unit::Percentage);
        assert_eq!(infer_unit(&counter("Capacity")), Unit::Unknown);
    }

    #[test]
    fn test_capacity_generic_bytes_hint() {
        let meta = CounterMetadata {
            counter_name: "Datastore Capacity",
            rule_description: "Capacity of the datastore in bytes",
            ..CounterMetadata::default()
        };

        assert_eq!(infer_unit(&meta), Unit::Bytes);
    }

    #[test]
    fn test_time_keywords() {
        assert_eq!(infer_unit(&counter("Disk Latency")), Unit::Seconds);
        assert_eq!(infer_unit(&counter("Read IOPS")), Unit::Seconds);
        assert_eq!(infer_unit(&counter("Avg ms")), Unit::Milliseconds);

        let meta = CounterMetadata {
            counter_name: "Read Latency",
            instance_name: "microseconds",
            ..CounterMetadata::default()
        };
        assert_eq!(infer_unit(&meta), Unit::Microseconds);
    }

    #[test]
    fn test_cpu_idle_in_milliseconds() {
        let meta = CounterMetadata {
            counter_name: "CPU Idle",
            instance_name: "millisecond",
            ..CounterMetadata::default()
        };

        assert_eq!(infer_unit(&meta), Unit::Milliseconds);
    }

    #[test]
    fn test_count_keywords() {
        assert_eq!(infer_unit(&counter("Thread Count")), Unit::Count);
        assert_eq!(infer_unit(&counter("Active Connections")), Unit::Count);
        // the time tier catches "/sec" before the count and rate tiers
        assert_eq!(infer_unit(&counter("Errors/sec")), Unit::Seconds);
    }

    #[test]
    fn test_memory_scans_fields() {
        let meta = CounterMetadata {
            counter_name: "Memory Usage",
            rule_description: "Memory usage reported in megaBytes",
            ..CounterMetadata::default()
        };
        assert_eq!(infer_unit(&meta), Unit::Mebibytes);

        assert_eq!(infer_unit(&counter("Memory Usage")), Unit::Bytes);
    }

    #[test]
    fn test_throughput_frequency_and_rate() {
        assert_eq!(infer_unit(&counter("Network Usage")), Unit::KibibytesPerSecond);
        assert_eq!(infer_unit(&counter("CPU MHz")), Unit::Megahertz);
        assert_eq!(infer_unit(&counter("Throughput")), Unit::BytesPerSecond);
        assert_eq!(infer_unit(&counter("Hit Rate")), Unit::Seconds);
    }

    #[test]
    fn test_rule_description_fallback() {
        let meta = |description| CounterMetadata {
            counter_name: "Health",
            rule_description: description,
            ..CounterMetadata::default()
        };

        assert_eq!(infer_unit(&meta("Collects IOPS")), Unit::Seconds);
        assert_eq!(infer_unit(&meta("The percent of")), Unit::Percentage);
        assert_eq!(infer_unit(&meta("The maximum value")), Unit::Maximum);
        assert_eq!(infer_unit(&meta("Something else")), Unit::Unknown);
        assert_eq!(infer_unit(&meta("")), Unit::Unknown);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Unit::Unknown.suffix(), "_unknown_unit");
        assert_eq!(Unit::Maximum.suffix(), "maximum");
        assert_eq!(Unit::Percentage.to_string(), "_percentage");
    }

    proptest! {
        #[test]
        fn prop_inference_is_deterministic(
            counter_name in ".{0,24}",
            instance_name in ".{0,12}",
            rule_description in ".{0,32}",
        ) {
            let meta = CounterMetadata {
                counter_name: &counter_name,
                instance_name: &instance_name,
                rule_description: &rule_description,
                ..CounterMetadata::default()
            };

            prop_assert_eq!(infer_unit(&meta), infer_unit(&meta));
        }
    }
}
