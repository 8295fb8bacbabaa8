//! Metric naming for SCOM performance counters.
//!
//! Counter metadata coming out of the management server carries no authoritative unit, so
//! the unit is inferred from free text and appended to the exported metric name.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod sanitize;
mod unit;

pub use sanitize::{is_valid_metric_name, sanitize_metric_name};
pub use unit::{Unit, infer_unit};

/// The free-text fields of a performance counter that unit inference looks at.
///
/// Absent values are represented by the empty string.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CounterMetadata<'a> {
    /// Counter name, e.g. `% Free Space`.
    pub counter_name: &'a str,

    /// Performance object name, e.g. `LogicalDisk`.
    pub object_name: &'a str,

    /// Counter instance name, e.g. `C:` or `_Total`.
    pub instance_name: &'a str,

    /// Display name of the collecting rule.
    pub rule_display_name: &'a str,

    /// Description of the collecting rule.
    pub rule_description: &'a str,

    /// Path of the monitored object.
    pub instance_path: &'a str,

    /// Display name of the monitored object.
    pub instance_display_name: &'a str,
}

impl<'a> CounterMetadata<'a> {
    /// Every field, in the order hint scans visit them.
    #[must_use]
    pub const fn fields(&self) -> [&'a str; 7] {
        [
            self.counter_name,
            self.object_name,
            self.instance_name,
            self.rule_display_name,
            self.rule_description,
            self.instance_path,
            self.instance_display_name,
        ]
    }
}

/// Builds the canonical exported name for a counter collected against `class_name`.
///
/// ```
/// use scom_naming::{CounterMetadata, metric_name};
///
/// let meta = CounterMetadata {
///     counter_name: "Disk Free Space Percentage",
///     ..CounterMetadata::default()
/// };
///
/// assert_eq!(
///     metric_name("MyClass", &meta),
///     "scom_myclass_disk_free_space_percentage_percentage"
/// );
/// ```
#[must_use]
pub fn metric_name(class_name: &str, metadata: &CounterMetadata<'_>) -> String {
    let unit = infer_unit(metadata);

    sanitize_metric_name(&format!(
        "scom_{}_{}_{}",
        class_name,
        metadata.counter_name,
        unit.suffix()
    ))
}
