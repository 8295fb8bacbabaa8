//! Abstract interface to a SCOM management server.
//!
//! The exporter never talks to the management server directly: everything goes through a
//! [`ManagementGateway`], wrapped in [`Reconnecting`] so a dropped session is re-established
//! once before a call is given up on.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod model;
mod reconnect;

pub use error::{GatewayError, GatewayErrorKind};
pub use model::*;
pub use reconnect::Reconnecting;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Query surface of the management server used by the exporter.
///
/// Implementations are expected to be cheap to share behind an `Arc` and to be safe to
/// call concurrently.
#[async_trait]
pub trait ManagementGateway
where
    Self: Send + Sync + 'static,
{
    /// The error type for this gateway.
    type Error: GatewayError;

    /// Name of the management group this gateway is connected to.
    fn management_group_name(&self) -> &str;

    /// Re-establishes the session with the management server.
    async fn reconnect(&self) -> Result<(), Self::Error>;

    /// All rules known to the management server.
    async fn rules(&self) -> Result<Vec<Rule>, Self::Error>;

    /// The classes with the given ids.
    async fn classes(&self, ids: &[ClassId]) -> Result<Vec<Class>, Self::Error>;

    /// Root monitoring groups.
    async fn root_groups(&self) -> Result<Vec<Group>, Self::Error>;

    /// Every instance of a class.
    async fn instances_of_class(&self, class_id: &ClassId) -> Result<Vec<Instance>, Self::Error>;

    /// All monitors.
    async fn monitors(&self) -> Result<Vec<Monitor>, Self::Error>;

    /// The most derived classes of a group object.
    async fn most_derived_classes(&self, group_id: &GroupId) -> Result<Vec<Class>, Self::Error>;

    /// Instances related to a class, walked to the given depth.
    async fn related_instances(
        &self,
        class_id: &ClassId,
        depth: TraversalDepth,
    ) -> Result<Vec<Instance>, Self::Error>;

    /// Performance series collected by any of the given rules.
    async fn performance_series(
        &self,
        rule_ids: &[RuleId],
    ) -> Result<Vec<PerformanceSeries>, Self::Error>;

    /// Values of a performance series sampled within `[start, end]`, oldest first.
    async fn performance_values(
        &self,
        series: &PerformanceSeries,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PerformanceValue>, Self::Error>;

    /// Health of the given instances with respect to the given monitors.
    async fn monitor_states(
        &self,
        instances: &[InstanceId],
        monitors: &[MonitorId],
    ) -> Result<Vec<MonitorState>, Self::Error>;

    /// Alerts raised at or after `since`.
    async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>, Self::Error>;

    /// Events generated at or after `since`.
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>, Self::Error>;
}
