//! Mock implementation of the management gateway for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use scom_gateway::{
    Alert, Class, ClassId, Event, GatewayErrorKind, Group, GroupId, Instance, InstanceId,
    ManagementGateway, Monitor, MonitorId, MonitorState, PerformanceSeries, PerformanceValue,
    Rule, RuleId, SeriesId, TraversalDepth,
};

/// Gateway operations, used to inject failures and count calls.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    Reconnect,
    Rules,
    Classes,
    RootGroups,
    InstancesOfClass,
    Monitors,
    MostDerivedClasses,
    RelatedInstances,
    PerformanceSeries,
    PerformanceValues,
    MonitorStates,
    AlertsSince,
    EventsSince,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Topology,
    Scrape,
    Other,
}

impl Operation {
    const fn phase(self) -> Phase {
        match self {
            Self::Rules
            | Self::Classes
            | Self::RootGroups
            | Self::InstancesOfClass
            | Self::Monitors
            | Self::MostDerivedClasses
            | Self::RelatedInstances => Phase::Topology,
            Self::PerformanceSeries | Self::PerformanceValues | Self::MonitorStates => {
                Phase::Scrape
            }
            Self::Reconnect | Self::AlertsSince | Self::EventsSince => Phase::Other,
        }
    }
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    classes: Vec<Class>,
    groups: Vec<Group>,
    instances_by_class: HashMap<ClassId, Vec<Instance>>,
    monitors: Vec<Monitor>,
    group_classes: HashMap<GroupId, Vec<Class>>,
    related: HashMap<ClassId, Vec<Instance>>,
    series: Vec<PerformanceSeries>,
    values: HashMap<SeriesId, Vec<PerformanceValue>>,
    monitor_states: Vec<MonitorState>,
    alerts: Vec<Alert>,
    events: Vec<Event>,

    failures: HashMap<Operation, VecDeque<GatewayErrorKind>>,
    failing_series: HashSet<SeriesId>,
    calls: HashMap<Operation, usize>,
    delay: Option<Duration>,
    alert_queries: Vec<DateTime<Utc>>,
    event_queries: Vec<DateTime<Utc>>,
}

#[derive(Default)]
struct Phases {
    topology: AtomicUsize,
    scrape: AtomicUsize,
    overlapped: AtomicBool,
}

struct PhaseGuard<'a> {
    active: Option<&'a AtomicUsize>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(active) = self.active {
            active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// In-memory management gateway.
///
/// Data is seeded with the `with_*` builders or changed at runtime with the `add_*`/`set_*`
/// methods. Failures can be queued per operation, and every call made while a call of the
/// opposite phase (topology queries vs. scrape queries) is in flight is recorded, see
/// [`MockGateway::phases_overlapped`].
pub struct MockGateway {
    name: String,
    state: Mutex<State>,
    phases: Phases,
}

impl MockGateway {
    /// Create an empty mock for the given management group.
    #[must_use]
    pub fn new(management_group_name: impl Into<String>) -> Self {
        Self {
            name: management_group_name.into(),
            state: Mutex::new(State::default()),
            phases: Phases::default(),
        }
    }

    /// Adds a class.
    #[must_use]
    pub fn with_class(self, class: Class) -> Self {
        self.state.lock().classes.push(class);
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn with_rule(self, rule: Rule) -> Self {
        self.state.lock().rules.push(rule);
        self
    }

    /// Adds instances of a class.
    #[must_use]
    pub fn with_instances(self, class_id: ClassId, instances: Vec<Instance>) -> Self {
        self.state
            .lock()
            .instances_by_class
            .entry(class_id)
            .or_default()
            .extend(instances);
        self
    }

    /// Adds a root group whose membership resolves to `members`.
    #[must_use]
    pub fn with_group(self, group: Group, members: Vec<Instance>) -> Self {
        {
            let mut state = self.state.lock();
            let class = Class {
                id: ClassId::new_v4(),
                name: format!("{}.Class", group.full_name),
                display_name: format!("{} class", group.display_name),
            };
            state.related.insert(class.id, members);
            state.group_classes.insert(group.id, vec![class]);
            state.groups.push(group);
        }
        self
    }

    /// Adds a monitor.
    #[must_use]
    pub fn with_monitor(self, monitor: Monitor) -> Self {
        self.state.lock().monitors.push(monitor);
        self
    }

    /// Adds a performance series and its values.
    #[must_use]
    pub fn with_series(self, series: PerformanceSeries, values: Vec<PerformanceValue>) -> Self {
        self.set_series_values(series.id, values);
        self.state.lock().series.push(series);
        self
    }

    /// Adds a monitor state.
    #[must_use]
    pub fn with_monitor_state(self, state: MonitorState) -> Self {
        self.state.lock().monitor_states.push(state);
        self
    }

    /// Adds an alert.
    #[must_use]
    pub fn with_alert(self, alert: Alert) -> Self {
        self.add_alert(alert);
        self
    }

    /// Adds an event.
    #[must_use]
    pub fn with_event(self, event: Event) -> Self {
        self.add_event(event);
        self
    }

    /// Delays every call by `delay`.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = Some(delay);
        self
    }

    /// Adds an alert at runtime.
    pub fn add_alert(&self, alert: Alert) {
        self.state.lock().alerts.push(alert);
    }

    /// Adds an event at runtime.
    pub fn add_event(&self, event: Event) {
        self.state.lock().events.push(event);
    }

    /// Replaces the values of a series.
    pub fn set_series_values(&self, series_id: SeriesId, values: Vec<PerformanceValue>) {
        self.state.lock().values.insert(series_id, values);
    }

    /// Replaces the membership of a group added with [`Self::with_group`].
    pub fn set_group_members(&self, group_id: GroupId, members: Vec<Instance>) {
        let mut state = self.state.lock();
        let class_ids: Vec<ClassId> = state
            .group_classes
            .get(&group_id)
            .map(|classes| classes.iter().map(|c| c.id).collect())
            .unwrap_or_default();
        for class_id in class_ids {
            state.related.insert(class_id, members.clone());
        }
    }

    /// Replaces all rules.
    pub fn set_rules(&self, rules: Vec<Rule>) {
        self.state.lock().rules = rules;
    }

    /// Makes the next call of `operation` fail with `kind`. Queued failures are consumed in
    /// order.
    pub fn fail_next(&self, operation: Operation, kind: GatewayErrorKind) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(kind);
    }

    /// Makes every value read of the series fail.
    pub fn fail_series(&self, series_id: SeriesId) {
        self.state.lock().failing_series.insert(series_id);
    }

    /// Number of calls made to `operation`, including failed ones.
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or_default()
    }

    /// The `since` arguments of every alert query, oldest first.
    #[must_use]
    pub fn alert_queries(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().alert_queries.clone()
    }

    /// The `since` arguments of every event query, oldest first.
    #[must_use]
    pub fn event_queries(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().event_queries.clone()
    }

    /// Whether a topology query and a scrape query were ever in flight at the same time.
    #[must_use]
    pub fn phases_overlapped(&self) -> bool {
        self.phases.overlapped.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: Operation) -> Result<PhaseGuard<'_>, Error> {
        let (injected, delay) = {
            let mut state = self.state.lock();
            *state.calls.entry(operation).or_default() += 1;
            let injected = state
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front);
            (injected, state.delay)
        };

        if let Some(kind) = injected {
            return Err(Error::Injected { operation, kind });
        }

        let (own, other) = match operation.phase() {
            Phase::Topology => (Some(&self.phases.topology), Some(&self.phases.scrape)),
            Phase::Scrape => (Some(&self.phases.scrape), Some(&self.phases.topology)),
            Phase::Other => (None, None),
        };

        if let Some(own) = own {
            own.fetch_add(1, Ordering::SeqCst);
        }
        let guard = PhaseGuard { active: own };

        if other.is_some_and(|other| other.load(Ordering::SeqCst) > 0) {
            self.phases.overlapped.store(true, Ordering::SeqCst);
        }

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if other.is_some_and(|other| other.load(Ordering::SeqCst) > 0) {
            self.phases.overlapped.store(true, Ordering::SeqCst);
        }

        Ok(guard)
    }
}

#[async_trait]
impl ManagementGateway for MockGateway {
    type Error = Error;

    fn management_group_name(&self) -> &str {
        &self.name
    }

    async fn reconnect(&self) -> Result<(), Self::Error> {
        self.enter(Operation::Reconnect).await?;
        Ok(())
    }

    async fn rules(&self) -> Result<Vec<Rule>, Self::Error> {
        let _phase = self.enter(Operation::Rules).await?;
        Ok(self.state.lock().rules.clone())
    }

    async fn classes(&self, ids: &[ClassId]) -> Result<Vec<Class>, Self::Error> {
        let _phase = self.enter(Operation::Classes).await?;
        Ok(self
            .state
            .lock()
            .classes
            .iter()
            .filter(|class| ids.contains(&class.id))
            .cloned()
            .collect())
    }

    async fn root_groups(&self) -> Result<Vec<Group>, Self::Error> {
        let _phase = self.enter(Operation::RootGroups).await?;
        Ok(self.state.lock().groups.clone())
    }

    async fn instances_of_class(&self, class_id: &ClassId) -> Result<Vec<Instance>, Self::Error> {
        let _phase = self.enter(Operation::InstancesOfClass).await?;
        Ok(self
            .state
            .lock()
            .instances_by_class
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn monitors(&self) -> Result<Vec<Monitor>, Self::Error> {
        let _phase = self.enter(Operation::Monitors).await?;
        Ok(self.state.lock().monitors.clone())
    }

    async fn most_derived_classes(&self, group_id: &GroupId) -> Result<Vec<Class>, Self::Error> {
        let _phase = self.enter(Operation::MostDerivedClasses).await?;
        Ok(self
            .state
            .lock()
            .group_classes
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn related_instances(
        &self,
        class_id: &ClassId,
        _depth: TraversalDepth,
    ) -> Result<Vec<Instance>, Self::Error> {
        let _phase = self.enter(Operation::RelatedInstances).await?;
        Ok(self
            .state
            .lock()
            .related
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn performance_series(
        &self,
        rule_ids: &[RuleId],
    ) -> Result<Vec<PerformanceSeries>, Self::Error> {
        let _phase = self.enter(Operation::PerformanceSeries).await?;
        Ok(self
            .state
            .lock()
            .series
            .iter()
            .filter(|series| rule_ids.contains(&series.rule_id))
            .cloned()
            .collect())
    }

    async fn performance_values(
        &self,
        series: &PerformanceSeries,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PerformanceValue>, Self::Error> {
        let _phase = self.enter(Operation::PerformanceValues).await?;
        let state = self.state.lock();
        if state.failing_series.contains(&series.id) {
            return Err(Error::SeriesUnavailable(series.counter_name.clone()));
        }
        let mut values: Vec<PerformanceValue> = state
            .values
            .get(&series.id)
            .into_iter()
            .flatten()
            .filter(|value| value.time_sampled >= start && value.time_sampled <= end)
            .copied()
            .collect();
        drop(state);
        values.sort_by_key(|value| value.time_sampled);
        Ok(values)
    }

    async fn monitor_states(
        &self,
        instances: &[InstanceId],
        monitors: &[MonitorId],
    ) -> Result<Vec<MonitorState>, Self::Error> {
        let _phase = self.enter(Operation::MonitorStates).await?;
        Ok(self
            .state
            .lock()
            .monitor_states
            .iter()
            .filter(|s| instances.contains(&s.instance_id) && monitors.contains(&s.monitor_id))
            .copied()
            .collect())
    }

    async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>, Self::Error> {
        self.state.lock().alert_queries.push(since);
        let _phase = self.enter(Operation::AlertsSince).await?;
        Ok(self
            .state
            .lock()
            .alerts
            .iter()
            .filter(|alert| alert.time_raised >= since)
            .cloned()
            .collect())
    }

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>, Self::Error> {
        self.state.lock().event_queries.push(since);
        let _phase = self.enter(Operation::EventsSince).await?;
        Ok(self
            .state
            .lock()
            .events
            .iter()
            .filter(|event| event.time_generated >= since)
            .cloned()
            .collect())
    }
}
