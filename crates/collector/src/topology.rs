use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use scom_config::RuleFilter;
use scom_gateway::{
    Class, ClassId, Group, GroupId, Instance, InstanceId, ManagementGateway, Monitor, MonitorId,
    Reconnecting, Rule, RuleCategory, RuleId, TraversalDepth,
};
use tracing::debug;

/// Everything the scrape loop and the partitioner need to know about the management group.
///
/// Built in full by [`TopologySnapshot::fetch`] and installed with a single swap; never
/// modified afterwards.
#[derive(Clone, Debug, Default)]
pub struct TopologySnapshot {
    /// Enabled performance collection rules that pass the rule filter.
    pub rules: HashMap<RuleId, Rule>,
    /// Classes targeted by `rules`.
    pub classes: HashMap<ClassId, Class>,
    /// Root monitoring groups.
    pub groups: Vec<Group>,
    /// Instances of `classes`.
    pub instances: HashMap<InstanceId, Instance>,
    /// All monitors.
    pub monitors: HashMap<MonitorId, Monitor>,
    /// Resolved members of each group.
    pub group_membership: HashMap<GroupId, Arc<HashSet<InstanceId>>>,
    /// When the snapshot was taken; `None` for the empty startup snapshot.
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl TopologySnapshot {
    pub(crate) async fn fetch<G>(
        gateway: &Reconnecting<G>,
        rule_filter: &RuleFilter,
    ) -> Result<Self, G::Error>
    where
        G: ManagementGateway,
    {
        let rules: HashMap<RuleId, Rule> = gateway
            .call(|g| g.rules())
            .await?
            .into_iter()
            .filter(|rule| {
                rule.category == RuleCategory::PerformanceCollection
                    && rule.enabled
                    && rule_filter.matches(&rule.name)
            })
            .map(|rule| (rule.id, rule))
            .collect();
        debug!("{} performance rules selected", rules.len());

        let groups = gateway.call(|g| g.root_groups()).await?;

        let class_ids: Vec<ClassId> = rules
            .values()
            .map(|rule| rule.target_class_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let classes = if class_ids.is_empty() {
            Vec::new()
        } else {
            let class_ids = class_ids.as_slice();
            gateway.call(move |g| g.classes(class_ids)).await?
        };

        let per_class = try_join_all(classes.iter().map(|class| {
            let class_id = &class.id;
            gateway.call(move |g| g.instances_of_class(class_id))
        }))
        .await?;
        let instances: HashMap<InstanceId, Instance> = per_class
            .into_iter()
            .flatten()
            .map(|instance| (instance.id, instance))
            .collect();

        let monitors = gateway
            .call(|g| g.monitors())
            .await?
            .into_iter()
            .map(|monitor| (monitor.id, monitor))
            .collect();

        let mut group_membership = HashMap::with_capacity(groups.len());
        for group in &groups {
            let group_id = &group.id;
            let mut members = HashSet::new();
            for class in gateway.call(move |g| g.most_derived_classes(group_id)).await? {
                let class_id = &class.id;
                let related = gateway
                    .call(move |g| g.related_instances(class_id, TraversalDepth::Recursive))
                    .await?;
                members.extend(related.into_iter().map(|instance| instance.id));
            }
            debug!("group {} has {} members", group.full_name, members.len());
            group_membership.insert(group.id, Arc::new(members));
        }

        Ok(Self {
            rules,
            classes: classes.into_iter().map(|class| (class.id, class)).collect(),
            groups,
            instances,
            monitors,
            group_membership,
            refreshed_at: Some(Utc::now()),
        })
    }

    /// Finds a group by case-insensitive full name.
    #[must_use]
    pub fn group_by_name(&self, full_name: &str) -> Option<&Group> {
        self.groups
            .iter()
            .find(|group| group.full_name.eq_ignore_ascii_case(full_name))
    }

    /// Number of distinct instances that belong to at least one group.
    #[must_use]
    pub fn monitoring_object_count(&self) -> usize {
        self.group_membership
            .values()
            .flat_map(|members| members.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}
