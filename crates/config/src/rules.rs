use crate::error::{Error, Result};

use std::collections::{HashMap, HashSet};

use regex::Regex;
use scom_naming::is_valid_metric_name;

/// Selects performance rules by name.
///
/// Include and exclude lists are mutually exclusive, so a filter is one or the other.
#[derive(Clone, Debug, Default)]
pub enum RuleFilter {
    /// Every rule passes.
    #[default]
    All,
    /// A rule passes if any pattern matches its name.
    Include(Vec<Regex>),
    /// A rule passes if no pattern matches its name.
    Exclude(Vec<Regex>),
}

impl RuleFilter {
    /// Builds a filter from the raw include and exclude lists.
    ///
    /// An empty list behaves like an absent one, but setting both lists is an error even
    /// when one of them is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if both lists are given or a pattern does not compile.
    pub fn new(include: Option<Vec<String>>, exclude: Option<Vec<String>>) -> Result<Self> {
        match (include, exclude) {
            (Some(_), Some(_)) => Err(Error::ConflictingRuleFilters),
            (Some(include), None) if !include.is_empty() => Ok(Self::Include(compile(include)?)),
            (None, Some(exclude)) if !exclude.is_empty() => Ok(Self::Exclude(compile(exclude)?)),
            _ => Ok(Self::All),
        }
    }

    /// Whether a rule with the given name is collected.
    #[must_use]
    pub fn matches(&self, rule_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(patterns) => patterns.iter().any(|p| p.is_match(rule_name)),
            Self::Exclude(patterns) => !patterns.iter().any(|p| p.is_match(rule_name)),
        }
    }
}

fn compile(patterns: Vec<String>) -> Result<Vec<Regex>> {
    patterns
        .into_iter()
        .map(|pattern| {
            Regex::new(&pattern).map_err(|source| Error::InvalidRulePattern { pattern, source })
        })
        .collect()
}

/// Metric name overrides keyed by lowercase rule name.
#[derive(Clone, Debug, Default)]
pub struct CounterMap(HashMap<String, String>);

impl CounterMap {
    /// Validates and normalizes a raw rule name to metric name map.
    ///
    /// # Errors
    ///
    /// Returns an error if two rule names differ only in case, two rules map to the same
    /// name, or a name is not a valid metric name.
    pub fn new(raw: HashMap<String, String>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(raw.len());
        let mut map = HashMap::with_capacity(raw.len());

        for (rule_name, metric_name) in raw {
            if !is_valid_metric_name(&metric_name) {
                return Err(Error::InvalidMetricName(metric_name));
            }
            if !seen.insert(metric_name.clone()) {
                return Err(Error::DuplicateCounterMapping(metric_name));
            }
            if map.insert(rule_name.to_lowercase(), metric_name).is_some() {
                return Err(Error::DuplicateCounterRule(rule_name));
            }
        }

        Ok(Self(map))
    }

    /// The override for a rule, looked up case-insensitively.
    #[must_use]
    pub fn get(&self, rule_name: &str) -> Option<&str> {
        self.0.get(&rule_name.to_lowercase()).map(String::as_str)
    }

    /// Number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
