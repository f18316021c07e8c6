//! Cluster admission filters.

use crate::{ops::ParseError, Tags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selects clusters by name, by tag or unconditionally.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    pub kube_match_tags: BTreeMap<String, String>,
    pub kube_match_names: Vec<String>,
    pub kube_match_any: bool,
}

/// Combines the operator's configured filter with an optional filter supplied
/// by the caller of a single run.
///
/// A cluster is admitted only if both filters admit it; a missing caller
/// filter admits everything.
#[derive(Clone, Debug, Default)]
pub struct TagMatcher {
    operator: Filter,
    caller: Option<Filter>,
}

// === impl Filter ===

impl Filter {
    /// Matches every cluster.
    pub fn example_match_any() -> Self {
        Self::default().match_any()
    }

    pub fn example_match_names() -> Self {
        Self::default().with_name("cluster-1").with_name("cluster-2")
    }

    pub fn example_match_tags() -> Self {
        Self::default()
            .with_tag("environment", "production")
            .with_tag("cloud-operator", "enabled")
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.kube_match_names.push(name.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kube_match_tags.insert(key.into(), value.into());
        self
    }

    pub fn match_any(mut self) -> Self {
        self.kube_match_any = true;
        self
    }

    /// True if the filter selects nothing at all.
    pub fn is_empty(&self) -> bool {
        !self.kube_match_any && self.kube_match_names.is_empty() && self.kube_match_tags.is_empty()
    }

    pub fn matches(&self, name: &str, tags: &Tags) -> bool {
        if self.kube_match_any {
            return true;
        }

        if self.kube_match_names.iter().any(|n| n == name) {
            return true;
        }

        self.kube_match_tags
            .iter()
            .any(|(k, v)| tags.get(k).map(|t| t == v).unwrap_or(false))
    }

    /// Parses a `key:value,key2:value2` list as used by the environment.
    pub fn parse_tags(s: &str) -> Result<BTreeMap<String, String>, ParseError> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|kv| match kv.split_once(':') {
                Some((k, v)) if !k.trim().is_empty() && !v.contains(':') => {
                    Ok((k.trim().to_string(), v.trim().to_string()))
                }
                _ => Err(ParseError::new("tag", kv)),
            })
            .collect()
    }
}

// === impl TagMatcher ===

impl TagMatcher {
    pub fn new(operator: Filter, caller: Option<Filter>) -> Self {
        Self { operator, caller }
    }

    pub fn matches(&self, name: &str, tags: &Tags) -> bool {
        if !self.operator.matches(name, tags) {
            return false;
        }

        self.caller
            .as_ref()
            .map(|f| f.matches(name, tags))
            .unwrap_or(true)
    }
}
