//! Domain primitive types used across the rdsstack workspace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ENV_ACCOUNT, ENV_REGION};

/// Account and region a stack is bound to.
///
/// Either field may be unset, which makes the stack environment-agnostic.
/// Agnostic stacks can still be synthesized but cannot perform lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Target account identifier.
    pub account: Option<String>,
    /// Target region.
    pub region: Option<String>,
}

impl Environment {
    /// Creates a concrete environment.
    #[must_use]
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// Reads `CDK_DEFAULT_ACCOUNT` and `CDK_DEFAULT_REGION`.
    ///
    /// Unset or empty variables leave the corresponding field unset.
    #[must_use]
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let env = Self {
            account: read(ENV_ACCOUNT),
            region: read(ENV_REGION),
        };
        tracing::debug!(environment = %env, "resolved deployment environment");
        env
    }

    /// Returns `true` when account or region is unknown.
    #[must_use]
    pub const fn is_agnostic(&self) -> bool {
        self.account.is_none() || self.region.is_none()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

/// Ordered tag mapping (key to value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a tag, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.0.insert(key.into(), value.into());
    }

    /// Returns the value of a tag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` when no tags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the union of `self` and `overrides`.
    ///
    /// On key collision the value from `overrides` wins.
    #[must_use]
    pub fn merged(&self, overrides: &Self) -> Self {
        let mut out = self.clone();
        for (k, v) in overrides.iter() {
            out.insert(k, v);
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Construct naming convention.
///
/// Every construct id of a stack is derived through [`Naming::item`], so the
/// prefix travels with the assembly calls instead of living in a global.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Naming {
    prefix: String,
}

impl Naming {
    /// Creates a naming convention with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Naming without a prefix: items keep their bare names.
    #[must_use]
    pub fn unprefixed() -> Self {
        Self::default()
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefixes `item` with the naming prefix.
    #[must_use]
    pub fn item(&self, item: &str) -> String {
        format!("{}{item}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_display_uses_placeholders_when_agnostic() {
        let env = Environment::default();
        assert!(env.is_agnostic());
        assert_eq!(env.to_string(), "aws://unknown-account/unknown-region");
    }

    #[test]
    fn environment_display_concrete() {
        let env = Environment::new("123456789012", "us-east-1");
        assert!(!env.is_agnostic());
        assert_eq!(env.to_string(), "aws://123456789012/us-east-1");
    }

    #[test]
    fn tags_merge_prefers_overrides() {
        let global: Tags = [("team", "db"), ("env", "dev")].into_iter().collect();
        let config: Tags = [("env", "prod"), ("owner", "ops")].into_iter().collect();

        let merged = global.merged(&config);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("team"), Some("db"));
        assert_eq!(merged.get("env"), Some("prod"));
        assert_eq!(merged.get("owner"), Some("ops"));
    }

    #[test]
    fn tags_merge_with_empty_sides() {
        let some: Tags = [("a", "1")].into_iter().collect();
        assert_eq!(Tags::new().merged(&some), some);
        assert_eq!(some.merged(&Tags::new()), some);
    }

    #[test]
    fn naming_prefixes_items() {
        let naming = Naming::new("AcornRdsCluster");
        assert_eq!(naming.item("SG"), "AcornRdsClusterSG");
        assert_eq!(naming.item("-host"), "AcornRdsCluster-host");
        assert_eq!(Naming::unprefixed().item("SG"), "SG");
    }
}
