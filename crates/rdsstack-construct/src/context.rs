//! Cached lookup values.
//!
//! Lookups of pre-existing infrastructure (such as a VPC) are answered from
//! a JSON context file keyed by provider and query. A miss is recorded as
//! [`MissingContext`] and turns into a synthesis error, so the program never
//! emits a template built from a placeholder.

use std::collections::BTreeMap;
use std::path::Path;

use rdsstack_common::error::{Result, StackError};

/// Key/value store of lookup results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStore {
    values: BTreeMap<String, serde_json::Value>,
}

impl ContextStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a context file. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no context file, starting empty");
            return Ok(Self::new());
        }
        tracing::info!(path = %path.display(), "loading context");
        let content = std::fs::read_to_string(path).map_err(|e| StackError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;
        Ok(Self { values })
    }

    /// Returns the cached value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Caches a value.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        let _ = self.values.insert(key.into(), value);
    }

    /// Number of cached values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A lookup that could not be answered from the context store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingContext {
    /// Context key that was queried.
    pub key: String,
    /// Lookup provider, e.g. `vpc-provider`.
    pub provider: &'static str,
    /// Stack that performed the lookup.
    pub stack: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ContextStore::load(&dir.path().join("cdk.context.json")).expect("load");
        assert!(store.is_empty());
    }

    #[test]
    fn load_reads_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cdk.context.json");
        std::fs::write(&path, r#"{"vpc-provider:x": {"vpcId": "vpc-1"}}"#).expect("write");

        let store = ContextStore::load(&path).expect("load");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("vpc-provider:x").and_then(|v| v.get("vpcId")),
            Some(&serde_json::json!("vpc-1"))
        );
    }

    #[test]
    fn non_object_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cdk.context.json");
        std::fs::write(&path, "[1, 2]").expect("write");
        assert!(ContextStore::load(&path).is_err());
    }
}
