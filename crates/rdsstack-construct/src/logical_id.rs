//! Logical ID allocation.
//!
//! Template identifiers are derived from the construct path below the
//! stack. `Default` components are dropped entirely, `Resource` components
//! are dropped from the readable part only. A top-level construct keeps its
//! id (minus non-alphanumerics); deeper constructs get an 8-character hash
//! suffix of the full path so that distinct paths never collide.

use sha2::{Digest, Sha256};

const HIDDEN_ID: &str = "Default";
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;
const MAX_ID_LEN: usize = 255;

/// Allocates a logical id for a path below the stack.
#[must_use]
pub fn allocate(components: &[&str]) -> String {
    let components: Vec<&str> = components
        .iter()
        .copied()
        .filter(|c| *c != HIDDEN_ID)
        .collect();

    if let [single] = components.as_slice() {
        let candidate = remove_non_alphanumeric(single);
        if candidate.len() <= MAX_ID_LEN {
            return candidate;
        }
    }

    let hash = path_hash(&components);
    let mut human: String = remove_dupes(&components)
        .into_iter()
        .filter(|c| *c != HIDDEN_FROM_HUMAN_ID)
        .map(remove_non_alphanumeric)
        .collect();
    human.truncate(MAX_HUMAN_LEN);
    human + &hash
}

fn path_hash(components: &[&str]) -> String {
    let digest = Sha256::digest(components.join("/").as_bytes());
    let mut hex = format!("{digest:X}");
    hex.truncate(HASH_LEN);
    hex
}

fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn remove_dupes<'a>(components: &[&'a str]) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::with_capacity(components.len());
    for c in components {
        if out.last() != Some(c) {
            out.push(*c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_ids_are_kept() {
        assert_eq!(allocate(&["AcornRdsCluster-host"]), "AcornRdsClusterhost");
        assert_eq!(allocate(&["host"]), "host");
    }

    #[test]
    fn default_child_is_hidden() {
        assert_eq!(allocate(&["SubnetGroup", "Default"]), "SubnetGroup");
    }

    #[test]
    fn nested_ids_get_a_hash_suffix() {
        let id = allocate(&["SG", "Resource"]);
        assert!(id.starts_with("SG"), "got: {id}");
        assert_eq!(id.len(), "SG".len() + HASH_LEN);
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn allocation_is_stable_and_distinct() {
        let a = allocate(&["Cluster", "Secret", "Resource"]);
        let b = allocate(&["Cluster", "Secret", "Resource"]);
        let c = allocate(&["Cluster", "Secret", "Attachment", "Resource"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn consecutive_duplicates_collapse_in_human_part() {
        let id = allocate(&["Cluster", "Cluster"]);
        assert!(id.starts_with("Cluster"));
        assert!(!id.starts_with("ClusterCluster"));
    }
}
