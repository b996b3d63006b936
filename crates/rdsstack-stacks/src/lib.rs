//! # rdsstack-stacks
//!
//! Database infrastructure assembled on top of `rdsstack-construct`.
//!
//! Handles:
//! - **Network**: VPC lookup, subnet group, and database security group.
//! - **Credentials**: Generated master secret and its cluster attachment.
//! - **Cluster**: Serverless (v1) and provisioned Aurora MySQL clusters.
//! - **Scaling**: Serverless v2 capacity bounds as an aspect.
//! - **Outputs**: Connection outputs derived from the cluster endpoint.
//! - **Programs**: The basic and serverless v2 stacks.

pub mod basic;
pub mod cluster;
pub mod credentials;
pub mod network;
pub mod outputs;
pub mod scaling;
pub mod serverless_v2;

use rdsstack_common::config::Configuration;
use rdsstack_common::error::Result;
use rdsstack_common::types::Tags;
use rdsstack_construct::{ConstructTree, NodeId};

pub use basic::{BasicStack, build_basic_stack};
pub use serverless_v2::{ServerlessV2Stack, build_serverless_v2_stack};

/// The two stack programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Auto-pausing serverless cluster with fixed settings.
    Basic,
    /// Configurable cluster with a serverless v2 instance.
    ServerlessV2,
}

impl Variant {
    /// Builds the variant's stack into `tree` and returns the stack node.
    ///
    /// # Errors
    ///
    /// Returns an error if construction fails.
    pub fn build(self, tree: &mut ConstructTree, config: &Configuration, global_tags: &Tags) -> Result<NodeId> {
        match self {
            Self::Basic => build_basic_stack(tree, config, global_tags).map(|s| s.stack),
            Self::ServerlessV2 => build_serverless_v2_stack(tree, config, global_tags).map(|s| s.stack),
        }
    }
}
