//! Serverless v2 capacity bounds, applied as an aspect.

use rdsstack_common::constants::{SERVERLESS_V2_MAX_CAPACITY, SERVERLESS_V2_MIN_CAPACITY};
use rdsstack_construct::resources::{CfnResource, ServerlessV2Scaling};
use rdsstack_construct::{Aspect, Node, NodeKind};

/// Sets `ServerlessV2ScalingConfiguration` on every cluster it visits.
///
/// Only `AWS::RDS::DBCluster` resources are touched. Visiting twice leaves
/// the same bounds in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerlessV2ScalingAspect {
    min_capacity: f64,
    max_capacity: f64,
}

impl ServerlessV2ScalingAspect {
    /// Aspect with explicit bounds in ACUs.
    #[must_use]
    pub const fn new(min_capacity: f64, max_capacity: f64) -> Self {
        Self {
            min_capacity,
            max_capacity,
        }
    }
}

impl Default for ServerlessV2ScalingAspect {
    fn default() -> Self {
        Self::new(SERVERLESS_V2_MIN_CAPACITY, SERVERLESS_V2_MAX_CAPACITY)
    }
}

impl Aspect for ServerlessV2ScalingAspect {
    fn visit(&self, node: &mut Node) {
        if let NodeKind::Resource(res) = &mut node.kind {
            if let CfnResource::DbCluster(cluster) = &mut res.resource {
                cluster.serverless_v2_scaling = Some(ServerlessV2Scaling {
                    min_capacity: self.min_capacity,
                    max_capacity: self.max_capacity,
                });
            }
        }
    }
}
