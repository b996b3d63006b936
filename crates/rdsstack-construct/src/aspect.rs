//! Aspects: visitors applied to a subtree right before synthesis.
//!
//! An aspect is registered on a scope with
//! [`ConstructTree::add_aspect`](crate::tree::ConstructTree::add_aspect) and
//! later visits every node below that scope. Implementations pick the nodes
//! they care about by matching on [`NodeKind`].

use std::fmt;

use crate::tree::{Node, NodeKind};

/// A visitor over construct nodes.
pub trait Aspect: fmt::Debug {
    /// Visits one node; may mutate it.
    fn visit(&self, node: &mut Node);
}

/// Sets one tag on every taggable resource of a subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAspect {
    key: String,
    value: String,
}

impl TagAspect {
    /// Creates a tag aspect.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Aspect for TagAspect {
    fn visit(&self, node: &mut Node) {
        if let NodeKind::Resource(res) = &mut node.kind {
            if let Some(tags) = res.resource.tags_mut() {
                tags.insert(self.key.as_str(), self.value.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rdsstack_common::types::Tags;

    use super::*;
    use crate::resources::{
        CfnDbSubnetGroup, CfnResource, CfnSecretTargetAttachment, ResourceNode,
    };
    use crate::token::Value;
    use crate::tree::{ConstructKind, ConstructTree, StackProps};

    fn subnet_group() -> ResourceNode {
        ResourceNode::new(CfnResource::DbSubnetGroup(CfnDbSubnetGroup {
            description: "d".into(),
            subnet_ids: vec!["subnet-1".into()],
            tags: Tags::new(),
        }))
    }

    #[test]
    fn tag_aspect_tags_only_its_subtree() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let cluster = tree
            .add_construct(stack, "Cluster", ConstructKind::ServerlessCluster)
            .expect("cluster");
        let inside = tree
            .add_resource(cluster, "Subnets", subnet_group())
            .expect("inside");
        let outside = tree
            .add_resource(stack, "Other", subnet_group())
            .expect("outside");

        tree.add_aspect(cluster, TagAspect::new("AcornSVC", "owned"));
        tree.apply_aspects();

        let tags_of = |id| {
            tree.resource(id)
                .and_then(|r| r.resource.tags().cloned())
                .expect("taggable")
        };
        assert_eq!(tags_of(inside).get("AcornSVC"), Some("owned"));
        assert!(tags_of(outside).is_empty());
    }

    #[test]
    fn tag_aspect_skips_untaggable_resources() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let attachment = ResourceNode::new(CfnResource::SecretTargetAttachment(
            CfnSecretTargetAttachment {
                secret: Value::literal("s"),
                target: Value::literal("t"),
                target_type: "AWS::RDS::DBCluster".into(),
            },
        ));
        let id = tree.add_resource(stack, "Attachment", attachment.clone()).expect("add");

        tree.add_aspect(stack, TagAspect::new("k", "v"));
        tree.apply_aspects();

        assert_eq!(tree.resource(id), Some(&attachment));
    }

    #[test]
    fn later_tags_override_earlier_ones() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let id = tree.add_resource(stack, "Subnets", subnet_group()).expect("add");

        tree.add_aspect(stack, TagAspect::new("env", "dev"));
        tree.add_aspect(stack, TagAspect::new("env", "prod"));
        tree.apply_aspects();
        tree.apply_aspects();

        let tags = tree
            .resource(id)
            .and_then(|r| r.resource.tags().cloned())
            .expect("taggable");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("env"), Some("prod"));
    }
}
