//! Resource dependency graph using `petgraph`.
//!
//! Builds a directed acyclic graph from the references between the
//! resources of one stack and resolves a creation order.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use rdsstack_common::error::{Result, StackError};

use crate::tree::{ConstructTree, NodeId, NodeKind};

/// A dependency graph of the resources of one stack.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Stack name, used in error messages.
    stack: String,
    /// Internal petgraph representation.
    graph: petgraph::Graph<NodeId, ()>,
    /// Construct to graph node mapping.
    index: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            graph: petgraph::Graph::new(),
            index: HashMap::new(),
        }
    }

    /// Builds the graph of every resource in `stack`.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource refers to a construct that is not a
    /// resource or that lives in another stack.
    pub fn for_stack(tree: &ConstructTree, stack: NodeId) -> Result<Self> {
        let mut graph = Self::new(tree.node(stack).id());
        let resources: Vec<NodeId> = tree
            .subtree(stack)
            .into_iter()
            .filter(|&n| tree.resource(n).is_some())
            .collect();

        for &res in &resources {
            let _ = graph.add_resource(res);
        }

        for &res in &resources {
            let Some(node) = tree.resource(res) else {
                continue;
            };
            for target in node.references() {
                check_reference(tree, stack, res, target)?;
                graph.add_dependency(res, target);
            }
        }

        tracing::debug!(
            stack = %graph.stack,
            resources = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "built dependency graph"
        );
        Ok(graph)
    }

    /// Adds a resource node to the graph; adding twice is a no-op.
    pub fn add_resource(&mut self, resource: NodeId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&resource) {
            return idx;
        }
        let idx = self.graph.add_node(resource);
        let _ = self.index.insert(resource, idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: NodeId, dependency: NodeId) {
        let from = self.add_resource(dependency);
        let to = self.add_resource(dependent);
        if self.graph.find_edge(from, to).is_none() {
            let _ = self.graph.add_edge(from, to, ());
        }
    }

    /// Returns a creation order: dependencies first.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<NodeId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).copied())
                .collect()),
            Err(_cycle) => Err(StackError::CyclicDependency {
                stack: self.stack.clone(),
            }),
        }
    }
}

/// Checks that `to` is a resource of `stack`.
pub(crate) fn check_reference(
    tree: &ConstructTree,
    stack: NodeId,
    from: NodeId,
    to: NodeId,
) -> Result<()> {
    if to.index() >= tree.len() || !matches!(tree.node(to).kind, NodeKind::Resource(_)) {
        return Err(StackError::UnresolvableReference {
            from: tree.path(from),
            to: if to.index() < tree.len() {
                tree.path(to)
            } else {
                format!("#{to}")
            },
        });
    }
    if tree.stack_of(to) != Some(stack) {
        return Err(StackError::CrossStackReference {
            from: tree.path(from),
            to: tree.path(to),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rdsstack_common::types::Tags;

    use super::*;
    use crate::resources::{CfnDbSubnetGroup, CfnResource, CfnSecretTargetAttachment, ResourceNode};
    use crate::token::Value;
    use crate::tree::StackProps;

    fn subnet_group() -> ResourceNode {
        ResourceNode::new(CfnResource::DbSubnetGroup(CfnDbSubnetGroup {
            description: "d".into(),
            subnet_ids: Vec::new(),
            tags: Tags::new(),
        }))
    }

    fn attachment(secret: Value, target: Value) -> ResourceNode {
        ResourceNode::new(CfnResource::SecretTargetAttachment(CfnSecretTargetAttachment {
            secret,
            target,
            target_type: "AWS::RDS::DBCluster".into(),
        }))
    }

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = DependencyGraph::new("s");
        let order = graph.resolve_order().expect("should resolve");
        assert!(order.is_empty());
    }

    #[test]
    fn references_order_dependencies_first() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let a = tree.add_resource(stack, "A", subnet_group()).expect("a");
        let b = tree.add_resource(stack, "B", subnet_group()).expect("b");
        let att = tree
            .add_resource(stack, "Att", attachment(Value::Ref(b), Value::Ref(a)))
            .expect("att");

        let graph = DependencyGraph::for_stack(&tree, stack).expect("graph");
        let order = graph.resolve_order().expect("should resolve");
        let pos = |n: NodeId| order.iter().position(|&o| o == n).expect("present");
        assert_eq!(order.len(), 3);
        assert!(pos(a) < pos(att));
        assert!(pos(b) < pos(att));
    }

    #[test]
    fn explicit_depends_on_is_an_edge() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let a = tree.add_resource(stack, "A", subnet_group()).expect("a");
        let b = tree
            .add_resource(stack, "B", subnet_group().with_dependency(a))
            .expect("b");

        let order = DependencyGraph::for_stack(&tree, stack)
            .and_then(|g| g.resolve_order())
            .expect("order");
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn cycle_detection() {
        let mut graph = DependencyGraph::new("s");
        let a = NodeId::from_index(1);
        let b = NodeId::from_index(2);
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        let msg = graph.resolve_order().unwrap_err().to_string();
        assert!(msg.contains("cyclic"), "got: {msg}");
    }

    #[test]
    fn cross_stack_reference_is_rejected() {
        let mut tree = ConstructTree::new();
        let one = tree.add_stack("one", StackProps::default()).expect("one");
        let two = tree.add_stack("two", StackProps::default()).expect("two");
        let foreign = tree.add_resource(two, "A", subnet_group()).expect("a");
        let _ = tree
            .add_resource(one, "Att", attachment(Value::Ref(foreign), Value::literal("x")))
            .expect("att");

        let err = DependencyGraph::for_stack(&tree, one).unwrap_err();
        assert!(matches!(err, StackError::CrossStackReference { .. }), "got: {err}");
    }

    #[test]
    fn reference_to_non_resource_is_rejected() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let _ = tree
            .add_resource(stack, "Att", attachment(Value::Ref(stack), Value::literal("x")))
            .expect("att");

        let err = DependencyGraph::for_stack(&tree, stack).unwrap_err();
        assert!(matches!(err, StackError::UnresolvableReference { .. }), "got: {err}");
    }
}
