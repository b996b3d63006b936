//! Construct tree.
//!
//! Constructs live in an arena owned by [`ConstructTree`] and are addressed
//! by [`NodeId`]. The root is the app; stacks are its direct children and
//! every other construct lives inside exactly one stack.

use std::fmt;

use rdsstack_common::error::{Result, StackError};
use rdsstack_common::types::{Environment, Tags};

use crate::aspect::{Aspect, TagAspect};
use crate::context::{ContextStore, MissingContext};
use crate::resources::{CfnOutput, ResourceNode};

/// Handle to a construct in a [`ConstructTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Arena index of the construct.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackProps {
    /// Account and region the stack deploys to.
    pub env: Environment,
    /// Tags applied to every taggable resource of the stack.
    pub tags: Tags,
    /// Template description.
    pub description: Option<String>,
    /// Whether the template checks the bootstrap stack version.
    pub generate_bootstrap_version_rule: bool,
}

impl Default for StackProps {
    fn default() -> Self {
        Self {
            env: Environment::default(),
            tags: Tags::new(),
            description: None,
            generate_bootstrap_version_rule: true,
        }
    }
}

/// High-level constructs. They render nothing themselves and group the
/// low-level resources they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructKind {
    /// Imported VPC resolved through a context lookup.
    VpcLookup,
    /// Database subnet group.
    SubnetGroup,
    /// EC2 security group.
    SecurityGroup,
    /// Generated database credentials secret.
    DatabaseSecret,
    /// Auto-pausing serverless cluster.
    ServerlessCluster,
    /// Provisioned cluster with instances.
    DatabaseCluster,
}

/// What a node of the tree is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Root of the tree.
    App,
    /// A deployable unit rendered to one template.
    Stack(StackProps),
    /// A high-level construct.
    Construct(ConstructKind),
    /// A low-level resource rendered into the template.
    Resource(ResourceNode),
    /// A stack output.
    Output(CfnOutput),
}

/// A construct in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Kind and payload of the construct.
    pub kind: NodeKind,
}

impl Node {
    /// Construct id, unique among its siblings.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parent construct, `None` for the app.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in creation order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the resource payload if this node is a resource.
    #[must_use]
    pub const fn as_resource(&self) -> Option<&ResourceNode> {
        match &self.kind {
            NodeKind::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable access to the resource payload.
    pub const fn as_resource_mut(&mut self) -> Option<&mut ResourceNode> {
        match &mut self.kind {
            NodeKind::Resource(r) => Some(r),
            _ => None,
        }
    }
}

/// Arena-backed construct tree with the lookups and aspects attached to it.
#[derive(Debug)]
pub struct ConstructTree {
    nodes: Vec<Node>,
    aspects: Vec<(NodeId, Box<dyn Aspect>)>,
    context: ContextStore,
    missing: Vec<MissingContext>,
}

impl ConstructTree {
    /// Creates a tree containing only the app root and no cached context.
    #[must_use]
    pub fn new() -> Self {
        Self::with_context(ContextStore::default())
    }

    /// Creates a tree whose lookups are served from `context`.
    #[must_use]
    pub fn with_context(context: ContextStore) -> Self {
        Self {
            nodes: vec![Node {
                id: String::new(),
                parent: None,
                children: Vec::new(),
                kind: NodeKind::App,
            }],
            aspects: Vec::new(),
            context,
            missing: Vec::new(),
        }
    }

    /// The app root.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of constructs, the app root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree holds at least the app root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a node.
    ///
    /// Ids are only handed out by this tree, so indexing cannot fail for ids
    /// obtained from it.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Returns a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Returns the resource payload of `id`, if it is a resource.
    #[must_use]
    pub fn resource(&self, id: NodeId) -> Option<&ResourceNode> {
        self.node(id).as_resource()
    }

    /// Mutable resource payload of `id`, if it is a resource.
    pub fn resource_mut(&mut self, id: NodeId) -> Option<&mut ResourceNode> {
        self.node_mut(id).as_resource_mut()
    }

    /// Adds a stack under the app.
    ///
    /// Stack tags are registered as tag aspects on the stack, so they reach
    /// every taggable resource inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or already taken.
    pub fn add_stack(&mut self, id: &str, props: StackProps) -> Result<NodeId> {
        let tags = props.tags.clone();
        let stack = self.add_child(self.root(), id, NodeKind::Stack(props))?;
        for (key, value) in tags.iter() {
            self.add_aspect(stack, TagAspect::new(key, value));
        }
        tracing::debug!(stack = id, tags = tags.len(), "added stack");
        Ok(stack)
    }

    /// Adds a high-level construct.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or already taken.
    pub fn add_construct(
        &mut self,
        parent: NodeId,
        id: &str,
        kind: ConstructKind,
    ) -> Result<NodeId> {
        self.add_child(parent, id, NodeKind::Construct(kind))
    }

    /// Adds a low-level resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or already taken.
    pub fn add_resource(
        &mut self,
        parent: NodeId,
        id: &str,
        resource: ResourceNode,
    ) -> Result<NodeId> {
        self.add_child(parent, id, NodeKind::Resource(resource))
    }

    /// Adds a stack output.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or already taken.
    pub fn add_output(&mut self, parent: NodeId, id: &str, output: CfnOutput) -> Result<NodeId> {
        self.add_child(parent, id, NodeKind::Output(output))
    }

    fn add_child(&mut self, parent: NodeId, id: &str, kind: NodeKind) -> Result<NodeId> {
        if id.is_empty() {
            return Err(StackError::InvalidId {
                id: id.into(),
                message: "construct ids must not be empty".into(),
            });
        }
        if id.contains('/') {
            return Err(StackError::InvalidId {
                id: id.into(),
                message: "construct ids must not contain '/'".into(),
            });
        }
        if self.find_child(parent, id).is_some() {
            return Err(StackError::DuplicateConstruct {
                parent: self.display_path(parent),
                id: id.into(),
            });
        }

        let node = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id: id.into(),
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(node);
        Ok(node)
    }

    /// Finds a direct child by id.
    #[must_use]
    pub fn find_child(&self, parent: NodeId, id: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&c| self.node(c).id == id)
    }

    /// Ids from the top-level stack down to `id`, excluding the app root.
    #[must_use]
    pub fn path_components(&self, id: NodeId) -> Vec<&str> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(n) = cur {
            let node = self.node(n);
            if node.parent.is_some() {
                out.push(node.id.as_str());
            }
            cur = node.parent;
        }
        out.reverse();
        out
    }

    /// Slash-separated construct path, e.g. `bill/AcornRdsClusterSG/Resource`.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        self.path_components(id).join("/")
    }

    fn display_path(&self, id: NodeId) -> String {
        if id == self.root() {
            "the app".into()
        } else {
            self.path(id)
        }
    }

    /// The stack containing `id`, or `id` itself when it is a stack.
    #[must_use]
    pub fn stack_of(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if matches!(self.node(n).kind, NodeKind::Stack(_)) {
                return Some(n);
            }
            cur = self.node(n).parent;
        }
        None
    }

    /// Like [`Self::stack_of`] but fails for constructs outside a stack.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::NoStack`] if `id` is not inside a stack.
    pub fn require_stack(&self, id: NodeId) -> Result<NodeId> {
        self.stack_of(id).ok_or_else(|| StackError::NoStack {
            path: self.display_path(id),
        })
    }

    /// Settings of a stack node.
    #[must_use]
    pub fn stack_props(&self, stack: NodeId) -> Option<&StackProps> {
        match &self.node(stack).kind {
            NodeKind::Stack(props) => Some(props),
            _ => None,
        }
    }

    /// All stacks in creation order.
    #[must_use]
    pub fn stacks(&self) -> Vec<NodeId> {
        self.node(self.root())
            .children
            .iter()
            .copied()
            .filter(|&c| matches!(self.node(c).kind, NodeKind::Stack(_)))
            .collect()
    }

    /// `scope` and all of its descendants in preorder.
    #[must_use]
    pub fn subtree(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.node(n).children.iter().rev().copied());
        }
        out
    }

    /// Registers an aspect on `scope`.
    pub fn add_aspect(&mut self, scope: NodeId, aspect: impl Aspect + 'static) {
        self.aspects.push((scope, Box::new(aspect)));
    }

    /// Number of registered aspects.
    #[must_use]
    pub fn aspect_count(&self) -> usize {
        self.aspects.len()
    }

    /// Applies every registered aspect to its scope's subtree.
    ///
    /// Aspects run in registration order, each visiting its subtree in
    /// preorder. Applying again is harmless as long as the aspects are
    /// idempotent, which all aspects in this workspace are.
    pub fn apply_aspects(&mut self) {
        let aspects = std::mem::take(&mut self.aspects);
        for (scope, aspect) in &aspects {
            tracing::debug!(scope = %self.path(*scope), aspect = ?aspect, "applying aspect");
            for n in self.subtree(*scope) {
                aspect.visit(&mut self.nodes[n.0]);
            }
        }
        self.aspects = aspects;
    }

    /// Cached lookup values.
    #[must_use]
    pub const fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Records a lookup that had no cached value.
    pub fn report_missing_context(&mut self, missing: MissingContext) {
        tracing::warn!(key = %missing.key, provider = missing.provider, "context value missing");
        if !self.missing.iter().any(|m| m.key == missing.key) {
            self.missing.push(missing);
        }
    }

    /// Lookups that had no cached value.
    #[must_use]
    pub fn missing_context(&self) -> &[MissingContext] {
        &self.missing
    }

    /// Template logical id of `id`, derived from its path below the stack.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not inside a stack or is the stack itself.
    pub fn logical_id(&self, id: NodeId) -> Result<String> {
        let stack = self.require_stack(id)?;
        if stack == id {
            return Err(StackError::InvalidId {
                id: self.node(id).id.clone(),
                message: "a stack has no logical id".into(),
            });
        }
        let components = self.path_components(id);
        Ok(crate::logical_id::allocate(&components[1..]))
    }
}

impl Default for ConstructTree {
    fn default() -> Self {
        Self::new()
    }
}
