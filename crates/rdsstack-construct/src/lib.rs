//! # rdsstack-construct
//!
//! The construct layer every stack is described with.
//!
//! Handles:
//! - **Tree**: Arena of constructs rooted at an app, with stacks below it.
//! - **Token**: Deferred values (`Ref`, `Fn::GetAtt`, joins) and their string encoding.
//! - **Resources**: Low-level CloudFormation resource descriptors.
//! - **Aspect**: Visitors applied to a subtree before synthesis (tagging, fix-ups).
//! - **Logical ID**: Stable template identifiers derived from construct paths.
//! - **Graph**: Resource dependency ordering and cycle detection.
//! - **Synth**: Template and cloud assembly rendering.

pub mod aspect;
pub mod context;
pub mod graph;
pub mod logical_id;
pub mod resources;
pub mod synth;
pub mod token;
pub mod tree;

pub use aspect::{Aspect, TagAspect};
pub use context::{ContextStore, MissingContext};
pub use resources::{CfnOutput, CfnResource, RemovalPolicy, ResourceNode};
pub use synth::{CloudAssembly, StackArtifact, synthesize};
pub use token::Value;
pub use tree::{ConstructKind, ConstructTree, Node, NodeId, NodeKind, StackProps};
