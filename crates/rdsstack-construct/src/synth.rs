//! Template synthesis.
//!
//! Synthesis applies the registered aspects, refuses to continue while any
//! lookup is unanswered, orders the resources of each stack through the
//! dependency graph, and renders one CloudFormation template per stack.
//! [`CloudAssembly::write_to`] then writes the templates and a
//! `manifest.json` describing them.

use std::path::Path;

use rdsstack_common::constants::ASSEMBLY_VERSION;
use rdsstack_common::error::{Result, StackError};
use rdsstack_common::types::Environment;
use serde_json::{Map, json};

use crate::graph::{DependencyGraph, check_reference};
use crate::resources::{Property, ResourceNode};
use crate::token::Value;
use crate::tree::{ConstructTree, NodeId, NodeKind};

const BOOTSTRAP_PARAMETER: &str = "/cdk-bootstrap/hnb659fds/version";

/// A resource in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedResource {
    /// Construct of the resource.
    pub node: NodeId,
    /// Template logical id.
    pub logical_id: String,
    /// CloudFormation resource type.
    pub type_name: &'static str,
    /// Construct path.
    pub path: String,
}

/// One synthesized stack.
#[derive(Debug, Clone)]
pub struct StackArtifact {
    /// Stack name.
    pub stack_name: String,
    /// Target environment.
    pub environment: Environment,
    /// Rendered template.
    pub template: serde_json::Value,
    /// Resources, dependencies first.
    pub resource_order: Vec<PlannedResource>,
}

impl StackArtifact {
    /// File name of the template inside the assembly directory.
    #[must_use]
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.stack_name)
    }

    /// Template resource by logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&serde_json::Value> {
        self.template.get("Resources")?.get(logical_id)
    }

    /// Template resources of one type, keyed by logical id.
    #[must_use]
    pub fn resources_of_type(&self, type_name: &str) -> Vec<(&str, &serde_json::Value)> {
        self.template
            .get("Resources")
            .and_then(serde_json::Value::as_object)
            .map(|resources| {
                resources
                    .iter()
                    .filter(|(_, r)| {
                        r.get("Type").and_then(serde_json::Value::as_str) == Some(type_name)
                    })
                    .map(|(k, r)| (k.as_str(), r))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Names of the stack outputs.
    #[must_use]
    pub fn output_names(&self) -> Vec<&str> {
        self.template
            .get("Outputs")
            .and_then(serde_json::Value::as_object)
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Rendered `Value` of a stack output.
    #[must_use]
    pub fn output_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.template.get("Outputs")?.get(name)?.get("Value")
    }
}

/// All synthesized stacks of an app.
#[derive(Debug, Clone, Default)]
pub struct CloudAssembly {
    /// Stacks in creation order.
    pub stacks: Vec<StackArtifact>,
}

impl CloudAssembly {
    /// Finds a stack by name.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.stack_name == name)
    }

    /// The assembly manifest.
    #[must_use]
    pub fn manifest(&self) -> serde_json::Value {
        let artifacts: Map<String, serde_json::Value> = self
            .stacks
            .iter()
            .map(|s| {
                (
                    s.stack_name.clone(),
                    json!({
                        "type": "aws:cloudformation:stack",
                        "environment": s.environment.to_string(),
                        "properties": {
                            "templateFile": s.template_file(),
                            "validateOnSynth": false,
                        },
                        "displayName": s.stack_name,
                    }),
                )
            })
            .collect();
        json!({ "version": ASSEMBLY_VERSION, "artifacts": artifacts })
    }

    /// Writes every template and `manifest.json` into `outdir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn write_to(&self, outdir: &Path) -> Result<()> {
        std::fs::create_dir_all(outdir).map_err(|e| StackError::Io {
            path: outdir.to_path_buf(),
            source: e,
        })?;
        for stack in &self.stacks {
            let path = outdir.join(stack.template_file());
            write_json(&path, &stack.template)?;
            tracing::info!(stack = %stack.stack_name, path = %path.display(), "wrote template");
        }
        write_json(&outdir.join("manifest.json"), &self.manifest())
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content).map_err(|e| StackError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Synthesizes every stack of the tree.
///
/// # Errors
///
/// Returns [`StackError::MissingContext`] if a lookup had no cached value,
/// or an error if references are invalid or form a cycle.
pub fn synthesize(tree: &mut ConstructTree) -> Result<CloudAssembly> {
    tree.apply_aspects();

    let missing = tree.missing_context();
    if !missing.is_empty() {
        return Err(StackError::MissingContext {
            keys: missing.iter().map(|m| m.key.clone()).collect(),
        });
    }

    let tree: &ConstructTree = tree;
    let stacks = tree
        .stacks()
        .into_iter()
        .map(|stack| synthesize_stack(tree, stack))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(stacks = stacks.len(), "synthesized cloud assembly");
    Ok(CloudAssembly { stacks })
}

/// Resource creation order of one stack.
///
/// # Errors
///
/// Returns an error if references are invalid or form a cycle.
pub fn deployment_order(tree: &ConstructTree, stack: NodeId) -> Result<Vec<PlannedResource>> {
    let order = DependencyGraph::for_stack(tree, stack)?.resolve_order()?;
    order
        .into_iter()
        .filter_map(|id| tree.resource(id).map(|r| (id, r)))
        .map(|(id, r)| {
            Ok(PlannedResource {
                node: id,
                logical_id: tree.logical_id(id)?,
                type_name: r.resource.type_name(),
                path: tree.path(id),
            })
        })
        .collect()
}

fn synthesize_stack(tree: &ConstructTree, stack: NodeId) -> Result<StackArtifact> {
    let props = tree.stack_props(stack).ok_or_else(|| StackError::NoStack {
        path: tree.path(stack),
    })?;
    let stack_name = tree.node(stack).id().to_string();
    let resolver = Resolver { tree };

    let resource_order = deployment_order(tree, stack)?;
    let mut resources = Map::new();
    for planned in &resource_order {
        let Some(node) = tree.resource(planned.node) else {
            continue;
        };
        let rendered = resolver.resource(node)?;
        if resources.insert(planned.logical_id.clone(), rendered).is_some() {
            return Err(StackError::InvalidId {
                id: planned.logical_id.clone(),
                message: format!("logical id of {} collides with another resource", planned.path),
            });
        }
    }

    let mut outputs = Map::new();
    for id in tree.subtree(stack) {
        let NodeKind::Output(output) = &tree.node(id).kind else {
            continue;
        };
        let mut refs = Vec::new();
        output.value.collect_references(&mut refs);
        for target in refs {
            check_reference(tree, stack, id, target)?;
        }
        let mut entry = Map::new();
        if let Some(description) = &output.description {
            let _ = entry.insert("Description".into(), json!(description));
        }
        let _ = entry.insert("Value".into(), resolver.value(&output.value)?);
        let _ = outputs.insert(tree.logical_id(id)?, entry.into());
    }

    let mut template = Map::new();
    if let Some(description) = &props.description {
        let _ = template.insert("Description".into(), json!(description));
    }
    let _ = template.insert("Resources".into(), resources.into());
    if !outputs.is_empty() {
        let _ = template.insert("Outputs".into(), outputs.into());
    }
    if props.generate_bootstrap_version_rule {
        let _ = template.insert("Parameters".into(), bootstrap_parameters());
        let _ = template.insert("Rules".into(), bootstrap_rules());
    }

    tracing::debug!(stack = %stack_name, resources = resource_order.len(), "rendered template");
    Ok(StackArtifact {
        stack_name,
        environment: props.env.clone(),
        template: template.into(),
        resource_order,
    })
}

fn bootstrap_parameters() -> serde_json::Value {
    json!({
        "BootstrapVersion": {
            "Type": "AWS::SSM::Parameter::Value<String>",
            "Default": BOOTSTRAP_PARAMETER,
            "Description": "Version of the CDK Bootstrap resources in this environment, \
                            automatically retrieved from SSM Parameter Store. [cdk:skip]",
        }
    })
}

fn bootstrap_rules() -> serde_json::Value {
    json!({
        "CheckBootstrapVersion": {
            "Assertions": [{
                "Assert": {
                    "Fn::Not": [{
                        "Fn::Contains": [["1", "2", "3", "4", "5"], { "Ref": "BootstrapVersion" }]
                    }]
                },
                "AssertDescription": "CDK bootstrap stack version 6 required. \
                                      Please run 'cdk bootstrap' with a recent version of the CDK CLI.",
            }]
        }
    })
}

/// Turns values and properties into template JSON.
struct Resolver<'a> {
    tree: &'a ConstructTree,
}

impl Resolver<'_> {
    fn resource(&self, node: &ResourceNode) -> Result<serde_json::Value> {
        let mut entry = Map::new();
        let _ = entry.insert("Type".into(), json!(node.resource.type_name()));

        let mut properties = Map::new();
        for (key, prop) in node.resource.properties().iter() {
            let _ = properties.insert(key.into(), self.property(prop)?);
        }
        let _ = entry.insert("Properties".into(), properties.into());

        if !node.depends_on.is_empty() {
            let mut deps = node
                .depends_on
                .iter()
                .map(|&d| self.tree.logical_id(d))
                .collect::<Result<Vec<_>>>()?;
            deps.sort();
            deps.dedup();
            let _ = entry.insert("DependsOn".into(), json!(deps));
        }
        if let Some(policy) = node.removal_policy {
            let _ = entry.insert("UpdateReplacePolicy".into(), json!(policy.to_string()));
            let _ = entry.insert("DeletionPolicy".into(), json!(policy.to_string()));
        }
        Ok(entry.into())
    }

    fn property(&self, prop: &Property) -> Result<serde_json::Value> {
        match prop {
            Property::Json(v) => Ok(v.clone()),
            Property::Value(v) => self.value(v),
            Property::List(items) => items
                .iter()
                .map(|i| self.property(i))
                .collect::<Result<Vec<_>>>()
                .map(Into::into),
            Property::Object(fields) => {
                let mut out = Map::new();
                for (k, v) in fields {
                    let _ = out.insert(k.clone(), self.property(v)?);
                }
                Ok(out.into())
            }
        }
    }

    fn value(&self, value: &Value) -> Result<serde_json::Value> {
        match value {
            Value::Literal(s) => Ok(json!(s)),
            Value::Ref(target) => Ok(json!({ "Ref": self.tree.logical_id(*target)? })),
            Value::GetAtt { target, attribute } => Ok(json!({
                "Fn::GetAtt": [self.tree.logical_id(*target)?, attribute]
            })),
            Value::Join(parts) => self.join(parts),
        }
    }

    fn join(&self, parts: &[Value]) -> Result<serde_json::Value> {
        let mut flat: Vec<Value> = Vec::new();
        flatten(parts, &mut flat);

        match flat.as_slice() {
            [] => Ok(json!("")),
            [single] => self.value(single),
            _ => {
                let rendered = flat
                    .iter()
                    .map(|p| self.value(p))
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!({ "Fn::Join": ["", rendered] }))
            }
        }
    }
}

/// Flattens nested joins and merges adjacent literals.
fn flatten(parts: &[Value], out: &mut Vec<Value>) {
    for part in parts {
        match part {
            Value::Join(inner) => flatten(inner, out),
            Value::Literal(s) if s.is_empty() => {}
            Value::Literal(s) => {
                if let Some(Value::Literal(prev)) = out.last_mut() {
                    prev.push_str(s);
                } else {
                    out.push(part.clone());
                }
            }
            other => out.push(other.clone()),
        }
    }
}
