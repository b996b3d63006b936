//! Low-level CloudFormation resource descriptors.
//!
//! Each descriptor maps one-to-one onto a template resource. Descriptors
//! hold [`Value`]s wherever a property may refer to another resource, and
//! describe themselves as a [`Property`] tree that synthesis resolves.

use std::fmt;

use rdsstack_common::types::Tags;

use crate::token::Value;
use crate::tree::NodeId;

/// Property tree of a resource, before references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// Fully known JSON.
    Json(serde_json::Value),
    /// A possibly deferred value.
    Value(Value),
    /// A list of properties.
    List(Vec<Property>),
    /// An object; keys keep insertion order.
    Object(Vec<(String, Property)>),
}

impl Property {
    fn collect_references(&self, out: &mut Vec<NodeId>) {
        match self {
            Self::Json(_) => {}
            Self::Value(v) => v.collect_references(out),
            Self::List(items) => {
                for item in items {
                    item.collect_references(out);
                }
            }
            Self::Object(fields) => {
                for (_, field) in fields {
                    field.collect_references(out);
                }
            }
        }
    }
}

impl From<Value> for Property {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for Property {
    fn from(s: &str) -> Self {
        Self::Json(s.into())
    }
}

impl From<String> for Property {
    fn from(s: String) -> Self {
        Self::Json(s.into())
    }
}

impl From<bool> for Property {
    fn from(b: bool) -> Self {
        Self::Json(b.into())
    }
}

impl From<u16> for Property {
    fn from(n: u16) -> Self {
        Self::Json(n.into())
    }
}

impl From<u32> for Property {
    fn from(n: u32) -> Self {
        Self::Json(n.into())
    }
}

impl From<u64> for Property {
    fn from(n: u64) -> Self {
        Self::Json(n.into())
    }
}

impl From<f64> for Property {
    fn from(n: f64) -> Self {
        Self::Json(n.into())
    }
}

impl From<Properties> for Property {
    fn from(p: Properties) -> Self {
        Self::Object(p.0)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Property {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Ordered property object under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Vec<(String, Property)>);

impl Properties {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<Property>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Sets a property when `value` is `Some`.
    #[must_use]
    pub fn set_opt<T: Into<Property>>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// Sets `Tags` unless the tag set is empty.
    #[must_use]
    pub fn set_tags(self, tags: &Tags) -> Self {
        if tags.is_empty() {
            return self;
        }
        let list: Vec<Property> = tags
            .iter()
            .map(|(k, v)| Self::new().set("Key", k).set("Value", v).into())
            .collect();
        self.set("Tags", list)
    }

    /// Looks up a top-level property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns `true` when no property is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// What happens to a resource when it leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Delete the physical resource.
    Destroy,
    /// Keep the physical resource.
    Retain,
    /// Take a final snapshot, then delete.
    Snapshot,
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destroy => write!(f, "Delete"),
            Self::Retain => write!(f, "Retain"),
            Self::Snapshot => write!(f, "Snapshot"),
        }
    }
}

/// `ScalingConfiguration` of an auto-pausing serverless cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingConfiguration {
    /// Whether the cluster pauses when idle.
    pub auto_pause: bool,
    /// Idle seconds before pausing.
    pub seconds_until_auto_pause: u64,
}

/// `ServerlessV2ScalingConfiguration` capacity bounds in ACUs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerlessV2Scaling {
    /// Lower bound.
    pub min_capacity: f64,
    /// Upper bound.
    pub max_capacity: f64,
}

/// `AWS::RDS::DBCluster`.
#[derive(Debug, Clone, PartialEq)]
pub struct CfnDbCluster {
    /// Engine name, e.g. `aurora-mysql`.
    pub engine: String,
    /// Engine version; `None` lets the service pick.
    pub engine_version: Option<String>,
    /// Engine mode, e.g. `serverless`.
    pub engine_mode: Option<String>,
    /// Initial database name.
    pub database_name: Option<String>,
    /// Deletion protection flag.
    pub deletion_protection: Option<bool>,
    /// Copy tags to snapshots.
    pub copy_tags_to_snapshot: bool,
    /// Cluster parameter group.
    pub parameter_group_name: Option<String>,
    /// Subnet group name.
    pub subnet_group: Value,
    /// Master username (usually a secret reference).
    pub master_username: Value,
    /// Master password (always a secret reference).
    pub master_user_password: Value,
    /// Attached security group ids.
    pub security_group_ids: Vec<Value>,
    /// Storage encryption flag.
    pub storage_encrypted: bool,
    /// Auto-pause scaling of v1 serverless clusters.
    pub scaling: Option<ScalingConfiguration>,
    /// Capacity bounds of serverless v2 instances.
    pub serverless_v2_scaling: Option<ServerlessV2Scaling>,
    /// Resource tags.
    pub tags: Tags,
}

/// `AWS::RDS::DBInstance` belonging to a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfnDbInstance {
    /// Owning cluster identifier.
    pub cluster: Value,
    /// Instance class, e.g. `db.serverless`.
    pub instance_class: String,
    /// Engine name, matching the cluster.
    pub engine: String,
    /// Subnet group name.
    pub subnet_group: Value,
    /// Whether the instance gets a public address.
    pub publicly_accessible: bool,
    /// Resource tags.
    pub tags: Tags,
}

/// `AWS::RDS::DBSubnetGroup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfnDbSubnetGroup {
    /// Group description.
    pub description: String,
    /// Member subnet ids.
    pub subnet_ids: Vec<String>,
    /// Resource tags.
    pub tags: Tags,
}

/// One inline rule of a security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupRule {
    /// Peer CIDR block.
    pub cidr_ip: String,
    /// `tcp`, `udp`, `icmp`, or `-1` for all.
    pub ip_protocol: String,
    /// First port of the range.
    pub from_port: Option<u16>,
    /// Last port of the range.
    pub to_port: Option<u16>,
    /// Rule description.
    pub description: String,
}

impl SecurityGroupRule {
    fn properties(&self) -> Properties {
        Properties::new()
            .set("CidrIp", self.cidr_ip.as_str())
            .set("Description", self.description.as_str())
            .set_opt("FromPort", self.from_port)
            .set("IpProtocol", self.ip_protocol.as_str())
            .set_opt("ToPort", self.to_port)
    }
}

/// `AWS::EC2::SecurityGroup` with inline rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfnSecurityGroup {
    /// Group description.
    pub description: String,
    /// VPC the group belongs to.
    pub vpc_id: String,
    /// Inbound rules.
    pub ingress: Vec<SecurityGroupRule>,
    /// Outbound rules.
    pub egress: Vec<SecurityGroupRule>,
    /// Resource tags.
    pub tags: Tags,
}

/// `AWS::SecretsManager::Secret` holding generated database credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfnSecret {
    /// Secret description.
    pub description: String,
    /// Username stored next to the generated password.
    pub username: String,
    /// Characters the generated password must not contain.
    pub exclude_characters: String,
    /// Generated password length.
    pub password_length: u32,
    /// Resource tags.
    pub tags: Tags,
}

/// `AWS::SecretsManager::SecretTargetAttachment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfnSecretTargetAttachment {
    /// Secret being attached.
    pub secret: Value,
    /// Database the secret belongs to.
    pub target: Value,
    /// Target resource type.
    pub target_type: String,
}

/// Every low-level resource the stacks can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum CfnResource {
    /// `AWS::RDS::DBCluster`.
    DbCluster(CfnDbCluster),
    /// `AWS::RDS::DBInstance`.
    DbInstance(CfnDbInstance),
    /// `AWS::RDS::DBSubnetGroup`.
    DbSubnetGroup(CfnDbSubnetGroup),
    /// `AWS::EC2::SecurityGroup`.
    SecurityGroup(CfnSecurityGroup),
    /// `AWS::SecretsManager::Secret`.
    Secret(CfnSecret),
    /// `AWS::SecretsManager::SecretTargetAttachment`.
    SecretTargetAttachment(CfnSecretTargetAttachment),
}

impl CfnResource {
    /// CloudFormation resource type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::DbCluster(_) => "AWS::RDS::DBCluster",
            Self::DbInstance(_) => "AWS::RDS::DBInstance",
            Self::DbSubnetGroup(_) => "AWS::RDS::DBSubnetGroup",
            Self::SecurityGroup(_) => "AWS::EC2::SecurityGroup",
            Self::Secret(_) => "AWS::SecretsManager::Secret",
            Self::SecretTargetAttachment(_) => "AWS::SecretsManager::SecretTargetAttachment",
        }
    }

    /// Tags of taggable resources.
    #[must_use]
    pub const fn tags(&self) -> Option<&Tags> {
        match self {
            Self::DbCluster(r) => Some(&r.tags),
            Self::DbInstance(r) => Some(&r.tags),
            Self::DbSubnetGroup(r) => Some(&r.tags),
            Self::SecurityGroup(r) => Some(&r.tags),
            Self::Secret(r) => Some(&r.tags),
            Self::SecretTargetAttachment(_) => None,
        }
    }

    /// Mutable tags of taggable resources.
    pub const fn tags_mut(&mut self) -> Option<&mut Tags> {
        match self {
            Self::DbCluster(r) => Some(&mut r.tags),
            Self::DbInstance(r) => Some(&mut r.tags),
            Self::DbSubnetGroup(r) => Some(&mut r.tags),
            Self::SecurityGroup(r) => Some(&mut r.tags),
            Self::Secret(r) => Some(&mut r.tags),
            Self::SecretTargetAttachment(_) => None,
        }
    }

    /// `Properties` of the template resource.
    #[must_use]
    pub fn properties(&self) -> Properties {
        match self {
            Self::DbCluster(c) => db_cluster_properties(c),
            Self::DbInstance(i) => Properties::new()
                .set("DBClusterIdentifier", i.cluster.clone())
                .set("DBInstanceClass", i.instance_class.as_str())
                .set("DBSubnetGroupName", i.subnet_group.clone())
                .set("Engine", i.engine.as_str())
                .set("PubliclyAccessible", i.publicly_accessible)
                .set_tags(&i.tags),
            Self::DbSubnetGroup(g) => Properties::new()
                .set("DBSubnetGroupDescription", g.description.as_str())
                .set("SubnetIds", g.subnet_ids.clone())
                .set_tags(&g.tags),
            Self::SecurityGroup(g) => Properties::new()
                .set("GroupDescription", g.description.as_str())
                .set_opt(
                    "SecurityGroupEgress",
                    (!g.egress.is_empty())
                        .then(|| g.egress.iter().map(SecurityGroupRule::properties).collect::<Vec<_>>()),
                )
                .set_opt(
                    "SecurityGroupIngress",
                    (!g.ingress.is_empty())
                        .then(|| g.ingress.iter().map(SecurityGroupRule::properties).collect::<Vec<_>>()),
                )
                .set_tags(&g.tags)
                .set("VpcId", g.vpc_id.as_str()),
            Self::Secret(s) => Properties::new()
                .set("Description", s.description.as_str())
                .set(
                    "GenerateSecretString",
                    Properties::new()
                        .set("ExcludeCharacters", s.exclude_characters.as_str())
                        .set("GenerateStringKey", "password")
                        .set("PasswordLength", s.password_length)
                        .set(
                            "SecretStringTemplate",
                            serde_json::json!({ "username": s.username }).to_string(),
                        ),
                )
                .set_tags(&s.tags),
            Self::SecretTargetAttachment(a) => Properties::new()
                .set("SecretId", a.secret.clone())
                .set("TargetId", a.target.clone())
                .set("TargetType", a.target_type.as_str()),
        }
    }
}

fn db_cluster_properties(c: &CfnDbCluster) -> Properties {
    let scaling = c.scaling.map(|s| {
        Properties::new()
            .set("AutoPause", s.auto_pause)
            .set("SecondsUntilAutoPause", s.seconds_until_auto_pause)
    });
    let v2_scaling = c.serverless_v2_scaling.map(|s| {
        Properties::new()
            .set("MaxCapacity", s.max_capacity)
            .set("MinCapacity", s.min_capacity)
    });

    Properties::new()
        .set("CopyTagsToSnapshot", c.copy_tags_to_snapshot)
        .set_opt("DBClusterParameterGroupName", c.parameter_group_name.clone())
        .set("DBSubnetGroupName", c.subnet_group.clone())
        .set_opt("DatabaseName", c.database_name.clone())
        .set_opt("DeletionProtection", c.deletion_protection)
        .set("Engine", c.engine.as_str())
        .set_opt("EngineMode", c.engine_mode.clone())
        .set_opt("EngineVersion", c.engine_version.clone())
        .set("MasterUserPassword", c.master_user_password.clone())
        .set("MasterUsername", c.master_username.clone())
        .set_opt("ScalingConfiguration", scaling)
        .set_opt("ServerlessV2ScalingConfiguration", v2_scaling)
        .set("StorageEncrypted", c.storage_encrypted)
        .set_tags(&c.tags)
        .set("VpcSecurityGroupIds", c.security_group_ids.clone())
}

/// A resource node: descriptor plus template-level attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    /// The descriptor.
    pub resource: CfnResource,
    /// `DeletionPolicy` / `UpdateReplacePolicy`; `None` keeps the default.
    pub removal_policy: Option<RemovalPolicy>,
    /// Explicit `DependsOn` edges.
    pub depends_on: Vec<NodeId>,
}

impl ResourceNode {
    /// Wraps a descriptor with default attributes.
    #[must_use]
    pub const fn new(resource: CfnResource) -> Self {
        Self {
            resource,
            removal_policy: None,
            depends_on: Vec::new(),
        }
    }

    /// Sets the removal policy.
    #[must_use]
    pub const fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    /// Adds an explicit `DependsOn` edge to `other`.
    #[must_use]
    pub fn with_dependency(mut self, other: NodeId) -> Self {
        self.depends_on.push(other);
        self
    }

    /// Every resource this one refers to, explicit dependencies included.
    #[must_use]
    pub fn references(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for (_, prop) in self.resource.properties().iter() {
            prop.collect_references(&mut out);
        }
        out.extend(self.depends_on.iter().copied());
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// A stack output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfnOutput {
    /// Output value.
    pub value: Value,
    /// Output description.
    pub description: Option<String>,
}

impl CfnOutput {
    /// An output without description.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_render_as_key_value_list() {
        let tags: Tags = [("b", "2"), ("a", "1")].into_iter().collect();
        let props = Properties::new().set_tags(&tags);
        let Some(Property::List(items)) = props.get("Tags") else {
            panic!("expected a tag list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            Property::Object(vec![
                ("Key".into(), Property::from("a")),
                ("Value".into(), Property::from("1")),
            ])
        );
    }

    #[test]
    fn empty_tags_are_omitted() {
        assert!(Properties::new().set_tags(&Tags::new()).is_empty());
    }

    #[test]
    fn attachment_is_not_taggable() {
        let mut res = CfnResource::SecretTargetAttachment(CfnSecretTargetAttachment {
            secret: Value::literal("s"),
            target: Value::literal("t"),
            target_type: "AWS::RDS::DBCluster".into(),
        });
        assert!(res.tags_mut().is_none());
        assert_eq!(res.type_name(), "AWS::SecretsManager::SecretTargetAttachment");
    }

    #[test]
    fn security_group_without_rules_omits_rule_lists() {
        let res = CfnResource::SecurityGroup(CfnSecurityGroup {
            description: "d".into(),
            vpc_id: "vpc-1".into(),
            ingress: Vec::new(),
            egress: Vec::new(),
            tags: Tags::new(),
        });
        let props = res.properties();
        assert!(props.get("SecurityGroupIngress").is_none());
        assert!(props.get("SecurityGroupEgress").is_none());
        assert!(props.get("VpcId").is_some());
    }

    #[test]
    fn removal_policy_renders_template_names() {
        assert_eq!(RemovalPolicy::Snapshot.to_string(), "Snapshot");
        assert_eq!(RemovalPolicy::Destroy.to_string(), "Delete");
    }
}
