//! Network resource assembly.
//!
//! The VPC is never created here: it is looked up from the context store
//! and every subnet-derived resource (subnet group, ingress rules) is built
//! from that single lookup result.

use rdsstack_common::error::{Result, StackError};
use rdsstack_common::types::{Naming, Tags};
use rdsstack_construct::resources::{
    CfnDbSubnetGroup, CfnResource, CfnSecurityGroup, ResourceNode, SecurityGroupRule,
};
use rdsstack_construct::{ConstructKind, ConstructTree, MissingContext, NodeId, Value};
use serde::Deserialize;

/// Context provider name of VPC lookups.
pub const VPC_PROVIDER: &str = "vpc-provider";

/// Exposure class of a subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SubnetType {
    /// Outbound through NAT, no direct inbound.
    #[serde(rename = "Private")]
    PrivateWithEgress,
    /// Routed through an internet gateway.
    Public,
    /// No route outside the VPC.
    Isolated,
}

/// One subnet of a looked-up VPC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    /// Subnet identifier.
    pub subnet_id: String,
    /// IPv4 CIDR block.
    pub cidr: String,
    /// Availability zone.
    pub availability_zone: String,
    /// Associated route table.
    #[serde(default)]
    pub route_table_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubnetGroupInfo {
    #[serde(rename = "type")]
    kind: SubnetType,
    subnets: Vec<Subnet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VpcInfo {
    vpc_id: String,
    vpc_cidr_block: String,
    #[serde(default)]
    subnet_groups: Vec<SubnetGroupInfo>,
}

/// A VPC resolved through a context lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vpc {
    node: NodeId,
    /// VPC identifier.
    pub vpc_id: String,
    /// Primary CIDR block.
    pub cidr_block: String,
    subnets: Vec<(SubnetType, Subnet)>,
}

impl Vpc {
    /// Context key of a VPC lookup.
    #[must_use]
    pub fn lookup_key(account: &str, region: &str, vpc_id: &str) -> String {
        format!(
            "{VPC_PROVIDER}:account={account}:filter.vpc-id={vpc_id}:region={region}:returnAsymmetricSubnets=true"
        )
    }

    /// Looks up an existing VPC by id.
    ///
    /// On a context miss the lookup is recorded as missing and a placeholder
    /// VPC is returned, so that construction can finish; synthesis then
    /// fails and reports the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the stack is environment-agnostic, the id is
    /// taken, or the cached value is malformed.
    pub fn from_lookup(tree: &mut ConstructTree, scope: NodeId, id: &str, vpc_id: &str) -> Result<Self> {
        let stack = tree.require_stack(scope)?;
        let stack_name = tree.node(stack).id().to_string();
        let env = tree
            .stack_props(stack)
            .map(|p| p.env.clone())
            .unwrap_or_default();
        let (Some(account), Some(region)) = (env.account.as_deref(), env.region.as_deref()) else {
            return Err(StackError::AgnosticLookup {
                provider: VPC_PROVIDER,
                stack: stack_name,
            });
        };

        let key = Self::lookup_key(account, region, vpc_id);
        let node = tree.add_construct(scope, id, ConstructKind::VpcLookup)?;

        let info = match tree.context().get(&key) {
            Some(value) => serde_json::from_value::<VpcInfo>(value.clone()).map_err(|e| {
                StackError::MalformedContext {
                    key: key.clone(),
                    message: e.to_string(),
                }
            })?,
            None => {
                tree.report_missing_context(MissingContext {
                    key,
                    provider: VPC_PROVIDER,
                    stack: stack_name,
                });
                dummy_vpc()
            }
        };

        let vpc = Self::from_info(node, info);
        tracing::info!(
            vpc = %vpc.vpc_id,
            environment = %env,
            private = vpc.private_subnets().len(),
            public = vpc.public_subnets().len(),
            "resolved VPC"
        );
        Ok(vpc)
    }

    fn from_info(node: NodeId, info: VpcInfo) -> Self {
        let subnets = info
            .subnet_groups
            .into_iter()
            .flat_map(|g| {
                let kind = g.kind;
                g.subnets.into_iter().map(move |s| (kind, s))
            })
            .collect();
        Self {
            node,
            vpc_id: info.vpc_id,
            cidr_block: info.vpc_cidr_block,
            subnets,
        }
    }

    /// The lookup construct.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Subnets of one type, in lookup order.
    #[must_use]
    pub fn subnets(&self, kind: SubnetType) -> Vec<&Subnet> {
        self.subnets
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, s)| s)
            .collect()
    }

    /// Private subnets with NAT egress.
    #[must_use]
    pub fn private_subnets(&self) -> Vec<&Subnet> {
        self.subnets(SubnetType::PrivateWithEgress)
    }

    /// Public subnets.
    #[must_use]
    pub fn public_subnets(&self) -> Vec<&Subnet> {
        self.subnets(SubnetType::Public)
    }
}

fn dummy_vpc() -> VpcInfo {
    let subnet = |id: &str, az: &str| Subnet {
        subnet_id: id.into(),
        cidr: "1.2.3.4/5".into(),
        availability_zone: az.into(),
        route_table_id: Some("rtb-12345s1".into()),
    };
    VpcInfo {
        vpc_id: "vpc-12345".into(),
        vpc_cidr_block: "1.2.3.4/5".into(),
        subnet_groups: vec![
            SubnetGroupInfo {
                kind: SubnetType::Public,
                subnets: vec![subnet("s-12345", "dummy1a"), subnet("s-67890", "dummy1b")],
            },
            SubnetGroupInfo {
                kind: SubnetType::PrivateWithEgress,
                subnets: vec![subnet("p-12345", "dummy1a"), subnet("p-67890", "dummy1b")],
            },
        ],
    }
}

/// A database subnet group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetGroup {
    /// The high-level construct.
    pub node: NodeId,
    /// The `AWS::RDS::DBSubnetGroup` resource.
    pub resource: NodeId,
}

impl SubnetGroup {
    /// Creates a subnet group over every subnet of `kind` in `vpc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken.
    pub fn new(
        tree: &mut ConstructTree,
        scope: NodeId,
        id: &str,
        vpc: &Vpc,
        kind: SubnetType,
        description: &str,
    ) -> Result<Self> {
        let node = tree.add_construct(scope, id, ConstructKind::SubnetGroup)?;
        let subnet_ids = vpc
            .subnets(kind)
            .into_iter()
            .map(|s| s.subnet_id.clone())
            .collect();
        let resource = tree.add_resource(
            node,
            "Default",
            ResourceNode::new(CfnResource::DbSubnetGroup(CfnDbSubnetGroup {
                description: description.into(),
                subnet_ids,
                tags: Tags::new(),
            })),
        )?;
        Ok(Self { node, resource })
    }

    /// Subnet group name, for `DBSubnetGroupName`.
    #[must_use]
    pub const fn name(&self) -> Value {
        Value::Ref(self.resource)
    }
}

/// Subnet group restricted to private subnets with egress.
///
/// # Errors
///
/// Returns an error if the id is taken.
pub fn private_subnet_group(
    tree: &mut ConstructTree,
    scope: NodeId,
    id: &str,
    vpc: &Vpc,
    description: &str,
) -> Result<SubnetGroup> {
    SubnetGroup::new(tree, scope, id, vpc, SubnetType::PrivateWithEgress, description)
}

/// Settings of a security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupProps {
    /// Group description.
    pub description: String,
    /// Add a rule allowing all outbound traffic.
    pub allow_all_outbound: bool,
}

/// An EC2 security group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityGroup {
    /// The high-level construct.
    pub node: NodeId,
    /// The `AWS::EC2::SecurityGroup` resource.
    pub resource: NodeId,
}

impl SecurityGroup {
    /// Creates a security group in `vpc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken.
    pub fn new(
        tree: &mut ConstructTree,
        scope: NodeId,
        id: &str,
        vpc: &Vpc,
        props: &SecurityGroupProps,
    ) -> Result<Self> {
        let node = tree.add_construct(scope, id, ConstructKind::SecurityGroup)?;
        let egress = if props.allow_all_outbound {
            vec![SecurityGroupRule {
                cidr_ip: "0.0.0.0/0".into(),
                ip_protocol: "-1".into(),
                from_port: None,
                to_port: None,
                description: "Allow all outbound traffic by default".into(),
            }]
        } else {
            Vec::new()
        };
        let resource = tree.add_resource(
            node,
            "Resource",
            ResourceNode::new(CfnResource::SecurityGroup(CfnSecurityGroup {
                description: props.description.clone(),
                vpc_id: vpc.vpc_id.clone(),
                ingress: Vec::new(),
                egress,
                tags: Tags::new(),
            })),
        )?;
        Ok(Self { node, resource })
    }

    /// Allows inbound TCP on `port` from `cidr`.
    ///
    /// Returns `false` when an identical rule already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource is not a security group.
    pub fn add_ingress_rule(
        &self,
        tree: &mut ConstructTree,
        cidr: &str,
        port: u16,
        description: &str,
    ) -> Result<bool> {
        let path = tree.path(self.resource);
        let Some(CfnResource::SecurityGroup(group)) =
            tree.resource_mut(self.resource).map(|r| &mut r.resource)
        else {
            return Err(StackError::InvalidProperty {
                path,
                message: "not a security group".into(),
            });
        };

        let duplicate = group.ingress.iter().any(|r| {
            r.cidr_ip == cidr && r.ip_protocol == "tcp" && r.from_port == Some(port) && r.to_port == Some(port)
        });
        if duplicate {
            tracing::debug!(cidr, port, "ingress rule already present");
            return Ok(false);
        }
        group.ingress.push(SecurityGroupRule {
            cidr_ip: cidr.into(),
            ip_protocol: "tcp".into(),
            from_port: Some(port),
            to_port: Some(port),
            description: description.into(),
        });
        Ok(true)
    }

    /// Security group id, for `VpcSecurityGroupIds`.
    #[must_use]
    pub fn group_id(&self) -> Value {
        Value::get_att(self.resource, "GroupId")
    }
}

/// Which subnet classes may reach the database port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressScope {
    /// Private subnets with egress only.
    PrivateOnly,
    /// Private and public subnets.
    PrivateAndPublic,
}

/// Creates a security group admitting `port` from the subnets of `vpc`.
///
/// One rule is added per subnet; a class without subnets adds nothing.
///
/// # Errors
///
/// Returns an error if the id is taken.
pub fn database_security_group(
    tree: &mut ConstructTree,
    scope: NodeId,
    id: &str,
    vpc: &Vpc,
    port: u16,
    ingress: IngressScope,
    description: &str,
) -> Result<SecurityGroup> {
    let sg = SecurityGroup::new(
        tree,
        scope,
        id,
        vpc,
        &SecurityGroupProps {
            description: description.into(),
            allow_all_outbound: true,
        },
    )?;

    for subnet in vpc.private_subnets() {
        let _ = sg.add_ingress_rule(tree, &subnet.cidr, port, "Allow from private subnets")?;
    }
    if ingress == IngressScope::PrivateAndPublic {
        for subnet in vpc.public_subnets() {
            let _ = sg.add_ingress_rule(tree, &subnet.cidr, port, "Allow from public subnets")?;
        }
    }
    Ok(sg)
}

/// Options of [`assemble_network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOptions {
    /// VPC to look up.
    pub vpc_id: String,
    /// Database port admitted by the security group.
    pub port: u16,
    /// Subnet classes admitted by the security group.
    pub ingress: IngressScope,
    /// Subnet group description.
    pub subnet_group_description: String,
    /// Security group description.
    pub security_group_description: String,
}

/// Network resources a cluster is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    /// The looked-up VPC.
    pub vpc: Vpc,
    /// Private subnet group.
    pub subnet_group: SubnetGroup,
    /// Database security group.
    pub security_group: SecurityGroup,
}

/// Looks up the VPC and builds the subnet group and security group from it.
///
/// Construct ids are `VPC`, `<prefix>SubnetGroup`, and `<prefix>SG`.
///
/// # Errors
///
/// Returns an error if the lookup or construction fails.
pub fn assemble_network(
    tree: &mut ConstructTree,
    stack: NodeId,
    naming: &Naming,
    options: &NetworkOptions,
) -> Result<NetworkContext> {
    let vpc = Vpc::from_lookup(tree, stack, "VPC", &options.vpc_id)?;
    let subnet_group = private_subnet_group(
        tree,
        stack,
        &naming.item("SubnetGroup"),
        &vpc,
        &options.subnet_group_description,
    )?;
    let security_group = database_security_group(
        tree,
        stack,
        &naming.item("SG"),
        &vpc,
        options.port,
        options.ingress,
        &options.security_group_description,
    )?;
    Ok(NetworkContext {
        vpc,
        subnet_group,
        security_group,
    })
}

#[cfg(test)]
mod tests {
    use rdsstack_construct::StackProps;
    use serde_json::json;

    use super::*;
    use crate::testing::{context_with_vpc, stack_env};

    fn tree_with_stack(context: rdsstack_construct::ContextStore) -> (ConstructTree, NodeId) {
        let mut tree = ConstructTree::with_context(context);
        let stack = tree
            .add_stack(
                "s",
                StackProps {
                    env: stack_env(),
                    ..StackProps::default()
                },
            )
            .expect("stack");
        (tree, stack)
    }

    fn ingress_of(tree: &ConstructTree, sg: &SecurityGroup) -> Vec<SecurityGroupRule> {
        match tree.resource(sg.resource).map(|r| &r.resource) {
            Some(CfnResource::SecurityGroup(g)) => g.ingress.clone(),
            other => panic!("expected a security group, got {other:?}"),
        }
    }

    #[test]
    fn lookup_reads_subnets_from_context() {
        let (mut tree, stack) = tree_with_stack(context_with_vpc("vpc-abc"));
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").expect("lookup");

        assert_eq!(vpc.vpc_id, "vpc-abc");
        assert_eq!(vpc.private_subnets().len(), 1);
        assert_eq!(vpc.private_subnets()[0].cidr, "10.0.1.0/24");
        assert_eq!(vpc.public_subnets()[0].cidr, "10.0.2.0/24");
        assert!(tree.missing_context().is_empty());
    }

    #[test]
    fn lookup_miss_records_missing_context() {
        let (mut tree, stack) = tree_with_stack(rdsstack_construct::ContextStore::new());
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-nope").expect("lookup");

        assert_eq!(vpc.vpc_id, "vpc-12345");
        assert_eq!(tree.missing_context().len(), 1);
        assert!(tree.missing_context()[0].key.contains("filter.vpc-id=vpc-nope"));
    }

    #[test]
    fn lookup_in_agnostic_stack_fails() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let err = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").unwrap_err();
        assert!(matches!(err, StackError::AgnosticLookup { .. }), "got: {err}");
    }

    #[test]
    fn malformed_context_is_rejected() {
        let mut context = rdsstack_construct::ContextStore::new();
        context.insert(
            Vpc::lookup_key("123456789012", "us-east-1", "vpc-abc"),
            json!({ "vpcId": 42 }),
        );
        let (mut tree, stack) = tree_with_stack(context);
        let err = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").unwrap_err();
        assert!(matches!(err, StackError::MalformedContext { .. }), "got: {err}");
    }

    #[test]
    fn one_rule_per_subnet_with_public() {
        let (mut tree, stack) = tree_with_stack(context_with_vpc("vpc-abc"));
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").expect("lookup");
        let sg = database_security_group(
            &mut tree,
            stack,
            "SG",
            &vpc,
            3306,
            IngressScope::PrivateAndPublic,
            "db",
        )
        .expect("sg");

        let rules = ingress_of(&tree, &sg);
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.ip_protocol == "tcp"
            && r.from_port == Some(3306)
            && r.to_port == Some(3306)));
        let cidrs: Vec<&str> = rules.iter().map(|r| r.cidr_ip.as_str()).collect();
        assert_eq!(cidrs, vec!["10.0.1.0/24", "10.0.2.0/24"]);
    }

    #[test]
    fn private_only_scope_skips_public_subnets() {
        let (mut tree, stack) = tree_with_stack(context_with_vpc("vpc-abc"));
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").expect("lookup");
        let sg = database_security_group(
            &mut tree,
            stack,
            "SG",
            &vpc,
            3306,
            IngressScope::PrivateOnly,
            "db",
        )
        .expect("sg");

        let rules = ingress_of(&tree, &sg);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].cidr_ip, "10.0.1.0/24");
    }

    #[test]
    fn class_without_subnets_adds_no_rules() {
        let mut context = rdsstack_construct::ContextStore::new();
        context.insert(
            Vpc::lookup_key("123456789012", "us-east-1", "vpc-empty"),
            json!({
                "vpcId": "vpc-empty",
                "vpcCidrBlock": "10.1.0.0/16",
                "subnetGroups": [{
                    "name": "Private",
                    "type": "Private",
                    "subnets": [{
                        "subnetId": "subnet-p",
                        "cidr": "10.1.1.0/24",
                        "availabilityZone": "us-east-1a"
                    }]
                }]
            }),
        );
        let (mut tree, stack) = tree_with_stack(context);
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-empty").expect("lookup");
        let sg = database_security_group(
            &mut tree,
            stack,
            "SG",
            &vpc,
            3306,
            IngressScope::PrivateAndPublic,
            "db",
        )
        .expect("sg");

        assert!(vpc.public_subnets().is_empty());
        assert_eq!(ingress_of(&tree, &sg).len(), 1);
    }

    #[test]
    fn duplicate_rules_are_ignored() {
        let (mut tree, stack) = tree_with_stack(context_with_vpc("vpc-abc"));
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").expect("lookup");
        let sg = SecurityGroup::new(
            &mut tree,
            stack,
            "SG",
            &vpc,
            &SecurityGroupProps {
                description: "db".into(),
                allow_all_outbound: false,
            },
        )
        .expect("sg");

        assert!(sg.add_ingress_rule(&mut tree, "10.0.1.0/24", 3306, "a").expect("first"));
        assert!(!sg.add_ingress_rule(&mut tree, "10.0.1.0/24", 3306, "b").expect("second"));
        assert_eq!(ingress_of(&tree, &sg).len(), 1);
    }

    #[test]
    fn subnet_group_uses_private_subnets() {
        let (mut tree, stack) = tree_with_stack(context_with_vpc("vpc-abc"));
        let vpc = Vpc::from_lookup(&mut tree, stack, "VPC", "vpc-abc").expect("lookup");
        let group = private_subnet_group(&mut tree, stack, "SubnetGroup", &vpc, "db subnets").expect("group");

        match tree.resource(group.resource).map(|r| &r.resource) {
            Some(CfnResource::DbSubnetGroup(g)) => {
                assert_eq!(g.subnet_ids, vec!["subnet-private-1"]);
                assert_eq!(g.description, "db subnets");
            }
            other => panic!("expected a subnet group, got {other:?}"),
        }
        assert_eq!(tree.logical_id(group.resource).expect("id"), "SubnetGroup");
    }
}
