//! Aurora MySQL clusters.
//!
//! Two shapes are supported: the auto-pausing [`ServerlessCluster`] and the
//! provisioned [`DatabaseCluster`] whose instances use the `db.serverless`
//! class. Both create their master secret as a child construct and expose
//! an [`Endpoint`] made of deploy-time references.

use std::time::Duration;

use rdsstack_common::error::{Result, StackError};
use rdsstack_common::types::Tags;
use rdsstack_construct::resources::{
    CfnDbCluster, CfnDbInstance, CfnResource, RemovalPolicy, ResourceNode, ScalingConfiguration,
};
use rdsstack_construct::{ConstructKind, ConstructTree, NodeId, Value};

use crate::credentials::{AttachedSecret, Credentials, DatabaseSecret};
use crate::network::NetworkContext;

const AURORA_MYSQL: &str = "aurora-mysql";

/// Aurora MySQL engine releases used by the stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuroraMysqlVersion {
    /// Aurora MySQL 3.03.0, MySQL 8.0 compatible.
    V3_03_0,
}

impl AuroraMysqlVersion {
    /// Full engine version string.
    #[must_use]
    pub const fn full_version(self) -> &'static str {
        match self {
            Self::V3_03_0 => "8.0.mysql_aurora.3.03.0",
        }
    }

    /// Default cluster parameter group of the release.
    #[must_use]
    pub const fn parameter_group(self) -> &'static str {
        match self {
            Self::V3_03_0 => "default.aurora-mysql8.0",
        }
    }
}

/// Cluster engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterEngine {
    /// Aurora MySQL; `None` leaves the version to the service.
    AuroraMysql(Option<AuroraMysqlVersion>),
}

impl ClusterEngine {
    /// `Engine` property value.
    #[must_use]
    pub const fn engine_type(self) -> &'static str {
        match self {
            Self::AuroraMysql(_) => AURORA_MYSQL,
        }
    }

    /// `EngineVersion` property value, when pinned.
    #[must_use]
    pub fn engine_version(self) -> Option<String> {
        match self {
            Self::AuroraMysql(v) => v.map(|v| v.full_version().to_string()),
        }
    }

    /// Cluster parameter group. Unpinned versions fall back to the
    /// MySQL 5.7 family, the only one serverless v1 supports.
    #[must_use]
    pub const fn parameter_group(self) -> &'static str {
        match self {
            Self::AuroraMysql(Some(v)) => v.parameter_group(),
            Self::AuroraMysql(None) => "default.aurora-mysql5.7",
        }
    }
}

/// Connection endpoint of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Writer hostname.
    pub hostname: Value,
    /// Listener port.
    pub port: Value,
}

impl Endpoint {
    fn of(cluster: NodeId) -> Self {
        Self {
            hostname: Value::get_att(cluster, "Endpoint.Address"),
            port: Value::get_att(cluster, "Endpoint.Port"),
        }
    }

    /// `host:port` with both parts encoded as tokens.
    #[must_use]
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.hostname.to_token_string(), self.port.to_token_string())
    }
}

fn master_secret(
    tree: &mut ConstructTree,
    node: NodeId,
    credentials: &Credentials,
) -> Result<DatabaseSecret> {
    DatabaseSecret::new(tree, node, "Secret", credentials)
}

fn cluster_descriptor(
    engine: ClusterEngine,
    network: &NetworkContext,
    secret: &DatabaseSecret,
    copy_tags_to_snapshot: bool,
) -> CfnDbCluster {
    CfnDbCluster {
        engine: engine.engine_type().into(),
        engine_version: engine.engine_version(),
        engine_mode: None,
        database_name: None,
        deletion_protection: None,
        copy_tags_to_snapshot,
        parameter_group_name: Some(engine.parameter_group().into()),
        subnet_group: network.subnet_group.name(),
        master_username: secret.username_ref(),
        master_user_password: secret.password_ref(),
        security_group_ids: vec![network.security_group.group_id()],
        storage_encrypted: true,
        scaling: None,
        serverless_v2_scaling: None,
        tags: Tags::new(),
    }
}

/// Settings of a [`ServerlessCluster`].
#[derive(Debug, Clone)]
pub struct ServerlessClusterProps<'a> {
    /// Cluster engine.
    pub engine: ClusterEngine,
    /// Master credentials.
    pub credentials: &'a Credentials,
    /// Subnet group and security group to bind to.
    pub network: &'a NetworkContext,
    /// Idle time before pausing; `None` or zero disables pausing.
    pub auto_pause: Option<Duration>,
    /// Copy tags to snapshots.
    pub copy_tags_to_snapshot: bool,
    /// Removal policy of the cluster.
    pub removal_policy: RemovalPolicy,
}

/// An auto-pausing serverless (v1) cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerlessCluster {
    /// The high-level construct.
    pub node: NodeId,
    /// The `AWS::RDS::DBCluster` resource.
    pub resource: NodeId,
    /// Connection endpoint.
    pub endpoint: Endpoint,
    /// Master secret.
    pub secret: AttachedSecret,
}

impl ServerlessCluster {
    /// Creates the cluster with its secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or the auto-pause delay is
    /// outside 5 minutes to 1 day.
    pub fn new(
        tree: &mut ConstructTree,
        scope: NodeId,
        id: &str,
        props: &ServerlessClusterProps<'_>,
    ) -> Result<Self> {
        let node = tree.add_construct(scope, id, ConstructKind::ServerlessCluster)?;
        let scaling = serverless_scaling(tree, node, props.auto_pause)?;
        let secret = master_secret(tree, node, props.credentials)?;

        let mut descriptor = cluster_descriptor(
            props.engine,
            props.network,
            &secret,
            props.copy_tags_to_snapshot,
        );
        descriptor.engine_mode = Some("serverless".into());
        descriptor.scaling = Some(scaling);

        let resource = tree.add_resource(
            node,
            "Resource",
            ResourceNode::new(CfnResource::DbCluster(descriptor))
                .with_removal_policy(props.removal_policy),
        )?;
        let secret = secret.attach(tree, resource)?;

        tracing::info!(cluster = %tree.path(node), engine = props.engine.engine_type(), "created serverless cluster");
        Ok(Self {
            node,
            resource,
            endpoint: Endpoint::of(resource),
            secret,
        })
    }

    /// ARN of the master secret.
    #[must_use]
    pub const fn secret_arn(&self) -> Value {
        self.secret.secret_arn()
    }
}

fn serverless_scaling(
    tree: &ConstructTree,
    node: NodeId,
    auto_pause: Option<Duration>,
) -> Result<ScalingConfiguration> {
    let seconds = auto_pause.map_or(0, |d| d.as_secs());
    if seconds == 0 {
        return Ok(ScalingConfiguration {
            auto_pause: false,
            seconds_until_auto_pause: 0,
        });
    }
    if !(300..=86_400).contains(&seconds) {
        return Err(StackError::InvalidProperty {
            path: tree.path(node),
            message: format!("auto pause must be between 5 minutes and 1 day, got {seconds}s"),
        });
    }
    Ok(ScalingConfiguration {
        auto_pause: true,
        seconds_until_auto_pause: seconds,
    })
}

/// Settings of a [`DatabaseCluster`].
#[derive(Debug, Clone)]
pub struct DatabaseClusterProps<'a> {
    /// Cluster engine.
    pub engine: ClusterEngine,
    /// Master credentials.
    pub credentials: &'a Credentials,
    /// Subnet group and security group to bind to.
    pub network: &'a NetworkContext,
    /// Initial database name.
    pub default_database_name: Option<String>,
    /// Deletion protection flag.
    pub deletion_protection: bool,
    /// Copy tags to snapshots.
    pub copy_tags_to_snapshot: bool,
    /// Removal policy of the cluster.
    pub removal_policy: RemovalPolicy,
    /// Instance type without the `db.` prefix, e.g. `serverless`.
    pub instance_type: String,
    /// Number of instances, at least one.
    pub instances: u32,
}

/// A provisioned cluster with member instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCluster {
    /// The high-level construct.
    pub node: NodeId,
    /// The `AWS::RDS::DBCluster` resource.
    pub resource: NodeId,
    /// The `AWS::RDS::DBInstance` resources.
    pub instances: Vec<NodeId>,
    /// Connection endpoint.
    pub endpoint: Endpoint,
    /// Master secret.
    pub secret: AttachedSecret,
}

impl DatabaseCluster {
    /// Creates the cluster, its instances, and its secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or no instance is requested.
    pub fn new(
        tree: &mut ConstructTree,
        scope: NodeId,
        id: &str,
        props: &DatabaseClusterProps<'_>,
    ) -> Result<Self> {
        let node = tree.add_construct(scope, id, ConstructKind::DatabaseCluster)?;
        if props.instances == 0 {
            return Err(StackError::InvalidProperty {
                path: tree.path(node),
                message: "at least one instance is required".into(),
            });
        }
        let secret = master_secret(tree, node, props.credentials)?;

        let mut descriptor = cluster_descriptor(
            props.engine,
            props.network,
            &secret,
            props.copy_tags_to_snapshot,
        );
        descriptor.database_name = props.default_database_name.clone();
        descriptor.deletion_protection = Some(props.deletion_protection);

        let resource = tree.add_resource(
            node,
            "Resource",
            ResourceNode::new(CfnResource::DbCluster(descriptor))
                .with_removal_policy(props.removal_policy),
        )?;
        let secret = secret.attach(tree, resource)?;

        // Readers are created after the writer.
        let mut instances: Vec<NodeId> = Vec::new();
        for i in 1..=props.instances {
            let mut instance = ResourceNode::new(CfnResource::DbInstance(CfnDbInstance {
                cluster: Value::Ref(resource),
                instance_class: format!("db.{}", props.instance_type),
                engine: props.engine.engine_type().into(),
                subnet_group: props.network.subnet_group.name(),
                publicly_accessible: false,
                tags: Tags::new(),
            }))
            .with_removal_policy(RemovalPolicy::Destroy);
            if let Some(&writer) = instances.first() {
                instance = instance.with_dependency(writer);
            }
            instances.push(tree.add_resource(node, &format!("Instance{i}"), instance)?);
        }

        tracing::info!(
            cluster = %tree.path(node),
            engine = props.engine.engine_type(),
            instances = instances.len(),
            "created database cluster"
        );
        Ok(Self {
            node,
            resource,
            instances,
            endpoint: Endpoint::of(resource),
            secret,
        })
    }

    /// ARN of the master secret.
    #[must_use]
    pub const fn secret_arn(&self) -> Value {
        self.secret.secret_arn()
    }
}

#[cfg(test)]
mod tests {
    use rdsstack_common::types::Naming;
    use rdsstack_construct::StackProps;

    use super::*;
    use crate::network::{IngressScope, NetworkOptions, assemble_network};
    use crate::testing::{context_with_vpc, stack_env};

    fn network(tree: &mut ConstructTree) -> (NodeId, NetworkContext) {
        let stack = tree
            .add_stack(
                "s",
                StackProps {
                    env: stack_env(),
                    ..StackProps::default()
                },
            )
            .expect("stack");
        let network = assemble_network(
            tree,
            stack,
            &Naming::unprefixed(),
            &NetworkOptions {
                vpc_id: "vpc-abc".into(),
                port: 3306,
                ingress: IngressScope::PrivateOnly,
                subnet_group_description: "db".into(),
                security_group_description: "db".into(),
            },
        )
        .expect("network");
        (stack, network)
    }

    fn cluster_of(tree: &ConstructTree, id: NodeId) -> CfnDbCluster {
        match tree.resource(id).map(|r| &r.resource) {
            Some(CfnResource::DbCluster(c)) => c.clone(),
            other => panic!("expected a cluster, got {other:?}"),
        }
    }

    #[test]
    fn engine_version_strings() {
        let v3 = ClusterEngine::AuroraMysql(Some(AuroraMysqlVersion::V3_03_0));
        assert_eq!(v3.engine_type(), "aurora-mysql");
        assert_eq!(v3.engine_version().as_deref(), Some("8.0.mysql_aurora.3.03.0"));
        assert_eq!(v3.parameter_group(), "default.aurora-mysql8.0");

        let v1 = ClusterEngine::AuroraMysql(None);
        assert_eq!(v1.engine_version(), None);
        assert_eq!(v1.parameter_group(), "default.aurora-mysql5.7");
    }

    #[test]
    fn serverless_cluster_pauses_and_snapshots() {
        let mut tree = ConstructTree::with_context(context_with_vpc("vpc-abc"));
        let (stack, network) = network(&mut tree);
        let creds = Credentials::from_generated_secret("clusteradmin");
        let cluster = ServerlessCluster::new(
            &mut tree,
            stack,
            "Db",
            &ServerlessClusterProps {
                engine: ClusterEngine::AuroraMysql(None),
                credentials: &creds,
                network: &network,
                auto_pause: Some(Duration::from_secs(600)),
                copy_tags_to_snapshot: true,
                removal_policy: RemovalPolicy::Snapshot,
            },
        )
        .expect("cluster");

        let descriptor = cluster_of(&tree, cluster.resource);
        assert_eq!(descriptor.engine_mode.as_deref(), Some("serverless"));
        assert_eq!(
            descriptor.scaling,
            Some(ScalingConfiguration {
                auto_pause: true,
                seconds_until_auto_pause: 600,
            })
        );
        assert!(descriptor.storage_encrypted);
        assert_eq!(
            tree.resource(cluster.resource).and_then(|r| r.removal_policy),
            Some(RemovalPolicy::Snapshot)
        );
        assert_eq!(cluster.secret_arn(), Value::Ref(cluster.secret.attachment));

        let addr = cluster.endpoint.socket_address();
        let (host, port) = addr.split_once(':').expect("colon");
        assert_eq!(Value::parse(host), Value::get_att(cluster.resource, "Endpoint.Address"));
        assert_eq!(Value::parse(port), Value::get_att(cluster.resource, "Endpoint.Port"));
    }

    #[test]
    fn auto_pause_out_of_range_is_rejected() {
        let mut tree = ConstructTree::with_context(context_with_vpc("vpc-abc"));
        let (stack, network) = network(&mut tree);
        let creds = Credentials::from_generated_secret("admin");
        let err = ServerlessCluster::new(
            &mut tree,
            stack,
            "Db",
            &ServerlessClusterProps {
                engine: ClusterEngine::AuroraMysql(None),
                credentials: &creds,
                network: &network,
                auto_pause: Some(Duration::from_secs(60)),
                copy_tags_to_snapshot: false,
                removal_policy: RemovalPolicy::Snapshot,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StackError::InvalidProperty { .. }), "got: {err}");
    }

    fn v2_props<'a>(creds: &'a Credentials, network: &'a NetworkContext, instances: u32) -> DatabaseClusterProps<'a> {
        DatabaseClusterProps {
            engine: ClusterEngine::AuroraMysql(Some(AuroraMysqlVersion::V3_03_0)),
            credentials: creds,
            network,
            default_database_name: Some("appdb".into()),
            deletion_protection: true,
            copy_tags_to_snapshot: true,
            removal_policy: RemovalPolicy::Snapshot,
            instance_type: "serverless".into(),
            instances,
        }
    }

    #[test]
    fn database_cluster_creates_private_serverless_instances() {
        let mut tree = ConstructTree::with_context(context_with_vpc("vpc-abc"));
        let (stack, network) = network(&mut tree);
        let creds = Credentials::from_generated_secret("admin");
        let cluster =
            DatabaseCluster::new(&mut tree, stack, "Cluster", &v2_props(&creds, &network, 2)).expect("cluster");

        assert_eq!(cluster.instances.len(), 2);
        assert_eq!(tree.node(cluster.instances[1]).id(), "Instance2");
        let writer = tree.resource(cluster.instances[0]).expect("writer");
        let reader = tree.resource(cluster.instances[1]).expect("reader");
        assert!(writer.depends_on.is_empty());
        assert_eq!(reader.depends_on, vec![cluster.instances[0]]);
        match tree.resource(cluster.instances[0]).map(|r| &r.resource) {
            Some(CfnResource::DbInstance(i)) => {
                assert_eq!(i.instance_class, "db.serverless");
                assert!(!i.publicly_accessible);
                assert_eq!(i.cluster, Value::Ref(cluster.resource));
            }
            other => panic!("expected an instance, got {other:?}"),
        }

        let descriptor = cluster_of(&tree, cluster.resource);
        assert_eq!(descriptor.database_name.as_deref(), Some("appdb"));
        assert_eq!(descriptor.deletion_protection, Some(true));
        assert_eq!(descriptor.engine_mode, None);
    }

    #[test]
    fn database_cluster_requires_an_instance() {
        let mut tree = ConstructTree::with_context(context_with_vpc("vpc-abc"));
        let (stack, network) = network(&mut tree);
        let creds = Credentials::from_generated_secret("admin");
        let err = DatabaseCluster::new(&mut tree, stack, "Cluster", &v2_props(&creds, &network, 0)).unwrap_err();
        assert!(err.to_string().contains("at least one instance"), "got: {err}");
    }
}
