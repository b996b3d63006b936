//! The configurable program: a MySQL 8.0 cluster with one serverless v2
//! instance.

use rdsstack_common::config::Configuration;
use rdsstack_common::constants::{DEFAULT_DB_PORT, SERVERLESS_V2_STACK_NAME};
use rdsstack_common::error::Result;
use rdsstack_common::types::{Naming, Tags};
use rdsstack_construct::resources::RemovalPolicy;
use rdsstack_construct::{ConstructTree, NodeId, StackProps};

use crate::cluster::{AuroraMysqlVersion, ClusterEngine, DatabaseCluster, DatabaseClusterProps};
use crate::credentials::Credentials;
use crate::network::{IngressScope, NetworkContext, NetworkOptions, assemble_network};
use crate::outputs::{ConnectionDetails, OutputKeys, OutputSet, emit_outputs};
use crate::scaling::ServerlessV2ScalingAspect;

/// Handles to what [`build_serverless_v2_stack`] created.
#[derive(Debug, Clone)]
pub struct ServerlessV2Stack {
    /// The stack.
    pub stack: NodeId,
    /// VPC, subnet group, and security group.
    pub network: NetworkContext,
    /// The cluster.
    pub cluster: DatabaseCluster,
    /// Connection outputs.
    pub outputs: OutputSet,
}

/// Builds the serverless v2 stack into `tree`.
///
/// Stack tags are `global_tags` overlaid with the configured tags. The
/// template carries no bootstrap version check.
///
/// # Errors
///
/// Returns an error if the VPC lookup or any construct fails.
pub fn build_serverless_v2_stack(
    tree: &mut ConstructTree,
    config: &Configuration,
    global_tags: &Tags,
) -> Result<ServerlessV2Stack> {
    let naming = Naming::unprefixed();
    let tags = global_tags.merged(&config.instance.tags);
    let stack = tree.add_stack(
        SERVERLESS_V2_STACK_NAME,
        StackProps {
            env: config.env.clone(),
            tags,
            description: None,
            generate_bootstrap_version_rule: false,
        },
    )?;

    let network = assemble_network(
        tree,
        stack,
        &naming,
        &NetworkOptions {
            vpc_id: config.instance.vpc_id.clone(),
            port: DEFAULT_DB_PORT,
            ingress: IngressScope::PrivateOnly,
            subnet_group_description: "Private subnets for the database cluster".into(),
            security_group_description: "Database access from private subnets".into(),
        },
    )?;

    let credentials = Credentials::from_generated_secret(config.instance.admin_username.as_str());
    let cluster = DatabaseCluster::new(
        tree,
        stack,
        &naming.item("Cluster"),
        &DatabaseClusterProps {
            engine: ClusterEngine::AuroraMysql(Some(AuroraMysqlVersion::V3_03_0)),
            credentials: &credentials,
            network: &network,
            default_database_name: Some(config.instance.database_name.clone()),
            deletion_protection: config.instance.deletion_protection,
            copy_tags_to_snapshot: true,
            removal_policy: RemovalPolicy::Snapshot,
            instance_type: "serverless".into(),
            instances: 1,
        },
    )?;
    tree.add_aspect(cluster.node, ServerlessV2ScalingAspect::default());

    let outputs = emit_outputs(
        tree,
        stack,
        &OutputKeys::serverless_v2(),
        ConnectionDetails {
            endpoint: &cluster.endpoint,
            username: credentials.username(),
            secret_arn: &cluster.secret_arn(),
        },
    )?;

    tracing::info!(
        stack = SERVERLESS_V2_STACK_NAME,
        environment = %config.env,
        database = %config.instance.database_name,
        "assembled serverless v2 stack"
    );
    Ok(ServerlessV2Stack {
        stack,
        network,
        cluster,
        outputs,
    })
}
