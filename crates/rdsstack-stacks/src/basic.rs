//! The basic program: an auto-pausing serverless MySQL 5.7 cluster.

use std::time::Duration;

use rdsstack_common::config::Configuration;
use rdsstack_common::constants::{
    AUTO_PAUSE_MINUTES, BASIC_NAME_PREFIX, BASIC_OWNER_TAG, BASIC_STACK_NAME, DEFAULT_DB_PORT,
};
use rdsstack_common::error::Result;
use rdsstack_common::types::{Naming, Tags};
use rdsstack_construct::resources::RemovalPolicy;
use rdsstack_construct::{ConstructTree, NodeId, StackProps, TagAspect};

use crate::cluster::{ClusterEngine, ServerlessCluster, ServerlessClusterProps};
use crate::credentials::Credentials;
use crate::network::{IngressScope, NetworkContext, NetworkOptions, assemble_network};
use crate::outputs::{ConnectionDetails, OutputKeys, OutputSet, emit_outputs};

/// Handles to what [`build_basic_stack`] created.
#[derive(Debug, Clone)]
pub struct BasicStack {
    /// The stack.
    pub stack: NodeId,
    /// VPC, subnet group, and security group.
    pub network: NetworkContext,
    /// The cluster.
    pub cluster: ServerlessCluster,
    /// Connection outputs.
    pub outputs: OutputSet,
}

/// Builds the basic stack into `tree`.
///
/// Every construct id carries the `AcornRdsCluster` prefix. The security
/// group admits the database port from private and public subnets, and
/// every resource of the cluster is tagged as owned by the stack.
///
/// # Errors
///
/// Returns an error if the VPC lookup or any construct fails.
pub fn build_basic_stack(
    tree: &mut ConstructTree,
    config: &Configuration,
    global_tags: &Tags,
) -> Result<BasicStack> {
    let naming = Naming::new(BASIC_NAME_PREFIX);
    let stack = tree.add_stack(
        BASIC_STACK_NAME,
        StackProps {
            env: config.env.clone(),
            tags: global_tags.clone(),
            ..StackProps::default()
        },
    )?;

    let network = assemble_network(
        tree,
        stack,
        &naming,
        &NetworkOptions {
            vpc_id: config.instance.vpc_id.clone(),
            port: DEFAULT_DB_PORT,
            ingress: IngressScope::PrivateAndPublic,
            subnet_group_description: "RDS SUBNETS...".into(),
            security_group_description: "Acorn created Rds security group".into(),
        },
    )?;

    let credentials = Credentials::from_generated_secret(config.instance.admin_username.as_str());
    let cluster = ServerlessCluster::new(
        tree,
        stack,
        &naming.item(BASIC_STACK_NAME),
        &ServerlessClusterProps {
            engine: ClusterEngine::AuroraMysql(None),
            credentials: &credentials,
            network: &network,
            auto_pause: Some(Duration::from_secs(AUTO_PAUSE_MINUTES * 60)),
            copy_tags_to_snapshot: true,
            removal_policy: RemovalPolicy::Snapshot,
        },
    )?;
    tree.add_aspect(cluster.node, TagAspect::new(BASIC_OWNER_TAG, naming.item("-Owned")));

    let outputs = emit_outputs(
        tree,
        stack,
        &OutputKeys::basic(&naming),
        ConnectionDetails {
            endpoint: &cluster.endpoint,
            username: credentials.username(),
            secret_arn: &cluster.secret_arn(),
        },
    )?;

    tracing::info!(stack = BASIC_STACK_NAME, environment = %config.env, "assembled basic stack");
    Ok(BasicStack {
        stack,
        network,
        cluster,
        outputs,
    })
}
