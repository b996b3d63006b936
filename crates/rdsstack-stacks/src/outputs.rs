//! Stack outputs describing how to connect to a cluster.

use rdsstack_common::constants::DEFAULT_DB_PORT_STR;
use rdsstack_common::error::Result;
use rdsstack_common::types::Naming;
use rdsstack_construct::resources::CfnOutput;
use rdsstack_construct::{ConstructTree, NodeId, Value};

use crate::cluster::Endpoint;

/// Port part of a `host:port` address.
///
/// Everything after the first colon is returned as is; an address without
/// a colon yields the default database port.
#[must_use]
pub fn port_from_socket_address(address: &str) -> String {
    address
        .split_once(':')
        .map_or_else(|| DEFAULT_DB_PORT_STR.to_string(), |(_, port)| port.to_string())
}

/// Names of the four connection outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputKeys {
    /// Endpoint hostname.
    pub host: String,
    /// Endpoint port.
    pub port: String,
    /// Master username.
    pub username: String,
    /// Master secret ARN.
    pub password_arn: String,
}

impl OutputKeys {
    /// `<prefix>-host`, `<prefix>-port`, `<prefix>-username`,
    /// `<prefix>-password-arn`.
    #[must_use]
    pub fn basic(naming: &Naming) -> Self {
        Self {
            host: naming.item("-host"),
            port: naming.item("-port"),
            username: naming.item("-username"),
            password_arn: naming.item("-password-arn"),
        }
    }

    /// `host`, `port`, `adminusername`, `adminpasswordarn`.
    #[must_use]
    pub fn serverless_v2() -> Self {
        Self {
            host: "host".into(),
            port: "port".into(),
            username: "adminusername".into(),
            password_arn: "adminpasswordarn".into(),
        }
    }
}

/// What the outputs are built from.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionDetails<'a> {
    /// Cluster endpoint.
    pub endpoint: &'a Endpoint,
    /// Master username.
    pub username: &'a str,
    /// Master secret ARN.
    pub secret_arn: &'a Value,
}

/// Outputs in emission order: host, port, username, secret ARN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSet {
    entries: Vec<(String, Value)>,
}

impl OutputSet {
    /// Value of the output named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Output names in emission order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no output was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Adds the four connection outputs to `stack`.
///
/// # Errors
///
/// Returns an error if an output name is already taken in the stack.
pub fn emit_outputs(
    tree: &mut ConstructTree,
    stack: NodeId,
    keys: &OutputKeys,
    details: ConnectionDetails<'_>,
) -> Result<OutputSet> {
    let port = port_from_socket_address(&details.endpoint.socket_address());
    let entries = vec![
        (keys.host.clone(), details.endpoint.hostname.clone()),
        (keys.port.clone(), Value::parse(&port)),
        (keys.username.clone(), Value::literal(details.username)),
        (keys.password_arn.clone(), details.secret_arn.clone()),
    ];

    for (name, value) in &entries {
        let _ = tree.add_output(stack, name, CfnOutput::new(value.clone()))?;
    }
    tracing::debug!(stack = %tree.path(stack), outputs = entries.len(), "emitted outputs");
    Ok(OutputSet { entries })
}
