//! Generated database credentials.

use rdsstack_common::error::Result;
use rdsstack_common::types::Tags;
use rdsstack_construct::resources::{CfnResource, CfnSecret, CfnSecretTargetAttachment, ResourceNode};
use rdsstack_construct::{ConstructKind, ConstructTree, NodeId, Value};

/// Characters never used in generated database passwords.
pub const DEFAULT_EXCLUDE_CHARACTERS: &str = " %+~`#$&*()|[]{}:;<>?!'/@\"\\";

/// Length of generated database passwords.
pub const DEFAULT_PASSWORD_LENGTH: u32 = 30;

/// Master credentials of a cluster: a username and a generated password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
}

impl Credentials {
    /// Credentials whose password is generated into a managed secret.
    #[must_use]
    pub fn from_generated_secret(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// The master username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// A secret holding a username and a generated password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseSecret {
    /// The high-level construct.
    pub node: NodeId,
    /// The `AWS::SecretsManager::Secret` resource.
    pub resource: NodeId,
}

impl DatabaseSecret {
    /// Creates the secret for `credentials` under `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or `scope` is not inside a stack.
    pub fn new(tree: &mut ConstructTree, scope: NodeId, id: &str, credentials: &Credentials) -> Result<Self> {
        let stack = tree.require_stack(scope)?;
        let description = format!("Generated by rdsstack for stack: {}", tree.node(stack).id());
        let node = tree.add_construct(scope, id, ConstructKind::DatabaseSecret)?;
        let resource = tree.add_resource(
            node,
            "Resource",
            ResourceNode::new(CfnResource::Secret(CfnSecret {
                description,
                username: credentials.username().to_string(),
                exclude_characters: DEFAULT_EXCLUDE_CHARACTERS.into(),
                password_length: DEFAULT_PASSWORD_LENGTH,
                tags: Tags::new(),
            })),
        )?;
        Ok(Self { node, resource })
    }

    /// Attaches the secret to a cluster so it gains connection details.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret was already attached.
    pub fn attach(&self, tree: &mut ConstructTree, cluster: NodeId) -> Result<AttachedSecret> {
        let attachment = tree.add_resource(
            self.node,
            "Attachment",
            ResourceNode::new(CfnResource::SecretTargetAttachment(CfnSecretTargetAttachment {
                secret: Value::Ref(self.resource),
                target: Value::Ref(cluster),
                target_type: "AWS::RDS::DBCluster".into(),
            })),
        )?;
        tracing::debug!(secret = %tree.path(self.node), "attached secret to cluster");
        Ok(AttachedSecret {
            secret: *self,
            attachment,
        })
    }

    /// Dynamic reference to one field of the secret string.
    #[must_use]
    pub fn field(&self, field: &str) -> Value {
        Value::Join(vec![
            Value::literal("{{resolve:secretsmanager:"),
            Value::Ref(self.resource),
            Value::literal(format!(":SecretString:{field}::}}}}")),
        ])
    }

    /// Dynamic reference to the username.
    #[must_use]
    pub fn username_ref(&self) -> Value {
        self.field("username")
    }

    /// Dynamic reference to the password.
    #[must_use]
    pub fn password_ref(&self) -> Value {
        self.field("password")
    }
}

/// A secret attached to its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedSecret {
    /// The attached secret.
    pub secret: DatabaseSecret,
    /// The `AWS::SecretsManager::SecretTargetAttachment` resource.
    pub attachment: NodeId,
}

impl AttachedSecret {
    /// ARN of the secret, resolved through the attachment.
    #[must_use]
    pub const fn secret_arn(&self) -> Value {
        Value::Ref(self.attachment)
    }
}

#[cfg(test)]
mod tests {
    use rdsstack_construct::StackProps;

    use super::*;

    #[test]
    fn secret_stores_username_and_excludes_characters() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("bill", StackProps::default()).expect("stack");
        let creds = Credentials::from_generated_secret("clusteradmin");
        let secret = DatabaseSecret::new(&mut tree, stack, "Secret", &creds).expect("secret");

        match tree.resource(secret.resource).map(|r| &r.resource) {
            Some(CfnResource::Secret(s)) => {
                assert_eq!(s.username, "clusteradmin");
                assert_eq!(s.password_length, 30);
                assert!(s.exclude_characters.contains('@'));
                assert!(s.exclude_characters.contains('"'));
                assert_eq!(s.description, "Generated by rdsstack for stack: bill");
            }
            other => panic!("expected a secret, got {other:?}"),
        }
    }

    #[test]
    fn field_reference_wraps_the_secret_ref() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let creds = Credentials::from_generated_secret("admin");
        let secret = DatabaseSecret::new(&mut tree, stack, "Secret", &creds).expect("secret");

        let Value::Join(parts) = secret.password_ref() else {
            panic!("expected a join");
        };
        assert_eq!(parts[0], Value::literal("{{resolve:secretsmanager:"));
        assert_eq!(parts[1], Value::Ref(secret.resource));
        assert_eq!(parts[2], Value::literal(":SecretString:password::}}"));
    }

    #[test]
    fn attaching_twice_fails() {
        let mut tree = ConstructTree::new();
        let stack = tree.add_stack("s", StackProps::default()).expect("stack");
        let creds = Credentials::from_generated_secret("admin");
        let secret = DatabaseSecret::new(&mut tree, stack, "Secret", &creds).expect("secret");

        let attached = secret.attach(&mut tree, secret.resource).expect("attach");
        assert_eq!(attached.secret_arn(), Value::Ref(attached.attachment));
        assert!(secret.attach(&mut tree, secret.resource).is_err());
    }
}
