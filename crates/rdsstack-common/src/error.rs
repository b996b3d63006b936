//! Unified error types for the rdsstack workspace.
//!
//! [`ConfigError`] covers configuration resolution and always has a single
//! cause. [`StackError`] covers construction and synthesis of the stacks.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to resolve the deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is absent or empty.
    #[error("missing required configuration field `{field}`")]
    Missing {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field is present but cannot be used.
    #[error("invalid configuration field `{field}`: {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or YAML.
    #[error("cannot parse configuration file {path}: {message}")]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Parser error message.
        message: String,
    },
}

/// Top-level error type for building and synthesizing stacks.
#[derive(Debug, Error)]
pub enum StackError {
    /// Configuration resolution failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A construct with the same id already exists under the parent.
    #[error("there is already a construct with id \"{id}\" under {parent}")]
    DuplicateConstruct {
        /// Path of the parent construct.
        parent: String,
        /// Conflicting child id.
        id: String,
    },

    /// A construct id is empty or contains a path separator.
    #[error("invalid construct id \"{id}\": {message}")]
    InvalidId {
        /// The rejected id.
        id: String,
        /// Description of the problem.
        message: String,
    },

    /// A construct property is out of range.
    #[error("invalid property of {path}: {message}")]
    InvalidProperty {
        /// Path of the construct.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// A construct was expected to live inside a stack.
    #[error("construct {path} is not inside a stack")]
    NoStack {
        /// Path of the construct.
        path: String,
    },

    /// A context lookup was attempted in an environment-agnostic stack.
    #[error(
        "cannot look up {provider} for stack {stack}: account and region must be set \
         (CDK_DEFAULT_ACCOUNT / CDK_DEFAULT_REGION)"
    )]
    AgnosticLookup {
        /// Lookup provider name.
        provider: &'static str,
        /// Stack that requested the lookup.
        stack: String,
    },

    /// Context lookups that have no cached value.
    #[error("missing context values, add them to the context file: {}", keys.join(", "))]
    MissingContext {
        /// Context keys that could not be resolved.
        keys: Vec<String>,
    },

    /// A cached context value does not match the expected schema.
    #[error("malformed context value for {key}: {message}")]
    MalformedContext {
        /// Context key.
        key: String,
        /// Description of the problem.
        message: String,
    },

    /// A resource references a resource in a different stack.
    #[error("{from} references {to}, which belongs to another stack")]
    CrossStackReference {
        /// Path of the referencing construct.
        from: String,
        /// Path of the referenced construct.
        to: String,
    },

    /// A token points at a construct that is not a resource.
    #[error("{from} references {to}, which is not a resource")]
    UnresolvableReference {
        /// Path of the referencing construct.
        from: String,
        /// Path of the referenced construct.
        to: String,
    },

    /// The resource dependency graph has a cycle.
    #[error("cyclic dependency detected in stack {stack}")]
    CyclicDependency {
        /// Stack containing the cycle.
        stack: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StackError>;
