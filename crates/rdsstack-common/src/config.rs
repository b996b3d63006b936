//! Deployment configuration model and resolver.
//!
//! Only presence and type checks happen here. Whether a VPC identifier is
//! well formed is left to the provisioning backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{BASIC_ADMIN_USERNAME, BASIC_VPC_ID, DEFAULT_CONFIG_FILE, ENV_CONFIG_FILE};
use crate::error::ConfigError;
use crate::types::{Environment, Tags};

/// Per-instance settings supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    /// Identifier of the existing VPC to deploy into.
    #[serde(rename = "vpcId", default)]
    pub vpc_id: String,
    /// Administrative username of the cluster.
    #[serde(default)]
    pub admin_username: String,
    /// Name of the database created with the cluster.
    #[serde(rename = "dbName", default)]
    pub database_name: String,
    /// Whether the cluster is protected from deletion.
    #[serde(default)]
    pub deletion_protection: bool,
    /// Tags applied to the stack; these override global tags.
    #[serde(default)]
    pub tags: Tags,
}

impl InstanceConfig {
    /// Fixed settings of the basic serverless program.
    #[must_use]
    pub fn basic() -> Self {
        Self {
            vpc_id: BASIC_VPC_ID.into(),
            admin_username: BASIC_ADMIN_USERNAME.into(),
            database_name: String::new(),
            deletion_protection: false,
            tags: Tags::new(),
        }
    }

    /// Loads the configuration from `explicit`, `$RDS_CONFIG_FILE`, or
    /// `config.json`, in that order.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or is
    /// missing a required field.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map_or_else(
            || {
                std::env::var(ENV_CONFIG_FILE)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
            },
            Path::to_path_buf,
        );
        Self::load(&path)
    }

    /// Loads and checks a configuration file.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or is
    /// missing a required field.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.check()?;
        Ok(config)
    }

    /// Loads a configuration file for the basic program.
    ///
    /// The basic cluster creates no database, so `dbName` may be absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or is
    /// missing `vpcId` or `adminUsername`.
    pub fn load_basic(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.check_basic()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!(path = %path.display(), "loading instance configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let config: Self = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };
        Ok(config)
    }

    /// Verifies that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for the first empty required field,
    /// or [`ConfigError::Invalid`] for an empty tag key.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.check_basic()?;
        if self.database_name.trim().is_empty() {
            return Err(ConfigError::Missing { field: "dbName" });
        }
        Ok(())
    }

    /// Like [`check`](Self::check), without requiring a database name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for an empty `vpcId` or
    /// `adminUsername`, or [`ConfigError::Invalid`] for an empty tag key.
    pub fn check_basic(&self) -> Result<(), ConfigError> {
        if self.vpc_id.trim().is_empty() {
            return Err(ConfigError::Missing { field: "vpcId" });
        }
        if self.admin_username.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "adminUsername",
            });
        }
        if self.tags.iter().any(|(k, _)| k.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "tags",
                message: "tag keys must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Fully resolved configuration for one program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Target account and region.
    pub env: Environment,
    /// Operator-supplied instance settings.
    pub instance: InstanceConfig,
}

impl Configuration {
    /// Combines an environment with instance settings.
    #[must_use]
    pub const fn new(env: Environment, instance: InstanceConfig) -> Self {
        Self { env, instance }
    }

    /// Configuration of the basic program: process environment plus the
    /// fixed basic settings.
    #[must_use]
    pub fn basic_from_env() -> Self {
        Self::new(Environment::from_env(), InstanceConfig::basic())
    }

    /// Resolves the environment and loads the instance configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the instance configuration cannot be
    /// loaded.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let instance = InstanceConfig::resolve(explicit)?;
        Ok(Self::new(Environment::from_env(), instance))
    }
}
