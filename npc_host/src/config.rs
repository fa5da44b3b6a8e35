//! Host configuration

use npc_ipc::{VersionPolicy, NPC_SCHEMA_VERSION};
use npc_logger::{LoggerError, LoggingConfig};
use npc_registry::CollisionPolicy;
use npc_types::{EndpointAddress, InvalidAddressError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace every host registration is placed under by default
pub const DEFAULT_ROOT_NAMESPACE: &str = "vortex";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse host configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid root namespace: {0}")]
    InvalidRoot(#[from] InvalidAddressError),

    #[error("min_schema_major {min} is newer than the supported major version {current}")]
    UnsupportedSchemaWindow { min: u32, current: u32 },

    #[error(transparent)]
    Logging(#[from] LoggerError),
}

/// Host configuration
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Prefix applied to every registered path, `/` or `\` separated
    pub root_namespace: String,
    pub collision_policy: CollisionPolicy,
    /// Oldest call schema major version the host still answers
    pub min_schema_major: u32,
    /// Installs the global subscriber on start when present
    pub logging: Option<LoggingConfig>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            root_namespace: DEFAULT_ROOT_NAMESPACE.to_string(),
            collision_policy: CollisionPolicy::default(),
            min_schema_major: NPC_SCHEMA_VERSION.major,
            logging: None,
        }
    }
}

impl HostConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_root_namespace(mut self, root: impl Into<String>) -> Self {
        self.root_namespace = root.into();
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn root(&self) -> Result<EndpointAddress, ConfigError> {
        Ok(EndpointAddress::normalize(&self.root_namespace)?)
    }

    pub fn version_policy(&self) -> VersionPolicy {
        VersionPolicy::current(NPC_SCHEMA_VERSION.major, NPC_SCHEMA_VERSION.minor)
            .with_min_major(self.min_schema_major)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.root()?;
        if self.min_schema_major > NPC_SCHEMA_VERSION.major {
            return Err(ConfigError::UnsupportedSchemaWindow {
                min: self.min_schema_major,
                current: NPC_SCHEMA_VERSION.major,
            });
        }
        if let Some(logging) = &self.logging {
            logging.validate()?;
        }
        Ok(())
    }
}
