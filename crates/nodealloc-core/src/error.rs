//! Error types for cluster configuration loading.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading a cluster configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate hostname: {0}")]
    DuplicateHostname(String),

    #[error("node {node} references unknown parent host {parent}")]
    UnknownParent { node: String, parent: String },

    #[error("node {node} references unknown flavor {flavor}")]
    UnknownFlavor { node: String, flavor: String },

    #[error("node {0} has neither a flavor nor inline resources")]
    MissingResources(String),

    #[error("node {node} has invalid owner {owner:?}, expected tenant:application[:instance]")]
    InvalidOwner { node: String, owner: String },
}
