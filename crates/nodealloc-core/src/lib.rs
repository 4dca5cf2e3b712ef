//! nodealloc-core — shared data model for node allocation.
//!
//! Resource profiles, flavors, nodes with their allocations, host skew,
//! and the `cluster.toml` snapshot format consumed by the CLI.

pub mod config;
pub mod error;
pub mod flavor;
pub mod node;
pub mod resources;

pub use config::ClusterConfig;
pub use error::{ConfigError, ConfigResult};
pub use flavor::{Flavor, FlavorCatalog};
pub use node::{skew, Allocation, ApplicationId, ClusterMembership, IpConfig, Node, NodeState, NodeType};
pub use resources::{DiskSpeed, ResourceProfile, StorageType};
