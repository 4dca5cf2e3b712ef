//! Cluster snapshot configuration (`cluster.toml`).
//!
//! Describes flavors, hosts, tenant nodes and static name resolution for
//! a cluster, plus placement settings. [`ClusterConfig::to_nodes`] turns
//! the file into validated [`Node`] values.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::flavor::{Flavor, FlavorCatalog};
use crate::node::{Allocation, ApplicationId, ClusterMembership, Node, NodeState, NodeType};
use crate::resources::ResourceProfile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub flavors: Vec<FlavorConfig>,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub name_resolution: NameResolutionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Number of hosts kept free as spares for failure headroom.
    #[serde(default)]
    pub spare_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavorConfig {
    pub name: String,
    pub resources: ResourceProfile,
    #[serde(default)]
    pub cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub hostname: String,
    #[serde(default = "default_host_state")]
    pub state: NodeState,
    pub flavor: Option<String>,
    pub resources: Option<ResourceProfile>,
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
    #[serde(default)]
    pub ip_pool: Vec<IpAddr>,
    pub reserved_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub hostname: String,
    pub parent: Option<String>,
    #[serde(default = "default_node_state")]
    pub state: NodeState,
    pub flavor: Option<String>,
    pub resources: Option<ResourceProfile>,
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
    /// Owner as `tenant:application[:instance]`.
    pub owner: Option<String>,
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub want_to_retire: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameResolutionConfig {
    /// `/etc/hosts`-format content.
    #[serde(default)]
    pub hosts: String,
}

fn default_host_state() -> NodeState {
    NodeState::Active
}

fn default_node_state() -> NodeState {
    NodeState::Ready
}

impl ClusterConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn flavor_catalog(&self) -> FlavorCatalog {
        FlavorCatalog::new(
            self.flavors
                .iter()
                .map(|f| Flavor::new(&f.name, f.resources, f.cost)),
        )
    }

    /// Builds and validates every host and tenant node in the file.
    pub fn to_nodes(&self) -> ConfigResult<Vec<Node>> {
        let catalog = self.flavor_catalog();
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(self.hosts.len() + self.nodes.len());

        for host in &self.hosts {
            if !seen.insert(host.hostname.as_str()) {
                return Err(ConfigError::DuplicateHostname(host.hostname.clone()));
            }
            let flavor = resolve_flavor(&catalog, &host.hostname, &host.flavor, &host.resources)?;
            let mut node = Node::new(&host.hostname, flavor, host.state, NodeType::Host)
                .with_primary_addresses(host.addresses.clone())
                .with_ip_pool(host.ip_pool.clone());
            node.reserved_to = host.reserved_to.clone();
            nodes.push(node);
        }

        let host_names: HashSet<&str> = self.hosts.iter().map(|h| h.hostname.as_str()).collect();
        for cfg in &self.nodes {
            if !seen.insert(cfg.hostname.as_str()) {
                return Err(ConfigError::DuplicateHostname(cfg.hostname.clone()));
            }
            if let Some(parent) = &cfg.parent {
                if !host_names.contains(parent.as_str()) {
                    return Err(ConfigError::UnknownParent {
                        node: cfg.hostname.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            let flavor = resolve_flavor(&catalog, &cfg.hostname, &cfg.flavor, &cfg.resources)?;
            let mut node = Node::new(&cfg.hostname, flavor, cfg.state, NodeType::Tenant)
                .with_primary_addresses(cfg.addresses.clone())
                .with_want_to_retire(cfg.want_to_retire);
            node.parent_hostname = cfg.parent.clone();

            if let Some(owner) = &cfg.owner {
                let owner_id = ApplicationId::parse(owner).ok_or_else(|| ConfigError::InvalidOwner {
                    node: cfg.hostname.clone(),
                    owner: owner.clone(),
                })?;
                let mut membership = ClusterMembership::new(
                    cfg.cluster_id.as_deref().unwrap_or("default"),
                    cfg.index,
                );
                membership.retired = cfg.retired;
                let requested = *node.resources();
                node = node.with_allocation(Allocation {
                    owner: owner_id,
                    membership,
                    requested_resources: requested,
                    allocated_at: 0,
                });
            }
            nodes.push(node);
        }

        Ok(nodes)
    }
}

fn resolve_flavor(
    catalog: &FlavorCatalog,
    hostname: &str,
    flavor: &Option<String>,
    resources: &Option<ResourceProfile>,
) -> ConfigResult<Flavor> {
    match (flavor, resources) {
        (Some(name), _) => catalog.get(name).cloned().ok_or_else(|| ConfigError::UnknownFlavor {
            node: hostname.to_string(),
            flavor: name.clone(),
        }),
        (None, Some(resources)) => Ok(catalog.flavor_for(resources)),
        (None, None) => Err(ConfigError::MissingResources(hostname.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::DiskSpeed;

    const SAMPLE: &str = r#"
[placement]
spare_count = 1

[[flavors]]
name = "d-2-4-10"
cost = 10
resources = { vcpu = 2.0, memory_gb = 4.0, disk_gb = 10.0 }

[[flavors]]
name = "host-large"
cost = 100
resources = { vcpu = 32.0, memory_gb = 128.0, disk_gb = 2000.0, disk_speed = "fast", storage_type = "local" }

[[hosts]]
hostname = "host1.example.com"
flavor = "host-large"
ip_pool = ["::1:1", "10.0.0.11"]
reserved_to = "tenant-a"

[[hosts]]
hostname = "host2.example.com"
state = "ready"
resources = { vcpu = 16.0, memory_gb = 64.0, disk_gb = 1000.0 }

[[nodes]]
hostname = "node1.example.com"
parent = "host1.example.com"
state = "active"
flavor = "d-2-4-10"
addresses = ["10.0.0.21"]
owner = "tenant-a:app"
cluster_id = "content"
index = 2

[name_resolution]
hosts = """
10.0.0.11 child1.example.com
"""
"#;

    #[test]
    fn test_parse_sample() {
        let config = ClusterConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.placement.spare_count, 1);
        assert_eq!(config.flavors.len(), 2);
        assert!(config.name_resolution.hosts.contains("child1.example.com"));

        let nodes = config.to_nodes().unwrap();
        assert_eq!(nodes.len(), 3);

        let host1 = &nodes[0];
        assert_eq!(host1.node_type, NodeType::Host);
        assert_eq!(host1.state, NodeState::Active);
        assert_eq!(host1.reserved_to.as_deref(), Some("tenant-a"));
        assert_eq!(host1.ip_config.pool.len(), 2);
        assert_eq!(host1.resources().disk_speed, DiskSpeed::Fast);

        let host2 = &nodes[1];
        assert_eq!(host2.state, NodeState::Ready);
        assert_eq!(host2.flavor.cost, 0);

        let node1 = &nodes[2];
        assert_eq!(node1.parent_hostname.as_deref(), Some("host1.example.com"));
        let allocation = node1.allocation.as_ref().unwrap();
        assert_eq!(allocation.owner, ApplicationId::new("tenant-a", "app", "default"));
        assert_eq!(allocation.membership.cluster_id, "content");
        assert_eq!(allocation.membership.index, 2);
    }

    #[test]
    fn test_parse_minimal() {
        let config = ClusterConfig::parse("").unwrap();
        assert_eq!(config.placement.spare_count, 0);
        assert!(config.to_nodes().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_parent() {
        let toml_str = r#"
[[nodes]]
hostname = "n1"
parent = "missing"
resources = { vcpu = 1.0, memory_gb = 1.0, disk_gb = 1.0 }
"#;
        let err = ClusterConfig::parse(toml_str).unwrap().to_nodes().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParent { .. }));
    }

    #[test]
    fn rejects_duplicate_hostname() {
        let toml_str = r#"
[[hosts]]
hostname = "h1"
resources = { vcpu = 1.0, memory_gb = 1.0, disk_gb = 1.0 }

[[nodes]]
hostname = "h1"
resources = { vcpu = 1.0, memory_gb = 1.0, disk_gb = 1.0 }
"#;
        let err = ClusterConfig::parse(toml_str).unwrap().to_nodes().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateHostname(h) if h == "h1"));
    }

    #[test]
    fn rejects_unknown_flavor_and_missing_resources() {
        let unknown = ClusterConfig::parse("[[hosts]]\nhostname = \"h\"\nflavor = \"nope\"\n").unwrap();
        assert!(matches!(unknown.to_nodes().unwrap_err(), ConfigError::UnknownFlavor { .. }));

        let missing = ClusterConfig::parse("[[hosts]]\nhostname = \"h\"\n").unwrap();
        assert!(matches!(missing.to_nodes().unwrap_err(), ConfigError::MissingResources(_)));
    }

    #[test]
    fn rejects_bad_address() {
        let toml_str = r#"
[[hosts]]
hostname = "h"
ip_pool = ["not-an-ip"]
resources = { vcpu = 1.0, memory_gb = 1.0, disk_gb = 1.0 }
"#;
        assert!(matches!(ClusterConfig::parse(toml_str), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn from_file_reads_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = ClusterConfig::from_file(&path).unwrap();
        assert_eq!(config.hosts.len(), 2);

        let missing = ClusterConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read(_))));
    }
}
