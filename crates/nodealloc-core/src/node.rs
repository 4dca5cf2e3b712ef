//! Nodes, their allocations and host skew.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::flavor::Flavor;
use crate::resources::ResourceProfile;

// ── States ───────────────────────────────────────────────────────

/// Lifecycle state of a node in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Provisioned,
    Ready,
    Reserved,
    Active,
    Inactive,
    Dirty,
    Failed,
    Parked,
    Deprovisioned,
    Breakfixed,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Provisioned => "provisioned",
            NodeState::Ready => "ready",
            NodeState::Reserved => "reserved",
            NodeState::Active => "active",
            NodeState::Inactive => "inactive",
            NodeState::Dirty => "dirty",
            NodeState::Failed => "failed",
            NodeState::Parked => "parked",
            NodeState::Deprovisioned => "deprovisioned",
            NodeState::Breakfixed => "breakfixed",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a node is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Tenant,
    Host,
    Proxy,
    Config,
}

// ── Allocation ───────────────────────────────────────────────────

/// Fully qualified owner of an allocation: `tenant:application:instance`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId {
    pub tenant: String,
    pub application: String,
    pub instance: String,
}

impl ApplicationId {
    pub fn new(tenant: &str, application: &str, instance: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            application: application.to_string(),
            instance: instance.to_string(),
        }
    }

    /// Parses `tenant:application:instance`; the instance defaults to `default`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(':');
        let tenant = parts.next().filter(|p| !p.is_empty())?;
        let application = parts.next().filter(|p| !p.is_empty())?;
        let instance = parts.next().unwrap_or("default");
        if parts.next().is_some() || instance.is_empty() {
            return None;
        }
        Some(Self::new(tenant, application, instance))
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant, self.application, self.instance)
    }
}

/// A node's position within a logical cluster of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMembership {
    pub cluster_id: String,
    pub index: u32,
    #[serde(default)]
    pub retired: bool,
}

impl ClusterMembership {
    pub fn new(cluster_id: &str, index: u32) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            index,
            retired: false,
        }
    }

    pub fn retire(mut self) -> Self {
        self.retired = true;
        self
    }
}

/// Binding of a node to an owner and a cluster membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub owner: ApplicationId,
    pub membership: ClusterMembership,
    pub requested_resources: ResourceProfile,
    /// Unix timestamp (seconds) when the allocation was made.
    pub allocated_at: u64,
}

// ── Node ─────────────────────────────────────────────────────────

/// Addresses owned by a node: its own primary addresses and, for hosts,
/// the pool of addresses that can be handed to children.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IpConfig {
    #[serde(default)]
    pub primary: Vec<IpAddr>,
    #[serde(default)]
    pub pool: Vec<IpAddr>,
}

/// A node in the repository: a host, or a tenant node running on a host
/// or standalone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub hostname: String,
    pub parent_hostname: Option<String>,
    pub ip_config: IpConfig,
    pub flavor: Flavor,
    pub state: NodeState,
    pub node_type: NodeType,
    pub allocation: Option<Allocation>,
    pub want_to_retire: bool,
    /// Tenant this host is exclusively reserved to, if any.
    pub reserved_to: Option<String>,
}

impl Node {
    /// Creates a node in the given state with no allocation.
    pub fn new(hostname: &str, flavor: Flavor, state: NodeState, node_type: NodeType) -> Self {
        Self {
            id: hostname.to_string(),
            hostname: hostname.to_string(),
            parent_hostname: None,
            ip_config: IpConfig::default(),
            flavor,
            state,
            node_type,
            allocation: None,
            want_to_retire: false,
            reserved_to: None,
        }
    }

    /// Creates a tenant node on `parent_hostname`, in state `reserved`.
    pub fn create_child(
        addresses: Vec<IpAddr>,
        hostname: &str,
        parent_hostname: &str,
        resources: ResourceProfile,
        node_type: NodeType,
    ) -> Self {
        let mut node = Node::new(hostname, Flavor::anonymous(resources), NodeState::Reserved, node_type);
        node.parent_hostname = Some(parent_hostname.to_string());
        node.ip_config.primary = addresses;
        node
    }

    pub fn with_parent(mut self, parent_hostname: &str) -> Self {
        self.parent_hostname = Some(parent_hostname.to_string());
        self
    }

    pub fn with_primary_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.ip_config.primary = addresses;
        self
    }

    pub fn with_ip_pool(mut self, pool: Vec<IpAddr>) -> Self {
        self.ip_config.pool = pool;
        self
    }

    pub fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.allocation = Some(allocation);
        self
    }

    pub fn with_want_to_retire(mut self, want_to_retire: bool) -> Self {
        self.want_to_retire = want_to_retire;
        self
    }

    pub fn reserved_to(mut self, tenant: &str) -> Self {
        self.reserved_to = Some(tenant.to_string());
        self
    }

    pub fn resources(&self) -> &ResourceProfile {
        &self.flavor.resources
    }

    /// Returns a copy allocated to `owner`, in state `reserved`.
    pub fn allocate(
        &self,
        owner: ApplicationId,
        membership: ClusterMembership,
        requested_resources: ResourceProfile,
        at: u64,
    ) -> Self {
        let mut node = self.clone();
        node.state = NodeState::Reserved;
        node.allocation = Some(Allocation {
            owner,
            membership,
            requested_resources,
            allocated_at: at,
        });
        node
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.hostname, self.state)
    }
}

// ── Skew ─────────────────────────────────────────────────────────

/// Imbalance of a host's utilisation across vcpu, memory and disk.
///
/// Computes the utilisation ratio of each dimension from `total` and
/// `free` and returns the sum of squared deviations from the mean ratio.
/// A host whose utilisation is equal in every dimension has zero skew.
pub fn skew(total: &ResourceProfile, free: &ResourceProfile) -> f64 {
    let all = total.just_numbers();
    let allocated = all.subtract(&free.just_numbers());
    let ratio = |used: f64, capacity: f64| if capacity > 0.0 { used / capacity } else { 0.0 };
    let ratios = [
        ratio(allocated.vcpu, all.vcpu),
        ratio(allocated.memory_gb, all.memory_gb),
        ratio(allocated.disk_gb, all.disk_gb),
    ];
    let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
    ratios.iter().map(|r| (mean - r).powi(2)).sum()
}
