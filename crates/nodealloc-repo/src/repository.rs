//! In-memory node repository with an allocation lock.
//!
//! Placement decisions read a [`LockedNodeList`], a point-in-time copy of
//! all nodes that can only be obtained while holding the repository's
//! [`AllocationLock`]. Realizing new nodes and writing them back must
//! happen under the same guard, so two placement passes never hand out the
//! same address.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use nodealloc_core::{ApplicationId, Node, NodeType, ResourceProfile};
use tracing::{debug, info};

use crate::error::{RepoError, RepoResult};
use crate::resolver::NameResolver;

/// Proof that the caller holds the repository's allocation lock.
pub struct AllocationLock<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Node repository shared by placement passes.
pub struct NodeRepository {
    nodes: RwLock<Vec<Node>>,
    allocation_lock: Mutex<()>,
    resolver: Arc<dyn NameResolver>,
}

impl NodeRepository {
    pub fn new(nodes: Vec<Node>, resolver: Arc<dyn NameResolver>) -> Self {
        debug!(count = nodes.len(), "node repository created");
        Self {
            nodes: RwLock::new(nodes),
            allocation_lock: Mutex::new(()),
            resolver,
        }
    }

    /// Acquires the allocation lock.
    pub fn lock(&self) -> RepoResult<AllocationLock<'_>> {
        let guard = self.allocation_lock.lock().map_err(|_| RepoError::LockPoisoned)?;
        Ok(AllocationLock { _guard: guard })
    }

    /// Returns a snapshot of all nodes. Requires the allocation lock.
    pub fn list(&self, _lock: &AllocationLock<'_>) -> RepoResult<LockedNodeList> {
        let nodes = self.nodes.read().map_err(|_| RepoError::LockPoisoned)?;
        Ok(LockedNodeList { nodes: nodes.clone() })
    }

    /// Inserts or replaces nodes by hostname.
    pub fn write(&self, updated: Vec<Node>, _lock: &AllocationLock<'_>) -> RepoResult<()> {
        let mut nodes = self.nodes.write().map_err(|_| RepoError::LockPoisoned)?;
        for node in updated {
            match nodes.iter_mut().find(|n| n.hostname == node.hostname) {
                Some(existing) => *existing = node,
                None => {
                    info!(hostname = %node.hostname, state = %node.state, "node added");
                    nodes.push(node);
                }
            }
        }
        Ok(())
    }

    pub fn name_resolver(&self) -> &dyn NameResolver {
        self.resolver.as_ref()
    }
}

/// Point-in-time list of nodes taken under the allocation lock.
#[derive(Debug, Clone)]
pub struct LockedNodeList {
    nodes: Vec<Node>,
}

impl LockedNodeList {
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, hostname: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.hostname == hostname)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.node_type == NodeType::Host)
    }

    pub fn children_of<'a>(&'a self, host: &'a Node) -> impl Iterator<Item = &'a Node> {
        self.nodes
            .iter()
            .filter(move |n| n.parent_hostname.as_deref() == Some(host.hostname.as_str()))
    }

    pub fn parent_of(&self, node: &Node) -> Option<&Node> {
        node.parent_hostname.as_deref().and_then(|p| self.get(p))
    }

    /// Nodes allocated to `owner` in cluster `cluster_id`.
    pub fn owned_by<'a>(
        &'a self,
        owner: &ApplicationId,
        cluster_id: &str,
    ) -> impl Iterator<Item = &'a Node> {
        self.nodes.iter().filter(move |n| {
            n.allocation
                .as_ref()
                .is_some_and(|a| &a.owner == owner && a.membership.cluster_id == cluster_id)
        })
    }

    /// Capacity of `host` not used by any of its children.
    pub fn free_capacity_of(&self, host: &Node) -> ResourceProfile {
        self.children_of(host)
            .fold(*host.resources(), |free, child| free.subtract(child.resources()))
    }

    /// Free capacity of every host, keyed by hostname.
    pub fn free_capacity_by_host(&self) -> HashMap<&str, ResourceProfile> {
        self.hosts()
            .map(|h| (h.hostname.as_str(), self.free_capacity_of(h)))
            .collect()
    }
}
