//! Realization: turning a hypothetical candidate into a node.
//!
//! The only side effect in placement is claiming an address for a new
//! child. It goes through an [`IpAllocator`], so ranking stays pure and
//! tests can inject a stub. [`PoolAllocator`] is the production allocator:
//! it searches the parent's address pool against a locked node list.
//! The caller must hold the allocation lock that produced the list for as
//! long as realized nodes are in use.

use nodealloc_core::{Node, NodeType};
use nodealloc_repo::{IpAllocation, IpAllocationError, IpPool, LockedNodeList, NameResolver};
use tracing::{debug, warn};

use crate::candidate::{CandidateKind, NodeCandidate};

/// Finds a free address for a new child of a host.
pub trait IpAllocator {
    fn find_allocation(&self, host: &Node) -> Result<Option<IpAllocation>, IpAllocationError>;
}

/// Allocates from the host's own pool, against a locked snapshot.
pub struct PoolAllocator<'a> {
    nodes: &'a LockedNodeList,
    resolver: &'a dyn NameResolver,
}

impl<'a> PoolAllocator<'a> {
    pub fn new(nodes: &'a LockedNodeList, resolver: &'a dyn NameResolver) -> Self {
        Self { nodes, resolver }
    }
}

impl IpAllocator for PoolAllocator<'_> {
    fn find_allocation(&self, host: &Node) -> Result<Option<IpAllocation>, IpAllocationError> {
        let pool = IpPool::of(host);
        if pool.is_empty() {
            debug!(host = %host.hostname, "host has no address pool");
            return Ok(None);
        }
        pool.find_allocation(self.nodes, self.resolver)
    }
}

impl<'a> NodeCandidate<'a> {
    /// Materializes the node behind a hypothetical candidate.
    ///
    /// The new node inherits the parent's disk speed and storage type. If
    /// no address is free, or allocation fails, the result is an
    /// unrealizable candidate carrying the same resources and parent.
    /// Existing and unrealizable candidates are returned unchanged.
    pub fn realize(&self) -> NodeCandidate<'a> {
        let CandidateKind::Hypothetical {
            resources,
            parent,
            allocator,
        } = self.kind
        else {
            return self.clone();
        };

        let allocation = match allocator.find_allocation(parent) {
            Ok(Some(allocation)) => allocation,
            Ok(None) => {
                debug!(parent = %parent.hostname, "no free address on host");
                return NodeCandidate::unrealizable(resources, *self.free_parent_capacity(), parent);
            }
            Err(e) => {
                warn!(parent = %parent.hostname, error = %e, "failed allocating IP address");
                return NodeCandidate::unrealizable(resources, *self.free_parent_capacity(), parent);
            }
        };

        let host_resources = parent.resources();
        let node = Node::create_child(
            allocation.addresses,
            &allocation.hostname,
            &parent.hostname,
            resources
                .with_disk_speed(host_resources.disk_speed)
                .with_storage_type(host_resources.storage_type),
            NodeType::Tenant,
        );
        debug!(hostname = %node.hostname, parent = %parent.hostname, "realized candidate");
        self.with_node(node)
    }
}
