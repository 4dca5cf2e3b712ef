//! Per-host address pools for new child nodes.
//!
//! A host owns a pool of addresses it may hand to children. An address is
//! free when no node in the locked snapshot uses it as a primary address.
//! Allocation prefers IPv6: the first free IPv6 address is resolved to a
//! hostname, and that hostname's IPv4 address (if it has one) must also be
//! free in the same pool. Only when no IPv6 address is free is a bare IPv4
//! address allocated.

use std::collections::BTreeSet;
use std::net::IpAddr;

use nodealloc_core::Node;
use tracing::debug;

use crate::error::IpAllocationError;
use crate::repository::LockedNodeList;
use crate::resolver::NameResolver;

/// Addresses and hostname assigned to a new child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAllocation {
    pub hostname: String,
    pub addresses: Vec<IpAddr>,
}

/// Pool of addresses owned by a single host.
#[derive(Debug, Clone, Default)]
pub struct IpPool {
    addresses: BTreeSet<IpAddr>,
}

impl IpPool {
    pub fn new(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// The pool configured on `host`.
    pub fn of(host: &Node) -> Self {
        Self::new(host.ip_config.pool.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Pool addresses not used as a primary address by any node in `nodes`.
    pub fn find_unused(&self, nodes: &LockedNodeList) -> BTreeSet<IpAddr> {
        let used: BTreeSet<IpAddr> = nodes
            .iter()
            .flat_map(|n| n.ip_config.primary.iter().copied())
            .collect();
        self.addresses.difference(&used).copied().collect()
    }

    /// Finds a free allocation in this pool, or `None` if the pool is exhausted.
    pub fn find_allocation(
        &self,
        nodes: &LockedNodeList,
        resolver: &dyn NameResolver,
    ) -> Result<Option<IpAllocation>, IpAllocationError> {
        let unused = self.find_unused(nodes);

        if let Some(ipv6) = unused.iter().copied().find(IpAddr::is_ipv6) {
            let allocation = Self::allocation_of_ipv6(ipv6, resolver)?;
            for address in allocation.addresses.iter().filter(|a| a.is_ipv4()) {
                if !unused.contains(address) {
                    return Err(IpAllocationError::AddressNotInPool {
                        hostname: allocation.hostname.clone(),
                        address: *address,
                    });
                }
            }
            debug!(hostname = %allocation.hostname, addresses = ?allocation.addresses, "allocated IPv6 address");
            return Ok(Some(allocation));
        }

        if let Some(ipv4) = unused.iter().copied().find(IpAddr::is_ipv4) {
            let hostname = resolver
                .resolve_hostname(ipv4)?
                .ok_or(IpAllocationError::Unresolvable(ipv4))?;
            debug!(%hostname, address = %ipv4, "allocated IPv4 address");
            return Ok(Some(IpAllocation {
                hostname,
                addresses: vec![ipv4],
            }));
        }

        debug!(pool_size = self.addresses.len(), "no unused addresses in pool");
        Ok(None)
    }

    fn allocation_of_ipv6(
        ipv6: IpAddr,
        resolver: &dyn NameResolver,
    ) -> Result<IpAllocation, IpAllocationError> {
        let hostname = resolver
            .resolve_hostname(ipv6)?
            .ok_or(IpAllocationError::Unresolvable(ipv6))?;
        let ipv4: Vec<IpAddr> = resolver
            .resolve_all(&hostname)?
            .into_iter()
            .filter(IpAddr::is_ipv4)
            .collect();
        if ipv4.len() > 1 {
            return Err(IpAllocationError::MultipleIpv4 {
                hostname,
                addresses: ipv4,
            });
        }
        let mut addresses = vec![ipv6];
        addresses.extend(ipv4);
        Ok(IpAllocation { hostname, addresses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::NodeRepository;
    use crate::resolver::StaticNameResolver;
    use nodealloc_core::{Flavor, NodeState, NodeType, ResourceProfile};
    use std::sync::Arc;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn snapshot(nodes: Vec<Node>) -> LockedNodeList {
        let repo = NodeRepository::new(nodes, Arc::new(StaticNameResolver::default()));
        let lock = repo.lock().unwrap();
        repo.list(&lock).unwrap()
    }

    fn tenant(name: &str, address: &str) -> Node {
        Node::new(
            name,
            Flavor::anonymous(ResourceProfile::new(1.0, 1.0, 1.0)),
            NodeState::Active,
            NodeType::Tenant,
        )
        .with_primary_addresses(vec![ip(address)])
    }

    #[test]
    fn prefers_ipv6_with_matching_ipv4() {
        let resolver = StaticNameResolver::parse("::1:1 child1\n10.0.0.1 child1\n::1:2 child2\n10.0.0.2 child2\n");
        let pool = IpPool::new([ip("::1:1"), ip("10.0.0.1"), ip("::1:2"), ip("10.0.0.2")]);

        let allocation = pool.find_allocation(&snapshot(vec![]), &resolver).unwrap().unwrap();
        assert_eq!(allocation.hostname, "child1");
        assert_eq!(allocation.addresses, vec![ip("::1:1"), ip("10.0.0.1")]);
    }

    #[test]
    fn skips_addresses_in_use() {
        let resolver = StaticNameResolver::parse("::1:1 child1\n10.0.0.1 child1\n::1:2 child2\n10.0.0.2 child2\n");
        let pool = IpPool::new([ip("::1:1"), ip("10.0.0.1"), ip("::1:2"), ip("10.0.0.2")]);
        let mut used = tenant("child1", "::1:1");
        used.ip_config.primary.push(ip("10.0.0.1"));

        let allocation = pool.find_allocation(&snapshot(vec![used]), &resolver).unwrap().unwrap();
        assert_eq!(allocation.hostname, "child2");
    }

    #[test]
    fn falls_back_to_ipv4() {
        let resolver = StaticNameResolver::parse("10.0.0.5 v4only\n");
        let pool = IpPool::new([ip("10.0.0.5")]);
        let allocation = pool.find_allocation(&snapshot(vec![]), &resolver).unwrap().unwrap();
        assert_eq!(allocation.hostname, "v4only");
        assert_eq!(allocation.addresses, vec![ip("10.0.0.5")]);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let resolver = StaticNameResolver::parse("10.0.0.5 v4only\n");
        let pool = IpPool::new([ip("10.0.0.5")]);
        let nodes = snapshot(vec![tenant("v4only", "10.0.0.5")]);
        assert!(pool.find_allocation(&nodes, &resolver).unwrap().is_none());
        assert!(IpPool::default().is_empty());
        assert!(IpPool::default().find_allocation(&nodes, &resolver).unwrap().is_none());
    }

    #[test]
    fn unresolvable_address_is_an_error() {
        let pool = IpPool::new([ip("10.0.0.9")]);
        let err = pool
            .find_allocation(&snapshot(vec![]), &StaticNameResolver::default())
            .unwrap_err();
        assert!(matches!(err, IpAllocationError::Unresolvable(a) if a == ip("10.0.0.9")));
    }

    #[test]
    fn ipv4_outside_pool_is_an_error() {
        let resolver = StaticNameResolver::parse("::1:1 child1\n10.0.0.1 child1\n");
        let pool = IpPool::new([ip("::1:1")]);
        let err = pool.find_allocation(&snapshot(vec![]), &resolver).unwrap_err();
        assert!(matches!(err, IpAllocationError::AddressNotInPool { .. }));
    }
}
