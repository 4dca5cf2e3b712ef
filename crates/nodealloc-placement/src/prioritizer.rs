//! Candidate assembly and selection for one placement pass.
//!
//! [`NodePrioritizer`] builds every candidate for a request from a locked
//! node list:
//! 1. Nodes already allocated to the cluster (active, inactive, reserved)
//! 2. Ready tenant nodes whose resources satisfy the request
//! 3. One hypothetical child per host with enough free capacity
//!
//! It then ranks them and, on [`NodePrioritizer::select`], realizes and
//! allocates the best ones. Deciding how many nodes a cluster needs is
//! left to the caller.

use std::collections::HashSet;

use nodealloc_core::{ApplicationId, ClusterMembership, Node, NodeState, NodeType, ResourceProfile};
use nodealloc_repo::LockedNodeList;
use tracing::{debug, info, warn};

use crate::candidate::NodeCandidate;
use crate::error::PlacementResult;
use crate::ranking::rank;
use crate::realize::IpAllocator;

/// Host states that may receive new children.
const CHILD_BEARING_HOST_STATES: [NodeState; 3] =
    [NodeState::Provisioned, NodeState::Ready, NodeState::Active];

/// Node states of the cluster's own nodes that are candidates for reuse.
const REUSABLE_STATES: [NodeState; 3] = [NodeState::Active, NodeState::Inactive, NodeState::Reserved];

/// What a placement pass is asked to satisfy.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub owner: ApplicationId,
    pub cluster_id: String,
    pub resources: ResourceProfile,
}

impl PlacementRequest {
    pub fn new(owner: ApplicationId, cluster_id: &str, resources: ResourceProfile) -> Self {
        Self {
            owner,
            cluster_id: cluster_id.to_string(),
            resources,
        }
    }
}

/// Builds, ranks and selects candidates for one request.
pub struct NodePrioritizer<'a> {
    nodes: &'a LockedNodeList,
    request: PlacementRequest,
    allocator: &'a dyn IpAllocator,
    spare_count: usize,
}

impl<'a> NodePrioritizer<'a> {
    pub fn new(nodes: &'a LockedNodeList, request: PlacementRequest, allocator: &'a dyn IpAllocator) -> Self {
        Self {
            nodes,
            request,
            allocator,
            spare_count: 0,
        }
    }

    /// Number of hosts to hold back as spares.
    pub fn with_spare_count(mut self, spare_count: usize) -> Self {
        self.spare_count = spare_count;
        self
    }

    /// The `spare_count` hosts with the most free capacity.
    pub fn spare_hosts(&self) -> HashSet<&'a str> {
        let nodes: &'a LockedNodeList = self.nodes;
        let free = nodes.free_capacity_by_host();
        let mut hosts: Vec<(&'a Node, ResourceProfile)> = nodes
            .hosts()
            .filter(|h| CHILD_BEARING_HOST_STATES.contains(&h.state))
            .filter_map(|h| free.get(h.hostname.as_str()).map(|f| (h, *f)))
            .collect();
        hosts.sort_by(|(ha, fa), (hb, fb)| fb.total_cmp(fa).then_with(|| ha.hostname.cmp(&hb.hostname)));
        hosts
            .into_iter()
            .take(self.spare_count)
            .map(|(h, _)| h.hostname.as_str())
            .collect()
    }

    fn can_host_tenant(&self, host: &Node) -> bool {
        host.reserved_to
            .as_deref()
            .is_none_or(|tenant| tenant == self.request.owner.tenant)
    }

    /// Every candidate for the request, unranked.
    pub fn candidates(&self) -> PlacementResult<Vec<NodeCandidate<'a>>> {
        let nodes: &'a LockedNodeList = self.nodes;
        let spares = self.spare_hosts();
        let requested = &self.request.resources;
        let mut candidates = Vec::new();
        let mut hosts_in_use: HashSet<&str> = HashSet::new();

        for node in nodes.owned_by(&self.request.owner, &self.request.cluster_id) {
            if let Some(parent) = &node.parent_hostname {
                hosts_in_use.insert(parent.as_str());
            }
            if !REUSABLE_STATES.contains(&node.state) {
                continue;
            }
            let is_surplus = node.want_to_retire
                || node.allocation.as_ref().is_some_and(|a| a.membership.retired);
            candidates.push(self.existing_candidate(node, &spares, is_surplus)?);
        }

        for node in nodes.iter() {
            if node.node_type != NodeType::Tenant
                || node.state != NodeState::Ready
                || node.allocation.is_some()
                || !node.resources().satisfies(requested)
            {
                continue;
            }
            if nodes.parent_of(node).is_some_and(|p| !self.can_host_tenant(p)) {
                continue;
            }
            candidates.push(self.existing_candidate(node, &spares, false)?);
        }

        for host in nodes.hosts() {
            if !CHILD_BEARING_HOST_STATES.contains(&host.state)
                || !self.can_host_tenant(host)
                || hosts_in_use.contains(host.hostname.as_str())
            {
                continue;
            }
            let free = nodes.free_capacity_of(host);
            if !free.satisfies(requested) {
                debug!(host = %host.hostname, free = %free, "host lacks capacity for new child");
                continue;
            }
            let violates_spares = spares.contains(host.hostname.as_str());
            candidates.push(NodeCandidate::new_child(*requested, free, host, violates_spares, self.allocator)?);
        }

        debug!(
            owner = %self.request.owner,
            cluster = %self.request.cluster_id,
            count = candidates.len(),
            "assembled candidates"
        );
        Ok(candidates)
    }

    fn existing_candidate(
        &self,
        node: &'a Node,
        spares: &HashSet<&str>,
        is_surplus: bool,
    ) -> PlacementResult<NodeCandidate<'a>> {
        let nodes: &'a LockedNodeList = self.nodes;
        let requested = &self.request.resources;
        let candidate = match nodes.parent_of(node) {
            Some(parent) => {
                // Free capacity before this node was added to its parent.
                let free = nodes.free_capacity_of(parent).add(node.resources());
                let is_resizable = !node.resources().compatible_with(requested) && free.satisfies(requested);
                NodeCandidate::child(
                    node.clone(),
                    free,
                    parent,
                    spares.contains(parent.hostname.as_str()),
                    is_surplus,
                    false,
                    is_resizable,
                )?
            }
            None => NodeCandidate::standalone(node.clone(), is_surplus, false)?,
        };
        Ok(candidate)
    }

    /// All candidates, best first.
    pub fn prioritize(&self) -> PlacementResult<Vec<NodeCandidate<'a>>> {
        Ok(rank(self.candidates()?)?)
    }

    /// Realizes and allocates the best `count` usable candidates.
    ///
    /// Surplus and unrealizable candidates are skipped. Nodes already in
    /// the cluster keep their membership; new ones get indices after the
    /// highest index in use. Returns fewer nodes than asked for when the
    /// cluster lacks capacity.
    pub fn select(&self, count: usize, at: u64) -> PlacementResult<Vec<Node>> {
        let ranked = self.prioritize()?;
        let mut next_index = self
            .nodes
            .owned_by(&self.request.owner, &self.request.cluster_id)
            .filter_map(|n| n.allocation.as_ref().map(|a| a.membership.index + 1))
            .max()
            .unwrap_or(0);
        let mut selected = Vec::with_capacity(count);

        for candidate in ranked {
            if selected.len() == count {
                break;
            }
            if candidate.is_surplus() {
                debug!(candidate = %candidate, "skipping surplus candidate");
                continue;
            }
            let candidate = candidate.realize();
            if !candidate.is_usable() {
                warn!(candidate = %candidate, "skipping unrealizable candidate");
                continue;
            }

            let membership = match candidate.allocation() {
                Some(a) if a.owner == self.request.owner => a.membership.clone(),
                _ => {
                    let membership = ClusterMembership::new(&self.request.cluster_id, next_index);
                    next_index += 1;
                    membership
                }
            };
            let allocated = candidate.allocate(self.request.owner.clone(), membership, self.request.resources, at);
            let node = allocated.to_node()?;
            info!(
                hostname = %node.hostname,
                parent = node.parent_hostname.as_deref().unwrap_or("-"),
                index = node.allocation.as_ref().map_or(0, |a| a.membership.index),
                "selected node"
            );
            selected.push(node);
        }

        if selected.len() < count {
            warn!(
                owner = %self.request.owner,
                cluster = %self.request.cluster_id,
                requested = count,
                selected = selected.len(),
                "could not select enough nodes, insufficient capacity"
            );
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodealloc_core::Flavor;
    use nodealloc_repo::{IpAllocation, IpAllocationError, NodeRepository, StaticNameResolver};
    use std::sync::Arc;

    /// Hands out `<host>-child` with a fixed address, unless the host has no pool.
    struct PerHost;

    impl IpAllocator for PerHost {
        fn find_allocation(&self, host: &Node) -> Result<Option<IpAllocation>, IpAllocationError> {
            Ok(host.ip_config.pool.first().map(|ip| IpAllocation {
                hostname: format!("{}-child", host.hostname),
                addresses: vec![*ip],
            }))
        }
    }

    fn host(name: &str, vcpu: f64) -> Node {
        Node::new(
            name,
            Flavor::anonymous(ResourceProfile::new(vcpu, 2.0 * vcpu, 10.0 * vcpu)),
            NodeState::Active,
            NodeType::Host,
        )
        .with_ip_pool(vec!["10.0.0.1".parse().unwrap()])
    }

    fn tenant(name: &str, parent: &str, state: NodeState) -> Node {
        Node::new(
            name,
            Flavor::anonymous(ResourceProfile::new(2.0, 4.0, 20.0)),
            state,
            NodeType::Tenant,
        )
        .with_parent(parent)
    }

    fn owner() -> ApplicationId {
        ApplicationId::new("t", "a", "default")
    }

    fn request() -> PlacementRequest {
        PlacementRequest::new(owner(), "content", ResourceProfile::new(2.0, 4.0, 20.0))
    }

    fn snapshot(nodes: Vec<Node>) -> LockedNodeList {
        let repo = NodeRepository::new(nodes, Arc::new(StaticNameResolver::default()));
        let lock = repo.lock().unwrap();
        repo.list(&lock).unwrap()
    }

    #[test]
    fn builds_hypothetical_children_for_hosts_with_capacity() {
        let nodes = snapshot(vec![host("big", 16.0), host("tiny", 1.0)]);
        let prioritizer = NodePrioritizer::new(&nodes, request(), &PerHost);
        let candidates = prioritizer.candidates().unwrap();

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_hypothetical());
        assert_eq!(candidates[0].parent_hostname(), Some("big"));
    }

    #[test]
    fn spare_hosts_are_the_emptiest() {
        let nodes = snapshot(vec![host("h1", 8.0), host("h2", 16.0), host("h3", 4.0)]);
        let prioritizer = NodePrioritizer::new(&nodes, request(), &PerHost).with_spare_count(1);
        let spares = prioritizer.spare_hosts();
        assert_eq!(spares.len(), 1);
        assert!(spares.contains("h2"));

        let ranked = prioritizer.prioritize().unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.last().and_then(|c| c.parent_hostname()), Some("h2"));
        assert!(ranked.last().unwrap().violates_spares());
    }

    #[test]
    fn skips_hosts_reserved_to_other_tenants() {
        let nodes = snapshot(vec![host("mine", 8.0).reserved_to("t"), host("theirs", 8.0).reserved_to("other")]);
        let candidates = NodePrioritizer::new(&nodes, request(), &PerHost).candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].parent_hostname(), Some("mine"));
    }

    #[test]
    fn existing_cluster_nodes_come_first_and_keep_their_index() {
        let existing = tenant("n1", "h1", NodeState::Active).allocate(
            owner(),
            ClusterMembership::new("content", 5),
            ResourceProfile::new(2.0, 4.0, 20.0),
            0,
        );
        let mut active = existing.clone();
        active.state = NodeState::Active;
        let nodes = snapshot(vec![host("h1", 8.0), host("h2", 8.0), active]);
        let prioritizer = NodePrioritizer::new(&nodes, request(), &PerHost);

        let ranked = prioritizer.prioritize().unwrap();
        assert_eq!(ranked[0].hostname(), Some("n1"));
        // h1 already hosts a node of this cluster, so only h2 gets a hypothetical.
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1].parent_hostname(), Some("h2"));

        let selected = prioritizer.select(2, 100).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].hostname, "n1");
        assert_eq!(selected[0].allocation.as_ref().unwrap().membership.index, 5);
        assert_eq!(selected[1].hostname, "h2-child");
        assert_eq!(selected[1].allocation.as_ref().unwrap().membership.index, 6);
        assert_eq!(selected[1].allocation.as_ref().unwrap().allocated_at, 100);
    }

    #[test]
    fn ready_nodes_beat_new_children() {
        let nodes = snapshot(vec![host("h1", 8.0), tenant("ready1", "h1", NodeState::Ready)]);
        let prioritizer = NodePrioritizer::new(&nodes, request(), &PerHost);
        let ranked = prioritizer.prioritize().unwrap();
        assert_eq!(ranked[0].hostname(), Some("ready1"));
        assert!(ranked[1].is_hypothetical());

        let selected = prioritizer.select(1, 0).unwrap();
        assert_eq!(selected[0].hostname, "ready1");
        assert_eq!(selected[0].state, NodeState::Reserved);
        assert_eq!(selected[0].allocation.as_ref().unwrap().membership.index, 0);
    }

    #[test]
    fn parentless_ready_node_ranks_after_children_in_any_snapshot_order() {
        let bare = Node::new(
            "bare",
            Flavor::anonymous(ResourceProfile::new(4.0, 8.0, 40.0)),
            NodeState::Ready,
            NodeType::Tenant,
        );
        let mut all = vec![
            host("h1", 8.0),
            tenant("ready1", "h1", NodeState::Ready),
            bare,
            host("h2", 8.0),
        ];

        let forward = snapshot(all.clone());
        let ranked: Vec<String> = NodePrioritizer::new(&forward, request(), &PerHost)
            .prioritize()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0], "ready1");
        assert_eq!(ranked[1], "bare");

        all.reverse();
        let backward = snapshot(all);
        let reranked: Vec<String> = NodePrioritizer::new(&backward, request(), &PerHost)
            .prioritize()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(ranked, reranked);
    }

    #[test]
    fn select_skips_surplus_and_unrealizable() {
        let retiring = tenant("old", "h1", NodeState::Active)
            .with_want_to_retire(true)
            .with_allocation(nodealloc_core::Allocation {
                owner: owner(),
                membership: ClusterMembership::new("content", 0),
                requested_resources: ResourceProfile::new(2.0, 4.0, 20.0),
                allocated_at: 0,
            });
        let no_pool = host("h2", 8.0).with_ip_pool(vec![]);
        let nodes = snapshot(vec![host("h1", 8.0), no_pool, host("h3", 8.0), retiring]);
        let prioritizer = NodePrioritizer::new(&nodes, request(), &PerHost);

        let selected = prioritizer.select(3, 0).unwrap();
        let names: Vec<_> = selected.iter().map(|n| n.hostname.as_str()).collect();
        assert_eq!(names, vec!["h3-child"]);
        assert_eq!(selected[0].allocation.as_ref().unwrap().membership.index, 1);
    }

    #[test]
    fn resizable_when_parent_has_room() {
        let small = Node::new(
            "n1",
            Flavor::anonymous(ResourceProfile::new(1.0, 2.0, 10.0)),
            NodeState::Active,
            NodeType::Tenant,
        )
        .with_parent("h1")
        .with_allocation(nodealloc_core::Allocation {
            owner: owner(),
            membership: ClusterMembership::new("content", 0),
            requested_resources: ResourceProfile::new(1.0, 2.0, 10.0),
            allocated_at: 0,
        });
        let nodes = snapshot(vec![host("h1", 8.0), small]);
        let candidates = NodePrioritizer::new(&nodes, request(), &PerHost).candidates().unwrap();
        let existing = candidates.iter().find(|c| c.hostname() == Some("n1")).unwrap();
        assert!(existing.is_resizable());
        assert!(!existing.is_new());
    }
}
