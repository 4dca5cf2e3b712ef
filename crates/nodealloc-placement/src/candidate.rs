//! Placement candidates.
//!
//! A [`NodeCandidate`] is one option for satisfying a resource request:
//!
//! - **Existing** — a node already in the repository
//! - **Hypothetical** — a child that could be created on a host with spare
//!   capacity; it has no address or hostname until realized
//! - **Unrealizable** — a hypothetical whose realization failed; it stays
//!   in the candidate set as data but can never be used
//!
//! Candidates are immutable. [`NodeCandidate::allocate`] and
//! [`NodeCandidate::realize`] return new values. Parents are borrowed from
//! the locked node list the candidates were built from.

use std::fmt;

use nodealloc_core::{
    skew, Allocation, ApplicationId, ClusterMembership, Flavor, Node, NodeState, NodeType,
    ResourceProfile,
};

use crate::error::{CandidateError, CandidateResult};
use crate::realize::IpAllocator;

/// The three shapes a candidate can take.
#[derive(Clone)]
pub enum CandidateKind<'a> {
    Existing {
        node: Node,
        parent: Option<&'a Node>,
    },
    Hypothetical {
        resources: ResourceProfile,
        parent: &'a Node,
        allocator: &'a dyn IpAllocator,
    },
    Unrealizable {
        resources: ResourceProfile,
        parent: &'a Node,
    },
}

impl fmt::Debug for CandidateKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Existing { node, parent } => f
                .debug_struct("Existing")
                .field("node", &node.hostname)
                .field("parent", &parent.map(|p| &p.hostname))
                .finish(),
            CandidateKind::Hypothetical { resources, parent, .. } => f
                .debug_struct("Hypothetical")
                .field("resources", resources)
                .field("parent", &parent.hostname)
                .finish(),
            CandidateKind::Unrealizable { resources, parent } => f
                .debug_struct("Unrealizable")
                .field("resources", resources)
                .field("parent", &parent.hostname)
                .finish(),
        }
    }
}

/// A placement option with the facts needed to rank it.
#[derive(Debug, Clone)]
pub struct NodeCandidate<'a> {
    pub(crate) kind: CandidateKind<'a>,
    /// Free capacity on the parent before this candidate is added to it.
    free_parent_capacity: ResourceProfile,
    /// Placing this candidate consumes capacity held back as a spare.
    violates_spares: bool,
    /// Belongs to a group not needed after the current deployment.
    is_surplus: bool,
    /// No node exists in the repository for this candidate yet.
    is_new: bool,
    /// An existing node that can be resized in place to the request.
    is_resizable: bool,
}

impl<'a> NodeCandidate<'a> {
    fn build(
        kind: CandidateKind<'a>,
        free_parent_capacity: ResourceProfile,
        violates_spares: bool,
        is_surplus: bool,
        is_new: bool,
        is_resizable: bool,
    ) -> CandidateResult<Self> {
        let candidate = Self {
            kind,
            free_parent_capacity,
            violates_spares,
            is_surplus,
            is_new,
            is_resizable,
        };
        if is_resizable && is_new {
            return Err(CandidateError::NewNodeResizable(candidate.to_string()));
        }
        Ok(candidate)
    }

    /// An existing node running on `parent`.
    pub fn child(
        node: Node,
        free_parent_capacity: ResourceProfile,
        parent: &'a Node,
        violates_spares: bool,
        is_surplus: bool,
        is_new: bool,
        is_resizable: bool,
    ) -> CandidateResult<Self> {
        Self::build(
            CandidateKind::Existing {
                node,
                parent: Some(parent),
            },
            free_parent_capacity,
            violates_spares,
            is_surplus,
            is_new,
            is_resizable,
        )
    }

    /// A child that could be created on `parent`, realized through `allocator`.
    pub fn new_child(
        resources: ResourceProfile,
        free_parent_capacity: ResourceProfile,
        parent: &'a Node,
        violates_spares: bool,
        allocator: &'a dyn IpAllocator,
    ) -> CandidateResult<Self> {
        Self::build(
            CandidateKind::Hypothetical {
                resources,
                parent,
                allocator,
            },
            free_parent_capacity,
            violates_spares,
            false,
            true,
            false,
        )
    }

    /// A new node that gets `parent` to itself.
    pub fn new_exclusive_child(node: Node, parent: &'a Node) -> CandidateResult<Self> {
        let free = *node.resources();
        Self::build(
            CandidateKind::Existing {
                node,
                parent: Some(parent),
            },
            free,
            false,
            false,
            true,
            false,
        )
    }

    /// A node without a parent host.
    pub fn standalone(node: Node, is_surplus: bool, is_new: bool) -> CandidateResult<Self> {
        let free = *node.resources();
        Self::build(
            CandidateKind::Existing { node, parent: None },
            free,
            false,
            is_surplus,
            is_new,
            false,
        )
    }

    pub(crate) fn unrealizable(
        resources: ResourceProfile,
        free_parent_capacity: ResourceProfile,
        parent: &'a Node,
    ) -> Self {
        Self {
            kind: CandidateKind::Unrealizable { resources, parent },
            free_parent_capacity,
            violates_spares: false,
            is_surplus: false,
            is_new: true,
            is_resizable: false,
        }
    }

    /// Returns a copy of this candidate backed by `node`, keeping every flag.
    pub fn with_node(&self, node: Node) -> Self {
        Self {
            kind: CandidateKind::Existing {
                node,
                parent: self.parent(),
            },
            ..self.clone()
        }
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn kind(&self) -> &CandidateKind<'a> {
        &self.kind
    }

    pub fn resources(&self) -> &ResourceProfile {
        match &self.kind {
            CandidateKind::Existing { node, .. } => node.resources(),
            CandidateKind::Hypothetical { resources, .. }
            | CandidateKind::Unrealizable { resources, .. } => resources,
        }
    }

    pub fn parent(&self) -> Option<&'a Node> {
        match &self.kind {
            CandidateKind::Existing { parent, .. } => *parent,
            CandidateKind::Hypothetical { parent, .. } | CandidateKind::Unrealizable { parent, .. } => {
                Some(*parent)
            }
        }
    }

    pub fn parent_hostname(&self) -> Option<&str> {
        match &self.kind {
            CandidateKind::Existing { node, .. } => node.parent_hostname.as_deref(),
            CandidateKind::Hypothetical { parent, .. } | CandidateKind::Unrealizable { parent, .. } => {
                Some(parent.hostname.as_str())
            }
        }
    }

    /// Hostname of the backing node. Only existing candidates have one.
    pub fn hostname(&self) -> Option<&str> {
        self.node().map(|n| n.hostname.as_str())
    }

    /// Hypothetical candidates would be created reserved.
    pub fn state(&self) -> NodeState {
        match &self.kind {
            CandidateKind::Existing { node, .. } => node.state,
            _ => NodeState::Reserved,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            CandidateKind::Existing { node, .. } => node.node_type,
            _ => NodeType::Tenant,
        }
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        self.node().and_then(|n| n.allocation.as_ref())
    }

    pub fn wants_retirement(&self) -> bool {
        self.node().is_some_and(|n| n.want_to_retire)
    }

    pub fn flavor(&self) -> Flavor {
        match &self.kind {
            CandidateKind::Existing { node, .. } => node.flavor.clone(),
            _ => Flavor::anonymous(*self.resources()),
        }
    }

    pub fn cost(&self) -> i64 {
        match &self.kind {
            CandidateKind::Existing { node, .. } => node.flavor.cost,
            _ => 0,
        }
    }

    pub fn free_parent_capacity(&self) -> &ResourceProfile {
        &self.free_parent_capacity
    }

    pub fn violates_spares(&self) -> bool {
        self.violates_spares
    }

    pub fn is_surplus(&self) -> bool {
        self.is_surplus
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_resizable(&self) -> bool {
        self.is_resizable
    }

    /// Whether this candidate can, as far as we know, run the workload.
    pub fn is_usable(&self) -> bool {
        !matches!(self.kind, CandidateKind::Unrealizable { .. })
    }

    pub fn is_hypothetical(&self) -> bool {
        matches!(self.kind, CandidateKind::Hypothetical { .. })
    }

    /// Existing in the repository in state `reserved`, from an earlier allocation attempt.
    pub fn is_in_repo_and_reserved(&self) -> bool {
        !self.is_new && self.state() == NodeState::Reserved
    }

    /// The backing node, without triggering realization.
    pub fn node(&self) -> Option<&Node> {
        match &self.kind {
            CandidateKind::Existing { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Returns the node of this candidate, realizing it first if hypothetical.
    ///
    /// Fails for unrealizable candidates: callers must check [`Self::is_usable`].
    pub fn to_node(&self) -> CandidateResult<Node> {
        match &self.kind {
            CandidateKind::Existing { node, .. } => Ok(node.clone()),
            CandidateKind::Hypothetical { .. } => self.realize().to_node(),
            CandidateKind::Unrealizable { parent, .. } => Err(CandidateError::Unrealizable {
                parent: parent.hostname.clone(),
            }),
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Returns a candidate bound to `owner`. Hypothetical candidates are
    /// realized first; unrealizable ones are returned unchanged.
    pub fn allocate(
        &self,
        owner: ApplicationId,
        membership: ClusterMembership,
        requested_resources: ResourceProfile,
        at: u64,
    ) -> Self {
        match &self.kind {
            CandidateKind::Existing { node, .. } => {
                self.with_node(node.allocate(owner, membership, requested_resources, at))
            }
            CandidateKind::Hypothetical { .. } => {
                self.realize().allocate(owner, membership, requested_resources, at)
            }
            CandidateKind::Unrealizable { .. } => self.clone(),
        }
    }

    // ── Skew ─────────────────────────────────────────────────────

    /// Skew of the parent before this candidate is added to it.
    pub fn skew_without_this(&self) -> f64 {
        self.skew_with(&ResourceProfile::ZERO)
    }

    /// Skew of the parent after this candidate is added to it.
    pub fn skew_with_this(&self) -> f64 {
        self.skew_with(self.resources())
    }

    fn skew_with(&self, resources: &ResourceProfile) -> f64 {
        let Some(parent) = self.parent() else {
            return 0.0;
        };
        let free = self
            .free_parent_capacity
            .just_numbers()
            .subtract(&resources.just_numbers());
        skew(parent.resources(), &free)
    }
}

impl fmt::Display for NodeCandidate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CandidateKind::Existing { node, .. } => f.write_str(&node.id),
            CandidateKind::Hypothetical { resources, parent, .. } => {
                write!(f, "candidate node with {resources} on {}", parent.hostname)
            }
            CandidateKind::Unrealizable { resources, parent } => {
                write!(f, "invalid candidate node with {resources} on {}", parent.hostname)
            }
        }
    }
}
