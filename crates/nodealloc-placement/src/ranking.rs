//! Candidate ranking.
//!
//! Candidates are ordered best-first by a cascade of tie-breakers. Each
//! rule is an independent function returning `Less` when the left
//! candidate is preferred, `Greater` when the right one is, and `Equal`
//! to defer to the next rule. In order:
//!
//! 0. usable candidates before unrealizable ones
//! 1. not violating spare capacity
//! 2. `active` nodes
//! 3. not surplus
//! 4. already in the repository as `reserved`
//! 5. `inactive` nodes
//! 6. `ready` nodes
//! 7. (both states must now be equal, anything else is an error)
//! 8. a candidate with a parent host before one without; when both have
//!    one: host reserved to a tenant, faster disk, local storage, host at
//!    least twice the size of the node
//! 9. largest skew reduction on the parent
//! 10. cheapest flavor
//! 11. parent host state (`active` before `ready` before `provisioned`
//!     before any other state, with no parent last)
//! 12. allocated before unallocated, then lowest cluster membership index
//! 13. deterministic tie-break on identity
//!
//! Rules only read fields computed at construction. Ranking never
//! triggers realization.

use std::cmp::Ordering;

use nodealloc_core::{DiskSpeed, Node, NodeState, StorageType};

use crate::candidate::{CandidateKind, NodeCandidate};
use crate::error::{RankingError, RankingResult};

type Rule = fn(&NodeCandidate<'_>, &NodeCandidate<'_>) -> Ordering;

/// Rules that must separate candidates in different states.
const STATE_RULES: [(&str, Rule); 7] = [
    ("usable", usable_first),
    ("spares", non_spare_violating_first),
    ("active", active_first),
    ("surplus", non_surplus_first),
    ("reserved_in_repo", reserved_in_repo_first),
    ("inactive", inactive_first),
    ("ready", ready_first),
];

/// Rules applied to candidates in the same state.
const PREFERENCE_RULES: [(&str, Rule); 10] = [
    ("has_parent", parented_first),
    ("reserved_host", reserved_host_first),
    ("disk_speed", faster_disk_first),
    ("storage_type", preferred_storage_first),
    ("half_host", less_than_half_the_host_first),
    ("skew", largest_skew_reduction_first),
    ("cost", cheapest_first),
    ("host_state", host_state_first),
    ("membership_index", lowest_index_first),
    ("identity", by_identity),
];

/// Host states ordered by ascending preference.
const HOST_STATE_PRIORITY: [NodeState; 3] = [NodeState::Provisioned, NodeState::Ready, NodeState::Active];

/// `Less` if only `a` has the property, `Greater` if only `b` has it.
fn prefer(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

fn in_state(c: &NodeCandidate<'_>, state: NodeState) -> bool {
    c.state() == state
}

fn usable_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(a.is_usable(), b.is_usable())
}

fn non_spare_violating_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(!a.violates_spares(), !b.violates_spares())
}

fn active_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(in_state(a, NodeState::Active), in_state(b, NodeState::Active))
}

fn non_surplus_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(!a.is_surplus(), !b.is_surplus())
}

fn reserved_in_repo_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(a.is_in_repo_and_reserved(), b.is_in_repo_and_reserved())
}

fn inactive_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(in_state(a, NodeState::Inactive), in_state(b, NodeState::Inactive))
}

fn ready_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(in_state(a, NodeState::Ready), in_state(b, NodeState::Ready))
}

fn parented_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    prefer(a.parent().is_some(), b.parent().is_some())
}

/// Applies `f` to both parents. Only called once [`parented_first`] has
/// found them equal, so `Equal` here means neither has a parent.
fn with_parents(
    a: &NodeCandidate<'_>,
    b: &NodeCandidate<'_>,
    f: impl FnOnce(&Node, &Node) -> Ordering,
) -> Ordering {
    match (a.parent(), b.parent()) {
        (Some(pa), Some(pb)) => f(pa, pb),
        _ => Ordering::Equal,
    }
}

fn reserved_host_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    with_parents(a, b, |pa, pb| prefer(pa.reserved_to.is_some(), pb.reserved_to.is_some()))
}

fn faster_disk_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    with_parents(a, b, |pa, pb| {
        DiskSpeed::compare(pa.resources().disk_speed, pb.resources().disk_speed)
    })
}

fn preferred_storage_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    with_parents(a, b, |pa, pb| {
        StorageType::compare(pa.resources().storage_type, pb.resources().storage_type)
    })
}

/// True if the parent is at least twice the candidate's size in vcpu,
/// memory and disk. Utilization is more even when no single node
/// dominates its host.
fn less_than_half_the_host(c: &NodeCandidate<'_>, host: &Node) -> bool {
    let n = c.resources();
    let h = host.resources();
    h.vcpu >= n.vcpu * 2.0 && h.memory_gb >= n.memory_gb * 2.0 && h.disk_gb >= n.disk_gb * 2.0
}

fn less_than_half_the_host_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    with_parents(a, b, |pa, pb| {
        prefer(less_than_half_the_host(a, pa), less_than_half_the_host(b, pb))
    })
}

fn largest_skew_reduction_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    let da = a.skew_with_this() - a.skew_without_this();
    let db = b.skew_with_this() - b.skew_without_this();
    da.total_cmp(&db)
}

fn cheapest_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    a.cost().cmp(&b.cost())
}

/// Index into [`HOST_STATE_PRIORITY`]; -1 for other states, -2 without a parent.
fn host_state_priority(c: &NodeCandidate<'_>) -> i32 {
    match c.parent() {
        Some(host) => HOST_STATE_PRIORITY
            .iter()
            .position(|s| *s == host.state)
            .map_or(-1, |i| i as i32),
        None => -2,
    }
}

fn host_state_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    host_state_priority(b).cmp(&host_state_priority(a))
}

fn lowest_index_first(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    match (a.allocation(), b.allocation()) {
        (Some(x), Some(y)) => x.membership.index.cmp(&y.membership.index),
        (x, y) => prefer(x.is_some(), y.is_some()),
    }
}

fn kind_order(c: &NodeCandidate<'_>) -> u8 {
    match c.kind() {
        CandidateKind::Existing { .. } => 0,
        CandidateKind::Hypothetical { .. } => 1,
        CandidateKind::Unrealizable { .. } => 2,
    }
}

fn by_identity(a: &NodeCandidate<'_>, b: &NodeCandidate<'_>) -> Ordering {
    kind_order(a).cmp(&kind_order(b)).then_with(|| match (a.kind(), b.kind()) {
        (CandidateKind::Existing { node: x, .. }, CandidateKind::Existing { node: y, .. }) => {
            x.hostname.cmp(&y.hostname)
        }
        _ => a
            .parent_hostname()
            .cmp(&b.parent_hostname())
            .then_with(|| a.resources().total_cmp(b.resources())),
    })
}

impl NodeCandidate<'_> {
    /// Compares two candidates; `Less` means `self` is preferred.
    ///
    /// Fails if the state rules leave two candidates in different states,
    /// which means candidates that should have been filtered out earlier
    /// reached ranking.
    pub fn try_compare(&self, other: &NodeCandidate<'_>) -> RankingResult<Ordering> {
        for (_, rule) in STATE_RULES {
            let ordering = rule(self, other);
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }

        if self.state() != other.state() {
            return Err(RankingError::InconsistentStates {
                left: self.to_string(),
                right: other.to_string(),
                left_state: self.state(),
                right_state: other.state(),
            });
        }

        for (_, rule) in PREFERENCE_RULES {
            let ordering = rule(self, other);
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    /// Name of the first rule that separates `self` from `other`, for diagnostics.
    pub fn deciding_rule(&self, other: &NodeCandidate<'_>) -> Option<&'static str> {
        STATE_RULES
            .iter()
            .chain(PREFERENCE_RULES.iter())
            .find(|(_, rule)| rule(self, other) != Ordering::Equal)
            .map(|(name, _)| *name)
    }
}

/// Sorts candidates best-first.
///
/// Returns the first inconsistency the comparator reports instead of a
/// partially sorted list.
pub fn rank<'a>(mut candidates: Vec<NodeCandidate<'a>>) -> RankingResult<Vec<NodeCandidate<'a>>> {
    let mut failure = None;
    candidates.sort_by(|a, b| match a.try_compare(b) {
        Ok(ordering) => ordering,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(candidates),
    }
}
