//! nodealloc-placement — ranks and selects nodes for a cluster.
//!
//! Given a locked snapshot of the node repository and a resource request,
//! this crate builds every candidate that could serve the request, orders
//! them best first and turns the winners into allocated nodes. Writing
//! the result back is left to the caller, which still holds the lock.
//!
//! # Components
//!
//! - **`candidate`** — Existing, hypothetical and unrealizable candidates
//! - **`ranking`** — The preference cascade and [`rank`]
//! - **`realize`** — Address allocation for new children
//! - **`prioritizer`** — Candidate assembly, spare hosts and selection

pub mod candidate;
pub mod error;
pub mod prioritizer;
pub mod ranking;
pub mod realize;

pub use candidate::{CandidateKind, NodeCandidate};
pub use error::{CandidateError, CandidateResult, PlacementError, PlacementResult, RankingError, RankingResult};
pub use prioritizer::{NodePrioritizer, PlacementRequest};
pub use ranking::rank;
pub use realize::{IpAllocator, PoolAllocator};
