//! Placement error types.
//!
//! Only invariant violations are errors. A hypothetical candidate that
//! cannot get an address is not an error: it becomes an unrealizable
//! candidate.

use nodealloc_core::NodeState;
use thiserror::Error;

/// Errors raised when building or reading a candidate.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("a new node cannot be resizable: {0}")]
    NewNodeResizable(String),

    #[error("candidate node on {parent} is invalid")]
    Unrealizable { parent: String },
}

pub type CandidateResult<T> = Result<T, CandidateError>;

/// Errors raised by the ranking cascade.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error("nodes {left} and {right} have different states ({left_state} vs {right_state})")]
    InconsistentStates {
        left: String,
        right: String,
        left_state: NodeState,
        right_state: NodeState,
    },
}

pub type RankingResult<T> = Result<T, RankingError>;

/// Errors raised by a placement pass.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("candidate error: {0}")]
    Candidate(#[from] CandidateError),

    #[error("ranking error: {0}")]
    Ranking(#[from] RankingError),
}

pub type PlacementResult<T> = Result<T, PlacementError>;
