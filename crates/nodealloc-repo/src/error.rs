//! Error types for the node repository and IP allocation.

use std::net::IpAddr;

use thiserror::Error;

/// Result type alias for node repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors raised by the node repository.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("allocation lock poisoned")]
    LockPoisoned,
}

/// Errors raised while finding an address for a new child node.
#[derive(Debug, Error)]
pub enum IpAllocationError {
    #[error("could not resolve hostname of {0}")]
    Unresolvable(IpAddr),

    #[error("name resolution failed: {0}")]
    Resolver(String),

    #[error("{hostname} resolves to {address}, which is not an unused address in the pool")]
    AddressNotInPool { hostname: String, address: IpAddr },

    #[error("{hostname} resolves to multiple IPv4 addresses: {addresses:?}")]
    MultipleIpv4 { hostname: String, addresses: Vec<IpAddr> },
}
