//! nodealloc-repo — collaborators of the placement core.
//!
//! - **`repository`** — in-memory node repository, allocation lock and
//!   locked node-list snapshots
//! - **`resolver`** — forward/reverse name resolution for new nodes
//! - **`ip_pool`** — per-host address pools and address allocation

pub mod error;
pub mod ip_pool;
pub mod repository;
pub mod resolver;

pub use error::{IpAllocationError, RepoError, RepoResult};
pub use ip_pool::{IpAllocation, IpPool};
pub use repository::{AllocationLock, LockedNodeList, NodeRepository};
pub use resolver::{NameResolver, StaticNameResolver};
