pub mod rank;
pub mod select;

use std::sync::Arc;

use anyhow::{Context, anyhow};
use nodealloc_core::{ApplicationId, ClusterConfig, ResourceProfile};
use nodealloc_placement::PlacementRequest;
use nodealloc_repo::{NodeRepository, StaticNameResolver};
use tracing::debug;

use crate::PlacementArgs;

/// Loads the cluster file into a repository backed by its name resolution table.
pub fn load(args: &PlacementArgs) -> anyhow::Result<(ClusterConfig, NodeRepository)> {
    let config = ClusterConfig::from_file(&args.cluster)
        .with_context(|| format!("Failed to load cluster file {}", args.cluster.display()))?;
    let nodes = config.to_nodes()?;
    debug!(count = nodes.len(), path = %args.cluster.display(), "loaded nodes");
    let resolver = StaticNameResolver::parse(&config.name_resolution.hosts);
    Ok((config, NodeRepository::new(nodes, Arc::new(resolver))))
}

pub fn request(args: &PlacementArgs) -> anyhow::Result<PlacementRequest> {
    let owner = ApplicationId::parse(&args.application)
        .ok_or_else(|| anyhow!("Invalid application id '{}', expected tenant:application[:instance]", args.application))?;
    let resources = ResourceProfile::new(args.vcpu, args.memory, args.disk).with_bandwidth(args.bandwidth);
    Ok(PlacementRequest::new(owner, &args.cluster_id, resources))
}
