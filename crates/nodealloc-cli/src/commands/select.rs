use std::time::{SystemTime, UNIX_EPOCH};

use nodealloc_placement::{NodePrioritizer, PoolAllocator};
use tracing::info;

use crate::PlacementArgs;

pub fn select(args: &PlacementArgs, count: usize) -> anyhow::Result<()> {
    let (config, repo) = super::load(args)?;
    let request = super::request(args)?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let lock = repo.lock()?;
    let nodes = repo.list(&lock)?;
    let allocator = PoolAllocator::new(&nodes, repo.name_resolver());
    let selected = NodePrioritizer::new(&nodes, request, &allocator)
        .with_spare_count(config.placement.spare_count)
        .select(count, now)?;
    repo.write(selected.clone(), &lock)?;
    drop(lock);
    info!(selected = selected.len(), requested = count, "selection written");

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&selected)?),
        _ => {
            for node in &selected {
                let index = node.allocation.as_ref().map_or(0, |a| a.membership.index);
                println!(
                    "{} on {} index {} {}",
                    node,
                    node.parent_hostname.as_deref().unwrap_or("-"),
                    index,
                    node.resources(),
                );
            }
            if selected.len() < count {
                println!("✗ Only {} of {} nodes could be placed", selected.len(), count);
            }
        }
    }
    Ok(())
}
