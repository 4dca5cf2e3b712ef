use nodealloc_core::{NodeState, ResourceProfile};
use nodealloc_placement::{CandidateKind, NodeCandidate, NodePrioritizer, PoolAllocator};
use serde::Serialize;

use crate::PlacementArgs;

/// One ranked candidate, as printed.
#[derive(Debug, Serialize)]
pub struct CandidateRow {
    pub rank: usize,
    pub kind: &'static str,
    pub hostname: Option<String>,
    pub parent: Option<String>,
    pub state: NodeState,
    pub resources: ResourceProfile,
    pub violates_spares: bool,
    pub surplus: bool,
    pub new: bool,
    pub resizable: bool,
    pub cost: i64,
    pub skew_delta: f64,
    /// Rule that ranked this candidate below the previous one.
    pub decided_by: Option<&'static str>,
}

impl CandidateRow {
    pub fn of(rank: usize, candidate: &NodeCandidate<'_>, previous: Option<&NodeCandidate<'_>>) -> Self {
        let kind = match candidate.kind() {
            CandidateKind::Existing { .. } => "existing",
            CandidateKind::Hypothetical { .. } => "hypothetical",
            CandidateKind::Unrealizable { .. } => "unrealizable",
        };
        Self {
            rank,
            kind,
            hostname: candidate.hostname().map(str::to_string),
            parent: candidate.parent_hostname().map(str::to_string),
            state: candidate.state(),
            resources: *candidate.resources(),
            violates_spares: candidate.violates_spares(),
            surplus: candidate.is_surplus(),
            new: candidate.is_new(),
            resizable: candidate.is_resizable(),
            cost: candidate.cost(),
            skew_delta: candidate.skew_with_this() - candidate.skew_without_this(),
            decided_by: previous.and_then(|p| p.deciding_rule(candidate)),
        }
    }
}

pub fn rank(args: &PlacementArgs) -> anyhow::Result<()> {
    let (config, repo) = super::load(args)?;
    let request = super::request(args)?;

    let lock = repo.lock()?;
    let nodes = repo.list(&lock)?;
    let allocator = PoolAllocator::new(&nodes, repo.name_resolver());
    let ranked = NodePrioritizer::new(&nodes, request, &allocator)
        .with_spare_count(config.placement.spare_count)
        .prioritize()?;

    let rows: Vec<CandidateRow> = ranked
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateRow::of(i + 1, c, i.checked_sub(1).map(|p| &ranked[p])))
        .collect();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("No candidates.");
            }
            for (row, candidate) in rows.iter().zip(&ranked) {
                let mut flags = Vec::new();
                if row.violates_spares {
                    flags.push("spare");
                }
                if row.surplus {
                    flags.push("surplus");
                }
                if row.resizable {
                    flags.push("resizable");
                }
                println!(
                    "{:>3}. {:<13} {} [{}] skew {:+.4}{}{}",
                    row.rank,
                    row.kind,
                    candidate,
                    row.state,
                    row.skew_delta,
                    if flags.is_empty() { String::new() } else { format!(" ({})", flags.join(", ")) },
                    row.decided_by.map(|rule| format!(" <- {rule}")).unwrap_or_default(),
                );
            }
        }
    }
    Ok(())
}
