//! nodealloc — rank and select nodes for a cluster.
//!
//! # Usage
//!
//! ```text
//! nodealloc rank --cluster cluster.toml --vcpu 2 --memory 4 --disk 10
//! nodealloc select --cluster cluster.toml --vcpu 2 --memory 4 --disk 10 --count 3
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "nodealloc",
    about = "Node placement for multi-tenant clusters",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every candidate for a request, best first
    Rank {
        #[command(flatten)]
        placement: PlacementArgs,
    },
    /// Allocate the best candidates for a request and print the nodes
    Select {
        #[command(flatten)]
        placement: PlacementArgs,
        /// Number of nodes to allocate
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
}

/// What to place and where.
#[derive(Args, Debug, Clone)]
pub struct PlacementArgs {
    /// Cluster file (TOML)
    #[arg(short, long)]
    pub cluster: PathBuf,
    /// Owner as tenant:application[:instance]
    #[arg(short, long, default_value = "default:default")]
    pub application: String,
    /// Cluster id within the application
    #[arg(long, default_value = "default")]
    pub cluster_id: String,
    #[arg(long)]
    pub vcpu: f64,
    /// Memory in Gb
    #[arg(long)]
    pub memory: f64,
    /// Disk in Gb
    #[arg(long)]
    pub disk: f64,
    /// Bandwidth in Gbps
    #[arg(long, default_value = "0")]
    pub bandwidth: f64,
    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("nodealloc=info".parse()?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Rank { placement } => commands::rank::rank(&placement),
        Commands::Select { placement, count } => commands::select::select(&placement, count),
    }
}
