//! CLI surface: one subcommand per `control::DomainWatch` method, built
//! with `clap`'s derive API (plus the `env` feature for config overrides).

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "domainwatch", about = "Domain marketplace crawler and snapshot analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new harvest in the background.
    Harvest {
        /// Name for the resulting snapshot.
        name: String,
    },
    /// Print the current harvest status.
    Status,
    /// Request the running harvest to stop.
    Stop,
    /// List all snapshots, newest first.
    List,
    /// Delete a snapshot by id.
    Delete {
        snapshot_id: i64,
    },
    /// Browse one snapshot's listings.
    Browse {
        snapshot_id: i64,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "contains")]
        search_mode: String,
        #[arg(long)]
        min_price: Option<String>,
        #[arg(long)]
        max_price: Option<String>,
        #[arg(long)]
        min_length: Option<i32>,
        #[arg(long)]
        max_length: Option<i32>,
        #[arg(long, default_value = "domain")]
        sort: String,
        #[arg(long, default_value = "asc")]
        direction: String,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Diff two snapshots.
    Diff {
        snapshot_a: i64,
        snapshot_b: i64,
        #[arg(long, default_value = "all")]
        diff_type: String,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Show a domain's price history across all snapshots.
    History {
        domain_id: i64,
    },
}
