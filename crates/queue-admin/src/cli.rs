//! CLI argument parsing for the queue admin tool.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Index Queue administration
///
/// Inspects and maintains the queue store of an index queue deployment.
#[derive(Parser, Debug)]
#[command(name = "queue-admin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/index-queue/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Admin commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show pending/failed/success counts of a site
    Stats {
        /// Root page id of the site
        #[arg(short, long)]
        site: u64,

        /// Restrict to one indexing configuration
        #[arg(long)]
        configuration: Option<String>,
    },

    /// List failed items of a site
    Errors {
        #[arg(short, long)]
        site: u64,

        /// Print items as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear recorded errors so items become due again
    ResetErrors {
        /// Only reset this site (default: all sites)
        #[arg(short, long)]
        site: Option<u64>,
    },

    /// Preview the next due batch of a site without changing anything
    List {
        #[arg(short, long)]
        site: u64,

        /// Maximum items
        #[arg(long, default_value = "50")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Count all queue items
    Count,

    /// Show when a site was last indexed
    LastIndexed {
        #[arg(short, long)]
        site: u64,
    },

    /// Delete the items of a site
    DeleteSite {
        #[arg(short, long)]
        site: u64,

        /// Only delete items of this indexing configuration
        #[arg(long)]
        configuration: Option<String>,
    },

    /// Delete all items of a content type across sites
    DeleteType {
        #[arg(long)]
        item_type: String,
    },

    /// Delete every queue item
    DeleteAll,

    /// Trigger storage compaction
    Compact,
}
