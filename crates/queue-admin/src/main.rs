//! Index Queue admin tool
//!
//! Inspects and maintains the queue store used by the indexing workers.
//!
//! # Usage
//!
//! ```bash
//! queue-admin stats --site 1
//! queue-admin errors --site 1
//! queue-admin reset-errors [--site 1]
//! queue-admin list --site 1 --limit 20
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/index-queue/config.toml)
//! 3. Environment variables (INDEX_QUEUE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use queue_admin::{run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}
