//! Command implementations for the queue admin tool.
//!
//! Commands operate directly on the queue store; no content database is
//! needed. Output goes to the given writer, logs go to stderr.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use tracing::info;

use queue_storage::{QueueItemStore, Storage};
use queue_types::{QueueItem, Settings};

use crate::cli::{Cli, Commands};

/// Load configuration, open storage and run the parsed command.
pub fn run(cli: Cli) -> Result<()> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(db_path) = cli.db_path {
        settings.db_path = db_path;
    }
    if let Some(log_level) = cli.log_level {
        settings.log_level = log_level;
    }

    init_logging(&settings.log_level)?;

    let db_path = settings.expanded_db_path();
    info!("Opening storage at {:?}", db_path);
    let storage = Storage::open(&db_path).context("Failed to open storage")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&storage, &settings, &cli.command, &mut out)
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Run one command against an open store.
pub fn execute(
    storage: &Storage,
    settings: &Settings,
    command: &Commands,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::Stats {
            site,
            configuration,
        } => {
            let stats = storage.statistics(*site, configuration.as_deref())?;
            writeln!(out, "Site: {}", site_label(settings, *site))?;
            if let Some(name) = configuration {
                writeln!(out, "Configuration: {}", name)?;
            }
            writeln!(
                out,
                "  Pending: {} ({:.2}%)",
                stats.pending_count,
                stats.pending_percentage()
            )?;
            writeln!(
                out,
                "  Failed:  {} ({:.2}%)",
                stats.failed_count,
                stats.failed_percentage()
            )?;
            writeln!(
                out,
                "  Success: {} ({:.2}%)",
                stats.success_count,
                stats.success_percentage()
            )?;
            writeln!(out, "  Total:   {}", stats.total_count())?;
        }

        Commands::Errors { site, json } => {
            let items = storage.find_errors_by_root(*site)?;
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
            } else if items.is_empty() {
                writeln!(out, "No failed items for site {}", site_label(settings, *site))?;
            } else {
                for item in &items {
                    writeln!(out, "{}", describe(item))?;
                    writeln!(out, "    error: {}", item.errors)?;
                }
            }
        }

        Commands::ResetErrors { site } => {
            let cleared = match site {
                Some(root) => storage.flush_errors_by_root(*root)?,
                None => storage.flush_all_errors()?,
            };
            info!(cleared, "Errors reset");
            writeln!(out, "Cleared errors on {} item(s)", cleared)?;
        }

        Commands::List { site, limit, json } => {
            let now = Utc::now().timestamp();
            let items = storage.find_items_to_index(*site, now, *limit)?;
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&items)?)?;
            } else if items.is_empty() {
                writeln!(out, "No due items for site {}", site_label(settings, *site))?;
            } else {
                for item in &items {
                    writeln!(out, "{}", describe(item))?;
                }
            }
        }

        Commands::Count => {
            writeln!(out, "{}", storage.count_all()?)?;
        }

        Commands::LastIndexed { site } => match storage.find_last_indexed(*site)? {
            Some(item) => {
                writeln!(out, "Last indexed: {}", format_time(item.indexed))?;
                writeln!(out, "Item: {}", describe(&item))?;
            }
            None => writeln!(out, "Site {} was never indexed", site_label(settings, *site))?,
        },

        Commands::DeleteSite {
            site,
            configuration,
        } => {
            let deleted = storage.delete_items_by_root(*site, configuration.as_deref())?;
            writeln!(out, "Deleted {} item(s)", deleted)?;
        }

        Commands::DeleteType { item_type } => {
            let deleted = storage.delete_items_by_type(item_type)?;
            writeln!(out, "Deleted {} item(s)", deleted)?;
        }

        Commands::DeleteAll => {
            let deleted = storage.delete_all_items()?;
            writeln!(out, "Deleted {} item(s)", deleted)?;
        }

        Commands::Compact => {
            storage.compact()?;
            let stats = storage.get_stats()?;
            writeln!(
                out,
                "Compaction complete: {} item(s), {} bytes on disk",
                stats.item_count, stats.disk_usage_bytes
            )?;
        }
    }
    Ok(())
}

fn site_label(settings: &Settings, root: u64) -> String {
    match settings.site(root) {
        Some(site) => format!("{} ({})", site.label, root),
        None => root.to_string(),
    }
}

fn format_time(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

fn describe(item: &QueueItem) -> String {
    format!(
        "#{} {}:{} [{}] changed {} status {}",
        item.id,
        item.item_type,
        item.item_uid,
        item.indexing_configuration,
        format_time(item.changed),
        item.status()
    )
}
