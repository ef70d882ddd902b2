//! Configuration loading for the index queue.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/index-queue/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::QueueError;
use crate::site::Site;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of items handed out per indexing batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sites served by this queue
    #[serde(default)]
    pub sites: Vec<Site>,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "index-queue")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_size() -> usize {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            batch_size: default_batch_size(),
            sites: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/index-queue/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (INDEX_QUEUE_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, QueueError> {
        let config_dir = ProjectDirs::from("", "", "index-queue")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| QueueError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| QueueError::Config(e.to_string()))?
            .set_default("batch_size", default_batch_size() as i64)
            .map_err(|e| QueueError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // INDEX_QUEUE_DB_PATH, INDEX_QUEUE_BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("INDEX_QUEUE")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| QueueError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| QueueError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the queue cannot operate with.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.batch_size == 0 {
            return Err(QueueError::Config("batch_size must be > 0".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for site in &self.sites {
            if site.root_page_id == 0 {
                return Err(QueueError::Config(format!(
                    "site '{}' has invalid root_page_id 0",
                    site.label
                )));
            }
            if !seen.insert(site.root_page_id) {
                return Err(QueueError::Config(format!(
                    "duplicate site root_page_id {}",
                    site.root_page_id
                )));
            }
        }
        Ok(())
    }

    /// Site with the given root page id.
    pub fn site(&self, root_page_id: u64) -> Option<&Site> {
        self.sites.iter().find(|s| s.root_page_id == root_page_id)
    }

    /// Expand ~ in db_path to actual home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{IndexingConfiguration, SiteConfiguration};

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.log_level, "info");
        assert!(settings.sites.is_empty());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(settings.batch_size > 0);
    }

    #[test]
    fn test_load_sites_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("queue.toml");
        std::fs::write(
            &path,
            r#"
batch_size = 20

[[sites]]
root_page_id = 1
label = "Main"

[sites.configuration.index_queue.pages]
enabled = true

[sites.configuration.index_queue.news]
table = "tx_news"
allowed_page_types = [1]
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.batch_size, 20);
        let site = settings.site(1).unwrap();
        assert_eq!(site.label, "Main");
        assert_eq!(
            site.configuration.enabled_configuration_names(),
            vec!["news", "pages"]
        );
        assert_eq!(site.configuration.table_name_or_fallback("news"), "tx_news");
    }

    #[test]
    fn test_validate_rejects_duplicate_roots() {
        let site = Site::new(3, "a").with_configuration(
            SiteConfiguration::new().with_configuration("pages", IndexingConfiguration::default()),
        );
        let settings = Settings {
            sites: vec![site.clone(), site],
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let settings = Settings {
            batch_size: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_expanded_db_path_plain() {
        let settings = Settings {
            db_path: "/var/lib/index-queue".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.expanded_db_path(),
            PathBuf::from("/var/lib/index-queue")
        );
    }
}
