//! Re-index task.
//!
//! A scheduled job that rebuilds selected indexing configurations of one
//! site, which makes the worker re-index everything they cover.

use tracing::info;

use queue_types::Site;

use crate::error::EngineError;
use crate::queue::Queue;

const INVALID_SITE_MESSAGE: &str =
    "Invalid site configuration for scheduler please re-create the task!";

/// Re-initializes indexing configurations of a site.
#[derive(Debug, Clone, Default)]
pub struct ReIndexTask {
    /// Target site; `None` when the task refers to a removed site
    pub site: Option<Site>,
    /// Configurations to rebuild; empty means every enabled one
    pub configurations: Vec<String>,
}

impl ReIndexTask {
    pub fn new(site: Site) -> Self {
        Self {
            site: Some(site),
            configurations: Vec::new(),
        }
    }

    pub fn with_configurations<I, S>(mut self, configurations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configurations = configurations.into_iter().map(Into::into).collect();
        self
    }

    /// Run the task. Returns true only if every configuration was
    /// initialized successfully.
    pub fn execute(&self, queue: &Queue) -> Result<bool, EngineError> {
        let site = self
            .site
            .as_ref()
            .ok_or_else(|| EngineError::Task(INVALID_SITE_MESSAGE.to_string()))?;

        let mut succeeded = true;
        if self.configurations.is_empty() {
            let status = queue.initialize(site, None)?;
            succeeded = status.values().all(|ok| *ok);
        } else {
            for name in &self.configurations {
                let status = queue.initialize(site, Some(name))?;
                succeeded &= status.values().all(|ok| *ok);
            }
        }

        info!(
            root = site.root_page_id,
            configurations = ?self.configurations,
            succeeded,
            "Re-index task finished"
        );
        Ok(succeeded)
    }

    /// Short description shown next to the task in schedulers.
    pub fn additional_information(&self) -> String {
        let Some(site) = &self.site else {
            return INVALID_SITE_MESSAGE.to_string();
        };

        let mut information = format!("Site: {}", site.label);
        if !self.configurations.is_empty() {
            information.push_str(", Indexing Configurations: ");
            information.push_str(&self.configurations.join(", "));
        }
        information
    }
}
