//! Initializer for page content.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::initializer::{InitializationContext, Initializer};

/// Payload attached to queued canonical pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParameters {
    /// Page whose content the queued page mirrors
    pub content_from_pid: u64,
}

impl PageParameters {
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Queues the site's pages whose page type is allowed by the configuration.
///
/// Pages already queued for the site (by another configuration or an
/// earlier change) are left as they are. Canonical pages carry
/// [`PageParameters`] naming their source page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageInitializer;

impl Initializer for PageInitializer {
    fn initialize(&self, context: &InitializationContext<'_>) -> Result<bool, EngineError> {
        let pages = match context.records.find_records(
            context.item_type,
            context.site,
            context.configuration,
        ) {
            Ok(pages) => pages,
            Err(e) => {
                warn!(
                    root = context.site.root_page_id,
                    configuration = context.configuration_name,
                    error = %e,
                    "Page lookup failed, configuration not initialized"
                );
                return Ok(false);
            }
        };

        let mut added = 0usize;
        let mut skipped = 0usize;
        for page in &pages {
            let allowed = page
                .doktype()
                .is_some_and(|doktype| context.configuration.is_allowed_page_type(doktype));
            if !allowed {
                debug!(page = page.uid, doktype = ?page.doktype(), "Page type not allowed");
                skipped += 1;
                continue;
            }

            let parameters = page
                .content_from_pid()
                .map(|content_from_pid| PageParameters { content_from_pid }.to_json())
                .transpose()?;
            if context.enqueue(page.uid, parameters)? {
                added += 1;
            }
        }

        info!(
            root = context.site.root_page_id,
            configuration = context.configuration_name,
            found = pages.len(),
            added,
            skipped,
            "Initialized pages"
        );
        Ok(true)
    }
}
