//! Default initializer for record tables.

use tracing::{info, warn};

use crate::error::EngineError;
use crate::initializer::{InitializationContext, Initializer};

/// Queues every record of the configured table found in the site's tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordInitializer;

impl Initializer for RecordInitializer {
    fn initialize(&self, context: &InitializationContext<'_>) -> Result<bool, EngineError> {
        let records = match context.records.find_records(
            context.item_type,
            context.site,
            context.configuration,
        ) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    root = context.site.root_page_id,
                    configuration = context.configuration_name,
                    error = %e,
                    "Record lookup failed, configuration not initialized"
                );
                return Ok(false);
            }
        };

        let mut added = 0usize;
        for record in &records {
            if context.enqueue(record.uid, None)? {
                added += 1;
            }
        }

        info!(
            root = context.site.root_page_id,
            configuration = context.configuration_name,
            item_type = context.item_type,
            found = records.len(),
            added,
            "Initialized records"
        );
        Ok(true)
    }
}
