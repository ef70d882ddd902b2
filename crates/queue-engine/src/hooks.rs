//! Post-initialization observers.

use std::collections::BTreeMap;

use queue_types::Site;

use crate::error::EngineError;

/// Notified after a site's queue was (re-)initialized.
///
/// Observers run in registration order. An error aborts the remaining
/// observers and is returned to the caller; the initialized items stay.
pub trait InitializationObserver: Send + Sync {
    fn post_process_initialization(
        &self,
        site: &Site,
        configuration_names: &[String],
        status: &BTreeMap<String, bool>,
    ) -> Result<(), EngineError>;

    /// Name used in log output.
    fn name(&self) -> &str;
}
