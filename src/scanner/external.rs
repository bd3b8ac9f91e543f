//! Once-per-process resync of trees outside the managed root

use super::{ReconcileStats, Scanner};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub struct ExternalSync {
    scanner: Arc<Scanner>,
    synced: Mutex<HashSet<String>>,
}

impl ExternalSync {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            scanner,
            synced: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_synced(&self, prefix: &str) -> bool {
        self.synced.lock().contains(prefix)
    }

    /// Heavy-scan `prefix` and drop its stale entries, at most once per
    /// prefix for the life of this instance. `None` when already synced.
    ///
    /// The prefix is marked before scanning so concurrent callers do not
    /// repeat the work; a failed scan clears the mark for a later retry.
    pub fn sync_external(&self, prefix: &str) -> Result<Option<ReconcileStats>> {
        if !self.synced.lock().insert(prefix.to_string()) {
            return Ok(None);
        }

        match self.scanner.scan_subtree(prefix, true) {
            Ok(stats) => {
                tracing::info!(
                    prefix,
                    scanned = stats.scanned,
                    upserted = stats.upserted,
                    removed = stats.removed,
                    "external tree synced"
                );
                Ok(Some(stats))
            }
            Err(e) => {
                self.synced.lock().remove(prefix);
                Err(e)
            }
        }
    }
}
