//! Root-wide reconciliation of the index against the filesystem

use super::{ReconcileStats, Scanner};
use crate::cache::{ContentCache, SessionStore};
use crate::error::{GalleryError, Result};
use crate::sandbox::ROOT_PREFIX;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
pub struct Reconciler {
    scanner: Arc<Scanner>,
    content: Arc<ContentCache>,
    sessions: Arc<SessionStore>,
    // Held for the duration of a pass; overlapping requests are skipped
    running: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        scanner: Arc<Scanner>,
        content: Arc<ContentCache>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            scanner,
            content,
            sessions,
            running: Mutex::new(()),
        }
    }

    /// Bring the index in line with the managed root.
    ///
    /// Only in-root entries can be deleted here; entries for external trees
    /// are left to [`super::ExternalSync`]. Any deletion invalidates the
    /// content cache and every session, durable records included.
    ///
    /// If a pass is already running this returns empty stats without
    /// scanning; the running pass covers the same tree.
    pub fn reconcile(&self) -> Result<ReconcileStats> {
        let Some(_guard) = self.running.try_lock() else {
            tracing::debug!("reconciliation already running, skipped");
            return Ok(ReconcileStats::default());
        };
        let started = Instant::now();
        let sandbox = self.scanner.sandbox();
        let index = self.scanner.index();

        // A missing root would look like "everything was deleted"
        if !sandbox.root().is_dir() {
            return Err(GalleryError::NotFound(sandbox.root().display().to_string()));
        }

        let walked = self.scanner.walk(ROOT_PREFIX);
        let known = index.load_mtimes()?;
        let (upserts, failed) = self.scanner.extract_changed(&walked, &known);

        let deletes: Vec<String> = known
            .keys()
            .filter(|path| sandbox.is_inside_root(path) && !walked.contains_key(*path))
            .cloned()
            .collect();

        self.scanner.apply_changes(&upserts, &deletes, &known)?;

        if !deletes.is_empty() {
            self.content.clear();
            if let Err(e) = self.sessions.clear() {
                tracing::warn!("failed to clear session records: {e}");
            }
            tracing::debug!("caches invalidated after deletions");
        }

        let stats = ReconcileStats {
            scanned: walked.len(),
            upserted: upserts.len(),
            removed: deletes.len(),
            failed,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            scanned = stats.scanned,
            changed = stats.upserted,
            removed = stats.removed,
            failed = stats.failed,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "reconciliation finished"
        );
        Ok(stats)
    }
}
