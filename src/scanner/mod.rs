//! Directory scanning and index reconciliation
//!
//! A scan walks a tree, compares each image's mtime against the index, and
//! reads pixel dimensions only for new or changed files. The resulting
//! upserts and deletes are applied as one index transaction.

pub mod external;
pub mod metadata;
pub mod reconcile;
pub mod walk;

pub use external::ExternalSync;
pub use metadata::MetadataExtractor;
pub use reconcile::Reconciler;
pub use walk::{list_dir, BrowseEntry, Listing, WalkedFile};

use crate::cache::ContentCache;
use crate::error::Result;
use crate::library::{ImageRecord, LibraryIndex};
use crate::sandbox::Sandbox;
use globset::GlobSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counts from one scan pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Image files seen by the walk
    pub scanned: usize,
    pub upserted: usize,
    pub removed: usize,
    /// Changed files whose metadata could not be read
    pub failed: usize,
    pub elapsed: Duration,
}

impl ReconcileStats {
    pub fn changed(&self) -> bool {
        self.upserted > 0 || self.removed > 0
    }
}

/// Walk, diff and extract over any subtree of the library
#[derive(Debug)]
pub struct Scanner {
    sandbox: Sandbox,
    index: LibraryIndex,
    extractor: MetadataExtractor,
    exclusions: GlobSet,
    // Cached bytes of re-indexed files are evicted here
    content: Option<Arc<ContentCache>>,
}

impl Scanner {
    pub fn new(
        sandbox: Sandbox,
        index: LibraryIndex,
        extractor: MetadataExtractor,
        exclusions: GlobSet,
    ) -> Self {
        Self {
            sandbox,
            index,
            extractor,
            exclusions,
            content: None,
        }
    }

    pub fn with_content_cache(mut self, content: Arc<ContentCache>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    pub fn walk(&self, rel: &str) -> HashMap<String, WalkedFile> {
        walk::walk_images(&self.sandbox, &self.sandbox.resolve(rel), &self.exclusions)
    }

    /// Extract metadata for walked files that are new or whose mtime differs
    /// from `known`. Returns the records and the failure count.
    pub fn extract_changed(
        &self,
        walked: &HashMap<String, WalkedFile>,
        known: &HashMap<String, f64>,
    ) -> (Vec<ImageRecord>, usize) {
        let changed: Vec<(String, WalkedFile)> = walked
            .iter()
            .filter(|(rel, file)| known.get(*rel) != Some(&file.mtime))
            .map(|(rel, file)| (rel.clone(), file.clone()))
            .collect();
        self.extractor.extract(changed)
    }

    /// Write one scan's changes to the index, then evict the cached bytes of
    /// every file that was already indexed and has been re-extracted.
    pub fn apply_changes(
        &self,
        upserts: &[ImageRecord],
        deletes: &[String],
        known: &HashMap<String, f64>,
    ) -> Result<()> {
        self.index.apply_batch(upserts, deletes)?;

        if let Some(content) = &self.content {
            let evicted = upserts
                .iter()
                .filter(|record| known.contains_key(&record.path))
                .filter(|record| content.remove(&self.sandbox.resolve(&record.path)))
                .count();
            if evicted > 0 {
                tracing::debug!(evicted, "stale cached bytes dropped");
            }
        }
        Ok(())
    }

    /// Heavy scan of one subtree, touching only index entries under `prefix`.
    ///
    /// With `delete_unseen`, indexed paths under the prefix that the walk did
    /// not find are removed in the same batch.
    pub fn scan_subtree(&self, prefix: &str, delete_unseen: bool) -> Result<ReconcileStats> {
        let started = Instant::now();

        let walked = self.walk(prefix);
        let known = self.index.load_mtimes_under(prefix)?;
        let (upserts, failed) = self.extract_changed(&walked, &known);

        let deletes: Vec<String> = if delete_unseen {
            known
                .keys()
                .filter(|path| !walked.contains_key(*path))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        self.apply_changes(&upserts, &deletes, &known)?;

        let stats = ReconcileStats {
            scanned: walked.len(),
            upserted: upserts.len(),
            removed: deletes.len(),
            failed,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            prefix,
            scanned = stats.scanned,
            upserted = stats.upserted,
            removed = stats.removed,
            "subtree scan finished"
        );
        Ok(stats)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{scanner, write_png};
    use crate::library::OrientationFilter;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_subtree_only_touches_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_png(&root.join("album/a.png"), 4, 2);
        write_png(&root.join("other/b.png"), 2, 4);

        let scanner = scanner(root, false);
        let stats = scanner.scan_subtree("album", false).unwrap();
        assert_eq!((stats.scanned, stats.upserted, stats.removed), (1, 1, 0));

        let index = scanner.index();
        assert!(index.get("album/a.png").unwrap().is_some());
        assert!(index.get("other/b.png").unwrap().is_none());
    }

    #[test]
    fn test_scan_subtree_skips_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("album/a.png"), 4, 2);

        let scanner = scanner(temp_dir.path(), false);
        scanner.scan_subtree("album", false).unwrap();
        let again = scanner.scan_subtree("album", false).unwrap();
        assert_eq!(again.upserted, 0);
        assert!(!again.changed());
    }

    #[test]
    fn test_scan_subtree_delete_unseen() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_png(&root.join("album/a.png"), 4, 2);
        write_png(&root.join("album/b.png"), 4, 2);
        write_png(&root.join("albums/c.png"), 4, 2);

        let scanner = scanner(root, false);
        scanner.scan_subtree("album", false).unwrap();
        scanner.scan_subtree("albums", false).unwrap();
        fs::remove_file(root.join("album/b.png")).unwrap();

        let stats = scanner.scan_subtree("album", true).unwrap();
        assert_eq!(stats.removed, 1);

        // Sibling directory sharing the name prefix is untouched
        let rows = scanner
            .index()
            .query_prefix(".", OrientationFilter::Any)
            .unwrap();
        let mut paths: Vec<_> = rows.into_iter().map(|r| r.path).collect();
        paths.sort();
        assert_eq!(paths, vec!["album/a.png", "albums/c.png"]);
    }
}
