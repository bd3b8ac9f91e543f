use super::sort::{rotate_to_anchor, sort_records, Direction, SortMode};
use crate::error::Result;
use crate::library::{ImageRecord, LibraryIndex, OrientationFilter};
use crate::sandbox::{is_root_prefix, Sandbox, ROOT_PREFIX};
use crate::scanner::{ExternalSync, Scanner};
use crate::utils::modified_secs;
use std::collections::HashSet;
use std::sync::Arc;

/// What a client asked for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistRequest {
    pub prefixes: Vec<String>,
    pub orientation: OrientationFilter,
    pub sort: SortMode,
    pub direction: Direction,
    /// Path to rotate to the front, if it made the list
    pub anchor: Option<String>,
}

#[derive(Debug)]
pub struct PlaylistBuilder {
    sandbox: Sandbox,
    index: LibraryIndex,
    scanner: Arc<Scanner>,
    external: Arc<ExternalSync>,
}

impl PlaylistBuilder {
    pub fn new(scanner: Arc<Scanner>, external: Arc<ExternalSync>) -> Self {
        Self {
            sandbox: scanner.sandbox().clone(),
            index: scanner.index().clone(),
            scanner,
            external,
        }
    }

    /// Resolve, query, dedupe, sort, orient and rotate
    pub fn build(&self, request: &PlaylistRequest) -> Result<Vec<String>> {
        if request.prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let mut prefixes: Vec<String> = Vec::with_capacity(request.prefixes.len());
        for raw in &request.prefixes {
            let prefix = self.sandbox.scope(raw);
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }

        let mut seen = HashSet::new();
        let mut records: Vec<ImageRecord> = Vec::new();
        for prefix in &prefixes {
            for record in self.collect_prefix(prefix, request.orientation)? {
                if seen.insert(record.path.clone()) {
                    records.push(record);
                }
            }
        }

        let sandbox = &self.sandbox;
        let mut paths = sort_records(records, request.sort, &mut rand::thread_rng(), |dir| {
            let dir = if dir.is_empty() { "." } else { dir };
            std::fs::metadata(sandbox.resolve(dir))
                .map(|metadata| modified_secs(&metadata))
                .unwrap_or(0.0)
        });

        if request.direction == Direction::Reverse {
            paths.reverse();
        }

        if let Some(anchor) = &request.anchor {
            let anchor = self.sandbox.canonical_rel(anchor);
            if !rotate_to_anchor(&mut paths, &anchor) {
                tracing::debug!(anchor = %anchor, "anchor not in playlist");
            }
        }

        tracing::debug!(
            prefixes = prefixes.len(),
            size = paths.len(),
            sort = %request.sort,
            "playlist built"
        );
        Ok(paths)
    }

    /// Records for one scoped prefix, syncing or lazily scanning as needed
    fn collect_prefix(
        &self,
        prefix: &str,
        orientation: OrientationFilter,
    ) -> Result<Vec<ImageRecord>> {
        let external = !is_root_prefix(prefix) && !self.sandbox.is_inside_root(prefix);
        let mut just_synced = false;
        if external {
            match self.external.sync_external(prefix) {
                Ok(stats) => just_synced = stats.is_some(),
                Err(e) => tracing::warn!(prefix, "external sync failed: {e}"),
            }
        }

        let mut rows = self.index.query_prefix(prefix, orientation)?;
        // An ancestor of the root also holds every in-root image, which is
        // keyed without the `../` escape
        if external && self.sandbox.root().starts_with(self.sandbox.resolve(prefix)) {
            rows.extend(self.index.query_prefix(ROOT_PREFIX, orientation)?);
        }
        if !rows.is_empty() || just_synced || !self.sandbox.resolve(prefix).is_dir() {
            return Ok(rows);
        }

        tracing::info!(prefix, "prefix not indexed yet, scanning");
        if let Err(e) = self.scanner.scan_subtree(prefix, false) {
            tracing::warn!(prefix, "lazy scan failed: {e}");
            return Ok(rows);
        }
        self.index.query_prefix(prefix, orientation)
    }
}
