//! The library service: one explicitly constructed owner of every component
//!
//! `Gallery` is what an outer layer (the CLI here, an HTTP router elsewhere)
//! talks to. It is `Send + Sync`; share it behind an `Arc` and call it from
//! as many request threads as needed.

use crate::cache::{ContentCache, HitOutcome, RestoreOutcome, SessionStatus, SessionStore};
use crate::config::{AccessPolicy, Config};
use crate::error::{GalleryError, Result};
use crate::library::{Database, LibraryIndex, SessionRecords};
use crate::playlist::{PlaylistBuilder, PlaylistRequest};
use crate::preload::Preloader;
use crate::sandbox::Sandbox;
use crate::scanner::{
    list_dir, ExternalSync, Listing, MetadataExtractor, ReconcileStats, Reconciler, Scanner,
};
use crate::tasks::TaskPool;
use crate::utils::media_type;
use anyhow::Context;
use std::sync::Arc;

/// Bytes and media type of a served file
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub path: String,
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

#[derive(Debug)]
pub struct Gallery {
    sandbox: Sandbox,
    index: LibraryIndex,
    content: Arc<ContentCache>,
    sessions: Arc<SessionStore>,
    reconciler: Arc<Reconciler>,
    builder: PlaylistBuilder,
    preloader: Preloader,
    tasks: Arc<TaskPool>,
    trigger_interval: u32,
}

impl Gallery {
    /// Open the database and assemble every component from `config`
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let root = config.root_dir()?;
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "library root does not exist");
        }

        let db_path = config.database_path()?;
        let db = Database::open(&db_path)
            .with_context(|| format!("Failed to open library database: {}", db_path.display()))?;
        let db = Arc::new(db);

        let policy = Arc::new(AccessPolicy::new(config.access.allow_parent_dir_access));
        let sandbox = Sandbox::new(&root, policy);
        let index = LibraryIndex::new(Arc::clone(&db));

        let extractor = MetadataExtractor::new(config.scan_workers())
            .context("Failed to start metadata workers")?;
        let content = Arc::new(ContentCache::new(config.cache.content_capacity));
        let scanner = Arc::new(
            Scanner::new(sandbox.clone(), index.clone(), extractor, config.exclusions()?)
                .with_content_cache(Arc::clone(&content)),
        );
        let external = Arc::new(ExternalSync::new(Arc::clone(&scanner)));

        let sessions = Arc::new(SessionStore::new(
            config.cache.session_capacity,
            SessionRecords::new(db),
        ));
        sessions.prune_durable(config.cache.session_max_age_days);

        let tasks = Arc::new(
            TaskPool::new("gallery-task", config.preload_workers())
                .context("Failed to start background workers")?,
        );
        let preloader = Preloader::new(
            Arc::clone(&content),
            sandbox.clone(),
            Arc::clone(&tasks),
            config.preload_radius(),
        );

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&scanner),
            Arc::clone(&content),
            Arc::clone(&sessions),
        ));
        let builder = PlaylistBuilder::new(scanner, external);

        tracing::debug!(root = %sandbox.root().display(), db = %db_path.display(), "gallery opened");

        Ok(Self {
            sandbox,
            index,
            content,
            sessions,
            reconciler,
            builder,
            preloader,
            tasks,
            trigger_interval: config.preload.trigger_interval,
        })
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    pub fn content_cache(&self) -> &ContentCache {
        &self.content
    }

    pub fn tasks(&self) -> &TaskPool {
        &self.tasks
    }

    /// The live parent-directory access flag; flip it at any time
    pub fn access_policy(&self) -> &Arc<AccessPolicy> {
        self.sandbox.policy()
    }

    /// Full root reconciliation on the calling thread
    pub fn reconcile(&self) -> Result<ReconcileStats> {
        self.reconciler.reconcile()
    }

    /// Queue a reconciliation on the background pool and return immediately
    pub fn spawn_reconcile(&self) {
        let reconciler = Arc::clone(&self.reconciler);
        self.tasks
            .spawn("reconcile", move || reconciler.reconcile().map(|_| ()));
    }

    /// Build a playlist, install it as the client's session and start
    /// warming the cache from its first entry
    pub fn build_playlist(
        &self,
        request: &PlaylistRequest,
        client_id: &str,
    ) -> Result<Arc<Vec<String>>> {
        if request.prefixes.is_empty() {
            return Ok(Arc::new(Vec::new()));
        }

        let paths = self.builder.build(request)?;
        let paths = self.sessions.put(client_id, paths);
        self.preloader.schedule(Arc::clone(&paths), 0);
        Ok(paths)
    }

    /// Re-validate a client-held playlist and install the survivors
    pub fn restore_playlist(
        &self,
        candidates: &[String],
        cursor: usize,
        client_id: &str,
    ) -> Result<RestoreOutcome> {
        let outcome = self
            .sessions
            .restore(&self.sandbox, client_id, candidates, cursor)?;
        self.preloader
            .schedule(Arc::clone(&outcome.paths), outcome.preload_center);
        Ok(outcome)
    }

    pub fn session_status(&self, client_id: &str) -> Result<SessionStatus> {
        self.sessions.status(client_id)
    }

    /// Read a file through the content cache and advance the client's
    /// session counter
    pub fn serve_file(&self, raw: &str, client_id: &str) -> Result<ServedFile> {
        let (rel, absolute) = self.sandbox.authorize(raw)?;
        if !absolute.is_file() {
            return Err(GalleryError::NotFound(rel));
        }

        let bytes = self.content.get(&absolute)?;

        match self.sessions.record_hit(client_id, self.trigger_interval) {
            HitOutcome::Counted => {}
            HitOutcome::Trigger(paths) => self.preload_around(paths, &rel),
            HitOutcome::NoSession => match self.sessions.restore_from_durable(client_id) {
                Ok(Some(paths)) => self.preload_around(paths, &rel),
                Ok(None) => {}
                Err(e) => tracing::warn!(client = client_id, "session restore failed: {e}"),
            },
        }

        Ok(ServedFile {
            media_type: media_type(&absolute),
            path: rel,
            bytes,
        })
    }

    fn preload_around(&self, paths: Arc<Vec<String>>, rel: &str) {
        if let Some(center) = paths.iter().position(|path| path == rel) {
            self.preloader.schedule(paths, center);
        }
    }

    /// One directory level for navigation; never touches the index
    pub fn browse(&self, raw: &str) -> Result<Listing> {
        list_dir(&self.sandbox, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SessionSource;
    use crate::library::OrientationFilter;
    use crate::playlist::{Direction, SortMode};
    use crate::scanner::test_support::write_png;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn open(root: &Path) -> Gallery {
        let mut config = Config::for_root(root);
        config.preload.radius = 2;
        config.preload.trigger_interval = 2;
        config.scan.workers = 2;
        Gallery::open(&config).unwrap()
    }

    fn library() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("photos");
        write_png(&root.join("a.png"), 4, 2);
        write_png(&root.join("b.png"), 2, 4);
        write_png(&root.join("album/c.png"), 4, 2);
        write_png(&temp_dir.path().join("outside/d.png"), 4, 2);
        temp_dir
    }

    fn request(prefixes: &[&str]) -> PlaylistRequest {
        PlaylistRequest {
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            orientation: OrientationFilter::Any,
            sort: SortMode::Name,
            direction: Direction::Forward,
            anchor: None,
        }
    }

    #[test]
    fn test_reconcile_twice_is_a_noop() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));

        let first = gallery.reconcile().unwrap();
        assert_eq!(first.upserted, 3);
        let second = gallery.reconcile().unwrap();
        assert!(!second.changed());
    }

    #[test]
    fn test_build_playlist_installs_session_and_preloads() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));
        gallery.reconcile().unwrap();

        let paths = gallery.build_playlist(&request(&["."]), "client").unwrap();
        assert_eq!(*paths, vec!["a.png", "album/c.png", "b.png"]);
        gallery.tasks().wait_idle();

        let status = gallery.session_status("client").unwrap();
        assert_eq!(status.source, SessionSource::Memory);
        assert_eq!(status.size, 3);
        assert!(gallery
            .content_cache()
            .contains(&gallery.sandbox().resolve("b.png")));
    }

    #[test]
    fn test_empty_prefix_list() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));
        let paths = gallery.build_playlist(&request(&[]), "client").unwrap();
        assert!(paths.is_empty());
        assert!(!gallery.session_status("client").unwrap().present);
    }

    #[test]
    fn test_serve_file() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));

        let served = gallery.serve_file("/album/./c.png", "client").unwrap();
        assert_eq!(served.path, "album/c.png");
        assert_eq!(served.media_type, "image/png");
        assert!(!served.bytes.is_empty());

        assert!(gallery
            .serve_file("missing.png", "client")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_serve_file_outside_root() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));

        let err = gallery.serve_file("../outside/d.png", "client").unwrap_err();
        assert!(err.is_permission_denied());

        // The flag is read per request
        gallery.access_policy().set_allow_parent_access(true);
        assert!(gallery.serve_file("../outside/d.png", "client").is_ok());
    }

    #[test]
    fn test_deleted_file_is_gone_after_reconcile() {
        let temp_dir = library();
        let root = temp_dir.path().join("photos");
        let gallery = open(&root);
        gallery.reconcile().unwrap();
        gallery.serve_file("a.png", "client").unwrap();

        fs::remove_file(root.join("a.png")).unwrap();
        let stats = gallery.reconcile().unwrap();

        assert_eq!(stats.removed, 1);
        assert!(gallery.index().get("a.png").unwrap().is_none());
        assert!(!gallery
            .content_cache()
            .contains(&gallery.sandbox().resolve("a.png")));
        assert!(gallery
            .serve_file("a.png", "client")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_rewritten_file_is_served_fresh_after_reconcile() {
        let temp_dir = library();
        let root = temp_dir.path().join("photos");
        let gallery = open(&root);
        gallery.reconcile().unwrap();
        let before = gallery.serve_file("a.png", "client").unwrap();

        let file = root.join("a.png");
        write_png(&file, 64, 128);
        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let stats = gallery.reconcile().unwrap();
        assert_eq!(stats.upserted, 1);
        let record = gallery.index().get("a.png").unwrap().unwrap();
        assert_eq!((record.width, record.height), (64, 128));

        let after = gallery.serve_file("a.png", "client").unwrap();
        assert_ne!(before.bytes.len(), after.bytes.len());
        assert_eq!(&*after.bytes, fs::read(&file).unwrap().as_slice());
    }

    #[test]
    fn test_restore_playlist_counts_survivors() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));

        let outcome = gallery
            .restore_playlist(&["a.png".to_string(), "deleted.png".to_string()], 0, "client")
            .unwrap();
        assert_eq!(outcome.valid_count, 1);
        assert_eq!(outcome.original_count, 2);
        gallery.tasks().wait_idle();

        let err = gallery
            .restore_playlist(&["deleted.png".to_string()], 0, "other")
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_session_survives_restart() {
        let temp_dir = library();
        let root = temp_dir.path().join("photos");
        {
            let gallery = open(&root);
            gallery.reconcile().unwrap();
            gallery.build_playlist(&request(&["."]), "client").unwrap();
            gallery.tasks().wait_idle();
        }

        let gallery = open(&root);
        assert_eq!(
            gallery.session_status("client").unwrap().source,
            SessionSource::Durable
        );

        gallery.serve_file("b.png", "client").unwrap();
        gallery.tasks().wait_idle();
        assert_eq!(
            gallery.session_status("client").unwrap().source,
            SessionSource::Memory
        );
        assert!(gallery
            .content_cache()
            .contains(&gallery.sandbox().resolve("a.png")));
    }

    #[test]
    fn test_spawn_reconcile() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));
        gallery.spawn_reconcile();
        gallery.tasks().wait_idle();
        assert_eq!(gallery.index().len().unwrap(), 3);
    }

    #[test]
    fn test_browse() {
        let temp_dir = library();
        let gallery = open(&temp_dir.path().join("photos"));
        let listing = gallery.browse("").unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["album", "a.png", "b.png"]);
    }
}
