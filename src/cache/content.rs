//! Read-through LRU of whole file contents, keyed by absolute path

use super::lru::LruMap;
use crate::error::{GalleryError, Result};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentCacheStats {
    pub entries: usize,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct ContentCache {
    entries: Mutex<LruMap<PathBuf, Arc<[u8]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    /// `capacity` counts files, not bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruMap::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached bytes, or read the file and cache it. Failed reads are not cached.
    pub fn get(&self, path: &Path) -> Result<Arc<[u8]>> {
        if let Some(bytes) = self.entries.lock().get(&path.to_path_buf()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(bytes));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Read outside the lock; two concurrent misses may both read, last insert wins.
        let bytes: Arc<[u8]> = match std::fs::read(path) {
            Ok(data) => data.into(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GalleryError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some((evicted, _)) = self
            .entries
            .lock()
            .insert(path.to_path_buf(), Arc::clone(&bytes))
        {
            tracing::trace!(path = %evicted.display(), "content cache eviction");
        }
        Ok(bytes)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(&path.to_path_buf())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().capacity()
    }

    /// Drop one file's cached bytes; returns whether it was cached
    pub fn remove(&self, path: &Path) -> bool {
        self.entries.lock().remove(&path.to_path_buf()).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> ContentCacheStats {
        let entries = self.entries.lock();
        ContentCacheStats {
            entries: entries.len(),
            bytes: entries.values().map(|bytes| bytes.len() as u64).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_through_and_hit() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.jpg");
        fs::write(&file, b"first").unwrap();

        let cache = ContentCache::new(4);
        assert_eq!(&*cache.get(&file).unwrap(), b"first");

        // Served from memory even after the file changes
        fs::write(&file, b"second").unwrap();
        assert_eq!(&*cache.get(&file).unwrap(), b"first");

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.bytes, 5);
    }

    #[test]
    fn test_missing_file_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("gone.jpg");

        let cache = ContentCache::new(4);
        assert!(cache.get(&file).unwrap_err().is_not_found());
        assert!(!cache.contains(&file));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_eviction() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ContentCache::new(2);
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = temp_dir.path().join(format!("{i}.png"));
                fs::write(&path, [i as u8]).unwrap();
                path
            })
            .collect();

        for path in &paths {
            cache.get(path).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&paths[0]));
        assert!(cache.contains(&paths[2]));
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.jpg");
        fs::write(&file, b"x").unwrap();

        let cache = ContentCache::new(4);
        cache.get(&file).unwrap();
        cache.clear();
        assert!(!cache.contains(&file));
    }
}
