//! Filesystem walks: the recursive image walk and the one-level browse listing

use crate::error::{GalleryError, Result};
use crate::sandbox::Sandbox;
use crate::utils::{is_hidden_name, is_image_path, modified_secs, natural_cmp};
use globset::GlobSet;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// An image file seen by a walk
#[derive(Debug, Clone, PartialEq)]
pub struct WalkedFile {
    pub absolute: PathBuf,
    pub mtime: f64,
}

/// Every image file under `dir`, keyed by root-relative path.
///
/// Hidden directories below `dir` and entries matching `exclusions` are not
/// descended into. Unreadable entries are logged and skipped.
pub fn walk_images(
    sandbox: &Sandbox,
    dir: &Path,
    exclusions: &GlobSet,
) -> HashMap<String, WalkedFile> {
    let mut found = HashMap::new();

    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| keep_entry(sandbox, entry, exclusions));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_image_path(entry.path()) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => {
                let rel = sandbox.to_rel(entry.path());
                found.insert(
                    rel,
                    WalkedFile {
                        absolute: entry.path().to_path_buf(),
                        mtime: modified_secs(&metadata),
                    },
                );
            }
            Err(e) => tracing::warn!(path = %entry.path().display(), "skipping file: {e}"),
        }
    }

    found
}

fn keep_entry(sandbox: &Sandbox, entry: &DirEntry, exclusions: &GlobSet) -> bool {
    // The walk's own starting point is always kept, hidden or not
    if entry.depth() == 0 {
        return true;
    }
    if entry.file_type().is_dir() && is_hidden_name(&entry.file_name().to_string_lossy()) {
        return false;
    }
    if !exclusions.is_empty() && exclusions.is_match(sandbox.to_rel(entry.path())) {
        tracing::trace!(path = %entry.path().display(), "excluded");
        return false;
    }
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseEntry {
    pub name: String,
    /// Root-relative path, usable as a playlist prefix or file path
    pub path: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// The directory actually listed after sandbox scoping
    pub path: String,
    pub entries: Vec<BrowseEntry>,
}

/// List one directory level: folders first, then images, each group in
/// natural order. Hidden entries are skipped. Never touches the index.
pub fn list_dir(sandbox: &Sandbox, raw: &str) -> Result<Listing> {
    let rel = sandbox.scope(raw);
    let dir = sandbox.resolve(&rel);
    if !dir.is_dir() {
        return Err(GalleryError::NotFound(rel));
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "skipping unreadable entry: {e}");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden_name(&name) {
            continue;
        }

        let path = entry.path();
        let is_dir = path.is_dir();
        if !is_dir && !(path.is_file() && is_image_path(&path)) {
            continue;
        }

        entries.push(BrowseEntry {
            path: sandbox.to_rel(&path),
            name,
            is_dir,
        });
    }

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| natural_cmp(&a.name, &b.name))
    });

    Ok(Listing { path: rel, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessPolicy;
    use globset::{Glob, GlobSetBuilder};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sandbox(root: &Path, allow_parent: bool) -> Sandbox {
        Sandbox::new(root, Arc::new(AccessPolicy::new(allow_parent)))
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_walk_images_skips_hidden_dirs_and_non_images() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.jpg"));
        touch(&root.join("album/B.PNG"));
        touch(&root.join("album/notes.txt"));
        touch(&root.join(".thumbs/c.jpg"));

        let sandbox = sandbox(root, false);
        let found = walk_images(&sandbox, sandbox.root(), &GlobSet::empty());

        let mut keys: Vec<_> = found.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["a.jpg", "album/B.PNG"]);
        assert!(found["a.jpg"].mtime > 0.0);
    }

    #[test]
    fn test_walk_images_applies_exclusions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("keep/a.jpg"));
        touch(&root.join("raw/b.jpg"));

        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("raw").unwrap());
        let exclusions = builder.build().unwrap();

        let sandbox = sandbox(root, false);
        let found = walk_images(&sandbox, sandbox.root(), &exclusions);
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("keep/a.jpg"));
    }

    #[test]
    fn test_walk_images_outside_root_keys() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("photos");
        fs::create_dir_all(&root).unwrap();
        touch(&temp_dir.path().join("external/x.jpg"));

        let sandbox = sandbox(&root, true);
        let found = walk_images(&sandbox, &sandbox.resolve("../external"), &GlobSet::empty());
        assert!(found.contains_key("../external/x.jpg"));
    }

    #[test]
    fn test_list_dir_orders_folders_first_naturally() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("img10.jpg"));
        touch(&root.join("img2.jpg"));
        touch(&root.join("readme.txt"));
        touch(&root.join(".hidden.jpg"));
        touch(&root.join("zeta/a.jpg"));
        touch(&root.join("Alpha/a.jpg"));

        let listing = list_dir(&sandbox(root, false), "").unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "zeta", "img2.jpg", "img10.jpg"]);
        assert_eq!(listing.path, ".");
        assert_eq!(listing.entries[0].path, "Alpha");
    }

    #[test]
    fn test_list_dir_scopes_and_reports_missing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("photos");
        touch(&root.join("album/a.jpg"));

        let restricted = sandbox(&root, false);
        assert_eq!(list_dir(&restricted, "../").unwrap().path, ".");

        let listing = list_dir(&restricted, "album").unwrap();
        assert_eq!(listing.entries[0].path, "album/a.jpg");

        assert!(list_dir(&restricted, "nope").unwrap_err().is_not_found());
    }
}
