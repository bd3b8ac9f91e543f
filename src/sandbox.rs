//! Relative path normalization and the root boundary check
//!
//! Every request path is a root-relative string. `..` segments survive
//! normalization so that trees next to the root stay addressable; whether such
//! a path may be used is decided per request from the shared [`AccessPolicy`].

use crate::config::AccessPolicy;
use crate::error::{GalleryError, Result};
use path_clean::PathClean;
use pathdiff::diff_paths;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Relative path that stands for the managed root itself
pub const ROOT_PREFIX: &str = ".";

/// Marker that starts every key living outside the managed root
pub const PARENT_ESCAPE: &str = "../";

/// Canonical relative form: forward slashes, no empty or `.` segments, no
/// leading or trailing separator. `..` is preserved. The root is `"."`.
pub fn normalize_rel_path(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let segments: Vec<&str> = unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() {
        ROOT_PREFIX.to_string()
    } else {
        segments.join("/")
    }
}

pub fn is_root_prefix(rel: &str) -> bool {
    rel.is_empty() || rel == ROOT_PREFIX
}

/// Express `path` relative to `base` with `/` separators. Both must be clean
/// absolute paths.
pub fn relative_path(path: &Path, base: &Path) -> String {
    let parts: Vec<String> = diff_paths(path, base)
        .map(|diff| {
            diff.components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        ROOT_PREFIX.to_string()
    } else {
        parts.join("/")
    }
}

/// The managed root plus the live access policy
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    policy: Arc<AccessPolicy>,
}

impl Sandbox {
    pub fn new(root: &Path, policy: Arc<AccessPolicy>) -> Self {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.clean());
        Self { root, policy }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &Arc<AccessPolicy> {
        &self.policy
    }

    pub fn allows_parent_access(&self) -> bool {
        self.policy.allows_parent_access()
    }

    /// Absolute, lexically cleaned location of a relative path
    pub fn resolve(&self, rel: &str) -> PathBuf {
        if is_root_prefix(rel) {
            return self.root.clone();
        }
        self.root.join(rel).clean()
    }

    /// Component-wise ancestor test, so `/photos-old` is not inside `/photos`
    pub fn contains(&self, absolute: &Path) -> bool {
        absolute.starts_with(&self.root)
    }

    pub fn is_inside_root(&self, rel: &str) -> bool {
        self.contains(&self.resolve(rel))
    }

    /// Root-relative key for an absolute path
    pub fn to_rel(&self, absolute: &Path) -> String {
        relative_path(&absolute.clean(), &self.root)
    }

    /// Normalized relative path with every `..` that can be folded folded
    /// (`a/../b` becomes `b`, `../x` stays `../x`)
    pub fn canonical_rel(&self, raw: &str) -> String {
        let rel = normalize_rel_path(raw);
        self.to_rel(&self.resolve(&rel))
    }

    /// Scope a browse or playlist path: out-of-root paths collapse to the
    /// root while parent access is disabled.
    pub fn scope(&self, raw: &str) -> String {
        let rel = self.canonical_rel(raw);
        if !self.allows_parent_access() && !self.is_inside_root(&rel) {
            tracing::debug!(path = raw, "out-of-root path coerced to root");
            return ROOT_PREFIX.to_string();
        }
        rel
    }

    /// Resolve a path for reading a file; fails closed outside the root
    /// while parent access is disabled.
    pub fn authorize(&self, raw: &str) -> Result<(String, PathBuf)> {
        let rel = self.canonical_rel(raw);
        let absolute = self.resolve(&rel);
        if !self.allows_parent_access() && !self.contains(&absolute) {
            return Err(GalleryError::PermissionDenied(raw.to_string()));
        }
        Ok((rel, absolute))
    }
}
