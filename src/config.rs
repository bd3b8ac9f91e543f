//! Configuration file and the shared runtime access flag
//!
//! Settings live in `config.toml` under the platform config directory. Values
//! are layered: file, then `GALLERY_*` environment variables, then CLI flags.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const ENV_ROOT_DIR: &str = "GALLERY_ROOT_DIR";
pub const ENV_DB_PATH: &str = "GALLERY_DB_PATH";
pub const ENV_ALLOW_PARENT: &str = "GALLERY_ALLOW_PARENT_DIR_ACCESS";

const DEFAULT_DB_NAME: &str = "gallery_metadata.db";
const MAX_SCAN_WORKERS: usize = 32;
const MAX_PRELOAD_RADIUS: usize = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub scan: ScanConfig,
    pub cache: CacheConfig,
    pub preload: PreloadConfig,
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// Managed root. Empty means the current directory.
    pub root: Option<PathBuf>,
    /// Database file. Defaults to `<root>/gallery_metadata.db`.
    pub database: Option<PathBuf>,
    /// Globs matched against root-relative paths; matches are never indexed.
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Metadata extraction threads, 0 = available parallelism
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub content_capacity: usize,
    pub session_capacity: usize,
    pub session_max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            content_capacity: 300,
            session_capacity: 256,
            session_max_age_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreloadConfig {
    pub radius: usize,
    /// File-serve hits between two preload runs for the same client
    pub trigger_interval: u32,
    pub workers: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            radius: 150,
            trigger_interval: 50,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccessConfig {
    pub allow_parent_dir_access: bool,
}

impl Config {
    /// Configuration for an explicit root with every other setting defaulted
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.library.root = Some(root.into());
        config
    }

    /// Location of `config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "gallery")
            .context("Could not determine the configuration directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Load from disk and apply environment overrides.
    ///
    /// Never fails: a missing or unreadable file yields defaults.
    pub fn load() -> Self {
        let mut config = match Self::config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default configuration: {e:#}");
                Self::default()
            }
        };
        config.apply_overrides_from(|key| std::env::var(key).ok());
        config
    }

    /// Like [`Config::load`], but writes the defaults when no file exists yet
    pub fn load_or_create() -> Self {
        if let Ok(path) = Self::config_path() {
            if !path.exists() {
                if let Err(e) = Self::default().save() {
                    tracing::warn!("could not write default configuration: {e:#}");
                }
            }
        }
        Self::load()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Apply `GALLERY_*` overrides using `lookup` as the variable source
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_ROOT_DIR).filter(|v| !v.trim().is_empty()) {
            self.library.root = Some(PathBuf::from(root));
        }
        if let Some(db) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            self.library.database = Some(PathBuf::from(db));
        }
        if let Some(flag) = lookup(ENV_ALLOW_PARENT) {
            self.access.allow_parent_dir_access = parse_flag(&flag);
        }
    }

    pub fn apply_cli_overrides(&mut self, root: Option<PathBuf>, allow_parent: bool) {
        if let Some(root) = root {
            self.library.root = Some(root);
        }
        if allow_parent {
            self.access.allow_parent_dir_access = true;
        }
    }

    /// Managed root, made absolute
    pub fn root_dir(&self) -> Result<PathBuf> {
        let root = match &self.library.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        if root.is_absolute() {
            Ok(root)
        } else {
            Ok(std::env::current_dir()
                .context("Failed to read current directory")?
                .join(root))
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.library.database {
            Some(path) => Ok(path.clone()),
            None => Ok(self.root_dir()?.join(DEFAULT_DB_NAME)),
        }
    }

    pub fn scan_workers(&self) -> usize {
        let requested = if self.scan.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.scan.workers
        };
        requested.clamp(1, MAX_SCAN_WORKERS)
    }

    pub fn preload_radius(&self) -> usize {
        self.preload.radius.clamp(1, MAX_PRELOAD_RADIUS)
    }

    pub fn preload_workers(&self) -> usize {
        self.preload.workers.max(1)
    }

    /// Compile `exclude_patterns`
    pub fn exclusions(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.library.exclude_patterns {
            let glob = Glob::new(pattern)
                .with_context(|| format!("Invalid exclude pattern: {pattern}"))?;
            builder.add(glob);
        }
        builder.build().context("Failed to compile exclude patterns")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Hot-reloadable permission for paths that resolve outside the root.
///
/// Shared between every component that resolves request paths; read it per
/// request, never cache the value.
#[derive(Debug, Default)]
pub struct AccessPolicy {
    allow_parent: AtomicBool,
}

impl AccessPolicy {
    pub fn new(allow_parent: bool) -> Self {
        Self {
            allow_parent: AtomicBool::new(allow_parent),
        }
    }

    pub fn allows_parent_access(&self) -> bool {
        self.allow_parent.load(Ordering::Acquire)
    }

    pub fn set_allow_parent_access(&self, allow: bool) {
        let previous = self.allow_parent.swap(allow, Ordering::AcqRel);
        if previous != allow {
            tracing::info!(allow, "parent directory access changed");
        }
    }
}
