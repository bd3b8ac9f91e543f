//! Error taxonomy for the gallery core
//!
//! Callers need to tell apart a missing file, a sandbox violation and a
//! rejected request, so those get their own variants. Everything else is a
//! wrapped lower-level failure.

use thiserror::Error;

/// Errors surfaced by core operations
#[derive(Debug, Error)]
pub enum GalleryError {
    /// Path is in bounds but nothing exists there
    #[error("not found: {0}")]
    NotFound(String),

    /// Path resolves outside the managed root while parent access is disabled
    #[error("access outside the library root is disabled: {0}")]
    PermissionDenied(String),

    /// Malformed request or an empty restore candidate set
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl GalleryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GalleryError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GalleryError::PermissionDenied(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GalleryError::Validation(_))
    }
}

/// Result alias used throughout the core
pub type Result<T> = std::result::Result<T, GalleryError>;
