//! Durable library state
//!
//! One SQLite file holds the image index (path -> mtime, dimensions) and the
//! per-client playlist records used to rebuild sessions after a restart.

pub mod database;
pub mod records;
pub mod sessions;

pub use database::Database;
pub use records::{ImageRecord, LibraryIndex, Orientation, OrientationFilter};
pub use sessions::{SessionRecord, SessionRecords};
