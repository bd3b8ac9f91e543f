//! In-memory caches in front of the filesystem and the library database

mod lru;

pub mod content;
pub mod session;

pub use content::{ContentCache, ContentCacheStats};
pub use lru::LruMap;
pub use session::{
    HitOutcome, PlaylistSession, RestoreOutcome, SessionSource, SessionStatus, SessionStore,
};
