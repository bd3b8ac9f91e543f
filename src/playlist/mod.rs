//! Playlist construction
//!
//! Prefixes are scoped through the sandbox, external trees are synced once,
//! never-visited directories are scanned on first request, and the merged
//! records are deduplicated before sorting so overlapping prefixes cannot
//! repeat a path.

mod builder;
pub mod sort;

pub use builder::{PlaylistBuilder, PlaylistRequest};
pub use sort::{Direction, SortMode};
