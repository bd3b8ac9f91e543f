//! Gallery library crate
//!
//! Indexes a directory tree of images into SQLite, keeps the index in step
//! with the filesystem, and builds playlists for slideshow clients. The
//! [`Gallery`] facade owns every component; the `gallery` binary is a thin
//! command line over it.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod gallery;
pub mod library;
pub mod output;
pub mod playlist;
pub mod preload;
pub mod progress;
pub mod sandbox;
pub mod scanner;
pub mod tasks;
pub mod theme;
pub mod utils;

pub use config::{AccessPolicy, Config};
pub use error::{GalleryError, Result};
pub use gallery::{Gallery, ServedFile};
