//! Shared helpers for walking, sorting and serving image files

use std::cmp::Ordering;
use std::fs::Metadata;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Extensions the library indexes (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Names starting with this marker are hidden
pub const HIDDEN_PREFIX: char = '.';

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// Modification time as fractional Unix seconds (0.0 when unavailable)
pub fn modified_secs(metadata: &Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs_f64())
        .unwrap_or(0.0)
}

/// Media type guessed from the extension
pub fn media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Case-insensitive natural order: digit runs compare by numeric value, so
/// `img2` sorts before `img10`. Ties fall back to a plain byte comparison to
/// keep the order total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natord::compare_ignore_case(a, b).then_with(|| a.cmp(b))
}
