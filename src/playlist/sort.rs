//! Playlist orderings

use crate::error::{GalleryError, Result};
use crate::library::ImageRecord;
use crate::utils::natural_cmp;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Shuffle,
    Name,
    Date,
    SubfolderRandom,
    SubfolderDate,
}

impl SortMode {
    /// Unknown names sort by name
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "shuffle" => SortMode::Shuffle,
            "date" => SortMode::Date,
            "subfolder_random" => SortMode::SubfolderRandom,
            "subfolder_date" => SortMode::SubfolderDate,
            "name" => SortMode::Name,
            other => {
                tracing::debug!(sort = other, "unknown sort mode, using name");
                SortMode::Name
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Shuffle => "shuffle",
            SortMode::Name => "name",
            SortMode::Date => "date",
            SortMode::SubfolderRandom => "subfolder_random",
            SortMode::SubfolderDate => "subfolder_date",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl FromStr for Direction {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            other => Err(GalleryError::Validation(format!(
                "unknown direction '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}

/// Parent directory of a relative path; `""` for files at the root
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Order `records` by `mode` and return their paths.
///
/// `dir_mtime` supplies a directory's own modification time for
/// `subfolder_date`; it is called once per distinct parent.
pub fn sort_records<R, F>(
    mut records: Vec<ImageRecord>,
    mode: SortMode,
    rng: &mut R,
    dir_mtime: F,
) -> Vec<String>
where
    R: Rng + ?Sized,
    F: Fn(&str) -> f64,
{
    match mode {
        SortMode::Shuffle => records.shuffle(rng),
        SortMode::Name => records.sort_by(|a, b| natural_cmp(&a.path, &b.path)),
        SortMode::Date => records.sort_by(|a, b| {
            b.mtime
                .partial_cmp(&a.mtime)
                .unwrap_or(Ordering::Equal)
                .then_with(|| natural_cmp(&a.path, &b.path))
        }),
        SortMode::SubfolderRandom => {
            let mut groups = group_by_parent(records);
            groups.shuffle(rng);
            return flatten(groups);
        }
        SortMode::SubfolderDate => {
            let mut groups: Vec<(f64, (String, Vec<ImageRecord>))> = group_by_parent(records)
                .into_iter()
                .map(|group| (dir_mtime(&group.0), group))
                .collect();
            groups.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| natural_cmp(&a.1 .0, &b.1 .0))
            });
            return flatten(groups.into_iter().map(|(_, group)| group).collect());
        }
    }
    records.into_iter().map(|record| record.path).collect()
}

/// Groups keyed by parent directory, each naturally sorted, groups in
/// natural order of their directory
fn group_by_parent(records: Vec<ImageRecord>) -> Vec<(String, Vec<ImageRecord>)> {
    let mut groups: HashMap<String, Vec<ImageRecord>> = HashMap::new();
    for record in records {
        groups
            .entry(parent_dir(&record.path).to_string())
            .or_default()
            .push(record);
    }

    let mut groups: Vec<(String, Vec<ImageRecord>)> = groups.into_iter().collect();
    for (_, items) in &mut groups {
        items.sort_by(|a, b| natural_cmp(&a.path, &b.path));
    }
    groups.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    groups
}

fn flatten(groups: Vec<(String, Vec<ImageRecord>)>) -> Vec<String> {
    groups
        .into_iter()
        .flat_map(|(_, items)| items.into_iter().map(|record| record.path))
        .collect()
}

/// Move `anchor` to the front, keeping the cyclic order. No-op when absent.
pub fn rotate_to_anchor(paths: &mut [String], anchor: &str) -> bool {
    match paths.iter().position(|path| path == anchor) {
        Some(pos) => {
            paths.rotate_left(pos);
            true
        }
        None => false,
    }
}
