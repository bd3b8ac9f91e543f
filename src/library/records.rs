//! Image records and the durable path index

use crate::error::{GalleryError, Result};
use crate::library::database::Database;
use crate::sandbox::is_root_prefix;
use rusqlite::{params, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Square images count as landscape
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width >= height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Which orientations a playlist keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrientationFilter {
    #[default]
    Any,
    Landscape,
    Portrait,
}

impl OrientationFilter {
    pub fn matches(&self, orientation: Orientation) -> bool {
        match self {
            OrientationFilter::Any => true,
            OrientationFilter::Landscape => orientation == Orientation::Landscape,
            OrientationFilter::Portrait => orientation == Orientation::Portrait,
        }
    }

    fn sql_clause(&self) -> &'static str {
        match self {
            OrientationFilter::Any => "",
            OrientationFilter::Landscape => " AND is_landscape = 1",
            OrientationFilter::Portrait => " AND is_landscape = 0",
        }
    }
}

impl FromStr for OrientationFilter {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" | "both" => Ok(OrientationFilter::Any),
            "landscape" => Ok(OrientationFilter::Landscape),
            "portrait" => Ok(OrientationFilter::Portrait),
            other => Err(GalleryError::Validation(format!(
                "unknown orientation '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OrientationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrientationFilter::Any => "any",
            OrientationFilter::Landscape => "landscape",
            OrientationFilter::Portrait => "portrait",
        };
        f.write_str(name)
    }
}

/// One indexed image, keyed by its normalized root-relative path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub path: String,
    /// Modification time in fractional Unix seconds
    pub mtime: f64,
    pub width: u32,
    pub height: u32,
}

impl ImageRecord {
    pub fn new(path: impl Into<String>, mtime: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            mtime,
            width,
            height,
        }
    }

    /// Always derived, never stored independently of the dimensions
    pub fn orientation(&self) -> Orientation {
        Orientation::from_dimensions(self.width, self.height)
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            mtime: row.get(1)?,
            width: row.get(2)?,
            height: row.get(3)?,
        })
    }
}

/// Bounds selecting `prefix` itself and everything nested below it.
///
/// Keys under `p/` sort in `["p/", "p0")` bytewise because `0` follows `/`.
fn subtree_bounds(prefix: &str) -> (String, String) {
    (format!("{prefix}/"), format!("{prefix}0"))
}

const SELECT_COLUMNS: &str = "SELECT path, mtime, width, height FROM images";
const ROOT_SCOPE: &str = "NOT (path >= '../' AND path < '..0')";
const PREFIX_SCOPE: &str = "(path = ?1 OR (path >= ?2 AND path < ?3))";

/// Durable map from relative path to [`ImageRecord`]
#[derive(Debug, Clone)]
pub struct LibraryIndex {
    db: Arc<Database>,
}

impl LibraryIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn len(&self) -> Result<usize> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, path: &str) -> Result<Option<ImageRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE path = ?1"))?;
            let mut rows = stmt.query_map([path], ImageRecord::from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    /// Every stored path with its modification time
    pub fn load_mtimes(&self) -> Result<HashMap<String, f64>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT path, mtime FROM images")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            Ok(rows.collect::<rusqlite::Result<HashMap<String, f64>>>()?)
        })
    }

    /// Stored paths within one subtree (the root subtree excludes `../` keys)
    pub fn load_mtimes_under(&self, prefix: &str) -> Result<HashMap<String, f64>> {
        self.db.with_conn(|conn| {
            if is_root_prefix(prefix) {
                let mut stmt =
                    conn.prepare(&format!("SELECT path, mtime FROM images WHERE {ROOT_SCOPE}"))?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(rows.collect::<rusqlite::Result<HashMap<String, f64>>>()?)
            } else {
                let (low, high) = subtree_bounds(prefix);
                let mut stmt =
                    conn.prepare(&format!("SELECT path, mtime FROM images WHERE {PREFIX_SCOPE}"))?;
                let rows = stmt.query_map(params![prefix, low, high], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                Ok(rows.collect::<rusqlite::Result<HashMap<String, f64>>>()?)
            }
        })
    }

    /// Records equal to or nested under `prefix` that pass `filter`
    pub fn query_prefix(
        &self,
        prefix: &str,
        filter: OrientationFilter,
    ) -> Result<Vec<ImageRecord>> {
        self.db.with_conn(|conn| {
            if is_root_prefix(prefix) {
                let sql = format!("{SELECT_COLUMNS} WHERE {ROOT_SCOPE}{}", filter.sql_clause());
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], ImageRecord::from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            } else {
                let (low, high) = subtree_bounds(prefix);
                let sql = format!("{SELECT_COLUMNS} WHERE {PREFIX_SCOPE}{}", filter.sql_clause());
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![prefix, low, high], ImageRecord::from_row)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            }
        })
    }

    /// Apply deletes then upserts as one transaction
    pub fn apply_batch(&self, upserts: &[ImageRecord], deletes: &[String]) -> Result<()> {
        if upserts.is_empty() && deletes.is_empty() {
            return Ok(());
        }

        self.db.with_transaction(|tx| {
            {
                let mut delete = tx.prepare("DELETE FROM images WHERE path = ?1")?;
                for path in deletes {
                    delete.execute([path])?;
                }
            }

            let mut upsert = tx.prepare(
                "INSERT INTO images (path, mtime, width, height, is_landscape)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(path) DO UPDATE SET
                    mtime = ?2,
                    width = ?3,
                    height = ?4,
                    is_landscape = ?5",
            )?;
            for record in upserts {
                upsert.execute(params![
                    record.path,
                    record.mtime,
                    record.width,
                    record.height,
                    record.orientation() == Orientation::Landscape,
                ])?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LibraryIndex {
        LibraryIndex::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn seed(index: &LibraryIndex) {
        index
            .apply_batch(
                &[
                    ImageRecord::new("a/1.jpg", 10.0, 800, 600),
                    ImageRecord::new("a/b/2.jpg", 11.0, 600, 800),
                    ImageRecord::new("a0/3.jpg", 12.0, 800, 800),
                    ImageRecord::new("ab/4.jpg", 13.0, 800, 600),
                    ImageRecord::new("top.png", 14.0, 10, 20),
                    ImageRecord::new("../ext/5.jpg", 15.0, 800, 600),
                ],
                &[],
            )
            .unwrap();
    }

    fn paths(records: &[ImageRecord]) -> Vec<&str> {
        let mut paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_orientation_derivation() {
        assert_eq!(Orientation::from_dimensions(800, 600), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(600, 600), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(600, 800), Orientation::Portrait);
    }

    #[test]
    fn test_orientation_filter_parse() {
        assert_eq!("Both".parse::<OrientationFilter>().unwrap(), OrientationFilter::Any);
        assert_eq!("Landscape".parse::<OrientationFilter>().unwrap(), OrientationFilter::Landscape);
        assert_eq!("portrait".parse::<OrientationFilter>().unwrap(), OrientationFilter::Portrait);
        assert!("sideways".parse::<OrientationFilter>().unwrap_err().is_validation());
    }

    #[test]
    fn test_query_prefix_is_component_exact() {
        let index = index();
        seed(&index);

        let records = index.query_prefix("a", OrientationFilter::Any).unwrap();
        assert_eq!(paths(&records), vec!["a/1.jpg", "a/b/2.jpg"]);
    }

    #[test]
    fn test_query_root_excludes_external() {
        let index = index();
        seed(&index);

        let records = index.query_prefix(".", OrientationFilter::Any).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| !r.path.starts_with("../")));

        let external = index.query_prefix("../ext", OrientationFilter::Any).unwrap();
        assert_eq!(paths(&external), vec!["../ext/5.jpg"]);
    }

    #[test]
    fn test_query_orientation_filter() {
        let index = index();
        seed(&index);

        let portrait = index.query_prefix(".", OrientationFilter::Portrait).unwrap();
        assert_eq!(paths(&portrait), vec!["a/b/2.jpg", "top.png"]);

        let landscape = index.query_prefix("a", OrientationFilter::Landscape).unwrap();
        assert_eq!(paths(&landscape), vec!["a/1.jpg"]);
    }

    #[test]
    fn test_upsert_replaces_and_recomputes_orientation() {
        let index = index();
        seed(&index);

        index
            .apply_batch(&[ImageRecord::new("a/1.jpg", 20.0, 600, 800)], &[])
            .unwrap();

        let record = index.get("a/1.jpg").unwrap().unwrap();
        assert_eq!(record.mtime, 20.0);
        assert_eq!(record.orientation(), Orientation::Portrait);

        let portrait = index.query_prefix("a", OrientationFilter::Portrait).unwrap();
        assert_eq!(paths(&portrait), vec!["a/1.jpg", "a/b/2.jpg"]);
        assert_eq!(index.len().unwrap(), 6);
    }

    #[test]
    fn test_batch_deletes() {
        let index = index();
        seed(&index);

        index
            .apply_batch(&[], &["top.png".to_string(), "missing.jpg".to_string()])
            .unwrap();
        assert!(index.get("top.png").unwrap().is_none());
        assert_eq!(index.len().unwrap(), 5);
    }

    #[test]
    fn test_load_mtimes_under() {
        let index = index();
        seed(&index);

        let all = index.load_mtimes().unwrap();
        assert_eq!(all.len(), 6);

        let under_a = index.load_mtimes_under("a").unwrap();
        assert_eq!(under_a.len(), 2);
        assert_eq!(under_a.get("a/b/2.jpg"), Some(&11.0));

        let root = index.load_mtimes_under(".").unwrap();
        assert!(!root.contains_key("../ext/5.jpg"));
    }
}
