//! Durable playlist records, one per client
//!
//! Mirrors the in-memory session store so a playlist survives a restart.

use crate::error::Result;
use crate::library::database::Database;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub client_id: String,
    pub paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRecords {
    db: Arc<Database>,
}

impl SessionRecords {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace the record for `client_id`
    pub fn save(&self, client_id: &str, paths: &[String]) -> Result<()> {
        let playlist = serde_json::to_string(paths)?;
        let created_at = Utc::now().timestamp();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO playlists (client_id, playlist, created_at) VALUES (?1, ?2, ?3)",
                params![client_id, playlist, created_at],
            )?;
            Ok(())
        })
    }

    /// A record whose playlist column no longer parses counts as absent
    pub fn load(&self, client_id: &str) -> Result<Option<SessionRecord>> {
        let row: Option<(String, i64)> = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT playlist, created_at FROM playlists WHERE client_id = ?1",
                    [client_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;

        let Some((playlist, created_at)) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<Vec<String>>(&playlist) {
            Ok(paths) => Ok(Some(SessionRecord {
                client_id: client_id.to_string(),
                paths,
                created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
            })),
            Err(e) => {
                tracing::warn!(client_id, "discarding unreadable session record: {e}");
                Ok(None)
            }
        }
    }

    pub fn count(&self) -> Result<usize> {
        self.db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM playlists", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Drop every record, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        self.db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM playlists", [])?))
    }

    /// Remove records created more than `max_age` ago
    pub fn prune_older_than(&self, max_age: Duration) -> Result<usize> {
        let cutoff = (Utc::now() - max_age).timestamp();
        self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM playlists WHERE created_at < ?1", [cutoff])?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> SessionRecords {
        SessionRecords::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_save_and_load() {
        let records = records();
        let paths = vec!["a.jpg".to_string(), "b/c.png".to_string()];
        records.save("10.0.0.1", &paths).unwrap();

        let record = records.load("10.0.0.1").unwrap().unwrap();
        assert_eq!(record.paths, paths);
        assert!(records.load("10.0.0.2").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces() {
        let records = records();
        records.save("c", &["a.jpg".to_string()]).unwrap();
        records.save("c", &["b.jpg".to_string()]).unwrap();

        assert_eq!(records.count().unwrap(), 1);
        assert_eq!(records.load("c").unwrap().unwrap().paths, vec!["b.jpg"]);
    }

    #[test]
    fn test_clear() {
        let records = records();
        records.save("a", &[]).unwrap();
        records.save("b", &[]).unwrap();
        assert_eq!(records.clear().unwrap(), 2);
        assert_eq!(records.count().unwrap(), 0);
    }

    #[test]
    fn test_prune_older_than() {
        let records = records();
        records.save("fresh", &["a.jpg".to_string()]).unwrap();
        let stale = (Utc::now() - Duration::days(90)).timestamp();
        records
            .db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO playlists (client_id, playlist, created_at) VALUES ('stale', '[]', ?1)",
                    [stale],
                )?;
                Ok(())
            })
            .unwrap();

        assert_eq!(records.prune_older_than(Duration::days(30)).unwrap(), 1);
        assert!(records.load("stale").unwrap().is_none());
        assert!(records.load("fresh").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_record_is_absent() {
        let records = records();
        records
            .db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO playlists (client_id, playlist, created_at) VALUES ('x', 'not json', 0)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        assert!(records.load("x").unwrap().is_none());
    }
}
