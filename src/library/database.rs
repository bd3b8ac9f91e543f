//! SQLite database shared by the image index and the durable session table

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA_VERSION: i32 = 1;
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// One connection behind a mutex.
///
/// Every logical batch goes through [`Database::with_transaction`], so a
/// reader holding the lock next never sees half of it.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure(&conn)?;

        let mut db = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        db.init_schema()?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Private database that disappears with the value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;

        let mut db = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn configure(conn: &Connection) -> Result<()> {
        // WAL lets external readers (sqlite3 shell, backups) coexist with us
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&mut self) -> Result<()> {
        let conn = self.conn.get_mut();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
            [],
        )?;

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        let version = match version {
            Some(version) => version,
            None => {
                conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
                0
            }
        };

        if version < SCHEMA_VERSION {
            Self::migrate_schema(conn, version)?;
        }
        Ok(())
    }

    fn migrate_schema(conn: &mut Connection, from_version: i32) -> Result<()> {
        let tx = conn.transaction()?;

        if from_version < 1 {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS images (
                    path TEXT PRIMARY KEY,
                    mtime REAL NOT NULL,
                    width INTEGER NOT NULL,
                    height INTEGER NOT NULL,
                    is_landscape INTEGER NOT NULL
                )",
                [],
            )?;
            tx.execute(
                "CREATE INDEX IF NOT EXISTS idx_images_landscape ON images(is_landscape)",
                [],
            )?;
            tx.execute(
                "CREATE TABLE IF NOT EXISTS playlists (
                    client_id TEXT PRIMARY KEY,
                    playlist TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )",
                [],
            )?;
        }

        tx.execute("UPDATE schema_version SET version = ?1", [SCHEMA_VERSION])?;
        tx.commit()?;
        tracing::info!(from_version, to_version = SCHEMA_VERSION, "database schema migrated");
        Ok(())
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside one transaction; any error rolls the whole batch back
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}
