use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OpenFlags, OptionalExtension};
use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::StorageError;
use crate::storage::Storer;

/// SQLite-based session storage.
///
/// One `sessions` row per session, with `expires_at` in unix seconds (`0`
/// means the session never expires). Rows past their expiry read as missing
/// and are removed by [`remove_expired`](Self::remove_expired).
pub struct SqliteStorer {
    pool: Pool<SqliteConnectionManager>,
    max_age: Duration,
}

impl SqliteStorer {
    /// Opens (or creates) the database at `path` and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>, max_age: Duration) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE |
                    OpenFlags::SQLITE_OPEN_CREATE |
                    OpenFlags::SQLITE_OPEN_URI
            )
            .with_init(|c| {
                c.busy_timeout(Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS sessions (
                        id TEXT PRIMARY KEY NOT NULL,
                        value TEXT NOT NULL,
                        expires_at INTEGER NOT NULL
                    );"
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(16)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        Ok(Self { pool, max_age })
    }

    /// Deletes every expired row and returns how many were removed.
    pub fn remove_expired(&self) -> Result<usize, StorageError> {
        let removed = self.conn()?.execute(
            "DELETE FROM sessions WHERE expires_at != 0 AND expires_at <= ?1",
            params![unix_now()],
        ).map_err(backend)?;
        Ok(removed)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool.get().map_err(backend)
    }

    fn expires_at(&self) -> i64 {
        if self.max_age.is_zero() {
            0
        } else {
            unix_now().saturating_add(i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX))
        }
    }
}

impl Storer for SqliteStorer {
    fn get(&self, id: &str) -> Result<String, StorageError> {
        self.conn()?
            .query_row(
                "SELECT value FROM sessions WHERE id=?1 AND (expires_at = 0 OR expires_at > ?2)",
                params![id, unix_now()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(backend)?
            .ok_or(StorageError::NoSession)
    }

    fn set(&self, id: &str, value: &str) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT INTO sessions(id, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE
             SET value=excluded.value, expires_at=excluded.expires_at",
            params![id, value, self.expires_at()],
        ).map_err(backend)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let live = conn.execute(
            "DELETE FROM sessions WHERE id=?1 AND (expires_at = 0 OR expires_at > ?2)",
            params![id, unix_now()],
        ).map_err(backend)?;
        if live == 0 {
            // An expired leftover still gets cleaned up.
            conn.execute("DELETE FROM sessions WHERE id=?1", params![id]).map_err(backend)?;
            return Err(StorageError::NoSession);
        }
        Ok(())
    }

    fn reset_expiry(&self, id: &str) -> Result<(), StorageError> {
        let updated = self.conn()?.execute(
            "UPDATE sessions SET expires_at=?2 WHERE id=?1 AND (expires_at = 0 OR expires_at > ?3)",
            params![id, self.expires_at(), unix_now()],
        ).map_err(backend)?;
        if updated == 0 {
            return Err(StorageError::NoSession);
        }
        Ok(())
    }
}

fn backend(e: impl Into<anyhow::Error>) -> StorageError {
    StorageError::Backend(e.into())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
