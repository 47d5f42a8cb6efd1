// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management.
//!
//! A [`Database`] owns a single [`tokio_rusqlite::Connection`], which runs
//! all SQL on one background thread. Every query in this crate goes through
//! that connection, so statements execute in submission order and the
//! conditional debit in [`crate::queries::balances`] never races a
//! concurrent write to the same row.

use std::path::Path;

use sibyl_core::SibylError;
use tracing::{debug, info};

/// Convert a tokio-rusqlite error into SibylError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SibylError {
    SibylError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
///
/// Cheap to clone; all clones share the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply pragmas, and run all
    /// pending migrations.
    ///
    /// Parent directories are created if missing. When `wal_mode` is true
    /// the journal is switched to WAL, which lets the checkpoint in
    /// [`close`](Self::close) truncate the log on shutdown.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SibylError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SibylError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        let pragmas = if wal_mode {
            "PRAGMA journal_mode = WAL;\n\
             PRAGMA synchronous = NORMAL;\n\
             PRAGMA foreign_keys = ON;\n\
             PRAGMA busy_timeout = 5000;"
        } else {
            "PRAGMA foreign_keys = ON;\n\
             PRAGMA busy_timeout = 5000;"
        };
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(pragmas)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), refinery::Error> {
            crate::migrations::run_migrations(conn)?;
            Ok(())
        })
        .await
        .map_err(|e| SibylError::Storage {
            source: Box::new(e),
        })?;

        info!(path = %path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// Returns the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and flush it to the main database file.
    ///
    /// Call on shutdown; the connection remains usable afterwards.
    pub async fn close(&self) -> Result<(), SibylError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("open.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        assert!(db_path.exists());

        let tables: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sessions'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/sibyl.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        assert!(db_path.exists());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_without_wal_still_works() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rollback.db");
        let db = Database::open(db_path.to_str().unwrap(), false)
            .await
            .unwrap();

        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_ne!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let path = db_path.to_str().unwrap();

        let db = Database::open(path, true).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        // Second open re-runs migrations against the existing schema.
        let db = Database::open(path, true).await.unwrap();
        db.close().await.unwrap();
    }
}
