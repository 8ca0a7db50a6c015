// SPDX-FileCopyrightText: 2026 BookZone Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use bookzone_core::BookzoneError;
use tracing::debug;

use crate::migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type returned from closures running on the database thread.
///
/// Keeps domain rejections (validation, participant checks) distinct from
/// engine failures so they are not reported as an outage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Domain(#[from] BookzoneError),
}

/// Convert a tokio-rusqlite error into a [`BookzoneError`].
///
/// Domain errors pass through unchanged; everything else is `StoreUnavailable`.
pub fn map_tr_err(e: tokio_rusqlite::Error<StoreError>) -> BookzoneError {
    match e {
        tokio_rusqlite::Error::Error(StoreError::Domain(err)) => err,
        tokio_rusqlite::Error::Error(StoreError::Sqlite(err)) => {
            tracing::error!(error = %err, "sqlite operation failed");
            BookzoneError::StoreUnavailable {
                source: Box::new(err),
            }
        }
        other => BookzoneError::StoreUnavailable {
            source: other.to_string().into(),
        },
    }
}

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open a database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, BookzoneError> {
        Self::open_with(path, true).await
    }

    /// Open a database at `path`, applying PRAGMAs and pending migrations.
    ///
    /// Missing parent directories are created.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, BookzoneError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BookzoneError::StoreUnavailable {
                    source: Box::new(e),
                })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| BookzoneError::StoreUnavailable {
                source: e.to_string().into(),
            })?;

        conn.call(move |conn| -> Result<(), StoreError> {
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", journal, |row| row.get(0))?;
            debug!(journal_mode = %mode, "journal mode set");
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            run_migrations(conn)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), BookzoneError> {
        self.checkpoint().await?;
        self.conn
            .close()
            .await
            .map_err(|e| BookzoneError::StoreUnavailable {
                source: e.to_string().into(),
            })
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), BookzoneError> {
        self.conn
            .call(|conn| -> Result<(), StoreError> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_applies_pragmas_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("chat.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let (fk, tables): (i64, i64) = db
            .connection()
            .call(|conn| -> Result<(i64, i64), StoreError> {
                let fk = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?;
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('conversations', 'messages', 'read_cursors')",
                    [],
                    |r| r.get(0),
                )?;
                Ok((fk, tables))
            })
            .await
            .unwrap();
        assert_eq!(fk, 1);
        assert_eq!(tables, 3);
        assert!(path.exists());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopening_does_not_rerun_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[test]
    fn domain_errors_pass_through_mapping() {
        let err = map_tr_err(tokio_rusqlite::Error::Error(StoreError::Domain(
            BookzoneError::not_participant("c1", "eve"),
        )));
        assert!(matches!(err, BookzoneError::NotParticipant { .. }));

        let err = map_tr_err(tokio_rusqlite::Error::Error(StoreError::Sqlite(
            rusqlite::Error::QueryReturnedNoRows,
        )));
        assert!(matches!(err, BookzoneError::StoreUnavailable { .. }));
    }
}
