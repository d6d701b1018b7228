// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so a
//! closure passed to [`Database::connection`]`.call()` executes without any
//! other statement from this process interleaving. Do NOT open a second
//! `Connection` to the same file for writes.

use std::path::Path;

use callwarden_config::model::StorageConfig;
use callwarden_core::CallwardenError;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into `CallwardenError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CallwardenError {
    CallwardenError::Storage {
        source: Box::new(e),
    }
}

/// Timestamps are stored as RFC 3339 UTC text with millisecond precision,
/// which also sorts correctly as plain text.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read an optional timestamp column.
pub(crate) fn read_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    })
    .transpose()
}

/// Read a timestamp column that must not be NULL.
pub(crate) fn read_required_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    read_ts(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "timestamp".to_string(),
        rusqlite::types::Type::Null,
    ))
}

/// Handle to the callwarden SQLite database.
///
/// Cheap to clone; clones share the same background connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database file at `path`, apply PRAGMAs and migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, CallwardenError> {
        let parent = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CallwardenError::Storage {
                    source: Box::new(e),
                })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| CallwardenError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open the database described by a storage config section.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CallwardenError> {
        Self::open(&config.database_path, config.wal_mode).await
    }

    /// Open a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, CallwardenError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| CallwardenError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    /// The underlying tokio-rusqlite connection, for query modules.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CallwardenError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| CallwardenError::Storage {
            source: Box::new(e),
        })?;
        debug!("database closed");
        Ok(())
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), CallwardenError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| -> Result<_, rusqlite::Error> { Ok(migrations::run_migrations(conn)) })
            .await
            .map_err(map_tr_err)??;
        Ok(())
    }
}
