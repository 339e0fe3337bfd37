// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use chrono::{DateTime, Utc};
use ringline_core::RinglineError;

/// Timestamps are stored as ISO-8601 text with millisecond precision, matching
/// SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`. Lexicographic order on
/// these strings equals chronological order, which the since-cursor queries
/// rely on.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp for storage.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
///
/// `idx` is the column index, used to report conversion failures through
/// rusqlite's row-mapping error path.
pub fn parse_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Map a tokio-rusqlite error into the shared error type.
pub fn map_tr_err(err: tokio_rusqlite::Error) -> RinglineError {
    RinglineError::transport(err)
}

/// Handle to the SQLite database.
///
/// Cloning is cheap; all clones share the same background connection thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled,
    /// applying PRAGMAs and any pending migrations.
    pub async fn open(path: &str) -> Result<Self, RinglineError> {
        Self::open_with(path, true).await
    }

    /// Open (or create) the database at `path`.
    ///
    /// `wal_mode` selects the journal mode; leaving WAL off is only intended
    /// for filesystems that cannot support it.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, RinglineError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(RinglineError::transport)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        conn.call(move |conn| {
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            conn.execute_batch(
                "PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let migration_result = conn
            .call(|conn| Ok(crate::migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)?;
        migration_result?;

        Ok(Self { conn })
    }

    /// Access the underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the database, flushing the WAL.
    pub async fn close(self) -> Result<(), RinglineError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}
