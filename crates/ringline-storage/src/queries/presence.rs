// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence table operations.
//!
//! A single upsert backs mark-online, mark-offline, and heartbeat. The
//! `MAX` guard keeps `last_seen_at` monotonic under reordered writes.

use chrono::{DateTime, Utc};
use ringline_core::{PresenceRecord, RinglineError};
use rusqlite::params;

use crate::database::{Database, format_ts, parse_ts};

fn presence_from_row(row: &rusqlite::Row<'_>) -> Result<PresenceRecord, rusqlite::Error> {
    let raw_seen: String = row.get(2)?;
    Ok(PresenceRecord {
        peer_id: row.get(0)?,
        is_online: row.get(1)?,
        last_seen_at: parse_ts(2, &raw_seen)?,
    })
}

/// Insert or update a peer's presence row.
///
/// `is_online` always takes the new value; `last_seen_at` only ever moves
/// forward, so a delayed heartbeat cannot roll back a fresher observation.
pub async fn upsert_status(
    db: &Database,
    peer_id: &str,
    is_online: bool,
    seen_at: DateTime<Utc>,
) -> Result<(), RinglineError> {
    let peer_id = peer_id.to_string();
    let seen_at = format_ts(seen_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO presence (peer_id, is_online, last_seen_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(peer_id) DO UPDATE SET
                     is_online = excluded.is_online,
                     last_seen_at = MAX(presence.last_seen_at, excluded.last_seen_at)",
                params![peer_id, is_online, seen_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one peer's presence row, if any.
pub async fn get_presence(
    db: &Database,
    peer_id: &str,
) -> Result<Option<PresenceRecord>, RinglineError> {
    let peer_id = peer_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = {
                let mut stmt = conn.prepare(
                    "SELECT peer_id, is_online, last_seen_at
                     FROM presence WHERE peer_id = ?1",
                )?;
                stmt.query_row(params![peer_id], presence_from_row)
            };
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List peers marked online whose `last_seen_at` is at or after `cutoff`,
/// most recently seen first. `exclude` drops one peer (the requester).
pub async fn list_online(
    db: &Database,
    exclude: Option<&str>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<PresenceRecord>, RinglineError> {
    let exclude = exclude.map(|s| s.to_string());
    let cutoff = format_ts(cutoff);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT peer_id, is_online, last_seen_at
                 FROM presence
                 WHERE is_online = 1
                   AND last_seen_at >= ?1
                   AND (?2 IS NULL OR peer_id <> ?2)
                 ORDER BY last_seen_at DESC, peer_id ASC",
            )?;
            let rows = stmt.query_map(params![cutoff, exclude], presence_from_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
