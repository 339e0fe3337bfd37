// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal table operations.
//!
//! Rows are append-only. The unique index on `signal_id` absorbs duplicate
//! sends: re-inserting an already-stored signal is a no-op that hands back
//! the original row.

use chrono::{DateTime, Utc};
use ringline_core::{RinglineError, SignalKind, SignalMessage};
use rusqlite::params;

use crate::database::{Database, format_ts, parse_ts};

const SIGNAL_COLUMNS: &str = "signal_id, call_id, from_peer, to_peer, kind, payload, created_at";

pub(crate) fn signal_from_row(row: &rusqlite::Row<'_>) -> Result<SignalMessage, rusqlite::Error> {
    let raw_kind: String = row.get(4)?;
    let kind = raw_kind.parse::<SignalKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_payload: String = row.get(5)?;
    let payload = serde_json::from_str(&raw_payload).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_created: String = row.get(6)?;
    Ok(SignalMessage {
        signal_id: row.get(0)?,
        call_id: row.get(1)?,
        from_peer: row.get(2)?,
        to_peer: row.get(3)?,
        kind,
        payload,
        created_at: parse_ts(6, &raw_created)?,
    })
}

/// Append a signal, returning the stored row.
///
/// If a row with the same `signal_id` already exists the insert is ignored
/// and the existing row is returned, so retried sends converge on one
/// stored message.
pub async fn insert_signal(
    db: &Database,
    message: &SignalMessage,
) -> Result<SignalMessage, RinglineError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO signals (signal_id, call_id, from_peer, to_peer, kind, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(signal_id) DO NOTHING",
                params![
                    message.signal_id,
                    message.call_id,
                    message.from_peer,
                    message.to_peer,
                    message.kind.to_string(),
                    message.payload.to_string(),
                    format_ts(message.created_at),
                ],
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SIGNAL_COLUMNS} FROM signals WHERE signal_id = ?1"
            ))?;
            let stored = stmt.query_row(params![message.signal_id], signal_from_row)?;
            Ok(stored)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch signals addressed to `to_peer` within one call, oldest first.
///
/// With `since` set, only rows strictly after that instant are returned;
/// rows written at exactly `since` are assumed already delivered.
pub async fn poll_since(
    db: &Database,
    call_id: &str,
    to_peer: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<SignalMessage>, RinglineError> {
    let call_id = call_id.to_string();
    let to_peer = to_peer.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match since {
                Some(since) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SIGNAL_COLUMNS} FROM signals
                         WHERE call_id = ?1 AND to_peer = ?2 AND created_at > ?3
                         ORDER BY created_at ASC, id ASC"
                    ))?;
                    let rows = stmt.query_map(
                        params![call_id, to_peer, format_ts(since)],
                        signal_from_row,
                    )?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SIGNAL_COLUMNS} FROM signals
                         WHERE call_id = ?1 AND to_peer = ?2
                         ORDER BY created_at ASC, id ASC"
                    ))?;
                    let rows = stmt.query_map(params![call_id, to_peer], signal_from_row)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete signals created at or before `cutoff`. Returns rows removed.
pub async fn delete_signals_before(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<usize, RinglineError> {
    let cutoff = format_ts(cutoff);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM signals WHERE created_at <= ?1",
                params![cutoff],
            )?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
