// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call table operations.
//!
//! State changes go through `transition_call`, a conditional update keyed
//! on the expected current state. Under a race exactly one writer matches;
//! the loser sees zero rows affected and re-reads the authoritative row.
//! The partial unique index on `pair_key` turns a second live call between
//! the same two peers into a constraint failure at insert.

use chrono::{DateTime, Utc};
use ringline_core::{
    CallSession, CallState, CallType, CallerInfo, RinglineError, SignalMessage, pair_key,
};
use rusqlite::params;

use crate::database::{Database, format_ts, parse_ts};

const CALL_COLUMNS: &str = "call_id, caller_id, callee_id, call_type, state, caller_info, reason, \
                            created_at, answered_at, ended_at";

fn parse_opt_ts(idx: usize, raw: Option<String>) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    match raw {
        Some(s) => Ok(Some(parse_ts(idx, &s)?)),
        None => Ok(None),
    }
}

pub(crate) fn call_from_row(row: &rusqlite::Row<'_>) -> Result<CallSession, rusqlite::Error> {
    let raw_type: String = row.get(3)?;
    let call_type = raw_type.parse::<CallType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_state: String = row.get(4)?;
    let state = raw_state.parse::<CallState>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let raw_info: Option<String> = row.get(5)?;
    let caller_info: Option<CallerInfo> = match raw_info {
        Some(s) => Some(serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    let raw_created: String = row.get(7)?;
    Ok(CallSession {
        call_id: row.get(0)?,
        caller_id: row.get(1)?,
        callee_id: row.get(2)?,
        call_type,
        state,
        caller_info,
        reason: row.get(6)?,
        created_at: parse_ts(7, &raw_created)?,
        answered_at: parse_opt_ts(8, row.get(8)?)?,
        ended_at: parse_opt_ts(9, row.get(9)?)?,
    })
}

fn map_insert_err(err: tokio_rusqlite::Error) -> RinglineError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RinglineError::Conflict("a live call already exists between these peers".to_string())
        }
        other => crate::database::map_tr_err(other),
    }
}

fn execute_insert(conn: &rusqlite::Connection, session: &CallSession) -> Result<(), rusqlite::Error> {
    let key = pair_key(&session.caller_id, &session.callee_id);
    let info = session
        .caller_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(e))
        })?;
    conn.execute(
        "INSERT INTO calls (call_id, caller_id, callee_id, pair_key, call_type, state,
                            caller_info, reason, created_at, answered_at, ended_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            session.call_id,
            session.caller_id,
            session.callee_id,
            key,
            session.call_type.to_string(),
            session.state.to_string(),
            info,
            session.reason,
            format_ts(session.created_at),
            session.answered_at.map(format_ts),
            session.ended_at.map(format_ts),
        ],
    )?;
    Ok(())
}

/// Insert a call session row.
///
/// Fails with `Conflict` when a live call already holds the pair key.
pub async fn insert_call(db: &Database, session: &CallSession) -> Result<(), RinglineError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            execute_insert(conn, &session)?;
            Ok(())
        })
        .await
        .map_err(map_insert_err)
}

/// Insert a ringing session together with its opening offer, atomically.
///
/// When the pair-key constraint rejects the session, the offer is rolled
/// back with it, so a losing initiate leaves no signal behind.
pub async fn create_call_with_offer(
    db: &Database,
    session: &CallSession,
    offer: &SignalMessage,
) -> Result<(), RinglineError> {
    let session = session.clone();
    let offer = offer.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            execute_insert(&tx, &session)?;
            tx.execute(
                "INSERT INTO signals (signal_id, call_id, from_peer, to_peer, kind, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(signal_id) DO NOTHING",
                params![
                    offer.signal_id,
                    offer.call_id,
                    offer.from_peer,
                    offer.to_peer,
                    offer.kind.to_string(),
                    offer.payload.to_string(),
                    format_ts(offer.created_at),
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_insert_err)
}

/// Fetch one call session, if it exists.
pub async fn get_call(db: &Database, call_id: &str) -> Result<Option<CallSession>, RinglineError> {
    let call_id = call_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = {
                let mut stmt = conn
                    .prepare(&format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1"))?;
                stmt.query_row(params![call_id], call_from_row)
            };
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Conditionally move a call from `from` to `to`.
///
/// Returns `true` when this write claimed the transition, `false` when the
/// row was no longer in `from` (some concurrent writer got there first).
/// `reason` is only written when provided; `at` stamps `answered_at` on
/// entry to `active` and `ended_at` on entry to a terminal state.
pub async fn transition_call(
    db: &Database,
    call_id: &str,
    from: CallState,
    to: CallState,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<bool, RinglineError> {
    let call_id = call_id.to_string();
    let reason = reason.map(|s| s.to_string());
    let set_answered = to == CallState::Active;
    let set_ended = to.is_terminal();
    let stamp = format_ts(at);
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE calls SET
                     state = ?2,
                     reason = COALESCE(?3, reason),
                     answered_at = CASE WHEN ?4 THEN ?6 ELSE answered_at END,
                     ended_at = CASE WHEN ?5 THEN ?6 ELSE ended_at END
                 WHERE call_id = ?1 AND state = ?7",
                params![
                    call_id,
                    to.to_string(),
                    reason,
                    set_answered,
                    set_ended,
                    stamp,
                    from.to_string(),
                ],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Ringing sessions created at or before `cutoff`, oldest first.
///
/// This is the ring sweeper's work list.
pub async fn list_expired_ringing(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<CallSession>, RinglineError> {
    let cutoff = format_ts(cutoff);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE state = 'ringing' AND created_at <= ?1
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![cutoff], call_from_row)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Ringing sessions addressed to `callee_id`, oldest first.
pub async fn list_ringing_for_callee(
    db: &Database,
    callee_id: &str,
) -> Result<Vec<CallSession>, RinglineError> {
    let callee_id = callee_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE state = 'ringing' AND callee_id = ?1
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![callee_id], call_from_row)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Sessions where `peer_id` was on either side, newest first.
pub async fn list_calls_for_peer(
    db: &Database,
    peer_id: &str,
    limit: i64,
) -> Result<Vec<CallSession>, RinglineError> {
    let peer_id = peer_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE caller_id = ?1 OR callee_id = ?1
                 ORDER BY created_at DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![peer_id, limit], call_from_row)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete terminal sessions whose end (or creation, for rows that never
/// rang out) is at or before `cutoff`. Returns rows removed.
pub async fn delete_terminal_before(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<usize, RinglineError> {
    let cutoff = format_ts(cutoff);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM calls
                 WHERE state IN ('rejected', 'ended', 'failed', 'timeout')
                   AND COALESCE(ended_at, created_at) <= ?1",
                params![cutoff],
            )?;
            Ok(removed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringline_core::{SignalKind, new_call_id, new_signal_id};
    use serde_json::json;
    use tempfile::tempdir;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_session(caller: &str, callee: &str, state: CallState, at: &str) -> CallSession {
        CallSession {
            call_id: new_call_id(),
            caller_id: caller.to_string(),
            callee_id: callee.to_string(),
            call_type: CallType::Audio,
            state,
            caller_info: None,
            reason: None,
            created_at: ts(at),
            answered_at: None,
            ended_at: None,
        }
    }

    fn make_offer(call_id: &str, from: &str, to: &str, at: &str) -> SignalMessage {
        SignalMessage {
            signal_id: new_signal_id(),
            call_id: call_id.to_string(),
            from_peer: from.to_string(),
            to_peer: to.to_string(),
            kind: SignalKind::Offer,
            payload: json!({"sdp": "v=0"}),
            created_at: ts(at),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let (db, _dir) = setup_db().await;

        let mut session = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        session.call_type = CallType::Video;
        session.caller_info = Some(CallerInfo {
            display_name: Some("Alice".into()),
            avatar_url: Some("https://cdn.example/a.png".into()),
        });
        insert_call(&db, &session).await.unwrap();

        let stored = get_call(&db, &session.call_id).await.unwrap().unwrap();
        assert_eq!(stored.caller_id, "alice");
        assert_eq!(stored.callee_id, "bob");
        assert_eq!(stored.call_type, CallType::Video);
        assert_eq!(stored.state, CallState::Ringing);
        assert_eq!(
            stored.caller_info.unwrap().display_name.as_deref(),
            Some("Alice")
        );
        assert_eq!(stored.created_at, ts("2026-01-01T00:00:01.000Z"));
        assert!(stored.answered_at.is_none());
        assert!(stored.ended_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_call_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_call(&db, "no-such-call").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_live_call_for_pair_conflicts_either_direction() {
        let (db, _dir) = setup_db().await;

        let first = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        insert_call(&db, &first).await.unwrap();

        // Same direction.
        let dup = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:02.000Z");
        let err = insert_call(&db, &dup).await.unwrap_err();
        assert!(matches!(err, RinglineError::Conflict(_)));

        // Reverse direction collides on the same pair key.
        let reverse = make_session("bob", "alice", CallState::Ringing, "2026-01-01T00:00:02.000Z");
        let err = insert_call(&db, &reverse).await.unwrap_err();
        assert!(matches!(err, RinglineError::Conflict(_)));

        // A different pair is unaffected.
        let other = make_session("alice", "carol", CallState::Ringing, "2026-01-01T00:00:02.000Z");
        insert_call(&db, &other).await.unwrap();

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pair_is_free_again_after_terminal_state() {
        let (db, _dir) = setup_db().await;

        let first = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        insert_call(&db, &first).await.unwrap();
        transition_call(
            &db,
            &first.call_id,
            CallState::Ringing,
            CallState::Ended,
            Some("hangup"),
            ts("2026-01-01T00:00:05.000Z"),
        )
        .await
        .unwrap();

        let second = make_session("bob", "alice", CallState::Ringing, "2026-01-01T00:00:10.000Z");
        insert_call(&db, &second).await.unwrap();

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_claims_exactly_once() {
        let (db, _dir) = setup_db().await;

        let session = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        insert_call(&db, &session).await.unwrap();

        let won = transition_call(
            &db,
            &session.call_id,
            CallState::Ringing,
            CallState::Active,
            None,
            ts("2026-01-01T00:00:02.000Z"),
        )
        .await
        .unwrap();
        assert!(won);

        // A late reject expected the ringing state and loses.
        let won = transition_call(
            &db,
            &session.call_id,
            CallState::Ringing,
            CallState::Rejected,
            Some("rejected"),
            ts("2026-01-01T00:00:03.000Z"),
        )
        .await
        .unwrap();
        assert!(!won);

        let stored = get_call(&db, &session.call_id).await.unwrap().unwrap();
        assert_eq!(stored.state, CallState::Active);
        assert!(stored.reason.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_stamps_answer_and_end_times() {
        let (db, _dir) = setup_db().await;

        let session = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        insert_call(&db, &session).await.unwrap();

        transition_call(
            &db,
            &session.call_id,
            CallState::Ringing,
            CallState::Active,
            None,
            ts("2026-01-01T00:00:02.000Z"),
        )
        .await
        .unwrap();
        let stored = get_call(&db, &session.call_id).await.unwrap().unwrap();
        assert_eq!(stored.answered_at, Some(ts("2026-01-01T00:00:02.000Z")));
        assert!(stored.ended_at.is_none());

        transition_call(
            &db,
            &session.call_id,
            CallState::Active,
            CallState::Ended,
            Some("hangup"),
            ts("2026-01-01T00:05:00.000Z"),
        )
        .await
        .unwrap();
        let stored = get_call(&db, &session.call_id).await.unwrap().unwrap();
        assert_eq!(stored.state, CallState::Ended);
        assert_eq!(stored.reason.as_deref(), Some("hangup"));
        assert_eq!(stored.answered_at, Some(ts("2026-01-01T00:00:02.000Z")));
        assert_eq!(stored.ended_at, Some(ts("2026-01-01T00:05:00.000Z")));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_ringing_sweep_selects_only_old_ringing() {
        let (db, _dir) = setup_db().await;

        let old_ringing = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        let fresh_ringing = make_session("carol", "dave", CallState::Ringing, "2026-01-01T00:10:00.000Z");
        let mut old_active = make_session("erin", "frank", CallState::Active, "2026-01-01T00:00:01.000Z");
        old_active.answered_at = Some(ts("2026-01-01T00:00:02.000Z"));

        insert_call(&db, &old_ringing).await.unwrap();
        insert_call(&db, &fresh_ringing).await.unwrap();
        insert_call(&db, &old_active).await.unwrap();

        let expired = list_expired_ringing(&db, ts("2026-01-01T00:05:00.000Z"))
            .await
            .unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].call_id, old_ringing.call_id);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ringing_for_callee_lists_pending_oldest_first() {
        let (db, _dir) = setup_db().await;

        let first = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        let second = make_session("carol", "bob", CallState::Ringing, "2026-01-01T00:00:02.000Z");
        let elsewhere = make_session("dave", "erin", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        insert_call(&db, &first).await.unwrap();
        insert_call(&db, &second).await.unwrap();
        insert_call(&db, &elsewhere).await.unwrap();

        let pending = list_ringing_for_callee(&db, "bob").await.unwrap();
        let ids: Vec<&str> = pending.iter().map(|s| s.call_id.as_str()).collect();
        assert_eq!(ids, vec![first.call_id.as_str(), second.call_id.as_str()]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn calls_for_peer_newest_first_with_limit() {
        let (db, _dir) = setup_db().await;

        let mut ids = Vec::new();
        for i in 1..=4 {
            let peer = format!("peer{i}");
            let mut session = make_session(
                "alice",
                &peer,
                CallState::Ended,
                &format!("2026-01-01T00:00:0{i}.000Z"),
            );
            session.ended_at = Some(ts(&format!("2026-01-01T00:00:0{i}.500Z")));
            insert_call(&db, &session).await.unwrap();
            ids.push(session.call_id);
        }

        let recent = list_calls_for_peer(&db, "alice", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].call_id, ids[3]);
        assert_eq!(recent[1].call_id, ids[2]);

        assert!(list_calls_for_peer(&db, "zoe", 10).await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retention_deletes_only_aged_terminal_rows() {
        let (db, _dir) = setup_db().await;

        let mut old_ended = make_session("alice", "bob", CallState::Ended, "2026-01-01T00:00:01.000Z");
        old_ended.ended_at = Some(ts("2026-01-01T00:01:00.000Z"));
        let mut fresh_ended = make_session("carol", "dave", CallState::Ended, "2026-01-02T00:00:01.000Z");
        fresh_ended.ended_at = Some(ts("2026-01-02T00:01:00.000Z"));
        let old_ringing = make_session("erin", "frank", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        // Failed at initiate, never got an ended_at.
        let old_failed = make_session("gail", "hank", CallState::Failed, "2026-01-01T00:00:01.000Z");

        insert_call(&db, &old_ended).await.unwrap();
        insert_call(&db, &fresh_ended).await.unwrap();
        insert_call(&db, &old_ringing).await.unwrap();
        insert_call(&db, &old_failed).await.unwrap();

        let removed = delete_terminal_before(&db, ts("2026-01-01T12:00:00.000Z"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        assert!(get_call(&db, &old_ended.call_id).await.unwrap().is_none());
        assert!(get_call(&db, &old_failed.call_id).await.unwrap().is_none());
        assert!(get_call(&db, &fresh_ended.call_id).await.unwrap().is_some());
        assert!(get_call(&db, &old_ringing.call_id).await.unwrap().is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_with_offer_writes_both_rows() {
        let (db, _dir) = setup_db().await;

        let session = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        let offer = make_offer(&session.call_id, "alice", "bob", "2026-01-01T00:00:01.000Z");
        create_call_with_offer(&db, &session, &offer).await.unwrap();

        assert!(get_call(&db, &session.call_id).await.unwrap().is_some());
        let signals = crate::queries::signals::poll_since(&db, &session.call_id, "bob", None)
            .await
            .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Offer);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn losing_initiate_leaves_no_offer_behind() {
        let (db, _dir) = setup_db().await;

        let winner = make_session("alice", "bob", CallState::Ringing, "2026-01-01T00:00:01.000Z");
        let winner_offer = make_offer(&winner.call_id, "alice", "bob", "2026-01-01T00:00:01.000Z");
        create_call_with_offer(&db, &winner, &winner_offer)
            .await
            .unwrap();

        let loser = make_session("bob", "alice", CallState::Ringing, "2026-01-01T00:00:02.000Z");
        let loser_offer = make_offer(&loser.call_id, "bob", "alice", "2026-01-01T00:00:02.000Z");
        let err = create_call_with_offer(&db, &loser, &loser_offer)
            .await
            .unwrap_err();
        assert!(matches!(err, RinglineError::Conflict(_)));

        assert!(get_call(&db, &loser.call_id).await.unwrap().is_none());
        let stray = crate::queries::signals::poll_since(&db, &loser.call_id, "alice", None)
            .await
            .unwrap();
        assert!(stray.is_empty());

        db.close().await.unwrap();
    }
}
