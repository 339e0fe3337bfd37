// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aged-row cleanup.
//!
//! Signals are transport, not history: once both sides have long since
//! polled them they are dead weight. Terminal call rows are kept longer
//! for the recent-calls listing, then dropped too.

use std::time::Duration;

use chrono::Utc;
use ringline_config::model::RetentionConfig;
use ringline_core::RinglineError;
use ringline_storage::{Database, queries};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct RetentionSweeper {
    config: RetentionConfig,
    db: Database,
}

impl RetentionSweeper {
    pub fn new(config: RetentionConfig, db: Database) -> Self {
        Self { config, db }
    }

    /// Run cleanup passes until cancelled. Returns immediately when
    /// retention is disabled.
    pub async fn run(self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("retention sweeper disabled");
            return;
        }
        let period = Duration::from_secs(self.config.interval_secs.max(1));
        info!(
            interval_secs = period.as_secs(),
            signal_ttl_secs = self.config.signal_ttl_secs,
            call_history_ttl_secs = self.config.call_history_ttl_secs,
            "retention sweeper running"
        );

        let mut interval = tokio::time::interval(period);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "retention sweep failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping retention sweeper");
                    return;
                }
            }
        }
    }

    /// One cleanup pass. Returns (signals removed, call rows removed).
    pub async fn sweep_once(&self) -> Result<(usize, usize), RinglineError> {
        let now = Utc::now();
        let signal_cutoff = now - chrono::Duration::seconds(self.config.signal_ttl_secs as i64);
        let call_cutoff = now - chrono::Duration::seconds(self.config.call_history_ttl_secs as i64);

        let signals_removed =
            queries::signals::delete_signals_before(&self.db, signal_cutoff).await?;
        let calls_removed = queries::calls::delete_terminal_before(&self.db, call_cutoff).await?;

        if signals_removed > 0 || calls_removed > 0 {
            info!(signals_removed, calls_removed, "aged rows removed");
        } else {
            debug!("retention sweep found nothing to remove");
        }
        Ok((signals_removed, calls_removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringline_core::{
        CallSession, CallState, CallType, SignalKind, SignalMessage, new_call_id, new_signal_id,
    };
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn aged_signal(age_secs: i64) -> SignalMessage {
        SignalMessage {
            signal_id: new_signal_id(),
            call_id: "c1".into(),
            from_peer: "alice".into(),
            to_peer: "bob".into(),
            kind: SignalKind::IceCandidate,
            payload: serde_json::json!({"candidate": "candidate:0"}),
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    fn terminal_call(age_secs: i64) -> CallSession {
        let created = Utc::now() - chrono::Duration::seconds(age_secs);
        CallSession {
            call_id: new_call_id(),
            caller_id: "alice".into(),
            callee_id: "bob".into(),
            call_type: CallType::Audio,
            state: CallState::Ended,
            caller_info: None,
            reason: Some("hangup".into()),
            created_at: created,
            answered_at: Some(created),
            ended_at: Some(created),
        }
    }

    #[tokio::test]
    async fn removes_only_rows_past_their_ttl() {
        let (db, _dir) = setup().await;

        queries::signals::insert_signal(&db, &aged_signal(7200))
            .await
            .unwrap();
        queries::signals::insert_signal(&db, &aged_signal(10))
            .await
            .unwrap();
        let old_call = terminal_call(7200);
        let fresh_call = terminal_call(10);
        queries::calls::insert_call(&db, &old_call).await.unwrap();
        queries::calls::insert_call(&db, &fresh_call).await.unwrap();

        let config = RetentionConfig {
            enabled: true,
            interval_secs: 3600,
            signal_ttl_secs: 3600,
            call_history_ttl_secs: 3600,
        };
        let sweeper = RetentionSweeper::new(config, db.clone());
        let (signals_removed, calls_removed) = sweeper.sweep_once().await.unwrap();
        assert_eq!(signals_removed, 1);
        assert_eq!(calls_removed, 1);

        assert!(
            queries::calls::get_call(&db, &old_call.call_id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            queries::calls::get_call(&db, &fresh_call.call_id)
                .await
                .unwrap()
                .is_some()
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn live_calls_survive_any_ttl() {
        let (db, _dir) = setup().await;

        let mut ringing = terminal_call(7200);
        ringing.state = CallState::Ringing;
        ringing.reason = None;
        ringing.ended_at = None;
        queries::calls::insert_call(&db, &ringing).await.unwrap();

        let config = RetentionConfig {
            enabled: true,
            interval_secs: 3600,
            signal_ttl_secs: 1,
            call_history_ttl_secs: 1,
        };
        let sweeper = RetentionSweeper::new(config, db.clone());
        let (_, calls_removed) = sweeper.sweep_once().await.unwrap();
        assert_eq!(calls_removed, 0);
        assert!(
            queries::calls::get_call(&db, &ringing.call_id)
                .await
                .unwrap()
                .is_some()
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_sweeper_exits_without_touching_rows() {
        let (db, _dir) = setup().await;
        queries::signals::insert_signal(&db, &aged_signal(7200))
            .await
            .unwrap();

        let config = RetentionConfig {
            enabled: false,
            interval_secs: 1,
            signal_ttl_secs: 1,
            call_history_ttl_secs: 1,
        };
        let sweeper = RetentionSweeper::new(config, db.clone());
        // run() returns immediately when disabled, even with no cancel.
        sweeper.run(CancellationToken::new()).await;

        let remaining = queries::signals::poll_since(&db, "c1", "bob", None)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancellation() {
        let (db, _dir) = setup().await;
        let sweeper = RetentionSweeper::new(RetentionConfig::default(), db.clone());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("retention sweeper did not stop")
            .unwrap();

        db.close().await.unwrap();
    }
}
