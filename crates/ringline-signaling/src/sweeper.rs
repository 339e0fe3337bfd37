// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ring-timeout sweeper.
//!
//! Ringing calls carry no timers of their own. This sweeper scans for
//! rings older than the configured window and drives each through the
//! coordinator's timeout transition, so a crashed or restarted server
//! still times out calls that were ringing when it went down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ringline_config::model::CallsConfig;
use ringline_core::RinglineError;
use ringline_storage::{Database, queries};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::CallCoordinator;

pub struct RingSweeper {
    config: CallsConfig,
    db: Database,
    coordinator: Arc<CallCoordinator>,
}

impl RingSweeper {
    pub fn new(config: CallsConfig, db: Database, coordinator: Arc<CallCoordinator>) -> Self {
        Self {
            config,
            db,
            coordinator,
        }
    }

    /// Run sweep passes until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        info!(
            interval_secs = period.as_secs(),
            ring_window_secs = self.config.ring_window_secs,
            "ring sweeper running"
        );

        let mut interval = tokio::time::interval(period);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "ring sweep failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping ring sweeper");
                    return;
                }
            }
        }
    }

    /// One sweep pass. Returns how many rings were timed out.
    ///
    /// A ring that resolves between the scan and the claim is skipped:
    /// the conditional transition loses and the coordinator reports the
    /// state it found instead.
    pub async fn sweep_once(&self) -> Result<usize, RinglineError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.ring_window_secs as i64);
        let expired = queries::calls::list_expired_ringing(&self.db, cutoff).await?;

        let mut timed_out = 0;
        for session in expired {
            match self.coordinator.ring_timeout(&session.call_id).await {
                Ok(_) => timed_out += 1,
                Err(RinglineError::InvalidState { .. }) | Err(RinglineError::CallNotFound(_)) => {
                    debug!(call_id = %session.call_id, "ring resolved before the sweep claimed it");
                }
                Err(e) => return Err(e),
            }
        }

        if timed_out > 0 {
            info!(timed_out, "rings timed out");
        }
        Ok(timed_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::PushHub;
    use crate::notify::Notifier;
    use crate::presence::PresenceTracker;
    use crate::relay::SignalRelay;
    use ringline_config::model::PresenceConfig;
    use ringline_core::{CallState, CallType, PushEvent, SignalKind};
    use tempfile::tempdir;

    struct Stack {
        sweeper: RingSweeper,
        coordinator: Arc<CallCoordinator>,
        presence: Arc<PresenceTracker>,
        relay: Arc<SignalRelay>,
        hub: Arc<PushHub>,
        db: Database,
    }

    /// A zero-second ring window makes every ringing call expired on the
    /// next pass, so tests never sleep.
    async fn setup(ring_window_secs: u64) -> (Stack, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let hub = Arc::new(PushHub::new());
        let presence = Arc::new(PresenceTracker::new(db.clone(), &PresenceConfig::default()));
        let relay = Arc::new(SignalRelay::new(db.clone(), Arc::clone(&hub)));
        let notifier = Notifier::new(Arc::clone(&hub));
        let coordinator = Arc::new(CallCoordinator::new(
            db.clone(),
            Arc::clone(&presence),
            Arc::clone(&relay),
            notifier,
        ));
        let config = CallsConfig {
            ring_window_secs,
            sweep_interval_secs: 1,
        };
        let sweeper = RingSweeper::new(config, db.clone(), Arc::clone(&coordinator));
        (
            Stack {
                sweeper,
                coordinator,
                presence,
                relay,
                hub,
                db,
            },
            dir,
        )
    }

    #[tokio::test]
    async fn expired_ring_times_out_and_notifies_both_sides() {
        let (stack, _dir) = setup(0).await;
        stack.presence.mark_online("bob").await.unwrap();
        let mut alice_rx = stack.hub.subscribe("alice");

        let session = stack
            .coordinator
            .initiate("alice", "bob", CallType::Audio, None, None)
            .await
            .unwrap();

        let timed_out = stack.sweeper.sweep_once().await.unwrap();
        assert_eq!(timed_out, 1);

        let swept = stack
            .coordinator
            .fetch(&session.call_id, "alice")
            .await
            .unwrap();
        assert_eq!(swept.state, CallState::Timeout);
        assert_eq!(swept.reason.as_deref(), Some("no answer"));
        assert!(swept.ended_at.is_some());

        // The callee's stale banner is cleared by an end signal.
        let for_bob = stack
            .relay
            .poll_since(&session.call_id, "bob", None)
            .await
            .unwrap();
        let end = for_bob.last().unwrap();
        assert_eq!(end.kind, SignalKind::End);
        assert_eq!(end.payload, serde_json::json!({"reason": "no answer"}));

        // The caller observes the timeout as a state change.
        let mut saw_timeout = false;
        while let Ok(event) = alice_rx.try_recv() {
            if let PushEvent::CallState { state, reason, .. } = event {
                assert_eq!(state, CallState::Timeout);
                assert_eq!(reason.as_deref(), Some("no answer"));
                saw_timeout = true;
            }
        }
        assert!(saw_timeout);

        stack.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fresh_rings_are_left_alone() {
        let (stack, _dir) = setup(30).await;
        stack.presence.mark_online("bob").await.unwrap();

        let session = stack
            .coordinator
            .initiate("alice", "bob", CallType::Video, None, None)
            .await
            .unwrap();

        let timed_out = stack.sweeper.sweep_once().await.unwrap();
        assert_eq!(timed_out, 0);
        let untouched = stack
            .coordinator
            .fetch(&session.call_id, "alice")
            .await
            .unwrap();
        assert_eq!(untouched.state, CallState::Ringing);

        stack.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn answered_calls_are_not_swept() {
        let (stack, _dir) = setup(0).await;
        stack.presence.mark_online("bob").await.unwrap();

        let session = stack
            .coordinator
            .initiate("alice", "bob", CallType::Audio, None, None)
            .await
            .unwrap();
        stack
            .coordinator
            .accept(&session.call_id, "bob", None)
            .await
            .unwrap();

        let timed_out = stack.sweeper.sweep_once().await.unwrap();
        assert_eq!(timed_out, 0);
        let active = stack
            .coordinator
            .fetch(&session.call_id, "alice")
            .await
            .unwrap();
        assert_eq!(active.state, CallState::Active);

        stack.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sweep_with_nothing_pending_is_a_noop() {
        let (stack, _dir) = setup(0).await;
        assert_eq!(stack.sweeper.sweep_once().await.unwrap(), 0);
        stack.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancellation() {
        let (stack, _dir) = setup(0).await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(stack.sweeper.run(cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();

        stack.db.close().await.unwrap();
    }
}
