// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence tracking over the durable store.
//!
//! Reachability is read-side: a record that claims to be online but has
//! not been refreshed within the staleness window reads as offline, so a
//! peer that vanished without a mark-offline stops receiving calls once
//! the window lapses.

use chrono::{Duration, Utc};
use ringline_config::model::PresenceConfig;
use ringline_core::{PresenceRecord, RinglineError};
use ringline_storage::{Database, queries};
use tracing::warn;

pub struct PresenceTracker {
    db: Database,
    staleness: Duration,
}

impl PresenceTracker {
    pub fn new(db: Database, config: &PresenceConfig) -> Self {
        Self {
            db,
            staleness: Duration::seconds(config.staleness_secs as i64),
        }
    }

    /// Record that `peer_id` is reachable now. Idempotent.
    pub async fn mark_online(&self, peer_id: &str) -> Result<(), RinglineError> {
        self.upsert(peer_id, true).await
    }

    /// Record that `peer_id` went away.
    pub async fn mark_offline(&self, peer_id: &str) -> Result<(), RinglineError> {
        self.upsert(peer_id, false).await
    }

    /// Periodic keep-alive from an active client. Same write as
    /// `mark_online`; kept as a distinct verb for the HTTP surface.
    pub async fn heartbeat(&self, peer_id: &str) -> Result<(), RinglineError> {
        self.upsert(peer_id, true).await
    }

    async fn upsert(&self, peer_id: &str, is_online: bool) -> Result<(), RinglineError> {
        if peer_id.trim().is_empty() {
            return Err(RinglineError::Validation("peer id must not be blank".into()));
        }
        queries::presence::upsert_status(&self.db, peer_id, is_online, Utc::now()).await
    }

    /// Whether `peer_id` counts as reachable right now.
    ///
    /// Read failures degrade to `false`: presence must never wedge a call
    /// attempt, and an unknown callee fails the call immediately rather
    /// than ringing into the void.
    pub async fn is_reachable(&self, peer_id: &str) -> bool {
        match queries::presence::get_presence(&self.db, peer_id).await {
            Ok(Some(record)) => record.is_reachable_at(Utc::now(), self.staleness),
            Ok(None) => false,
            Err(e) => {
                warn!(peer_id, error = %e, "presence read failed, treating peer as offline");
                false
            }
        }
    }

    /// Peers currently online (staleness filtered), most recently seen
    /// first, excluding the requester.
    pub async fn list_online(
        &self,
        exclude: Option<&str>,
    ) -> Result<Vec<PresenceRecord>, RinglineError> {
        let cutoff = Utc::now() - self.staleness;
        queries::presence::list_online(&self.db, exclude, cutoff).await
    }
}
