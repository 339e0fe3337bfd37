// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable signal relay with best-effort push.
//!
//! Every message lands in the store first; the push to any live
//! subscription is opportunistic. A recipient that was disconnected picks
//! the message up on its next poll, in creation order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ringline_core::{PushEvent, RinglineError, SignalKind, SignalMessage, new_signal_id};
use ringline_storage::{Database, queries};
use tracing::debug;

use crate::hub::PushHub;

pub struct SignalRelay {
    db: Database,
    hub: Arc<PushHub>,
}

impl SignalRelay {
    pub fn new(db: Database, hub: Arc<PushHub>) -> Self {
        Self { db, hub }
    }

    /// Persist a signaling message and push it to the recipient.
    ///
    /// A caller-supplied `signal_id` makes retries idempotent: the store
    /// absorbs the duplicate and the originally stored row is returned
    /// (and is the one pushed).
    pub async fn send(
        &self,
        call_id: &str,
        from_peer: &str,
        to_peer: &str,
        kind: SignalKind,
        payload: serde_json::Value,
        signal_id: Option<String>,
    ) -> Result<SignalMessage, RinglineError> {
        for (name, value) in [
            ("callId", call_id),
            ("fromPeer", from_peer),
            ("toPeer", to_peer),
        ] {
            if value.trim().is_empty() {
                return Err(RinglineError::Validation(format!(
                    "{name} must not be blank"
                )));
            }
        }

        let message = SignalMessage {
            signal_id: signal_id.unwrap_or_else(new_signal_id),
            call_id: call_id.to_string(),
            from_peer: from_peer.to_string(),
            to_peer: to_peer.to_string(),
            kind,
            payload,
            created_at: Utc::now(),
        };

        let stored = queries::signals::insert_signal(&self.db, &message).await?;
        self.push_now(
            to_peer,
            PushEvent::Signal {
                message: stored.clone(),
            },
        );
        Ok(stored)
    }

    /// Messages addressed to `recipient` for `call_id`, strictly after
    /// `since`, oldest first.
    pub async fn poll_since(
        &self,
        call_id: &str,
        recipient: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SignalMessage>, RinglineError> {
        if call_id.trim().is_empty() {
            return Err(RinglineError::Validation("callId must not be blank".into()));
        }
        if recipient.trim().is_empty() {
            return Err(RinglineError::Validation(
                "recipient must not be blank".into(),
            ));
        }
        queries::signals::poll_since(&self.db, call_id, recipient, since).await
    }

    /// Best-effort real-time delivery. A miss is not an error; the poll
    /// path compensates.
    pub fn push_now(&self, recipient: &str, event: PushEvent) {
        let delivered = self.hub.publish(recipient, event);
        if delivered == 0 {
            debug!(recipient, "no live push subscription, poll will deliver");
        }
    }
}
