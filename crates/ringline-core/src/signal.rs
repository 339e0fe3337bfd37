// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signaling message types.
//!
//! A `SignalMessage` is immutable once created: the sender writes it,
//! the recipient reads it via poll or push, nobody updates it. The
//! `signal_id` is the idempotency key that makes duplicate delivery
//! across the push and poll paths safe to reconcile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RinglineError;

/// Kind of signaling traffic carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// Session description opening a negotiation.
    Offer,
    /// Session description answering an offer.
    Answer,
    /// A network path candidate.
    IceCandidate,
    /// Call teardown marker.
    End,
}

/// One unit of signaling traffic between two peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    /// Idempotency key; unique per message.
    pub signal_id: String,
    pub call_id: String,
    pub from_peer: String,
    pub to_peer: String,
    pub kind: SignalKind,
    /// Session description or ICE candidate structure; opaque beyond
    /// the per-kind shape check at the boundary.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Mint a new signal id.
pub fn new_signal_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validate that a payload has the minimal shape its kind requires.
///
/// Offers and answers must carry an SDP body, candidates a candidate
/// string. `end` takes an optional reason and is otherwise free-form.
pub fn validate_payload(kind: SignalKind, payload: &serde_json::Value) -> Result<(), RinglineError> {
    match kind {
        SignalKind::Offer | SignalKind::Answer => {
            if payload.get("sdp").and_then(|v| v.as_str()).is_none() {
                return Err(RinglineError::Validation(format!(
                    "{kind} payload must carry an `sdp` string"
                )));
            }
        }
        SignalKind::IceCandidate => {
            if payload.get("candidate").and_then(|v| v.as_str()).is_none() {
                return Err(RinglineError::Validation(
                    "ice-candidate payload must carry a `candidate` string".to_string(),
                ));
            }
        }
        SignalKind::End => {}
    }
    Ok(())
}
