// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call session types and the per-call state machine.
//!
//! The transition table here is pure: it decides which moves are legal
//! and what the resulting state is. Persisting a transition is the
//! storage layer's job, done with conditional updates so concurrent
//! accept/reject races resolve to exactly one winner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Media type requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

/// State of a call attempt.
///
/// `Accepted` is transient: an accept passes through it and lands on
/// `Active` in the same operation. The stored state is always the
/// landing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// Callee notified, awaiting response.
    Ringing,
    /// Callee accepted; media setup in flight.
    Accepted,
    /// Call established.
    Active,
    /// Callee declined (terminal).
    Rejected,
    /// Hung up or cancelled (terminal).
    Ended,
    /// Callee unreachable at initiate (terminal).
    Failed,
    /// Ring window elapsed without a response (terminal).
    Timeout,
}

impl CallState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Ended | Self::Failed | Self::Timeout
        )
    }

    /// ICE candidates may only flow while negotiation or media is live.
    pub fn allows_ice(&self) -> bool {
        matches!(self, Self::Ringing | Self::Active)
    }

    /// Apply an event to this state, yielding the next state.
    ///
    /// Any event applied to a terminal state is rejected, which is what
    /// makes duplicate or late network messages idempotent no-ops.
    pub fn apply(self, event: CallEvent) -> Result<CallState, InvalidTransition> {
        match (self, event) {
            (Self::Ringing, CallEvent::Accept) => Ok(Self::Accepted),
            (Self::Accepted, CallEvent::Connect) => Ok(Self::Active),
            (Self::Ringing, CallEvent::Reject) => Ok(Self::Rejected),
            // Hangup while ringing is the caller cancelling the attempt.
            (Self::Ringing, CallEvent::Hangup) => Ok(Self::Ended),
            (Self::Active, CallEvent::Hangup) => Ok(Self::Ended),
            (Self::Accepted, CallEvent::Hangup) => Ok(Self::Ended),
            (Self::Ringing, CallEvent::RingExpired) => Ok(Self::Timeout),
            (current, attempted) => Err(InvalidTransition { current, attempted }),
        }
    }
}

/// Events that drive the call state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// Callee picked up.
    Accept,
    /// Media setup completed; follows `Accept` immediately.
    Connect,
    /// Callee declined.
    Reject,
    /// Either participant tore the call down.
    Hangup,
    /// The ring window elapsed without a response.
    RingExpired,
}

/// A transition that the state machine does not permit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub current: CallState,
    pub attempted: CallEvent,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "event {:?} not permitted in state {}",
            self.attempted, self.current
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Well-known values for `CallSession::reason`.
pub mod reason {
    pub const NO_ANSWER: &str = "no answer";
    pub const CALLEE_OFFLINE: &str = "callee offline";
    pub const REJECTED: &str = "rejected";
    pub const HANGUP: &str = "hangup";
    pub const CANCELLED: &str = "cancelled";
}

/// Display details the caller attaches so the callee's incoming-call
/// banner can render without a profile lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerInfo {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One call attempt between two peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub call_id: String,
    pub caller_id: String,
    pub callee_id: String,
    pub call_type: CallType,
    pub state: CallState,
    #[serde(default)]
    pub caller_info: Option<CallerInfo>,
    /// Why the call reached a terminal state, when it has.
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallSession {
    /// Whether the given peer is one of the two participants.
    pub fn has_participant(&self, peer_id: &str) -> bool {
        self.caller_id == peer_id || self.callee_id == peer_id
    }

    /// The participant on the other side of `peer_id`.
    pub fn other_participant(&self, peer_id: &str) -> &str {
        if self.caller_id == peer_id {
            &self.callee_id
        } else {
            &self.caller_id
        }
    }
}

/// Canonical key for the unordered peer pair, used by the storage layer
/// to enforce the single-active-call-per-pair rule in either direction.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

/// Mint a new call id.
pub fn new_call_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
