// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call lifecycle orchestration.
//!
//! The coordinator drives the pure transition table in `ringline-core`
//! through the storage layer's conditional updates. Every state change is
//! one CAS statement; when it claims zero rows some concurrent writer won,
//! and the loser is handed the authoritative state as `InvalidState`.

use std::sync::Arc;

use chrono::Utc;
use ringline_core::call::reason;
use ringline_core::{
    CallEvent, CallSession, CallState, CallType, CallerInfo, PushEvent, RinglineError, SignalKind,
    SignalMessage, new_call_id, new_signal_id, validate_payload,
};
use ringline_storage::{Database, queries};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::notify::Notifier;
use crate::presence::PresenceTracker;
use crate::relay::SignalRelay;

/// History rows returned per peer by the overview listing.
const RECENT_CALLS_LIMIT: i64 = 20;

/// Pending and recent calls for one peer.
#[derive(Debug, Serialize)]
pub struct CallOverview {
    /// Ringing calls addressed to the peer, oldest first. The poll
    /// fallback for the incoming-call banner.
    pub pending: Vec<CallSession>,
    /// Calls the peer took part in, newest first.
    pub recent: Vec<CallSession>,
}

pub struct CallCoordinator {
    db: Database,
    presence: Arc<PresenceTracker>,
    relay: Arc<SignalRelay>,
    notifier: Notifier,
}

impl CallCoordinator {
    pub fn new(
        db: Database,
        presence: Arc<PresenceTracker>,
        relay: Arc<SignalRelay>,
        notifier: Notifier,
    ) -> Self {
        Self {
            db,
            presence,
            relay,
            notifier,
        }
    }

    /// Start a call attempt from `caller` to `callee`.
    ///
    /// An unreachable callee fails the attempt immediately: the session is
    /// recorded as `failed` for history, no offer is written, and the
    /// caller gets `Unreachable`. Otherwise the ringing session and its
    /// offer are inserted in one transaction, the callee is notified, and
    /// the ring deadline is left to the sweeper.
    ///
    /// `offer` is the caller's session description when it already has
    /// one; without it the stored offer is a bare invitation carrying the
    /// call type.
    pub async fn initiate(
        &self,
        caller: &str,
        callee: &str,
        call_type: CallType,
        caller_info: Option<CallerInfo>,
        offer: Option<Value>,
    ) -> Result<CallSession, RinglineError> {
        if caller.trim().is_empty() || callee.trim().is_empty() {
            return Err(RinglineError::Validation(
                "caller and callee ids must not be blank".into(),
            ));
        }
        if caller == callee {
            return Err(RinglineError::Validation(
                "caller and callee must be different peers".into(),
            ));
        }
        let offer_payload = match offer {
            Some(payload) => {
                validate_payload(SignalKind::Offer, &payload)?;
                payload
            }
            None => json!({ "callType": call_type }),
        };

        if !self.presence.is_reachable(callee).await {
            let now = Utc::now();
            let failed = CallSession {
                call_id: new_call_id(),
                caller_id: caller.to_string(),
                callee_id: callee.to_string(),
                call_type,
                state: CallState::Failed,
                caller_info,
                reason: Some(reason::CALLEE_OFFLINE.to_string()),
                created_at: now,
                answered_at: None,
                ended_at: Some(now),
            };
            // History only; losing this row must not mask the real outcome.
            if let Err(e) = queries::calls::insert_call(&self.db, &failed).await {
                warn!(caller, callee, error = %e, "could not record failed call attempt");
            }
            return Err(RinglineError::Unreachable {
                peer_id: callee.to_string(),
            });
        }

        let session = CallSession {
            call_id: new_call_id(),
            caller_id: caller.to_string(),
            callee_id: callee.to_string(),
            call_type,
            state: CallState::Ringing,
            caller_info,
            reason: None,
            created_at: Utc::now(),
            answered_at: None,
            ended_at: None,
        };
        let offer_message = SignalMessage {
            signal_id: new_signal_id(),
            call_id: session.call_id.clone(),
            from_peer: caller.to_string(),
            to_peer: callee.to_string(),
            kind: SignalKind::Offer,
            payload: offer_payload,
            created_at: session.created_at,
        };
        queries::calls::create_call_with_offer(&self.db, &session, &offer_message).await?;

        self.notifier.notify_incoming(&session);
        self.relay.push_now(
            callee,
            PushEvent::Signal {
                message: offer_message,
            },
        );
        Ok(session)
    }

    /// Callee picks up. Lands on `active` (the `accepted` hop is
    /// transient) and relays the answer to the caller.
    pub async fn accept(
        &self,
        call_id: &str,
        peer: &str,
        answer: Option<Value>,
    ) -> Result<CallSession, RinglineError> {
        let session = self.require_session(call_id).await?;
        if session.callee_id != peer {
            return Err(RinglineError::CallNotFound(call_id.to_string()));
        }
        let next = session
            .state
            .apply(CallEvent::Accept)
            .and_then(|s| s.apply(CallEvent::Connect))
            .map_err(|e| RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: e.current,
            })?;
        let answer_payload = match answer {
            Some(payload) => {
                validate_payload(SignalKind::Answer, &payload)?;
                payload
            }
            None => json!({ "accepted": true }),
        };

        let won = queries::calls::transition_call(
            &self.db,
            call_id,
            session.state,
            next,
            None,
            Utc::now(),
        )
        .await?;
        if !won {
            return Err(self.authoritative_invalid_state(call_id).await);
        }

        self.relay
            .send(
                call_id,
                &session.callee_id,
                &session.caller_id,
                SignalKind::Answer,
                answer_payload,
                None,
            )
            .await?;

        let updated = self.require_session(call_id).await?;
        self.notifier.notify_state_change(&updated);
        Ok(updated)
    }

    /// Callee declines. Terminal; the caller receives an `end` signal.
    pub async fn reject(&self, call_id: &str, peer: &str) -> Result<CallSession, RinglineError> {
        let session = self.require_session(call_id).await?;
        if session.callee_id != peer {
            return Err(RinglineError::CallNotFound(call_id.to_string()));
        }
        let next = session
            .state
            .apply(CallEvent::Reject)
            .map_err(|e| RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: e.current,
            })?;

        let won = queries::calls::transition_call(
            &self.db,
            call_id,
            session.state,
            next,
            Some(reason::REJECTED),
            Utc::now(),
        )
        .await?;
        if !won {
            return Err(self.authoritative_invalid_state(call_id).await);
        }

        self.relay
            .send(
                call_id,
                &session.callee_id,
                &session.caller_id,
                SignalKind::End,
                json!({ "reason": reason::REJECTED }),
                None,
            )
            .await?;

        let updated = self.require_session(call_id).await?;
        self.notifier.notify_state_change(&updated);
        Ok(updated)
    }

    /// Either participant tears the call down. From `ringing` only the
    /// caller may do this (a cancel); the callee's options while ringing
    /// are accept or reject.
    pub async fn hangup(&self, call_id: &str, peer: &str) -> Result<CallSession, RinglineError> {
        let session = self.require_session(call_id).await?;
        if !session.has_participant(peer) {
            return Err(RinglineError::CallNotFound(call_id.to_string()));
        }
        if session.state == CallState::Ringing && peer != session.caller_id {
            return Err(RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: session.state,
            });
        }
        let next = session
            .state
            .apply(CallEvent::Hangup)
            .map_err(|e| RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: e.current,
            })?;
        let end_reason = if session.state == CallState::Ringing {
            reason::CANCELLED
        } else {
            reason::HANGUP
        };

        let won = queries::calls::transition_call(
            &self.db,
            call_id,
            session.state,
            next,
            Some(end_reason),
            Utc::now(),
        )
        .await?;
        if !won {
            return Err(self.authoritative_invalid_state(call_id).await);
        }

        let other = session.other_participant(peer).to_string();
        self.relay
            .send(
                call_id,
                peer,
                &other,
                SignalKind::End,
                json!({ "reason": end_reason }),
                None,
            )
            .await?;

        let updated = self.require_session(call_id).await?;
        self.notifier.notify_state_change(&updated);
        Ok(updated)
    }

    /// The ring window elapsed without a response. Sweeper-driven,
    /// equivalent to an automatic reject: the callee gets an `end` signal
    /// so a late client clears its banner, and the caller observes
    /// "no answer" through the state change.
    pub async fn ring_timeout(&self, call_id: &str) -> Result<CallSession, RinglineError> {
        let session = self.require_session(call_id).await?;
        let next = session
            .state
            .apply(CallEvent::RingExpired)
            .map_err(|e| RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: e.current,
            })?;

        let won = queries::calls::transition_call(
            &self.db,
            call_id,
            session.state,
            next,
            Some(reason::NO_ANSWER),
            Utc::now(),
        )
        .await?;
        if !won {
            return Err(self.authoritative_invalid_state(call_id).await);
        }

        self.relay
            .send(
                call_id,
                &session.caller_id,
                &session.callee_id,
                SignalKind::End,
                json!({ "reason": reason::NO_ANSWER }),
                None,
            )
            .await?;

        let updated = self.require_session(call_id).await?;
        self.notifier.notify_state_change(&updated);
        Ok(updated)
    }

    /// Forward an ICE candidate to the other participant. Legal only
    /// while negotiation or media is live; never a state transition.
    pub async fn relay_ice_candidate(
        &self,
        call_id: &str,
        from: &str,
        candidate: Value,
    ) -> Result<SignalMessage, RinglineError> {
        let session = self.require_session(call_id).await?;
        if !session.has_participant(from) {
            return Err(RinglineError::CallNotFound(call_id.to_string()));
        }
        if !session.state.allows_ice() {
            return Err(RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: session.state,
            });
        }
        validate_payload(SignalKind::IceCandidate, &candidate)?;

        let to = session.other_participant(from).to_string();
        self.relay
            .send(call_id, from, &to, SignalKind::IceCandidate, candidate, None)
            .await
    }

    /// Store-and-forward for client-originated signaling messages.
    ///
    /// The sender must participate in the call and the target must be the
    /// other participant. ICE candidates additionally require a live
    /// negotiation, same as [`relay_ice_candidate`].
    ///
    /// [`relay_ice_candidate`]: Self::relay_ice_candidate
    pub async fn send_signal(
        &self,
        call_id: &str,
        from: &str,
        to: &str,
        kind: SignalKind,
        payload: Value,
        signal_id: Option<String>,
    ) -> Result<SignalMessage, RinglineError> {
        let session = self.require_session(call_id).await?;
        if !session.has_participant(from) {
            return Err(RinglineError::CallNotFound(call_id.to_string()));
        }
        if to != session.other_participant(from) {
            return Err(RinglineError::Validation(
                "targetUserId must be the other call participant".into(),
            ));
        }
        if kind == SignalKind::IceCandidate && !session.state.allows_ice() {
            return Err(RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: session.state,
            });
        }
        validate_payload(kind, &payload)?;

        self.relay
            .send(call_id, from, to, kind, payload, signal_id)
            .await
    }

    /// Pending and recent calls for `peer`.
    pub async fn list_for_peer(&self, peer: &str) -> Result<CallOverview, RinglineError> {
        let pending = queries::calls::list_ringing_for_callee(&self.db, peer).await?;
        let recent = queries::calls::list_calls_for_peer(&self.db, peer, RECENT_CALLS_LIMIT).await?;
        Ok(CallOverview { pending, recent })
    }

    /// Fetch one session; participants only.
    pub async fn fetch(&self, call_id: &str, peer: &str) -> Result<CallSession, RinglineError> {
        let session = self.require_session(call_id).await?;
        if !session.has_participant(peer) {
            return Err(RinglineError::CallNotFound(call_id.to_string()));
        }
        Ok(session)
    }

    async fn require_session(&self, call_id: &str) -> Result<CallSession, RinglineError> {
        queries::calls::get_call(&self.db, call_id)
            .await?
            .ok_or_else(|| RinglineError::CallNotFound(call_id.to_string()))
    }

    /// Build the race loser's error from the freshly-read row.
    async fn authoritative_invalid_state(&self, call_id: &str) -> RinglineError {
        match queries::calls::get_call(&self.db, call_id).await {
            Ok(Some(current)) => RinglineError::InvalidState {
                call_id: call_id.to_string(),
                state: current.state,
            },
            Ok(None) => RinglineError::CallNotFound(call_id.to_string()),
            Err(e) => e,
        }
    }
}
