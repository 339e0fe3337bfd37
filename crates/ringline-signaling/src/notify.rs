// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification dispatch for call lifecycle events.
//!
//! Translates call state machine outcomes into push frames. Delivery-only:
//! this type never mutates call state, and a missed push is compensated by
//! the poll path and the pending-calls listing.

use std::sync::Arc;

use ringline_core::{CallSession, PushEvent};
use tracing::debug;

use crate::hub::PushHub;

#[derive(Clone)]
pub struct Notifier {
    hub: Arc<PushHub>,
}

impl Notifier {
    pub fn new(hub: Arc<PushHub>) -> Self {
        Self { hub }
    }

    /// Push the incoming-call event to the callee.
    pub fn notify_incoming(&self, session: &CallSession) {
        let delivered = self.hub.publish(
            &session.callee_id,
            PushEvent::IncomingCall {
                call: session.clone(),
            },
        );
        if delivered == 0 {
            debug!(
                call_id = %session.call_id,
                callee = %session.callee_id,
                "callee has no live push subscription, banner arrives via poll"
            );
        }
    }

    /// Push the session's current state to both participants.
    pub fn notify_state_change(&self, session: &CallSession) {
        let event = PushEvent::CallState {
            call_id: session.call_id.clone(),
            state: session.state,
            reason: session.reason.clone(),
        };
        for peer in [&session.caller_id, &session.callee_id] {
            self.hub.publish(peer, event.clone());
        }
    }
}
