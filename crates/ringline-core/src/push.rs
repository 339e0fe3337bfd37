// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events delivered over the best-effort push channel.
//!
//! Push frames carry the same ids as the durable rows they mirror
//! (`signal_id`, `call_id`), so a client receiving both the push and
//! the polled row can drop the duplicate.

use serde::{Deserialize, Serialize};

use crate::call::{CallSession, CallState};
use crate::signal::SignalMessage;

/// One frame on a peer's push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// A call is ringing for the subscriber.
    IncomingCall { call: CallSession },
    /// A call the subscriber participates in changed state.
    CallState {
        call_id: String,
        state: CallState,
        #[serde(default)]
        reason: Option<String>,
    },
    /// A signaling message addressed to the subscriber.
    Signal { message: SignalMessage },
}
