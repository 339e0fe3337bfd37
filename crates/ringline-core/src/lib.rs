// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ringline signaling coordinator.
//!
//! This crate provides the error taxonomy, the call state machine, and
//! the shared domain types (presence records, signaling messages, push
//! events) used throughout the Ringline workspace.

pub mod call;
pub mod error;
pub mod presence;
pub mod push;
pub mod signal;

// Re-export key items at crate root for ergonomic imports.
pub use call::{
    CallEvent, CallSession, CallState, CallType, CallerInfo, InvalidTransition, new_call_id,
    pair_key,
};
pub use error::RinglineError;
pub use presence::PresenceRecord;
pub use push::PushEvent;
pub use signal::{SignalKind, SignalMessage, new_signal_id, validate_payload};
