// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Ringline signaling coordinator.

use thiserror::Error;

use crate::call::CallState;

/// The primary error type used across all Ringline components.
#[derive(Debug, Error)]
pub enum RinglineError {
    /// Request carried no valid peer identity.
    #[error("unauthorized: missing or invalid peer identity")]
    Unauthorized,

    /// A required field was missing or malformed at the boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// A concurrent call already exists between the two peers.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A transition was attempted from a terminal or incompatible state.
    /// Benign under races: the loser observes the authoritative state here.
    #[error("invalid state: call {call_id} is {state}")]
    InvalidState { call_id: String, state: CallState },

    /// The callee is not present, so the call cannot ring.
    #[error("peer {peer_id} is offline")]
    Unreachable { peer_id: String },

    /// The requested call does not exist or the peer is not a participant.
    #[error("call not found: {0}")]
    CallNotFound(String),

    /// Durable store or broadcast I/O failure.
    #[error("transport error: {source}")]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RinglineError {
    /// Wrap an arbitrary I/O or store error as a transport failure.
    pub fn transport<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            source: Box::new(source),
        }
    }
}
