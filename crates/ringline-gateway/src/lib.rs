// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Ringline signaling coordinator.
//!
//! The gateway is a thin boundary: it authenticates the peer, decodes
//! the request, and hands off to the signaling services. All call and
//! presence semantics live in `ringline-signaling`; nothing here holds
//! state beyond the shared handles in [`GatewayState`].

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{AuthConfig, AuthedPeer, auth_middleware, issue_token, verify_token};
pub use server::{GatewayState, HealthState, ServerConfig, start_server};
