// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket push endpoint.
//!
//! Server -> Client frames are JSON push events:
//! ```json
//! {"type": "incoming_call", "call": {...}}
//! {"type": "call_state", "call_id": "...", "state": "active", "reason": null}
//! {"type": "signal", "message": {...}}
//! ```
//!
//! Client -> Server frames carry nothing; everything a client writes
//! goes through the REST surface. Push is best-effort: a subscriber
//! that lags or disconnects recovers by polling.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::auth::verify_token;
use crate::server::GatewayState;

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// Bearer token fallback; browser WebSocket clients cannot set an
    /// Authorization header.
    #[serde(default)]
    token: Option<String>,
}

/// WebSocket upgrade handler.
///
/// Verifies the peer token during the handshake (header first, `?token=`
/// fallback) and subscribes the connection to that peer's push channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or(query.token);

    let Some(token) = token else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(peer_id) = verify_token(&state.auth, &token) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, peer_id))
}

/// Handle an individual WebSocket connection.
///
/// Spawns a sender task that forwards push events to the client and
/// drains the receive side until the socket closes.
async fn handle_socket(socket: WebSocket, state: GatewayState, peer_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut events = state.hub.subscribe(&peer_id);
    debug!(%peer_id, "push socket connected");

    let sender_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "failed to encode push event");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Dropped frames are recovered by polling.
                    warn!(%peer_id, skipped, "push subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Nothing inbound is meaningful; wait for the client to go away.
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Close(_) => break,
            _ => {} // Ignore text, binary, ping (handled by tungstenite layer)
        }
    }

    sender_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_query_deserializes_token() {
        let query: WsAuthQuery = serde_json::from_str(r#"{"token": "alice.deadbeef"}"#).unwrap();
        assert_eq!(query.token.as_deref(), Some("alice.deadbeef"));
    }

    #[test]
    fn ws_query_token_is_optional() {
        let query: WsAuthQuery = serde_json::from_str(r#"{}"#).unwrap();
        assert!(query.token.is_none());
    }
}
