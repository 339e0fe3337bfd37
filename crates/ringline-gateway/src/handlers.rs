// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the signaling REST API.
//!
//! Handles `/v1/signal`, `/v1/presence` and `/v1/calls`. Every handler
//! reads the authenticated peer from request extensions; identity never
//! comes from the request body.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ringline_core::{CallType, CallerInfo, PresenceRecord, RinglineError, SignalKind};

use crate::auth::AuthedPeer;
use crate::server::GatewayState;

/// Request body for POST /v1/signal.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSendRequest {
    /// Call the message belongs to.
    pub call_id: String,
    /// Recipient; must be the other participant of the call.
    pub target_user_id: String,
    /// The signaling message itself.
    pub message: SignalBody,
    /// Optional client-supplied idempotency key. Retries with the same
    /// id return the originally stored message.
    #[serde(default)]
    pub signal_id: Option<String>,
}

/// Kind and payload of a signaling message.
#[derive(Debug, Deserialize)]
pub struct SignalBody {
    pub kind: SignalKind,
    pub payload: Value,
}

/// Response body for GET /v1/signal.
#[derive(Debug, Serialize)]
pub struct SignalListResponse {
    /// Messages for the authenticated recipient, oldest first.
    pub signals: Vec<ringline_core::SignalMessage>,
}

/// Query parameters for GET /v1/signal.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPollQuery {
    pub call_id: String,
    /// RFC 3339 cursor; only messages created strictly after it are
    /// returned.
    #[serde(default)]
    pub since: Option<String>,
}

/// Request body for POST /v1/presence.
#[derive(Debug, Deserialize)]
pub struct PresenceActionRequest {
    pub action: PresenceAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceAction {
    MarkOnline,
    MarkOffline,
    Heartbeat,
}

/// Response body for GET /v1/presence.
#[derive(Debug, Serialize)]
pub struct PresenceListResponse {
    /// Currently-online peers, excluding the requester.
    pub peers: Vec<PresenceRecord>,
}

/// Request body for POST /v1/calls. Which fields are required depends
/// on the action; unneeded fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallActionRequest {
    pub action: CallAction,
    #[serde(default)]
    pub call_id: Option<String>,
    /// Initiate only.
    #[serde(default)]
    pub callee_id: Option<String>,
    /// Initiate only.
    #[serde(default)]
    pub call_type: Option<CallType>,
    /// Initiate only: banner details for the callee.
    #[serde(default)]
    pub caller_info: Option<CallerInfo>,
    /// Initiate only: SDP offer, when the caller already has one.
    #[serde(default)]
    pub offer: Option<Value>,
    /// Accept only: SDP answer, when the callee already has one.
    #[serde(default)]
    pub answer: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallAction {
    Initiate,
    Accept,
    Reject,
    Hangup,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}

/// Response body for presence writes.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Map a domain error to its HTTP status.
fn error_status(err: &RinglineError) -> StatusCode {
    match err {
        RinglineError::Unauthorized => StatusCode::UNAUTHORIZED,
        RinglineError::Validation(_) => StatusCode::BAD_REQUEST,
        RinglineError::Conflict(_) => StatusCode::CONFLICT,
        RinglineError::InvalidState { .. } => StatusCode::CONFLICT,
        RinglineError::CallNotFound(_) => StatusCode::NOT_FOUND,
        RinglineError::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RinglineError::Transport { .. } | RinglineError::Config(_) | RinglineError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_into_response(err: RinglineError) -> Response {
    let status = error_status(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// GET /health
///
/// Unauthenticated liveness probe.
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// POST /v1/signal
///
/// Store a signaling message and push it to the recipient if connected.
pub async fn post_signal(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
    Json(body): Json<SignalSendRequest>,
) -> Response {
    let result = state
        .coordinator
        .send_signal(
            &body.call_id,
            &peer,
            &body.target_user_id,
            body.message.kind,
            body.message.payload,
            body.signal_id,
        )
        .await;
    match result {
        Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
        Err(e) => error_into_response(e),
    }
}

/// GET /v1/signal?callId=&since=
///
/// Poll messages addressed to the authenticated peer.
pub async fn get_signal(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
    Query(query): Query<SignalPollQuery>,
) -> Response {
    let since = match query.since.as_deref() {
        Some(raw) => match chrono::DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&chrono::Utc)),
            Err(_) => {
                return error_into_response(RinglineError::Validation(
                    "since must be an RFC 3339 timestamp".into(),
                ));
            }
        },
        None => None,
    };
    match state.relay.poll_since(&query.call_id, &peer, since).await {
        Ok(signals) => (StatusCode::OK, Json(SignalListResponse { signals })).into_response(),
        Err(e) => error_into_response(e),
    }
}

/// POST /v1/presence
///
/// Presence writes for the authenticated peer.
pub async fn post_presence(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
    Json(body): Json<PresenceActionRequest>,
) -> Response {
    let result = match body.action {
        PresenceAction::MarkOnline => state.presence.mark_online(&peer).await,
        PresenceAction::MarkOffline => state.presence.mark_offline(&peer).await,
        PresenceAction::Heartbeat => state.presence.heartbeat(&peer).await,
    };
    match result {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(e) => error_into_response(e),
    }
}

/// GET /v1/presence
///
/// Currently-online peers, excluding the requester.
pub async fn get_presence(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
) -> Response {
    match state.presence.list_online(Some(&peer)).await {
        Ok(peers) => (StatusCode::OK, Json(PresenceListResponse { peers })).into_response(),
        Err(e) => error_into_response(e),
    }
}

/// POST /v1/calls
///
/// Call lifecycle actions. The authenticated peer is the actor: the
/// caller for `initiate` and `hangup`, the callee for `accept` and
/// `reject`.
pub async fn post_calls(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
    Json(body): Json<CallActionRequest>,
) -> Response {
    let CallActionRequest {
        action,
        call_id,
        callee_id,
        call_type,
        caller_info,
        offer,
        answer,
    } = body;

    let result = match action {
        CallAction::Initiate => {
            let Some(callee_id) = callee_id else {
                return error_into_response(RinglineError::Validation(
                    "calleeId is required to initiate".into(),
                ));
            };
            let Some(call_type) = call_type else {
                return error_into_response(RinglineError::Validation(
                    "callType is required to initiate".into(),
                ));
            };
            state
                .coordinator
                .initiate(&peer, &callee_id, call_type, caller_info, offer)
                .await
        }
        CallAction::Accept => match require_call_id(call_id.as_deref()) {
            Ok(id) => state.coordinator.accept(id, &peer, answer).await,
            Err(e) => Err(e),
        },
        CallAction::Reject => match require_call_id(call_id.as_deref()) {
            Ok(id) => state.coordinator.reject(id, &peer).await,
            Err(e) => Err(e),
        },
        CallAction::Hangup => match require_call_id(call_id.as_deref()) {
            Ok(id) => state.coordinator.hangup(id, &peer).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => error_into_response(e),
    }
}

fn require_call_id(call_id: Option<&str>) -> Result<&str, RinglineError> {
    call_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| RinglineError::Validation("callId is required".into()))
}

/// GET /v1/calls
///
/// Pending and recent calls for the authenticated peer.
pub async fn get_calls(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
) -> Response {
    match state.coordinator.list_for_peer(&peer).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => error_into_response(e),
    }
}

/// GET /v1/calls/{call_id}
///
/// One session; participants only.
pub async fn get_call(
    State(state): State<GatewayState>,
    Extension(AuthedPeer(peer)): Extension<AuthedPeer>,
    Path(call_id): Path<String>,
) -> Response {
    match state.coordinator.fetch(&call_id, &peer).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => error_into_response(e),
    }
}
