// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! Peer tokens are `<peer_id>.<mac>` where the MAC is a hex HMAC-SHA256
//! tag over the peer id under the configured signing secret. The account
//! system that mints tokens at login lives outside this service; the
//! gateway only verifies.
//!
//! When no signing secret is configured, all requests are rejected
//! (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared secret for token verification. `None` rejects everything.
    pub signing_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// The peer id a verified token resolved to, stored in request
/// extensions by [`auth_middleware`] for handlers to read.
#[derive(Debug, Clone)]
pub struct AuthedPeer(pub String);

/// Mint a token for `peer_id`. Used by tests and operator tooling; in
/// production the account system is the issuer.
pub fn issue_token(signing_secret: &str, peer_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(peer_id.as_bytes());
    let tag = hex::encode(mac.finalize().into_bytes());
    format!("{peer_id}.{tag}")
}

/// Verify a `<peer_id>.<mac>` token, returning the peer id on success.
///
/// The split is at the last `.` so peer ids containing dots keep
/// working. Tag comparison is constant-time via `Mac::verify_slice`.
pub fn verify_token(auth: &AuthConfig, token: &str) -> Option<String> {
    let secret = auth.signing_secret.as_deref()?;
    let (peer_id, tag_hex) = token.rsplit_once('.')?;
    if peer_id.is_empty() {
        return None;
    }
    let tag = hex::decode(tag_hex).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(peer_id.as_bytes());
    mac.verify_slice(&tag).ok()?;
    Some(peer_id.to_string())
}

/// Middleware that resolves the bearer token to an authenticated peer.
///
/// On success the peer id is inserted into request extensions as
/// [`AuthedPeer`]. If no signing secret is configured, all requests are
/// rejected (fail-closed).
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.signing_secret.is_none() {
        tracing::error!("gateway has no signing secret configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let bearer = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if let Some(token) = bearer {
        if let Some(peer_id) = verify_token(&auth, token) {
            request.extensions_mut().insert(AuthedPeer(peer_id));
            return Ok(next.run(request).await);
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}
