// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presence record type.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Last-known reachability of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub peer_id: String,
    pub is_online: bool,
    pub last_seen_at: DateTime<Utc>,
}

impl PresenceRecord {
    /// Whether this record counts as reachable at `now`.
    ///
    /// A record that claims to be online but has not been refreshed
    /// within the staleness window is treated as offline by readers,
    /// even though the row itself was never rewritten.
    pub fn is_reachable_at(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        self.is_online && now - self.last_seen_at <= staleness
    }
}
