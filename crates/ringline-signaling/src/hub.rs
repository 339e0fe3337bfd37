// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process push fan-out keyed by recipient peer id.
//!
//! Delivery is best-effort and at-most-once: publishing to a peer with no
//! live subscription is a no-op, and a lagging subscriber drops frames.
//! The durable poll path is the fallback for anything missed here.

use dashmap::DashMap;
use ringline_core::PushEvent;
use tokio::sync::broadcast;

/// Frames buffered per peer channel before laggards start losing them.
const PUSH_BUFFER: usize = 64;

/// Registry of per-peer broadcast channels.
///
/// A peer may hold several subscriptions at once (one per open tab); every
/// subscription sees every event published to that peer.
#[derive(Default)]
pub struct PushHub {
    channels: DashMap<String, broadcast::Sender<PushEvent>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription for `peer_id`, creating the channel on first use.
    pub fn subscribe(&self, peer_id: &str) -> broadcast::Receiver<PushEvent> {
        self.channels
            .entry(peer_id.to_string())
            .or_insert_with(|| broadcast::channel(PUSH_BUFFER).0)
            .subscribe()
    }

    /// Publish an event to `peer_id`, returning how many subscriptions
    /// received it. Zero means nobody is listening; channels with no
    /// remaining subscribers are pruned here.
    pub fn publish(&self, peer_id: &str, event: PushEvent) -> usize {
        let delivered = match self.channels.get(peer_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => return 0,
        };
        if delivered == 0 {
            self.channels
                .remove_if(peer_id, |_, sender| sender.receiver_count() == 0);
        }
        delivered
    }

    /// Number of peers with an open channel. For observability.
    pub fn connected_peers(&self) -> usize {
        self.channels.len()
    }
}
