// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signaling services for the Ringline coordinator.
//!
//! This crate hosts the moving parts between the HTTP surface and
//! storage: presence tracking, the durable signal relay with its
//! best-effort push hub, the call coordinator that drives the state
//! machine, and the background sweepers for ring timeouts and aged-row
//! retention.
//!
//! Delivery model: every signaling message is written to storage first
//! and pushed to live subscribers second. Push is advisory; a client
//! that missed a frame recovers everything by polling.

pub mod coordinator;
pub mod hub;
pub mod notify;
pub mod presence;
pub mod relay;
pub mod retention;
pub mod shutdown;
pub mod sweeper;

pub use coordinator::{CallCoordinator, CallOverview};
pub use hub::PushHub;
pub use notify::Notifier;
pub use presence::PresenceTracker;
pub use relay::SignalRelay;
pub use retention::RetentionSweeper;
pub use shutdown::install_signal_handler;
pub use sweeper::RingSweeper;
