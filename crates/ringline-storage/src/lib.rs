// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Ringline signaling coordinator.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed query
//! modules for presence, signals, and call sessions. Concurrency control
//! lives in the SQL: conditional updates for call transitions, a partial
//! unique index for the one-live-call-per-pair rule, and an idempotent
//! insert for signals.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
