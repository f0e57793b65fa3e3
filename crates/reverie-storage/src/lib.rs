// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Reverie memory engine.
//!
//! Stores the three keyspaces the memory engine needs (serialized index
//! blobs, JSON memory records, per-collection dimensions) in a WAL-mode
//! database with embedded migrations. All access is serialized through the
//! single `tokio-rusqlite` background thread.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
