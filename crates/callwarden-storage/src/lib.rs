// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for callwarden.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed queries for rate limit
//! records, quality records, and the call history log.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
