// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for callwarden integration tests.
//!
//! [`TestHarness`] wires the governor services over a temporary SQLite file
//! and a [`ManualClock`](callwarden_core::ManualClock), so window resets and
//! report periods can be exercised deterministically.

pub mod harness;

pub use harness::{TestHarness, TestHarnessBuilder};
