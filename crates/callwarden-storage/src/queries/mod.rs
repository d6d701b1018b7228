// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the three callwarden tables.

pub mod call_events;
pub mod quality;
pub mod rate_limits;
