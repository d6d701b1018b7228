// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call rate governance and relationship-quality tracking for callwarden.
//!
//! This crate provides:
//! - **Rate governor**: per-number call cap over a re-anchored 24-hour window
//! - **Quality tracker**: pickup rate, miss streaks, warning/revocation alerts
//! - **Call gate**: the check → place → complete flow used by call handlers
//! - **Reporter**: per-owner summaries and the dashboard view
//!
//! Every service reads time from an injected [`Clock`](callwarden_core::Clock)
//! and thresholds from an injected [`GovernorSettings`](callwarden_config::GovernorSettings).

pub mod gate;
pub mod quality;
pub mod rate;
pub mod report;

pub use gate::{CallGate, CompletedCall, PlacedCall};
pub use quality::{QualityAlert, QualityTracker};
pub use rate::{CallDecision, RateGovernor, RecordCallOutcome};
pub use report::{CallSummary, Dashboard, ReportPeriod, Reporter};
