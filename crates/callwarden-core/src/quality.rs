// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-number call outcome statistics.
//!
//! Tracks how often calls to a contact are answered and how long the current
//! run of connected or missed calls is. Warning and revocation thresholds are
//! passed in by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rate_limit::percentage;
use crate::types::{CallKey, CallOutcome, QualityStatus};

/// Quality tracker state for one `(owner, phone_number)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub owner_id: String,
    pub phone_number: String,
    pub total_calls: u32,
    pub connected_calls: u32,
    pub missed_calls: u32,
    pub rejected_calls: u32,
    pub failed_calls: u32,
    pub consecutive_missed: u32,
    pub consecutive_connected: u32,
    /// Connected share of all calls, in whole percent.
    pub pickup_rate: u32,
    pub warning_sent: bool,
    pub warning_sent_at: Option<DateTime<Utc>>,
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub last_missed_at: Option<DateTime<Utc>>,
}

impl QualityRecord {
    /// A record with every counter at zero.
    pub fn new(key: &CallKey) -> Self {
        Self {
            owner_id: key.owner_id.clone(),
            phone_number: key.phone_number.clone(),
            total_calls: 0,
            connected_calls: 0,
            missed_calls: 0,
            rejected_calls: 0,
            failed_calls: 0,
            consecutive_missed: 0,
            consecutive_connected: 0,
            pickup_rate: 0,
            warning_sent: false,
            warning_sent_at: None,
            last_call_at: None,
            last_connected_at: None,
            last_missed_at: None,
        }
    }

    /// The key this record belongs to.
    pub fn key(&self) -> CallKey {
        CallKey {
            owner_id: self.owner_id.clone(),
            phone_number: self.phone_number.clone(),
        }
    }

    /// Fold one terminal call outcome into the statistics.
    ///
    /// Only `Connected` and `Missed` touch the streak counters; rejected and
    /// failed calls count towards the totals but leave both streaks as they were.
    pub fn record_outcome(&mut self, outcome: CallOutcome, now: DateTime<Utc>) {
        self.total_calls += 1;
        match outcome {
            CallOutcome::Connected => {
                self.connected_calls += 1;
                self.consecutive_connected += 1;
                self.consecutive_missed = 0;
                self.last_connected_at = Some(now);
            }
            CallOutcome::Missed => {
                self.missed_calls += 1;
                self.consecutive_missed += 1;
                self.consecutive_connected = 0;
                self.last_missed_at = Some(now);
            }
            CallOutcome::Rejected => self.rejected_calls += 1,
            CallOutcome::Failed => self.failed_calls += 1,
        }
        self.pickup_rate = percentage(self.connected_calls, self.total_calls);
        self.last_call_at = Some(now);
    }

    /// A courtesy warning is due and has not been sent yet.
    pub fn needs_warning(&self, warning_threshold: u32) -> bool {
        self.consecutive_missed >= warning_threshold && !self.warning_sent
    }

    /// Calling permission should be revoked. Independent of `warning_sent`.
    pub fn needs_revocation(&self, revocation_threshold: u32) -> bool {
        self.consecutive_missed >= revocation_threshold
    }

    /// Band of the current pickup rate.
    pub fn quality_status(&self) -> QualityStatus {
        QualityStatus::from_pickup_rate(self.pickup_rate)
    }

    /// Record that the courtesy warning went out.
    pub fn mark_warning_sent(&mut self, now: DateTime<Utc>) {
        self.warning_sent = true;
        self.warning_sent_at = Some(now);
    }

    /// Clear the warning flag so the next miss streak can warn again.
    pub fn reset_warning(&mut self) {
        self.warning_sent = false;
        self.warning_sent_at = None;
    }
}
