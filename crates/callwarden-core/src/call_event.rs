// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call history entries used by the reporting layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CallDirection, CallKey, CallOutcome};

/// One call in the history log.
///
/// An event is written when a call is placed and completed once the provider
/// reports a terminal outcome. `outcome` stays `None` while the call is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    /// Unique event identifier (UUID v4).
    pub id: String,
    pub owner_id: String,
    pub phone_number: String,
    /// Display name of the contact, when the caller knows it.
    pub contact_name: Option<String>,
    pub direction: CallDirection,
    pub outcome: Option<CallOutcome>,
    /// Talk time in seconds. Zero for calls that never connected.
    pub duration_secs: u32,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl CallEvent {
    /// A new, not yet completed call.
    pub fn started(
        key: &CallKey,
        direction: CallDirection,
        contact_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: key.owner_id.clone(),
            phone_number: key.phone_number.clone(),
            contact_name,
            direction,
            outcome: None,
            duration_secs: 0,
            created_at: now,
            ended_at: None,
        }
    }

    /// Mark the call finished.
    pub fn complete(&mut self, outcome: CallOutcome, duration_secs: u32, now: DateTime<Utc>) {
        self.outcome = Some(outcome);
        self.duration_secs = duration_secs;
        self.ended_at = Some(now);
    }
}
