// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate governor: may another call be placed to this number?
//!
//! Checking and recording are separate steps so the caller can contact the
//! calling provider in between. Recording is a conditional increment in the
//! store, so two requests that both passed the check cannot both be counted
//! past the limit.

use std::sync::Arc;

use callwarden_config::GovernorSettings;
use callwarden_core::{CallKey, CallwardenError, Clock, RateLimitRecord};
use callwarden_storage::queries::rate_limits;
use callwarden_storage::Database;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Snapshot answering "may I call this number now?".
///
/// A refusal is a normal result, carrying what the UI needs to explain it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallDecision {
    pub owner_id: String,
    pub phone_number: String,
    pub allowed: bool,
    pub calls_in_window: u32,
    pub limit: u32,
    pub remaining: u32,
    pub usage_percentage: u32,
    pub time_until_reset_secs: i64,
    pub limit_reset_at: Option<DateTime<Utc>>,
}

impl CallDecision {
    /// Evaluate an already-reset record at `now`.
    pub fn from_record(record: &RateLimitRecord, now: DateTime<Utc>) -> Self {
        Self {
            owner_id: record.owner_id.clone(),
            phone_number: record.phone_number.clone(),
            allowed: record.can_place_call(),
            calls_in_window: record.calls_in_window,
            limit: record.limit,
            remaining: record.remaining(),
            usage_percentage: record.usage_percentage(),
            time_until_reset_secs: record.time_until_reset(now).num_seconds(),
            limit_reset_at: record.limit_reset_at,
        }
    }
}

/// Result of recording a placed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCallOutcome {
    /// The call was counted.
    Recorded(RateLimitRecord),
    /// The record was already at its limit; nothing was counted.
    LimitReached(RateLimitRecord),
}

impl RecordCallOutcome {
    /// The record after the attempt.
    pub fn record(&self) -> &RateLimitRecord {
        match self {
            Self::Recorded(r) | Self::LimitReached(r) => r,
        }
    }

    /// Whether the call was counted.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Per-number call cap backed by the `call_limits` table.
#[derive(Clone)]
pub struct RateGovernor {
    db: Database,
    settings: GovernorSettings,
    clock: Arc<dyn Clock>,
}

impl RateGovernor {
    /// Create a governor over `db` using `settings.default_limit` for new numbers.
    pub fn new(db: Database, settings: GovernorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            settings,
            clock,
        }
    }

    /// Thresholds this governor was built with.
    pub fn settings(&self) -> &GovernorSettings {
        &self.settings
    }

    /// Fetch the record for a key, creating it with the default limit if absent.
    ///
    /// The window is not reset here; see [`current`](Self::current).
    pub async fn get_or_create(&self, key: &CallKey) -> Result<RateLimitRecord, CallwardenError> {
        rate_limits::get_or_create(&self.db, key, self.settings.default_limit, self.clock.now())
            .await
    }

    /// Fetch the record with any elapsed window reset and persisted.
    ///
    /// Returns the record and whether a reset happened.
    pub async fn current(
        &self,
        key: &CallKey,
    ) -> Result<(RateLimitRecord, bool), CallwardenError> {
        let now = self.clock.now();
        let (record, did_reset) = rate_limits::update(
            &self.db,
            key,
            self.settings.default_limit,
            now,
            move |r| r.reset_if_window_elapsed(now),
        )
        .await?;
        if did_reset {
            debug!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                "call window elapsed, counter reset"
            );
        }
        Ok((record, did_reset))
    }

    /// Decide whether a call to `key` may be placed now. Does not count anything.
    pub async fn check(&self, key: &CallKey) -> Result<CallDecision, CallwardenError> {
        let (record, _) = self.current(key).await?;
        let decision = CallDecision::from_record(&record, self.clock.now());
        if !decision.allowed {
            debug!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                time_until_reset_secs = decision.time_until_reset_secs,
                "call refused, limit reached"
            );
        }
        Ok(decision)
    }

    /// Count a call placed to `key`.
    ///
    /// The window reset and the increment happen in one transaction, and the
    /// increment only applies while the count is below the limit.
    pub async fn record_call(&self, key: &CallKey) -> Result<RecordCallOutcome, CallwardenError> {
        let now = self.clock.now();
        let (record, counted) = rate_limits::update_and_increment(
            &self.db,
            key,
            self.settings.default_limit,
            now,
            move |r| {
                r.reset_if_window_elapsed(now);
            },
        )
        .await?;

        if !counted {
            warn!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                limit = record.limit,
                "call not counted, number already at its limit"
            );
            return Ok(RecordCallOutcome::LimitReached(record));
        }

        info!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            calls_in_window = record.calls_in_window,
            limit = record.limit,
            "call recorded"
        );
        if record.is_limited {
            warn!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                limit_reset_at = ?record.limit_reset_at,
                "call limit reached"
            );
        }
        Ok(RecordCallOutcome::Recorded(record))
    }

    /// Override the limit of one number. The current window is kept.
    pub async fn set_limit(
        &self,
        key: &CallKey,
        limit: u32,
    ) -> Result<RateLimitRecord, CallwardenError> {
        if limit == 0 {
            return Err(CallwardenError::validation("call limit must be greater than 0"));
        }
        let now = self.clock.now();
        let (record, ()) = rate_limits::update(
            &self.db,
            key,
            self.settings.default_limit,
            now,
            move |r| {
                r.reset_if_window_elapsed(now);
                r.set_limit(limit);
            },
        )
        .await?;
        info!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            limit,
            "call limit changed"
        );
        Ok(record)
    }

    /// Start a fresh window for one number immediately.
    pub async fn reset_window(&self, key: &CallKey) -> Result<RateLimitRecord, CallwardenError> {
        let now = self.clock.now();
        let (record, ()) = rate_limits::update(
            &self.db,
            key,
            self.settings.default_limit,
            now,
            move |r| r.force_reset(now),
        )
        .await?;
        info!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            "call window reset manually"
        );
        Ok(record)
    }

    /// Every record of an owner, each with its elapsed window reset and persisted.
    pub async fn refresh_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<RateLimitRecord>, CallwardenError> {
        let now = self.clock.now();
        rate_limits::update_all_for_owner(&self.db, owner_id, move |r| {
            let unanchored = r.window_start.is_none();
            r.reset_if_window_elapsed(now) || unanchored
        })
        .await
    }
}
