// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quality tracker: is this calling relationship healthy?

use std::sync::Arc;

use callwarden_config::GovernorSettings;
use callwarden_core::{CallKey, CallOutcome, CallwardenError, Clock, QualityRecord, QualityStatus};
use callwarden_storage::queries::quality;
use callwarden_storage::Database;
use serde::Serialize;
use tracing::{info, warn};

/// Signals derived from a quality record after an outcome was folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityAlert {
    pub needs_warning: bool,
    pub needs_revocation: bool,
    pub status: QualityStatus,
}

impl QualityAlert {
    /// Evaluate a record against the configured thresholds.
    pub fn evaluate(record: &QualityRecord, settings: &GovernorSettings) -> Self {
        Self {
            needs_warning: record.needs_warning(settings.warning_threshold),
            needs_revocation: record.needs_revocation(settings.revocation_threshold),
            status: record.quality_status(),
        }
    }
}

/// Per-number outcome statistics backed by the `call_quality` table.
#[derive(Clone)]
pub struct QualityTracker {
    db: Database,
    settings: GovernorSettings,
    clock: Arc<dyn Clock>,
}

impl QualityTracker {
    pub fn new(db: Database, settings: GovernorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            settings,
            clock,
        }
    }

    /// Fetch the record for a key, creating a zeroed one if absent.
    pub async fn get_or_create(&self, key: &CallKey) -> Result<QualityRecord, CallwardenError> {
        quality::get_or_create(&self.db, key).await
    }

    /// Current alert state for a key without recording anything.
    pub async fn alert(&self, key: &CallKey) -> Result<QualityAlert, CallwardenError> {
        let record = self.get_or_create(key).await?;
        Ok(QualityAlert::evaluate(&record, &self.settings))
    }

    /// Fold a terminal outcome into the statistics and persist them.
    pub async fn record_outcome(
        &self,
        key: &CallKey,
        outcome: CallOutcome,
    ) -> Result<(QualityRecord, QualityAlert), CallwardenError> {
        let now = self.clock.now();
        let (record, ()) =
            quality::update(&self.db, key, move |r| r.record_outcome(outcome, now)).await?;
        let alert = QualityAlert::evaluate(&record, &self.settings);

        info!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            %outcome,
            pickup_rate = record.pickup_rate,
            consecutive_missed = record.consecutive_missed,
            "call outcome recorded"
        );
        if alert.needs_revocation {
            warn!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                consecutive_missed = record.consecutive_missed,
                threshold = self.settings.revocation_threshold,
                "calling permission should be revoked"
            );
        } else if alert.needs_warning {
            warn!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                consecutive_missed = record.consecutive_missed,
                threshold = self.settings.warning_threshold,
                "courtesy warning due"
            );
        }
        Ok((record, alert))
    }

    /// Record that the courtesy warning was delivered.
    pub async fn mark_warning_sent(&self, key: &CallKey) -> Result<QualityRecord, CallwardenError> {
        let now = self.clock.now();
        let (record, ()) = quality::update(&self.db, key, move |r| r.mark_warning_sent(now)).await?;
        info!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            "warning marked as sent"
        );
        Ok(record)
    }

    /// Clear the warning flag so a later miss streak can warn again.
    pub async fn reset_warning(&self, key: &CallKey) -> Result<QualityRecord, CallwardenError> {
        let (record, ()) = quality::update(&self.db, key, |r| r.reset_warning()).await?;
        info!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            "warning flag cleared"
        );
        Ok(record)
    }
}
