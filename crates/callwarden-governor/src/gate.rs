// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call gate: the check, place, complete flow around one outbound call.
//!
//! Call handlers ask [`CallGate::authorize`] before contacting the provider,
//! report [`CallGate::placed`] once the provider accepted the call, and
//! [`CallGate::completed`] when a terminal outcome arrives.

use std::sync::Arc;

use callwarden_config::GovernorSettings;
use callwarden_core::{
    CallDirection, CallEvent, CallKey, CallOutcome, CallwardenError, Clock, QualityRecord,
};
use callwarden_storage::queries::call_events;
use callwarden_storage::Database;
use tracing::{debug, warn};

use crate::quality::{QualityAlert, QualityTracker};
use crate::rate::{CallDecision, RateGovernor, RecordCallOutcome};

/// What happened when a placed call was reported.
#[derive(Debug, Clone)]
pub struct PlacedCall {
    pub outcome: RecordCallOutcome,
    pub event: CallEvent,
}

/// What happened when a call outcome was reported.
#[derive(Debug, Clone)]
pub struct CompletedCall {
    pub quality: QualityRecord,
    pub alert: QualityAlert,
    /// The history entry that was closed (or written, for untracked calls).
    pub event: CallEvent,
}

/// Ties the rate governor, quality tracker and call history together.
#[derive(Clone)]
pub struct CallGate {
    db: Database,
    rate: RateGovernor,
    quality: QualityTracker,
    clock: Arc<dyn Clock>,
}

impl CallGate {
    pub fn new(db: Database, settings: GovernorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate: RateGovernor::new(db.clone(), settings, clock.clone()),
            quality: QualityTracker::new(db.clone(), settings, clock.clone()),
            db,
            clock,
        }
    }

    pub fn rate(&self) -> &RateGovernor {
        &self.rate
    }

    pub fn quality(&self) -> &QualityTracker {
        &self.quality
    }

    /// May a call to `key` be placed now?
    pub async fn authorize(&self, key: &CallKey) -> Result<CallDecision, CallwardenError> {
        self.rate.check(key).await
    }

    /// Count a call the provider accepted and open its history entry.
    ///
    /// The history entry is written even when the counter refused the call,
    /// since the call did go out.
    pub async fn placed(
        &self,
        key: &CallKey,
        contact_name: Option<String>,
    ) -> Result<PlacedCall, CallwardenError> {
        let outcome = self.rate.record_call(key).await?;
        if !outcome.is_recorded() {
            warn!(
                owner_id = %key.owner_id,
                phone_number = %key.phone_number,
                "call placed while over limit"
            );
        }
        let event = CallEvent::started(key, CallDirection::Outbound, contact_name, self.clock.now());
        call_events::insert(&self.db, &event).await?;
        debug!(event_id = %event.id, "call event opened");
        Ok(PlacedCall { outcome, event })
    }

    /// Apply a terminal outcome: close the history entry and update quality.
    ///
    /// When no open entry exists for the key (for example an inbound call),
    /// a completed inbound entry is written instead.
    pub async fn completed(
        &self,
        key: &CallKey,
        outcome: CallOutcome,
        duration_secs: u32,
    ) -> Result<CompletedCall, CallwardenError> {
        let now = self.clock.now();
        let event = match call_events::oldest_open(&self.db, &key.owner_id, &key.phone_number)
            .await?
        {
            Some(mut event) => {
                call_events::complete(&self.db, &event.id, outcome, duration_secs, now).await?;
                event.complete(outcome, duration_secs, now);
                event
            }
            None => {
                let mut event = CallEvent::started(key, CallDirection::Inbound, None, now);
                event.complete(outcome, duration_secs, now);
                call_events::insert(&self.db, &event).await?;
                event
            }
        };
        let (quality, alert) = self.quality.record_outcome(key, outcome).await?;
        Ok(CompletedCall {
            quality,
            alert,
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callwarden_core::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    async fn gate() -> (CallGate, Database, ManualClock) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = ManualClock::new(t0());
        let gate = CallGate::new(db.clone(), GovernorSettings::default(), Arc::new(clock.clone()));
        (gate, db, clock)
    }

    fn key() -> CallKey {
        CallKey::new("acct-1", "+15550100").unwrap()
    }

    #[tokio::test]
    async fn placed_then_completed_closes_event() {
        let (gate, db, clock) = gate().await;
        assert!(gate.authorize(&key()).await.unwrap().allowed);

        let placed = gate.placed(&key(), Some("Ada".into())).await.unwrap();
        assert!(placed.outcome.is_recorded());
        assert_eq!(placed.outcome.record().calls_in_window, 1);

        clock.advance(Duration::minutes(3));
        let done = gate.completed(&key(), CallOutcome::Connected, 180).await.unwrap();
        assert_eq!(done.event.id, placed.event.id);
        assert_eq!(done.quality.connected_calls, 1);

        let stored = call_events::get(&db, &placed.event.id).await.unwrap().unwrap();
        assert_eq!(stored.outcome, Some(CallOutcome::Connected));
        assert_eq!(stored.duration_secs, 180);
        assert_eq!(stored.contact_name.as_deref(), Some("Ada"));
        assert_eq!(stored.ended_at, Some(t0() + Duration::minutes(3)));
    }

    #[tokio::test]
    async fn overlapping_calls_complete_in_placement_order() {
        let (gate, db, clock) = gate().await;
        let first = gate.placed(&key(), Some("Ada".into())).await.unwrap();
        clock.advance(Duration::seconds(10));
        let second = gate.placed(&key(), Some("Ada".into())).await.unwrap();

        clock.advance(Duration::minutes(1));
        let done = gate.completed(&key(), CallOutcome::Connected, 70).await.unwrap();
        assert_eq!(done.event.id, first.event.id);

        let pending = call_events::get(&db, &second.event.id).await.unwrap().unwrap();
        assert!(pending.outcome.is_none());
    }

    #[tokio::test]
    async fn completion_without_open_event_logs_inbound() {
        let (gate, db, _) = gate().await;
        let done = gate.completed(&key(), CallOutcome::Missed, 0).await.unwrap();
        assert_eq!(done.event.direction, CallDirection::Inbound);
        assert!(call_events::get(&db, &done.event.id).await.unwrap().is_some());
        assert_eq!(gate.rate().get_or_create(&key()).await.unwrap().calls_in_window, 0);
    }

    #[tokio::test]
    async fn two_misses_raise_warning() {
        let (gate, _, _) = gate().await;
        for _ in 0..2 {
            gate.placed(&key(), None).await.unwrap();
            gate.completed(&key(), CallOutcome::Missed, 0).await.unwrap();
        }
        let alert = gate.quality().alert(&key()).await.unwrap();
        assert!(alert.needs_warning);
        assert!(!alert.needs_revocation);
    }
}
