// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-number call counter with a re-anchored 24-hour window.
//!
//! The window is not swept in the background. Every read or write first calls
//! [`RateLimitRecord::reset_if_window_elapsed`], so a stale record heals
//! itself on the next access.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CallKey;

/// Length of the rolling call window.
pub fn window_length() -> Duration {
    Duration::hours(24)
}

/// `round(part / whole * 100)`, rounding halves up. Zero when `whole` is zero.
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u64::from(part), u64::from(whole));
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// Rate governor state for one `(owner, phone_number)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub owner_id: String,
    pub phone_number: String,
    /// Calls placed since `window_start`.
    pub calls_in_window: u32,
    /// Anchor of the current window. `None` until first touched.
    pub window_start: Option<DateTime<Utc>>,
    /// Maximum calls per window.
    pub limit: u32,
    /// Whether `calls_in_window` reached `limit` at the last evaluation.
    pub is_limited: bool,
    /// When the current limitation lifts.
    pub limit_reset_at: Option<DateTime<Utc>>,
    pub last_call_at: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// A fresh, unanchored record.
    pub fn new(key: &CallKey, limit: u32) -> Self {
        Self {
            owner_id: key.owner_id.clone(),
            phone_number: key.phone_number.clone(),
            calls_in_window: 0,
            window_start: None,
            limit,
            is_limited: false,
            limit_reset_at: None,
            last_call_at: None,
        }
    }

    /// The key this record belongs to.
    pub fn key(&self) -> CallKey {
        CallKey {
            owner_id: self.owner_id.clone(),
            phone_number: self.phone_number.clone(),
        }
    }

    /// Anchor the window if unset, or start a new one once 24 hours have elapsed.
    ///
    /// Returns `true` only when counters were zeroed; anchoring alone is not a reset.
    pub fn reset_if_window_elapsed(&mut self, now: DateTime<Utc>) -> bool {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return false;
        };
        if now - start < window_length() {
            return false;
        }
        self.calls_in_window = 0;
        self.window_start = Some(now);
        self.is_limited = false;
        self.limit_reset_at = None;
        true
    }

    /// Whether another call fits in the current window.
    pub fn can_place_call(&self) -> bool {
        self.calls_in_window < self.limit
    }

    /// Calls left in the current window.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.calls_in_window)
    }

    /// Share of the window's limit already used, in percent.
    pub fn usage_percentage(&self) -> u32 {
        percentage(self.calls_in_window, self.limit)
    }

    /// Time until the window re-anchors. Zero for an unanchored or expired window.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Duration {
        match self.window_start {
            Some(start) => (start + window_length() - now).max(Duration::zero()),
            None => Duration::zero(),
        }
    }

    /// End of the current window, if anchored.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.window_start.map(|start| start + window_length())
    }

    /// Count a placed call.
    ///
    /// Does not check the limit: callers are expected to have consulted
    /// [`can_place_call`](Self::can_place_call) first. Skipping that check can
    /// push the count past the limit. The persisted path uses a conditional
    /// update instead so the check and the increment cannot be separated.
    pub fn record_call(&mut self, now: DateTime<Utc>) {
        self.calls_in_window += 1;
        self.last_call_at = Some(now);
        self.refresh_limited();
    }

    /// Replace the limit and re-evaluate the limitation against it.
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
        self.refresh_limited();
    }

    /// Start a new window immediately, regardless of elapsed time.
    pub fn force_reset(&mut self, now: DateTime<Utc>) {
        self.calls_in_window = 0;
        self.window_start = Some(now);
        self.is_limited = false;
        self.limit_reset_at = None;
    }

    fn refresh_limited(&mut self) {
        self.is_limited = self.calls_in_window >= self.limit;
        self.limit_reset_at = if self.is_limited {
            self.window_end()
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn record(limit: u32) -> RateLimitRecord {
        let key = CallKey::new("acct-1", "+15550100").unwrap();
        RateLimitRecord::new(&key, limit)
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(7, 10), 70);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(10, 10), 100);
    }

    #[test]
    fn first_reset_only_anchors() {
        let mut rec = record(10);
        assert!(!rec.reset_if_window_elapsed(t0()));
        assert_eq!(rec.window_start, Some(t0()));
    }

    #[test]
    fn window_boundary() {
        let mut rec = record(10);
        rec.reset_if_window_elapsed(t0());
        rec.record_call(t0());
        rec.record_call(t0());

        let almost = t0() + Duration::hours(23) + Duration::minutes(59);
        assert!(!rec.reset_if_window_elapsed(almost));
        assert_eq!(rec.calls_in_window, 2);
        assert_eq!(rec.window_start, Some(t0()));

        let past = t0() + Duration::hours(24) + Duration::seconds(1);
        assert!(rec.reset_if_window_elapsed(past));
        assert_eq!(rec.calls_in_window, 0);
        assert_eq!(rec.window_start, Some(past));
    }

    #[test]
    fn reaching_limit_sets_limited() {
        let mut rec = record(3);
        rec.reset_if_window_elapsed(t0());
        for _ in 0..3 {
            assert!(rec.can_place_call());
            rec.record_call(t0());
        }
        assert!(!rec.can_place_call());
        assert!(rec.is_limited);
        assert_eq!(rec.limit_reset_at, Some(t0() + Duration::hours(24)));
        assert_eq!(rec.remaining(), 0);
        assert_eq!(rec.usage_percentage(), 100);
    }

    #[test]
    fn record_call_does_not_enforce_limit() {
        let mut rec = record(1);
        rec.reset_if_window_elapsed(t0());
        rec.record_call(t0());
        rec.record_call(t0());
        assert_eq!(rec.calls_in_window, 2);
        assert_eq!(rec.remaining(), 0);
        assert_eq!(rec.usage_percentage(), 200);
    }

    #[test]
    fn time_until_reset() {
        let mut rec = record(10);
        assert_eq!(rec.time_until_reset(t0()), Duration::zero());

        rec.reset_if_window_elapsed(t0());
        assert_eq!(
            rec.time_until_reset(t0() + Duration::hours(4)),
            Duration::hours(20)
        );
        assert_eq!(
            rec.time_until_reset(t0() + Duration::hours(30)),
            Duration::zero()
        );
    }

    #[test]
    fn stale_limited_record_heals_on_access() {
        let mut rec = record(2);
        rec.reset_if_window_elapsed(t0());
        rec.record_call(t0());
        rec.record_call(t0());
        assert!(rec.is_limited);

        assert!(rec.reset_if_window_elapsed(t0() + Duration::hours(25)));
        assert!(!rec.is_limited);
        assert_eq!(rec.limit_reset_at, None);
        assert_eq!(rec.calls_in_window, 0);
        assert!(rec.can_place_call());
    }

    #[test]
    fn set_limit_reevaluates() {
        let mut rec = record(10);
        rec.reset_if_window_elapsed(t0());
        for _ in 0..5 {
            rec.record_call(t0());
        }
        rec.set_limit(5);
        assert!(rec.is_limited);
        assert!(rec.limit_reset_at.is_some());

        rec.set_limit(8);
        assert!(!rec.is_limited);
        assert_eq!(rec.limit_reset_at, None);
        assert_eq!(rec.remaining(), 3);
    }

    #[test]
    fn force_reset_reanchors() {
        let mut rec = record(1);
        rec.reset_if_window_elapsed(t0());
        rec.record_call(t0());
        let later = t0() + Duration::hours(2);
        rec.force_reset(later);
        assert_eq!(rec.calls_in_window, 0);
        assert_eq!(rec.window_start, Some(later));
        assert!(!rec.is_limited);
    }

    proptest! {
        /// Checked, strictly sequential placements never exceed the limit.
        #[test]
        fn checked_calls_never_exceed_limit(
            limit in 1u32..50,
            steps in proptest::collection::vec(0i64..7200, 0..200),
        ) {
            let mut rec = record(limit);
            let mut now = t0();
            for step in steps {
                now += Duration::seconds(step * 30);
                rec.reset_if_window_elapsed(now);
                if rec.can_place_call() {
                    rec.record_call(now);
                }
                prop_assert!(rec.calls_in_window <= rec.limit);
                prop_assert_eq!(rec.is_limited, rec.calls_in_window >= rec.limit);
            }
        }
    }
}
