// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-owner reporting across every tracked number.
//!
//! [`Reporter::summarize`] rolls up the call history for a period;
//! [`Reporter::dashboard`] joins the live rate and quality records.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use callwarden_config::GovernorSettings;
use callwarden_core::rate_limit::percentage;
use callwarden_core::{CallEvent, CallOutcome, CallwardenError, Clock, QualityRecord, QualityStatus};
use callwarden_storage::queries::{call_events, quality};
use callwarden_storage::Database;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::rate::RateGovernor;

/// Entries kept in each ranked list.
const TOP_N: usize = 10;

/// Time range a summary covers. Day-based periods end at the close of the
/// current UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today,
    /// The last 7 days including today.
    Week,
    /// The last 30 days including today.
    Month,
    LastDays(u32),
    /// Explicit half-open range `[start, end)`.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl ReportPeriod {
    /// Resolve to a half-open `[start, end)` range relative to `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), CallwardenError> {
        let days = match *self {
            Self::Today => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::LastDays(0) => {
                return Err(CallwardenError::validation("report period must cover at least one day"));
            }
            Self::LastDays(n) => n,
            Self::Range { start, end } => {
                if end <= start {
                    return Err(CallwardenError::validation(
                        "report range end must be after its start",
                    ));
                }
                return Ok((start, end));
            }
        };
        let end = start_of_day(now.date_naive()) + Duration::days(1);
        Ok((end - Duration::days(i64::from(days)), end))
    }
}

impl FromStr for ReportPeriod {
    type Err = CallwardenError;

    /// Accepts `today`, `week`, `month`, or a day count such as `14d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => other
                .strip_suffix('d')
                .and_then(|n| n.parse::<u32>().ok())
                .map(Self::LastDays)
                .ok_or_else(|| {
                    CallwardenError::validation(format!(
                        "unknown report period `{s}` (expected today, week, month, or <n>d)"
                    ))
                }),
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Rounded mean, halves rounding up.
fn rounded_mean(sum: u64, count: u64) -> u32 {
    if count == 0 {
        return 0;
    }
    u32::try_from((sum * 2 + count) / (count * 2)).unwrap_or(u32::MAX)
}

/// Call counts for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: u32,
    pub connected: u32,
    pub missed: u32,
    pub rejected: u32,
}

/// Call counts for one contact within the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactStats {
    pub phone_number: String,
    pub contact_name: Option<String>,
    pub total: u32,
    pub connected: u32,
    pub missed: u32,
    pub pickup_rate: u32,
    pub total_duration_secs: u64,
}

/// Number of quality records in each status band.
///
/// Records without any recorded outcome have no pickup rate yet and are
/// left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityDistribution {
    pub excellent: u32,
    pub good: u32,
    pub fair: u32,
    pub poor: u32,
    pub critical: u32,
}

impl QualityDistribution {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a QualityRecord>) -> Self {
        let mut dist = Self::default();
        for record in records.into_iter().filter(|r| r.total_calls > 0) {
            let slot = match record.quality_status() {
                QualityStatus::Excellent => &mut dist.excellent,
                QualityStatus::Good => &mut dist.good,
                QualityStatus::Fair => &mut dist.fair,
                QualityStatus::Poor => &mut dist.poor,
                QualityStatus::Critical => &mut dist.critical,
            };
            *slot += 1;
        }
        dist
    }

    pub fn total(&self) -> u32 {
        self.excellent + self.good + self.fair + self.poor + self.critical
    }
}

/// Call history rollup for one owner and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSummary {
    pub owner_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Completed calls. Calls still awaiting an outcome are only counted
    /// in `in_progress`.
    pub total: u32,
    pub in_progress: u32,
    pub connected: u32,
    pub missed: u32,
    pub rejected: u32,
    pub pickup_rate: u32,
    /// Mean talk time of connected calls, in seconds.
    pub avg_duration: u32,
    /// Days that had at least one completed call, oldest first.
    pub daily_breakdown: Vec<DailyStats>,
    pub top_contacts: Vec<ContactStats>,
    pub quality_distribution: QualityDistribution,
}

/// Aggregate figures across every tracked number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub tracked_numbers: u32,
    pub limited_numbers: u32,
    pub calls_in_window: u32,
    pub total_limit: u32,
    pub usage_percentage: u32,
    /// Mean pickup rate of numbers with at least one recorded outcome.
    pub average_pickup_rate: u32,
    pub numbers_needing_warning: u32,
    pub numbers_needing_revocation: u32,
}

/// A number close to or at its limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttentionEntry {
    pub phone_number: String,
    pub calls_in_window: u32,
    pub limit: u32,
    pub remaining: u32,
    pub usage_percentage: u32,
    pub is_limited: bool,
    pub time_until_reset_secs: i64,
    pub quality_status: Option<QualityStatus>,
    pub consecutive_missed: u32,
}

/// A number ranked by lifetime call volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub phone_number: String,
    pub total_calls: u32,
    pub connected_calls: u32,
    pub pickup_rate: u32,
    pub quality_status: QualityStatus,
    pub calls_in_window: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub owner_id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: DashboardSummary,
    pub needs_attention: Vec<AttentionEntry>,
    pub most_active: Vec<ActivityEntry>,
}

/// Builds summaries and dashboards for one owner.
#[derive(Clone)]
pub struct Reporter {
    db: Database,
    settings: GovernorSettings,
    clock: Arc<dyn Clock>,
    rate: RateGovernor,
}

impl Reporter {
    pub fn new(db: Database, settings: GovernorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate: RateGovernor::new(db.clone(), settings, clock.clone()),
            db,
            settings,
            clock,
        }
    }

    /// Roll up the owner's call history for `period`.
    pub async fn summarize(
        &self,
        owner_id: &str,
        period: ReportPeriod,
    ) -> Result<CallSummary, CallwardenError> {
        let (start, end) = period.bounds(self.clock.now())?;
        let events = call_events::list_for_owner_between(&self.db, owner_id, start, end).await?;
        let records = quality::list_for_owner(&self.db, owner_id).await?;
        debug!(owner_id, events = events.len(), %start, %end, "summarizing call history");
        Ok(build_summary(owner_id, start, end, &events, &records))
    }

    /// Live view over every rate and quality record of the owner.
    ///
    /// Rate records whose window elapsed are reset and persisted first.
    pub async fn dashboard(&self, owner_id: &str) -> Result<Dashboard, CallwardenError> {
        let now = self.clock.now();
        let rates = self.rate.refresh_owner(owner_id).await?;
        let qualities = quality::list_for_owner(&self.db, owner_id).await?;
        let by_phone: HashMap<&str, &QualityRecord> = qualities
            .iter()
            .map(|q| (q.phone_number.as_str(), q))
            .collect();

        let calls_in_window = rates
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.calls_in_window));
        let total_limit = rates.iter().fold(0u32, |acc, r| acc.saturating_add(r.limit));
        let (pickup_sum, with_calls) = qualities
            .iter()
            .filter(|q| q.total_calls > 0)
            .fold((0u64, 0u64), |(sum, n), q| (sum + u64::from(q.pickup_rate), n + 1));

        let summary = DashboardSummary {
            tracked_numbers: count(rates.len()),
            limited_numbers: count(rates.iter().filter(|r| r.is_limited).count()),
            calls_in_window,
            total_limit,
            usage_percentage: percentage(calls_in_window, total_limit),
            average_pickup_rate: rounded_mean(pickup_sum, with_calls),
            numbers_needing_warning: count(
                qualities
                    .iter()
                    .filter(|q| q.needs_warning(self.settings.warning_threshold))
                    .count(),
            ),
            numbers_needing_revocation: count(
                qualities
                    .iter()
                    .filter(|q| q.needs_revocation(self.settings.revocation_threshold))
                    .count(),
            ),
        };

        let mut needs_attention: Vec<AttentionEntry> = rates
            .iter()
            .map(|r| {
                let q = by_phone.get(r.phone_number.as_str());
                AttentionEntry {
                    phone_number: r.phone_number.clone(),
                    calls_in_window: r.calls_in_window,
                    limit: r.limit,
                    remaining: r.remaining(),
                    usage_percentage: r.usage_percentage(),
                    is_limited: r.is_limited,
                    time_until_reset_secs: r.time_until_reset(now).num_seconds(),
                    quality_status: q.map(|q| q.quality_status()),
                    consecutive_missed: q.map_or(0, |q| q.consecutive_missed),
                }
            })
            .collect();
        needs_attention.sort_by(|a, b| b.usage_percentage.cmp(&a.usage_percentage));
        needs_attention.truncate(TOP_N);

        let window_calls: HashMap<&str, u32> = rates
            .iter()
            .map(|r| (r.phone_number.as_str(), r.calls_in_window))
            .collect();
        let mut most_active: Vec<ActivityEntry> = qualities
            .iter()
            .filter(|q| q.total_calls > 0)
            .map(|q| ActivityEntry {
                phone_number: q.phone_number.clone(),
                total_calls: q.total_calls,
                connected_calls: q.connected_calls,
                pickup_rate: q.pickup_rate,
                quality_status: q.quality_status(),
                calls_in_window: window_calls.get(q.phone_number.as_str()).copied(),
            })
            .collect();
        most_active.sort_by(|a, b| b.total_calls.cmp(&a.total_calls));
        most_active.truncate(TOP_N);

        Ok(Dashboard {
            owner_id: owner_id.to_string(),
            generated_at: now,
            summary,
            needs_attention,
            most_active,
        })
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn build_summary(
    owner_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    events: &[CallEvent],
    records: &[QualityRecord],
) -> CallSummary {
    let mut daily: BTreeMap<NaiveDate, DailyStats> = BTreeMap::new();
    let mut contacts: HashMap<&str, ContactStats> = HashMap::new();
    let (mut connected, mut missed, mut rejected) = (0u32, 0u32, 0u32);
    let mut connected_duration = 0u64;
    let (mut total, mut in_progress) = (0u32, 0u32);

    for event in events {
        let Some(outcome) = event.outcome else {
            in_progress += 1;
            continue;
        };
        total += 1;
        let date = event.created_at.date_naive();
        let day = daily.entry(date).or_insert_with(|| DailyStats {
            date,
            total: 0,
            connected: 0,
            missed: 0,
            rejected: 0,
        });
        let contact = contacts
            .entry(event.phone_number.as_str())
            .or_insert_with(|| ContactStats {
                phone_number: event.phone_number.clone(),
                contact_name: None,
                total: 0,
                connected: 0,
                missed: 0,
                pickup_rate: 0,
                total_duration_secs: 0,
            });

        day.total += 1;
        contact.total += 1;
        contact.total_duration_secs += u64::from(event.duration_secs);
        if event.contact_name.is_some() {
            contact.contact_name.clone_from(&event.contact_name);
        }
        match outcome {
            CallOutcome::Connected => {
                connected += 1;
                connected_duration += u64::from(event.duration_secs);
                day.connected += 1;
                contact.connected += 1;
            }
            CallOutcome::Missed => {
                missed += 1;
                day.missed += 1;
                contact.missed += 1;
            }
            CallOutcome::Rejected => {
                rejected += 1;
                day.rejected += 1;
            }
            CallOutcome::Failed => {}
        }
    }

    let mut top_contacts: Vec<ContactStats> = contacts
        .into_values()
        .map(|mut c| {
            c.pickup_rate = percentage(c.connected, c.total);
            c
        })
        .collect();
    top_contacts.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.phone_number.cmp(&b.phone_number))
    });
    top_contacts.truncate(TOP_N);

    CallSummary {
        owner_id: owner_id.to_string(),
        period_start: start,
        period_end: end,
        total,
        in_progress,
        connected,
        missed,
        rejected,
        pickup_rate: percentage(connected, total),
        avg_duration: rounded_mean(connected_duration, u64::from(connected)),
        daily_breakdown: daily.into_values().collect(),
        top_contacts,
        quality_distribution: QualityDistribution::from_records(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::CallGate;
    use callwarden_core::{CallKey, ManualClock};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap()
    }

    struct Fixture {
        gate: CallGate,
        reporter: Reporter,
        clock: ManualClock,
    }

    async fn fixture() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let clock = ManualClock::new(t0());
        let settings = GovernorSettings::default();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        Fixture {
            gate: CallGate::new(db.clone(), settings, shared.clone()),
            reporter: Reporter::new(db, settings, shared),
            clock,
        }
    }

    async fn call(f: &Fixture, phone: &str, outcome: CallOutcome, secs: u32) {
        let key = CallKey::new("acct-1", phone).unwrap();
        f.gate.placed(&key, Some(format!("contact {phone}"))).await.unwrap();
        f.gate.completed(&key, outcome, secs).await.unwrap();
    }

    #[test]
    fn period_bounds() {
        let now = t0();
        let midnight_next = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();

        let (start, end) = ReportPeriod::Today.bounds(now).unwrap();
        assert_eq!(end, midnight_next);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap());

        let (start, _) = ReportPeriod::Week.bounds(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap());

        assert!(ReportPeriod::LastDays(0).bounds(now).is_err());
        assert!(ReportPeriod::Range { start: now, end: now }.bounds(now).is_err());
    }

    #[test]
    fn period_parsing() {
        assert_eq!("today".parse::<ReportPeriod>().unwrap(), ReportPeriod::Today);
        assert_eq!("Week".parse::<ReportPeriod>().unwrap(), ReportPeriod::Week);
        assert_eq!("14d".parse::<ReportPeriod>().unwrap(), ReportPeriod::LastDays(14));
        assert!("fortnight".parse::<ReportPeriod>().is_err());
    }

    #[test]
    fn rounded_mean_rounds_half_up() {
        assert_eq!(rounded_mean(0, 0), 0);
        assert_eq!(rounded_mean(5, 2), 3);
        assert_eq!(rounded_mean(4, 3), 1);
    }

    #[tokio::test]
    async fn summarize_rolls_up_history() {
        let f = fixture().await;
        call(&f, "+1", CallOutcome::Connected, 60).await;
        call(&f, "+1", CallOutcome::Connected, 121).await;
        call(&f, "+2", CallOutcome::Missed, 0).await;
        f.clock.advance(Duration::days(1));
        call(&f, "+3", CallOutcome::Rejected, 0).await;

        let summary = f.reporter.summarize("acct-1", ReportPeriod::Week).await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.connected, 2);
        assert_eq!(summary.missed, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.pickup_rate, 50);
        assert_eq!(summary.avg_duration, 91);

        assert_eq!(summary.daily_breakdown.len(), 2);
        assert_eq!(summary.daily_breakdown[0].date, t0().date_naive());
        assert_eq!(summary.daily_breakdown[0].total, 3);
        assert_eq!(summary.daily_breakdown[1].rejected, 1);

        assert_eq!(summary.top_contacts[0].phone_number, "+1");
        assert_eq!(summary.top_contacts[0].total, 2);
        assert_eq!(summary.top_contacts[0].pickup_rate, 100);
        assert_eq!(summary.top_contacts[0].contact_name.as_deref(), Some("contact +1"));

        let dist = summary.quality_distribution;
        assert_eq!(dist.excellent, 1);
        assert_eq!(dist.critical, 2);
        assert_eq!(dist.total(), 3);
    }

    #[tokio::test]
    async fn summarize_today_excludes_older_days() {
        let f = fixture().await;
        call(&f, "+1", CallOutcome::Connected, 30).await;
        f.clock.advance(Duration::days(2));
        let summary = f.reporter.summarize("acct-1", ReportPeriod::Today).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pickup_rate, 0);
        assert_eq!(summary.avg_duration, 0);
        assert!(summary.daily_breakdown.is_empty());
        // Quality buckets are not period-filtered.
        assert_eq!(summary.quality_distribution.excellent, 1);
    }

    #[tokio::test]
    async fn dashboard_ranks_and_truncates() {
        let f = fixture().await;
        for i in 0..12u32 {
            let phone = format!("+1{i:02}");
            for _ in 0..=(i % 5) {
                call(&f, &phone, CallOutcome::Connected, 10).await;
            }
        }

        let dash = f.reporter.dashboard("acct-1").await.unwrap();
        assert_eq!(dash.summary.tracked_numbers, 12);
        assert_eq!(dash.needs_attention.len(), 10);
        assert_eq!(dash.most_active.len(), 10);
        assert_eq!(dash.needs_attention[0].usage_percentage, 50);
        assert_eq!(dash.most_active[0].total_calls, 5);
        assert!(dash
            .needs_attention
            .windows(2)
            .all(|w| w[0].usage_percentage >= w[1].usage_percentage));
        assert_eq!(dash.summary.average_pickup_rate, 100);

        let calls: u32 = (0..12u32).map(|i| i % 5 + 1).sum();
        assert_eq!(dash.summary.calls_in_window, calls);
        assert_eq!(dash.summary.total_limit, 120);
        assert_eq!(dash.summary.usage_percentage, percentage(calls, 120));
    }

    #[tokio::test]
    async fn dashboard_resets_elapsed_windows() {
        let f = fixture().await;
        for _ in 0..10 {
            call(&f, "+1", CallOutcome::Missed, 0).await;
        }
        let dash = f.reporter.dashboard("acct-1").await.unwrap();
        assert_eq!(dash.summary.limited_numbers, 1);
        assert_eq!(dash.summary.numbers_needing_revocation, 1);

        f.clock.advance(Duration::hours(24));
        let dash = f.reporter.dashboard("acct-1").await.unwrap();
        assert_eq!(dash.summary.limited_numbers, 0);
        assert_eq!(dash.summary.calls_in_window, 0);
        assert_eq!(dash.needs_attention[0].remaining, 10);
        assert_eq!(dash.needs_attention[0].quality_status, Some(QualityStatus::Critical));
    }

    #[tokio::test]
    async fn summarize_leaves_open_calls_out_of_rates() {
        let f = fixture().await;
        call(&f, "+1", CallOutcome::Connected, 40).await;
        let key = CallKey::new("acct-1", "+2").unwrap();
        f.gate.placed(&key, None).await.unwrap();

        let summary = f.reporter.summarize("acct-1", ReportPeriod::Today).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.pickup_rate, 100);
        assert_eq!(summary.daily_breakdown[0].total, 1);
        assert_eq!(summary.top_contacts.len(), 1);
        assert_eq!(summary.top_contacts[0].phone_number, "+1");

        f.gate.completed(&key, CallOutcome::Missed, 0).await.unwrap();
        let summary = f.reporter.summarize("acct-1", ReportPeriod::Today).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.in_progress, 0);
        assert_eq!(summary.pickup_rate, 50);
    }

    #[tokio::test]
    async fn quality_rows_without_outcomes_are_not_ranked() {
        let f = fixture().await;
        call(&f, "+1", CallOutcome::Connected, 10).await;
        let idle = CallKey::new("acct-1", "+9").unwrap();
        let record = f.gate.quality().reset_warning(&idle).await.unwrap();
        assert_eq!(record.total_calls, 0);

        let dash = f.reporter.dashboard("acct-1").await.unwrap();
        assert_eq!(dash.most_active.len(), 1);
        assert_eq!(dash.most_active[0].phone_number, "+1");
        assert_eq!(dash.summary.average_pickup_rate, 100);

        let summary = f.reporter.summarize("acct-1", ReportPeriod::Week).await.unwrap();
        let dist = summary.quality_distribution;
        assert_eq!(dist.excellent, 1);
        assert_eq!(dist.critical, 0);
        assert_eq!(dist.total(), 1);
    }

    #[tokio::test]
    async fn dashboard_serializes_snake_case() {
        let f = fixture().await;
        call(&f, "+1", CallOutcome::Connected, 10).await;
        let dash = f.reporter.dashboard("acct-1").await.unwrap();
        let json = serde_json::to_value(&dash).unwrap();
        assert!(json["summary"]["usage_percentage"].is_u64());
        assert_eq!(json["most_active"][0]["quality_status"], "excellent");
    }
}
