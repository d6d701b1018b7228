// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call history log operations.

use std::str::FromStr;

use callwarden_core::{CallDirection, CallEvent, CallOutcome, CallwardenError};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::{format_ts, map_tr_err, read_required_ts, read_ts, Database};

const COLUMNS: &str = "id, owner_id, phone_number, contact_name, direction, outcome, \
                       duration_secs, created_at, ended_at";

/// Parse a strum-encoded text column.
fn parse_column<T: FromStr>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallEvent> {
    let direction: String = row.get(4)?;
    let outcome: Option<String> = row.get(5)?;
    Ok(CallEvent {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        phone_number: row.get(2)?,
        contact_name: row.get(3)?,
        direction: parse_column::<CallDirection>(4, &direction)?,
        outcome: outcome
            .map(|o| parse_column::<CallOutcome>(5, &o))
            .transpose()?,
        duration_secs: row.get(6)?,
        created_at: read_required_ts(row, 7)?,
        ended_at: read_ts(row, 8)?,
    })
}

/// Append an event to the log.
pub async fn insert(db: &Database, event: &CallEvent) -> Result<(), CallwardenError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.execute(
                &format!(
                    "INSERT INTO call_events ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    event.id,
                    event.owner_id,
                    event.phone_number,
                    event.contact_name,
                    event.direction.to_string(),
                    event.outcome.map(|o| o.to_string()),
                    event.duration_secs,
                    format_ts(event.created_at),
                    event.ended_at.map(format_ts),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an event by ID.
pub async fn get(db: &Database, id: &str) -> Result<Option<CallEvent>, CallwardenError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM call_events WHERE id = ?1"),
                params![id],
                row_to_event,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Record the terminal outcome of a logged call.
///
/// Returns `false` when no event has the given ID.
pub async fn complete(
    db: &Database,
    id: &str,
    outcome: CallOutcome,
    duration_secs: u32,
    ended_at: DateTime<Utc>,
) -> Result<bool, CallwardenError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE call_events SET outcome = ?2, duration_secs = ?3, ended_at = ?4
                 WHERE id = ?1",
                params![id, outcome.to_string(), duration_secs, format_ts(ended_at)],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Oldest event for a key that has no outcome yet.
///
/// Outcomes close calls first-in-first-out; insertion order breaks ties
/// between calls opened in the same millisecond.
pub async fn oldest_open(
    db: &Database,
    owner_id: &str,
    phone_number: &str,
) -> Result<Option<CallEvent>, CallwardenError> {
    let owner_id = owner_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM call_events
                     WHERE owner_id = ?1 AND phone_number = ?2 AND outcome IS NULL
                     ORDER BY created_at ASC, rowid ASC LIMIT 1"
                ),
                params![owner_id, phone_number],
                row_to_event,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Events of an owner created in `[start, end)`, oldest first.
pub async fn list_for_owner_between(
    db: &Database,
    owner_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<CallEvent>, CallwardenError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM call_events
                 WHERE owner_id = ?1 AND created_at >= ?2 AND created_at < ?3
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(
                params![owner_id, format_ts(start), format_ts(end)],
                row_to_event,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use callwarden_core::CallKey;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn event(phone: &str, at: DateTime<Utc>) -> CallEvent {
        let key = CallKey::new("acct-1", phone).unwrap();
        CallEvent::started(&key, CallDirection::Outbound, Some("Ada".into()), at)
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let ev = event("+1", t0());
        insert(&db, &ev).await.unwrap();
        assert_eq!(get(&db, &ev.id).await.unwrap(), Some(ev));
        assert_eq!(get(&db, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn complete_sets_outcome() {
        let db = Database::open_in_memory().await.unwrap();
        let ev = event("+1", t0());
        insert(&db, &ev).await.unwrap();

        let open = oldest_open(&db, "acct-1", "+1").await.unwrap().unwrap();
        assert_eq!(open.id, ev.id);

        let end = t0() + Duration::seconds(42);
        assert!(complete(&db, &ev.id, CallOutcome::Connected, 42, end).await.unwrap());
        assert!(!complete(&db, "missing", CallOutcome::Missed, 0, end).await.unwrap());

        let stored = get(&db, &ev.id).await.unwrap().unwrap();
        assert_eq!(stored.outcome, Some(CallOutcome::Connected));
        assert_eq!(stored.duration_secs, 42);
        assert_eq!(stored.ended_at, Some(end));
        assert!(oldest_open(&db, "acct-1", "+1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_calls_close_first_in_first_out() {
        let db = Database::open_in_memory().await.unwrap();
        let first = event("+1", t0());
        let second = event("+1", t0() + Duration::minutes(1));
        // Same millisecond as `second`, inserted after it.
        let third = event("+1", t0() + Duration::minutes(1));
        for ev in [&second, &first, &third] {
            insert(&db, ev).await.unwrap();
        }

        let end = t0() + Duration::minutes(5);
        for expected in [&first, &second, &third] {
            let open = oldest_open(&db, "acct-1", "+1").await.unwrap().unwrap();
            assert_eq!(open.id, expected.id);
            complete(&db, &open.id, CallOutcome::Missed, 0, end).await.unwrap();
        }
        assert!(oldest_open(&db, "acct-1", "+1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_between_is_half_open_and_ordered() {
        let db = Database::open_in_memory().await.unwrap();
        let late = event("+1", t0() + Duration::hours(2));
        let early = event("+2", t0());
        let outside = event("+3", t0() + Duration::hours(5));
        for ev in [&late, &early, &outside] {
            insert(&db, ev).await.unwrap();
        }

        let events = list_for_owner_between(&db, "acct-1", t0(), t0() + Duration::hours(5))
            .await
            .unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }
}
