// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate limit record persistence.
//!
//! Read-modify-write sequences run inside one IMMEDIATE transaction within a
//! single `call()`, and the call counter is only ever raised by a conditional
//! `UPDATE ... WHERE calls_in_window < call_limit`. Two concurrent placements
//! against the same key therefore cannot both slip under the limit.

use callwarden_core::{CallKey, CallwardenError, RateLimitRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::database::{format_ts, map_tr_err, read_ts, Database};

const COLUMNS: &str = "owner_id, phone_number, calls_in_window, window_start, call_limit, \
                       is_limited, limit_reset_at, last_call_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RateLimitRecord> {
    Ok(RateLimitRecord {
        owner_id: row.get(0)?,
        phone_number: row.get(1)?,
        calls_in_window: row.get(2)?,
        window_start: read_ts(row, 3)?,
        limit: row.get(4)?,
        is_limited: row.get(5)?,
        limit_reset_at: read_ts(row, 6)?,
        last_call_at: read_ts(row, 7)?,
    })
}

fn load(conn: &Connection, key: &CallKey) -> rusqlite::Result<Option<RateLimitRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM call_limits WHERE owner_id = ?1 AND phone_number = ?2"),
        params![key.owner_id, key.phone_number],
        row_to_record,
    )
    .optional()
}

/// Insert a fresh row anchored at `now` unless one exists. Returns whether a row was created.
fn insert_if_absent(
    conn: &Connection,
    key: &CallKey,
    default_limit: u32,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO call_limits (owner_id, phone_number, call_limit, window_start)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(owner_id, phone_number) DO NOTHING",
        params![key.owner_id, key.phone_number, default_limit, format_ts(now)],
    )?;
    Ok(inserted > 0)
}

fn load_or_insert(
    conn: &Connection,
    key: &CallKey,
    default_limit: u32,
    now: DateTime<Utc>,
) -> rusqlite::Result<RateLimitRecord> {
    if insert_if_absent(conn, key, default_limit, now)? {
        tracing::debug!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            limit = default_limit,
            "rate limit record created"
        );
    }
    load(conn, key)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn store(conn: &Connection, record: &RateLimitRecord) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE call_limits SET
            calls_in_window = ?3,
            window_start = ?4,
            call_limit = ?5,
            is_limited = ?6,
            limit_reset_at = ?7,
            last_call_at = ?8,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE owner_id = ?1 AND phone_number = ?2",
        params![
            record.owner_id,
            record.phone_number,
            record.calls_in_window,
            record.window_start.map(format_ts),
            record.limit,
            record.is_limited,
            record.limit_reset_at.map(format_ts),
            record.last_call_at.map(format_ts),
        ],
    )?;
    Ok(())
}

/// Add one call if, and only if, the record is below its limit.
///
/// `is_limited` and `limit_reset_at` are derived from the pre-update row in
/// the same statement. Returns `None` when the row was already at its limit.
fn increment_below_limit(
    conn: &Connection,
    key: &CallKey,
    now: DateTime<Utc>,
) -> rusqlite::Result<Option<RateLimitRecord>> {
    conn.query_row(
        &format!(
            "UPDATE call_limits SET
                calls_in_window = calls_in_window + 1,
                last_call_at = ?3,
                is_limited = (calls_in_window + 1 >= call_limit),
                limit_reset_at = CASE
                    WHEN calls_in_window + 1 >= call_limit
                    THEN strftime('%Y-%m-%dT%H:%M:%fZ', window_start, '+24 hours')
                    ELSE NULL
                END,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE owner_id = ?1 AND phone_number = ?2 AND calls_in_window < call_limit
             RETURNING {COLUMNS}"
        ),
        params![key.owner_id, key.phone_number, format_ts(now)],
        row_to_record,
    )
    .optional()
}

/// Get the record for a key, if it exists.
pub async fn get(db: &Database, key: &CallKey) -> Result<Option<RateLimitRecord>, CallwardenError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> { load(conn, &key) })
        .await
        .map_err(map_tr_err)
}

/// Get the record for a key, creating it with `default_limit` if absent.
pub async fn get_or_create(
    db: &Database,
    key: &CallKey,
    default_limit: u32,
    now: DateTime<Utc>,
) -> Result<RateLimitRecord, CallwardenError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            load_or_insert(conn, &key, default_limit, now)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the mutable columns of an existing record.
pub async fn save(db: &Database, record: &RateLimitRecord) -> Result<(), CallwardenError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> { store(conn, &record) })
        .await
        .map_err(map_tr_err)
}

/// Load (creating if needed), mutate, and persist a record in one transaction.
///
/// Returns the persisted record together with whatever `mutate` returned.
pub async fn update<F, T>(
    db: &Database,
    key: &CallKey,
    default_limit: u32,
    now: DateTime<Utc>,
    mutate: F,
) -> Result<(RateLimitRecord, T), CallwardenError>
where
    F: FnOnce(&mut RateLimitRecord) -> T + Send + 'static,
    T: Send + 'static,
{
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record = load_or_insert(&tx, &key, default_limit, now)?;
            let out = mutate(&mut record);
            store(&tx, &record)?;
            tx.commit()?;
            Ok((record, out))
        })
        .await
        .map_err(map_tr_err)
}

/// Apply `prepare` (typically the window reset) and then the conditional
/// increment, atomically.
///
/// Returns the final record and whether the call was counted.
pub async fn update_and_increment<F>(
    db: &Database,
    key: &CallKey,
    default_limit: u32,
    now: DateTime<Utc>,
    prepare: F,
) -> Result<(RateLimitRecord, bool), CallwardenError>
where
    F: FnOnce(&mut RateLimitRecord) + Send + 'static,
{
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record = load_or_insert(&tx, &key, default_limit, now)?;
            prepare(&mut record);
            store(&tx, &record)?;
            let result = match increment_below_limit(&tx, &key, now)? {
                Some(updated) => (updated, true),
                None => (record, false),
            };
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(map_tr_err)
}

/// Mutate every record of an owner in one transaction; rows for which
/// `mutate` returns `true` are written back.
///
/// Returns all of the owner's records (after mutation), ordered by phone number.
pub async fn update_all_for_owner<F>(
    db: &Database,
    owner_id: &str,
    mut mutate: F,
) -> Result<Vec<RateLimitRecord>, CallwardenError>
where
    F: FnMut(&mut RateLimitRecord) -> bool + Send + 'static,
{
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut records = select_for_owner(&tx, &owner_id)?;
            for record in records.iter_mut() {
                if mutate(record) {
                    store(&tx, record)?;
                }
            }
            tx.commit()?;
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

fn select_for_owner(conn: &Connection, owner_id: &str) -> rusqlite::Result<Vec<RateLimitRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM call_limits WHERE owner_id = ?1 ORDER BY phone_number"
    ))?;
    let rows = stmt.query_map(params![owner_id], row_to_record)?;
    rows.collect()
}

/// List every record of an owner as stored, without resetting anything.
pub async fn list_for_owner(
    db: &Database,
    owner_id: &str,
) -> Result<Vec<RateLimitRecord>, CallwardenError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> { select_for_owner(conn, &owner_id) })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn key(phone: &str) -> CallKey {
        CallKey::new("acct-1", phone).unwrap()
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get(&db, &key("+1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let first = get_or_create(&db, &key("+1"), 10, t0()).await.unwrap();
        assert_eq!(first.limit, 10);
        assert_eq!(first.calls_in_window, 0);
        assert_eq!(first.window_start, Some(t0()));

        // A later call with another default does not overwrite the row.
        let later = t0() + Duration::hours(1);
        let second = get_or_create(&db, &key("+1"), 99, later).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn save_roundtrips_all_columns() {
        let db = Database::open_in_memory().await.unwrap();
        let mut record = get_or_create(&db, &key("+1"), 2, t0()).await.unwrap();
        record.record_call(t0());
        record.record_call(t0());
        save(&db, &record).await.unwrap();

        let stored = get(&db, &key("+1")).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert!(stored.is_limited);
        assert_eq!(stored.limit_reset_at, Some(t0() + Duration::hours(24)));
    }

    #[tokio::test]
    async fn conditional_increment_stops_at_limit() {
        let db = Database::open_in_memory().await.unwrap();
        let k = key("+1");
        for n in 1..=3 {
            let (record, counted) = update_and_increment(&db, &k, 3, t0(), |_| {})
                .await
                .unwrap();
            assert!(counted);
            assert_eq!(record.calls_in_window, n);
        }

        let (record, counted) = update_and_increment(&db, &k, 3, t0(), |_| {})
            .await
            .unwrap();
        assert!(!counted);
        assert_eq!(record.calls_in_window, 3);
        assert!(record.is_limited);
        assert_eq!(record.limit_reset_at, Some(t0() + Duration::hours(24)));
    }

    #[tokio::test]
    async fn concurrent_increments_never_exceed_limit() {
        let db = Database::open_in_memory().await.unwrap();
        let k = key("+1");
        get_or_create(&db, &k, 5, t0()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            let k = k.clone();
            handles.push(tokio::spawn(async move {
                update_and_increment(&db, &k, 5, t0(), |_| {}).await.unwrap().1
            }));
        }
        let mut counted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                counted += 1;
            }
        }
        assert_eq!(counted, 5);
        let stored = get(&db, &k).await.unwrap().unwrap();
        assert_eq!(stored.calls_in_window, 5);
    }

    #[tokio::test]
    async fn update_applies_mutation_in_transaction() {
        let db = Database::open_in_memory().await.unwrap();
        let k = key("+1");
        let (record, old_limit) = update(&db, &k, 10, t0(), |r| {
            let old = r.limit;
            r.set_limit(4);
            old
        })
        .await
        .unwrap();
        assert_eq!(old_limit, 10);
        assert_eq!(record.limit, 4);
        assert_eq!(get(&db, &k).await.unwrap().unwrap().limit, 4);
    }

    #[tokio::test]
    async fn update_all_for_owner_writes_only_changed_rows() {
        let db = Database::open_in_memory().await.unwrap();
        get_or_create(&db, &key("+1"), 10, t0()).await.unwrap();
        get_or_create(&db, &key("+2"), 10, t0()).await.unwrap();
        get_or_create(&db, &CallKey::new("acct-2", "+3").unwrap(), 10, t0())
            .await
            .unwrap();

        let records = update_all_for_owner(&db, "acct-1", |r| {
            if r.phone_number == "+2" {
                r.set_limit(7);
                true
            } else {
                r.set_limit(1);
                false
            }
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 2);

        let stored = list_for_owner(&db, "acct-1").await.unwrap();
        assert_eq!(stored[0].limit, 10, "unchanged row must not be written");
        assert_eq!(stored[1].limit, 7);
    }
}
