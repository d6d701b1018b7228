// SPDX-FileCopyrightText: 2026 Callwarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quality record persistence.

use callwarden_core::{CallKey, CallwardenError, QualityRecord};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::database::{format_ts, map_tr_err, read_ts, Database};

const COLUMNS: &str = "owner_id, phone_number, total_calls, connected_calls, missed_calls, \
                       rejected_calls, failed_calls, consecutive_missed, consecutive_connected, \
                       pickup_rate, warning_sent, warning_sent_at, last_call_at, \
                       last_connected_at, last_missed_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<QualityRecord> {
    Ok(QualityRecord {
        owner_id: row.get(0)?,
        phone_number: row.get(1)?,
        total_calls: row.get(2)?,
        connected_calls: row.get(3)?,
        missed_calls: row.get(4)?,
        rejected_calls: row.get(5)?,
        failed_calls: row.get(6)?,
        consecutive_missed: row.get(7)?,
        consecutive_connected: row.get(8)?,
        pickup_rate: row.get(9)?,
        warning_sent: row.get(10)?,
        warning_sent_at: read_ts(row, 11)?,
        last_call_at: read_ts(row, 12)?,
        last_connected_at: read_ts(row, 13)?,
        last_missed_at: read_ts(row, 14)?,
    })
}

fn load(conn: &Connection, key: &CallKey) -> rusqlite::Result<Option<QualityRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM call_quality WHERE owner_id = ?1 AND phone_number = ?2"),
        params![key.owner_id, key.phone_number],
        row_to_record,
    )
    .optional()
}

fn load_or_insert(conn: &Connection, key: &CallKey) -> rusqlite::Result<QualityRecord> {
    let inserted = conn.execute(
        "INSERT INTO call_quality (owner_id, phone_number) VALUES (?1, ?2)
         ON CONFLICT(owner_id, phone_number) DO NOTHING",
        params![key.owner_id, key.phone_number],
    )?;
    if inserted > 0 {
        tracing::debug!(
            owner_id = %key.owner_id,
            phone_number = %key.phone_number,
            "quality record created"
        );
    }
    load(conn, key)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn store(conn: &Connection, record: &QualityRecord) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE call_quality SET
            total_calls = ?3,
            connected_calls = ?4,
            missed_calls = ?5,
            rejected_calls = ?6,
            failed_calls = ?7,
            consecutive_missed = ?8,
            consecutive_connected = ?9,
            pickup_rate = ?10,
            warning_sent = ?11,
            warning_sent_at = ?12,
            last_call_at = ?13,
            last_connected_at = ?14,
            last_missed_at = ?15,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE owner_id = ?1 AND phone_number = ?2",
        params![
            record.owner_id,
            record.phone_number,
            record.total_calls,
            record.connected_calls,
            record.missed_calls,
            record.rejected_calls,
            record.failed_calls,
            record.consecutive_missed,
            record.consecutive_connected,
            record.pickup_rate,
            record.warning_sent,
            record.warning_sent_at.map(format_ts),
            record.last_call_at.map(format_ts),
            record.last_connected_at.map(format_ts),
            record.last_missed_at.map(format_ts),
        ],
    )?;
    Ok(())
}

/// Get the record for a key, if it exists.
pub async fn get(db: &Database, key: &CallKey) -> Result<Option<QualityRecord>, CallwardenError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> { load(conn, &key) })
        .await
        .map_err(map_tr_err)
}

/// Get the record for a key, creating a zeroed one if absent.
pub async fn get_or_create(db: &Database, key: &CallKey) -> Result<QualityRecord, CallwardenError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> { load_or_insert(conn, &key) })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the mutable columns of an existing record.
pub async fn save(db: &Database, record: &QualityRecord) -> Result<(), CallwardenError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> { store(conn, &record) })
        .await
        .map_err(map_tr_err)
}

/// Load (creating if needed), mutate, and persist a record in one transaction.
pub async fn update<F, T>(
    db: &Database,
    key: &CallKey,
    mutate: F,
) -> Result<(QualityRecord, T), CallwardenError>
where
    F: FnOnce(&mut QualityRecord) -> T + Send + 'static,
    T: Send + 'static,
{
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut record = load_or_insert(&tx, &key)?;
            let out = mutate(&mut record);
            store(&tx, &record)?;
            tx.commit()?;
            Ok((record, out))
        })
        .await
        .map_err(map_tr_err)
}

/// List every quality record of an owner, ordered by phone number.
pub async fn list_for_owner(
    db: &Database,
    owner_id: &str,
) -> Result<Vec<QualityRecord>, CallwardenError> {
    let owner_id = owner_id.to_string();
    db.connection()
        .call(move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM call_quality WHERE owner_id = ?1 ORDER BY phone_number"
            ))?;
            let rows = stmt.query_map(params![owner_id], row_to_record)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
