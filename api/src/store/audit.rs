//! Append-only audit trail.
//!
//! Every mutation of a ledger entry records a row here inside the same
//! transaction, so an entry and its audit history can never disagree.
//! Rows are only ever inserted.

use jiff_sqlx::ToSqlx;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use payloads::{
    AuditAction, AuditLogId, EntryId, UserId,
    responses::{AuditLogEntry, UserIdentity},
};

use super::StoreError;
use crate::time::TimeSource;

pub(crate) struct AuditRecord<'a> {
    pub entry_id: &'a EntryId,
    pub action: AuditAction,
    pub previous_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub reason: Option<&'a str>,
    pub performed_by: &'a UserId,
}

pub(crate) async fn record_tx(
    record: AuditRecord<'_>,
    time_source: &TimeSource,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO audit_logs (
                entry_id,
                action,
                previous_data,
                new_data,
                reason,
                performed_by,
                performed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7);",
    )
    .bind(record.entry_id)
    .bind(record.action)
    .bind(record.previous_data)
    .bind(record.new_data)
    .bind(record.reason)
    .bind(record.performed_by)
    .bind(time_source.now().to_sqlx())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
struct AuditRow {
    id: AuditLogId,
    entry_id: EntryId,
    action: AuditAction,
    previous_data: Option<serde_json::Value>,
    new_data: Option<serde_json::Value>,
    reason: Option<String>,
    performed_by: UserId,
    performed_by_username: String,
    #[sqlx(try_from = "jiff_sqlx::Timestamp")]
    performed_at: jiff::Timestamp,
}

impl From<AuditRow> for AuditLogEntry {
    fn from(row: AuditRow) -> Self {
        AuditLogEntry {
            id: row.id,
            entry_id: row.entry_id,
            action: row.action,
            previous_data: row.previous_data,
            new_data: row.new_data,
            reason: row.reason,
            performed_by: UserIdentity {
                user_id: row.performed_by,
                username: row.performed_by_username,
            },
            performed_at: row.performed_at,
        }
    }
}

/// Chronological history for one entry, oldest first.
pub async fn list_for_entry(
    entry_id: &EntryId,
    pool: &PgPool,
) -> Result<Vec<AuditLogEntry>, StoreError> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT a.*, u.username AS performed_by_username
            FROM audit_logs a
            JOIN users u ON a.performed_by = u.id
            WHERE a.entry_id = $1
            ORDER BY a.id;",
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
