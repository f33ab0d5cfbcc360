//! Decision workflow: approve, reject, undo, and bulk decisions.
//!
//! All balance movement funnels through [`apply_delta_tx`], which locks
//! the payment mode row before touching it. Callers hold the entry row
//! lock first (entry, then payment mode) so concurrent decisions on the
//! same entry serialize instead of double-applying.

use anyhow::anyhow;
use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use payloads::{
    AuditAction, EditRequestStatus, EntryId, EntryStatus, PaymentModeId,
    TransactionType, requests, responses,
};

use super::{
    DbEntry, StoreError, ValidatedActor, audit, get_entry_for_update_tx,
    ledger, require_approver, require_reason,
};
use crate::time::TimeSource;

/// Balance of the snapshot payment mode before and after a delta
/// application.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BalanceSnapshot {
    pub opening: Decimal,
    pub current: Decimal,
}

/// Apply a signed delta to a payment mode balance.
///
/// Locks the payment mode row with `SELECT ... FOR UPDATE`; the read
/// and the update therefore observe a consistent balance even under
/// concurrent decisions. This is the only statement in the crate that
/// writes `payment_modes.current_balance`.
pub(crate) async fn apply_delta_tx(
    payment_mode_id: &PaymentModeId,
    delta: Decimal,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<BalanceSnapshot, StoreError> {
    let opening: Decimal = sqlx::query_scalar(
        "SELECT current_balance FROM payment_modes WHERE id = $1 FOR UPDATE;",
    )
    .bind(payment_mode_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::PaymentModeNotFound)?;

    let current: Decimal = sqlx::query_scalar(
        "UPDATE payment_modes
            SET current_balance = current_balance + $1
            WHERE id = $2
            RETURNING current_balance;",
    )
    .bind(delta)
    .bind(payment_mode_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(BalanceSnapshot { opening, current })
}

/// The signed balance deltas an entry applies when it takes effect.
/// The first listed mode is the one whose balance gets snapshotted
/// onto the entry (the source mode for self-transfers).
fn balance_deltas(
    entry: &DbEntry,
) -> Result<Vec<(PaymentModeId, Decimal)>, StoreError> {
    match entry.transaction_type {
        TransactionType::Credit => {
            let mode = required(entry.payment_mode_id, "payment_mode_id")?;
            let amount = required(entry.received_amount, "received_amount")?;
            Ok(vec![(mode, amount)])
        }
        TransactionType::Debit => {
            let mode = required(entry.payment_mode_id, "payment_mode_id")?;
            let amount = required(entry.payment_amount, "payment_amount")?;
            Ok(vec![(mode, -amount)])
        }
        TransactionType::SelfTransfer => {
            let from =
                required(entry.from_payment_mode_id, "from_payment_mode_id")?;
            let to = required(entry.to_payment_mode_id, "to_payment_mode_id")?;
            let amount = required(entry.transfer_amount, "transfer_amount")?;
            Ok(vec![(from, -amount), (to, amount)])
        }
    }
}

pub(crate) fn required<T>(
    value: Option<T>,
    field: &str,
) -> Result<T, StoreError> {
    value.ok_or_else(|| {
        StoreError::from(anyhow!("entry is missing {field}"))
    })
}

/// Apply the entry's balance effect, returning the snapshot of the
/// entry's primary payment mode.
pub(crate) async fn apply_entry_balance_tx(
    entry: &DbEntry,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<BalanceSnapshot, StoreError> {
    let deltas = balance_deltas(entry)?;
    let mut snapshot = None;
    for (mode, delta) in deltas {
        let applied = apply_delta_tx(&mode, delta, tx).await?;
        if snapshot.is_none() {
            snapshot = Some(applied);
        }
    }
    snapshot.ok_or_else(|| {
        StoreError::from(anyhow!("entry produced no balance deltas"))
    })
}

/// Undo the entry's balance effect by applying each delta negated.
pub(crate) async fn reverse_entry_balance_tx(
    entry: &DbEntry,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), StoreError> {
    for (mode, delta) in balance_deltas(entry)? {
        apply_delta_tx(&mode, -delta, tx).await?;
    }
    Ok(())
}

pub async fn approve_entry(
    actor: &ValidatedActor,
    entry_id: &EntryId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    require_approver(actor)?;
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;
    let entry = get_entry_for_update_tx(entry_id, &mut tx).await?;
    if entry.is_deleted {
        return Err(StoreError::EntryDeleted);
    }
    if entry.status != EntryStatus::Pending {
        return Err(StoreError::EntryNotPending);
    }

    let previous = entry.snapshot()?;
    let snapshot = apply_entry_balance_tx(&entry, &mut tx).await?;

    let approved = sqlx::query_as::<_, DbEntry>(
        "UPDATE ledger_entries
            SET status = 'approved',
                rejection_reason = NULL,
                opening_balance = $1,
                current_balance = $2,
                approved_by = $3,
                approved_at = $4
            WHERE id = $5
            RETURNING *;",
    )
    .bind(snapshot.opening)
    .bind(snapshot.current)
    .bind(actor_id)
    .bind(time_source.now().to_sqlx())
    .bind(entry.id)
    .fetch_one(&mut *tx)
    .await?;

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::Approved,
            previous_data: Some(previous),
            new_data: Some(approved.snapshot()?),
            reason: None,
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    ledger::get_entry_response(entry_id, pool).await
}

pub async fn reject_entry(
    actor: &ValidatedActor,
    entry_id: &EntryId,
    rejection_reason: Option<&str>,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    require_approver(actor)?;
    let reason =
        require_reason(rejection_reason.unwrap_or_default())?.to_string();
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;
    let entry = get_entry_for_update_tx(entry_id, &mut tx).await?;
    if entry.is_deleted {
        return Err(StoreError::EntryDeleted);
    }
    if entry.status != EntryStatus::Pending {
        return Err(StoreError::EntryNotPending);
    }

    let previous = entry.snapshot()?;
    let rejected = sqlx::query_as::<_, DbEntry>(
        "UPDATE ledger_entries
            SET status = 'rejected',
                rejection_reason = $1
            WHERE id = $2
            RETURNING *;",
    )
    .bind(&reason)
    .bind(entry.id)
    .fetch_one(&mut *tx)
    .await?;

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::Rejected,
            previous_data: Some(previous),
            new_data: Some(rejected.snapshot()?),
            reason: Some(&reason),
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    ledger::get_entry_response(entry_id, pool).await
}

/// Put a decided entry back to pending. Undoing an approval reverses
/// the balance effect and clears the approval snapshot; undoing a
/// rejection clears the rejection reason. Refused while an edit
/// request is pending, otherwise a later edit approval would reverse
/// a delta that was already unwound here.
pub async fn undo_decision(
    actor: &ValidatedActor,
    entry_id: &EntryId,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    require_approver(actor)?;
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;
    let entry = get_entry_for_update_tx(entry_id, &mut tx).await?;
    if entry.is_deleted {
        return Err(StoreError::EntryDeleted);
    }
    if entry.edit_request_status == Some(EditRequestStatus::Pending) {
        return Err(StoreError::EditRequestPending);
    }

    let previous = entry.snapshot()?;
    let (undone, reason) = match entry.status {
        EntryStatus::Pending => return Err(StoreError::NoDecisionToUndo),
        EntryStatus::Approved => {
            reverse_entry_balance_tx(&entry, &mut tx).await?;
            let undone = sqlx::query_as::<_, DbEntry>(
                "UPDATE ledger_entries
                    SET status = 'pending',
                        opening_balance = NULL,
                        current_balance = NULL,
                        approved_by = NULL,
                        approved_at = NULL
                    WHERE id = $1
                    RETURNING *;",
            )
            .bind(entry.id)
            .fetch_one(&mut *tx)
            .await?;
            (undone, "Reverted approval")
        }
        EntryStatus::Rejected => {
            let undone = sqlx::query_as::<_, DbEntry>(
                "UPDATE ledger_entries
                    SET status = 'pending',
                        rejection_reason = NULL
                    WHERE id = $1
                    RETURNING *;",
            )
            .bind(entry.id)
            .fetch_one(&mut *tx)
            .await?;
            (undone, "Reverted rejection")
        }
    };

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::Updated,
            previous_data: Some(previous),
            new_data: Some(undone.snapshot()?),
            reason: Some(reason),
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    ledger::get_entry_response(entry_id, pool).await
}

/// Decide a batch of entries, one transaction per entry. A failure on
/// one id never rolls back its siblings; the caller gets a per-id
/// outcome list instead.
pub async fn bulk_decide(
    actor: &ValidatedActor,
    details: &requests::BulkDecide,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::BulkDecisionResult, StoreError> {
    require_approver(actor)?;
    if details.action == requests::DecisionAction::Reject {
        require_reason(details.rejection_reason.as_deref().unwrap_or_default())?;
    }

    let mut outcomes = Vec::with_capacity(details.entry_ids.len());
    for entry_id in &details.entry_ids {
        let result = match details.action {
            requests::DecisionAction::Approve => {
                approve_entry(actor, entry_id, time_source, pool).await
            }
            requests::DecisionAction::Reject => {
                reject_entry(
                    actor,
                    entry_id,
                    details.rejection_reason.as_deref(),
                    time_source,
                    pool,
                )
                .await
            }
        };
        outcomes.push(match result {
            Ok(_) => responses::BulkEntryOutcome {
                entry_id: *entry_id,
                success: true,
                error: None,
            },
            Err(e) => responses::BulkEntryOutcome {
                entry_id: *entry_id,
                success: false,
                error: Some(e.to_string()),
            },
        });
    }

    let succeeded = outcomes.iter().filter(|o| o.success).count();
    let failed = outcomes.len() - succeeded;
    Ok(responses::BulkDecisionResult {
        outcomes,
        succeeded,
        failed,
    })
}
