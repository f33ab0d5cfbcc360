//! Edit-request workflow for approved entries.
//!
//! Approved entries are never edited in place. A requester proposes a
//! sparse change-set; an approver applies or rejects it. Applying a
//! change-set that moves money reverses the old balance effect and
//! applies the new one in the same transaction, so payment mode
//! balances stay consistent with the entry at every commit point.
//!
//! Each application bumps `edit_count`; an entry stops accepting new
//! requests once it reaches [`MAX_EDIT_COUNT`](super::MAX_EDIT_COUNT).
//! The last decision stays visible on the entry (`edit_request_status`
//! keeps its approved/rejected value) until a new request replaces it.

use anyhow::Context;
use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use payloads::{
    AuditAction, EditRequestStatus, EntryChanges, EntryStatus,
    PaymentTypeId, PaymentTypeKind, TransactionType,
    requests::{self, DESCRIPTION_MAX_LEN},
    responses,
};

use super::{
    DbEntry, MAX_EDIT_COUNT, StoreError, ValidatedActor, approval,
    approval::required, audit, get_entry_for_update_tx, ledger,
    require_approver, require_reason,
};
use crate::time::TimeSource;

pub async fn request_edit(
    actor: &ValidatedActor,
    details: &requests::RequestEdit,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    let reason = require_reason(&details.reason)?;
    let changes = &details.changes;
    if changes.is_empty() {
        return Err(StoreError::EmptyChanges);
    }
    validate_proposed_values(changes, pool).await?;
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;
    let entry = get_entry_for_update_tx(&details.entry_id, &mut tx).await?;
    if entry.is_deleted {
        return Err(StoreError::EntryDeleted);
    }
    if entry.status != EntryStatus::Approved {
        return Err(StoreError::EntryNotApproved);
    }
    if entry.edit_request_status == Some(EditRequestStatus::Pending) {
        return Err(StoreError::EditRequestAlreadyPending);
    }
    if entry.edit_count >= MAX_EDIT_COUNT {
        return Err(StoreError::EditLimitReached);
    }
    if changes.transaction_type() != entry.transaction_type {
        return Err(StoreError::ChangesTypeMismatch);
    }
    // Non-approvers may only touch their own entries.
    if !actor.0.role.is_approver() && entry.created_by != actor_id {
        return Err(StoreError::RequiresApproverPermissions);
    }

    let previous = entry.snapshot()?;
    let changes_json = serde_json::to_value(changes)
        .context("Failed to serialize proposed changes")?;

    sqlx::query(
        "UPDATE ledger_entries
            SET edit_request_status = 'pending',
                edit_request_reason = $1,
                edit_request_data = $2,
                edit_requested_at = $3,
                edit_requested_by = $4,
                edit_approval_reason = NULL,
                edit_approved_at = NULL,
                edit_approved_by = NULL
            WHERE id = $5;",
    )
    .bind(reason)
    .bind(&changes_json)
    .bind(time_source.now().to_sqlx())
    .bind(actor_id)
    .bind(entry.id)
    .execute(&mut *tx)
    .await?;

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::EditRequested,
            previous_data: Some(previous),
            new_data: Some(changes_json),
            reason: Some(reason),
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    ledger::get_entry_response(&details.entry_id, pool).await
}

/// Apply a pending change-set. Content fields are merged over the
/// entry; when the merge moves money, the old balance effect is
/// reversed and the new one applied, and the entry's balance snapshot
/// is refreshed from the new application.
pub async fn approve_edit(
    actor: &ValidatedActor,
    details: &requests::ApproveEdit,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    require_approver(actor)?;
    let reason = require_reason(&details.reason)?;
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;
    let entry = get_entry_for_update_tx(&details.entry_id, &mut tx).await?;
    if entry.is_deleted {
        return Err(StoreError::EntryDeleted);
    }
    // The balance reversal below assumes the stored deltas were
    // applied, which is only true for approved entries.
    if entry.status != EntryStatus::Approved {
        return Err(StoreError::EntryNotApproved);
    }
    if entry.edit_request_status != Some(EditRequestStatus::Pending) {
        return Err(StoreError::NoPendingEditRequest);
    }

    let Json(changes) = entry
        .edit_request_data
        .clone()
        .context("Pending edit request carries no change data")?;

    let previous = entry.snapshot()?;
    let mut merged = merge_changes(&entry, &changes)?;
    validate_merged(&mut merged, &mut tx).await?;

    if changes.affects_balance() {
        approval::reverse_entry_balance_tx(&entry, &mut tx).await?;
        let snapshot =
            approval::apply_entry_balance_tx(&merged, &mut tx).await?;
        merged.opening_balance = Some(snapshot.opening);
        merged.current_balance = Some(snapshot.current);
    }

    let updated = sqlx::query_as::<_, DbEntry>(
        "UPDATE ledger_entries
            SET transaction_date = $1,
                description = $2,
                received_amount = $3,
                expense_amount = $4,
                claimable_amount = $5,
                payment_amount = $6,
                transfer_amount = $7,
                party_id = $8,
                head_id = $9,
                payment_type_id = $10,
                payment_mode_id = $11,
                from_payment_mode_id = $12,
                to_payment_mode_id = $13,
                opening_balance = $14,
                current_balance = $15,
                edit_request_status = 'approved',
                edit_approval_reason = $16,
                edit_approved_at = $17,
                edit_approved_by = $18,
                edit_count = edit_count + 1
            WHERE id = $19
            RETURNING *;",
    )
    .bind(merged.transaction_date.to_sqlx())
    .bind(&merged.description)
    .bind(merged.received_amount)
    .bind(merged.expense_amount)
    .bind(merged.claimable_amount)
    .bind(merged.payment_amount)
    .bind(merged.transfer_amount)
    .bind(merged.party_id)
    .bind(merged.head_id)
    .bind(merged.payment_type_id)
    .bind(merged.payment_mode_id)
    .bind(merged.from_payment_mode_id)
    .bind(merged.to_payment_mode_id)
    .bind(merged.opening_balance)
    .bind(merged.current_balance)
    .bind(reason)
    .bind(time_source.now().to_sqlx())
    .bind(actor_id)
    .bind(entry.id)
    .fetch_one(&mut *tx)
    .await?;

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::EditApproved,
            previous_data: Some(previous),
            new_data: Some(updated.snapshot()?),
            reason: Some(reason),
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    ledger::get_entry_response(&details.entry_id, pool).await
}

pub async fn reject_edit(
    actor: &ValidatedActor,
    details: &requests::RejectEdit,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    require_approver(actor)?;
    let reason = require_reason(&details.reason)?;
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;
    let entry = get_entry_for_update_tx(&details.entry_id, &mut tx).await?;
    if entry.is_deleted {
        return Err(StoreError::EntryDeleted);
    }
    if entry.edit_request_status != Some(EditRequestStatus::Pending) {
        return Err(StoreError::NoPendingEditRequest);
    }

    let previous = entry.snapshot()?;
    let rejected = sqlx::query_as::<_, DbEntry>(
        "UPDATE ledger_entries
            SET edit_request_status = 'rejected',
                edit_approval_reason = $1,
                edit_approved_at = $2,
                edit_approved_by = $3
            WHERE id = $4
            RETURNING *;",
    )
    .bind(reason)
    .bind(time_source.now().to_sqlx())
    .bind(actor_id)
    .bind(entry.id)
    .fetch_one(&mut *tx)
    .await?;

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::EditRejected,
            previous_data: Some(previous),
            new_data: Some(rejected.snapshot()?),
            reason: Some(reason),
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    ledger::get_entry_response(&details.entry_id, pool).await
}

/// Check the individually proposed values before a request is parked
/// on the entry, so obviously bad change-sets fail fast. Cross-field
/// rules are re-checked against the merged entry at approval time.
async fn validate_proposed_values(
    changes: &EntryChanges,
    pool: &PgPool,
) -> Result<(), StoreError> {
    match changes {
        EntryChanges::Credit(c) => {
            if let Some(description) = &c.description {
                require_description(description)?;
            }
            if let Some(amount) = c.received_amount
                && amount <= Decimal::ZERO
            {
                return Err(StoreError::AmountMustBePositive);
            }
            if let Some(id) = &c.party_id {
                ledger::ensure_party_exists(id, pool).await?;
            }
            if let Some(id) = &c.head_id {
                ledger::ensure_head_exists(id, pool).await?;
            }
            if let Some(id) = &c.payment_type_id {
                super::get_payment_type(id, pool).await?;
            }
            if let Some(id) = &c.payment_mode_id {
                ledger::ensure_payment_mode_exists(id, pool).await?;
            }
        }
        EntryChanges::Debit(c) => {
            if let Some(description) = &c.description {
                require_description(description)?;
            }
            if let Some(amount) = c.expense_amount
                && amount < Decimal::ZERO
            {
                return Err(StoreError::AmountMustBeNonNegative);
            }
            if let Some(amount) = c.claimable_amount
                && amount < Decimal::ZERO
            {
                return Err(StoreError::AmountMustBeNonNegative);
            }
            if let Some(id) = &c.party_id {
                ledger::ensure_party_exists(id, pool).await?;
            }
            if let Some(id) = &c.head_id {
                ledger::ensure_head_exists(id, pool).await?;
            }
            if let Some(id) = &c.payment_type_id {
                super::get_payment_type(id, pool).await?;
            }
            if let Some(id) = &c.payment_mode_id {
                ledger::ensure_payment_mode_exists(id, pool).await?;
            }
        }
        EntryChanges::SelfTransfer(c) => {
            if let Some(description) = &c.description {
                require_description(description)?;
            }
            if let Some(amount) = c.transfer_amount
                && amount <= Decimal::ZERO
            {
                return Err(StoreError::AmountMustBePositive);
            }
            if let Some(id) = &c.from_payment_mode_id {
                ledger::ensure_payment_mode_exists(id, pool).await?;
            }
            if let Some(id) = &c.to_payment_mode_id {
                ledger::ensure_payment_mode_exists(id, pool).await?;
            }
        }
    }
    Ok(())
}

fn require_description(description: &str) -> Result<(), StoreError> {
    if description.len() > DESCRIPTION_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }
    Ok(())
}

/// Overlay the present change fields onto a copy of the entry.
fn merge_changes(
    entry: &DbEntry,
    changes: &EntryChanges,
) -> Result<DbEntry, StoreError> {
    if changes.transaction_type() != entry.transaction_type {
        return Err(StoreError::ChangesTypeMismatch);
    }
    let mut merged = entry.clone();
    match changes {
        EntryChanges::Credit(c) => {
            if let Some(date) = c.transaction_date {
                merged.transaction_date = date;
            }
            if let Some(description) = &c.description {
                merged.description = description.clone();
            }
            if let Some(amount) = c.received_amount {
                merged.received_amount = Some(amount);
            }
            if let Some(id) = c.party_id {
                merged.party_id = Some(id);
            }
            if let Some(id) = c.head_id {
                merged.head_id = Some(id);
            }
            if let Some(id) = c.payment_type_id {
                merged.payment_type_id = Some(id);
            }
            if let Some(id) = c.payment_mode_id {
                merged.payment_mode_id = Some(id);
            }
        }
        EntryChanges::Debit(c) => {
            if let Some(date) = c.transaction_date {
                merged.transaction_date = date;
            }
            if let Some(description) = &c.description {
                merged.description = description.clone();
            }
            if let Some(amount) = c.expense_amount {
                merged.expense_amount = Some(amount);
            }
            if let Some(amount) = c.claimable_amount {
                merged.claimable_amount = Some(amount);
            }
            if let Some(id) = c.party_id {
                merged.party_id = Some(id);
            }
            if let Some(id) = c.head_id {
                merged.head_id = Some(id);
            }
            if let Some(id) = c.payment_type_id {
                merged.payment_type_id = Some(id);
            }
            if let Some(id) = c.payment_mode_id {
                merged.payment_mode_id = Some(id);
            }
        }
        EntryChanges::SelfTransfer(c) => {
            if let Some(date) = c.transaction_date {
                merged.transaction_date = date;
            }
            if let Some(description) = &c.description {
                merged.description = description.clone();
            }
            if let Some(amount) = c.transfer_amount {
                merged.transfer_amount = Some(amount);
            }
            if let Some(id) = c.from_payment_mode_id {
                merged.from_payment_mode_id = Some(id);
            }
            if let Some(id) = c.to_payment_mode_id {
                merged.to_payment_mode_id = Some(id);
            }
        }
    }
    Ok(merged)
}

/// Re-run the per-type entry rules against the merged values, fixing
/// up derived fields (the debit payment amount) along the way.
async fn validate_merged(
    merged: &mut DbEntry,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), StoreError> {
    match merged.transaction_type {
        TransactionType::Credit => {
            let amount =
                required(merged.received_amount, "received_amount")?;
            if amount <= Decimal::ZERO {
                return Err(StoreError::AmountMustBePositive);
            }
        }
        TransactionType::Debit => {
            let payment_type_id =
                required(merged.payment_type_id, "payment_type_id")?;
            let kind = payment_type_kind_tx(&payment_type_id, tx).await?;
            let (expense, claimable) = ledger::debit_amounts(
                kind,
                required(merged.expense_amount, "expense_amount")?,
                required(merged.claimable_amount, "claimable_amount")?,
            )?;
            merged.expense_amount = Some(expense);
            merged.claimable_amount = Some(claimable);
            merged.payment_amount = Some(expense + claimable);
        }
        TransactionType::SelfTransfer => {
            let amount =
                required(merged.transfer_amount, "transfer_amount")?;
            if amount <= Decimal::ZERO {
                return Err(StoreError::AmountMustBePositive);
            }
            let from = required(
                merged.from_payment_mode_id,
                "from_payment_mode_id",
            )?;
            let to =
                required(merged.to_payment_mode_id, "to_payment_mode_id")?;
            if from == to {
                return Err(StoreError::SameTransferMode);
            }
        }
    }
    Ok(())
}

async fn payment_type_kind_tx(
    id: &PaymentTypeId,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<PaymentTypeKind, StoreError> {
    sqlx::query_scalar("SELECT kind FROM payment_types WHERE id = $1;")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::PaymentTypeNotFound)
}
