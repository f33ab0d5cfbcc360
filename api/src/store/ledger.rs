//! Entry creation, retrieval, listing, and soft deletion.
//!
//! Entries are classified at creation: credits and self-transfers are
//! auto-approved and hit payment mode balances immediately, debits
//! start pending and only move money once an approver decides them.

use jiff_sqlx::ToSqlx;
use rust_decimal::Decimal;
use sqlx::PgPool;

use payloads::{
    AuditAction, EditRequestStatus, EntryId, EntryStatus, HeadId, PartyId,
    PaymentModeId, PaymentTypeKind, TransactionType,
    requests::{self, DESCRIPTION_MAX_LEN},
    responses,
};

use super::{
    DbEntry, ENTRY_SELECT, EntryRow, StoreError, ValidatedActor, approval,
    audit, get_entry_for_update_tx, get_payment_type, require_approver,
    require_reason,
};
use crate::time::TimeSource;

/// Column values for one ledger_entries insert, normalized from the
/// typed request.
struct NewEntry {
    transaction_type: TransactionType,
    transaction_date: jiff::civil::Date,
    description: String,
    received_amount: Option<Decimal>,
    expense_amount: Option<Decimal>,
    claimable_amount: Option<Decimal>,
    payment_amount: Option<Decimal>,
    transfer_amount: Option<Decimal>,
    party_id: Option<PartyId>,
    head_id: Option<HeadId>,
    payment_type_id: Option<payloads::PaymentTypeId>,
    payment_mode_id: Option<PaymentModeId>,
    from_payment_mode_id: Option<PaymentModeId>,
    to_payment_mode_id: Option<PaymentModeId>,
}

pub async fn create_entry(
    actor: &ValidatedActor,
    details: &requests::CreateEntry,
    time_source: &TimeSource,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    let new_entry = validate_new_entry(details, pool).await?;
    let status = payloads::initial_status(new_entry.transaction_type);
    let actor_id = actor.id();

    let mut tx = pool.begin().await?;

    let entry = sqlx::query_as::<_, DbEntry>(
        "INSERT INTO ledger_entries (
                transaction_type,
                transaction_date,
                description,
                received_amount,
                expense_amount,
                claimable_amount,
                payment_amount,
                transfer_amount,
                party_id,
                head_id,
                payment_type_id,
                payment_mode_id,
                from_payment_mode_id,
                to_payment_mode_id,
                status,
                created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16)
            RETURNING *;",
    )
    .bind(new_entry.transaction_type)
    .bind(new_entry.transaction_date.to_sqlx())
    .bind(&new_entry.description)
    .bind(new_entry.received_amount)
    .bind(new_entry.expense_amount)
    .bind(new_entry.claimable_amount)
    .bind(new_entry.payment_amount)
    .bind(new_entry.transfer_amount)
    .bind(new_entry.party_id)
    .bind(new_entry.head_id)
    .bind(new_entry.payment_type_id)
    .bind(new_entry.payment_mode_id)
    .bind(new_entry.from_payment_mode_id)
    .bind(new_entry.to_payment_mode_id)
    .bind(status)
    .bind(actor_id)
    .fetch_one(&mut *tx)
    .await?;

    let created_snapshot = entry.snapshot()?;
    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::Created,
            previous_data: None,
            new_data: Some(created_snapshot.clone()),
            reason: None,
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    // Auto-approved entries move money in the same transaction and
    // record the approval alongside the creation.
    if status == EntryStatus::Approved {
        let snapshot =
            approval::apply_entry_balance_tx(&entry, &mut tx).await?;
        let approved = sqlx::query_as::<_, DbEntry>(
            "UPDATE ledger_entries
                SET opening_balance = $1,
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
                previous_data: Some(created_snapshot),
                new_data: Some(approved.snapshot()?),
                reason: None,
                performed_by: &actor_id,
            },
            time_source,
            &mut tx,
        )
        .await?;
    }

    tx.commit().await?;

    get_entry_response(&entry.id, pool).await
}

async fn validate_new_entry(
    details: &requests::CreateEntry,
    pool: &PgPool,
) -> Result<NewEntry, StoreError> {
    match details {
        requests::CreateEntry::Credit(c) => {
            require_description(&c.description)?;
            if c.received_amount <= Decimal::ZERO {
                return Err(StoreError::AmountMustBePositive);
            }
            ensure_party_exists(&c.party_id, pool).await?;
            ensure_head_exists(&c.head_id, pool).await?;
            get_payment_type(&c.payment_type_id, pool).await?;
            ensure_payment_mode_exists(&c.payment_mode_id, pool).await?;
            Ok(NewEntry {
                transaction_type: TransactionType::Credit,
                transaction_date: c.transaction_date,
                description: c.description.clone(),
                received_amount: Some(c.received_amount),
                expense_amount: None,
                claimable_amount: None,
                payment_amount: None,
                transfer_amount: None,
                party_id: Some(c.party_id),
                head_id: Some(c.head_id),
                payment_type_id: Some(c.payment_type_id),
                payment_mode_id: Some(c.payment_mode_id),
                from_payment_mode_id: None,
                to_payment_mode_id: None,
            })
        }
        requests::CreateEntry::Debit(d) => {
            require_description(&d.description)?;
            ensure_party_exists(&d.party_id, pool).await?;
            ensure_head_exists(&d.head_id, pool).await?;
            let payment_type =
                get_payment_type(&d.payment_type_id, pool).await?;
            ensure_payment_mode_exists(&d.payment_mode_id, pool).await?;

            let (expense, claimable) = debit_amounts(
                payment_type.kind,
                d.expense_amount,
                d.claimable_amount,
            )?;
            Ok(NewEntry {
                transaction_type: TransactionType::Debit,
                transaction_date: d.transaction_date,
                description: d.description.clone(),
                received_amount: None,
                expense_amount: Some(expense),
                claimable_amount: Some(claimable),
                payment_amount: Some(expense + claimable),
                transfer_amount: None,
                party_id: Some(d.party_id),
                head_id: Some(d.head_id),
                payment_type_id: Some(d.payment_type_id),
                payment_mode_id: Some(d.payment_mode_id),
                from_payment_mode_id: None,
                to_payment_mode_id: None,
            })
        }
        requests::CreateEntry::SelfTransfer(t) => {
            require_description(&t.description)?;
            if t.transfer_amount <= Decimal::ZERO {
                return Err(StoreError::AmountMustBePositive);
            }
            if t.from_payment_mode_id == t.to_payment_mode_id {
                return Err(StoreError::SameTransferMode);
            }
            ensure_payment_mode_exists(&t.from_payment_mode_id, pool).await?;
            ensure_payment_mode_exists(&t.to_payment_mode_id, pool).await?;
            Ok(NewEntry {
                transaction_type: TransactionType::SelfTransfer,
                transaction_date: t.transaction_date,
                description: t.description.clone(),
                received_amount: None,
                expense_amount: None,
                claimable_amount: None,
                payment_amount: None,
                transfer_amount: Some(t.transfer_amount),
                party_id: None,
                head_id: None,
                payment_type_id: None,
                payment_mode_id: None,
                from_payment_mode_id: Some(t.from_payment_mode_id),
                to_payment_mode_id: Some(t.to_payment_mode_id),
            })
        }
    }
}

/// Normalize the two debit components against the payment type kind.
///
/// Expense payment types require a positive expense component;
/// non-expense types carry no primary expense at all, so whatever was
/// submitted for it is discarded. The payment amount (the sum) must
/// end up positive either way.
pub(crate) fn debit_amounts(
    kind: PaymentTypeKind,
    expense_amount: Decimal,
    claimable_amount: Decimal,
) -> Result<(Decimal, Decimal), StoreError> {
    if expense_amount < Decimal::ZERO || claimable_amount < Decimal::ZERO {
        return Err(StoreError::AmountMustBeNonNegative);
    }
    let expense = match kind {
        PaymentTypeKind::Expense => {
            if expense_amount <= Decimal::ZERO {
                return Err(StoreError::AmountMustBePositive);
            }
            expense_amount
        }
        PaymentTypeKind::NonExpense => Decimal::ZERO,
    };
    if expense + claimable_amount <= Decimal::ZERO {
        return Err(StoreError::AmountMustBePositive);
    }
    Ok((expense, claimable_amount))
}

fn require_description(description: &str) -> Result<(), StoreError> {
    if description.len() > DESCRIPTION_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }
    Ok(())
}

pub(crate) async fn ensure_party_exists(
    id: &PartyId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM parties WHERE id = $1);",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    if !exists {
        return Err(StoreError::PartyNotFound);
    }
    Ok(())
}

pub(crate) async fn ensure_head_exists(
    id: &HeadId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM heads WHERE id = $1);",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    if !exists {
        return Err(StoreError::HeadNotFound);
    }
    Ok(())
}

pub(crate) async fn ensure_payment_mode_exists(
    id: &PaymentModeId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM payment_modes WHERE id = $1);",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    if !exists {
        return Err(StoreError::PaymentModeNotFound);
    }
    Ok(())
}

pub(crate) async fn get_entry_response(
    entry_id: &EntryId,
    pool: &PgPool,
) -> Result<responses::Entry, StoreError> {
    let sql = format!("{ENTRY_SELECT} WHERE e.id = $1;");
    let row = sqlx::query_as::<_, EntryRow>(&sql)
        .bind(entry_id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::EntryNotFound)?;
    Ok(row.into())
}

/// One entry together with its full audit history. Deleted entries
/// remain retrievable by id; the soft-delete flag tells them apart.
pub async fn get_entry(
    entry_id: &EntryId,
    pool: &PgPool,
) -> Result<responses::EntryWithAudit, StoreError> {
    let entry = get_entry_response(entry_id, pool).await?;
    let audit_log = audit::list_for_entry(entry_id, pool).await?;
    Ok(responses::EntryWithAudit { entry, audit_log })
}

const DEFAULT_PER_PAGE: i64 = 50;
const MAX_PER_PAGE: i64 = 200;

/// Filter clauses shared by the page query and the total count. The
/// bind positions must line up between the two.
const LIST_FILTER: &str = r#"
    WHERE ($1::entry_status IS NULL OR e.status = $1)
        AND ($2::transaction_type IS NULL OR e.transaction_type = $2)
        AND ($3::uuid IS NULL OR e.party_id = $3)
        AND ($4::uuid IS NULL OR e.head_id = $4)
        AND ($5::uuid IS NULL
            OR e.payment_mode_id = $5
            OR e.from_payment_mode_id = $5
            OR e.to_payment_mode_id = $5)
        AND ($6::uuid IS NULL OR e.payment_type_id = $6)
        AND ($7::edit_request_status IS NULL OR e.edit_request_status = $7)
        AND ($8::date IS NULL OR e.transaction_date >= $8)
        AND ($9::date IS NULL OR e.transaction_date <= $9)
        AND ($10 OR NOT e.is_deleted)
        AND ($11::text IS NULL
            OR e.serial_number::text ILIKE '%' || $11 || '%'
            OR e.description ILIKE '%' || $11 || '%'
            OR p.name ILIKE '%' || $11 || '%'
            OR cu.username ILIKE '%' || $11 || '%')
"#;

pub async fn list_entries(
    filter: &requests::ListEntries,
    pool: &PgPool,
) -> Result<responses::EntryList, StoreError> {
    let page = filter.page.unwrap_or(1).max(1);
    let per_page = filter
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let offset = (page - 1) * per_page;
    let include_deleted = filter.include_deleted.unwrap_or(false);
    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let list_sql = format!(
        "{ENTRY_SELECT} {LIST_FILTER}
            ORDER BY e.serial_number DESC
            LIMIT $12 OFFSET $13;"
    );
    let rows = sqlx::query_as::<_, EntryRow>(&list_sql)
        .bind(filter.status)
        .bind(filter.transaction_type)
        .bind(filter.party_id)
        .bind(filter.head_id)
        .bind(filter.payment_mode_id)
        .bind(filter.payment_type_id)
        .bind(filter.edit_request_status)
        .bind(filter.start_date.map(|d| d.to_sqlx()))
        .bind(filter.end_date.map(|d| d.to_sqlx()))
        .bind(include_deleted)
        .bind(search)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let count_sql = format!(
        "SELECT COUNT(*)
            FROM ledger_entries e
            LEFT JOIN parties p ON e.party_id = p.id
            JOIN users cu ON e.created_by = cu.id
            {LIST_FILTER};"
    );
    let total_count: i64 = sqlx::query_scalar(&count_sql)
        .bind(filter.status)
        .bind(filter.transaction_type)
        .bind(filter.party_id)
        .bind(filter.head_id)
        .bind(filter.payment_mode_id)
        .bind(filter.payment_type_id)
        .bind(filter.edit_request_status)
        .bind(filter.start_date.map(|d| d.to_sqlx()))
        .bind(filter.end_date.map(|d| d.to_sqlx()))
        .bind(include_deleted)
        .bind(search)
        .fetch_one(pool)
        .await?;

    Ok(responses::EntryList {
        entries: rows.into_iter().map(Into::into).collect(),
        total_count,
        page,
        per_page,
    })
}

/// Soft-delete an entry, reversing its balance effect if it had been
/// applied. Refused while an edit request is pending so the two
/// workflows cannot race each other.
pub async fn delete_entry(
    actor: &ValidatedActor,
    details: &requests::DeleteEntry,
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
    if entry.edit_request_status == Some(EditRequestStatus::Pending) {
        return Err(StoreError::EditRequestPending);
    }

    let previous = entry.snapshot()?;
    if entry.status == EntryStatus::Approved {
        approval::reverse_entry_balance_tx(&entry, &mut tx).await?;
    }

    let deleted = sqlx::query_as::<_, DbEntry>(
        "UPDATE ledger_entries
            SET is_deleted = TRUE,
                deleted_at = $1,
                deleted_reason = $2,
                deleted_by = $3
            WHERE id = $4
            RETURNING *;",
    )
    .bind(time_source.now().to_sqlx())
    .bind(reason)
    .bind(actor_id)
    .bind(entry.id)
    .fetch_one(&mut *tx)
    .await?;

    audit::record_tx(
        audit::AuditRecord {
            entry_id: &entry.id,
            action: AuditAction::Deleted,
            previous_data: Some(previous),
            new_data: Some(deleted.snapshot()?),
            reason: Some(reason),
            performed_by: &actor_id,
        },
        time_source,
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    get_entry_response(&details.entry_id, pool).await
}
