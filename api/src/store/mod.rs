//! Database store for the ledger engine.
//!
//! ## Design decisions
//!
//! ### Balance mutation
//! - **Single delta primitive**: `payment_modes.current_balance` is only
//!   ever changed through `approval::apply_delta_tx`, which locks the row
//!   with `SELECT ... FOR UPDATE` before applying a signed delta. Every
//!   approval, undo, edit correction, and deletion reversal goes through
//!   it, so the cached balance always equals the sum of approved,
//!   non-deleted entry deltas.
//!
//! ### Time source dependency
//! - **Mocked time for testing**: Functions that stamp approval, audit,
//!   or deletion times accept a `TimeSource` parameter instead of reading
//!   the clock themselves, so time can be mocked during tests.
//!
//! ### Database triggers
//! - **Auto-updated timestamps**: Triggers maintain `updated_at`, so
//!   application code never sets it.
//!
//! ### Type safety
//! - **Typed ids**: All id newtypes implement `sqlx::Type`, so they bind
//!   directly in queries without accessing the inner UUID value (`.0`).

use anyhow::Context;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTs;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use payloads::{
    EditRequestStatus, EntryChanges, EntryId, EntryStatus, HeadId,
    OptionalTimestamp, PartyId, PaymentModeId, PaymentTypeId,
    PaymentTypeKind, Role, TransactionType, UserId, requests,
    responses::{self, UserIdentity},
};

pub mod approval;
pub mod audit;
pub mod edit_request;
pub mod ledger;

/// Most edits an entry may accumulate over its lifetime.
pub const MAX_EDIT_COUNT: i32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Approver permissions required")]
    RequiresApproverPermissions,
    #[error("User not found")]
    UserNotFound,
    #[error("Entry not found")]
    EntryNotFound,
    #[error("Party not found")]
    PartyNotFound,
    #[error("Head not found")]
    HeadNotFound,
    #[error("Payment type not found")]
    PaymentTypeNotFound,
    #[error("Payment mode not found")]
    PaymentModeNotFound,
    #[error("Entry has been deleted")]
    EntryDeleted,
    #[error("Only pending entries can be decided")]
    EntryNotPending,
    #[error("Entry has no decision to undo")]
    NoDecisionToUndo,
    #[error("Only approved entries can be edited")]
    EntryNotApproved,
    #[error("An edit request is already pending for this entry")]
    EditRequestAlreadyPending,
    #[error("No pending edit request for this entry")]
    NoPendingEditRequest,
    #[error("Entry has reached the edit limit")]
    EditLimitReached,
    #[error("Proposed changes are empty")]
    EmptyChanges,
    #[error("Changes do not match the entry's transaction type")]
    ChangesTypeMismatch,
    #[error("Entry has a pending edit request")]
    EditRequestPending,
    #[error("Amount must be positive")]
    AmountMustBePositive,
    #[error("Amount must not be negative")]
    AmountMustBeNonNegative,
    #[error("A reason is required")]
    ReasonRequired,
    #[error("A name is required")]
    NameRequired,
    #[error("Transfer must move between two different payment modes")]
    SameTransferMode,
    #[error("Invalid username: {message}")]
    InvalidUsername { message: String },
    #[error("Field too long")]
    FieldTooLong,
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}

/// A complete user row that stays in the backend.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

/// A type that can only exist if the interior user row has been loaded
/// from the database.
pub struct ValidatedActor(User);

impl ValidatedActor {
    pub fn id(&self) -> UserId {
        self.0.id
    }
}

pub async fn get_validated_actor(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<ValidatedActor, StoreError> {
    let Some(user) =
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1;")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
    else {
        return Err(StoreError::UserNotFound);
    };
    Ok(ValidatedActor(user))
}

/// Errors unless the actor holds an approver role.
pub(crate) fn require_approver(
    actor: &ValidatedActor,
) -> Result<(), StoreError> {
    if !actor.0.role.is_approver() {
        return Err(StoreError::RequiresApproverPermissions);
    }
    Ok(())
}

/// Trims a decision or deletion reason, rejecting blank input.
pub(crate) fn require_reason(reason: &str) -> Result<&str, StoreError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(StoreError::ReasonRequired);
    }
    Ok(reason)
}

pub async fn create_user(
    username: &str,
    password_hash: &str,
    pool: &PgPool,
) -> Result<UserId, StoreError> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING *;",
    )
    .bind(username)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(user.id)
}

pub async fn read_user(
    id: &UserId,
    pool: &PgPool,
) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1;")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::UserNotFound)
}

// Master data. Names are unique; a duplicate insert surfaces as
// `NotUnique` via the `From<sqlx::Error>` conversion.

pub async fn create_party(
    name: &str,
    pool: &PgPool,
) -> Result<payloads::Party, StoreError> {
    require_name(name)?;
    Ok(sqlx::query_as::<_, payloads::Party>(
        "INSERT INTO parties (name) VALUES ($1) RETURNING id, name;",
    )
    .bind(name.trim())
    .fetch_one(pool)
    .await?)
}

pub async fn list_parties(
    pool: &PgPool,
) -> Result<Vec<payloads::Party>, StoreError> {
    Ok(sqlx::query_as::<_, payloads::Party>(
        "SELECT id, name FROM parties ORDER BY name;",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn create_head(
    name: &str,
    pool: &PgPool,
) -> Result<payloads::Head, StoreError> {
    require_name(name)?;
    Ok(sqlx::query_as::<_, payloads::Head>(
        "INSERT INTO heads (name) VALUES ($1) RETURNING id, name;",
    )
    .bind(name.trim())
    .fetch_one(pool)
    .await?)
}

pub async fn list_heads(
    pool: &PgPool,
) -> Result<Vec<payloads::Head>, StoreError> {
    Ok(sqlx::query_as::<_, payloads::Head>(
        "SELECT id, name FROM heads ORDER BY name;",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn create_payment_type(
    details: &requests::CreatePaymentType,
    pool: &PgPool,
) -> Result<payloads::PaymentType, StoreError> {
    require_name(&details.name)?;
    Ok(sqlx::query_as::<_, payloads::PaymentType>(
        "INSERT INTO payment_types (name, kind)
            VALUES ($1, $2)
            RETURNING id, name, kind;",
    )
    .bind(details.name.trim())
    .bind(details.kind)
    .fetch_one(pool)
    .await?)
}

pub async fn list_payment_types(
    pool: &PgPool,
) -> Result<Vec<payloads::PaymentType>, StoreError> {
    Ok(sqlx::query_as::<_, payloads::PaymentType>(
        "SELECT id, name, kind FROM payment_types ORDER BY name;",
    )
    .fetch_all(pool)
    .await?)
}

/// New payment modes start at a zero balance; funds arrive through
/// credit entries.
pub async fn create_payment_mode(
    actor: &ValidatedActor,
    name: &str,
    pool: &PgPool,
) -> Result<payloads::PaymentMode, StoreError> {
    require_approver(actor)?;
    require_name(name)?;
    Ok(sqlx::query_as::<_, payloads::PaymentMode>(
        "INSERT INTO payment_modes (name)
            VALUES ($1)
            RETURNING id, name, current_balance;",
    )
    .bind(name.trim())
    .fetch_one(pool)
    .await?)
}

pub async fn list_payment_modes(
    pool: &PgPool,
) -> Result<Vec<payloads::PaymentMode>, StoreError> {
    Ok(sqlx::query_as::<_, payloads::PaymentMode>(
        "SELECT id, name, current_balance FROM payment_modes ORDER BY name;",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn get_payment_type(
    id: &PaymentTypeId,
    pool: &PgPool,
) -> Result<payloads::PaymentType, StoreError> {
    sqlx::query_as::<_, payloads::PaymentType>(
        "SELECT id, name, kind FROM payment_types WHERE id = $1;",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::PaymentTypeNotFound)
}

fn require_name(name: &str) -> Result<(), StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::NameRequired);
    }
    if name.len() > 100 {
        return Err(StoreError::FieldTooLong);
    }
    Ok(())
}

/// Database-level entry struct that matches the ledger_entries table
/// schema. Serializable so audit snapshots can capture the full row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbEntry {
    pub id: EntryId,
    pub serial_number: i64,
    pub transaction_type: TransactionType,
    #[sqlx(try_from = "jiff_sqlx::Date")]
    pub transaction_date: jiff::civil::Date,
    pub description: String,

    pub received_amount: Option<Decimal>,
    pub expense_amount: Option<Decimal>,
    pub claimable_amount: Option<Decimal>,
    pub payment_amount: Option<Decimal>,
    pub transfer_amount: Option<Decimal>,

    pub party_id: Option<PartyId>,
    pub head_id: Option<HeadId>,
    pub payment_type_id: Option<PaymentTypeId>,
    pub payment_mode_id: Option<PaymentModeId>,
    pub from_payment_mode_id: Option<PaymentModeId>,
    pub to_payment_mode_id: Option<PaymentModeId>,

    pub status: EntryStatus,
    pub rejection_reason: Option<String>,
    pub opening_balance: Option<Decimal>,
    pub current_balance: Option<Decimal>,

    pub is_deleted: bool,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub deleted_at: Option<Timestamp>,
    pub deleted_reason: Option<String>,
    pub deleted_by: Option<UserId>,

    pub edit_request_status: Option<EditRequestStatus>,
    pub edit_request_reason: Option<String>,
    pub edit_request_data: Option<Json<EntryChanges>>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub edit_requested_at: Option<Timestamp>,
    pub edit_requested_by: Option<UserId>,
    pub edit_approval_reason: Option<String>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub edit_approved_at: Option<Timestamp>,
    pub edit_approved_by: Option<UserId>,
    pub edit_count: i32,

    pub created_by: UserId,
    pub approved_by: Option<UserId>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub approved_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl DbEntry {
    /// Full-row snapshot for the audit trail.
    pub(crate) fn snapshot(&self) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(self)
            .context("Failed to serialize entry snapshot")
            .map_err(StoreError::from)
    }
}

/// An entry row joined with the display names of its relations.
#[derive(Debug, Clone, FromRow)]
pub struct EntryRow {
    #[sqlx(flatten)]
    pub entry: DbEntry,
    pub party_name: Option<String>,
    pub head_name: Option<String>,
    pub payment_type_name: Option<String>,
    pub payment_type_kind: Option<PaymentTypeKind>,
    pub payment_mode_name: Option<String>,
    pub from_payment_mode_name: Option<String>,
    pub to_payment_mode_name: Option<String>,
    pub created_by_username: String,
    pub approved_by_username: Option<String>,
    pub deleted_by_username: Option<String>,
    pub edit_requested_by_username: Option<String>,
    pub edit_approved_by_username: Option<String>,
}

/// Shared SELECT for entry reads; `ledger::list_entries` appends its
/// filter clauses to the same join set.
pub(crate) const ENTRY_SELECT: &str = r#"
    SELECT e.*,
        p.name AS party_name,
        h.name AS head_name,
        pt.name AS payment_type_name,
        pt.kind AS payment_type_kind,
        pm.name AS payment_mode_name,
        fpm.name AS from_payment_mode_name,
        tpm.name AS to_payment_mode_name,
        cu.username AS created_by_username,
        au.username AS approved_by_username,
        du.username AS deleted_by_username,
        eru.username AS edit_requested_by_username,
        eau.username AS edit_approved_by_username
    FROM ledger_entries e
    LEFT JOIN parties p ON e.party_id = p.id
    LEFT JOIN heads h ON e.head_id = h.id
    LEFT JOIN payment_types pt ON e.payment_type_id = pt.id
    LEFT JOIN payment_modes pm ON e.payment_mode_id = pm.id
    LEFT JOIN payment_modes fpm ON e.from_payment_mode_id = fpm.id
    LEFT JOIN payment_modes tpm ON e.to_payment_mode_id = tpm.id
    JOIN users cu ON e.created_by = cu.id
    LEFT JOIN users au ON e.approved_by = au.id
    LEFT JOIN users du ON e.deleted_by = du.id
    LEFT JOIN users eru ON e.edit_requested_by = eru.id
    LEFT JOIN users eau ON e.edit_approved_by = eau.id
"#;

fn identity(
    user_id: Option<UserId>,
    username: Option<String>,
) -> Option<UserIdentity> {
    match (user_id, username) {
        (Some(user_id), Some(username)) => {
            Some(UserIdentity { user_id, username })
        }
        _ => None,
    }
}

impl From<EntryRow> for responses::Entry {
    fn from(row: EntryRow) -> Self {
        let e = row.entry;
        responses::Entry {
            entry_id: e.id,
            serial_number: e.serial_number,
            transaction_type: e.transaction_type,
            transaction_date: e.transaction_date,
            description: e.description,
            received_amount: e.received_amount,
            expense_amount: e.expense_amount,
            claimable_amount: e.claimable_amount,
            payment_amount: e.payment_amount,
            transfer_amount: e.transfer_amount,
            party: identity_pair(e.party_id, row.party_name)
                .map(|(id, name)| payloads::Party { id, name }),
            head: identity_pair(e.head_id, row.head_name)
                .map(|(id, name)| payloads::Head { id, name }),
            payment_type: match (
                e.payment_type_id,
                row.payment_type_name,
                row.payment_type_kind,
            ) {
                (Some(id), Some(name), Some(kind)) => {
                    Some(payloads::PaymentType { id, name, kind })
                }
                _ => None,
            },
            payment_mode: identity_pair(e.payment_mode_id, row.payment_mode_name)
                .map(|(id, name)| responses::PaymentModeRef { id, name }),
            from_payment_mode: identity_pair(
                e.from_payment_mode_id,
                row.from_payment_mode_name,
            )
            .map(|(id, name)| responses::PaymentModeRef { id, name }),
            to_payment_mode: identity_pair(
                e.to_payment_mode_id,
                row.to_payment_mode_name,
            )
            .map(|(id, name)| responses::PaymentModeRef { id, name }),
            status: e.status,
            rejection_reason: e.rejection_reason,
            opening_balance: e.opening_balance,
            current_balance: e.current_balance,
            is_deleted: e.is_deleted,
            deleted_at: e.deleted_at,
            deleted_reason: e.deleted_reason,
            deleted_by: identity(e.deleted_by, row.deleted_by_username),
            edit_request_status: e.edit_request_status,
            edit_request_reason: e.edit_request_reason,
            edit_request_data: e.edit_request_data.map(|Json(c)| c),
            edit_requested_at: e.edit_requested_at,
            edit_requested_by: identity(
                e.edit_requested_by,
                row.edit_requested_by_username,
            ),
            edit_approval_reason: e.edit_approval_reason,
            edit_approved_at: e.edit_approved_at,
            edit_approved_by: identity(
                e.edit_approved_by,
                row.edit_approved_by_username,
            ),
            edit_count: e.edit_count,
            created_by: UserIdentity {
                user_id: e.created_by,
                username: row.created_by_username,
            },
            approved_by: identity(e.approved_by, row.approved_by_username),
            approved_at: e.approved_at,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

fn identity_pair<I>(id: Option<I>, name: Option<String>) -> Option<(I, String)> {
    match (id, name) {
        (Some(id), Some(name)) => Some((id, name)),
        _ => None,
    }
}

/// Lock an entry row for update. Must be called inside a transaction;
/// the lock is held until it commits.
pub(crate) async fn get_entry_for_update_tx(
    entry_id: &EntryId,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<DbEntry, StoreError> {
    sqlx::query_as::<_, DbEntry>(
        "SELECT * FROM ledger_entries WHERE id = $1 FOR UPDATE;",
    )
    .bind(entry_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StoreError::EntryNotFound)
}
