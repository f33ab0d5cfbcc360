//! Shared types for the ledger engine API.
//!
//! Everything that crosses the HTTP boundary lives here so that the
//! server and the test client agree on one set of definitions. The
//! `use-sqlx` feature additionally derives sqlx traits so the server
//! can bind these types directly in queries.

use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError};

/// Decode helper for nullable timestamp columns, used with
/// `#[sqlx(try_from = "OptionalTimestamp")]`.
#[cfg(feature = "use-sqlx")]
#[derive(Debug, Clone, sqlx::Type)]
#[sqlx(transparent)]
pub struct OptionalTimestamp(pub Option<jiff_sqlx::Timestamp>);

#[cfg(feature = "use-sqlx")]
impl From<OptionalTimestamp> for Option<jiff::Timestamp> {
    fn from(x: OptionalTimestamp) -> Option<jiff::Timestamp> {
        x.0.map(|x| x.to_jiff())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct UserId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct EntryId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct PaymentModeId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct PartyId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct HeadId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct PaymentTypeId(pub Uuid);

/// Sequential so the audit trail for an entry has a total order even
/// when two actions share a timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct AuditLogId(pub i64);

/// Actor roles resolved at login.
///
/// Approver roles may approve/reject/undo/delete entries and decide
/// edit requests. Every authenticated user may record entries and
/// request edits to their approved entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Md,
    FinanceHead,
    Employee,
}

impl Role {
    pub fn is_approver(&self) -> bool {
        matches!(self, Role::Admin | Role::Md | Role::FinanceHead)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "transaction_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
    SelfTransfer,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "entry_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "edit_request_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EditRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "audit_action", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Approved,
    Rejected,
    Deleted,
    EditRequested,
    EditApproved,
    EditRejected,
}

/// Whether a payment type represents a real expense.
///
/// Debits under a non-expense payment type carry no primary expense
/// amount; only the claimable portion is recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "payment_type_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTypeKind {
    Expense,
    NonExpense,
}

/// Initial status assigned to an entry at creation.
///
/// Credits and self-transfers are inflow or balance-neutral movement
/// and are approved on the spot; debits decrease an instrument's
/// balance and always start pending, awaiting explicit approval.
pub fn initial_status(transaction_type: TransactionType) -> EntryStatus {
    match transaction_type {
        TransactionType::Credit | TransactionType::SelfTransfer => {
            EntryStatus::Approved
        }
        TransactionType::Debit => EntryStatus::Pending,
    }
}

// Master data records. `current_balance` on a payment mode is owned by
// the ledger engine and moves only through approved entries.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Party {
    pub id: PartyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct Head {
    pub id: HeadId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct PaymentType {
    pub id: PaymentTypeId,
    pub name: String,
    pub kind: PaymentTypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
pub struct PaymentMode {
    pub id: PaymentModeId,
    pub name: String,
    pub current_balance: Decimal,
}

/// Proposed field changes for an approved entry, typed per transaction
/// type so a change-set can never carry a field irrelevant to the
/// entry it targets. All fields are optional; only the present ones
/// are applied when the request is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transaction_type", rename_all = "snake_case")]
pub enum EntryChanges {
    Credit(CreditChanges),
    Debit(DebitChanges),
    SelfTransfer(TransferChanges),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<jiff::civil::Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_id: Option<PartyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_id: Option<HeadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type_id: Option<PaymentTypeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_mode_id: Option<PaymentModeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebitChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<jiff::civil::Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Component A: the primary expense amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_amount: Option<Decimal>,
    /// Component B: the claimable/reimbursable portion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimable_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_id: Option<PartyId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_id: Option<HeadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type_id: Option<PaymentTypeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_mode_id: Option<PaymentModeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<jiff::civil::Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_payment_mode_id: Option<PaymentModeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_payment_mode_id: Option<PaymentModeId>,
}

impl EntryChanges {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            EntryChanges::Credit(_) => TransactionType::Credit,
            EntryChanges::Debit(_) => TransactionType::Debit,
            EntryChanges::SelfTransfer(_) => TransactionType::SelfTransfer,
        }
    }

    /// True if no field is proposed at all.
    pub fn is_empty(&self) -> bool {
        match self {
            EntryChanges::Credit(c) => {
                c.transaction_date.is_none()
                    && c.description.is_none()
                    && c.received_amount.is_none()
                    && c.party_id.is_none()
                    && c.head_id.is_none()
                    && c.payment_type_id.is_none()
                    && c.payment_mode_id.is_none()
            }
            EntryChanges::Debit(c) => {
                c.transaction_date.is_none()
                    && c.description.is_none()
                    && c.expense_amount.is_none()
                    && c.claimable_amount.is_none()
                    && c.party_id.is_none()
                    && c.head_id.is_none()
                    && c.payment_type_id.is_none()
                    && c.payment_mode_id.is_none()
            }
            EntryChanges::SelfTransfer(c) => {
                c.transaction_date.is_none()
                    && c.description.is_none()
                    && c.transfer_amount.is_none()
                    && c.from_payment_mode_id.is_none()
                    && c.to_payment_mode_id.is_none()
            }
        }
    }

    /// True if approving this change-set moves money, requiring the
    /// payment mode ledger to be corrected.
    pub fn affects_balance(&self) -> bool {
        match self {
            EntryChanges::Credit(c) => {
                c.received_amount.is_some() || c.payment_mode_id.is_some()
            }
            // The payment type matters for debits: switching to a
            // non-expense type zeroes the expense component and with it
            // the payment amount.
            EntryChanges::Debit(c) => {
                c.expense_amount.is_some()
                    || c.claimable_amount.is_some()
                    || c.payment_type_id.is_some()
                    || c.payment_mode_id.is_some()
            }
            EntryChanges::SelfTransfer(c) => {
                c.transfer_amount.is_some()
                    || c.from_payment_mode_id.is_some()
                    || c.to_payment_mode_id.is_some()
            }
        }
    }
}
