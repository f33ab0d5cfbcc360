use crate::{
    AuditAction, AuditLogId, EditRequestStatus, EntryChanges, EntryId,
    EntryStatus, Head, Party, PaymentModeId, PaymentType, Role,
    TransactionType, UserId,
};
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identification bundled with display information.
///
/// This is the standard way to reference users in API responses; use
/// `user_id` for any API calls that reference the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
}

/// Lightweight payment mode reference carried on entries; the live
/// balance lives on the master data record, the entry carries only a
/// point-in-time snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentModeRef {
    pub id: PaymentModeId,
    pub name: String,
}

/// A ledger entry with resolved relation names.
///
/// `opening_balance`/`current_balance` are the balances of the
/// relevant payment mode snapshotted at the moment of approval, not a
/// recomputed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: EntryId,
    pub serial_number: i64,
    pub transaction_type: TransactionType,
    pub transaction_date: jiff::civil::Date,
    pub description: String,

    pub received_amount: Option<Decimal>,
    pub expense_amount: Option<Decimal>,
    pub claimable_amount: Option<Decimal>,
    pub payment_amount: Option<Decimal>,
    pub transfer_amount: Option<Decimal>,

    pub party: Option<Party>,
    pub head: Option<Head>,
    pub payment_type: Option<PaymentType>,
    pub payment_mode: Option<PaymentModeRef>,
    pub from_payment_mode: Option<PaymentModeRef>,
    pub to_payment_mode: Option<PaymentModeRef>,

    pub status: EntryStatus,
    pub rejection_reason: Option<String>,
    pub opening_balance: Option<Decimal>,
    pub current_balance: Option<Decimal>,

    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
    pub deleted_reason: Option<String>,
    pub deleted_by: Option<UserIdentity>,

    pub edit_request_status: Option<EditRequestStatus>,
    pub edit_request_reason: Option<String>,
    pub edit_request_data: Option<EntryChanges>,
    pub edit_requested_at: Option<Timestamp>,
    pub edit_requested_by: Option<UserIdentity>,
    pub edit_approval_reason: Option<String>,
    pub edit_approved_at: Option<Timestamp>,
    pub edit_approved_by: Option<UserIdentity>,
    pub edit_count: i32,

    pub created_by: UserIdentity,
    pub approved_by: Option<UserIdentity>,
    pub approved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One action recorded against an entry. Append-only; the sequence for
/// an entry is ordered by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub entry_id: EntryId,
    pub action: AuditAction,
    pub previous_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub performed_by: UserIdentity,
    pub performed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryWithAudit {
    pub entry: Entry,
    /// Chronological, oldest first.
    pub audit_log: Vec<AuditLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryList {
    pub entries: Vec<Entry>,
    /// Total matching rows, ignoring pagination.
    pub total_count: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Outcome for a single id inside a bulk approve/reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEntryOutcome {
    pub entry_id: EntryId,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-id outcomes of a bulk decision. Successes are never rolled
/// back on account of sibling failures; callers reconcile the failed
/// ids themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDecisionResult {
    pub outcomes: Vec<BulkEntryOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessMessage {
    pub message: String,
}
