use crate::{
    EditRequestStatus, EntryChanges, EntryId, EntryStatus, HeadId, PartyId,
    PaymentModeId, PaymentTypeId, PaymentTypeKind, TransactionType,
};
use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

/// Validation result for usernames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameValidation {
    Valid,
    TooShort,
    TooLong,
    InvalidCharacters,
    MustStartWithLetter,
}

impl UsernameValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::TooShort => Some("Username must be at least 3 characters"),
            Self::TooLong => Some("Username must be at most 30 characters"),
            Self::InvalidCharacters => Some(
                "Username can only contain letters, numbers, and underscores",
            ),
            Self::MustStartWithLetter => {
                Some("Username must start with a letter")
            }
        }
    }
}

/// Validate a username.
///
/// Rules:
/// - 3-30 characters
/// - ASCII letters, numbers, and underscores only
/// - Must start with a letter
pub fn validate_username(username: &str) -> UsernameValidation {
    if username.len() < USERNAME_MIN_LEN {
        return UsernameValidation::TooShort;
    }
    if username.len() > USERNAME_MAX_LEN {
        return UsernameValidation::TooLong;
    }

    let mut chars = username.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_alphabetic()
    {
        return UsernameValidation::MustStartWithLetter;
    }

    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return UsernameValidation::InvalidCharacters;
        }
    }

    UsernameValidation::Valid
}

#[derive(Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct CreateAccount {
    pub username: String,
    pub password: String,
}

// Master data

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParty {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHead {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentType {
    pub name: String,
    pub kind: PaymentTypeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentMode {
    pub name: String,
}

// Ledger entries

/// Entry creation body, typed per transaction type. The tag decides
/// which amount and relation fields are meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transaction_type", rename_all = "snake_case")]
pub enum CreateEntry {
    Credit(CreateCredit),
    Debit(CreateDebit),
    SelfTransfer(CreateSelfTransfer),
}

impl CreateEntry {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            CreateEntry::Credit(_) => TransactionType::Credit,
            CreateEntry::Debit(_) => TransactionType::Debit,
            CreateEntry::SelfTransfer(_) => TransactionType::SelfTransfer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCredit {
    pub transaction_date: Date,
    pub description: String,
    pub received_amount: Decimal,
    pub party_id: PartyId,
    pub head_id: HeadId,
    pub payment_type_id: PaymentTypeId,
    pub payment_mode_id: PaymentModeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDebit {
    pub transaction_date: Date,
    pub description: String,
    /// Component A: primary expense. Forced to zero when the payment
    /// type is non-expense.
    pub expense_amount: Decimal,
    /// Component B: claimable portion, may be zero.
    pub claimable_amount: Decimal,
    pub party_id: PartyId,
    pub head_id: HeadId,
    pub payment_type_id: PaymentTypeId,
    pub payment_mode_id: PaymentModeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSelfTransfer {
    pub transaction_date: Date,
    pub description: String,
    pub transfer_amount: Decimal,
    pub from_payment_mode_id: PaymentModeId,
    pub to_payment_mode_id: PaymentModeId,
}

/// Filter for listing entries. All fields are optional; absent fields
/// do not constrain the result. Deleted entries are excluded unless
/// `include_deleted` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEntries {
    pub status: Option<EntryStatus>,
    pub transaction_type: Option<TransactionType>,
    pub party_id: Option<PartyId>,
    pub head_id: Option<HeadId>,
    pub payment_mode_id: Option<PaymentModeId>,
    pub payment_type_id: Option<PaymentTypeId>,
    pub edit_request_status: Option<EditRequestStatus>,
    /// Case-insensitive substring match against serial number,
    /// description, party name, and creator username.
    pub search: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub include_deleted: Option<bool>,
    /// 1-based page number; defaults to 1.
    pub page: Option<i64>,
    /// Page size; defaults to 50, capped at 200.
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideEntry {
    pub entry_id: EntryId,
    pub action: DecisionAction,
    /// Required when rejecting.
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDecide {
    pub entry_ids: Vec<EntryId>,
    pub action: DecisionAction,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoDecision {
    pub entry_id: EntryId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEdit {
    pub entry_id: EntryId,
    pub reason: String,
    pub changes: EntryChanges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveEdit {
    pub entry_id: EntryId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectEdit {
    pub entry_id: EntryId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub entry_id: EntryId,
    pub reason: String,
}
