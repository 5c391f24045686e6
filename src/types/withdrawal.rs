//! Withdrawal request types

use super::ledger::EntryId;
use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Withdrawal request identifier
pub type WithdrawalId = u64;

/// Lifecycle state of a withdrawal request
///
/// Pending requests hold funds in `User.pending`; Completed and Rejected are
/// terminal and may each be reached at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    /// Lowercase label used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

/// Admin decision on a pending withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalDecision {
    /// The payout was disbursed externally; settle the hold
    Completed,

    /// The request was refused; release the hold back to available
    Rejected,
}

/// A user-initiated request to pay out available balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// The request ID
    pub id: WithdrawalId,

    /// The requesting user
    pub user: UserId,

    /// Amount held from the available balance
    pub amount: Decimal,

    /// Points deducted alongside the amount
    pub points_deducted: i64,

    /// Payout method, e.g. "paypal"
    pub method: String,

    /// Payment destination string, e.g. an email address
    pub destination: String,

    /// Current lifecycle state
    pub status: WithdrawalStatus,

    /// The Pending Spend ledger entry created by the hold
    pub hold_entry: EntryId,

    /// Optional admin notes recorded at adjudication
    pub notes: Option<String>,

    /// When the user requested the withdrawal
    pub requested_at: DateTime<Utc>,

    /// When an admin adjudicated the request, if they have
    pub processed_at: Option<DateTime<Utc>>,
}
