//! Ledger entry types
//!
//! The entry log is the source of truth for balances: `User.available` and
//! `User.total_earned` are derived caches that must always reconcile to the
//! sum of completed entries.

use super::completion::CompletionId;
use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger entry identifier
pub type EntryId = u64;

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Credit from an approved offer completion
    Earn,

    /// Admin-granted bonus credit
    Bonus,

    /// Balance correction, including withdrawal-rejection refunds
    Adjustment,

    /// Withdrawal hold debit
    Spend,
}

/// Settlement state of a ledger entry
///
/// Only Completed entries contribute to derived balances. A withdrawal hold
/// starts as a Pending Spend entry and is completed when the withdrawal is
/// approved; if the withdrawal is rejected the Spend entry stays Pending and
/// a Completed Adjustment refund is appended instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
}

/// Immutable record of one balance-affecting event
///
/// Entries are append-only; after creation only the `status` field may move
/// from Pending to Completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The entry ID, monotonically increasing
    pub id: EntryId,

    /// The user whose balance this entry affects
    pub user: UserId,

    /// What kind of event this records
    pub kind: EntryKind,

    /// Signed amount: positive for credits, negative for spends
    pub amount: Decimal,

    /// Signed points delta
    pub points: i64,

    /// Settlement state
    pub status: EntryStatus,

    /// Link to the completion record that produced this entry, if any
    pub completion: Option<CompletionId>,

    /// Human-readable description
    pub note: String,

    /// When the entry was appended
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether this entry counts into `User.total_earned`
    ///
    /// Completed Earn, Bonus and Adjustment entries make up the lifetime
    /// earned sum; Spend entries never do.
    pub fn counts_as_earned(&self) -> bool {
        self.status == EntryStatus::Completed
            && matches!(
                self.kind,
                EntryKind::Earn | EntryKind::Bonus | EntryKind::Adjustment
            )
    }
}
