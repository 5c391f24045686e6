//! User account types for the rewards ledger
//!
//! This module defines the User structure holding the balance fields the
//! ledger is responsible for, plus the account signals the fraud advisor
//! reads when computing a risk score.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User identifier
///
/// Supports user IDs from 0 to 2^64-1
pub type UserId = u64;

/// Account standing of a user
///
/// Suspended users may keep earned funds but cannot start offers or
/// request withdrawals. Banned users are additionally never credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
    Banned,
}

impl UserStatus {
    /// Lowercase label used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
            UserStatus::Banned => "banned",
        }
    }
}

/// User balance state
///
/// Represents the current state of a user's reward balances. The balance
/// fields are derived caches over the ledger entry log and must only be
/// mutated through `LedgerBook` operations, never by direct field writes
/// outside the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: UserId,

    /// Funds available for withdrawal
    ///
    /// Increased by credits (earn, bonus, adjustment), decreased when a
    /// withdrawal hold moves funds to `pending`.
    pub available: Decimal,

    /// Funds reserved by open withdrawal holds
    ///
    /// Moved back to `available` when a withdrawal is rejected, or settled
    /// away when a withdrawal is completed.
    pub pending: Decimal,

    /// Lifetime sum of completed credit entries
    ///
    /// Monotonically non-decreasing. Always reconciles to the sum of
    /// completed Earn, Bonus and Adjustment entries for this user.
    pub total_earned: Decimal,

    /// Reward points balance
    pub points: i64,

    /// Account standing
    pub status: UserStatus,

    /// Whether the user's email address has been verified
    pub email_verified: bool,

    /// Account creation time, used for age-based fraud scoring
    pub created_at: DateTime<Utc>,

    /// Time of the first withdrawal request, if any
    ///
    /// A first withdrawal inside 24 hours of signup is a fraud signal.
    pub first_withdrawal_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new active user with zero balances
    pub fn new(id: UserId, created_at: DateTime<Utc>) -> Self {
        User {
            id,
            available: Decimal::ZERO,
            pending: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            points: 0,
            status: UserStatus::Active,
            email_verified: false,
            created_at,
            first_withdrawal_at: None,
        }
    }
}
