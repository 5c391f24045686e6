//! Ledger store: balance state and the append-only entry log
//!
//! This module provides the `LedgerBook`, the only place user balances are
//! mutated. Every balance-affecting operation appends a `LedgerEntry`, and
//! the derived fields on `User` must always reconcile to the sum of
//! completed entries.
//!
//! # Thread Safety
//!
//! Users are stored in a `DashMap`; each operation runs its read-check-write
//! sequence inside a single entry lock, so two concurrent operations on the
//! same user cannot interleave and lose updates. Balance arithmetic is
//! checked, and a failed check leaves the user untouched.

use crate::types::{
    CompletionId, EntryId, EntryKind, EntryStatus, LedgerEntry, LedgerError, User, UserId,
    UserStatus,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Points deducted per currency unit withdrawn
const POINTS_PER_UNIT: i64 = 100;

/// Balance store and transaction log for all users
///
/// Owns the `User` rows and the append-only `LedgerEntry` log. Offers,
/// completions, withdrawals and audit records live in their own stores;
/// only balance truth lives here.
#[derive(Debug, Default)]
pub struct LedgerBook {
    /// User state keyed by user ID
    users: DashMap<UserId, User>,

    /// Append-only entry log; entries only ever move Pending -> Completed
    entries: Mutex<Vec<LedgerEntry>>,

    /// Next ledger entry ID
    next_entry: AtomicU64,
}

impl LedgerBook {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a user with zero balances
    pub fn create_user(&self, id: UserId, now: DateTime<Utc>) -> User {
        self.users
            .entry(id)
            .or_insert_with(|| User::new(id, now))
            .clone()
    }

    /// Snapshot a user's current state
    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    /// Snapshot all users
    pub fn all_users(&self) -> Vec<User> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    /// Update an existing user under its entry lock
    ///
    /// The closure runs while the entry is locked, so its read-check-write
    /// sequence is atomic with respect to every other ledger operation on
    /// the same user. Returns `UserNotFound` if the user does not exist;
    /// ledger operations never create users implicitly.
    pub fn update_user<F>(&self, id: UserId, f: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut User) -> Result<(), LedgerError>,
    {
        let mut entry = self
            .users
            .get_mut(&id)
            .ok_or_else(|| LedgerError::user_not_found(id))?;
        f(entry.value_mut())
    }

    /// Credit an approved offer completion
    ///
    /// Increases `available`, `total_earned` and `points`, and appends a
    /// Completed Earn entry linked to the completion record. Banned users
    /// are never credited.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist, is banned, or the
    /// credit would overflow. On error no state changes.
    pub fn credit_earned(
        &self,
        user: UserId,
        amount: Decimal,
        points: i64,
        completion: Option<CompletionId>,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryId, LedgerError> {
        self.credit(user, EntryKind::Earn, amount, points, completion, note, now)
    }

    /// Credit an admin-granted bonus
    pub fn grant_bonus(
        &self,
        user: UserId,
        amount: Decimal,
        points: i64,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryId, LedgerError> {
        self.credit(user, EntryKind::Bonus, amount, points, None, note, now)
    }

    /// Credit an admin balance correction
    ///
    /// Adjustments are credits only; debits must flow through the
    /// withdrawal state machine so that every debit is a reversible hold.
    pub fn adjust_balance(
        &self,
        user: UserId,
        amount: Decimal,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryId, LedgerError> {
        self.credit(user, EntryKind::Adjustment, amount, 0, None, note, now)
    }

    fn credit(
        &self,
        user: UserId,
        kind: EntryKind,
        amount: Decimal,
        points: i64,
        completion: Option<CompletionId>,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryId, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        self.update_user(user, |account| {
            if account.status == UserStatus::Banned {
                return Err(LedgerError::account_blocked(user, account.status));
            }

            let new_available = account
                .available
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("credit", user))?;
            let new_total_earned = account
                .total_earned
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("credit", user))?;

            account.available = new_available;
            account.total_earned = new_total_earned;
            account.points = account.points.saturating_add(points);
            Ok(())
        })?;

        Ok(self.append_entry(
            user,
            kind,
            amount,
            points,
            EntryStatus::Completed,
            completion,
            note,
            now,
        ))
    }

    /// Place a withdrawal hold
    ///
    /// Atomically moves `amount` from available to pending, deducts points,
    /// stamps `first_withdrawal_at` on the user's first hold, and appends a
    /// Pending Spend entry. Insufficient balance fails the whole operation
    /// with no partial mutation.
    ///
    /// # Returns
    ///
    /// The ID of the Pending Spend entry, which the withdrawal request
    /// keeps so the entry can be completed when the payout settles.
    pub fn hold_for_withdrawal(
        &self,
        user: UserId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(EntryId, i64), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "hold amount must be positive, got {}",
                amount
            )));
        }
        let points = points_for(amount);

        self.update_user(user, |account| {
            if account.status != UserStatus::Active {
                return Err(LedgerError::account_blocked(user, account.status));
            }
            if account.available < amount {
                return Err(LedgerError::insufficient_available(
                    user,
                    account.available,
                    amount,
                ));
            }

            let new_available = account
                .available
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::arithmetic_underflow("hold_for_withdrawal", user))?;
            let new_pending = account
                .pending
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("hold_for_withdrawal", user))?;

            account.available = new_available;
            account.pending = new_pending;
            account.points = account.points.saturating_sub(points);
            if account.first_withdrawal_at.is_none() {
                account.first_withdrawal_at = Some(now);
            }
            Ok(())
        })?;

        let entry = self.append_entry(
            user,
            EntryKind::Spend,
            -amount,
            -points,
            EntryStatus::Pending,
            None,
            "withdrawal hold",
            now,
        );
        Ok((entry, points))
    }

    /// Settle a hold after a withdrawal completes
    ///
    /// The pending funds were disbursed externally: decrement `pending` and
    /// complete the hold's Spend entry. `available` and `total_earned` are
    /// untouched; the hold already reserved everything.
    pub fn settle_hold(
        &self,
        user: UserId,
        amount: Decimal,
        hold_entry: EntryId,
    ) -> Result<(), LedgerError> {
        self.update_user(user, |account| {
            if account.pending < amount {
                return Err(LedgerError::insufficient_pending(
                    user,
                    account.pending,
                    amount,
                ));
            }
            account.pending = account
                .pending
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::arithmetic_underflow("settle_hold", user))?;
            Ok(())
        })?;

        self.complete_entry(hold_entry);
        Ok(())
    }

    /// Release a hold after a withdrawal is rejected
    ///
    /// Moves the held amount back from pending to available, restores the
    /// deducted points, and appends a Completed Adjustment refund entry.
    /// The refund counts into `total_earned` so the earned sum stays equal
    /// to the sum of completed credit entries; the hold's Spend entry stays
    /// Pending forever (the spend never happened).
    pub fn release_hold(
        &self,
        user: UserId,
        amount: Decimal,
        points: i64,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<EntryId, LedgerError> {
        self.update_user(user, |account| {
            if account.pending < amount {
                return Err(LedgerError::insufficient_pending(
                    user,
                    account.pending,
                    amount,
                ));
            }

            let new_pending = account
                .pending
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::arithmetic_underflow("release_hold", user))?;
            let new_available = account
                .available
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("release_hold", user))?;
            let new_total_earned = account
                .total_earned
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("release_hold", user))?;

            account.pending = new_pending;
            account.available = new_available;
            account.total_earned = new_total_earned;
            account.points = account.points.saturating_add(points);
            Ok(())
        })?;

        Ok(self.append_entry(
            user,
            EntryKind::Adjustment,
            amount,
            points,
            EntryStatus::Completed,
            None,
            note,
            now,
        ))
    }

    /// Snapshot all entries for one user, oldest first
    pub fn entries_for(&self, user: UserId) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.user == user)
            .cloned()
            .collect()
    }

    /// Snapshot the whole entry log, oldest first
    pub fn all_entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sum of completed credit entries for one user
    pub fn earned_sum(&self, user: UserId) -> Decimal {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|entry| entry.user == user && entry.counts_as_earned())
            .map(|entry| entry.amount)
            .sum()
    }

    /// Check the derived-balance invariant for one user
    ///
    /// `total_earned` must equal the sum of completed Earn, Bonus and
    /// Adjustment entries. Returns false for unknown users.
    pub fn reconciles(&self, user: UserId) -> bool {
        match self.get_user(user) {
            Some(account) => account.total_earned == self.earned_sum(user),
            None => false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn append_entry(
        &self,
        user: UserId,
        kind: EntryKind,
        amount: Decimal,
        points: i64,
        status: EntryStatus,
        completion: Option<CompletionId>,
        note: &str,
        now: DateTime<Utc>,
    ) -> EntryId {
        let id = self.next_entry.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = LedgerEntry {
            id,
            user,
            kind,
            amount,
            points,
            status,
            completion,
            note: note.to_string(),
            created_at: now,
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        id
    }

    /// Move an entry from Pending to Completed
    fn complete_entry(&self, id: EntryId) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) {
            entry.status = EntryStatus::Completed;
        }
    }
}

/// Points deducted for a withdrawal of `amount`
fn points_for(amount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (amount * Decimal::from(POINTS_PER_UNIT))
        .trunc()
        .to_i64()
        .unwrap_or(0)
}
