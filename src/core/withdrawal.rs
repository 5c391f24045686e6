//! Withdrawal adjudication
//!
//! A withdrawal is a two-phase debit: requesting one places a hold
//! (available -> pending) and an admin decision later settles or releases
//! it. Holds mean a rejected request restores the user exactly, and a
//! completed one only ever touches funds that were already reserved.
//!
//! A request's map entry lock is the double-decision guard: the status
//! check and the terminal-state write happen under it, so concurrent
//! decisions on the same request resolve to one winner.

use crate::config::SettingsProvider;
use crate::core::ledger::LedgerBook;
use crate::types::{
    LedgerError, UserId, WithdrawalDecision, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Store and state machine for withdrawal requests
pub struct WithdrawalDesk {
    ledger: Arc<LedgerBook>,
    settings: Arc<dyn SettingsProvider>,
    requests: DashMap<WithdrawalId, WithdrawalRequest>,
    next_id: AtomicU64,
}

impl WithdrawalDesk {
    /// Create a desk over the given ledger
    pub fn new(ledger: Arc<LedgerBook>, settings: Arc<dyn SettingsProvider>) -> Self {
        WithdrawalDesk {
            ledger,
            settings,
            requests: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Open a withdrawal request, placing the hold
    ///
    /// # Errors
    ///
    /// - `BelowMinimum` if the amount is under the configured minimum
    /// - any hold error from the ledger (blocked account, insufficient
    ///   available balance); nothing is recorded in that case
    pub fn request(
        &self,
        user: UserId,
        amount: Decimal,
        method: &str,
        destination: &str,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let minimum = self.settings.current().min_withdrawal;
        if amount < minimum {
            return Err(LedgerError::BelowMinimum { amount, minimum });
        }

        let (hold_entry, points_deducted) = self.ledger.hold_for_withdrawal(user, amount, now)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = WithdrawalRequest {
            id,
            user,
            amount,
            points_deducted,
            method: method.to_string(),
            destination: destination.to_string(),
            status: WithdrawalStatus::Pending,
            hold_entry,
            notes: None,
            requested_at: now,
            processed_at: None,
        };
        self.requests.insert(id, request.clone());

        info!(withdrawal = id, user, %amount, method, "withdrawal requested");
        Ok(request)
    }

    /// Apply an admin decision to a pending request
    ///
    /// Completing settles the hold; rejecting releases it back to the
    /// available balance and restores the deducted points. Either way the
    /// request reaches a terminal state exactly once. The ledger write runs
    /// before the status write, so a failed ledger operation leaves the
    /// request Pending and decidable again.
    ///
    /// # Errors
    ///
    /// - `WithdrawalNotFound` for an unknown request
    /// - `AlreadyAdjudicated` when the request is no longer Pending
    pub fn adjudicate(
        &self,
        id: WithdrawalId,
        decision: WithdrawalDecision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or(LedgerError::WithdrawalNotFound { withdrawal: id })?;
        let request = entry.value_mut();

        if request.status != WithdrawalStatus::Pending {
            return Err(LedgerError::already_adjudicated(
                id,
                request.status.as_str(),
            ));
        }

        let status = match decision {
            WithdrawalDecision::Completed => {
                self.ledger
                    .settle_hold(request.user, request.amount, request.hold_entry)?;
                WithdrawalStatus::Completed
            }
            WithdrawalDecision::Rejected => {
                self.ledger.release_hold(
                    request.user,
                    request.amount,
                    request.points_deducted,
                    "withdrawal rejected",
                    now,
                )?;
                WithdrawalStatus::Rejected
            }
        };

        request.status = status;
        request.notes = notes;
        request.processed_at = Some(now);

        info!(
            withdrawal = id,
            user = request.user,
            status = status.as_str(),
            "withdrawal adjudicated"
        );
        Ok(request.clone())
    }

    /// Snapshot one request
    pub fn get(&self, id: WithdrawalId) -> Option<WithdrawalRequest> {
        self.requests.get(&id).map(|r| r.value().clone())
    }

    /// Snapshot all requests for one user
    pub fn requests_for_user(&self, user: UserId) -> Vec<WithdrawalRequest> {
        self.requests
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Snapshot all requests
    pub fn all(&self) -> Vec<WithdrawalRequest> {
        self.requests.iter().map(|r| r.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LiveSettings, Settings};
    use crate::types::{EntryStatus, UserStatus};

    fn desk() -> (Arc<LedgerBook>, WithdrawalDesk) {
        let ledger = Arc::new(LedgerBook::new());
        let settings = Arc::new(LiveSettings::new(Settings::default()));
        let desk = WithdrawalDesk::new(Arc::clone(&ledger), settings);
        (ledger, desk)
    }

    fn funded_user(ledger: &LedgerBook, user: UserId, amount: Decimal) {
        ledger.create_user(user, Utc::now());
        ledger
            .credit_earned(user, amount, 0, None, "seed", Utc::now())
            .unwrap();
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_request_places_hold() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(200000, 4));

        let request = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap();

        assert_eq!(request.status, WithdrawalStatus::Pending);
        assert_eq!(request.points_deducted, 1000);

        let user = ledger.get_user(1).unwrap();
        assert_eq!(user.available, Decimal::new(100000, 4));
        assert_eq!(user.pending, Decimal::new(100000, 4));
    }

    #[test]
    fn test_request_below_minimum_fails_without_hold() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(200000, 4));

        let err = desk
            .request(1, Decimal::new(100, 2), "paypal", "a@b.test", now())
            .unwrap_err();

        assert!(matches!(err, LedgerError::BelowMinimum { .. }));
        assert_eq!(ledger.get_user(1).unwrap().pending, Decimal::ZERO);
        assert!(desk.all().is_empty());
    }

    #[test]
    fn test_request_over_balance_records_nothing() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(60000, 4));

        let before = ledger.get_user(1).unwrap();
        let err = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientAvailable { .. }));
        assert_eq!(ledger.get_user(1).unwrap(), before);
        assert!(desk.all().is_empty());
    }

    #[test]
    fn test_complete_settles_hold() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(100000, 4));
        let request = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap();

        let decided = desk
            .adjudicate(
                request.id,
                WithdrawalDecision::Completed,
                Some("paid batch 7".to_string()),
                now(),
            )
            .unwrap();

        assert_eq!(decided.status, WithdrawalStatus::Completed);
        assert_eq!(decided.notes.as_deref(), Some("paid batch 7"));
        assert!(decided.processed_at.is_some());

        let user = ledger.get_user(1).unwrap();
        assert_eq!(user.available, Decimal::ZERO);
        assert_eq!(user.pending, Decimal::ZERO);
        assert_eq!(user.total_earned, Decimal::new(100000, 4));

        // Hold entry settled
        let entries = ledger.entries_for(1);
        let spend = entries.iter().find(|e| e.id == request.hold_entry).unwrap();
        assert_eq!(spend.status, EntryStatus::Completed);
    }

    #[test]
    fn test_reject_restores_user_exactly() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(100000, 4));
        let before = ledger.get_user(1).unwrap();

        let request = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap();
        desk.adjudicate(request.id, WithdrawalDecision::Rejected, None, now())
            .unwrap();

        let after = ledger.get_user(1).unwrap();
        assert_eq!(after.available, before.available);
        assert_eq!(after.pending, Decimal::ZERO);
        assert_eq!(after.points, before.points);
        assert!(ledger.reconciles(1));
    }

    #[test]
    fn test_second_decision_fails() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(100000, 4));
        let request = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap();

        desk.adjudicate(request.id, WithdrawalDecision::Completed, None, now())
            .unwrap();

        for decision in [WithdrawalDecision::Completed, WithdrawalDecision::Rejected] {
            let err = desk
                .adjudicate(request.id, decision, None, now())
                .unwrap_err();
            assert!(matches!(err, LedgerError::AlreadyAdjudicated { .. }));
        }

        // Balances unchanged by the refused decisions
        let user = ledger.get_user(1).unwrap();
        assert_eq!(user.available, Decimal::ZERO);
        assert_eq!(user.pending, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_request_fails() {
        let (_, desk) = desk();
        let err = desk
            .adjudicate(9, WithdrawalDecision::Completed, None, now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::WithdrawalNotFound { .. }));
    }

    #[test]
    fn test_suspended_user_cannot_request() {
        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(100000, 4));
        ledger
            .update_user(1, |u| {
                u.status = UserStatus::Suspended;
                Ok(())
            })
            .unwrap();

        let err = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountBlocked { .. }));
    }

    #[test]
    fn test_concurrent_decisions_yield_one_winner() {
        use std::thread;

        let (ledger, desk) = desk();
        funded_user(&ledger, 1, Decimal::new(100000, 4));
        let desk = Arc::new(desk);
        let request = desk
            .request(1, Decimal::new(100000, 4), "paypal", "a@b.test", now())
            .unwrap();

        let mut handles = vec![];
        for i in 0..20 {
            let desk = Arc::clone(&desk);
            let id = request.id;
            let decision = if i % 2 == 0 {
                WithdrawalDecision::Completed
            } else {
                WithdrawalDecision::Rejected
            };
            handles.push(thread::spawn(move || {
                desk.adjudicate(id, decision, None, now()).is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(wins, 1);
        assert!(ledger.reconciles(1));
        assert_eq!(ledger.get_user(1).unwrap().pending, Decimal::ZERO);
    }
}
