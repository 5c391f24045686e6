//! Fraud scoring advisor
//!
//! Computes an additive risk score in [0, 100] from account signals and
//! recorded fraud events. The score is advisory for most of the system (it
//! is surfaced to admins reviewing withdrawals) and enforced in exactly one
//! place: starting an offer is blocked above the gate threshold.
//!
//! Scoring is read-only over ledger and completion state, so it can never
//! perturb balances. The one write path is `record_signal`, where a
//! Critical signal suspends the account.

use crate::core::completions::CompletionStore;
use crate::core::ledger::LedgerBook;
use crate::types::{CompletionStatus, FraudSignal, LedgerError, Severity, UserId, UserStatus};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// Score above which offer starts are refused
const GATE_THRESHOLD: u8 = 80;

/// Risk scorer over ledger, completion and signal state
#[derive(Debug)]
pub struct FraudAdvisor {
    ledger: Arc<LedgerBook>,
    completions: Arc<CompletionStore>,

    /// Recorded fraud events per user, append-only
    signals: DashMap<UserId, Vec<FraudSignal>>,
}

impl FraudAdvisor {
    /// Create an advisor over the given stores
    pub fn new(ledger: Arc<LedgerBook>, completions: Arc<CompletionStore>) -> Self {
        FraudAdvisor {
            ledger,
            completions,
            signals: DashMap::new(),
        }
    }

    /// Compute the current risk score for a user
    ///
    /// Additive factors, capped at 100:
    ///
    /// - account age: under 1 day +20, under 7 days +10, under 30 days +5
    /// - unverified email +15
    /// - approved completions in the trailing 24h: over 10 +25, over 5 +15
    /// - average approved completions per day since signup over 5 +20
    /// - first withdrawal within 24h of signup +20
    /// - each Critical signal +15, each High signal +10
    ///
    /// Unknown users score 0; existence checks belong to the callers.
    pub fn score(&self, user: UserId, now: DateTime<Utc>) -> u8 {
        let Some(account) = self.ledger.get_user(user) else {
            return 0;
        };

        let mut score: u32 = 0;

        let age = now - account.created_at;
        if age < Duration::days(1) {
            score += 20;
        } else if age < Duration::days(7) {
            score += 10;
        } else if age < Duration::days(30) {
            score += 5;
        }

        if !account.email_verified {
            score += 15;
        }

        let approved: Vec<_> = self
            .completions
            .completions_for_user(user)
            .into_iter()
            .filter(|c| c.status == CompletionStatus::Approved)
            .collect();

        let last_day = approved
            .iter()
            .filter(|c| match c.completed_at {
                Some(at) => now - at < Duration::days(1),
                None => false,
            })
            .count();
        if last_day > 10 {
            score += 25;
        } else if last_day > 5 {
            score += 15;
        }

        let days_since_signup = age.num_days().max(1) as usize;
        if approved.len() > 5 * days_since_signup {
            score += 20;
        }

        if let Some(first) = account.first_withdrawal_at {
            if first - account.created_at < Duration::days(1) {
                score += 20;
            }
        }

        if let Some(events) = self.signals.get(&user) {
            for signal in events.iter() {
                match signal.severity {
                    Severity::Critical => score += 15,
                    Severity::High => score += 10,
                    Severity::Medium | Severity::Low => {}
                }
            }
        }

        score.min(100) as u8
    }

    /// Append a fraud signal
    ///
    /// A Critical signal suspends the account immediately; banned accounts
    /// are left banned. The suspension is logged, not returned, since
    /// signal recording must never fail the caller.
    pub fn record_signal(&self, signal: FraudSignal) {
        let user = signal.user;
        let critical = signal.severity == Severity::Critical;

        self.signals.entry(user).or_default().push(signal);

        if critical {
            let result = self.ledger.update_user(user, |account| {
                if account.status != UserStatus::Banned {
                    account.status = UserStatus::Suspended;
                }
                Ok(())
            });
            match result {
                Ok(()) => warn!(user, "account suspended on critical fraud signal"),
                Err(error) => warn!(user, %error, "critical fraud signal for unknown user"),
            }
        }
    }

    /// Snapshot the recorded signals for a user
    pub fn signals_for(&self, user: UserId) -> Vec<FraudSignal> {
        self.signals
            .get(&user)
            .map(|events| events.value().clone())
            .unwrap_or_default()
    }

    /// Gate check applied before an offer start
    pub fn check_offer_start(&self, user: UserId, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let score = self.score(user, now);
        if score > GATE_THRESHOLD {
            return Err(LedgerError::FraudBlocked { user, score });
        }
        Ok(())
    }
}
