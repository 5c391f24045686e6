//! Completion store and idempotency guard
//!
//! Tracks every (user, offer) attempt as a `CompletionRecord` and enforces
//! the two uniqueness rules that make postback crediting idempotent:
//!
//! - a user attempts a given offer at most once, and
//! - a completion is approved at most once, no matter how many postback
//!   deliveries race for it.
//!
//! Approval is a compare-and-set under the record's map entry lock; the
//! first delivery to observe a non-terminal status wins, every later one
//! gets a duplicate error. Fallback-path deliveries (raw user id, no
//! completion record) are deduplicated through a claimed-key table instead.

use crate::types::{
    CompletionId, CompletionRecord, CompletionStatus, LedgerError, OfferId, UserId,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Store of offer completion attempts
#[derive(Debug, Default)]
pub struct CompletionStore {
    /// Completion records keyed by ID
    completions: DashMap<CompletionId, CompletionRecord>,

    /// (user, offer) -> completion, enforcing one attempt per pair
    by_pair: DashMap<(UserId, OfferId), CompletionId>,

    /// Claimed idempotency keys for fallback-path deliveries
    fallback_keys: DashMap<String, u64>,

    /// Next completion ID
    next_id: AtomicU64,

    /// Sequence for fallback-key claim tokens
    claim_seq: AtomicU64,
}

impl CompletionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a user started an offer
    ///
    /// The (user, offer) pair is claimed atomically; a second start for the
    /// same pair loses the insert race and fails, whichever thread it runs
    /// on.
    ///
    /// # Errors
    ///
    /// Returns `OfferAlreadyStarted` if a completion record for this pair
    /// already exists.
    pub fn start(
        &self,
        user: UserId,
        offer: OfferId,
        now: DateTime<Utc>,
    ) -> Result<CompletionRecord, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        // First insert wins; a loser sees the winner's id instead of its own
        let claimed = *self.by_pair.entry((user, offer)).or_insert(id);
        if claimed != id {
            return Err(LedgerError::OfferAlreadyStarted { user, offer });
        }

        let record = CompletionRecord {
            id,
            user,
            offer,
            status: CompletionStatus::Started,
            started_at: now,
            completed_at: None,
        };
        self.completions.insert(id, record.clone());
        Ok(record)
    }

    /// Snapshot one completion record
    pub fn get(&self, id: CompletionId) -> Option<CompletionRecord> {
        self.completions.get(&id).map(|r| r.value().clone())
    }

    /// Find the completion record for a (user, offer) pair
    pub fn find_by_pair(&self, user: UserId, offer: OfferId) -> Option<CompletionRecord> {
        let id = *self.by_pair.get(&(user, offer))?;
        self.get(id)
    }

    /// Snapshot all completion records for one user
    pub fn completions_for_user(&self, user: UserId) -> Vec<CompletionRecord> {
        self.completions
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Atomically claim a completion for approval
    ///
    /// This is the duplicate-postback gate: the status check and the write
    /// to Approved happen under the record's entry lock, so of any number
    /// of racing deliveries exactly one returns the claimed record and the
    /// rest fail as duplicates.
    ///
    /// # Errors
    ///
    /// - `CompletionNotFound` if no such record exists
    /// - `AlreadyCredited` if the record is already Approved
    /// - `CompletionStateConflict` if the record is Rejected
    pub fn claim_approval(
        &self,
        id: CompletionId,
        now: DateTime<Utc>,
    ) -> Result<CompletionRecord, LedgerError> {
        let mut entry = self
            .completions
            .get_mut(&id)
            .ok_or(LedgerError::CompletionNotFound { completion: id })?;
        let record = entry.value_mut();

        match record.status {
            CompletionStatus::Approved => Err(LedgerError::already_credited(id)),
            CompletionStatus::Rejected => Err(LedgerError::completion_state_conflict(
                id,
                record.status,
                "approve",
            )),
            CompletionStatus::Started | CompletionStatus::Pending => {
                record.status = CompletionStatus::Approved;
                record.completed_at = Some(now);
                Ok(record.clone())
            }
        }
    }

    /// Roll back a claimed approval whose credit failed to apply
    ///
    /// Puts the record back into Started so a later retry of the delivery
    /// can claim it again. Only meaningful right after `claim_approval`,
    /// before the claim has been acknowledged anywhere.
    pub fn revert_approval(&self, id: CompletionId) {
        if let Some(mut entry) = self.completions.get_mut(&id) {
            let record = entry.value_mut();
            if record.status == CompletionStatus::Approved {
                record.status = CompletionStatus::Started;
                record.completed_at = None;
            }
        }
    }

    /// Mark a completion rejected
    ///
    /// Rejecting an already-rejected record is a no-op; rejecting an
    /// approved record is a conflict, since the credit has already been
    /// applied and debits only flow through withdrawal holds.
    pub fn reject(
        &self,
        id: CompletionId,
        now: DateTime<Utc>,
    ) -> Result<CompletionRecord, LedgerError> {
        let mut entry = self
            .completions
            .get_mut(&id)
            .ok_or(LedgerError::CompletionNotFound { completion: id })?;
        let record = entry.value_mut();

        match record.status {
            CompletionStatus::Approved => Err(LedgerError::completion_state_conflict(
                id,
                record.status,
                "reject",
            )),
            CompletionStatus::Rejected => Ok(record.clone()),
            CompletionStatus::Started | CompletionStatus::Pending => {
                record.status = CompletionStatus::Rejected;
                record.completed_at = Some(now);
                Ok(record.clone())
            }
        }
    }

    /// Claim an idempotency key for a fallback-path credit
    ///
    /// The first claim of a key wins atomically; every later claim fails as
    /// a duplicate delivery.
    pub fn claim_fallback_key(&self, key: &str) -> Result<(), LedgerError> {
        let token = self.claim_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let claimed = *self.fallback_keys.entry(key.to_string()).or_insert(token);
        if claimed != token {
            return Err(LedgerError::duplicate_delivery(key));
        }
        Ok(())
    }

    /// Release a claimed fallback key whose credit failed to apply
    pub fn release_fallback_key(&self, key: &str) {
        self.fallback_keys.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_start_creates_started_record() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();

        assert_eq!(record.status, CompletionStatus::Started);
        assert_eq!(record.completed_at, None);
        assert_eq!(store.get(record.id).unwrap(), record);
        assert_eq!(store.find_by_pair(1, 10).unwrap().id, record.id);
    }

    #[test]
    fn test_start_same_pair_twice_fails() {
        let store = CompletionStore::new();
        store.start(1, 10, now()).unwrap();

        let err = store.start(1, 10, now()).unwrap_err();
        assert!(matches!(err, LedgerError::OfferAlreadyStarted { .. }));

        // Same user on a different offer is fine
        store.start(1, 11, now()).unwrap();
        // Different user on the same offer is fine
        store.start(2, 10, now()).unwrap();
    }

    #[test]
    fn test_claim_approval_transitions_and_stamps() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();
        let at = now();

        let claimed = store.claim_approval(record.id, at).unwrap();
        assert_eq!(claimed.status, CompletionStatus::Approved);
        assert_eq!(claimed.completed_at, Some(at));
    }

    #[test]
    fn test_second_claim_is_duplicate() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();
        store.claim_approval(record.id, now()).unwrap();

        let err = store.claim_approval(record.id, now()).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyCredited { .. }));
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_claim_of_rejected_record_is_conflict() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();
        store.reject(record.id, now()).unwrap();

        let err = store.claim_approval(record.id, now()).unwrap_err();
        assert!(matches!(err, LedgerError::CompletionStateConflict { .. }));
    }

    #[test]
    fn test_claim_of_unknown_record_fails() {
        let store = CompletionStore::new();
        let err = store.claim_approval(99, now()).unwrap_err();
        assert!(matches!(err, LedgerError::CompletionNotFound { .. }));
    }

    #[test]
    fn test_revert_reopens_claim() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();
        store.claim_approval(record.id, now()).unwrap();

        store.revert_approval(record.id);

        // Claimable again after the revert
        let reclaimed = store.claim_approval(record.id, now()).unwrap();
        assert_eq!(reclaimed.status, CompletionStatus::Approved);
    }

    #[test]
    fn test_reject_approved_record_is_conflict() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();
        store.claim_approval(record.id, now()).unwrap();

        let err = store.reject(record.id, now()).unwrap_err();
        assert!(matches!(err, LedgerError::CompletionStateConflict { .. }));
    }

    #[test]
    fn test_reject_is_idempotent() {
        let store = CompletionStore::new();
        let record = store.start(1, 10, now()).unwrap();
        store.reject(record.id, now()).unwrap();
        let again = store.reject(record.id, now()).unwrap();
        assert_eq!(again.status, CompletionStatus::Rejected);
    }

    #[test]
    fn test_concurrent_claims_yield_exactly_one_winner() {
        let store = Arc::new(CompletionStore::new());
        let record = store.start(1, 10, now()).unwrap();

        let mut handles = vec![];
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let id = record.id;
            handles.push(thread::spawn(move || {
                store.claim_approval(id, now()).is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(
            store.get(record.id).unwrap().status,
            CompletionStatus::Approved
        );
    }

    #[test]
    fn test_concurrent_starts_yield_exactly_one_record() {
        let store = Arc::new(CompletionStore::new());

        let mut handles = vec![];
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || store.start(1, 10, now()).is_ok()));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(store.completions_for_user(1).len(), 1);
    }

    #[test]
    fn test_fallback_key_first_claim_wins() {
        let store = CompletionStore::new();
        store.claim_fallback_key("net:1:1.00:2026082910").unwrap();

        let err = store
            .claim_fallback_key("net:1:1.00:2026082910")
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateDelivery { .. }));

        // A different key is independent
        store.claim_fallback_key("net:1:1.00:2026082911").unwrap();
    }

    #[test]
    fn test_released_fallback_key_is_claimable_again() {
        let store = CompletionStore::new();
        store.claim_fallback_key("k").unwrap();
        store.release_fallback_key("k");
        store.claim_fallback_key("k").unwrap();
    }

    #[test]
    fn test_concurrent_fallback_claims_yield_one_winner() {
        let store = Arc::new(CompletionStore::new());

        let mut handles = vec![];
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.claim_fallback_key("shared-key").is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(wins, 1);
    }
}
