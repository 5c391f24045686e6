//! Postback reconciliation pipeline
//!
//! Processes advertiser network callbacks end to end: audit, authenticate,
//! normalize, resolve the subject, apply the credit exactly once. The
//! pipeline owns the ordering guarantees; the stores own the atomicity.
//!
//! Processing order is fixed:
//!
//! 1. append an audit record (even malformed deliveries are auditable)
//! 2. check the shared-secret token
//! 3. normalize parameters (subject aliases, payout)
//! 4. resolve the subject: completion record first, raw user id fallback
//! 5. claim idempotency (completion CAS, or fallback key)
//! 6. credit the ledger; roll the claim back if the credit fails
//!
//! Duplicates are not errors at this level: a retried delivery resolves to
//! a `Duplicate` receipt so webhook callers can acknowledge it as success.

use crate::config::SettingsProvider;
use crate::core::audit::AuditLog;
use crate::core::catalog::OfferCatalog;
use crate::core::completions::CompletionStore;
use crate::core::fraud::FraudAdvisor;
use crate::core::ledger::LedgerBook;
use crate::types::{
    AuditId, CompletionId, CompletionRecord, LedgerError, OfferId, Postback, PostbackParams,
    UserId, UserStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Network-reported statuses that reverse instead of credit
const REJECTION_STATUSES: [&str; 3] = ["rejected", "failed", "chargeback"];

/// Outcome of one processed postback delivery
#[derive(Debug, Clone, PartialEq)]
pub enum PostbackReceipt {
    /// The delivery credited a user
    Credited {
        /// Audit record for this delivery
        audit: AuditId,
        /// Credited user
        user: UserId,
        /// Amount credited
        amount: Decimal,
        /// Points credited
        points: i64,
        /// Completion approved by this delivery, if the subject resolved
        /// to one
        completion: Option<CompletionId>,
    },

    /// The event was already processed; acknowledged, nothing changed
    Duplicate {
        /// Audit record for this delivery
        audit: AuditId,
        /// Why the delivery was recognized as a duplicate
        reason: String,
    },

    /// The network reported a rejection; the completion was closed
    Rejected {
        /// Audit record for this delivery
        audit: AuditId,
        /// Completion moved to Rejected, if the subject resolved to one
        completion: Option<CompletionId>,
    },
}

/// End-to-end postback processor
pub struct PostbackPipeline {
    ledger: Arc<LedgerBook>,
    completions: Arc<CompletionStore>,
    catalog: Arc<OfferCatalog>,
    audits: Arc<AuditLog>,
    advisor: Arc<FraudAdvisor>,
    settings: Arc<dyn SettingsProvider>,
}

impl PostbackPipeline {
    /// Wire a pipeline over the given stores
    pub fn new(
        ledger: Arc<LedgerBook>,
        completions: Arc<CompletionStore>,
        catalog: Arc<OfferCatalog>,
        audits: Arc<AuditLog>,
        advisor: Arc<FraudAdvisor>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        PostbackPipeline {
            ledger,
            completions,
            catalog,
            audits,
            advisor,
            settings,
        }
    }

    /// Process one postback delivery
    ///
    /// Every call appends an audit record, whatever happens afterward.
    /// Duplicate deliveries return `Ok(Duplicate)`; real failures return
    /// the error after marking the audit record failed.
    pub fn process(
        &self,
        params: &PostbackParams,
        now: DateTime<Utc>,
    ) -> Result<PostbackReceipt, LedgerError> {
        let audit = self.audits.record(params, now);
        let settings = self.settings.current();

        if params.token() != Some(settings.postback_token.as_str()) {
            self.audits.mark_failed(audit, "Unauthorized");
            warn!(audit, "postback rejected: bad token");
            return Err(LedgerError::Unauthorized);
        }

        let postback = match params.normalize() {
            Ok(postback) => postback,
            Err(error) => {
                self.audits.mark_failed(audit, &error.to_string());
                warn!(audit, %error, "postback rejected: invalid parameters");
                return Err(error);
            }
        };

        match self.apply(audit, &postback, settings.default_reward_share, now) {
            Ok(receipt) => Ok(receipt),
            Err(error) if error.is_duplicate() => {
                let reason = error.to_string();
                self.audits.mark_failed(audit, &reason);
                info!(audit, subject = postback.subject, %reason, "duplicate postback");
                Ok(PostbackReceipt::Duplicate { audit, reason })
            }
            Err(error) => {
                self.audits.mark_failed(audit, &error.to_string());
                warn!(audit, subject = postback.subject, %error, "postback failed");
                Err(error)
            }
        }
    }

    fn apply(
        &self,
        audit: AuditId,
        postback: &Postback,
        reward_share: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PostbackReceipt, LedgerError> {
        if let Some(record) = self.completions.get(postback.subject) {
            if is_rejection(postback.status.as_deref()) {
                return self.apply_rejection(audit, record.id, now);
            }
            return self.credit_completion(audit, record, postback, reward_share, now);
        }

        if is_rejection(postback.status.as_deref()) {
            // Nothing to reverse on the fallback path
            self.audits.mark_failed(audit, "rejected by network");
            return Ok(PostbackReceipt::Rejected {
                audit,
                completion: None,
            });
        }
        self.credit_fallback(audit, postback, reward_share, now)
    }

    fn apply_rejection(
        &self,
        audit: AuditId,
        completion: CompletionId,
        now: DateTime<Utc>,
    ) -> Result<PostbackReceipt, LedgerError> {
        self.completions.reject(completion, now)?;
        self.audits.mark_failed(audit, "rejected by network");
        info!(audit, completion, "completion rejected by network postback");
        Ok(PostbackReceipt::Rejected {
            audit,
            completion: Some(completion),
        })
    }

    /// Credit an offer completion, at most once
    fn credit_completion(
        &self,
        audit: AuditId,
        record: CompletionRecord,
        postback: &Postback,
        reward_share: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PostbackReceipt, LedgerError> {
        let claimed = self.completions.claim_approval(record.id, now)?;

        // Offer-configured terms win over share-of-payout math
        let (amount, points) = match self.catalog.get(claimed.offer) {
            Some(offer) if offer.user_reward > Decimal::ZERO => {
                (offer.user_reward, offer.reward_points)
            }
            _ => (share_of(postback.payout, reward_share), 0),
        };

        let note = format!("offer {} completed via {}", claimed.offer, postback.network);
        match self
            .ledger
            .credit_earned(claimed.user, amount, points, Some(claimed.id), &note, now)
        {
            Ok(_) => {}
            Err(error) => {
                // Reopen the claim so a retried delivery can succeed
                self.completions.revert_approval(claimed.id);
                return Err(error);
            }
        }

        self.audits.mark_success(audit, claimed.user, amount);
        info!(
            audit,
            user = claimed.user,
            completion = claimed.id,
            %amount,
            network = %postback.network,
            "completion credited"
        );
        Ok(PostbackReceipt::Credited {
            audit,
            user: claimed.user,
            amount,
            points,
            completion: Some(claimed.id),
        })
    }

    /// Credit a raw-user-id delivery, deduplicated by a claimed key
    fn credit_fallback(
        &self,
        audit: AuditId,
        postback: &Postback,
        reward_share: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PostbackReceipt, LedgerError> {
        let user = postback.subject;
        if self.ledger.get_user(user).is_none() {
            return Err(LedgerError::user_not_found(user));
        }

        // Same network, user, amount and hour collapse to one credit
        let key = format!(
            "{}:{}:{}:{}",
            postback.network,
            user,
            postback.payout,
            now.format("%Y%m%d%H")
        );
        self.completions.claim_fallback_key(&key)?;

        let amount = share_of(postback.payout, reward_share);
        let note = format!("direct postback via {}", postback.network);
        match self.ledger.credit_earned(user, amount, 0, None, &note, now) {
            Ok(_) => {}
            Err(error) => {
                self.completions.release_fallback_key(&key);
                return Err(error);
            }
        }

        self.audits.mark_success(audit, user, amount);
        info!(audit, user, %amount, network = %postback.network, "direct postback credited");
        Ok(PostbackReceipt::Credited {
            audit,
            user,
            amount,
            points: 0,
            completion: None,
        })
    }

    /// Record that a user starts an offer, after all gates
    ///
    /// Gate order: user exists and is active, fraud score at or below the
    /// gate threshold, offer exists and is active, (user, offer) pair
    /// unused.
    pub fn start_offer(
        &self,
        user: UserId,
        offer: OfferId,
        now: DateTime<Utc>,
    ) -> Result<CompletionRecord, LedgerError> {
        let account = self
            .ledger
            .get_user(user)
            .ok_or_else(|| LedgerError::user_not_found(user))?;
        if account.status != UserStatus::Active {
            return Err(LedgerError::account_blocked(user, account.status));
        }

        self.advisor.check_offer_start(user, now)?;

        let published = self.catalog.require(offer)?;
        if !published.is_active {
            return Err(LedgerError::OfferInactive { offer });
        }

        self.completions.start(user, offer, now)
    }
}

/// Reward amount for a payout at the given share, at ledger precision
fn share_of(payout: Decimal, share: Decimal) -> Decimal {
    (payout * share).round_dp(4)
}

/// Whether a network-reported status reverses instead of credits
fn is_rejection(status: Option<&str>) -> bool {
    match status {
        Some(reported) => {
            let reported = reported.to_ascii_lowercase();
            REJECTION_STATUSES.iter().any(|s| *s == reported)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LiveSettings, Settings};
    use crate::types::{AuditStatus, CompletionStatus, Offer};

    const TOKEN: &str = "secret-token";

    struct Harness {
        ledger: Arc<LedgerBook>,
        completions: Arc<CompletionStore>,
        catalog: Arc<OfferCatalog>,
        audits: Arc<AuditLog>,
        pipeline: PostbackPipeline,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(LedgerBook::new());
        let completions = Arc::new(CompletionStore::new());
        let catalog = Arc::new(OfferCatalog::new());
        let audits = Arc::new(AuditLog::new());
        let advisor = Arc::new(FraudAdvisor::new(
            Arc::clone(&ledger),
            Arc::clone(&completions),
        ));
        let settings = Arc::new(LiveSettings::new(Settings {
            postback_token: TOKEN.to_string(),
            ..Settings::default()
        }));
        let pipeline = PostbackPipeline::new(
            Arc::clone(&ledger),
            Arc::clone(&completions),
            Arc::clone(&catalog),
            Arc::clone(&audits),
            advisor,
            settings,
        );
        Harness {
            ledger,
            completions,
            catalog,
            audits,
            pipeline,
        }
    }

    fn offer(id: OfferId, user_reward: Decimal, points: i64) -> Offer {
        Offer {
            id,
            payout: Decimal::new(10000, 4),
            user_reward,
            reward_points: points,
            is_active: true,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn params(pairs: Vec<(&str, &str)>) -> PostbackParams {
        let mut pairs = pairs;
        pairs.push(("token", TOKEN));
        PostbackParams::from_pairs(pairs)
    }

    #[test]
    fn test_bad_token_rejected_before_any_ledger_access() {
        let h = harness();
        h.ledger.create_user(1, now());

        let p = PostbackParams::from_pairs([
            ("token", "wrong"),
            ("sub_id", "1"),
            ("payout", "1.00"),
        ]);
        let err = h.pipeline.process(&p, now()).unwrap_err();

        assert_eq!(err, LedgerError::Unauthorized);
        assert_eq!(h.ledger.get_user(1).unwrap().available, Decimal::ZERO);

        let audit = &h.audits.all()[0];
        assert_eq!(audit.status, AuditStatus::Failed);
        assert_eq!(audit.error.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_missing_token_rejected() {
        let h = harness();
        let p = PostbackParams::from_pairs([("sub_id", "1"), ("payout", "1.00")]);
        assert_eq!(
            h.pipeline.process(&p, now()).unwrap_err(),
            LedgerError::Unauthorized
        );
    }

    #[test]
    fn test_invalid_params_audited_as_failed() {
        let h = harness();
        let p = params(vec![("payout", "1.00")]); // no subject

        let err = h.pipeline.process(&p, now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));

        let audit = &h.audits.all()[0];
        assert_eq!(audit.status, AuditStatus::Failed);
        assert!(audit.error.as_deref().unwrap().contains("subject"));
    }

    #[test]
    fn test_completion_credited_with_offer_terms() {
        let h = harness();
        h.ledger.create_user(1, now());
        h.catalog.publish(offer(10, Decimal::new(4000, 4), 40));
        let record = h.completions.start(1, 10, now()).unwrap();
        let subject = record.id.to_string();

        let p = params(vec![
            ("sub_id", subject.as_str()),
            ("payout", "1.00"),
            ("network", "adgate"),
        ]);
        let receipt = h.pipeline.process(&p, now()).unwrap();

        match receipt {
            PostbackReceipt::Credited {
                user,
                amount,
                points,
                completion,
                ..
            } => {
                assert_eq!(user, 1);
                assert_eq!(amount, Decimal::new(4000, 4));
                assert_eq!(points, 40);
                assert_eq!(completion, Some(record.id));
            }
            other => panic!("expected credit, got {:?}", other),
        }

        let user = h.ledger.get_user(1).unwrap();
        assert_eq!(user.available, Decimal::new(4000, 4));
        assert_eq!(user.points, 40);
        assert_eq!(
            h.completions.get(record.id).unwrap().status,
            CompletionStatus::Approved
        );
        assert_eq!(h.audits.all()[0].status, AuditStatus::Success);
    }

    #[test]
    fn test_completion_without_offer_terms_uses_payout_share() {
        let h = harness();
        h.ledger.create_user(1, now());
        // Offer exists but has no configured user reward
        h.catalog.publish(offer(10, Decimal::ZERO, 0));
        let record = h.completions.start(1, 10, now()).unwrap();
        let subject = record.id.to_string();

        let p = params(vec![("sub_id", subject.as_str()), ("payout", "1.00")]);
        h.pipeline.process(&p, now()).unwrap();

        // 1.00 at the default 0.40 share
        assert_eq!(
            h.ledger.get_user(1).unwrap().available,
            Decimal::new(4000, 4)
        );
    }

    #[test]
    fn test_second_delivery_is_duplicate_not_double_credit() {
        let h = harness();
        h.ledger.create_user(1, now());
        h.catalog.publish(offer(10, Decimal::new(4000, 4), 40));
        let record = h.completions.start(1, 10, now()).unwrap();
        let subject = record.id.to_string();

        let p = params(vec![("sub_id", subject.as_str()), ("payout", "1.00")]);
        h.pipeline.process(&p, now()).unwrap();
        let second = h.pipeline.process(&p, now()).unwrap();

        assert!(matches!(second, PostbackReceipt::Duplicate { .. }));
        assert_eq!(
            h.ledger.get_user(1).unwrap().available,
            Decimal::new(4000, 4)
        );

        // One Success and one Failed audit record
        let audits = h.audits.all();
        assert_eq!(audits.len(), 2);
        assert_eq!(
            audits
                .iter()
                .filter(|a| a.status == AuditStatus::Success)
                .count(),
            1
        );
        assert_eq!(
            audits
                .iter()
                .filter(|a| a.status == AuditStatus::Failed)
                .count(),
            1
        );
    }

    #[test]
    fn test_rejection_status_closes_completion_without_credit() {
        let h = harness();
        h.ledger.create_user(1, now());
        h.catalog.publish(offer(10, Decimal::new(4000, 4), 40));
        let record = h.completions.start(1, 10, now()).unwrap();
        let subject = record.id.to_string();

        let p = params(vec![
            ("sub_id", subject.as_str()),
            ("payout", "1.00"),
            ("status", "rejected"),
        ]);
        let receipt = h.pipeline.process(&p, now()).unwrap();

        assert!(matches!(receipt, PostbackReceipt::Rejected { .. }));
        assert_eq!(h.ledger.get_user(1).unwrap().available, Decimal::ZERO);
        assert_eq!(
            h.completions.get(record.id).unwrap().status,
            CompletionStatus::Rejected
        );

        // A later approval delivery for the same completion conflicts
        let approve = params(vec![("sub_id", subject.as_str()), ("payout", "1.00")]);
        let err = h.pipeline.process(&approve, now()).unwrap_err();
        assert!(matches!(err, LedgerError::CompletionStateConflict { .. }));
    }

    #[test]
    fn test_fallback_credits_share_of_payout() {
        let h = harness();
        h.ledger.create_user(7, now());

        let p = params(vec![
            ("user_id", "7"),
            ("payout", "2.50"),
            ("network", "cpalead"),
        ]);
        let receipt = h.pipeline.process(&p, now()).unwrap();

        match receipt {
            PostbackReceipt::Credited {
                user,
                amount,
                points,
                completion,
                ..
            } => {
                assert_eq!(user, 7);
                assert_eq!(amount, Decimal::new(10000, 4)); // 2.50 * 0.40
                assert_eq!(points, 0);
                assert_eq!(completion, None);
            }
            other => panic!("expected credit, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_repeat_within_hour_is_duplicate() {
        let h = harness();
        h.ledger.create_user(7, now());
        let at = now();

        let p = params(vec![("user_id", "7"), ("payout", "1.00")]);
        h.pipeline.process(&p, at).unwrap();
        let second = h.pipeline.process(&p, at).unwrap();

        assert!(matches!(second, PostbackReceipt::Duplicate { .. }));
        assert_eq!(
            h.ledger.get_user(7).unwrap().available,
            Decimal::new(4000, 4)
        );
    }

    #[test]
    fn test_fallback_unknown_user_fails() {
        let h = harness();
        let p = params(vec![("user_id", "99"), ("payout", "1.00")]);
        let err = h.pipeline.process(&p, now()).unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound { .. }));
        assert_eq!(h.audits.all()[0].status, AuditStatus::Failed);
    }

    #[test]
    fn test_banned_user_never_credited_and_claim_reopened() {
        let h = harness();
        h.ledger.create_user(1, now());
        h.catalog.publish(offer(10, Decimal::new(4000, 4), 40));
        let record = h.completions.start(1, 10, now()).unwrap();
        h.ledger
            .update_user(1, |u| {
                u.status = UserStatus::Banned;
                Ok(())
            })
            .unwrap();

        let subject = record.id.to_string();
        let p = params(vec![("sub_id", subject.as_str()), ("payout", "1.00")]);
        let err = h.pipeline.process(&p, now()).unwrap_err();

        assert!(matches!(err, LedgerError::AccountBlocked { .. }));
        // The failed credit reopened the claim
        assert_eq!(
            h.completions.get(record.id).unwrap().status,
            CompletionStatus::Started
        );
    }

    #[test]
    fn test_start_offer_happy_path() {
        let h = harness();
        h.ledger.create_user(1, now() - chrono::Duration::days(90));
        h.catalog.publish(offer(10, Decimal::new(4000, 4), 40));

        let record = h.pipeline.start_offer(1, 10, now()).unwrap();
        assert_eq!(record.status, CompletionStatus::Started);
    }

    #[test]
    fn test_start_offer_gates() {
        let h = harness();
        let aged = now() - chrono::Duration::days(90);
        h.catalog.publish(offer(10, Decimal::new(4000, 4), 40));

        // Unknown user
        assert!(matches!(
            h.pipeline.start_offer(1, 10, now()).unwrap_err(),
            LedgerError::UserNotFound { .. }
        ));

        // Suspended user
        h.ledger.create_user(1, aged);
        h.ledger
            .update_user(1, |u| {
                u.status = UserStatus::Suspended;
                Ok(())
            })
            .unwrap();
        assert!(matches!(
            h.pipeline.start_offer(1, 10, now()).unwrap_err(),
            LedgerError::AccountBlocked { .. }
        ));

        // Inactive offer
        h.ledger.create_user(2, aged);
        h.catalog.set_active(10, false).unwrap();
        assert!(matches!(
            h.pipeline.start_offer(2, 10, now()).unwrap_err(),
            LedgerError::OfferInactive { .. }
        ));

        // Missing offer
        assert!(matches!(
            h.pipeline.start_offer(2, 11, now()).unwrap_err(),
            LedgerError::OfferNotFound { .. }
        ));

        // Second attempt at the same pair
        h.catalog.set_active(10, true).unwrap();
        h.pipeline.start_offer(2, 10, now()).unwrap();
        assert!(matches!(
            h.pipeline.start_offer(2, 10, now()).unwrap_err(),
            LedgerError::OfferAlreadyStarted { .. }
        ));
    }
}
