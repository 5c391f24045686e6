//! Postback audit log
//!
//! Every received postback gets an audit record before any validation or
//! authentication runs, so malformed and unauthorized deliveries remain
//! visible for dispute resolution. The log is observational only; nothing
//! reads it back to derive balances.

use crate::types::{AuditId, AuditStatus, PostbackAuditRecord, PostbackParams, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Append-oriented store of postback audit records
#[derive(Debug, Default)]
pub struct AuditLog {
    records: DashMap<AuditId, PostbackAuditRecord>,
    next_id: AtomicU64,
}

impl AuditLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received delivery, before any processing
    pub fn record(&self, params: &PostbackParams, now: DateTime<Utc>) -> AuditId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = PostbackAuditRecord {
            id,
            network: params.network().map(str::to_string),
            raw_params: params.raw().clone(),
            status: AuditStatus::Pending,
            user: None,
            amount: None,
            error: None,
            received_at: now,
        };
        self.records.insert(id, record);
        id
    }

    /// Mark a delivery as credited
    pub fn mark_success(&self, id: AuditId, user: UserId, amount: Decimal) {
        self.update(id, |record| {
            record.status = AuditStatus::Success;
            record.user = Some(user);
            record.amount = Some(amount);
        });
    }

    /// Mark a delivery as rejected, with a reason
    pub fn mark_failed(&self, id: AuditId, reason: &str) {
        self.update(id, |record| {
            record.status = AuditStatus::Failed;
            record.error = Some(reason.to_string());
        });
    }

    /// Snapshot one audit record
    pub fn get(&self, id: AuditId) -> Option<PostbackAuditRecord> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    /// Snapshot all audit records
    pub fn all(&self) -> Vec<PostbackAuditRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    // Audit updates are best-effort: a missing record is logged, never an
    // error, so audit bookkeeping can never fail a credit.
    fn update<F>(&self, id: AuditId, f: F)
    where
        F: FnOnce(&mut PostbackAuditRecord),
    {
        match self.records.get_mut(&id) {
            Some(mut entry) => f(entry.value_mut()),
            None => warn!(audit_id = id, "audit record missing during update"),
        }
    }
}
