//! Postback audit types
//!
//! One audit record exists per received callback attempt, successful or not.
//! The audit log exists purely for observability and dispute resolution; it
//! is never read to derive balances, and losing a record does not affect
//! ledger correctness.

use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Audit record identifier
pub type AuditId = u64;

/// Outcome of one postback delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Recorded, not yet processed
    Pending,

    /// Processing credited a user
    Success,

    /// Processing was rejected; `error` holds the reason
    Failed,
}

/// Write-once-then-updated record of one received postback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostbackAuditRecord {
    /// The audit record ID
    pub id: AuditId,

    /// Advertiser network name as reported, if any
    pub network: Option<String>,

    /// Raw request parameters, kept verbatim for dispute resolution
    pub raw_params: HashMap<String, String>,

    /// Resolved processing outcome
    pub status: AuditStatus,

    /// User the credit resolved to, once known
    pub user: Option<UserId>,

    /// Amount credited, once known
    pub amount: Option<Decimal>,

    /// Human-readable failure reason
    pub error: Option<String>,

    /// When the callback was received
    pub received_at: DateTime<Utc>,
}
