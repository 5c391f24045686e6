//! Completion tracking types
//!
//! A CompletionRecord is the tracking row linking one user to one offer
//! attempt. Its identifier is the idempotency key echoed back by advertiser
//! networks in postbacks, and its status transition to Approved is the
//! at-most-once crediting guard.

use super::offer::OfferId;
use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion record identifier
pub type CompletionId = u64;

/// Lifecycle state of a completion record
///
/// `Started` is the initial state. `Pending` is an optional intermediate
/// state for networks with delayed confirmation. `Approved` and `Rejected`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Started,
    Pending,
    Approved,
    Rejected,
}

impl CompletionStatus {
    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, CompletionStatus::Approved | CompletionStatus::Rejected)
    }

    /// Lowercase label used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Started => "started",
            CompletionStatus::Pending => "pending",
            CompletionStatus::Approved => "approved",
            CompletionStatus::Rejected => "rejected",
        }
    }
}

/// One (user, offer) tracking row
///
/// At most one record exists per (user, offer) pair; a user may attempt a
/// given offer once. Only the postback pipeline moves a record to Approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// The record ID, used as the postback subject identifier
    pub id: CompletionId,

    /// The user who started the offer
    pub user: UserId,

    /// The offer being attempted
    pub offer: OfferId,

    /// Current lifecycle state
    pub status: CompletionStatus,

    /// When the user started the offer
    pub started_at: DateTime<Utc>,

    /// When the record reached a terminal state, if it has
    pub completed_at: Option<DateTime<Utc>>,
}
