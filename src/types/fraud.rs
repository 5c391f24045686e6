//! Fraud signal types
//!
//! Signals are an append-only event log consumed by the fraud advisor when
//! scoring an account. Recording a Critical signal has the side effect of
//! suspending the user, independent of the numeric score.

use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a recorded fraud signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One recorded fraud event for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudSignal {
    /// The user the signal concerns
    pub user: UserId,

    /// How serious the event is
    pub severity: Severity,

    /// Short machine-readable event type, e.g. "vpn_detected"
    pub kind: String,

    /// Contextual details for human review
    pub details: String,

    /// When the signal was recorded
    pub recorded_at: DateTime<Utc>,
}
