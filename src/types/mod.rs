//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `user`: user accounts and balance state
//! - `offer`: offer catalog entries
//! - `completion`: (user, offer) tracking rows
//! - `ledger`: the append-only entry log
//! - `withdrawal`: withdrawal requests and decisions
//! - `audit`: postback audit records
//! - `fraud`: fraud signal events
//! - `postback`: raw postback parameters and normalization
//! - `error`: error types for the engine

pub mod audit;
pub mod completion;
pub mod error;
pub mod fraud;
pub mod ledger;
pub mod offer;
pub mod postback;
pub mod user;
pub mod withdrawal;

pub use audit::{AuditId, AuditStatus, PostbackAuditRecord};
pub use completion::{CompletionId, CompletionRecord, CompletionStatus};
pub use error::LedgerError;
pub use fraud::{FraudSignal, Severity};
pub use ledger::{EntryId, EntryKind, EntryStatus, LedgerEntry};
pub use offer::{Offer, OfferId};
pub use postback::{Postback, PostbackParams, SUBJECT_ALIASES};
pub use user::{User, UserId, UserStatus};
pub use withdrawal::{WithdrawalDecision, WithdrawalId, WithdrawalRequest, WithdrawalStatus};
