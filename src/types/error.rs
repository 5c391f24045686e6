//! Error types for the rewards ledger engine
//!
//! This module defines all error types that can occur during postback
//! reconciliation, withdrawal adjudication, and balance operations.
//!
//! # Error Categories
//!
//! - **Authorization**: bad shared-secret token; never retried by callers
//! - **Validation**: malformed postback or request input; not retried
//! - **Not found**: unresolvable subjects, users, offers, or withdrawals
//! - **Duplicates**: already-processed completions or withdrawals; treated
//!   as successful no-ops toward webhook callers to avoid retry storms
//! - **Balance**: insufficient funds, below-minimum requests
//! - **Arithmetic**: overflow/underflow; surfaced as retryable server errors

use super::completion::{CompletionId, CompletionStatus};
use super::offer::OfferId;
use super::user::{UserId, UserStatus};
use super::withdrawal::WithdrawalId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the rewards ledger engine
///
/// Each variant carries enough context to produce a human-readable audit
/// reason and a precise log line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Shared-secret token missing or mismatched
    ///
    /// Never retried by design; the delivery is rejected before any ledger
    /// access.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed or incomplete input
    #[error("Invalid request: {message}")]
    Validation {
        /// Description of what failed validation
        message: String,
    },

    /// The subject could not be resolved to any user
    #[error("User {user} not found")]
    UserNotFound {
        /// The unresolvable user ID
        user: UserId,
    },

    /// Referenced offer does not exist in the catalog
    #[error("Offer {offer} not found")]
    OfferNotFound {
        /// The missing offer ID
        offer: OfferId,
    },

    /// Referenced completion record does not exist
    #[error("Completion {completion} not found")]
    CompletionNotFound {
        /// The missing completion ID
        completion: CompletionId,
    },

    /// Referenced withdrawal request does not exist
    #[error("Withdrawal {withdrawal} not found")]
    WithdrawalNotFound {
        /// The missing withdrawal ID
        withdrawal: WithdrawalId,
    },

    /// The completion was already credited by an earlier delivery
    ///
    /// A deliberate no-op: the webhook acknowledges this as success so that
    /// retrying networks are not punished with error responses.
    #[error("Completion {completion} already processed")]
    AlreadyCredited {
        /// The already-approved completion ID
        completion: CompletionId,
    },

    /// A fallback-path credit with the same idempotency key was already
    /// applied
    ///
    /// Like [`LedgerError::AlreadyCredited`], acknowledged as success toward
    /// the webhook caller.
    #[error("Duplicate delivery for idempotency key '{key}'")]
    DuplicateDelivery {
        /// The secondary idempotency key that was already claimed
        key: String,
    },

    /// The withdrawal was already adjudicated
    ///
    /// Pending is the only state that admits a decision.
    #[error("Withdrawal {withdrawal} already {status}")]
    AlreadyAdjudicated {
        /// The withdrawal ID
        withdrawal: WithdrawalId,
        /// Terminal state the request is already in
        status: String,
    },

    /// The completion is in a state that does not admit the operation
    #[error("Completion {completion} is {status}, cannot {operation}")]
    CompletionStateConflict {
        /// The completion ID
        completion: CompletionId,
        /// Current state of the record
        status: String,
        /// Operation that was attempted
        operation: String,
    },

    /// Available balance is too low for the requested hold
    #[error(
        "Insufficient available balance for user {user}: available {available}, requested {requested}"
    )]
    InsufficientAvailable {
        /// The user ID
        user: UserId,
        /// Available balance
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Pending balance is too low for the requested settlement or release
    #[error(
        "Insufficient pending balance for user {user}: pending {pending}, requested {requested}"
    )]
    InsufficientPending {
        /// The user ID
        user: UserId,
        /// Pending balance
        pending: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Withdrawal amount is below the configured minimum
    #[error("Withdrawal amount {amount} is below the minimum {minimum}")]
    BelowMinimum {
        /// Requested amount
        amount: Decimal,
        /// Configured minimum
        minimum: Decimal,
    },

    /// The user's account standing forbids the operation
    #[error("User {user} is {status}")]
    AccountBlocked {
        /// The user ID
        user: UserId,
        /// Account standing that caused the block
        status: String,
    },

    /// The fraud score gate blocked the operation
    #[error("User {user} blocked by fraud score {score}")]
    FraudBlocked {
        /// The user ID
        user: UserId,
        /// Score that exceeded the gate threshold
        score: u8,
    },

    /// The offer cannot currently be started
    #[error("Offer {offer} is not active")]
    OfferInactive {
        /// The offer ID
        offer: OfferId,
    },

    /// The user already has a completion record for this offer
    ///
    /// A user may attempt a given offer at most once.
    #[error("User {user} already started offer {offer}")]
    OfferAlreadyStarted {
        /// The user ID
        user: UserId,
        /// The offer ID
        offer: OfferId,
    },

    /// Arithmetic overflow would occur; the operation is rejected
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// The user ID
        user: UserId,
    },

    /// Arithmetic underflow would occur; the operation is rejected
    #[error("Arithmetic underflow in {operation} for user {user}")]
    ArithmeticUnderflow {
        /// Operation that would underflow
        operation: String,
        /// The user ID
        user: UserId,
    },
}

impl LedgerError {
    /// Whether this error represents an already-processed event
    ///
    /// Duplicates are acknowledged as success toward webhook callers so
    /// retrying networks do not storm, but they are distinctly logged and
    /// audited.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            LedgerError::AlreadyCredited { .. } | LedgerError::DuplicateDelivery { .. }
        )
    }

    /// Whether the caller may safely retry the triggering request
    ///
    /// Retry is safe because duplicate detection is atomic: a retried
    /// delivery that races a committed credit resolves as a duplicate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::ArithmeticOverflow { .. } | LedgerError::ArithmeticUnderflow { .. }
        )
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    /// Create a UserNotFound error
    pub fn user_not_found(user: UserId) -> Self {
        LedgerError::UserNotFound { user }
    }

    /// Create an AlreadyCredited error
    pub fn already_credited(completion: CompletionId) -> Self {
        LedgerError::AlreadyCredited { completion }
    }

    /// Create a DuplicateDelivery error
    pub fn duplicate_delivery(key: impl Into<String>) -> Self {
        LedgerError::DuplicateDelivery { key: key.into() }
    }

    /// Create an AlreadyAdjudicated error
    pub fn already_adjudicated(withdrawal: WithdrawalId, status: &str) -> Self {
        LedgerError::AlreadyAdjudicated {
            withdrawal,
            status: status.to_string(),
        }
    }

    /// Create a CompletionStateConflict error
    pub fn completion_state_conflict(
        completion: CompletionId,
        status: CompletionStatus,
        operation: &str,
    ) -> Self {
        LedgerError::CompletionStateConflict {
            completion,
            status: status.as_str().to_string(),
            operation: operation.to_string(),
        }
    }

    /// Create an InsufficientAvailable error
    pub fn insufficient_available(user: UserId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientAvailable {
            user,
            available,
            requested,
        }
    }

    /// Create an InsufficientPending error
    pub fn insufficient_pending(user: UserId, pending: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientPending {
            user,
            pending,
            requested,
        }
    }

    /// Create an AccountBlocked error
    pub fn account_blocked(user: UserId, status: UserStatus) -> Self {
        LedgerError::AccountBlocked {
            user,
            status: status.as_str().to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create an ArithmeticUnderflow error
    pub fn arithmetic_underflow(operation: &str, user: UserId) -> Self {
        LedgerError::ArithmeticUnderflow {
            operation: operation.to_string(),
            user,
        }
    }
}
