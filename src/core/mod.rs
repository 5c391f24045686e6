//! Core engine logic
//!
//! Contains the stores and the processing pipelines built on them:
//! - `ledger`: balance state and the append-only entry log
//! - `completions`: completion tracking and the idempotency guard
//! - `catalog`: published offers
//! - `audit`: postback audit records
//! - `fraud`: the risk scoring advisor
//! - `pipeline`: end-to-end postback reconciliation
//! - `withdrawal`: the withdrawal request state machine

pub mod audit;
pub mod catalog;
pub mod completions;
pub mod fraud;
pub mod ledger;
pub mod pipeline;
pub mod withdrawal;

pub use audit::AuditLog;
pub use catalog::OfferCatalog;
pub use completions::CompletionStore;
pub use fraud::FraudAdvisor;
pub use ledger::LedgerBook;
pub use pipeline::{PostbackPipeline, PostbackReceipt};
pub use withdrawal::WithdrawalDesk;
