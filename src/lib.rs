//! Reward ledger and postback reconciliation engine
//!
//! Tracks user reward balances as an append-only ledger, credits offer
//! completions reported by advertiser network postbacks exactly once, and
//! adjudicates withdrawals through a hold-then-decide state machine. A
//! fraud advisor scores accounts from ledger and completion signals and
//! gates offer starts.
//!
//! # Architecture
//!
//! - `types`: plain data types shared by every layer
//! - `config`: injected settings supporting live updates
//! - `core`: the stores and pipelines holding all business rules
//! - `http`: thin axum surface over `core`
//! - `cli`: server argument parsing
//!
//! # Example
//!
//! ```
//! use rewards_ledger_engine::config::{LiveSettings, Settings};
//! use rewards_ledger_engine::http::AppState;
//! use rewards_ledger_engine::types::PostbackParams;
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! let settings = Arc::new(LiveSettings::new(Settings {
//!     postback_token: "secret".to_string(),
//!     ..Settings::default()
//! }));
//! let state = AppState::build(settings);
//!
//! state.ledger.create_user(7, Utc::now());
//! let params = PostbackParams::from_pairs([
//!     ("token", "secret"),
//!     ("user_id", "7"),
//!     ("payout", "1.00"),
//! ]);
//! let receipt = state.pipeline.process(&params, Utc::now()).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod http;
pub mod types;

pub use config::{LiveSettings, Settings, SettingsProvider};
pub use core::{
    AuditLog, CompletionStore, FraudAdvisor, LedgerBook, OfferCatalog, PostbackPipeline,
    PostbackReceipt, WithdrawalDesk,
};
pub use types::LedgerError;
