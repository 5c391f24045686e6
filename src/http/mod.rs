//! HTTP surface
//!
//! Thin axum layer over the engine: handlers parse the request, call one
//! engine operation with the current time, and map the result. All business
//! rules live in `core`; nothing here touches balances directly.
//!
//! The postback endpoints answer in the plain-text dialect advertiser
//! networks expect ("OK" on success, including duplicates), while the
//! admin and user endpoints speak JSON.

pub mod handlers;

use crate::config::SettingsProvider;
use crate::core::{
    AuditLog, CompletionStore, FraudAdvisor, LedgerBook, OfferCatalog, PostbackPipeline,
    WithdrawalDesk,
};
use crate::types::LedgerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PostbackPipeline>,
    pub desk: Arc<WithdrawalDesk>,
    pub ledger: Arc<LedgerBook>,
    pub completions: Arc<CompletionStore>,
    pub catalog: Arc<OfferCatalog>,
    pub audits: Arc<AuditLog>,
    pub advisor: Arc<FraudAdvisor>,
}

impl AppState {
    /// Wire a full engine and return the shared state
    pub fn build(settings: Arc<dyn SettingsProvider>) -> Self {
        let ledger = Arc::new(LedgerBook::new());
        let completions = Arc::new(CompletionStore::new());
        let catalog = Arc::new(OfferCatalog::new());
        let audits = Arc::new(AuditLog::new());
        let advisor = Arc::new(FraudAdvisor::new(
            Arc::clone(&ledger),
            Arc::clone(&completions),
        ));
        let pipeline = Arc::new(PostbackPipeline::new(
            Arc::clone(&ledger),
            Arc::clone(&completions),
            Arc::clone(&catalog),
            Arc::clone(&audits),
            Arc::clone(&advisor),
            Arc::clone(&settings),
        ));
        let desk = Arc::new(WithdrawalDesk::new(Arc::clone(&ledger), settings));

        AppState {
            pipeline,
            desk,
            ledger,
            completions,
            catalog,
            audits,
            advisor,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/postback",
            get(handlers::postback_query).post(handlers::postback_form),
        )
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/ledger", get(handlers::get_user_ledger))
        .route("/users/:id/credit", post(handlers::credit_user))
        .route("/users/:id/signals", post(handlers::record_signal))
        .route("/offers", post(handlers::publish_offer))
        .route("/offers/:id/start", post(handlers::start_offer))
        .route("/withdrawals", post(handlers::request_withdrawal))
        .route("/withdrawals/:id", get(handlers::get_withdrawal))
        .route(
            "/withdrawals/:id/decision",
            post(handlers::decide_withdrawal),
        )
        .with_state(state)
}

/// HTTP-facing wrapper mapping engine errors to status codes
pub struct ApiError(pub LedgerError);

impl ApiError {
    /// Status code for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::Unauthorized => StatusCode::UNAUTHORIZED,
            LedgerError::Validation { .. }
            | LedgerError::BelowMinimum { .. }
            | LedgerError::InsufficientAvailable { .. }
            | LedgerError::InsufficientPending { .. } => StatusCode::BAD_REQUEST,
            LedgerError::UserNotFound { .. }
            | LedgerError::OfferNotFound { .. }
            | LedgerError::CompletionNotFound { .. }
            | LedgerError::WithdrawalNotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::AccountBlocked { .. } | LedgerError::FraudBlocked { .. } => {
                StatusCode::FORBIDDEN
            }
            LedgerError::AlreadyCredited { .. }
            | LedgerError::DuplicateDelivery { .. }
            | LedgerError::AlreadyAdjudicated { .. }
            | LedgerError::CompletionStateConflict { .. }
            | LedgerError::OfferAlreadyStarted { .. }
            | LedgerError::OfferInactive { .. } => StatusCode::CONFLICT,
            LedgerError::ArithmeticOverflow { .. } | LedgerError::ArithmeticUnderflow { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(error: LedgerError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
