//! Request handlers
//!
//! Each handler is a thin adapter: parse, call one engine operation with
//! the current time, map the result. Postback handlers answer plain text;
//! everything else answers JSON.

use super::{ApiError, AppState};
use crate::types::{
    LedgerEntry, Offer, PostbackParams, User, UserId, WithdrawalDecision, WithdrawalRequest,
};
use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Liveness probe
pub async fn health() -> &'static str {
    "OK"
}

/// Postback delivered as query parameters (the common network style)
pub async fn postback_query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    run_postback(state, params)
}

/// Postback delivered as a form body
pub async fn postback_form(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    run_postback(state, params)
}

// Networks retry on non-2xx, so duplicates must answer "OK"; only real
// failures get an error status.
fn run_postback(state: AppState, params: HashMap<String, String>) -> (StatusCode, &'static str) {
    let params = PostbackParams::new(params);
    match state.pipeline.process(&params, Utc::now()) {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(error) => (ApiError(error).status(), "ERROR"),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub id: UserId,
}

/// Register a user account
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> Json<User> {
    Json(state.ledger.create_user(body.id, Utc::now()))
}

#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub fraud_score: u8,
}

/// User snapshot with the current fraud score attached
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserView>, ApiError> {
    let now = Utc::now();
    let user = state
        .ledger
        .get_user(id)
        .ok_or_else(|| ApiError(crate::types::LedgerError::user_not_found(id)))?;
    let fraud_score = state.advisor.score(id, now);
    Ok(Json(UserView { user, fraud_score }))
}

/// Ledger entries for one user, oldest first
pub async fn get_user_ledger(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    if state.ledger.get_user(id).is_none() {
        return Err(ApiError(crate::types::LedgerError::user_not_found(id)));
    }
    Ok(Json(state.ledger.entries_for(id)))
}

/// Publish (or replace) an offer
pub async fn publish_offer(
    State(state): State<AppState>,
    Json(offer): Json<Offer>,
) -> StatusCode {
    state.catalog.publish(offer);
    StatusCode::CREATED
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminCreditKind {
    Bonus,
    Adjustment,
}

#[derive(Debug, Deserialize)]
pub struct AdminCreditBody {
    pub kind: AdminCreditKind,
    pub amount: Decimal,
    #[serde(default)]
    pub points: i64,
    pub note: String,
}

/// Admin-granted bonus or balance correction
pub async fn credit_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<AdminCreditBody>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let entry = match body.kind {
        AdminCreditKind::Bonus => state
            .ledger
            .grant_bonus(id, body.amount, body.points, &body.note, now)?,
        AdminCreditKind::Adjustment => {
            state.ledger.adjust_balance(id, body.amount, &body.note, now)?
        }
    };
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "entry": entry }))))
}

#[derive(Debug, Deserialize)]
pub struct SignalBody {
    pub severity: crate::types::Severity,
    pub kind: String,
    #[serde(default)]
    pub details: String,
}

/// Record a fraud signal against a user
pub async fn record_signal(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<SignalBody>,
) -> StatusCode {
    state.advisor.record_signal(crate::types::FraudSignal {
        user: id,
        severity: body.severity,
        kind: body.kind,
        details: body.details,
        recorded_at: Utc::now(),
    });
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
pub struct StartOfferBody {
    pub user: UserId,
}

/// Record that a user starts an offer
pub async fn start_offer(
    State(state): State<AppState>,
    Path(offer): Path<u32>,
    Json(body): Json<StartOfferBody>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.pipeline.start_offer(body.user, offer, Utc::now())?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalBody {
    pub user: UserId,
    pub amount: Decimal,
    pub method: String,
    pub destination: String,
}

/// Open a withdrawal request
pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(body): Json<WithdrawalBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state.desk.request(
        body.user,
        body.amount,
        &body.method,
        &body.destination,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Snapshot one withdrawal request
pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    state
        .desk
        .get(id)
        .map(Json)
        .ok_or(ApiError(crate::types::LedgerError::WithdrawalNotFound {
            withdrawal: id,
        }))
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub decision: WithdrawalDecision,
    pub notes: Option<String>,
}

/// Apply an admin decision to a pending withdrawal
pub async fn decide_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let request = state
        .desk
        .adjudicate(id, body.decision, body.notes, Utc::now())?;
    Ok(Json(request))
}
