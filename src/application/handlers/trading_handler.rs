//! Challenge and trade endpoints: the HTTP surface of the core.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::application::AppState;
use crate::auth::AuthUser;
use crate::domain::entities::trade::TradeRequest;
use crate::persistence::models::TradeRecord;

use super::{trading_error, ApiError, ChallengePayload, RuleCheckPayload};

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: ChallengePayload,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteTradeBody {
    pub symbol: Option<String>,
    pub action: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteTradeResponse {
    pub trade: TradeRecord,
    pub challenge: ChallengePayload,
    pub rule_check: RuleCheckPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TradeHistoryResponse {
    pub trades: Vec<TradeRecord>,
}

/// The caller's active challenge.
pub async fn active_challenge(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state
        .trading
        .active_challenge(&caller.user_id)
        .await
        .map_err(trading_error)?;

    Ok(Json(ChallengeResponse {
        challenge: ChallengePayload::from(&challenge),
    }))
}

/// Execute one simulated trade against the caller's active challenge.
pub async fn execute_trade(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<ExecuteTradeBody>,
) -> Result<Json<ExecuteTradeResponse>, ApiError> {
    let request = TradeRequest::new(body.symbol, body.action, body.quantity, body.price)
        .map_err(trading_error)?;

    let outcome = state
        .trading
        .execute_trade(&caller.user_id, &request)
        .await
        .map_err(trading_error)?;

    Ok(Json(ExecuteTradeResponse {
        trade: outcome.trade,
        challenge: ChallengePayload::from(&outcome.challenge),
        rule_check: RuleCheckPayload::from(&outcome.decision),
    }))
}

/// The caller's trades, newest first.
pub async fn trade_history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<TradeHistoryResponse>, ApiError> {
    let trades = state
        .trading
        .trade_history(&caller.user_id)
        .await
        .map_err(trading_error)?;

    Ok(Json(TradeHistoryResponse { trades }))
}
