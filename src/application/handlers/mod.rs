//! HTTP handlers.
//!
//! Each route group lives in its own module; request and response DTOs are
//! defined next to the handlers that use them. Shared payload shapes and
//! the error-to-status mapping live here.

pub mod admin_handler;
pub mod auth_handler;
pub mod leaderboard_handler;
pub mod market_handler;
pub mod payment_handler;
pub mod signals_handler;
pub mod trading_handler;

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::challenge::ChallengeStatus;
use crate::domain::errors::TradingError;
use crate::domain::services::challenge_rules::RuleDecision;
use crate::infrastructure::market_data::MarketDataError;
use crate::persistence::models::{ChallengeRecord, UserRecord};

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a domain error onto its HTTP status.
pub(crate) fn trading_error(err: TradingError) -> ApiError {
    let status = match &err {
        TradingError::Validation { .. } | TradingError::InsufficientFunds { .. } => {
            StatusCode::BAD_REQUEST
        }
        TradingError::NoActiveChallenge => StatusCode::NOT_FOUND,
        TradingError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        TradingError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        tracing::error!("{}: {}", err.error_code(), err);
    }
    error_response(status, err.to_string())
}

/// Map a market data error onto its HTTP status.
pub(crate) fn market_error(err: MarketDataError) -> ApiError {
    let status = match &err {
        MarketDataError::UnsupportedSymbol { .. } | MarketDataError::NoData { .. } => {
            StatusCode::BAD_REQUEST
        }
        MarketDataError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    };
    error_response(status, err.to_string())
}

/// User payload, without the credential hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<&UserRecord> for UserPayload {
    fn from(record: &UserRecord) -> Self {
        UserPayload {
            id: record.id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            role: record.role.clone(),
            created_at: record.created_at,
            is_active: record.is_active,
        }
    }
}

/// Challenge payload with the derived profit percentage.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengePayload {
    pub id: String,
    pub user_id: String,
    pub plan_type: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub daily_start_balance: f64,
    pub status: String,
    pub profit_target_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_total_loss_percent: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub profit_percent: f64,
}

impl From<&ChallengeRecord> for ChallengePayload {
    fn from(record: &ChallengeRecord) -> Self {
        ChallengePayload {
            id: record.id.clone(),
            user_id: record.user_id.clone(),
            plan_type: record.plan_type.clone(),
            initial_balance: record.initial_balance,
            current_balance: record.current_balance,
            daily_start_balance: record.daily_start_balance,
            status: record.status.clone(),
            profit_target_percent: record.profit_target_percent,
            max_daily_loss_percent: record.max_daily_loss_percent,
            max_total_loss_percent: record.max_total_loss_percent,
            started_at: record.started_at,
            ended_at: record.ended_at,
            profit_percent: record.profit_percent(),
        }
    }
}

/// Rule-check payload returned with every executed trade.
#[derive(Debug, Serialize, Deserialize)]
pub struct RuleCheckPayload {
    pub status: ChallengeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl From<&RuleDecision> for RuleCheckPayload {
    fn from(decision: &RuleDecision) -> Self {
        RuleCheckPayload {
            status: decision.status,
            reason: decision.reason.map(|r| r.to_string()),
            evaluated_at: decision.evaluated_at,
        }
    }
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        let (status, _) = trading_error(TradingError::NoActiveChallenge);
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = trading_error(TradingError::validation("bad"));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = trading_error(TradingError::InsufficientFunds {
            required: 1.0,
            available: 0.0,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = trading_error(TradingError::Storage {
            reason: "down".to_string(),
        });
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = trading_error(TradingError::Configuration {
            reason: "bad".to_string(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_user_payload_hides_credentials() {
        let record = UserRecord {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: "user".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        let payload = UserPayload::from(&record);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("alice"));
    }
}
