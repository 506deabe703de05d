//! Administrative overview, gated on the caller's stored role.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::application::AppState;
use crate::auth::AuthUser;
use crate::domain::entities::user::Role;
use crate::persistence::repository::{
    ChallengeRepository, PaymentRepository, TradeRepository, UserRepository,
};
use crate::persistence::DatabaseError;

use super::{error_response, trading_error, ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub users: i64,
    pub active_challenges: i64,
    pub passed_challenges: i64,
    pub failed_challenges: i64,
    pub trades: i64,
    pub payments: i64,
}

/// Aggregate counts across the ledger. Requires an admin or superadmin
/// role, checked against the stored user record rather than token claims.
pub async fn overview(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let caller_record = users
        .find_by_id(&caller.user_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "User not found"))?;

    let role: Role = caller_record.role.parse().map_err(trading_error)?;
    if !role.can_administer() {
        return Err(error_response(StatusCode::FORBIDDEN, "Access denied"));
    }

    let challenges = ChallengeRepository::new(state.pool.clone());
    let trades = TradeRepository::new(state.pool.clone());
    let payments = PaymentRepository::new(state.pool.clone());

    Ok(Json(OverviewResponse {
        users: users.count().await.map_err(db_error)?,
        active_challenges: challenges.count_by_status("active").await.map_err(db_error)?,
        passed_challenges: challenges.count_by_status("passed").await.map_err(db_error)?,
        failed_challenges: challenges.count_by_status("failed").await.map_err(db_error)?,
        trades: trades.count().await.map_err(db_error)?,
        payments: payments.count().await.map_err(db_error)?,
    }))
}

fn db_error(err: DatabaseError) -> ApiError {
    trading_error(err.into())
}
