//! Plan catalog, simulated checkout, and payment history.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::application::AppState;
use crate::auth::AuthUser;
use crate::domain::entities::payment::PaymentMethod;
use crate::domain::entities::plan::PlanType;
use crate::persistence::models::PaymentRecord;
use crate::persistence::repository::PaymentRepository;

use super::{error_response, trading_error, ApiError, ChallengePayload};

#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub price: f64,
    pub balance: f64,
    pub currency: String,
    pub features: Vec<&'static str>,
    pub popular: bool,
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: BTreeMap<String, PlanEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub plan_type: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub payment: PaymentRecord,
    pub challenge: ChallengePayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentHistoryResponse {
    pub payments: Vec<PaymentRecord>,
}

fn plan_features(plan_type: PlanType) -> Vec<&'static str> {
    match plan_type {
        PlanType::Starter => vec![
            "5000 DH balance",
            "AI signal access",
            "Basic dashboard",
            "Email support",
        ],
        PlanType::Pro => vec![
            "10000 DH balance",
            "Advanced AI signal access",
            "Advanced dashboard",
            "Priority support",
            "Detailed performance analytics",
        ],
        PlanType::Elite => vec![
            "25000 DH balance",
            "Full AI signal access",
            "Premium dashboard",
            "24/7 VIP support",
            "Premium performance analytics",
            "Early access to new features",
        ],
    }
}

/// The purchasable plan catalog.
pub async fn plans(State(state): State<AppState>) -> Json<PlansResponse> {
    let plans = state
        .config
        .plans
        .iter()
        .map(|plan| {
            (
                plan.plan_type.to_string(),
                PlanEntry {
                    price: plan.price,
                    balance: plan.balance,
                    currency: plan.currency.to_string(),
                    features: plan_features(plan.plan_type),
                    popular: plan.plan_type == PlanType::Pro,
                },
            )
        })
        .collect();

    Json(PlansResponse { plans })
}

/// Simulated checkout: always-succeeding payment plus a fresh challenge.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let (Some(plan_type), Some(payment_method)) = (body.plan_type, body.payment_method) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Plan type and payment method are required",
        ));
    };

    let plan_type: PlanType = plan_type.parse().map_err(trading_error)?;
    let method: PaymentMethod = payment_method.parse().map_err(trading_error)?;

    let plan = state
        .config
        .plan(plan_type)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Invalid plan type"))?
        .clone();

    let (payment, challenge) = state
        .trading
        .checkout(&caller.user_id, &plan, method)
        .await
        .map_err(trading_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment,
            challenge: ChallengePayload::from(&challenge),
        }),
    ))
}

/// The caller's payments, newest first.
pub async fn payment_history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<PaymentHistoryResponse>, ApiError> {
    let payments = PaymentRepository::new(state.pool.clone())
        .history_for_user(&caller.user_id)
        .await
        .map_err(|e| trading_error(e.into()))?;

    Ok(Json(PaymentHistoryResponse { payments }))
}
