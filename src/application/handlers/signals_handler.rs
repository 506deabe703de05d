//! Heuristic signal endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::application::AppState;
use crate::domain::services::signals::{self, IndicatorSet, Signal};

use super::{market_error, trading_error, ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalResponse {
    #[serde(flatten)]
    pub signal: Signal,
    pub indicators: IndicatorSet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionalIndicators {
    pub change_percent: f64,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionalSignalResponse {
    #[serde(flatten)]
    pub signal: Signal,
    pub indicators: RegionalIndicators,
}

/// Indicator-based signal for a provider symbol, derived from ~3 months of
/// daily closes.
pub async fn symbol_signal(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<SignalResponse>, ApiError> {
    let closes = state
        .market
        .daily_closes(&symbol.to_uppercase())
        .await
        .map_err(market_error)?;

    let (signal, indicators) = signals::generate(&closes).map_err(trading_error)?;

    Ok(Json(SignalResponse { signal, indicators }))
}

/// Momentum signal for a Casablanca Stock Exchange ticker.
pub async fn morocco_signal(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<RegionalSignalResponse>, ApiError> {
    let quote = state.casablanca.quote(&ticker).map_err(market_error)?;
    let signal = signals::momentum(quote.change_percent);

    Ok(Json(RegionalSignalResponse {
        signal,
        indicators: RegionalIndicators {
            change_percent: quote.change_percent,
            currency: quote.currency,
        },
    }))
}
