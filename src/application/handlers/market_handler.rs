//! Market data pass-through endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::application::AppState;
use crate::infrastructure::casablanca::{CasablancaClient, RegionalQuote};
use crate::infrastructure::market_data::{CandlePoint, LiveQuote, SUPPORTED_SYMBOLS};

use super::{market_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub interval: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartResponse {
    pub symbol: String,
    pub interval: String,
    pub period: String,
    pub data: Vec<CandlePoint>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<&'static str>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct RegionalSymbolsResponse {
    pub symbols: Vec<&'static str>,
    pub count: usize,
    pub source: &'static str,
}

/// Live quote for a supported symbol.
pub async fn live(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<LiveQuote>, ApiError> {
    let quote = state
        .market
        .live_quote(&symbol.to_uppercase())
        .await
        .map_err(market_error)?;
    Ok(Json(quote))
}

/// Historical candles for a supported symbol.
pub async fn chart(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<ChartResponse>, ApiError> {
    let symbol = symbol.to_uppercase();
    let interval = params.interval.unwrap_or_else(|| "1d".to_string());
    let period = params.period.unwrap_or_else(|| "1mo".to_string());

    let data = state
        .market
        .chart(&symbol, &interval, &period)
        .await
        .map_err(market_error)?;

    let count = data.len();
    Ok(Json(ChartResponse {
        symbol,
        interval,
        period,
        data,
        count,
    }))
}

/// Supported provider symbols.
pub async fn symbols() -> Json<SymbolsResponse> {
    Json(SymbolsResponse {
        symbols: SUPPORTED_SYMBOLS.to_vec(),
        count: SUPPORTED_SYMBOLS.len(),
    })
}

/// Casablanca Stock Exchange quote.
pub async fn morocco_quote(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<RegionalQuote>, ApiError> {
    let quote = state.casablanca.quote(&ticker).map_err(market_error)?;
    Ok(Json(quote))
}

/// Supported Casablanca Stock Exchange tickers.
pub async fn morocco_symbols() -> Json<RegionalSymbolsResponse> {
    let symbols = CasablancaClient::supported_tickers();
    Json(RegionalSymbolsResponse {
        count: symbols.len(),
        symbols,
        source: "Casablanca Stock Exchange",
    })
}
