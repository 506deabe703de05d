//! Market data provider client.
//!
//! Thin pass-through over the provider's public chart API: live quotes and
//! historical candles for a fixed set of supported symbols. Consumed only
//! by the read-only reporting endpoints, never by the rule engine.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Symbols the provider endpoints accept.
pub const SUPPORTED_SYMBOLS: &[&str] = &[
    "AAPL", "TSLA", "GOOGL", "AMZN", "MSFT", "BTC-USD", "ETH-USD",
];

#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    #[error("Unsupported symbol: {symbol}. Supported symbols: {supported}")]
    UnsupportedSymbol { symbol: String, supported: String },

    #[error("No market data available for {symbol}")]
    NoData { symbol: String },

    #[error("Market data provider error: {reason}")]
    Upstream { reason: String },
}

impl MarketDataError {
    fn unsupported(symbol: &str) -> Self {
        MarketDataError::UnsupportedSymbol {
            symbol: symbol.to_string(),
            supported: SUPPORTED_SYMBOLS.join(", "),
        }
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(e: reqwest::Error) -> Self {
        MarketDataError::Upstream {
            reason: e.to_string(),
        }
    }
}

/// Live quote payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQuote {
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
}

/// One historical candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandlePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

// Provider wire format (chart API).

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartNode,
}

#[derive(Debug, Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    #[allow(dead_code)]
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize, Default)]
struct QuoteBlock {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<i64>>>,
}

/// Market data client.
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    api_base: String,
}

impl MarketDataClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
        }
    }

    fn ensure_supported(symbol: &str) -> Result<(), MarketDataError> {
        if SUPPORTED_SYMBOLS.contains(&symbol) {
            Ok(())
        } else {
            Err(MarketDataError::unsupported(symbol))
        }
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> Result<ChartResult, MarketDataError> {
        let url = format!("{}/v8/finance/chart/{}", self.api_base, symbol);
        debug!("Fetching chart {} interval={} range={}", symbol, interval, range);

        let envelope: ChartEnvelope = self
            .client
            .get(&url)
            .query(&[("interval", interval), ("range", range)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = envelope.chart.error {
            return Err(MarketDataError::Upstream {
                reason: err
                    .description
                    .unwrap_or_else(|| "provider returned an error".to_string()),
            });
        }

        envelope
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            })
            .ok_or_else(|| MarketDataError::NoData {
                symbol: symbol.to_string(),
            })
    }

    /// Live price and day change for a supported symbol.
    pub async fn live_quote(&self, symbol: &str) -> Result<LiveQuote, MarketDataError> {
        Self::ensure_supported(symbol)?;

        let result = self.fetch_chart(symbol, "1d", "5d").await?;
        let price = result.meta.regular_market_price;
        let previous_close = result.meta.chart_previous_close;

        let (Some(price), Some(previous_close)) = (price, previous_close) else {
            return Err(MarketDataError::NoData {
                symbol: symbol.to_string(),
            });
        };
        if previous_close == 0.0 {
            return Err(MarketDataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let change_percent = (price - previous_close) / previous_close * 100.0;

        Ok(LiveQuote {
            symbol: symbol.to_string(),
            price: round2(price),
            change_percent: round2(change_percent),
            timestamp: Utc::now(),
            currency: result.meta.currency.unwrap_or_else(|| "USD".to_string()),
        })
    }

    /// Historical candles for a supported symbol. Rows with missing values
    /// are skipped, matching how the provider reports gaps.
    pub async fn chart(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> Result<Vec<CandlePoint>, MarketDataError> {
        Self::ensure_supported(symbol)?;

        let result = self.fetch_chart(symbol, interval, range).await?;
        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let opens = quote.open.unwrap_or_default();
        let highs = quote.high.unwrap_or_default();
        let lows = quote.low.unwrap_or_default();
        let closes = quote.close.unwrap_or_default();
        let volumes = quote.volume.unwrap_or_default();

        let mut points = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) = (
                opens.get(i).copied().flatten(),
                highs.get(i).copied().flatten(),
                lows.get(i).copied().flatten(),
                closes.get(i).copied().flatten(),
            ) else {
                continue;
            };
            let Some(timestamp) = Utc.timestamp_opt(*ts, 0).single() else {
                continue;
            };
            points.push(CandlePoint {
                timestamp,
                open,
                high,
                low,
                close,
                volume: volumes.get(i).copied().flatten().unwrap_or(0),
            });
        }

        if points.is_empty() {
            return Err(MarketDataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        Ok(points)
    }

    /// Daily closes over roughly three months, for signal generation.
    pub async fn daily_closes(&self, symbol: &str) -> Result<Vec<f64>, MarketDataError> {
        let points = self.chart(symbol, "1d", "3mo").await?;
        Ok(points.into_iter().map(|p| p.close).collect())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
