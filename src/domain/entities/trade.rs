//! Trade actions and the validated trade request boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::TradingError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// Direction of a simulated execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    /// Parse a client-supplied action, case-insensitively, normalizing to
    /// the lowercase storage form.
    pub fn parse(value: &str) -> Result<Self, TradingError> {
        match value.to_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            _ => Err(TradingError::validation("Action must be buy or sell")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated trade submission.
///
/// All field presence and type checks happen here, once, at the boundary;
/// downstream code can assume the symbol is normalized and the numbers are
/// strictly positive.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Quantity,
    pub price: Price,
}

impl TradeRequest {
    pub fn new(
        symbol: Option<String>,
        action: Option<String>,
        quantity: Option<f64>,
        price: Option<f64>,
    ) -> Result<Self, TradingError> {
        let symbol = symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TradingError::validation("Symbol, action, quantity and price are required"))?;
        let action = action
            .ok_or_else(|| TradingError::validation("Symbol, action, quantity and price are required"))?;
        let quantity = quantity
            .ok_or_else(|| TradingError::validation("Symbol, action, quantity and price are required"))?;
        let price = price
            .ok_or_else(|| TradingError::validation("Symbol, action, quantity and price are required"))?;

        Ok(TradeRequest {
            symbol,
            action: TradeAction::parse(&action)?,
            quantity: Quantity::new(quantity)?,
            price: Price::new(price)?,
        })
    }

    /// Notional value of the trade, `quantity * price`.
    pub fn notional(&self) -> f64 {
        self.quantity.value() * self.price.value()
    }
}
