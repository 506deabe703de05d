//! Heuristic trading signals derived from price history.
//!
//! These feed the read-only signal endpoints; nothing here touches
//! challenge state.

use serde::{Deserialize, Serialize};

use crate::domain::errors::TradingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Indicator snapshot echoed alongside a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub current_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal: SignalAction,
    pub confidence: u8,
    pub risk_level: RiskLevel,
    pub reason: String,
}

/// RSI over the last `period` deltas, as a simple average of gains and
/// losses (not Wilder-smoothed). Returns the neutral 50.0 when there are
/// fewer than two prices.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if prices.len() < 2 {
        return 50.0;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let window = if deltas.len() >= period {
        &deltas[deltas.len() - period..]
    } else {
        &deltas[..]
    };

    let len = window.len() as f64;
    let avg_gain: f64 = window.iter().filter(|d| **d > 0.0).sum::<f64>() / len;
    let avg_loss: f64 = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / len;

    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    if avg_gain == 0.0 {
        return 0.0;
    }

    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Mean of the last `period` prices; mean of everything when the history is
/// shorter, 0.0 when empty.
pub fn moving_average(prices: &[f64], period: usize) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let window = if prices.len() >= period {
        &prices[prices.len() - period..]
    } else {
        prices
    };
    window.iter().sum::<f64>() / window.len() as f64
}

/// Derive a BUY/SELL/HOLD signal from a daily close history.
///
/// Requires at least two closes; the rules are checked in order and the
/// first match wins.
pub fn generate(closes: &[f64]) -> Result<(Signal, IndicatorSet), TradingError> {
    if closes.len() < 2 {
        return Err(TradingError::validation(
            "Not enough price history to generate a signal",
        ));
    }

    let current_price = closes[closes.len() - 1];
    let rsi_value = rsi(closes, 14);
    let ma20 = moving_average(closes, 20);
    let ma50 = moving_average(closes, 50);

    let (signal, confidence, risk_level, reason) = if rsi_value < 30.0 && current_price > ma20 {
        (
            SignalAction::Buy,
            (60.0 + (30.0 - rsi_value)).round(),
            RiskLevel::Low,
            format!("RSI oversold ({:.2}) and price above MA20", rsi_value),
        )
    } else if rsi_value > 70.0 && current_price < ma20 {
        (
            SignalAction::Sell,
            (60.0 + (rsi_value - 70.0)).round(),
            RiskLevel::Low,
            format!("RSI overbought ({:.2}) and price below MA20", rsi_value),
        )
    } else if ma20 > ma50 && rsi_value > 50.0 {
        (
            SignalAction::Buy,
            65.0,
            RiskLevel::Medium,
            "Bullish crossover detected".to_string(),
        )
    } else if ma20 < ma50 && rsi_value < 50.0 {
        (
            SignalAction::Sell,
            65.0,
            RiskLevel::Medium,
            "Bearish crossover detected".to_string(),
        )
    } else {
        (
            SignalAction::Hold,
            50.0,
            RiskLevel::Medium,
            "No strong signal detected".to_string(),
        )
    };

    Ok((
        Signal {
            signal,
            confidence: confidence.clamp(0.0, 100.0) as u8,
            risk_level,
            reason,
        },
        IndicatorSet {
            rsi: rsi_value,
            ma20,
            ma50,
            current_price,
        },
    ))
}

/// Momentum signal for a regional-exchange quote, from its daily change
/// percentage alone.
pub fn momentum(change_percent: f64) -> Signal {
    let abs_change = change_percent.abs();
    if change_percent > 1.0 {
        Signal {
            signal: SignalAction::Buy,
            confidence: (60.0 + abs_change * 10.0).min(90.0) as u8,
            risk_level: RiskLevel::Low,
            reason: format!("Positive momentum ({:.2}%)", change_percent),
        }
    } else if change_percent < -1.0 {
        Signal {
            signal: SignalAction::Sell,
            confidence: (60.0 + abs_change * 10.0).min(90.0) as u8,
            risk_level: RiskLevel::Low,
            reason: format!("Negative momentum ({:.2}%)", change_percent),
        }
    } else {
        Signal {
            signal: SignalAction::Hold,
            confidence: 50,
            risk_level: RiskLevel::Medium,
            reason: "No strong signal detected".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_neutral_on_short_history() {
        assert_eq!(rsi(&[], 14), 50.0);
        assert_eq!(rsi(&[100.0], 14), 50.0);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&rising, 14), 100.0);

        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert_eq!(rsi(&falling, 14), 0.0);

        let flat = vec![100.0; 20];
        assert_eq!(rsi(&flat, 14), 50.0);
    }

    #[test]
    fn test_rsi_stays_in_range() {
        let mixed = vec![100.0, 103.0, 101.0, 104.0, 102.0, 105.0, 99.0, 101.0];
        let value = rsi(&mixed, 14);
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_moving_average_windows() {
        assert_eq!(moving_average(&[], 20), 0.0);
        assert_eq!(moving_average(&[10.0, 20.0], 20), 15.0);
        let prices: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        // Last 20 of 1..=30 are 11..=30, mean 20.5.
        assert_eq!(moving_average(&prices, 20), 20.5);
    }

    #[test]
    fn test_generate_requires_history() {
        assert!(generate(&[100.0]).is_err());
    }

    #[test]
    fn test_generate_bullish_crossover() {
        // Steady uptrend: MA20 > MA50 and RSI > 50, but RSI is pinned at
        // 100 so the oversold branch cannot fire; price sits above MA20.
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let (signal, indicators) = generate(&closes).unwrap();
        assert_eq!(signal.signal, SignalAction::Buy);
        assert_eq!(signal.confidence, 65);
        assert_eq!(signal.risk_level, RiskLevel::Medium);
        assert!(indicators.ma20 > indicators.ma50);
    }

    #[test]
    fn test_generate_hold_on_flat_history() {
        let closes = vec![100.0; 60];
        let (signal, indicators) = generate(&closes).unwrap();
        assert_eq!(signal.signal, SignalAction::Hold);
        assert_eq!(signal.confidence, 50);
        assert_eq!(indicators.rsi, 50.0);
    }

    #[test]
    fn test_momentum_thresholds() {
        assert_eq!(momentum(2.5).signal, SignalAction::Buy);
        assert_eq!(momentum(-1.67).signal, SignalAction::Sell);
        assert_eq!(momentum(0.45).signal, SignalAction::Hold);
        assert_eq!(momentum(1.0).signal, SignalAction::Hold);
    }

    #[test]
    fn test_momentum_confidence_is_capped() {
        assert_eq!(momentum(12.0).confidence, 90);
        assert_eq!(momentum(2.0).confidence, 80);
    }
}
