//! Challenge plan catalog types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::TradingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Starter,
    Pro,
    Elite,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Starter => "starter",
            PlanType::Pro => "pro",
            PlanType::Elite => "elite",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(PlanType::Starter),
            "pro" => Ok(PlanType::Pro),
            "elite" => Ok(PlanType::Elite),
            _ => Err(TradingError::validation("Invalid plan type")),
        }
    }
}

/// One purchasable challenge plan.
///
/// `balance` seeds `initial_balance`, `current_balance` and
/// `daily_start_balance` of the created challenge; the risk thresholds are
/// copied onto the challenge at creation time and are not live-linked to
/// later config changes.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub plan_type: PlanType,
    pub price: f64,
    pub balance: f64,
    pub currency: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_parse_is_case_insensitive() {
        assert_eq!("Starter".parse::<PlanType>().unwrap(), PlanType::Starter);
        assert_eq!("PRO".parse::<PlanType>().unwrap(), PlanType::Pro);
        assert_eq!("elite".parse::<PlanType>().unwrap(), PlanType::Elite);
    }

    #[test]
    fn test_unknown_plan_is_a_validation_error() {
        let err = "platinum".parse::<PlanType>().unwrap_err();
        assert!(matches!(err, TradingError::Validation { .. }));
    }
}
