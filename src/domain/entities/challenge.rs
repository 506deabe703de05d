//! Challenge status state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::TradingError;

/// Lifecycle status of a challenge.
///
/// `Active` is the only state trades are accepted in. `Passed` and `Failed`
/// are terminal: once a challenge leaves `Active` it never transitions
/// again, and `ended_at` is set exactly once at that transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Active,
    Passed,
    Failed,
}

impl ChallengeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChallengeStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Passed => "passed",
            ChallengeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ChallengeStatus::Active),
            "passed" => Ok(ChallengeStatus::Passed),
            "failed" => Ok(ChallengeStatus::Failed),
            other => Err(TradingError::Configuration {
                reason: format!("unknown challenge status: {}", other),
            }),
        }
    }
}
