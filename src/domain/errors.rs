//! Domain error taxonomy for challenge trading operations.

use thiserror::Error;

/// Errors surfaced by challenge and trade operations.
///
/// Every rejected operation leaves the challenge and its balance exactly as
/// they were before the call; variants that reach the client map to distinct
/// HTTP statuses in the handler layer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TradingError {
    /// Missing or malformed input, rejected before any domain logic runs.
    #[error("{reason}")]
    Validation { reason: String },

    /// A buy order exceeds the challenge's current balance.
    #[error("Insufficient balance: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    /// The caller has no challenge in `active` status.
    #[error("No active challenge found")]
    NoActiveChallenge,

    /// A challenge carries state the rule engine cannot evaluate safely,
    /// e.g. a non-positive initial balance.
    #[error("Invalid challenge configuration: {reason}")]
    Configuration { reason: String },

    /// The underlying store failed; the transaction was rolled back in full
    /// and the client may retry.
    #[error("Storage failure: {reason}")]
    Storage { reason: String },
}

impl TradingError {
    pub fn validation(reason: impl Into<String>) -> Self {
        TradingError::Validation {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call can succeed without the caller
    /// changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradingError::Storage { .. })
    }

    /// Short stable code for logs and monitoring.
    pub fn error_code(&self) -> &'static str {
        match self {
            TradingError::Validation { .. } => "ERR_VALIDATION",
            TradingError::InsufficientFunds { .. } => "ERR_INSUFFICIENT_FUNDS",
            TradingError::NoActiveChallenge => "ERR_NO_ACTIVE_CHALLENGE",
            TradingError::Configuration { .. } => "ERR_CONFIGURATION",
            TradingError::Storage { .. } => "ERR_STORAGE",
        }
    }
}
