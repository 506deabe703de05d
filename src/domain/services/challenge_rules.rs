//! Challenge rule engine.
//!
//! Pure evaluation of a challenge's balances against its configured
//! thresholds. The engine never mutates anything; it returns a
//! [`RuleDecision`] and the caller persists the transition (status and
//! `ended_at`) when the decision is terminal.
//!
//! The three rules are checked in a fixed precedence order, first match
//! wins: profit target, then max total loss, then max daily loss. The order
//! matters because rounding can make an account satisfy the profit-target
//! and a loss-limit condition at the same time, and profit must win. All
//! three comparisons are boundary-inclusive: a balance exactly at a
//! threshold trips it.

use chrono::{DateTime, Utc};

use crate::domain::entities::challenge::ChallengeStatus;
use crate::domain::errors::TradingError;

/// The numeric state of a challenge, as seen by the rule engine.
///
/// `daily_start_balance` is set once at challenge creation and is not reset
/// at day boundaries, so the daily-loss rule currently behaves as a second
/// total-loss rule measured from the same baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChallengeState {
    pub initial_balance: f64,
    pub current_balance: f64,
    pub daily_start_balance: f64,
    pub profit_target_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_total_loss_percent: f64,
}

/// The outcome of one rule evaluation.
///
/// A value object: applying it (setting `status` and `ended_at` on the
/// challenge) is the caller's job, and only happens when `status` is
/// terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecision {
    pub status: ChallengeStatus,
    pub reason: Option<&'static str>,
    pub evaluated_at: DateTime<Utc>,
}

pub const REASON_PROFIT_TARGET: &str = "Profit target reached!";
pub const REASON_MAX_TOTAL_LOSS: &str = "Max total loss exceeded";
pub const REASON_MAX_DAILY_LOSS: &str = "Max daily loss exceeded";

/// Evaluate an active challenge's state against its thresholds.
///
/// Precondition: the challenge is `active`; terminal challenges are never
/// re-evaluated (their lookup is filtered out upstream). Non-positive
/// `initial_balance` or `daily_start_balance` is a configuration error and
/// fails the evaluation before any division happens.
pub fn evaluate(state: &ChallengeState, now: DateTime<Utc>) -> Result<RuleDecision, TradingError> {
    if state.initial_balance <= 0.0 {
        return Err(TradingError::Configuration {
            reason: format!(
                "initial_balance must be positive, got {}",
                state.initial_balance
            ),
        });
    }
    if state.daily_start_balance <= 0.0 {
        return Err(TradingError::Configuration {
            reason: format!(
                "daily_start_balance must be positive, got {}",
                state.daily_start_balance
            ),
        });
    }

    let profit_percent =
        (state.current_balance - state.initial_balance) / state.initial_balance * 100.0;
    if profit_percent >= state.profit_target_percent {
        return Ok(RuleDecision {
            status: ChallengeStatus::Passed,
            reason: Some(REASON_PROFIT_TARGET),
            evaluated_at: now,
        });
    }

    let total_loss_percent =
        (state.initial_balance - state.current_balance) / state.initial_balance * 100.0;
    if total_loss_percent >= state.max_total_loss_percent {
        return Ok(RuleDecision {
            status: ChallengeStatus::Failed,
            reason: Some(REASON_MAX_TOTAL_LOSS),
            evaluated_at: now,
        });
    }

    let daily_loss_percent =
        (state.daily_start_balance - state.current_balance) / state.daily_start_balance * 100.0;
    if daily_loss_percent >= state.max_daily_loss_percent {
        return Ok(RuleDecision {
            status: ChallengeStatus::Failed,
            reason: Some(REASON_MAX_DAILY_LOSS),
            evaluated_at: now,
        });
    }

    Ok(RuleDecision {
        status: ChallengeStatus::Active,
        reason: None,
        evaluated_at: now,
    })
}
