//! Trade execution and checkout orchestration.
//!
//! Owns the transactional flows around the rule engine: everything between
//! "find the active challenge" and "persist the decision" commits as one
//! atomic unit, and any failure after the balance mutation rolls the whole
//! operation back. No partial trade is ever visible.
//!
//! Concurrent submissions for the same challenge are serialized with an
//! optimistic compare-and-swap on the balance: a trade that read a stale
//! balance affects zero rows, rolls back and retries against fresh state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::entities::challenge::ChallengeStatus;
use crate::domain::entities::payment::PaymentMethod;
use crate::domain::entities::plan::Plan;
use crate::domain::entities::trade::{TradeAction, TradeRequest};
use crate::domain::errors::TradingError;
use crate::domain::services::challenge_rules::{self, RuleDecision};
use crate::persistence::models::*;
use crate::persistence::repository::{
    ChallengeRepository, PaymentRepository, TradeRepository,
};
use crate::persistence::{DatabaseError, DbPool};

/// How many times a conflicting concurrent balance update is retried
/// before the call is surfaced as a transient storage failure.
const MAX_BALANCE_RETRIES: u32 = 3;

/// Result of one accepted trade: the persisted records plus the rule
/// decision that was applied.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub trade: TradeRecord,
    pub challenge: ChallengeRecord,
    pub decision: RuleDecision,
}

#[derive(Clone)]
pub struct TradingService {
    pool: DbPool,
    config: Arc<AppConfig>,
    challenges: ChallengeRepository,
    trades: TradeRepository,
}

impl TradingService {
    pub fn new(pool: DbPool, config: Arc<AppConfig>) -> Self {
        let challenges = ChallengeRepository::new(pool.clone());
        let trades = TradeRepository::new(pool.clone());
        Self {
            pool,
            config,
            challenges,
            trades,
        }
    }

    /// The caller's active challenge, or [`TradingError::NoActiveChallenge`].
    pub async fn active_challenge(&self, user_id: &str) -> Result<ChallengeRecord, TradingError> {
        self.challenges
            .find_active(user_id)
            .await?
            .ok_or(TradingError::NoActiveChallenge)
    }

    /// The caller's trades, newest first.
    pub async fn trade_history(&self, user_id: &str) -> Result<Vec<TradeRecord>, TradingError> {
        Ok(self.trades.history_for_user(user_id).await?)
    }

    /// Atomically validate and apply one trade against the caller's active
    /// challenge, then evaluate the challenge rules.
    pub async fn execute_trade(
        &self,
        user_id: &str,
        request: &TradeRequest,
    ) -> Result<TradeOutcome, TradingError> {
        for attempt in 1..=MAX_BALANCE_RETRIES {
            match self.try_execute(user_id, request).await? {
                Some(outcome) => {
                    info!(
                        "Executed {} {} x {:.4} @ {:.2} for user {} (challenge {} -> {})",
                        request.action,
                        request.symbol,
                        request.quantity.value(),
                        request.price.value(),
                        user_id,
                        outcome.challenge.id,
                        outcome.challenge.status,
                    );
                    return Ok(outcome);
                }
                None => {
                    warn!(
                        "Balance conflict executing trade for user {} (attempt {}/{})",
                        user_id, attempt, MAX_BALANCE_RETRIES
                    );
                }
            }
        }

        Err(TradingError::Storage {
            reason: "trade conflicted with concurrent updates, please retry".to_string(),
        })
    }

    /// One execution attempt. `Ok(None)` means another trade committed in
    /// between our read and our write; the transaction was rolled back and
    /// the caller may retry.
    async fn try_execute(
        &self,
        user_id: &str,
        request: &TradeRequest,
    ) -> Result<Option<TradeOutcome>, TradingError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let Some(mut challenge) = ChallengeRepository::find_active_on(&mut tx, user_id).await?
        else {
            return Err(TradingError::NoActiveChallenge);
        };

        let trade_value = request.notional();
        let new_balance = match request.action {
            TradeAction::Buy => {
                if challenge.current_balance < trade_value {
                    // Dropping the transaction rolls it back; nothing
                    // changed.
                    return Err(TradingError::InsufficientFunds {
                        required: trade_value,
                        available: challenge.current_balance,
                    });
                }
                challenge.current_balance - trade_value
            }
            TradeAction::Sell => challenge.current_balance + trade_value,
        };

        let swapped = ChallengeRepository::swap_balance_on(
            &mut tx,
            &challenge.id,
            challenge.current_balance,
            new_balance,
        )
        .await?;
        if !swapped {
            return Ok(None);
        }
        challenge.current_balance = new_balance;

        let trade = TradeRepository::insert_on(
            &mut tx,
            CreateTrade {
                id: Uuid::new_v4().to_string(),
                challenge_id: challenge.id.clone(),
                user_id: user_id.to_string(),
                symbol: request.symbol.clone(),
                action: request.action.to_string(),
                quantity: request.quantity.value(),
                price: request.price.value(),
                // Realized P/L is not tracked per position; sells record 0.
                profit_loss: 0.0,
            },
            now,
        )
        .await?;

        let decision = challenge_rules::evaluate(&challenge.rule_state(), now)?;
        if decision.status != ChallengeStatus::Active {
            ChallengeRepository::finalize_on(
                &mut tx,
                &challenge.id,
                decision.status.as_str(),
                decision.evaluated_at,
            )
            .await?;
            challenge.status = decision.status.as_str().to_string();
            challenge.ended_at = Some(decision.evaluated_at);
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(Some(TradeOutcome {
            trade,
            challenge,
            decision,
        }))
    }

    /// Simulated checkout: records a completed payment and opens a fresh
    /// active challenge seeded from the plan, in one transaction.
    pub async fn checkout(
        &self,
        user_id: &str,
        plan: &Plan,
        method: PaymentMethod,
    ) -> Result<(PaymentRecord, ChallengeRecord), TradingError> {
        if self.config.checkout_delay_ms > 0 {
            // Simulated payment-processor latency.
            tokio::time::sleep(std::time::Duration::from_millis(self.config.checkout_delay_ms))
                .await;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let payment = PaymentRepository::insert_on(
            &mut tx,
            CreatePayment {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                amount: plan.price,
                currency: plan.currency.to_string(),
                payment_method: method.to_string(),
                transaction_id: Uuid::new_v4().to_string(),
            },
            now,
        )
        .await?;

        let challenge = ChallengeRepository::insert_on(
            &mut tx,
            CreateChallenge {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                plan_type: plan.plan_type.to_string(),
                initial_balance: plan.balance,
                profit_target_percent: self.config.profit_target_percent,
                max_daily_loss_percent: self.config.max_daily_loss_percent,
                max_total_loss_percent: self.config.max_total_loss_percent,
            },
            now,
        )
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => {
                TradingError::validation("An active challenge already exists for this account")
            }
            other => other.into(),
        })?;

        tx.commit().await.map_err(storage_error)?;

        info!(
            "Checkout completed for user {}: plan {}, challenge {}",
            user_id, plan.plan_type, challenge.id
        );

        Ok((payment, challenge))
    }
}

fn storage_error(e: sqlx::Error) -> TradingError {
    TradingError::Storage {
        reason: e.to_string(),
    }
}
