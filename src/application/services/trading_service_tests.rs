//! End-to-end properties of the trade execution flow against a real
//! (in-memory) database: atomicity, balance accounting, rule transitions
//! and terminal-state idempotence.

use std::sync::Arc;

use crate::config::test_config;
use crate::domain::entities::challenge::ChallengeStatus;
use crate::domain::entities::payment::PaymentMethod;
use crate::domain::entities::plan::PlanType;
use crate::domain::entities::trade::TradeRequest;
use crate::domain::errors::TradingError;
use crate::domain::services::challenge_rules::{REASON_MAX_TOTAL_LOSS, REASON_PROFIT_TARGET};
use crate::persistence::models::{ChallengeRecord, CreateUser};
use crate::persistence::repository::UserRepository;
use crate::persistence::{init_database, DbPool};

use super::trading_service::TradingService;

async fn setup() -> (TradingService, DbPool, String) {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let config = Arc::new(test_config());

    let user = UserRepository::new(pool.clone())
        .create(CreateUser {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$test".to_string(),
            role: "user".to_string(),
        })
        .await
        .unwrap();

    let service = TradingService::new(pool.clone(), config);
    (service, pool, user.id)
}

/// Opens a starter challenge (5000 balance, 10% target, 5% daily, 10%
/// total loss) for the user.
async fn open_starter(service: &TradingService, user_id: &str) -> ChallengeRecord {
    let config = test_config();
    let plan = config.plan(PlanType::Starter).unwrap();
    let (_, challenge) = service
        .checkout(user_id, plan, PaymentMethod::Cmi)
        .await
        .unwrap();
    challenge
}

fn trade(symbol: &str, action: &str, quantity: f64, price: f64) -> TradeRequest {
    TradeRequest::new(
        Some(symbol.to_string()),
        Some(action.to_string()),
        Some(quantity),
        Some(price),
    )
    .unwrap()
}

async fn challenge_by_id(pool: &DbPool, id: &str) -> ChallengeRecord {
    sqlx::query_as("SELECT * FROM challenges WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn trade_count(pool: &DbPool) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades")
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

#[tokio::test]
async fn test_checkout_opens_an_active_challenge_with_payment() {
    let (service, _pool, user_id) = setup().await;
    let config = test_config();
    let plan = config.plan(PlanType::Pro).unwrap();

    let (payment, challenge) = service
        .checkout(&user_id, plan, PaymentMethod::Paypal)
        .await
        .unwrap();

    assert_eq!(payment.status, "completed");
    assert_eq!(payment.amount, 500.0);
    assert_eq!(payment.currency, "DH");
    assert_eq!(challenge.status, "active");
    assert_eq!(challenge.initial_balance, 10_000.0);
    assert_eq!(challenge.current_balance, 10_000.0);
    assert_eq!(challenge.daily_start_balance, 10_000.0);
    assert_eq!(challenge.profit_target_percent, 10.0);
    assert!(challenge.ended_at.is_none());
}

#[tokio::test]
async fn test_checkout_refuses_a_second_active_challenge() {
    let (service, _pool, user_id) = setup().await;
    open_starter(&service, &user_id).await;

    let config = test_config();
    let plan = config.plan(PlanType::Elite).unwrap();
    let err = service
        .checkout(&user_id, plan, PaymentMethod::Crypto)
        .await
        .unwrap_err();
    assert!(matches!(err, TradingError::Validation { .. }));
}

#[tokio::test]
async fn test_buy_and_sell_mutate_the_balance() {
    let (service, _pool, user_id) = setup().await;
    open_starter(&service, &user_id).await;

    let outcome = service
        .execute_trade(&user_id, &trade("AAPL", "buy", 2.0, 100.0))
        .await
        .unwrap();
    assert_eq!(outcome.challenge.current_balance, 4_800.0);
    assert_eq!(outcome.trade.action, "buy");
    assert_eq!(outcome.trade.symbol, "AAPL");
    assert_eq!(outcome.decision.status, ChallengeStatus::Active);
    assert_eq!(outcome.decision.reason, None);

    let outcome = service
        .execute_trade(&user_id, &trade("AAPL", "sell", 2.0, 110.0))
        .await
        .unwrap();
    assert_eq!(outcome.challenge.current_balance, 5_020.0);
    assert_eq!(outcome.trade.profit_loss, 0.0);
}

#[tokio::test]
async fn test_balance_equals_initial_plus_accepted_trades() {
    let (service, pool, user_id) = setup().await;
    let challenge = open_starter(&service, &user_id).await;

    // Accepted: buy 100, sell 60, buy 50 — all comfortably inside the
    // loss limits. Rejected: a buy larger than the remaining balance.
    service
        .execute_trade(&user_id, &trade("AAPL", "buy", 1.0, 100.0))
        .await
        .unwrap();
    service
        .execute_trade(&user_id, &trade("AAPL", "sell", 0.6, 100.0))
        .await
        .unwrap();
    service
        .execute_trade(&user_id, &trade("TSLA", "buy", 0.5, 100.0))
        .await
        .unwrap();
    let rejected = service
        .execute_trade(&user_id, &trade("TSLA", "buy", 1000.0, 100.0))
        .await;
    assert!(matches!(
        rejected,
        Err(TradingError::InsufficientFunds { .. })
    ));

    let stored = challenge_by_id(&pool, &challenge.id).await;
    assert_eq!(stored.current_balance, 5_000.0 - 100.0 + 60.0 - 50.0);
    // The rejected trade left no record behind.
    assert_eq!(trade_count(&pool).await, 3);
}

#[tokio::test]
async fn test_insufficient_funds_leaves_no_state_change() {
    let (service, pool, user_id) = setup().await;
    let challenge = open_starter(&service, &user_id).await;

    let err = service
        .execute_trade(&user_id, &trade("MSFT", "buy", 100.0, 100.0))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TradingError::InsufficientFunds {
            required: 10_000.0,
            available: 5_000.0
        }
    );

    let stored = challenge_by_id(&pool, &challenge.id).await;
    assert_eq!(stored.current_balance, 5_000.0);
    assert_eq!(stored.status, "active");
    assert_eq!(trade_count(&pool).await, 0);
}

#[tokio::test]
async fn test_buy_to_exact_loss_threshold_fails_the_challenge() {
    let (service, pool, user_id) = setup().await;
    let challenge = open_starter(&service, &user_id).await;

    // 5000 * (1 - 10%/100) = 4500: a 500 buy lands exactly on the
    // threshold and the boundary is inclusive.
    let outcome = service
        .execute_trade(&user_id, &trade("AAPL", "buy", 10.0, 50.0))
        .await
        .unwrap();

    assert_eq!(outcome.challenge.current_balance, 4_500.0);
    assert_eq!(outcome.decision.status, ChallengeStatus::Failed);
    assert_eq!(outcome.decision.reason, Some(REASON_MAX_TOTAL_LOSS));
    assert_eq!(outcome.challenge.status, "failed");
    assert!(outcome.challenge.ended_at.is_some());

    let stored = challenge_by_id(&pool, &challenge.id).await;
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.ended_at, outcome.challenge.ended_at);
}

#[tokio::test]
async fn test_profitable_sell_passes_the_challenge() {
    let (service, pool, user_id) = setup().await;
    let challenge = open_starter(&service, &user_id).await;

    // Buy within the daily-loss budget (a 200 drawdown is 4%), then sell
    // the position at a profit large enough to reach the 10% target
    // balance of 5500.
    service
        .execute_trade(&user_id, &trade("AAPL", "buy", 2.0, 100.0))
        .await
        .unwrap();
    let outcome = service
        .execute_trade(&user_id, &trade("AAPL", "sell", 2.0, 350.0))
        .await
        .unwrap();

    assert_eq!(outcome.challenge.current_balance, 5_500.0);
    assert_eq!(outcome.decision.status, ChallengeStatus::Passed);
    assert_eq!(outcome.decision.reason, Some(REASON_PROFIT_TARGET));

    let stored = challenge_by_id(&pool, &challenge.id).await;
    assert_eq!(stored.status, "passed");
    assert!(stored.ended_at.is_some());
}

#[tokio::test]
async fn test_terminal_challenge_rejects_further_trades() {
    let (service, pool, user_id) = setup().await;
    let challenge = open_starter(&service, &user_id).await;

    service
        .execute_trade(&user_id, &trade("AAPL", "buy", 10.0, 50.0))
        .await
        .unwrap();

    // The challenge is now failed; the active-challenge lookup excludes it
    // and nothing about it can change anymore.
    let err = service
        .execute_trade(&user_id, &trade("AAPL", "sell", 10.0, 50.0))
        .await
        .unwrap_err();
    assert_eq!(err, TradingError::NoActiveChallenge);

    let err = service.active_challenge(&user_id).await.unwrap_err();
    assert_eq!(err, TradingError::NoActiveChallenge);

    let stored = challenge_by_id(&pool, &challenge.id).await;
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.current_balance, 4_500.0);
    assert_eq!(trade_count(&pool).await, 1);
}

#[tokio::test]
async fn test_trade_history_is_newest_first() {
    let (service, _pool, user_id) = setup().await;
    open_starter(&service, &user_id).await;

    service
        .execute_trade(&user_id, &trade("AAPL", "buy", 1.0, 100.0))
        .await
        .unwrap();
    service
        .execute_trade(&user_id, &trade("TSLA", "buy", 1.0, 100.0))
        .await
        .unwrap();

    let history = service.trade_history(&user_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].executed_at >= history[1].executed_at);
}

#[tokio::test]
async fn test_no_challenge_means_not_found() {
    let (service, _pool, user_id) = setup().await;
    let err = service
        .execute_trade(&user_id, &trade("AAPL", "buy", 1.0, 1.0))
        .await
        .unwrap_err();
    assert_eq!(err, TradingError::NoActiveChallenge);
}
