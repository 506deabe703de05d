//! Database Models
//!
//! Persistent data structures for users, challenges, trades and payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::services::challenge_rules::ChallengeState;

/// User record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String, // "user", "admin" or "superadmin"
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Challenge record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChallengeRecord {
    pub id: String,
    pub user_id: String,
    pub plan_type: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub daily_start_balance: f64,
    pub status: String, // "active", "passed" or "failed"
    pub profit_target_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_total_loss_percent: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ChallengeRecord {
    /// Snapshot of the numeric fields the rule engine evaluates.
    pub fn rule_state(&self) -> ChallengeState {
        ChallengeState {
            initial_balance: self.initial_balance,
            current_balance: self.current_balance,
            daily_start_balance: self.daily_start_balance,
            profit_target_percent: self.profit_target_percent,
            max_daily_loss_percent: self.max_daily_loss_percent,
            max_total_loss_percent: self.max_total_loss_percent,
        }
    }

    /// Profit relative to the initial balance, rounded to two decimals.
    /// 0.0 when the initial balance is zero rather than a division error.
    pub fn profit_percent(&self) -> f64 {
        if self.initial_balance == 0.0 {
            return 0.0;
        }
        let pct = (self.current_balance - self.initial_balance) / self.initial_balance * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

/// Trade record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub symbol: String,
    pub action: String, // "buy" or "sell"
    pub quantity: f64,
    pub price: f64,
    pub profit_loss: f64,
    pub executed_at: DateTime<Utc>,
}

/// Payment record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String, // "cmi", "crypto" or "paypal"
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Create challenge input
#[derive(Debug, Clone)]
pub struct CreateChallenge {
    pub id: String,
    pub user_id: String,
    pub plan_type: String,
    pub initial_balance: f64,
    pub profit_target_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_total_loss_percent: f64,
}

/// Create trade input
#[derive(Debug, Clone)]
pub struct CreateTrade {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub symbol: String,
    pub action: String,
    pub quantity: f64,
    pub price: f64,
    pub profit_loss: f64,
}

/// Create payment input
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub transaction_id: String,
}

/// One row of the monthly leaderboard aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaderboardRow {
    pub username: String,
    pub avg_profit_percent: f64,
    pub total_trades: i64,
}
