//! Database Repository
//!
//! Data access layer for users, challenges, trades and payments.
//!
//! Pool-based methods serve plain reads. The `_on` variants take a raw
//! connection so the trade execution and checkout flows can compose them
//! into one transaction; callers own the commit/rollback.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, error};

use super::models::*;
use super::{DatabaseError, DbPool};

fn map_insert_error(entity: &str, e: sqlx::Error) -> DatabaseError {
    if e.as_database_error()
        .map_or(false, |d| d.is_unique_violation())
    {
        DatabaseError::Conflict(format!("{} already exists", entity))
    } else {
        error!("Failed to insert {}: {}", entity, e);
        DatabaseError::QueryError(format!("Failed to insert {}: {}", entity, e))
    }
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, user: CreateUser) -> Result<UserRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            RETURNING *
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error("user", e))?;

        debug!("Created user: {} ({})", record.username, record.id);
        Ok(record)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get user {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get user: {}", e))
            })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get user by email: {}", e);
                DatabaseError::QueryError(format!("Failed to get user: {}", e))
            })
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to check username: {}", e)))?;
        Ok(row.0 > 0)
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to check email: {}", e)))?;
        Ok(row.0 > 0)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to count users: {}", e)))?;
        Ok(row.0)
    }
}

/// Challenge repository
#[derive(Clone)]
pub struct ChallengeRepository {
    pool: DbPool,
}

impl ChallengeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The caller's challenge in `active` status, if any. Terminal
    /// challenges never match, so trading against a passed or failed
    /// account surfaces as not-found.
    pub async fn find_active(&self, user_id: &str) -> Result<Option<ChallengeRecord>, DatabaseError> {
        sqlx::query_as::<_, ChallengeRecord>(
            "SELECT * FROM challenges WHERE user_id = ?1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get active challenge for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get active challenge: {}", e))
        })
    }

    /// Transaction-scoped variant of [`find_active`](Self::find_active).
    pub async fn find_active_on(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> Result<Option<ChallengeRecord>, DatabaseError> {
        sqlx::query_as::<_, ChallengeRecord>(
            "SELECT * FROM challenges WHERE user_id = ?1 AND status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            error!("Failed to get active challenge for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get active challenge: {}", e))
        })
    }

    /// Insert a fresh active challenge. The partial unique index turns a
    /// second active challenge for the same user into a conflict.
    pub async fn insert_on(
        conn: &mut SqliteConnection,
        challenge: CreateChallenge,
        now: DateTime<Utc>,
    ) -> Result<ChallengeRecord, DatabaseError> {
        let record = sqlx::query_as::<_, ChallengeRecord>(
            r#"
            INSERT INTO challenges (
                id, user_id, plan_type, initial_balance, current_balance,
                daily_start_balance, status, profit_target_percent,
                max_daily_loss_percent, max_total_loss_percent, started_at
            )
            VALUES (?1, ?2, ?3, ?4, ?4, ?4, 'active', ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(&challenge.id)
        .bind(&challenge.user_id)
        .bind(&challenge.plan_type)
        .bind(challenge.initial_balance)
        .bind(challenge.profit_target_percent)
        .bind(challenge.max_daily_loss_percent)
        .bind(challenge.max_total_loss_percent)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| map_insert_error("active challenge", e))?;

        debug!(
            "Created challenge {} for user {}",
            record.id, record.user_id
        );
        Ok(record)
    }

    /// Compare-and-swap balance update. Guards on the balance the caller
    /// read so a concurrent trade that committed in between shows up as
    /// zero affected rows instead of a lost update.
    pub async fn swap_balance_on(
        conn: &mut SqliteConnection,
        id: &str,
        expected_balance: f64,
        new_balance: f64,
    ) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query(
            "UPDATE challenges SET current_balance = ?1 \
             WHERE id = ?2 AND status = 'active' AND current_balance = ?3",
        )
        .bind(new_balance)
        .bind(id)
        .bind(expected_balance)
        .execute(conn)
        .await
        .map_err(|e| {
            error!("Failed to update challenge {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to update challenge: {}", e))
        })?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    /// Apply a terminal rule decision: set the status and stamp `ended_at`
    /// exactly once.
    pub async fn finalize_on(
        conn: &mut SqliteConnection,
        id: &str,
        status: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let rows_affected = sqlx::query(
            "UPDATE challenges SET status = ?1, ended_at = ?2 \
             WHERE id = ?3 AND status = 'active'",
        )
        .bind(status)
        .bind(ended_at)
        .bind(id)
        .execute(conn)
        .await
        .map_err(|e| {
            error!("Failed to finalize challenge {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to finalize challenge: {}", e))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(DatabaseError::QueryError(format!(
                "Challenge not found or already terminal: {}",
                id
            )));
        }

        debug!("Challenge {} finalized as {}", id, status);
        Ok(())
    }

    /// Top users by average challenge profit percent over challenges
    /// started inside `[month_start, month_end)`, with their trade counts.
    /// Ties break on username ascending so the ordering is stable.
    pub async fn monthly_leaderboard(
        &self,
        month_start: DateTime<Utc>,
        month_end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LeaderboardRow>, DatabaseError> {
        sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT u.username AS username,
                   ROUND(COALESCE(AVG((c.current_balance - c.initial_balance)
                                      / c.initial_balance * 100.0), 0.0), 2) AS avg_profit_percent,
                   COALESCE(SUM(tc.trade_count), 0) AS total_trades
            FROM users u
            JOIN challenges c ON c.user_id = u.id
            LEFT JOIN (
                SELECT challenge_id, COUNT(*) AS trade_count
                FROM trades
                GROUP BY challenge_id
            ) tc ON tc.challenge_id = c.id
            WHERE c.started_at >= ?1 AND c.started_at < ?2
            GROUP BY u.id, u.username
            ORDER BY avg_profit_percent DESC, u.username ASC
            LIMIT ?3
            "#,
        )
        .bind(month_start)
        .bind(month_end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to compute leaderboard: {}", e);
            DatabaseError::QueryError(format!("Failed to compute leaderboard: {}", e))
        })
    }

    pub async fn count_by_status(&self, status: &str) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM challenges WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to count challenges: {}", e)))?;
        Ok(row.0)
    }
}

/// Trade repository
#[derive(Clone)]
pub struct TradeRepository {
    pool: DbPool,
}

impl TradeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an immutable trade record inside the caller's transaction.
    pub async fn insert_on(
        conn: &mut SqliteConnection,
        trade: CreateTrade,
        executed_at: DateTime<Utc>,
    ) -> Result<TradeRecord, DatabaseError> {
        let record = sqlx::query_as::<_, TradeRecord>(
            r#"
            INSERT INTO trades (
                id, challenge_id, user_id, symbol, action,
                quantity, price, profit_loss, executed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING *
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.challenge_id)
        .bind(&trade.user_id)
        .bind(&trade.symbol)
        .bind(&trade.action)
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.profit_loss)
        .bind(executed_at)
        .fetch_one(conn)
        .await
        .map_err(|e| map_insert_error("trade", e))?;

        debug!("Recorded trade {} on {}", record.id, record.symbol);
        Ok(record)
    }

    /// The caller's trades, newest first.
    pub async fn history_for_user(&self, user_id: &str) -> Result<Vec<TradeRecord>, DatabaseError> {
        sqlx::query_as::<_, TradeRecord>(
            "SELECT * FROM trades WHERE user_id = ?1 ORDER BY executed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get trades for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get trades: {}", e))
        })
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to count trades: {}", e)))?;
        Ok(row.0)
    }
}

/// Payment repository
#[derive(Clone)]
pub struct PaymentRepository {
    pool: DbPool,
}

impl PaymentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a completed simulated payment inside the caller's
    /// transaction.
    pub async fn insert_on(
        conn: &mut SqliteConnection,
        payment: CreatePayment,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, DatabaseError> {
        let record = sqlx::query_as::<_, PaymentRecord>(
            r#"
            INSERT INTO payments (
                id, user_id, amount, currency, payment_method,
                status, transaction_id, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 'completed', ?6, ?7)
            RETURNING *
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.user_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.payment_method)
        .bind(&payment.transaction_id)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| map_insert_error("payment", e))?;

        debug!("Recorded payment {} ({})", record.id, record.transaction_id);
        Ok(record)
    }

    /// The caller's payments, newest first.
    pub async fn history_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PaymentRecord>, DatabaseError> {
        sqlx::query_as::<_, PaymentRecord>(
            "SELECT * FROM payments WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get payments for {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to get payments: {}", e))
        })
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to count payments: {}", e)))?;
        Ok(row.0)
    }
}
