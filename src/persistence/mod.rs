//! Persistence Layer
//!
//! SQLite storage for users, challenges, trades and payments, with async
//! access via sqlx. Schema migrations run idempotently at startup.
//!
//! The single-active-challenge invariant is enforced here with a partial
//! unique index on `challenges(user_id) WHERE status = 'active'`, in
//! addition to the filtered lookup the trade execution flow performs.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::errors::TradingError;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization and query errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    /// A uniqueness constraint rejected the write (duplicate username or
    /// email, duplicate transaction id, or a second active challenge).
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<DatabaseError> for TradingError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(reason) => TradingError::Validation { reason },
            other => TradingError::Storage {
                reason: other.to_string(),
            },
        }
    }
}

/// Initialize the database connection pool and run migrations.
///
/// `database_url` is a sqlx SQLite URL, e.g. `sqlite://data/propdesk.db`
/// or `sqlite::memory:` for tests.
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure the data directory exists for file-backed databases
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    // An in-memory SQLite database exists per connection, so the pool must
    // hold exactly one (and never recycle it) for the schema to be shared.
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;

    info!("Database initialized");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK(role IN ('user', 'admin', 'superadmin')),
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create users table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS challenges (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            plan_type TEXT NOT NULL,
            initial_balance REAL NOT NULL,
            current_balance REAL NOT NULL,
            daily_start_balance REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'passed', 'failed')),
            profit_target_percent REAL NOT NULL,
            max_daily_loss_percent REAL NOT NULL,
            max_total_loss_percent REAL NOT NULL,
            started_at DATETIME NOT NULL,
            ended_at DATETIME,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create challenges table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            challenge_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            action TEXT NOT NULL CHECK(action IN ('buy', 'sell')),
            quantity REAL NOT NULL,
            price REAL NOT NULL,
            profit_loss REAL NOT NULL DEFAULT 0.0,
            executed_at DATETIME NOT NULL,
            FOREIGN KEY (challenge_id) REFERENCES challenges(id),
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create trades table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            amount REAL NOT NULL,
            currency TEXT NOT NULL DEFAULT 'DH',
            payment_method TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            transaction_id TEXT NOT NULL UNIQUE,
            created_at DATETIME NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create payments table: {}", e))
    })?;

    // At most one active challenge per user, enforced by storage.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_challenges_one_active \
         ON challenges(user_id) WHERE status = 'active'",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_challenges_user ON challenges(user_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_challenges_started_at ON challenges(started_at)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id, executed_at)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_challenge ON trades(challenge_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id, created_at)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("Database migrations completed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations_create_all_tables() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' \
             AND name IN ('users', 'challenges', 'trades', 'payments')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 4);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_one_active_challenge_per_user_index() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, is_active, created_at) \
             VALUES ('u1', 'alice', 'a@example.com', 'x', 'user', 1, datetime('now'))",
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert = "INSERT INTO challenges (id, user_id, plan_type, initial_balance, \
             current_balance, daily_start_balance, status, profit_target_percent, \
             max_daily_loss_percent, max_total_loss_percent, started_at) \
             VALUES (?1, 'u1', 'starter', 5000, 5000, 5000, ?2, 10, 5, 10, datetime('now'))";

        sqlx::query(insert)
            .bind("c1")
            .bind("active")
            .execute(&pool)
            .await
            .unwrap();

        // A second active challenge for the same user is rejected.
        let second = sqlx::query(insert)
            .bind("c2")
            .bind("active")
            .execute(&pool)
            .await;
        assert!(second.is_err());

        // A terminal challenge alongside the active one is fine.
        let failed = sqlx::query(insert)
            .bind("c3")
            .bind("failed")
            .execute(&pool)
            .await;
        assert!(failed.is_ok());
    }
}
