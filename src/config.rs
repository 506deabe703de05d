//! Application configuration, loaded once at startup from the environment.
//!
//! Risk thresholds and the plan catalog live here as injected values: a
//! challenge copies them at creation time, so changing the configuration
//! later never retroactively affects open challenges.

use once_cell::sync::Lazy;
use std::net::SocketAddr;

use crate::domain::entities::plan::{Plan, PlanType};

/// Minimum length accepted for the JWT signing secret (256 bits).
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Built-in plan catalog.
static DEFAULT_PLANS: Lazy<Vec<Plan>> = Lazy::new(|| {
    vec![
        Plan {
            plan_type: PlanType::Starter,
            price: 200.0,
            balance: 5_000.0,
            currency: "DH",
        },
        Plan {
            plan_type: PlanType::Pro,
            price: 500.0,
            balance: 10_000.0,
            currency: "DH",
        },
        Plan {
            plan_type: PlanType::Elite,
            price: 1_000.0,
            balance: 25_000.0,
            currency: "DH",
        },
    ]
});

/// The built-in plan catalog, also used by tests that assemble a config
/// by hand.
pub fn default_plans() -> Vec<Plan> {
    DEFAULT_PLANS.clone()
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub plans: Vec<Plan>,
    pub profit_target_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_total_loss_percent: f64,
    /// Simulated payment processing delay applied during checkout.
    pub checkout_delay_ms: u64,
    /// TTL for cached regional-exchange quotes.
    pub quote_cache_ttl_seconds: u64,
    pub requests_per_minute: u32,
    pub allowed_origins: Vec<String>,
    /// Base URL of the market data provider.
    pub market_api_base: String,
}

impl AppConfig {
    fn base(jwt_secret: String) -> AppConfig {
        AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: "sqlite://data/propdesk.db".to_string(),
            jwt_secret,
            token_ttl_days: 7,
            plans: DEFAULT_PLANS.clone(),
            profit_target_percent: 10.0,
            max_daily_loss_percent: 5.0,
            max_total_loss_percent: 10.0,
            checkout_delay_ms: 2_000,
            quote_cache_ttl_seconds: 60,
            requests_per_minute: 100,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            market_api_base: "https://query1.finance.yahoo.com".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics when `JWT_SECRET` is unset or shorter than
    /// [`MIN_JWT_SECRET_LEN`]. Running without a strong signing secret
    /// would silently accept forgeable tokens, so startup refuses instead.
    pub fn from_env() -> AppConfig {
        let jwt_secret = std::env::var("JWT_SECRET").expect(
            "SECURITY ERROR: JWT_SECRET environment variable is not set. \
             Generate a secure secret with: openssl rand -base64 32",
        );
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            panic!(
                "SECURITY ERROR: JWT_SECRET must be at least {} characters long, found {}. \
                 Generate a secure secret with: openssl rand -base64 32",
                MIN_JWT_SECRET_LEN,
                jwt_secret.len()
            );
        }

        let mut config = AppConfig::base(jwt_secret);

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(value) => config.bind_addr = value,
                Err(e) => tracing::warn!(
                    "Failed to parse BIND_ADDR '{}': {}, using default: {}",
                    addr,
                    e,
                    config.bind_addr
                ),
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(days) = std::env::var("TOKEN_TTL_DAYS") {
            match days.parse::<i64>() {
                Ok(value) if value > 0 => config.token_ttl_days = value,
                _ => tracing::warn!(
                    "Invalid TOKEN_TTL_DAYS value '{}', using default: {}",
                    days,
                    config.token_ttl_days
                ),
            }
        }

        config.profit_target_percent = parse_percent(
            "PROFIT_TARGET_PERCENT",
            config.profit_target_percent,
        );
        config.max_daily_loss_percent = parse_percent(
            "MAX_DAILY_LOSS_PERCENT",
            config.max_daily_loss_percent,
        );
        config.max_total_loss_percent = parse_percent(
            "MAX_TOTAL_LOSS_PERCENT",
            config.max_total_loss_percent,
        );

        if let Ok(delay) = std::env::var("CHECKOUT_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(value) => config.checkout_delay_ms = value,
                Err(e) => tracing::warn!(
                    "Failed to parse CHECKOUT_DELAY_MS '{}': {}, using default: {}",
                    delay,
                    e,
                    config.checkout_delay_ms
                ),
            }
        }

        if let Ok(ttl) = std::env::var("QUOTE_CACHE_TTL_SECONDS") {
            match ttl.parse::<u64>() {
                Ok(value) if value > 0 => config.quote_cache_ttl_seconds = value,
                _ => tracing::warn!(
                    "Invalid QUOTE_CACHE_TTL_SECONDS value '{}', using default: {}",
                    ttl,
                    config.quote_cache_ttl_seconds
                ),
            }
        }

        if let Ok(rpm) = std::env::var("REQUESTS_PER_MINUTE") {
            match rpm.parse::<u32>() {
                Ok(value) if value > 0 => config.requests_per_minute = value,
                _ => tracing::warn!(
                    "Invalid REQUESTS_PER_MINUTE value '{}', using default: {}",
                    rpm,
                    config.requests_per_minute
                ),
            }
        }

        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.allowed_origins = parsed;
            }
        }

        if let Ok(base) = std::env::var("MARKET_API_BASE") {
            config.market_api_base = base;
        }

        config
    }

    pub fn plan(&self, plan_type: PlanType) -> Option<&Plan> {
        self.plans.iter().find(|p| p.plan_type == plan_type)
    }
}

fn parse_percent(var: &str, default: f64) -> f64 {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(value) if value > 0.0 && value.is_finite() => value,
            _ => {
                tracing::warn!(
                    "Invalid {} value '{}' (must be a positive number), using default: {}",
                    var,
                    raw,
                    default
                );
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::base("test-secret-test-secret-test-secret!!".to_string());
    config.database_url = "sqlite::memory:".to_string();
    config.checkout_delay_ms = 0;
    config
}
