//! Application layer: HTTP handlers, orchestration services, and the
//! shared state/router wiring.

pub mod handlers;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth;
use crate::config::AppConfig;
use crate::infrastructure::casablanca::CasablancaClient;
use crate::infrastructure::market_data::MarketDataClient;
use crate::persistence::DbPool;
use crate::application::services::trading_service::TradingService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: DbPool,
    pub trading: TradingService,
    pub market: MarketDataClient,
    pub casablanca: CasablancaClient,
}

impl AppState {
    pub fn new(config: AppConfig, pool: DbPool) -> Self {
        let config = Arc::new(config);
        let trading = TradingService::new(pool.clone(), config.clone());
        let market = MarketDataClient::new(config.market_api_base.clone());
        let casablanca =
            CasablancaClient::new(Duration::from_secs(config.quote_cache_ttl_seconds));
        Self {
            config,
            pool,
            trading,
            market,
            casablanca,
        }
    }
}

/// The full API route table.
///
/// Outer layers (CORS, tracing, rate limiting) are applied by the caller;
/// authentication is applied here, per route group.
pub fn api_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::auth_handler::register))
        .route("/api/auth/login", post(handlers::auth_handler::login))
        .route("/api/payment/plans", get(handlers::payment_handler::plans))
        .route(
            "/api/leaderboard/monthly",
            get(handlers::leaderboard_handler::monthly),
        )
        .route("/api/market/live/:symbol", get(handlers::market_handler::live))
        .route(
            "/api/market/chart/:symbol",
            get(handlers::market_handler::chart),
        )
        .route("/api/market/symbols", get(handlers::market_handler::symbols))
        .route(
            "/api/market/morocco/symbols",
            get(handlers::market_handler::morocco_symbols),
        )
        .route(
            "/api/market/morocco/:ticker",
            get(handlers::market_handler::morocco_quote),
        )
        .route(
            "/api/signals/morocco/:ticker",
            get(handlers::signals_handler::morocco_signal),
        )
        .route(
            "/api/signals/:symbol",
            get(handlers::signals_handler::symbol_signal),
        );

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth_handler::me))
        .route("/api/auth/logout", post(handlers::auth_handler::logout))
        .route(
            "/api/challenges/active",
            get(handlers::trading_handler::active_challenge),
        )
        .route(
            "/api/trades/execute",
            post(handlers::trading_handler::execute_trade),
        )
        .route(
            "/api/trades/history",
            get(handlers::trading_handler::trade_history),
        )
        .route(
            "/api/payment/checkout",
            post(handlers::payment_handler::checkout),
        )
        .route(
            "/api/payment/history",
            get(handlers::payment_handler::payment_history),
        )
        .route("/api/admin/overview", get(handlers::admin_handler::overview))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    public.merge(protected).with_state(state)
}
