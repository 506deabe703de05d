use axum::http::{HeaderValue, Method};
use axum::middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propdesk::application::{api_router, AppState};
use propdesk::config::AppConfig;
use propdesk::persistence::init_database;
use propdesk::rate_limit;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "propdesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    let config = AppConfig::from_env();

    info!("Challenge trading server starting...");
    info!(
        "Plans: {}, profit target {}%, max daily loss {}%, max total loss {}%",
        config.plans.len(),
        config.profit_target_percent,
        config.max_daily_loss_percent,
        config.max_total_loss_percent
    );

    let pool = init_database(&config.database_url).await?;
    let bind_addr = config.bind_addr;
    let allowed_origins = config.allowed_origins.clone();
    let requests_per_minute = config.requests_per_minute;

    let state = AppState::new(config, pool);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Skipping invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let limiter = rate_limit::create_rate_limiter(requests_per_minute);
    let app = api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            move |request: axum::extract::Request, next: middleware::Next| {
                let limiter = limiter.clone();
                async move { rate_limit::rate_limit_middleware(limiter, request, next).await }
            },
        ));

    info!("Listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
