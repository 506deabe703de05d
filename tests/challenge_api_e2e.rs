//! End-to-end API test: register, buy a plan, trade until the challenge
//! fails, and observe the terminal state through every endpoint.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;

use propdesk::application::{api_router, AppState};
use propdesk::config::AppConfig;
use propdesk::persistence::init_database;

async fn spawn_app() -> Router {
    let config = AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "e2e-test-secret-e2e-test-secret-abcdef".to_string(),
        token_ttl_days: 7,
        plans: propdesk::config::default_plans(),
        profit_target_percent: 10.0,
        max_daily_loss_percent: 5.0,
        max_total_loss_percent: 10.0,
        checkout_delay_ms: 0,
        quote_cache_ttl_seconds: 60,
        requests_per_minute: 100,
        allowed_origins: vec![],
        market_api_base: "http://127.0.0.1:9".to_string(),
    };
    let pool = init_database(&config.database_url).await.unwrap();
    api_router(AppState::new(config, pool))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_full_challenge_lifecycle() {
    let app = spawn_app().await;
    let token = register(&app, "alice", "alice@example.com").await;

    // Profile reflects the registration.
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "user");

    // No challenge yet.
    let (status, _) = send(&app, "GET", "/api/challenges/active", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Buy the starter plan.
    let (status, body) = send(
        &app,
        "POST",
        "/api/payment/checkout",
        Some(&token),
        Some(json!({ "plan_type": "starter", "payment_method": "cmi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(body["challenge"]["initial_balance"], 5000.0);
    assert_eq!(body["challenge"]["status"], "active");

    // A second checkout is refused while the challenge is active.
    let (status, _) = send(
        &app,
        "POST",
        "/api/payment/checkout",
        Some(&token),
        Some(json!({ "plan_type": "pro", "payment_method": "paypal" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A buy of exactly the loss budget fails the challenge on the spot.
    let (status, body) = send(
        &app,
        "POST",
        "/api/trades/execute",
        Some(&token),
        Some(json!({ "symbol": "AAPL", "action": "buy", "quantity": 10, "price": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["challenge"]["current_balance"], 4500.0);
    assert_eq!(body["challenge"]["status"], "failed");
    assert_eq!(body["challenge"]["profit_percent"], -10.0);
    assert_eq!(body["rule_check"]["status"], "failed");
    assert_eq!(body["rule_check"]["reason"], "Max total loss exceeded");
    assert!(body["challenge"]["ended_at"].is_string());
    assert_eq!(body["trade"]["action"], "buy");
    assert_eq!(body["trade"]["profit_loss"], 0.0);

    // Terminal state is idempotent: no active challenge, no more trades.
    let (status, _) = send(&app, "GET", "/api/challenges/active", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        "POST",
        "/api/trades/execute",
        Some(&token),
        Some(json!({ "symbol": "AAPL", "action": "sell", "quantity": 10, "price": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Histories show exactly the accepted trade and the one payment.
    let (status, body) = send(&app, "GET", "/api/trades/history", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trades"].as_array().unwrap().len(), 1);
    let (status, body) = send(&app, "GET", "/api/payment/history", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);

    // The failed challenge still counts on this month's leaderboard.
    let (status, body) = send(&app, "GET", "/api/leaderboard/monthly", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["rank"], 1);
    assert_eq!(rows[0]["username"], "alice");
    assert_eq!(rows[0]["profit_percent"], -10.0);
    assert_eq!(rows[0]["total_trades"], 1);
}

#[tokio::test]
async fn test_validation_and_auth_failures() {
    let app = spawn_app().await;
    let token = register(&app, "bob", "bob@example.com").await;

    // Duplicate username.
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "bob", "email": "bob2@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Username already taken");

    // Short password.
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "carol", "email": "carol@example.com", "password": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong password.
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "bob@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Login works with the right one, email case-insensitively.
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "Bob@Example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    // Protected endpoints reject missing and garbage tokens.
    let (status, _) = send(&app, "GET", "/api/challenges/active", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        "GET",
        "/api/challenges/active",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Malformed trades are rejected before any domain logic runs.
    send(
        &app,
        "POST",
        "/api/payment/checkout",
        Some(&token),
        Some(json!({ "plan_type": "starter", "payment_method": "crypto" })),
    )
    .await;
    for bad in [
        json!({ "symbol": "AAPL", "action": "hold", "quantity": 1, "price": 1 }),
        json!({ "symbol": "AAPL", "action": "buy", "quantity": 0, "price": 1 }),
        json!({ "symbol": "AAPL", "action": "buy", "quantity": 1, "price": -5 }),
        json!({ "action": "buy", "quantity": 1, "price": 1 }),
    ] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/trades/execute",
            Some(&token),
            Some(bad),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // Admin endpoints are role-gated.
    let (status, _) = send(&app, "GET", "/api/admin/overview", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_regional_market_endpoints_are_self_contained() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/api/market/morocco/IAM", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "IAM");
    assert_eq!(body["currency"], "MAD");
    assert_eq!(body["company_name"], "Maroc Telecom");

    let (status, body) = send(&app, "GET", "/api/market/morocco/symbols", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);

    let (status, _) = send(&app, "GET", "/api/market/morocco/XYZ", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/signals/morocco/IAM", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signal"], "BUY");
    assert_eq!(body["indicators"]["currency"], "MAD");

    let (status, body) = send(&app, "GET", "/api/market/symbols", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 7);

    let (status, body) = send(&app, "GET", "/api/payment/plans", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plans"]["pro"]["popular"], true);
    assert_eq!(body["plans"]["starter"]["balance"], 5000.0);

    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
