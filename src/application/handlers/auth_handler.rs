//! Registration, login and session endpoints.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::AppState;
use crate::auth::{self, AuthUser};
use crate::domain::entities::user::Role;
use crate::persistence::models::CreateUser;
use crate::persistence::repository::UserRepository;
use crate::persistence::DatabaseError;

use super::{error_response, trading_error, ApiError, UserPayload};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserPayload,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Create an account and return a fresh access token.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let username = body
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    let email = body
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let (Some(username), Some(email), Some(password)) = (username, email, body.password) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Username, email and password are required",
        ));
    };

    if password.len() < MIN_PASSWORD_LEN {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }

    let users = UserRepository::new(state.pool.clone());
    if users.username_taken(&username).await.map_err(db_error)? {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Username already taken",
        ));
    }
    if users.email_taken(&email).await.map_err(db_error)? {
        return Err(error_response(StatusCode::BAD_REQUEST, "Email already taken"));
    }

    let password_hash = auth::hash_password(&password).map_err(trading_error)?;
    let user = users
        .create(CreateUser {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            role: Role::User.to_string(),
        })
        .await
        .map_err(db_error)?;

    let access_token = auth::issue_token(
        &user.id,
        &user.role,
        &state.config.jwt_secret,
        state.config.token_ttl_days,
    )
    .map_err(trading_error)?;

    tracing::info!("Registered user {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            user: UserPayload::from(&user),
        }),
    ))
}

/// Exchange email and password for an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = body
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let (Some(email), Some(password)) = (email, body.password) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
        ));
    };

    let users = UserRepository::new(state.pool.clone());
    let user = users.find_by_email(&email).await.map_err(db_error)?;

    let Some(user) = user else {
        return Err(invalid_credentials());
    };
    if !auth::verify_password(&password, &user.password_hash) {
        return Err(invalid_credentials());
    }
    if !user.is_active {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Account is deactivated",
        ));
    }

    let access_token = auth::issue_token(
        &user.id,
        &user.role,
        &state.config.jwt_secret,
        state.config.token_ttl_days,
    )
    .map_err(trading_error)?;

    Ok(Json(AuthResponse {
        access_token,
        user: UserPayload::from(&user),
    }))
}

/// The authenticated caller's profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let users = UserRepository::new(state.pool.clone());
    let user = users
        .find_by_id(&caller.user_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "User not found"))?;

    Ok(Json(UserResponse {
        user: UserPayload::from(&user),
    }))
}

/// Stateless logout acknowledgement; bearer tokens are not server-revoked.
pub async fn logout(Extension(_caller): Extension<AuthUser>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}

fn invalid_credentials() -> ApiError {
    error_response(StatusCode::UNAUTHORIZED, "Invalid email or password")
}

fn db_error(err: DatabaseError) -> ApiError {
    trading_error(err.into())
}
