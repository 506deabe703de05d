//! Bearer-token authentication.
//!
//! Tokens are stateless JWTs signed with the configured secret; the
//! middleware validates the `Authorization: Bearer` header and injects the
//! caller's identity into request extensions for handlers to pick up.
//! Passwords are hashed with Argon2id in PHC string format.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::application::AppState;
use crate::domain::errors::TradingError;

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller, available to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: String,
}

/// Issue an access token for a user.
pub fn issue_token(
    user_id: &str,
    role: &str,
    secret: &str,
    ttl_days: i64,
) -> Result<String, TradingError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(ttl_days)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TradingError::Configuration {
        reason: format!("failed to sign access token: {}", e),
    })
}

/// Validate a token and return its claims, or `None` when the token is
/// invalid, expired or tampered with.
pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, TradingError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TradingError::Configuration {
            reason: format!("failed to hash password: {}", e),
        })
}

/// Verify a password against a stored PHC hash string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Middleware guarding protected endpoints.
///
/// Expects `Authorization: Bearer <token>`; on success the request gains an
/// [`AuthUser`] extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(auth) if auth.starts_with("Bearer ") => {
            let token = &auth[7..];
            match verify_token(token, &state.config.jwt_secret) {
                Some(claims) => {
                    request.extensions_mut().insert(AuthUser {
                        user_id: claims.sub,
                        role: claims.role,
                    });
                    Ok(next.run(request).await)
                }
                None => {
                    tracing::warn!("Rejected invalid or expired access token");
                    Err(StatusCode::UNAUTHORIZED)
                }
            }
        }
        Some(_) => {
            tracing::warn!("Invalid Authorization header format (expected Bearer token)");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-test-secret-test-secret!!";

    #[test]
    fn test_token_round_trip() {
        let token = issue_token("u1", "user", SECRET, 7).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let token = issue_token("u1", "user", SECRET, 7).unwrap();
        assert!(verify_token(&token, "another-secret-another-secret!!!!").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token("u1", "user", SECRET, -1).unwrap();
        assert!(verify_token(&token, SECRET).is_none());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_token("not.a.token", SECRET).is_none());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn test_verify_against_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
