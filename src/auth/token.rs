use crate::error::AppError;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthSettings;

/// Distinguishes short-lived access tokens from the refresh tokens that mint them.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Represents the claims encoded within a JWT.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub token_type: TokenType,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Unique token identifier.
    pub jti: String,
    pub user_id: i64,
}

/// HS256 signing and verification keys derived from one shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

/// Generates a signed JWT of the given type for `user_id`.
///
/// Access tokens live for `settings.access_token_lifetime`, refresh tokens for
/// `settings.refresh_token_lifetime`.
pub fn generate_token(
    settings: &AuthSettings,
    user_id: i64,
    token_type: TokenType,
) -> Result<String, AppError> {
    let lifetime = match token_type {
        TokenType::Access => settings.access_token_lifetime,
        TokenType::Refresh => settings.refresh_token_lifetime,
    };
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(lifetime)
        .ok_or_else(|| AppError::InternalServerError("Token lifetime out of range".into()))?;

    let claims = Claims {
        token_type,
        exp: expiration.timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: Uuid::new_v4().simple().to_string(),
        user_id,
    };

    encode(&Header::default(), &claims, &settings.keys.encoding_key)
        .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
}

/// Verifies signature and expiry and checks the token is of the `expected` type.
///
/// Every failure is reported as `AppError::Unauthorized`.
pub fn verify_token(
    settings: &AuthSettings,
    token: &str,
    expected: TokenType,
) -> Result<Claims, AppError> {
    let claims = decode::<Claims>(token, &settings.keys.decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    if claims.token_type != expected {
        return Err(AppError::Unauthorized("Token has wrong type".to_string()));
    }
    Ok(claims)
}
