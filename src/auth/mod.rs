pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::config::Config;

pub use extractors::AuthenticatedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{generate_token, verify_token, Claims, JwtKeys, TokenType};

/// Shared authentication settings, registered as `web::Data<AuthSettings>`.
#[derive(Clone)]
pub struct AuthSettings {
    pub keys: JwtKeys,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    pub fn new(
        secret: &str,
        access_token_lifetime_minutes: i64,
        refresh_token_lifetime_minutes: i64,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            keys: JwtKeys::from_secret(secret.as_bytes()),
            access_token_lifetime: Duration::minutes(access_token_lifetime_minutes),
            refresh_token_lifetime: Duration::minutes(refresh_token_lifetime_minutes),
            bcrypt_cost,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_lifetime_minutes,
            config.refresh_token_lifetime_minutes,
            config.bcrypt_cost,
        )
    }
}

/// Credentials for `POST /api/token/`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct TokenObtainRequest {
    #[validate(required(message = "This field is required."))]
    pub email: Option<String>,
    #[validate(required(message = "This field is required."))]
    pub password: Option<String>,
}

/// Access/refresh pair returned on login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Payload for `POST /api/token/refresh/`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct TokenRefreshRequest {
    #[validate(required(message = "This field is required."))]
    pub refresh: Option<String>,
}

/// A freshly minted access token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessToken {
    pub access: String,
}
