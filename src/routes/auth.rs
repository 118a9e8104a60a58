use crate::{
    auth::{
        generate_token, verify_token, AccessToken, AuthSettings, TokenObtainRequest, TokenPair,
        TokenRefreshRequest, TokenType,
    },
    error::AppError,
    models::User,
};
use actix_web::{post, web, HttpResponse, Responder};
use sqlx::SqlitePool;
use validator::Validate;

/// Obtain a token pair
///
/// Exchanges email and password for an access token and a refresh token.
#[utoipa::path(
    post,
    path = "/api/token/",
    tag = "auth",
    request_body = TokenObtainRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = TokenPair),
        (status = 400, description = "Errors keyed by field"),
        (status = 401, description = "Wrong credentials or inactive account")
    )
)]
#[post("/")]
pub async fn obtain_token(
    pool: web::Data<SqlitePool>,
    settings: web::Data<AuthSettings>,
    credentials: web::Json<TokenObtainRequest>,
) -> Result<impl Responder, AppError> {
    credentials.validate()?;
    let credentials = credentials.into_inner();
    let email = credentials.email.unwrap_or_default();
    let password = credentials.password.unwrap_or_default();

    let user = match User::authenticate(&pool, &email, &password).await? {
        Some(user) => user,
        None => {
            log::warn!("rejected token request for {}", email);
            return Err(AppError::Unauthorized(
                "No active account found with the given credentials".into(),
            ));
        }
    };
    User::touch_last_login(&pool, user.id).await?;

    let pair = TokenPair {
        access: generate_token(&settings, user.id, TokenType::Access)?,
        refresh: generate_token(&settings, user.id, TokenType::Refresh)?,
    };
    log::info!("issued tokens for user {}", user.id);
    Ok(HttpResponse::Ok().json(pair))
}

/// Refresh an access token
///
/// Mints a new access token from a valid refresh token. Refresh tokens are not rotated.
#[utoipa::path(
    post,
    path = "/api/token/refresh/",
    tag = "auth",
    request_body = TokenRefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessToken),
        (status = 400, description = "Errors keyed by field"),
        (status = 401, description = "Invalid, expired or non-refresh token")
    )
)]
#[post("/refresh/")]
pub async fn refresh_token(
    settings: web::Data<AuthSettings>,
    payload: web::Json<TokenRefreshRequest>,
) -> Result<impl Responder, AppError> {
    payload.validate()?;
    let refresh = payload.into_inner().refresh.unwrap_or_default();

    let claims = verify_token(&settings, &refresh, TokenType::Refresh)?;
    let access = generate_token(&settings, claims.user_id, TokenType::Access)?;
    Ok(HttpResponse::Ok().json(AccessToken { access }))
}
