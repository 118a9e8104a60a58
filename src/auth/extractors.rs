use actix_web::dev::Payload;
use actix_web::{web, Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use sqlx::SqlitePool;

use crate::auth::Claims;
use crate::error::AppError;
use crate::models::User;

/// The account behind the request's access token.
///
/// Relies on `AuthMiddleware` having put `Claims` into the request extensions.
/// Anonymous requests, and tokens whose account was deleted or deactivated,
/// are rejected with `AppError::Unauthorized`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        let pool = req.app_data::<web::Data<SqlitePool>>().cloned();

        Box::pin(async move {
            let claims = claims.ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided.".into())
            })?;
            let pool = pool.ok_or_else(|| {
                AppError::InternalServerError("Database pool is not configured".into())
            })?;

            match User::find_by_id(&pool, claims.user_id).await? {
                Some(user) if user.is_active => Ok(AuthenticatedUser(user)),
                Some(_) => Err(AppError::Unauthorized("User is inactive".into()).into()),
                None => Err(AppError::Unauthorized("User not found".into()).into()),
            }
        })
    }
}
