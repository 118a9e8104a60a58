use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use crate::auth::token::{verify_token, TokenType};
use crate::auth::AuthSettings;
use crate::error::AppError;

/// Bearer-token authentication for the `/api` scope.
///
/// A valid access token puts its `Claims` into the request extensions. A request
/// without an `Authorization` header passes through anonymously; handlers that
/// need a user reject it through the `AuthenticatedUser` extractor. A header that
/// is present but malformed, expired or not an access token is rejected here.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

/// Pulls the token out of `Authorization: Bearer <token>`.
///
/// `Ok(None)` means no header; a header with another scheme is an error.
fn bearer_token(req: &ServiceRequest) -> Result<Option<String>, AppError> {
    let value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim().to_string()))
        }
        _ => Err(AppError::Unauthorized(
            "Authorization header must contain two space-delimited values: Bearer <token>".into(),
        )),
    }
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = bearer_token(&req).and_then(|token| match token {
            None => Ok(None),
            Some(token) => {
                let settings = req.app_data::<web::Data<AuthSettings>>().ok_or_else(|| {
                    AppError::InternalServerError("Authentication is not configured".into())
                })?;
                verify_token(settings, &token, TokenType::Access).map(Some)
            }
        });

        match claims {
            Ok(claims) => {
                if let Some(claims) = claims {
                    req.extensions_mut().insert(claims);
                }
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(app_err) => {
                log::debug!("rejected credentials on {}: {}", req.path(), app_err);
                let response = req.error_response(app_err).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}
