#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{http::header, test, web, App};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use task_manager::auth::TokenPair;
use task_manager::{configure_app, db, AuthSettings};

pub const PASSWORD: &str = "password123";
const BCRYPT_COST: u32 = 4;

pub fn auth_settings() -> AuthSettings {
    AuthSettings::new("integration-test-secret", 60, 1440, BCRYPT_COST)
}

pub async fn test_pool() -> SqlitePool {
    let pool = db::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to open in-memory database");
    db::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

/// The full application over `pool`, as the binary builds it.
pub async fn init_app(
    pool: SqlitePool,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(pool))
            .app_data(web::Data::new(auth_settings()))
            .wrap(Logger::default())
            .configure(configure_app),
    )
    .await
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

/// Registers through `POST /api/users/` and returns the response body.
pub async fn register_user(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
    email: &str,
) -> Value {
    let req = test::TestRequest::post()
        .uri("/api/users/")
        .set_json(json!({ "name": name, "email": email, "password": PASSWORD }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    assert_eq!(
        status,
        actix_web::http::StatusCode::CREATED,
        "Registration failed. Body: {:?}",
        String::from_utf8_lossy(&body)
    );
    serde_json::from_slice(&body).expect("Failed to parse registration response")
}

pub async fn obtain_tokens(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    email: &str,
    password: &str,
) -> TokenPair {
    let req = test::TestRequest::post()
        .uri("/api/token/")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert!(resp.status().is_success(), "Token request failed: {}", resp.status());
    test::read_body_json(resp).await
}

/// Registers a user and logs them in; returns `(user id, access token)`.
pub async fn login_new_user(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
    email: &str,
) -> (i64, String) {
    let user = register_user(app, name, email).await;
    let tokens = obtain_tokens(app, email, PASSWORD).await;
    let id = user["id"].as_i64().expect("user id");
    (id, tokens.access)
}
