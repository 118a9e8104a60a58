use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::db;

/// Health check endpoint
///
/// Returns the status of the API and its database, with a timestamp.
/// Responds 503 when the database does not answer.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service and database are up"),
        (status = 503, description = "Database unavailable")
    )
)]
#[get("/health")]
pub async fn health(pool: web::Data<SqlitePool>) -> impl Responder {
    match db::ping(&pool).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "database": "ok",
            "timestamp": Utc::now()
        })),
        Err(e) => {
            log::error!("health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "error",
                "database": "unavailable",
                "timestamp": Utc::now()
            }))
        }
    }
}
