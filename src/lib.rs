#![doc = "The `task_manager` library crate."]
#![doc = ""]
#![doc = "Domain models, JWT authentication, routing, the admin site and error handling"]
#![doc = "for the task manager service. The binary (`main.rs`) builds the server from"]
#![doc = "`configure_app`; integration tests use the same function."]

pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod routes;

use actix_web::web;

pub use crate::auth::AuthSettings;
pub use crate::config::Config;
pub use crate::error::AppError;

/// Registers every route plus the extractor error handlers.
///
/// The caller supplies `web::Data<SqlitePool>` and `web::Data<AuthSettings>`.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
        .app_data(web::PathConfig::default().error_handler(error::path_error_handler))
        .configure(routes::api_config)
        .configure(routes::admin_config)
        .configure(routes::pages_config);
}
