//!
//! # Custom Error Handling
//!
//! This module defines the `AppError` type used throughout the application.
//! Handlers return `Result<_, AppError>` and rely on the `ResponseError`
//! implementation to turn failures into JSON responses.
//!
//! Validation failures are rendered keyed by field name, e.g.
//! `{"email": ["Enter a valid email address."]}`; every other error is rendered
//! as `{"detail": "..."}`.

use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::{header, StatusCode},
    HttpRequest, HttpResponse, ResponseError,
};
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use std::fmt;
use validator::{ValidationError, ValidationErrors};

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Authentication is missing or invalid (HTTP 401).
    Unauthorized(String),
    /// The caller is authenticated but not allowed to perform the action (HTTP 403).
    Forbidden(String),
    /// Malformed request that is not tied to a single field (HTTP 400).
    BadRequest(String),
    /// The requested resource does not exist or is not visible to the caller (HTTP 404).
    NotFound(String),
    /// Field-level validation failures (HTTP 400), rendered keyed by field.
    ValidationError(ValidationErrors),
    /// A dependency such as the database is unreachable (HTTP 503).
    ServiceUnavailable(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error originating from database operations (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    /// Builds a validation error for a single field.
    pub fn field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Borrowed(message));
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        AppError::ValidationError(errors)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::ValidationError(errors) => write!(f, "Validation Error: {}", errors),
            AppError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Default human readable message for validator codes that carry none.
fn default_message(code: &str) -> String {
    match code {
        "required" => "This field is required.".to_string(),
        "email" => "Enter a valid email address.".to_string(),
        "length" => "Ensure this field has a valid length.".to_string(),
        other => format!("Invalid value ({}).", other),
    }
}

/// Renders validation errors as `{field: [messages]}`.
pub fn validation_body(errors: &ValidationErrors) -> Value {
    let mut body = Map::new();
    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors
            .iter()
            .map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => default_message(&e.code),
            })
            .map(Value::String)
            .collect();
        body.insert(field.to_string(), Value::Array(messages));
    }
    Value::Object(body)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthorized(msg) => HttpResponse::Unauthorized()
                .insert_header((header::WWW_AUTHENTICATE, "Bearer realm=\"api\""))
                .json(json!({ "detail": msg })),
            AppError::ValidationError(errors) => {
                HttpResponse::BadRequest().json(validation_body(errors))
            }
            // Database details stay in the logs.
            AppError::DatabaseError(msg) => {
                log::error!("database error: {}", msg);
                HttpResponse::InternalServerError()
                    .json(json!({ "detail": "A server error occurred." }))
            }
            AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::InternalServerError(msg) => {
                HttpResponse::build(self.status_code()).json(json!({ "detail": msg }))
            }
        }
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes a 404; everything else is a database error.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Not found.".into()),
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> AppError {
        AppError::DatabaseError(error.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        AppError::ValidationError(errors)
    }
}

/// JWT processing failures are authentication failures.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

impl From<askama::Error> for AppError {
    fn from(error: askama::Error) -> AppError {
        AppError::InternalServerError(format!("Failed to render template: {}", error))
    }
}

/// Error handler for `web::JsonConfig`: malformed bodies become `{"detail"}` 400s.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("JSON parse error - {}", err)).into()
}

/// Error handler for `web::QueryConfig`, e.g. an unknown `status` filter value.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query parameters - {}", err)).into()
}

/// Error handler for `web::PathConfig`: ids that do not parse cannot match a row.
pub fn path_error_handler(_err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::NotFound("Not found.".into()).into()
}
