//! OpenAPI document assembled from the `#[utoipa::path]` annotations on the handlers.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::{AccessToken, TokenObtainRequest, TokenPair, TokenRefreshRequest};
use crate::models::{Task, TaskInput, TaskStatus, UserInput, UserResponse};
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Task Manager API",
        version = "v1",
        description = "Users, their tasks and JWT authentication."
    ),
    paths(
        routes::users::create_user,
        routes::users::list_users,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::tasks::list_tasks,
        routes::tasks::create_task,
        routes::tasks::get_task,
        routes::tasks::update_task,
        routes::tasks::delete_task,
        routes::auth::obtain_token,
        routes::auth::refresh_token,
        routes::health::health,
    ),
    components(schemas(
        UserInput,
        UserResponse,
        Task,
        TaskInput,
        TaskStatus,
        TokenObtainRequest,
        TokenPair,
        TokenRefreshRequest,
        AccessToken,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "Registration and account management"),
        (name = "tasks", description = "Tasks of the authenticated user"),
        (name = "auth", description = "JWT token pair issuance"),
        (name = "health", description = "Liveness and database status")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected operations.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
