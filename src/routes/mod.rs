pub mod admin;
pub mod auth;
pub mod health;
pub mod pages;
pub mod tasks;
pub mod users;

use actix_web::web;

use crate::auth::AuthMiddleware;

/// Registers the JSON API under `/api`, behind bearer-token authentication.
pub fn api_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .wrap(AuthMiddleware)
            .service(
                web::scope("/users")
                    .service(users::list_users)
                    .service(users::create_user)
                    .service(users::get_user)
                    .service(users::update_user)
                    .service(users::delete_user),
            )
            .service(
                web::scope("/tasks")
                    .service(tasks::list_tasks)
                    .service(tasks::create_task)
                    .service(tasks::get_task)
                    .service(tasks::update_task)
                    .service(tasks::delete_task),
            )
            .service(
                web::scope("/token")
                    .service(auth::obtain_token)
                    .service(auth::refresh_token),
            ),
    );
}

/// Registers the staff-only admin site under `/admin`.
pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(admin::login_page)
            .service(admin::login)
            .service(admin::logout)
            .service(admin::dashboard)
            .service(admin::user_list)
            .service(admin::user_edit_page)
            .service(admin::user_edit)
            .service(admin::user_delete)
            .service(admin::task_list)
            .service(admin::task_edit_page)
            .service(admin::task_edit)
            .service(admin::task_delete),
    );
}

/// Registers the HTML pages, API documentation and health check.
pub fn pages_config(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(pages::index)
        .service(pages::task_description)
        .service(pages::swagger_ui)
        .service(pages::redoc)
        .service(pages::openapi_json);
}
