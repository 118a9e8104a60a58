use actix_web::{get, http::header::ContentType, HttpResponse, Responder};
use askama::Template;
use utoipa::OpenApi;

use crate::docs::ApiDoc;
use crate::error::AppError;

const OPENAPI_URL: &str = "/openapi.json";

#[derive(Template)]
#[template(path = "index.html")]
struct IndexPage;

#[derive(Template)]
#[template(path = "task_description.html")]
struct TaskDescriptionPage;

#[derive(Template)]
#[template(path = "swagger.html")]
struct SwaggerPage<'a> {
    openapi_url: &'a str,
}

#[derive(Template)]
#[template(path = "redoc.html")]
struct RedocPage<'a> {
    openapi_url: &'a str,
}

/// Renders a template into a `text/html` response.
pub(crate) fn html<T: Template>(template: &T) -> Result<HttpResponse, AppError> {
    let body = template.render()?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body))
}

#[get("/")]
pub async fn index() -> Result<impl Responder, AppError> {
    html(&IndexPage)
}

#[get("/task_description/")]
pub async fn task_description() -> Result<impl Responder, AppError> {
    html(&TaskDescriptionPage)
}

/// Swagger UI over `/openapi.json`.
#[get("/docs/")]
pub async fn swagger_ui() -> Result<impl Responder, AppError> {
    html(&SwaggerPage {
        openapi_url: OPENAPI_URL,
    })
}

#[get("/redoc/")]
pub async fn redoc() -> Result<impl Responder, AppError> {
    html(&RedocPage {
        openapi_url: OPENAPI_URL,
    })
}

#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}
