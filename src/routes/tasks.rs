use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Task, TaskInput, TaskQuery},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sqlx::SqlitePool;

fn task_not_found() -> AppError {
    AppError::NotFound("Not found.".into())
}

/// Lists the caller's tasks.
///
/// Only tasks owned by the authenticated user are returned, ordered by id.
/// `status` narrows the list to one state and `search` matches a substring of
/// the title or description.
#[utoipa::path(
    get,
    path = "/api/tasks/",
    tag = "tasks",
    params(TaskQuery),
    responses(
        (status = 200, description = "The caller's tasks", body = [Task]),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[get("/")]
pub async fn list_tasks(
    pool: web::Data<SqlitePool>,
    query: web::Query<TaskQuery>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let tasks = Task::list_for_user(&pool, user.id(), &query).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a task owned by the caller.
///
/// A `user` field in the body is ignored; `status` defaults to "новая".
#[utoipa::path(
    post,
    path = "/api/tasks/",
    tag = "tasks",
    request_body = TaskInput,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Errors keyed by field"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[post("/")]
pub async fn create_task(
    pool: web::Data<SqlitePool>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let fields = task_data.into_inner().into_fields()?;
    let task = Task::create(&pool, user.id(), &fields).await?;
    log::debug!("user {} created task {}", user.id(), task.id);
    Ok(HttpResponse::Created().json(task))
}

/// Retrieves one of the caller's tasks. Tasks of other users are reported as missing.
#[utoipa::path(
    get,
    path = "/api/tasks/{id}/",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such task for the caller")
    ),
    security(("bearer_auth" = []))
)]
#[get("/{id}/")]
pub async fn get_task(
    pool: web::Data<SqlitePool>,
    task_id: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = Task::find_owned(&pool, task_id.into_inner(), user.id())
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Replaces title, description and status of one of the caller's tasks.
#[utoipa::path(
    put,
    path = "/api/tasks/{id}/",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskInput,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Errors keyed by field"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such task for the caller")
    ),
    security(("bearer_auth" = []))
)]
#[put("/{id}/")]
pub async fn update_task(
    pool: web::Data<SqlitePool>,
    task_id: web::Path<i64>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task_id = task_id.into_inner();
    if Task::find_owned(&pool, task_id, user.id()).await?.is_none() {
        return Err(task_not_found());
    }
    let fields = task_data.into_inner().into_fields()?;

    let task = Task::update_owned(&pool, task_id, user.id(), &fields)
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Deletes one of the caller's tasks.
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}/",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such task for the caller")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/{id}/")]
pub async fn delete_task(
    pool: web::Data<SqlitePool>,
    task_id: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    if !Task::delete_owned(&pool, task_id.into_inner(), user.id()).await? {
        return Err(task_not_found());
    }
    Ok(HttpResponse::NoContent().finish())
}
