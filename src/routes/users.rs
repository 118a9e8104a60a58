use crate::{
    auth::{AuthSettings, AuthenticatedUser},
    error::AppError,
    models::{User, UserInput, UserQuery, UserResponse},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use sqlx::SqlitePool;

fn user_not_found() -> AppError {
    AppError::NotFound("Not found.".into())
}

fn ensure_can_manage(caller: &AuthenticatedUser, target_id: i64) -> Result<(), AppError> {
    if caller.0.can_manage(target_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action.".into(),
        ))
    }
}

/// Registers a new account. Open to anonymous callers.
#[utoipa::path(
    post,
    path = "/api/users/",
    tag = "users",
    request_body = UserInput,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Errors keyed by field")
    )
)]
#[post("/")]
pub async fn create_user(
    pool: web::Data<SqlitePool>,
    settings: web::Data<AuthSettings>,
    user_data: web::Json<UserInput>,
) -> Result<impl Responder, AppError> {
    let fields = user_data.into_inner().into_fields()?;
    let user = User::create_user(
        &pool,
        &fields.email,
        &fields.name,
        &fields.password,
        settings.bcrypt_cost,
    )
    .await?;
    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

/// Lists all users, optionally filtered by `search` over name and email.
#[utoipa::path(
    get,
    path = "/api/users/",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "All users", body = [UserResponse]),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[get("/")]
pub async fn list_users(
    pool: web::Data<SqlitePool>,
    query: web::Query<UserQuery>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let users = User::list(&pool, query.search.as_deref(), None, None).await?;
    let users: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = []))
)]
#[get("/{id}/")]
pub async fn get_user(
    pool: web::Data<SqlitePool>,
    user_id: web::Path<i64>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = User::find_by_id(&pool, user_id.into_inner())
        .await?
        .ok_or_else(user_not_found)?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// Replaces name, email and password. Only the user themselves or staff may do this.
#[utoipa::path(
    put,
    path = "/api/users/{id}/",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserInput,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Errors keyed by field"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not the user and not staff"),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = []))
)]
#[put("/{id}/")]
pub async fn update_user(
    pool: web::Data<SqlitePool>,
    settings: web::Data<AuthSettings>,
    user_id: web::Path<i64>,
    user_data: web::Json<UserInput>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user_id = user_id.into_inner();
    User::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(user_not_found)?;
    ensure_can_manage(&caller, user_id)?;

    let fields = user_data.into_inner().into_fields()?;
    let user = User::update(&pool, user_id, &fields, settings.bcrypt_cost).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

/// Deletes an account together with its tasks.
#[utoipa::path(
    delete,
    path = "/api/users/{id}/",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User and their tasks deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not the user and not staff"),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/{id}/")]
pub async fn delete_user(
    pool: web::Data<SqlitePool>,
    user_id: web::Path<i64>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user_id = user_id.into_inner();
    User::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(user_not_found)?;
    ensure_can_manage(&caller, user_id)?;

    User::delete(&pool, user_id).await?;
    log::info!("user {} deleted by {}", user_id, caller.id());
    Ok(HttpResponse::NoContent().finish())
}
