//! Staff-only HTML administration for users and tasks.
//!
//! The session is an access token kept in an HttpOnly cookie scoped to `/admin`.
//! Any request without a valid staff session is redirected to the login page.

use actix_web::{
    cookie::{Cookie, SameSite},
    dev::Payload,
    error::InternalError,
    get,
    http::header,
    post, web, Error as ActixError, FromRequest, HttpRequest, HttpResponse, Responder,
};
use askama::Template;
use futures::future::LocalBoxFuture;
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::auth::{generate_token, verify_token, AuthSettings, TokenType};
use crate::error::{validation_body, AppError};
use crate::models::{Task, TaskFields, TaskInput, TaskStatus, TaskWithOwner, User};
use crate::routes::pages::html;

pub const SESSION_COOKIE: &str = "admin_session";
const LOGIN_URL: &str = "/admin/login/";

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn login_redirect() -> ActixError {
    InternalError::from_response("staff login required", redirect(LOGIN_URL)).into()
}

/// Flattens keyed validation errors into "field: message" lines for display.
fn error_lines(err: AppError) -> Result<Vec<String>, AppError> {
    let errors = match err {
        AppError::ValidationError(errors) => errors,
        other => return Err(other),
    };
    let body = validation_body(&errors);
    let mut lines = Vec::new();
    if let Some(fields) = body.as_object() {
        for (field, messages) in fields {
            for message in messages.as_array().into_iter().flatten() {
                lines.push(format!("{}: {}", field, message.as_str().unwrap_or_default()));
            }
        }
    }
    Ok(lines)
}

/// `"1"`/`"true"` and `"0"`/`"false"`; anything else means no filter.
fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value {
        Some("1") | Some("true") => Some(true),
        Some("0") | Some("false") => Some(false),
        _ => None,
    }
}

/// An active staff account with a valid admin session cookie.
pub struct StaffUser(pub User);

impl FromRequest for StaffUser {
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let pool = req.app_data::<web::Data<SqlitePool>>().cloned();
        let settings = req.app_data::<web::Data<AuthSettings>>().cloned();

        Box::pin(async move {
            let (pool, settings) = match (pool, settings) {
                (Some(pool), Some(settings)) => (pool, settings),
                _ => {
                    return Err(AppError::InternalServerError(
                        "Admin site is not configured".into(),
                    )
                    .into())
                }
            };
            let token = token.ok_or_else(login_redirect)?;
            let claims = verify_token(&settings, &token, TokenType::Access)
                .map_err(|_| login_redirect())?;

            match User::find_by_id(&pool, claims.user_id).await? {
                Some(user) if user.is_active && user.is_staff => Ok(StaffUser(user)),
                _ => Err(login_redirect()),
            }
        })
    }
}

#[derive(Template)]
#[template(path = "admin/login.html")]
struct LoginPage<'a> {
    email: &'a str,
    error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "admin/index.html")]
struct DashboardPage<'a> {
    admin: &'a User,
    user_count: i64,
    task_count: i64,
}

#[derive(Template)]
#[template(path = "admin/users.html")]
struct UsersPage<'a> {
    admin: &'a User,
    users: &'a [User],
    q: &'a str,
    is_active: &'a str,
    is_staff: &'a str,
}

#[derive(Template)]
#[template(path = "admin/user_form.html")]
struct UserFormPage<'a> {
    admin: &'a User,
    form: &'a UserForm,
    id: i64,
    errors: &'a [String],
}

#[derive(Template)]
#[template(path = "admin/tasks.html")]
struct TasksPage<'a> {
    admin: &'a User,
    tasks: &'a [TaskWithOwner],
    q: &'a str,
    status: &'a str,
    statuses: [TaskStatus; 3],
}

#[derive(Template)]
#[template(path = "admin/task_form.html")]
struct TaskFormPage<'a> {
    admin: &'a User,
    form: &'a TaskForm,
    id: i64,
    errors: &'a [String],
    statuses: [TaskStatus; 3],
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct UserFilter {
    pub q: Option<String>,
    pub is_active: Option<String>,
    pub is_staff: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskFilter {
    pub q: Option<String>,
    pub status: Option<String>,
}

/// Edit form for a user. Unchecked checkboxes are absent from the submission.
#[derive(Debug, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub is_active: Option<String>,
    pub is_staff: Option<String>,
}

impl From<&User> for UserForm {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            is_active: user.is_active.then(|| "on".to_string()),
            is_staff: user.is_staff.then(|| "on".to_string()),
        }
    }
}

/// Edit form for a task. The owner is entered as a raw user id.
#[derive(Debug, Deserialize)]
pub struct TaskForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub user: String,
}

impl From<&Task> for TaskForm {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            user: task.user.to_string(),
        }
    }
}

#[get("/login/")]
pub async fn login_page() -> Result<impl Responder, AppError> {
    html(&LoginPage {
        email: "",
        error: None,
    })
}

#[post("/login/")]
pub async fn login(
    pool: web::Data<SqlitePool>,
    settings: web::Data<AuthSettings>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let user = match User::authenticate(&pool, &form.email, &form.password).await? {
        Some(user) if user.is_staff => user,
        _ => {
            log::warn!("rejected admin login for {}", form.email);
            return html(&LoginPage {
                email: &form.email,
                error: Some("Please enter the correct email and password for a staff account."),
            });
        }
    };
    User::touch_last_login(&pool, user.id).await?;

    let token = generate_token(&settings, user.id, TokenType::Access)?;
    let cookie = Cookie::build(SESSION_COOKIE, token)
        .path("/admin")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish();

    log::info!("admin login for user {}", user.id);
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/admin/"))
        .cookie(cookie)
        .finish())
}

#[post("/logout/")]
pub async fn logout() -> impl Responder {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/admin").finish();
    cookie.make_removal();
    HttpResponse::Found()
        .insert_header((header::LOCATION, LOGIN_URL))
        .cookie(cookie)
        .finish()
}

#[get("/")]
pub async fn dashboard(
    pool: web::Data<SqlitePool>,
    staff: StaffUser,
) -> Result<impl Responder, AppError> {
    html(&DashboardPage {
        admin: &staff.0,
        user_count: User::count(&pool).await?,
        task_count: Task::count(&pool).await?,
    })
}

#[get("/users/")]
pub async fn user_list(
    pool: web::Data<SqlitePool>,
    filter: web::Query<UserFilter>,
    staff: StaffUser,
) -> Result<impl Responder, AppError> {
    let users = User::list(
        &pool,
        filter.q.as_deref(),
        parse_flag(filter.is_active.as_deref()),
        parse_flag(filter.is_staff.as_deref()),
    )
    .await?;

    html(&UsersPage {
        admin: &staff.0,
        users: &users,
        q: filter.q.as_deref().unwrap_or_default(),
        is_active: filter.is_active.as_deref().unwrap_or_default(),
        is_staff: filter.is_staff.as_deref().unwrap_or_default(),
    })
}

#[get("/users/{id}/")]
pub async fn user_edit_page(
    pool: web::Data<SqlitePool>,
    user_id: web::Path<i64>,
    staff: StaffUser,
) -> Result<impl Responder, AppError> {
    let user_id = user_id.into_inner();
    let user = User::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".into()))?;

    html(&UserFormPage {
        admin: &staff.0,
        form: &UserForm::from(&user),
        id: user_id,
        errors: &[],
    })
}

#[post("/users/{id}/")]
pub async fn user_edit(
    pool: web::Data<SqlitePool>,
    user_id: web::Path<i64>,
    form: web::Form<UserForm>,
    staff: StaffUser,
) -> Result<HttpResponse, AppError> {
    let user_id = user_id.into_inner();
    User::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".into()))?;

    let form = form.into_inner();
    let errors = match validate_user_form(&form) {
        Ok(()) => {
            match User::update_profile(
                &pool,
                user_id,
                form.name.trim(),
                &form.email,
                form.is_active.is_some(),
                form.is_staff.is_some(),
            )
            .await
            {
                Ok(user) => {
                    log::info!("user {} edited by admin {}", user.id, staff.0.id);
                    return Ok(redirect("/admin/users/"));
                }
                Err(err) => error_lines(err)?,
            }
        }
        Err(err) => error_lines(err)?,
    };

    html(&UserFormPage {
        admin: &staff.0,
        form: &form,
        id: user_id,
        errors: &errors,
    })
}

fn validate_user_form(form: &UserForm) -> Result<(), AppError> {
    let name = form.name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::field(
            "name",
            "length",
            "Ensure this field has between 1 and 100 characters.",
        ));
    }
    if !validator::validate_email(form.email.trim()) {
        return Err(AppError::field("email", "email", "Enter a valid email address."));
    }
    Ok(())
}

#[post("/users/{id}/delete/")]
pub async fn user_delete(
    pool: web::Data<SqlitePool>,
    user_id: web::Path<i64>,
    staff: StaffUser,
) -> Result<HttpResponse, AppError> {
    let user_id = user_id.into_inner();
    if !User::delete(&pool, user_id).await? {
        return Err(AppError::NotFound("Not found.".into()));
    }
    log::info!("user {} deleted by admin {}", user_id, staff.0.id);
    Ok(redirect("/admin/users/"))
}

#[get("/tasks/")]
pub async fn task_list(
    pool: web::Data<SqlitePool>,
    filter: web::Query<TaskFilter>,
    staff: StaffUser,
) -> Result<impl Responder, AppError> {
    let status = filter.status.as_deref().and_then(TaskStatus::parse);
    let tasks = Task::list_with_owner(&pool, filter.q.as_deref(), status).await?;

    html(&TasksPage {
        admin: &staff.0,
        tasks: &tasks,
        q: filter.q.as_deref().unwrap_or_default(),
        status: status.map(|s| s.as_str()).unwrap_or_default(),
        statuses: TaskStatus::ALL,
    })
}

#[get("/tasks/{id}/")]
pub async fn task_edit_page(
    pool: web::Data<SqlitePool>,
    task_id: web::Path<i64>,
    staff: StaffUser,
) -> Result<impl Responder, AppError> {
    let task_id = task_id.into_inner();
    let task = Task::find_by_id(&pool, task_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".into()))?;

    html(&TaskFormPage {
        admin: &staff.0,
        form: &TaskForm::from(&task),
        id: task_id,
        errors: &[],
        statuses: TaskStatus::ALL,
    })
}

/// Checks the task form and resolves the owner id against existing users.
async fn task_form_fields(
    pool: &SqlitePool,
    form: &TaskForm,
) -> Result<(TaskFields, i64), AppError> {
    let input = TaskInput {
        title: Some(form.title.clone()),
        description: Some(form.description.clone()),
        status: Some(form.status.clone()),
    };
    input.validate()?;

    let owner = match form.user.trim().parse::<i64>() {
        Ok(id) => User::find_by_id(pool, id).await?,
        Err(_) => None,
    };
    let owner = owner.ok_or_else(|| AppError::field("user", "invalid", "Select a valid user."))?;

    Ok((input.into_fields()?, owner.id))
}

#[post("/tasks/{id}/")]
pub async fn task_edit(
    pool: web::Data<SqlitePool>,
    task_id: web::Path<i64>,
    form: web::Form<TaskForm>,
    staff: StaffUser,
) -> Result<HttpResponse, AppError> {
    let task_id = task_id.into_inner();
    Task::find_by_id(&pool, task_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".into()))?;

    let form = form.into_inner();
    let errors = match task_form_fields(&pool, &form).await {
        Ok((fields, owner_id)) => {
            Task::update_with_owner(&pool, task_id, &fields, owner_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Not found.".into()))?;
            log::info!("task {} edited by admin {}", task_id, staff.0.id);
            return Ok(redirect("/admin/tasks/"));
        }
        Err(err) => error_lines(err)?,
    };

    html(&TaskFormPage {
        admin: &staff.0,
        form: &form,
        id: task_id,
        errors: &errors,
        statuses: TaskStatus::ALL,
    })
}

#[post("/tasks/{id}/delete/")]
pub async fn task_delete(
    pool: web::Data<SqlitePool>,
    task_id: web::Path<i64>,
    staff: StaffUser,
) -> Result<HttpResponse, AppError> {
    let task_id = task_id.into_inner();
    if !Task::delete(&pool, task_id).await? {
        return Err(AppError::NotFound("Not found.".into()));
    }
    log::info!("task {} deleted by admin {}", task_id, staff.0.id);
    Ok(redirect("/admin/tasks/"))
}
