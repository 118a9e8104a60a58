use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::borrow::Cow;
use std::fmt;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// The closed set of task states. Any state may follow any other.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, ToSchema)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "новая")]
    #[sqlx(rename = "новая")]
    New,
    #[serde(rename = "в процессе")]
    #[sqlx(rename = "в процессе")]
    InProgress,
    #[serde(rename = "завершена")]
    #[sqlx(rename = "завершена")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::New, TaskStatus::InProgress, TaskStatus::Completed];

    /// The stored and serialized value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "новая",
            TaskStatus::InProgress => "в процессе",
            TaskStatus::Completed => "завершена",
        }
    }

    pub fn parse(value: &str) -> Option<TaskStatus> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as stored and as returned by the API. `user` is the owner's id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    #[sqlx(rename = "user_id")]
    pub user: i64,
}

/// Payload for creating (POST) or replacing (PUT) a task.
///
/// The owner is never taken from the payload; a `user` field is ignored.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct TaskInput {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 200, message = "Ensure this field has between 1 and 200 characters.")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "This field is required."),
        length(min = 1, message = "This field may not be blank.")
    )]
    pub description: Option<String>,
    /// Defaults to "новая".
    #[validate(custom = "validate_status")]
    #[schema(value_type = Option<TaskStatus>)]
    pub status: Option<String>,
}

fn validate_status(value: &str) -> Result<(), ValidationError> {
    match TaskStatus::parse(value) {
        Some(_) => Ok(()),
        None => {
            let mut error = ValidationError::new("choice");
            error.message = Some(Cow::Owned(format!("\"{}\" is not a valid choice.", value)));
            Err(error)
        }
    }
}

/// Validated task fields.
#[derive(Debug, Clone)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

impl TaskInput {
    pub fn into_fields(self) -> Result<TaskFields, AppError> {
        self.validate()?;
        Ok(TaskFields {
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .and_then(TaskStatus::parse)
                .unwrap_or_default(),
        })
    }
}

/// Query parameters for listing tasks.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    /// Only tasks in this state.
    pub status: Option<TaskStatus>,
    /// Substring matched against title and description.
    pub search: Option<String>,
}

/// A task joined with its owner's email, for the admin list.
#[derive(Debug, Clone, FromRow)]
pub struct TaskWithOwner {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub user_id: i64,
    pub owner_email: String,
}

const TASK_COLUMNS: &str = "id, title, description, status, user_id";

impl Task {
    /// Lists the tasks owned by `user_id`, ordered by id.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: i64,
        query: &TaskQuery,
    ) -> Result<Vec<Task>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM tasks WHERE user_id = ",
            TASK_COLUMNS
        ));
        builder.push_bind(user_id);
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", term);
            builder
                .push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR description LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(" ORDER BY id");

        let tasks = builder.build_query_as::<Task>().fetch_all(pool).await?;
        Ok(tasks)
    }

    /// Creates a task owned by `user_id`.
    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        fields: &TaskFields,
    ) -> Result<Task, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (title, description, status, user_id) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.status)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(task)
    }

    /// Fetches a task only if it belongs to `user_id`.
    pub async fn find_owned(
        pool: &SqlitePool,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(task)
    }

    /// Replaces the fields of a task owned by `user_id`; `None` if no such task.
    pub async fn update_owned(
        pool: &SqlitePool,
        id: i64,
        user_id: i64,
        fields: &TaskFields,
    ) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET title = $1, description = $2, status = $3 \
             WHERE id = $4 AND user_id = $5 RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.status)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(task)
    }

    /// Deletes a task owned by `user_id`; returns whether a row was removed.
    pub async fn delete_owned(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {} FROM tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(task)
    }

    /// Admin edit: fields plus owner reassignment.
    pub async fn update_with_owner(
        pool: &SqlitePool,
        id: i64,
        fields: &TaskFields,
        user_id: i64,
    ) -> Result<Option<Task>, AppError> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET title = $1, description = $2, status = $3, user_id = $4 \
             WHERE id = $5 RETURNING {}",
            TASK_COLUMNS
        ))
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.status)
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(task)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All tasks with owner emails, searched over title, description and owner email.
    pub async fn list_with_owner(
        pool: &SqlitePool,
        search: Option<&str>,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskWithOwner>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT t.id, t.title, t.description, t.status, t.user_id, u.email AS owner_email \
             FROM tasks t JOIN users u ON u.id = t.user_id WHERE 1 = 1",
        );
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", term);
            builder
                .push(" AND (t.title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.description LIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.email LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = status {
            builder.push(" AND t.status = ").push_bind(status);
        }
        builder.push(" ORDER BY t.id");

        let tasks = builder
            .build_query_as::<TaskWithOwner>()
            .fetch_all(pool)
            .await?;
        Ok(tasks)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}
