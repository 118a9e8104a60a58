use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, name, email, password, is_active, is_staff, is_superuser, last_login";

/// A stored account. `password` holds the bcrypt hash and is never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
}

/// Public representation of a user.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Payload for creating (POST) or replacing (PUT) a user.
///
/// Fields are optional at the serde level so that a missing field surfaces as a
/// validation error keyed on that field rather than a generic parse error.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UserInput {
    #[validate(
        required(message = "This field is required."),
        length(min = 1, max = 100, message = "Ensure this field has between 1 and 100 characters.")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,
    /// Write-only; stored as a bcrypt hash.
    #[validate(
        required(message = "This field is required."),
        length(min = 8, max = 128, message = "Ensure this field has between 8 and 128 characters.")
    )]
    pub password: Option<String>,
}

/// Validated user fields.
#[derive(Debug)]
pub struct UserFields {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl UserInput {
    /// Validates the payload and returns its fields.
    pub fn into_fields(self) -> Result<UserFields, AppError> {
        self.validate()?;
        Ok(UserFields {
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        })
    }
}

/// Query parameters for listing users.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Case-insensitive substring matched against name and email.
    pub search: Option<String>,
}

/// Lower-cases the domain part of an address, leaving the local part untouched.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim())
}

fn email_taken() -> AppError {
    AppError::field("email", "unique", "user with this email already exists.")
}

/// Maps a UNIQUE violation on `users.email` to the same field error the
/// availability check returns; a concurrent writer can pass that check first.
fn map_email_conflict(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => email_taken(),
        _ => error.into(),
    }
}

impl User {
    /// Creates a regular account, hashing the password before it is stored.
    pub async fn create_user(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        password: &str,
        bcrypt_cost: u32,
    ) -> Result<User, AppError> {
        Self::insert(pool, email, name, password, bcrypt_cost, false).await
    }

    /// Creates an account with `is_staff` and `is_superuser` set.
    pub async fn create_superuser(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        password: &str,
        bcrypt_cost: u32,
    ) -> Result<User, AppError> {
        Self::insert(pool, email, name, password, bcrypt_cost, true).await
    }

    async fn insert(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        password: &str,
        bcrypt_cost: u32,
        elevated: bool,
    ) -> Result<User, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::field(
                "email",
                "required",
                "This field is required.",
            ));
        }
        let email = normalize_email(email);
        Self::ensure_email_available(pool, &email, None).await?;

        let password_hash = hash_password(password, bcrypt_cost)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password, is_staff, is_superuser) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(name)
        .bind(&email)
        .bind(password_hash)
        .bind(elevated)
        .bind(elevated)
        .fetch_one(pool)
        .await
        .map_err(map_email_conflict)?;

        log::info!("created user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Fails with an `email` validation error when another account owns `email`.
    pub async fn ensure_email_available(
        pool: &SqlitePool,
        email: &str,
        except_id: Option<i64>,
    ) -> Result<(), AppError> {
        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        match existing {
            Some((id,)) if Some(id) != except_id => Err(email_taken()),
            _ => Ok(()),
        }
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Lists users ordered by id, optionally filtered by a search term and flags.
    pub async fn list(
        pool: &SqlitePool,
        search: Option<&str>,
        is_active: Option<bool>,
        is_staff: Option<bool>,
    ) -> Result<Vec<User>, AppError> {
        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users WHERE 1 = 1", USER_COLUMNS));
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(term);
            query
                .push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR email LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(is_active) = is_active {
            query.push(" AND is_active = ").push_bind(is_active);
        }
        if let Some(is_staff) = is_staff {
            query.push(" AND is_staff = ").push_bind(is_staff);
        }
        query.push(" ORDER BY id");

        let users = query.build_query_as::<User>().fetch_all(pool).await?;
        Ok(users)
    }

    /// Replaces name, email and password (re-hashed).
    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        fields: &UserFields,
        bcrypt_cost: u32,
    ) -> Result<User, AppError> {
        let email = normalize_email(&fields.email);
        Self::ensure_email_available(pool, &email, Some(id)).await?;
        let password_hash = hash_password(&fields.password, bcrypt_cost)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $1, email = $2, password = $3 WHERE id = $4 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&fields.name)
        .bind(&email)
        .bind(password_hash)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(map_email_conflict)?;
        Ok(user)
    }

    /// Admin edit: profile fields and flags, password untouched.
    pub async fn update_profile(
        pool: &SqlitePool,
        id: i64,
        name: &str,
        email: &str,
        is_active: bool,
        is_staff: bool,
    ) -> Result<User, AppError> {
        let email = normalize_email(email);
        Self::ensure_email_available(pool, &email, Some(id)).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $1, email = $2, is_active = $3, is_staff = $4 \
             WHERE id = $5 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(name)
        .bind(&email)
        .bind(is_active)
        .bind(is_staff)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(map_email_conflict)?;
        Ok(user)
    }

    /// Deletes the account; owned tasks go with it through the foreign key.
    /// Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns the account for `email` when it is active and `password` matches.
    pub async fn authenticate(
        pool: &SqlitePool,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let user = match Self::find_by_email(pool, email).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        if !user.is_active || !verify_password(password, &user.password)? {
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Whether `self` may modify or delete the account `target_id`.
    pub fn can_manage(&self, target_id: i64) -> bool {
        self.id == target_id || self.is_staff
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn pool() -> SqlitePool {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        db::migrate(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_user_input_validation() {
        let input = UserInput {
            name: Some("Test User".to_string()),
            email: Some("test@example.com".to_string()),
            password: Some("password123".to_string()),
        };
        assert!(input.validate().is_ok());

        let input = UserInput {
            name: Some("Test User".to_string()),
            email: Some("invalid-email".to_string()),
            password: Some("password123".to_string()),
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));

        let input = UserInput {
            name: None,
            email: Some("test@example.com".to_string()),
            password: Some("short".to_string()),
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("John.Doe@Example.COM"), "John.Doe@example.com");
        assert_eq!(normalize_email("  a@B.org "), "a@b.org");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[actix_rt::test]
    async fn test_create_user_hashes_password() {
        let pool = pool().await;
        let user = User::create_user(&pool, "hash@Example.com", "Hash", "password123", 4)
            .await
            .unwrap();

        assert_eq!(user.email, "hash@example.com");
        assert_ne!(user.password, "password123");
        assert!(verify_password("password123", &user.password).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
    }

    #[actix_rt::test]
    async fn test_create_superuser_sets_flags() {
        let pool = pool().await;
        let admin = User::create_superuser(&pool, "root@example.com", "Root", "password123", 4)
            .await
            .unwrap();
        assert!(admin.is_staff);
        assert!(admin.is_superuser);
    }

    #[actix_rt::test]
    async fn test_duplicate_email_is_rejected() {
        let pool = pool().await;
        User::create_user(&pool, "dup@example.com", "One", "password123", 4)
            .await
            .unwrap();

        match User::create_user(&pool, "dup@EXAMPLE.com", "Two", "password123", 4).await {
            Err(AppError::ValidationError(errors)) => {
                assert!(errors.field_errors().contains_key("email"))
            }
            other => panic!("expected email validation error, got {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_unique_constraint_maps_to_email_error() {
        let pool = pool().await;
        User::create_user(&pool, "taken@example.com", "First", "password123", 4)
            .await
            .unwrap();

        // A row written after the availability check ran, as a concurrent
        // registration would.
        let error = sqlx::query(
            "INSERT INTO users (name, email, password, is_staff, is_superuser) \
             VALUES ('Second', 'taken@example.com', 'x', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap_err();

        match map_email_conflict(error) {
            AppError::ValidationError(errors) => {
                let body = crate::error::validation_body(&errors);
                assert_eq!(body["email"][0], "user with this email already exists.");
            }
            other => panic!("expected email validation error, got {:?}", other),
        }

        let other = map_email_conflict(sqlx::Error::RowNotFound);
        assert!(matches!(other, AppError::NotFound(_)));
    }

    #[actix_rt::test]
    async fn test_concurrent_registrations_never_fail_with_server_error() {
        let pool = pool().await;
        let (first, second) = tokio::join!(
            User::create_user(&pool, "race@example.com", "A", "password123", 4),
            User::create_user(&pool, "race@example.com", "B", "password123", 4),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::ValidationError(_)))));
    }

    #[actix_rt::test]
    async fn test_update_to_taken_email_is_rejected() {
        let pool = pool().await;
        User::create_user(&pool, "one@example.com", "One", "password123", 4)
            .await
            .unwrap();
        let two = User::create_user(&pool, "two@example.com", "Two", "password123", 4)
            .await
            .unwrap();

        let result =
            User::update_profile(&pool, two.id, "Two", "one@EXAMPLE.com", true, false).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[actix_rt::test]
    async fn test_authenticate() {
        let pool = pool().await;
        let user = User::create_user(&pool, "auth@example.com", "Auth", "password123", 4)
            .await
            .unwrap();

        let found = User::authenticate(&pool, "auth@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(User::authenticate(&pool, "auth@example.com", "wrong-password")
            .await
            .unwrap()
            .is_none());
        assert!(User::authenticate(&pool, "nobody@example.com", "password123")
            .await
            .unwrap()
            .is_none());

        User::update_profile(&pool, user.id, "Auth", "auth@example.com", false, false)
            .await
            .unwrap();
        assert!(User::authenticate(&pool, "auth@example.com", "password123")
            .await
            .unwrap()
            .is_none());
    }

    #[actix_rt::test]
    async fn test_list_filters() {
        let pool = pool().await;
        User::create_user(&pool, "alice@example.com", "Alice", "password123", 4)
            .await
            .unwrap();
        User::create_superuser(&pool, "bob@example.com", "Bob", "password123", 4)
            .await
            .unwrap();

        assert_eq!(User::list(&pool, None, None, None).await.unwrap().len(), 2);
        let found = User::list(&pool, Some("ali"), None, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Alice");
        let staff = User::list(&pool, None, None, Some(true)).await.unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].name, "Bob");
        assert_eq!(User::count(&pool).await.unwrap(), 2);
    }
}
