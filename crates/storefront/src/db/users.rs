//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use marketstall_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::{NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone, created_at, updated_at";

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Get a user by their email address.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
pub async fn get_by_email(
    conn: &mut PgConnection,
    email: &Email,
) -> Result<Option<User>, RepositoryError> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM marketstall.user WHERE email = $1"
    ))
    .bind(email.as_str())
    .fetch_optional(conn)
    .await?;

    row.map(User::try_from).transpose()
}

/// Get a user by their ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
/// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
pub async fn get_by_id(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<User>, RepositoryError> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM marketstall.user WHERE id = $1"
    ))
    .bind(id.as_i32())
    .fetch_optional(conn)
    .await?;

    row.map(User::try_from).transpose()
}

/// Get the stored password hash for a user.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_password_hash(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<String>, RepositoryError> {
    let hash: Option<(String,)> =
        sqlx::query_as("SELECT password_hash FROM marketstall.user_password WHERE user_id = $1")
            .bind(id.as_i32())
            .fetch_optional(conn)
            .await?;

    Ok(hash.map(|(h,)| h))
}

/// Create a user and their password entry.
///
/// Run inside a transaction so a failed password insert leaves no account.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the email already exists.
/// Returns `RepositoryError::Database` for other database errors.
#[instrument(skip(conn, new_user, password_hash), fields(email = %new_user.email))]
pub async fn create_with_password(
    conn: &mut PgConnection,
    new_user: &NewUser,
    password_hash: &str,
) -> Result<User, RepositoryError> {
    let row: UserRow = sqlx::query_as(&format!(
        r"
        INSERT INTO marketstall.user (email, first_name, last_name, phone)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(new_user.email.as_str())
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(new_user.phone.as_deref())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "email already exists"))?;

    let user = User::try_from(row)?;

    sqlx::query(
        r"
        INSERT INTO marketstall.user_password (user_id, password_hash)
        VALUES ($1, $2)
        ",
    )
    .bind(user.id.as_i32())
    .bind(password_hash)
    .execute(&mut *conn)
    .await?;

    Ok(user)
}

/// Apply a partial profile update.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user does not exist.
/// Returns `RepositoryError::Database` if the query fails.
#[instrument(skip(conn, update), fields(user_id = %id))]
pub async fn update_profile(
    conn: &mut PgConnection,
    id: UserId,
    update: &ProfileUpdate,
) -> Result<User, RepositoryError> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
        r"
        UPDATE marketstall.user
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(id.as_i32())
    .bind(update.first_name.as_deref())
    .bind(update.last_name.as_deref())
    .bind(update.phone.as_deref())
    .fetch_optional(conn)
    .await?;

    row.map(User::try_from)
        .transpose()?
        .ok_or(RepositoryError::NotFound)
}
