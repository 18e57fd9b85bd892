//! Address book queries.
//!
//! The partial unique index `address_one_default_per_user` rejects a second
//! default, so callers run [`clear_default`] before writing an address with
//! `is_default = true`, in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use marketstall_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::address::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = r"
    id, user_id, full_name, line1, line2, city, region, postal_code, country, phone,
    is_default, created_at, updated_at";

/// Internal row type for address queries.
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    user_id: i32,
    full_name: String,
    line1: String,
    line2: Option<String>,
    city: String,
    region: String,
    postal_code: String,
    country: String,
    phone: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            full_name: row.full_name,
            line1: row.line1,
            line2: row.line2,
            city: row.city,
            region: row.region,
            postal_code: row.postal_code,
            country: row.country,
            phone: row.phone,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// List a user's addresses, default first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<Address>, RepositoryError> {
    let rows: Vec<AddressRow> = sqlx::query_as(&format!(
        r"
        SELECT {ADDRESS_COLUMNS}
        FROM marketstall.address
        WHERE user_id = $1
        ORDER BY is_default DESC, id
        "
    ))
    .bind(user_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Address::from).collect())
}

/// Get one of a user's addresses.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
) -> Result<Option<Address>, RepositoryError> {
    let row: Option<AddressRow> = sqlx::query_as(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM marketstall.address WHERE id = $1 AND user_id = $2"
    ))
    .bind(id.as_i32())
    .bind(user_id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Address::from))
}

/// Get a user's default address, if one is set.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_default(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Address>, RepositoryError> {
    let row: Option<AddressRow> = sqlx::query_as(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM marketstall.address WHERE user_id = $1 AND is_default"
    ))
    .bind(user_id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Address::from))
}

/// Unset the default flag on a user's addresses, except `keep` if given.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
#[instrument(skip(conn))]
pub async fn clear_default(
    conn: &mut PgConnection,
    user_id: UserId,
    keep: Option<AddressId>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketstall.address
        SET is_default = FALSE, updated_at = NOW()
        WHERE user_id = $1 AND is_default AND ($2::INTEGER IS NULL OR id <> $2)
        ",
    )
    .bind(user_id.as_i32())
    .bind(keep.map(|id| id.as_i32()))
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Insert an address.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if another default address exists.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    input: &AddressInput,
) -> Result<Address, RepositoryError> {
    let row: AddressRow = sqlx::query_as(&format!(
        r"
        INSERT INTO marketstall.address (
            user_id, full_name, line1, line2, city, region, postal_code, country, phone, is_default
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ADDRESS_COLUMNS}
        "
    ))
    .bind(user_id.as_i32())
    .bind(&input.full_name)
    .bind(&input.line1)
    .bind(input.line2.as_deref())
    .bind(&input.city)
    .bind(&input.region)
    .bind(&input.postal_code)
    .bind(&input.country)
    .bind(input.phone.as_deref())
    .bind(input.is_default)
    .fetch_one(conn)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "default address already set"))?;

    Ok(row.into())
}

/// Overwrite one of a user's addresses.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the address is not the user's.
/// Returns `RepositoryError::Conflict` if another default address exists.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn update(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
    input: &AddressInput,
) -> Result<Address, RepositoryError> {
    let row: Option<AddressRow> = sqlx::query_as(&format!(
        r"
        UPDATE marketstall.address
        SET full_name = $3, line1 = $4, line2 = $5, city = $6, region = $7,
            postal_code = $8, country = $9, phone = $10, is_default = $11,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING {ADDRESS_COLUMNS}
        "
    ))
    .bind(id.as_i32())
    .bind(user_id.as_i32())
    .bind(&input.full_name)
    .bind(&input.line1)
    .bind(input.line2.as_deref())
    .bind(&input.city)
    .bind(&input.region)
    .bind(&input.postal_code)
    .bind(&input.country)
    .bind(input.phone.as_deref())
    .bind(input.is_default)
    .fetch_optional(conn)
    .await
    .map_err(|e| RepositoryError::from_unique_violation(e, "default address already set"))?;

    row.map(Address::from).ok_or(RepositoryError::NotFound)
}

/// Delete one of a user's addresses.
///
/// Returns `false` if the address is not the user's.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM marketstall.address WHERE id = $1 AND user_id = $2")
        .bind(id.as_i32())
        .bind(user_id.as_i32())
        .execute(conn)
        .await?;

    Ok(result.rows_affected() == 1)
}
