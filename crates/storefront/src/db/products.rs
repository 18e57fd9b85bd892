//! Catalog and stock queries.
//!
//! Stock only moves through [`commit_stock`] (checkout) and [`restore_stock`]
//! (cancellation, restocking). Both are single-row updates so the `CHECK
//! (stock >= 0)` constraint is never the thing that catches a bad write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

use marketstall_core::ProductId;

use super::RepositoryError;
use crate::models::product::{NewProduct, Product};

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Decimal,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// List every product, ordered by name.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(conn: &mut PgConnection) -> Result<Vec<Product>, RepositoryError> {
    let rows: Vec<ProductRow> = sqlx::query_as(
        r"
        SELECT id, name, price, stock, created_at, updated_at
        FROM marketstall.product
        ORDER BY name, id
        ",
    )
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Get a product by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row: Option<ProductRow> = sqlx::query_as(
        r"
        SELECT id, name, price, stock, created_at, updated_at
        FROM marketstall.product
        WHERE id = $1
        ",
    )
    .bind(id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Product::from))
}

/// Return the subset of `ids` that exist.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn existing_ids(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<ProductId>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    let found: Vec<(i32,)> =
        sqlx::query_as("SELECT id FROM marketstall.product WHERE id = ANY($1) ORDER BY id")
            .bind(&raw)
            .fetch_all(conn)
            .await?;

    Ok(found.into_iter().map(|(id,)| ProductId::new(id)).collect())
}

/// Insert a product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails (including a
/// negative price or stock rejected by the table constraints).
#[instrument(skip(conn, product), fields(name = %product.name))]
pub async fn create(
    conn: &mut PgConnection,
    product: &NewProduct,
) -> Result<Product, RepositoryError> {
    let row: ProductRow = sqlx::query_as(
        r"
        INSERT INTO marketstall.product (name, price, stock)
        VALUES ($1, $2, $3)
        RETURNING id, name, price, stock, created_at, updated_at
        ",
    )
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// Take `quantity` units out of stock if enough remain.
///
/// Returns `false` when the product is missing or has too little stock, in
/// which case nothing changes.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn commit_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketstall.product
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        ",
    )
    .bind(id.as_i32())
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Put `quantity` units back into stock.
///
/// Returns `false` when the product no longer exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn restore_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketstall.product
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id.as_i32())
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
