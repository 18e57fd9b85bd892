//! Persisted cart queries.
//!
//! `cart_item` has a unique `(user_id, product_id)` constraint, so adding to a
//! cart is one `INSERT ... ON CONFLICT DO UPDATE` and concurrent adds for the
//! same product both land.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

use marketstall_core::{CartItemId, MAX_LINE_QUANTITY, ProductId, Quantity, UserId};

use super::RepositoryError;
use crate::models::cart::{CartLine, CheckoutLine};

/// Internal row type for cart lines joined with their product.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    product_id: i32,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// Internal row type for checkout lines.
#[derive(Debug, sqlx::FromRow)]
struct CheckoutLineRow {
    id: i32,
    product_id: i32,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

impl From<CheckoutLineRow> for CheckoutLine {
    fn from(row: CheckoutLineRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// List a user's cart lines, oldest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let rows: Vec<CartLineRow> = sqlx::query_as(
        r"
        SELECT ci.id, ci.product_id, p.name AS product_name, p.price AS unit_price, ci.quantity
        FROM marketstall.cart_item ci
        JOIN marketstall.product p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.id
        ",
    )
    .bind(user_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(CartLine::from).collect())
}

/// Get the line for one product in a user's cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_line(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
) -> Result<Option<CartLine>, RepositoryError> {
    let row: Option<CartLineRow> = sqlx::query_as(
        r"
        SELECT ci.id, ci.product_id, p.name AS product_name, p.price AS unit_price, ci.quantity
        FROM marketstall.cart_item ci
        JOIN marketstall.product p ON p.id = ci.product_id
        WHERE ci.user_id = $1 AND ci.product_id = $2
        ",
    )
    .bind(user_id.as_i32())
    .bind(product_id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(CartLine::from))
}

/// Add `quantity` to the user's line for a product, creating it if absent.
///
/// The line saturates at [`MAX_LINE_QUANTITY`]. Returns the line's quantity
/// after the write.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the product does not exist.
/// Returns `RepositoryError::Database` for other database errors.
#[instrument(skip(conn))]
pub async fn upsert_increment(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
    quantity: Quantity,
) -> Result<i32, RepositoryError> {
    let (new_quantity,): (i32,) = sqlx::query_as(
        r"
        INSERT INTO marketstall.cart_item AS ci (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = LEAST(ci.quantity::BIGINT + EXCLUDED.quantity, $4)::INTEGER,
                      updated_at = NOW()
        RETURNING quantity
        ",
    )
    .bind(user_id.as_i32())
    .bind(product_id.as_i32())
    .bind(quantity.get())
    .bind(MAX_LINE_QUANTITY)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::NotFound;
        }
        RepositoryError::Database(e)
    })?;

    Ok(new_quantity)
}

/// Set the quantity of an existing line.
///
/// Returns `false` if the user has no line for the product.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_quantity(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
    quantity: Quantity,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE marketstall.cart_item
        SET quantity = $3, updated_at = NOW()
        WHERE user_id = $1 AND product_id = $2
        ",
    )
    .bind(user_id.as_i32())
    .bind(product_id.as_i32())
    .bind(quantity.get())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete the user's line for a product.
///
/// Returns `false` if there was no such line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn remove(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let result =
        sqlx::query("DELETE FROM marketstall.cart_item WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_i32())
            .bind(product_id.as_i32())
            .execute(conn)
            .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete every line in the user's cart, returning how many were removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
#[instrument(skip(conn))]
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM marketstall.cart_item WHERE user_id = $1")
        .bind(user_id.as_i32())
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Delete the given lines from the user's cart, returning how many were removed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
#[instrument(skip(conn, ids), fields(lines = ids.len()))]
pub async fn remove_lines(
    conn: &mut PgConnection,
    user_id: UserId,
    ids: &[CartItemId],
) -> Result<u64, RepositoryError> {
    let ids: Vec<i32> = ids.iter().map(CartItemId::as_i32).collect();
    let result =
        sqlx::query("DELETE FROM marketstall.cart_item WHERE user_id = $1 AND id = ANY($2)")
            .bind(user_id.as_i32())
            .bind(&ids)
            .execute(conn)
            .await?;

    Ok(result.rows_affected())
}

/// Read the user's cart for checkout, locking the lines and their products.
///
/// Lines come back ordered by product id so concurrent checkouts lock
/// products in the same order. Lines added after the read are not returned;
/// pair with [`remove_lines`] so they stay in the cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_checkout(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CheckoutLine>, RepositoryError> {
    let rows: Vec<CheckoutLineRow> = sqlx::query_as(
        r"
        SELECT ci.id, ci.product_id, p.name AS product_name, p.price AS unit_price, ci.quantity
        FROM marketstall.cart_item ci
        JOIN marketstall.product p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.product_id
        FOR UPDATE OF ci, p
        ",
    )
    .bind(user_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(CheckoutLine::from).collect())
}
