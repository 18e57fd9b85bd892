//! Persisted cart service.
//!
//! One line per (user, product). Adding increments an existing line, setting a
//! quantity replaces it, and a quantity of zero deletes it.

use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument, warn};

use marketstall_core::cart::{GuestCart, MergePlan};
use marketstall_core::{ProductId, Quantity, UserId};

use crate::db::{RepositoryError, cart, products};
use crate::models::cart::{Cart, CartLine, QuantityUpdate};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist.
    #[error("product not found")]
    ProductNotFound,

    /// The user's cart has no line for the product.
    #[error("item not in cart")]
    LineNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Cart service.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Cart, CartError> {
        let mut conn = self.pool.acquire().await?;
        Ok(cart::list(&mut conn, user_id).await?.into())
    }

    /// Add a product to the cart, incrementing an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, CartError> {
        let mut tx = self.pool.begin().await?;

        cart::upsert_increment(&mut tx, user_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ProductNotFound,
                other => CartError::Repository(other),
            })?;
        let line = cart::get_line(&mut tx, user_id, product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        tx.commit().await?;
        Ok(line)
    }

    /// Remove a product's line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the cart has no such line.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), CartError> {
        let mut conn = self.pool.acquire().await?;
        if cart::remove(&mut conn, user_id, product_id).await? {
            Ok(())
        } else {
            Err(CartError::LineNotFound)
        }
    }

    /// Set a line's quantity; `None` (quantity zero) deletes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the cart has no such line.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Option<Quantity>,
    ) -> Result<QuantityUpdate, CartError> {
        let mut tx = self.pool.begin().await?;

        let outcome = match quantity {
            None => {
                if !cart::remove(&mut tx, user_id, product_id).await? {
                    return Err(CartError::LineNotFound);
                }
                QuantityUpdate::Removed
            }
            Some(quantity) => {
                if !cart::set_quantity(&mut tx, user_id, product_id, quantity).await? {
                    return Err(CartError::LineNotFound);
                }
                let line = cart::get_line(&mut tx, user_id, product_id)
                    .await?
                    .ok_or(CartError::LineNotFound)?;
                QuantityUpdate::Updated(line)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Merge a guest cart into the user's cart and return the result.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a write fails; nothing is merged then.
    #[instrument(skip(self, guest), fields(guest_lines = guest.len()))]
    pub async fn merge(&self, user_id: UserId, guest: &GuestCart) -> Result<Cart, CartError> {
        let mut tx = self.pool.begin().await?;
        let cart = merge_guest_cart(&mut tx, user_id, guest).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Delete every line in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<u64, CartError> {
        let mut conn = self.pool.acquire().await?;
        Ok(cart::clear(&mut conn, user_id).await?)
    }
}

/// Merge a guest cart on a connection the caller controls.
///
/// Login and registration call this inside their own transaction. Malformed
/// guest lines and lines for products that no longer exist are skipped.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
pub async fn merge_guest_cart(
    conn: &mut PgConnection,
    user_id: UserId,
    guest: &GuestCart,
) -> Result<Cart, RepositoryError> {
    let plan = guest.plan();
    for skipped in &plan.skipped {
        warn!(
            user_id = %user_id,
            index = skipped.index,
            reason = %skipped.reason,
            "Skipping malformed guest cart line"
        );
    }

    let merged = apply_plan(conn, user_id, &plan).await?;
    if merged > 0 {
        info!(user_id = %user_id, lines = merged, "Merged guest cart");
    }

    Ok(cart::list(conn, user_id).await?.into())
}

/// Upsert-increment every planned line whose product still exists.
async fn apply_plan(
    conn: &mut PgConnection,
    user_id: UserId,
    plan: &MergePlan,
) -> Result<usize, RepositoryError> {
    if plan.is_empty() {
        return Ok(0);
    }

    let wanted: Vec<ProductId> = plan.lines.iter().map(|l| l.product_id).collect();
    let existing = products::existing_ids(conn, &wanted).await?;

    let mut merged = 0;
    for line in &plan.lines {
        if existing.binary_search(&line.product_id).is_err() {
            warn!(
                user_id = %user_id,
                product_id = %line.product_id,
                "Skipping guest cart line for unknown product"
            );
            continue;
        }
        cart::upsert_increment(conn, user_id, line.product_id, line.quantity).await?;
        merged += 1;
    }
    Ok(merged)
}
