//! Stock bookkeeping.
//!
//! These functions run on a connection the caller already holds, normally the
//! transaction that is creating or canceling the order, so stock moves commit
//! or roll back together with the order change.

use sqlx::PgConnection;
use tracing::{debug, instrument, warn};

use marketstall_core::ProductId;
use marketstall_core::inventory::{LineStock, plan_restock};

use crate::db::{RepositoryError, products};

/// Take `quantity` units of a product out of stock.
///
/// Returns `false` (and changes nothing) when stock is insufficient or the
/// product is gone.
///
/// # Errors
///
/// Returns `RepositoryError` if the update fails.
#[instrument(skip(conn))]
pub async fn commit(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    products::commit_stock(conn, product_id, quantity).await
}

/// Return units of a product to stock.
///
/// A missing product reference or a non-positive quantity is a no-op.
///
/// # Errors
///
/// Returns `RepositoryError` if the update fails.
#[instrument(skip(conn))]
pub async fn restore(
    conn: &mut PgConnection,
    product_id: Option<ProductId>,
    quantity: Option<i32>,
) -> Result<(), RepositoryError> {
    restore_lines(
        conn,
        [LineStock {
            product_id,
            quantity,
        }],
    )
    .await
}

/// Return the stock held by a set of order lines.
///
/// # Errors
///
/// Returns `RepositoryError` if an update fails.
pub async fn restore_lines<I>(conn: &mut PgConnection, lines: I) -> Result<(), RepositoryError>
where
    I: IntoIterator<Item = LineStock>,
{
    for restock in plan_restock(lines) {
        let found = products::restore_stock(conn, restock.product_id, restock.quantity).await?;
        if found {
            debug!(
                product_id = %restock.product_id,
                quantity = restock.quantity,
                "Stock restored"
            );
        } else {
            warn!(
                product_id = %restock.product_id,
                quantity = restock.quantity,
                "Product vanished before restock; skipping"
            );
        }
    }
    Ok(())
}
