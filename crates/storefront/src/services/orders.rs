//! Checkout and cancellation.
//!
//! Checkout moves stock out of the catalog and cancellation moves it back.
//! Both happen in the same transaction as the order change, so an order and
//! the stock it holds never disagree.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use marketstall_core::{OrderId, OrderItemId, OrderStatus, UserId};

use super::inventory;
use crate::db::{RepositoryError, addresses, cart, orders};
use crate::models::order::{
    CreateOrderInput, ItemCancellation, NewOrder, NewOrderItem, Order, OrderItem, OrderTotals,
    OrderWithItems, ShippingAddress, ShippingSource,
};

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order does not exist or belongs to another user.
    #[error("order not found")]
    NotFound,

    /// The line is not part of the order.
    #[error("Item not found in order")]
    ItemNotFound,

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The order was canceled before.
    #[error("Order is already canceled.")]
    AlreadyCanceled,

    /// The order has progressed past the point where it can be canceled.
    #[error("Order cannot be canceled once {0}.")]
    NotCancelable(OrderStatus),

    /// A product has fewer units in stock than the cart asks for.
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    /// The requested shipping address is not the user's.
    #[error("address not found")]
    AddressNotFound,

    /// No shipping address was given and the user has no default.
    #[error("A shipping address is required")]
    NoShippingAddress,

    /// The inline shipping address is incomplete.
    #[error("{0}")]
    InvalidShipping(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the user's orders with their lines, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<OrderWithItems>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::list_for_user(&mut conn, user_id).await?;
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in orders::items_for_orders(&mut conn, &ids).await? {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }

    /// Get one of the user's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the user's.
    pub async fn get(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderWithItems, OrderError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::get_for_user(&mut conn, user_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = orders::items(&mut conn, order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Turn the user's cart into a `pending` order.
    ///
    /// Locks the cart lines and their products, takes their stock, snapshots
    /// name and price onto the order lines, then deletes exactly the cart
    /// lines that were ordered. Lines added while checkout runs stay in the cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` if the cart has no lines.
    /// Returns `OrderError::InsufficientStock` naming the first short product.
    /// Returns `OrderError::NoShippingAddress` / `AddressNotFound` /
    /// `InvalidShipping` when no usable shipping address is available.
    #[instrument(skip(self, input), fields(payment_method = %input.payment_method))]
    pub async fn create(
        &self,
        user_id: UserId,
        input: CreateOrderInput,
    ) -> Result<OrderWithItems, OrderError> {
        let mut tx = self.pool.begin().await?;

        let shipping = resolve_shipping(&mut tx, user_id, input.shipping).await?;

        let lines = cart::lock_for_checkout(&mut tx, user_id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        for line in &lines {
            if !inventory::commit(&mut tx, line.product_id, line.quantity).await? {
                return Err(OrderError::InsufficientStock(line.product_name.clone()));
            }
        }

        let totals = OrderTotals::from_lines(lines.iter().map(|l| (l.unit_price, l.quantity)));
        let order = orders::insert(
            &mut tx,
            user_id,
            &NewOrder {
                payment_method: input.payment_method,
                totals,
                shipping,
            },
        )
        .await?;

        let ordered: Vec<_> = lines.iter().map(|l| l.id).collect();
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = orders::insert_item(
                &mut tx,
                order.id,
                &NewOrderItem {
                    product_id: line.product_id,
                    product_name: line.product_name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                },
            )
            .await?;
            items.push(item);
        }

        cart::remove_lines(&mut tx, user_id, &ordered).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total,
            lines = items.len(),
            "Order created"
        );

        Ok(OrderWithItems { order, items })
    }

    /// Cancel a whole order, returning its lines' stock.
    ///
    /// The order row is locked first, so of two concurrent cancellations the
    /// second waits and then fails with `AlreadyCanceled`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the user's.
    /// Returns `OrderError::AlreadyCanceled` or `NotCancelable` per its status.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = lock_cancelable(&mut tx, user_id, order_id).await?;
        let canceled = cancel_locked(&mut tx, order.id).await?;

        tx.commit().await?;
        info!(order_id = %order_id, user_id = %user_id, "Order canceled");
        Ok(canceled)
    }

    /// Cancel one line of an order, returning its stock.
    ///
    /// Canceling the last remaining line cancels the order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the user's.
    /// Returns `OrderError::ItemNotFound` if the line is not on the order.
    /// Returns `OrderError::AlreadyCanceled` or `NotCancelable` per its status.
    #[instrument(skip(self))]
    pub async fn cancel_item(
        &self,
        user_id: UserId,
        order_id: OrderId,
        item_id: OrderItemId,
    ) -> Result<ItemCancellation, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = lock_cancelable(&mut tx, user_id, order_id).await?;
        let item = orders::delete_item(&mut tx, order.id, item_id)
            .await?
            .ok_or(OrderError::ItemNotFound)?;
        inventory::restore(&mut tx, item.product_id, item.quantity).await?;

        let order_status = if orders::count_items(&mut tx, order.id).await? == 0 {
            cancel_locked(&mut tx, order.id).await?.status
        } else {
            order.status
        };

        tx.commit().await?;
        info!(
            order_id = %order_id,
            item_id = %item_id,
            order_status = %order_status,
            "Order item canceled"
        );
        Ok(ItemCancellation { order_status })
    }
}

/// Lock the order and check it may still be canceled.
async fn lock_cancelable(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
) -> Result<Order, OrderError> {
    let order = orders::lock_for_user(conn, user_id, order_id)
        .await?
        .ok_or(OrderError::NotFound)?;

    match order.status {
        OrderStatus::Canceled => Err(OrderError::AlreadyCanceled),
        status if !status.is_cancelable() => Err(OrderError::NotCancelable(status)),
        _ => Ok(order),
    }
}

/// Delete the remaining lines, restore their stock, and mark the order canceled.
async fn cancel_locked(conn: &mut PgConnection, order_id: OrderId) -> Result<Order, OrderError> {
    let removed = orders::delete_items(conn, order_id).await?;
    inventory::restore_lines(conn, removed.iter().map(OrderItem::stock)).await?;
    Ok(orders::mark_canceled(conn, order_id).await?)
}

/// Pick the shipping address for a checkout.
async fn resolve_shipping(
    conn: &mut PgConnection,
    user_id: UserId,
    source: ShippingSource,
) -> Result<ShippingAddress, OrderError> {
    match source {
        ShippingSource::Provided(shipping) => {
            shipping.validate().map_err(OrderError::InvalidShipping)?;
            Ok(shipping)
        }
        ShippingSource::Saved(address_id) => addresses::get(conn, user_id, address_id)
            .await?
            .map(|a| a.to_shipping())
            .ok_or(OrderError::AddressNotFound),
        ShippingSource::Default => addresses::get_default(conn, user_id)
            .await?
            .map(|a| a.to_shipping())
            .ok_or(OrderError::NoShippingAddress),
    }
}
