//! Order and order line queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

use marketstall_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::RepositoryError;
use crate::models::order::{NewOrder, NewOrderItem, Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = r"
    id, user_id, status, payment_method, subtotal, shipping_cost, total,
    shipping_name, shipping_line1, shipping_line2, shipping_city, shipping_region,
    shipping_postal_code, shipping_country, shipping_phone,
    created_at, updated_at, canceled_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: OrderStatus,
    payment_method: PaymentMethod,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
    shipping_name: String,
    shipping_line1: String,
    shipping_line2: Option<String>,
    shipping_city: String,
    shipping_region: String,
    shipping_postal_code: String,
    shipping_country: String,
    shipping_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    canceled_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            status: row.status,
            payment_method: row.payment_method,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total: row.total,
            shipping: ShippingAddress {
                name: row.shipping_name,
                line1: row.shipping_line1,
                line2: row.shipping_line2,
                city: row.shipping_city,
                region: row.shipping_region,
                postal_code: row.shipping_postal_code,
                country: row.shipping_country,
                phone: row.shipping_phone,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            canceled_at: row.canceled_at,
        }
    }
}

/// Internal row type for order line queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: Option<i32>,
    product_name: String,
    quantity: Option<i32>,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: row.product_id.map(ProductId::new),
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Insert a `pending` order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
#[instrument(skip(conn, order))]
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    order: &NewOrder,
) -> Result<Order, RepositoryError> {
    let shipping = &order.shipping;
    let row: OrderRow = sqlx::query_as(&format!(
        r"
        INSERT INTO marketstall.order (
            user_id, status, payment_method, subtotal, shipping_cost, total,
            shipping_name, shipping_line1, shipping_line2, shipping_city, shipping_region,
            shipping_postal_code, shipping_country, shipping_phone
        )
        VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(user_id.as_i32())
    .bind(order.payment_method)
    .bind(order.totals.subtotal)
    .bind(order.totals.shipping_cost)
    .bind(order.totals.total)
    .bind(&shipping.name)
    .bind(&shipping.line1)
    .bind(shipping.line2.as_deref())
    .bind(&shipping.city)
    .bind(&shipping.region)
    .bind(&shipping.postal_code)
    .bind(&shipping.country)
    .bind(shipping.phone.as_deref())
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// List a user's orders, most recent first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<Order>, RepositoryError> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        r"
        SELECT {ORDER_COLUMNS}
        FROM marketstall.order
        WHERE user_id = $1
        ORDER BY created_at DESC, id DESC
        "
    ))
    .bind(user_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Order::from).collect())
}

/// Get one of a user's orders.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM marketstall.order WHERE id = $1 AND user_id = $2"
    ))
    .bind(order_id.as_i32())
    .bind(user_id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Order::from))
}

/// Get one of a user's orders and lock its row until the transaction ends.
///
/// A second transaction locking the same order waits here, then sees the
/// first one's committed status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        SELECT {ORDER_COLUMNS}
        FROM marketstall.order
        WHERE id = $1 AND user_id = $2
        FOR UPDATE
        "
    ))
    .bind(order_id.as_i32())
    .bind(user_id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Order::from))
}

/// Mark an order canceled.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the order does not exist.
/// Returns `RepositoryError::Database` if the update fails.
#[instrument(skip(conn))]
pub async fn mark_canceled(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Order, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        r"
        UPDATE marketstall.order
        SET status = 'canceled', canceled_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(order_id.as_i32())
    .fetch_optional(conn)
    .await?;

    row.map(Order::from).ok_or(RepositoryError::NotFound)
}

// =============================================================================
// Order Items
// =============================================================================

/// Insert an order line.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item: &NewOrderItem,
) -> Result<OrderItem, RepositoryError> {
    let row: OrderItemRow = sqlx::query_as(&format!(
        r"
        INSERT INTO marketstall.order_item (order_id, product_id, product_name, quantity, unit_price)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(order_id.as_i32())
    .bind(item.product_id.as_i32())
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// List the lines of one order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM marketstall.order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// List the lines of several orders at once.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items_for_orders(
    conn: &mut PgConnection,
    order_ids: &[OrderId],
) -> Result<Vec<OrderItem>, RepositoryError> {
    let raw: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();
    let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
        r"
        SELECT {ITEM_COLUMNS}
        FROM marketstall.order_item
        WHERE order_id = ANY($1)
        ORDER BY order_id, id
        "
    ))
    .bind(&raw)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Delete every line of an order, returning the deleted lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
        "DELETE FROM marketstall.order_item WHERE order_id = $1 RETURNING {ITEM_COLUMNS}"
    ))
    .bind(order_id.as_i32())
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Delete one line of an order, returning it if it belonged to that order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item_id: OrderItemId,
) -> Result<Option<OrderItem>, RepositoryError> {
    let row: Option<OrderItemRow> = sqlx::query_as(&format!(
        r"
        DELETE FROM marketstall.order_item
        WHERE id = $1 AND order_id = $2
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(item_id.as_i32())
    .bind(order_id.as_i32())
    .fetch_optional(conn)
    .await?;

    Ok(row.map(OrderItem::from))
}

/// Count the lines left on an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn count_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<i64, RepositoryError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM marketstall.order_item WHERE order_id = $1")
            .bind(order_id.as_i32())
            .fetch_one(conn)
            .await?;

    Ok(count)
}
