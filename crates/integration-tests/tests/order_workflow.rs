//! Checkout and cancellation tests against a real database.
//!
//! Run with: `cargo test -p marketstall-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::PgPool;

use marketstall_core::{OrderStatus, PaymentMethod, Quantity, UserId};
use marketstall_integration_tests::{create_product, create_user, stock_of, test_pool};
use marketstall_storefront::models::order::{
    CreateOrderInput, OrderWithItems, ShippingAddress, ShippingSource,
};
use marketstall_storefront::models::product::Product;
use marketstall_storefront::services::cart::CartService;
use marketstall_storefront::services::orders::{OrderError, OrderService};

fn shipping() -> ShippingAddress {
    ShippingAddress {
        name: "Test Shopper".to_string(),
        line1: "1 Market Row".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        region: "IL".to_string(),
        postal_code: "62701".to_string(),
        country: "US".to_string(),
        phone: None,
    }
}

fn checkout_input() -> CreateOrderInput {
    CreateOrderInput {
        payment_method: PaymentMethod::Card,
        shipping: ShippingSource::Provided(shipping()),
    }
}

async fn add(pool: &PgPool, user: UserId, product: &Product, n: i32) {
    CartService::new(pool)
        .add(user, product.id, Quantity::new(n).unwrap())
        .await
        .unwrap();
}

async fn checkout(pool: &PgPool, user: UserId) -> OrderWithItems {
    OrderService::new(pool)
        .create(user, checkout_input())
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_checkout_takes_stock_and_clears_cart() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let a = create_product(&pool, "2.50", 10).await;
    let b = create_product(&pool, "4.00", 5).await;
    add(&pool, user, &a, 2).await;
    add(&pool, user, &b, 1).await;

    let order = checkout(&pool, user).await;

    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.order.subtotal, Decimal::from_str("9.00").unwrap());
    assert_eq!(order.order.shipping_cost, Decimal::ZERO);
    assert_eq!(order.order.total, order.order.subtotal);
    assert_eq!(stock_of(&pool, a.id).await, 8);
    assert_eq!(stock_of(&pool, b.id).await, 4);
    assert!(CartService::new(&pool).list(user).await.unwrap().items.is_empty());
}

/// Wait until a checkout is parked on a row lock.
async fn wait_for_blocked_checkout(pool: &PgPool) {
    for _ in 0..100 {
        let (waiting,): (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*)
            FROM pg_stat_activity
            WHERE datname = current_database()
              AND wait_event_type = 'Lock'
              AND query LIKE '%FOR UPDATE OF ci, p%'
            ",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        if waiting > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("checkout never blocked on the product lock");
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_line_added_during_checkout_stays_in_cart() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let a = create_product(&pool, "2.00", 10).await;
    let b = create_product(&pool, "5.00", 10).await;
    add(&pool, user, &a, 1).await;

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM marketstall.product WHERE id = $1 FOR UPDATE")
        .bind(a.id.as_i32())
        .execute(&mut *holder)
        .await
        .unwrap();

    let checkout_pool = pool.clone();
    let pending = tokio::spawn(async move {
        OrderService::new(&checkout_pool)
            .create(user, checkout_input())
            .await
    });

    wait_for_blocked_checkout(&pool).await;
    add(&pool, user, &b, 2).await;
    holder.rollback().await.unwrap();

    let order = pending.await.unwrap().unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].product_id, Some(a.id));
    assert_eq!(stock_of(&pool, a.id).await, 9);
    assert_eq!(stock_of(&pool, b.id).await, 10);

    let cart = CartService::new(&pool).list(user).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, b.id);
    assert_eq!(cart.items[0].quantity, 2);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_checkout_empty_cart_is_rejected() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;

    let result = OrderService::new(&pool).create(user, checkout_input()).await;
    assert!(matches!(result, Err(OrderError::EmptyCart)));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_checkout_insufficient_stock_writes_nothing() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let plenty = create_product(&pool, "1.00", 10).await;
    let scarce = create_product(&pool, "1.00", 1).await;
    add(&pool, user, &plenty, 3).await;
    add(&pool, user, &scarce, 2).await;

    let result = OrderService::new(&pool).create(user, checkout_input()).await;
    assert!(matches!(result, Err(OrderError::InsufficientStock(name)) if name == scarce.name));

    assert_eq!(stock_of(&pool, plenty.id).await, 10);
    assert_eq!(stock_of(&pool, scarce.id).await, 1);
    assert_eq!(CartService::new(&pool).list(user).await.unwrap().items.len(), 2);
    assert!(OrderService::new(&pool).list(user).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_checkout_without_any_address_is_rejected() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 10).await;
    add(&pool, user, &product, 1).await;

    let result = OrderService::new(&pool)
        .create(
            user,
            CreateOrderInput {
                payment_method: PaymentMethod::Card,
                shipping: ShippingSource::Default,
            },
        )
        .await;
    assert!(matches!(result, Err(OrderError::NoShippingAddress)));
    assert_eq!(stock_of(&pool, product.id).await, 10);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cancel_restores_stock_and_deletes_items() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let p1 = create_product(&pool, "3.00", 10).await;
    let p2 = create_product(&pool, "6.00", 10).await;
    add(&pool, user, &p1, 2).await;
    add(&pool, user, &p2, 3).await;
    let order = checkout(&pool, user).await;

    let orders = OrderService::new(&pool);
    let canceled = orders.cancel(user, order.order.id).await.unwrap();

    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert!(canceled.canceled_at.is_some());
    assert_eq!(stock_of(&pool, p1.id).await, 10);
    assert_eq!(stock_of(&pool, p2.id).await, 10);
    assert!(orders.get(user, order.order.id).await.unwrap().items.is_empty());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cancel_twice_conflicts_without_double_restore() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "3.00", 10).await;
    add(&pool, user, &product, 4).await;
    let order = checkout(&pool, user).await;

    let orders = OrderService::new(&pool);
    orders.cancel(user, order.order.id).await.unwrap();
    let second = orders.cancel(user, order.order.id).await;

    assert!(matches!(second, Err(OrderError::AlreadyCanceled)));
    assert_eq!(stock_of(&pool, product.id).await, 10);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_concurrent_cancels_restore_once() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "3.00", 10).await;
    add(&pool, user, &product, 4).await;
    let order = checkout(&pool, user).await;

    let orders = OrderService::new(&pool);
    let (first, second) = tokio::join!(
        orders.cancel(user, order.order.id),
        orders.cancel(user, order.order.id)
    );

    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert!(
        matches!(first, Err(OrderError::AlreadyCanceled))
            || matches!(second, Err(OrderError::AlreadyCanceled))
    );
    assert_eq!(stock_of(&pool, product.id).await, 10);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cancel_item_example_walkthrough() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let a = create_product(&pool, "2.00", 10).await;
    let b = create_product(&pool, "5.00", 10).await;
    add(&pool, user, &a, 2).await;
    add(&pool, user, &b, 1).await;
    let order = checkout(&pool, user).await;
    assert_eq!(order.items.len(), 2);

    let line = |product_id| {
        order
            .items
            .iter()
            .find(|i| i.product_id == Some(product_id))
            .unwrap()
            .id
    };
    let orders = OrderService::new(&pool);

    let after_a = orders
        .cancel_item(user, order.order.id, line(a.id))
        .await
        .unwrap();
    assert_eq!(after_a.order_status, OrderStatus::Pending);
    assert_eq!(stock_of(&pool, a.id).await, 10);
    assert_eq!(stock_of(&pool, b.id).await, 9);

    let after_b = orders
        .cancel_item(user, order.order.id, line(b.id))
        .await
        .unwrap();
    assert_eq!(after_b.order_status, OrderStatus::Canceled);
    assert_eq!(stock_of(&pool, b.id).await, 10);

    let reloaded = orders.get(user, order.order.id).await.unwrap();
    assert_eq!(reloaded.order.status, OrderStatus::Canceled);
    assert!(reloaded.items.is_empty());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_cancel_item_not_on_order() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "2.00", 10).await;
    add(&pool, user, &product, 1).await;
    let first = checkout(&pool, user).await;
    add(&pool, user, &product, 1).await;
    let second = checkout(&pool, user).await;

    let result = OrderService::new(&pool)
        .cancel_item(user, first.order.id, second.items[0].id)
        .await;
    assert!(matches!(result, Err(OrderError::ItemNotFound)));
    assert_eq!(stock_of(&pool, product.id).await, 8);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_orders_are_scoped_to_their_owner() {
    let pool = test_pool().await;
    let (owner, _) = create_user(&pool).await;
    let (other, _) = create_user(&pool).await;
    let product = create_product(&pool, "2.00", 10).await;
    add(&pool, owner, &product, 1).await;
    let order = checkout(&pool, owner).await;

    let orders = OrderService::new(&pool);
    assert!(matches!(
        orders.get(other, order.order.id).await,
        Err(OrderError::NotFound)
    ));
    assert!(matches!(
        orders.cancel(other, order.order.id).await,
        Err(OrderError::NotFound)
    ));
    assert!(orders.list(other).await.unwrap().is_empty());
    assert_eq!(orders.list(owner).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_shipped_orders_cannot_be_canceled() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "2.00", 10).await;
    add(&pool, user, &product, 1).await;
    let order = checkout(&pool, user).await;

    sqlx::query("UPDATE marketstall.order SET status = 'shipped' WHERE id = $1")
        .bind(order.order.id.as_i32())
        .execute(&pool)
        .await
        .unwrap();

    let result = OrderService::new(&pool).cancel(user, order.order.id).await;
    assert!(matches!(
        result,
        Err(OrderError::NotCancelable(OrderStatus::Shipped))
    ));
    assert_eq!(stock_of(&pool, product.id).await, 9);
}
