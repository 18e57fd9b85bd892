//! Cart store tests against a real database.
//!
//! Run with: `cargo test -p marketstall-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::json;

use marketstall_core::cart::GuestCart;
use marketstall_core::{MAX_LINE_QUANTITY, ProductId, Quantity};
use marketstall_integration_tests::{create_product, create_user, test_pool};
use marketstall_storefront::models::cart::QuantityUpdate;
use marketstall_storefront::services::cart::{CartError, CartService};

fn qty(n: i32) -> Quantity {
    Quantity::new(n).expect("valid quantity")
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_add_twice_increments_quantity() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "3.00", 50).await;
    let carts = CartService::new(&pool);

    let first = carts.add(user, product.id, qty(2)).await.unwrap();
    assert_eq!(first.quantity, 2);

    let second = carts.add(user, product.id, qty(3)).await.unwrap();
    assert_eq!(second.quantity, 5);
    assert_eq!(second.id, first.id);

    let cart = carts.list(user).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.item_count, 5);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_repeated_adds_saturate_at_line_cap() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 50).await;
    let carts = CartService::new(&pool);

    carts
        .add(user, product.id, qty(MAX_LINE_QUANTITY - 1))
        .await
        .unwrap();
    let line = carts.add(user, product.id, qty(5)).await.unwrap();
    assert_eq!(line.quantity, MAX_LINE_QUANTITY);

    let line = carts
        .add(user, product.id, qty(MAX_LINE_QUANTITY))
        .await
        .unwrap();
    assert_eq!(line.quantity, MAX_LINE_QUANTITY);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_add_unknown_product_is_not_found() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;

    let result = CartService::new(&pool)
        .add(user, ProductId::new(i32::MAX), Quantity::ONE)
        .await;
    assert!(matches!(result, Err(CartError::ProductNotFound)));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_update_quantity_sets_and_zero_removes() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 10).await;
    let carts = CartService::new(&pool);

    carts.add(user, product.id, qty(4)).await.unwrap();

    let updated = carts
        .update_quantity(user, product.id, Some(qty(1)))
        .await
        .unwrap();
    assert!(matches!(updated, QuantityUpdate::Updated(line) if line.quantity == 1));

    let removed = carts.update_quantity(user, product.id, None).await.unwrap();
    assert_eq!(removed, QuantityUpdate::Removed);
    assert!(carts.list(user).await.unwrap().items.is_empty());

    let again = carts.update_quantity(user, product.id, None).await;
    assert!(matches!(again, Err(CartError::LineNotFound)));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_remove_missing_line_is_not_found() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "1.00", 10).await;

    let result = CartService::new(&pool).remove(user, product.id).await;
    assert!(matches!(result, Err(CartError::LineNotFound)));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_merge_increments_existing_and_creates_new_lines() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let held = create_product(&pool, "2.00", 10).await;
    let fresh = create_product(&pool, "5.00", 10).await;
    let carts = CartService::new(&pool);

    carts.add(user, held.id, qty(2)).await.unwrap();

    let guest = GuestCart::new(vec![
        json!({ "product": held.id.as_i32(), "quantity": 3 }),
        json!({ "product": { "id": fresh.id.as_i32() }, "quantity": "3" }),
    ]);
    let cart = carts.merge(user, &guest).await.unwrap();

    let quantity_of = |id: ProductId| {
        cart.items
            .iter()
            .find(|l| l.product_id == id)
            .map(|l| l.quantity)
    };
    assert_eq!(quantity_of(held.id), Some(5));
    assert_eq!(quantity_of(fresh.id), Some(3));
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_merge_skips_malformed_and_unknown_lines() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let product = create_product(&pool, "2.00", 10).await;

    let guest = GuestCart::new(vec![
        json!("not an object"),
        json!({ "quantity": 2 }),
        json!({ "product": product.id.as_i32(), "quantity": 0 }),
        json!({ "product": product.id.as_i32(), "quantity": 1.5 }),
        json!({ "product": i32::MAX, "quantity": 1 }),
        json!({ "product": product.id.as_i32() }),
        json!({ "product": product.id.as_i32(), "quantity": 2 }),
    ]);
    let cart = CartService::new(&pool).merge(user, &guest).await.unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_id, product.id);
    assert_eq!(cart.items[0].quantity, 3);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_clear_empties_only_that_users_cart() {
    let pool = test_pool().await;
    let (alice, _) = create_user(&pool).await;
    let (bob, _) = create_user(&pool).await;
    let product = create_product(&pool, "2.00", 10).await;
    let carts = CartService::new(&pool);

    carts.add(alice, product.id, qty(1)).await.unwrap();
    carts.add(bob, product.id, qty(1)).await.unwrap();

    assert_eq!(carts.clear(alice).await.unwrap(), 1);
    assert!(carts.list(alice).await.unwrap().items.is_empty());
    assert_eq!(carts.list(bob).await.unwrap().items.len(), 1);
}
