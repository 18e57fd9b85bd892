//! Address book tests against a real database.
//!
//! Run with: `cargo test -p marketstall-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use marketstall_integration_tests::{create_user, test_pool};
use marketstall_storefront::models::address::{AddressInput, AddressPatch};
use marketstall_storefront::services::addresses::{AddressError, AddressService};

fn input(city: &str, is_default: bool) -> AddressInput {
    AddressInput {
        full_name: "Test Shopper".to_string(),
        line1: "1 Market Row".to_string(),
        line2: None,
        city: city.to_string(),
        region: String::new(),
        postal_code: "62701".to_string(),
        country: "US".to_string(),
        phone: None,
        is_default,
    }
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_exactly_one_default_remains() {
    let pool = test_pool().await;
    let (user, _) = create_user(&pool).await;
    let book = AddressService::new(&pool);

    let first = book.create(user, input("Aston", true)).await.unwrap();
    let second = book.create(user, input("Bray", true)).await.unwrap();

    let defaults: Vec<_> = book
        .list(user)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.is_default)
        .map(|a| a.id)
        .collect();
    assert_eq!(defaults, vec![second.id]);

    book.update(
        user,
        first.id,
        AddressPatch {
            is_default: Some(true),
            ..AddressPatch::default()
        },
    )
    .await
    .unwrap();

    let defaults: Vec<_> = book
        .list(user)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.is_default)
        .map(|a| a.id)
        .collect();
    assert_eq!(defaults, vec![first.id]);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_addresses_are_scoped_and_validated() {
    let pool = test_pool().await;
    let (owner, _) = create_user(&pool).await;
    let (other, _) = create_user(&pool).await;
    let book = AddressService::new(&pool);

    let address = book.create(owner, input("Aston", false)).await.unwrap();

    assert!(matches!(
        book.get(other, address.id).await,
        Err(AddressError::NotFound)
    ));
    assert!(matches!(
        book.delete(other, address.id).await,
        Err(AddressError::NotFound)
    ));

    let blank = book.create(owner, input("   ", false)).await;
    assert!(matches!(blank, Err(AddressError::Validation(msg)) if msg == "city is required"));

    let replaced = book
        .replace(owner, address.id, input("Bray", false))
        .await
        .unwrap();
    assert_eq!(replaced.city, "Bray");

    book.delete(owner, address.id).await.unwrap();
    assert!(book.list(owner).await.unwrap().is_empty());
}
