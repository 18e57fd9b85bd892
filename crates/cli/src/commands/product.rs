//! Catalog management commands.
//!
//! # Usage
//!
//! ```bash
//! # Add a product
//! mcli product add --name "Tea Towel" --price 12.50 --stock 40
//!
//! # Put units back on the shelf
//! mcli product restock --id 3 --quantity 10
//! ```

use rust_decimal::Decimal;

use marketstall_core::ProductId;
use marketstall_storefront::db::products;
use marketstall_storefront::models::product::NewProduct;

use super::{CommandError, connect};

/// Create a product and return its ID.
///
/// # Errors
///
/// Returns `InvalidArgument` for a blank name, negative price, or negative stock.
pub async fn add(name: &str, price: Decimal, stock: i32) -> Result<ProductId, CommandError> {
    let product = validate_new_product(name, price, stock)?;

    let pool = connect().await?;
    let mut conn = pool.acquire().await?;
    let created = products::create(&mut conn, &product).await?;

    tracing::info!(
        product_id = %created.id,
        name = %created.name,
        price = %created.price,
        stock = created.stock,
        "Product created"
    );
    Ok(created.id)
}

/// Increase a product's stock.
///
/// # Errors
///
/// Returns `InvalidArgument` for a non-positive quantity and
/// `ProductNotFound` if the product does not exist.
pub async fn restock(id: i32, quantity: i32) -> Result<(), CommandError> {
    if quantity <= 0 {
        return Err(CommandError::InvalidArgument(
            "quantity must be positive".to_string(),
        ));
    }

    let pool = connect().await?;
    let mut conn = pool.acquire().await?;
    if !products::restore_stock(&mut conn, ProductId::new(id), quantity).await? {
        return Err(CommandError::ProductNotFound(id));
    }

    tracing::info!(product_id = id, quantity, "Product restocked");
    Ok(())
}

fn validate_new_product(name: &str, price: Decimal, stock: i32) -> Result<NewProduct, CommandError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::InvalidArgument("name is required".to_string()));
    }
    if price.is_sign_negative() {
        return Err(CommandError::InvalidArgument(
            "price cannot be negative".to_string(),
        ));
    }
    if stock < 0 {
        return Err(CommandError::InvalidArgument(
            "stock cannot be negative".to_string(),
        ));
    }
    Ok(NewProduct {
        name: name.to_string(),
        price: price.round_dp(2),
        stock,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_validate_new_product() {
        let product = validate_new_product("  Mug ", Decimal::from_str("4.505").unwrap(), 3).unwrap();
        assert_eq!(product.name, "Mug");
        assert_eq!(product.price, Decimal::from_str("4.50").unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(validate_new_product(" ", Decimal::ONE, 1).is_err());
        assert!(validate_new_product("Mug", Decimal::NEGATIVE_ONE, 1).is_err());
        assert!(validate_new_product("Mug", Decimal::ONE, -1).is_err());
    }
}
