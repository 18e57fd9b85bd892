//! Persisted cart types.

use rust_decimal::Decimal;
use serde::Serialize;

use marketstall_core::{CartItemId, ProductId};

/// One line of a user's cart, joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    /// Current catalog price of the product.
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A user's cart contents with totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    /// Sum of line quantities.
    pub item_count: i64,
    /// Sum of line totals.
    pub subtotal: Decimal,
}

impl From<Vec<CartLine>> for Cart {
    fn from(items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = items.iter().map(CartLine::line_total).sum();
        Self {
            items,
            item_count,
            subtotal,
        }
    }
}

/// Result of setting a line's quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// The line now has the requested quantity.
    Updated(CartLine),
    /// Quantity zero removed the line.
    Removed,
}

/// A cart line locked for checkout, with the product's price and name at that moment.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn line(id: i32, price: &str, quantity: i32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            product_name: format!("Product {id}"),
            unit_price: Decimal::from_str(price).unwrap_or_default(),
            quantity,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(1, "2.50", 3).line_total(), Decimal::from_str("7.50").unwrap_or_default());
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart::from(vec![line(1, "2.50", 2), line(2, "10.00", 1)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, Decimal::from_str("15.00").unwrap_or_default());
    }

    #[test]
    fn test_empty_cart_totals() {
        let cart = Cart::from(Vec::new());
        assert_eq!(cart.item_count, 0);
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }
}
