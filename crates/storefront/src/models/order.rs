//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marketstall_core::inventory::LineStock;
use marketstall_core::{AddressId, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

/// Shipping details copied onto an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Check the required fields are non-blank.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first blank required field.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(format!("shipping {field} is required"));
            }
        }
        Ok(())
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub shipping: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// One line of an order.
///
/// `product_id` is cleared when the product is deleted; `quantity` may be
/// null on legacy rows and then counts as zero.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    /// Product name at checkout.
    pub product_name: String,
    pub quantity: Option<i32>,
    /// Product price at checkout.
    pub unit_price: Decimal,
}

impl OrderItem {
    /// `unit_price * quantity`, zero when the quantity is missing.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.unwrap_or(0))
    }

    /// View of this line for stock bookkeeping.
    #[must_use]
    pub const fn stock(&self) -> LineStock {
        LineStock {
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Where checkout takes the shipping address from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShippingSource {
    /// Given inline in the request.
    Provided(ShippingAddress),
    /// One of the user's saved addresses.
    Saved(AddressId),
    /// The user's default address.
    Default,
}

/// Validated checkout request.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub payment_method: PaymentMethod,
    pub shipping: ShippingSource,
}

/// Totals computed from the lines being ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Sum `unit_price * quantity` over the lines; shipping is free.
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal: Decimal = lines
            .into_iter()
            .map(|(price, quantity)| price * Decimal::from(quantity))
            .sum();
        let shipping_cost = Decimal::ZERO;
        Self {
            subtotal,
            shipping_cost,
            total: subtotal + shipping_cost,
        }
    }
}

/// Fields for inserting an order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub shipping: ShippingAddress,
}

/// Fields for inserting an order line.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Outcome of canceling a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemCancellation {
    /// Status of the order after the line was removed.
    pub order_status: OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_totals_from_lines() {
        let totals = OrderTotals::from_lines([(dec("4.25"), 2), (dec("10.00"), 1)]);
        assert_eq!(totals.subtotal, dec("18.50"));
        assert_eq!(totals.shipping_cost, Decimal::ZERO);
        assert_eq!(totals.total, dec("18.50"));
    }

    #[test]
    fn test_item_line_total_with_missing_quantity() {
        let item = OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            product_id: None,
            product_name: "Gone".into(),
            quantity: None,
            unit_price: dec("3.00"),
        };
        assert_eq!(item.line_total(), Decimal::ZERO);
        assert_eq!(item.stock().product_id, None);
    }

    #[test]
    fn test_shipping_validate() {
        let mut shipping = ShippingAddress {
            name: "Jane".into(),
            line1: "1 Main St".into(),
            line2: None,
            city: "Springfield".into(),
            region: String::new(),
            postal_code: "62701".into(),
            country: "US".into(),
            phone: None,
        };
        assert!(shipping.validate().is_ok());
        shipping.postal_code = " ".into();
        assert_eq!(
            shipping.validate().unwrap_err(),
            "shipping postal_code is required"
        );
    }
}
