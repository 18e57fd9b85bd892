//! Restock planning for canceled order lines.
//!
//! Canceling returns each line's quantity to its product's stock. Lines can
//! outlive their product (the foreign key is `ON DELETE SET NULL`) and legacy
//! rows may carry a null quantity, so both contribute nothing instead of
//! failing the cancellation.

use std::collections::BTreeMap;

use crate::types::ProductId;

/// An order line as seen by the inventory ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStock {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i32>,
}

/// Stock to return to a single product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restock {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Aggregate order lines into one restock per product, ordered by product id.
///
/// Lines without a product and lines whose quantity is missing or non-positive
/// are dropped. Ordering by product id gives concurrent cancellations a
/// consistent lock order on product rows.
#[must_use]
pub fn plan_restock<I>(lines: I) -> Vec<Restock>
where
    I: IntoIterator<Item = LineStock>,
{
    let mut totals: BTreeMap<ProductId, i32> = BTreeMap::new();
    for line in lines {
        let (Some(product_id), Some(quantity)) = (line.product_id, line.quantity) else {
            continue;
        };
        if quantity <= 0 {
            continue;
        }
        let total = totals.entry(product_id).or_insert(0);
        *total = total.saturating_add(quantity);
    }

    totals
        .into_iter()
        .map(|(product_id, quantity)| Restock {
            product_id,
            quantity,
        })
        .collect()
}
