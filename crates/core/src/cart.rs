//! Guest cart payloads and merge planning.
//!
//! A guest cart is whatever the browser kept in local storage before the shopper
//! signed in. It arrives at login, registration, and `POST /api/cart/merge` as a
//! JSON list whose elements are only loosely shaped:
//!
//! ```json
//! [
//!   { "product": 12, "quantity": 2 },
//!   { "product": { "id": 7, "name": "Tea" }, "quantity": "1" },
//!   { "product_id": 9 },
//!   { "quantity": 4 }
//! ]
//! ```
//!
//! Elements that do not name a product, or whose quantity is not a positive
//! integer, are skipped rather than failing the whole request. The remaining
//! lines are folded into one [`MergeLine`] per product so the database sees a
//! single upsert-increment per (user, product).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ProductId, Quantity, QuantityError, RawQuantity};

/// Why a guest cart element was left out of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// The element is not a JSON object.
    #[error("cart line is not an object")]
    NotAnObject,
    /// No usable product id was found.
    #[error("cart line has no product id")]
    MissingProduct,
    /// The quantity is present but not a positive integer.
    #[error("cart line quantity is invalid: {0}")]
    InvalidQuantity(QuantityError),
}

/// A guest cart element that was skipped, with its position in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedLine {
    pub index: usize,
    pub reason: SkipReason,
}

/// One upsert-increment to apply to a persisted cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeLine {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// The writes a guest cart turns into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// One line per distinct product, ordered by product id.
    pub lines: Vec<MergeLine>,
    /// Elements that were ignored.
    pub skipped: Vec<SkippedLine>,
}

impl MergePlan {
    /// Whether the plan writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A guest cart exactly as submitted by the client.
///
/// Must be a JSON array; its elements are validated lazily by [`GuestCart::plan`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestCart(Vec<Value>);

impl GuestCart {
    /// Build a guest cart from raw JSON elements.
    #[must_use]
    pub const fn new(items: Vec<Value>) -> Self {
        Self(items)
    }

    /// Number of submitted elements, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no elements were submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append another payload's elements after this one's.
    pub fn append(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Fold the payload into one merge line per product.
    ///
    /// Quantities for the same product are summed (saturating at the line cap);
    /// a missing quantity counts as one.
    #[must_use]
    pub fn plan(&self) -> MergePlan {
        let mut totals: BTreeMap<ProductId, Quantity> = BTreeMap::new();
        let mut skipped = Vec::new();

        for (index, element) in self.0.iter().enumerate() {
            match parse_line(element) {
                Ok(line) => {
                    totals
                        .entry(line.product_id)
                        .and_modify(|q| *q = q.saturating_add(line.quantity))
                        .or_insert(line.quantity);
                }
                Err(reason) => skipped.push(SkippedLine { index, reason }),
            }
        }

        MergePlan {
            lines: totals
                .into_iter()
                .map(|(product_id, quantity)| MergeLine {
                    product_id,
                    quantity,
                })
                .collect(),
            skipped,
        }
    }
}

impl From<Vec<MergeLine>> for GuestCart {
    fn from(lines: Vec<MergeLine>) -> Self {
        Self(
            lines
                .into_iter()
                .map(|l| {
                    serde_json::json!({
                        "product": l.product_id.as_i32(),
                        "quantity": l.quantity.get(),
                    })
                })
                .collect(),
        )
    }
}

/// Parse one guest cart element.
///
/// # Errors
///
/// Returns the [`SkipReason`] when the element cannot become a cart line.
pub fn parse_line(element: &Value) -> Result<MergeLine, SkipReason> {
    let Value::Object(fields) = element else {
        return Err(SkipReason::NotAnObject);
    };

    let product_id = fields
        .get("product")
        .or_else(|| fields.get("product_id"))
        .and_then(product_id_from)
        .ok_or(SkipReason::MissingProduct)?;

    let quantity = match fields.get("quantity") {
        None | Some(Value::Null) => Quantity::ONE,
        Some(raw) => RawQuantity::deserialize(raw)
            .map_err(|_| SkipReason::InvalidQuantity(QuantityError::NotInteger))?
            .positive()
            .map_err(SkipReason::InvalidQuantity)?,
    };

    Ok(MergeLine {
        product_id,
        quantity,
    })
}

/// Extract a product id from a bare id, a numeric string, or an object with an `id`.
fn product_id_from(value: &Value) -> Option<ProductId> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Object(obj) => return obj.get("id").and_then(product_id_from),
        _ => return None,
    };
    i32::try_from(id)
        .ok()
        .filter(|id| *id > 0)
        .map(ProductId::new)
}
