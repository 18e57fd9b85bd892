//! Address book types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketstall_core::{AddressId, UserId};

use super::order::ShippingAddress;

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    /// Pre-selected at checkout; at most one per user.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Snapshot this address onto an order.
    #[must_use]
    pub fn to_shipping(&self) -> ShippingAddress {
        ShippingAddress {
            name: self.full_name.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// A complete address as written to the database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
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
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Trim every field and check the required ones are present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first blank required field.
    pub fn validate(mut self) -> Result<Self, String> {
        for (field, value) in [
            ("full_name", &mut self.full_name),
            ("line1", &mut self.line1),
            ("city", &mut self.city),
            ("postal_code", &mut self.postal_code),
            ("country", &mut self.country),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        self.region = self.region.trim().to_string();
        self.line2 = non_blank(self.line2);
        self.phone = non_blank(self.phone);
        Ok(self)
    }
}

/// A partial address update (`PATCH`); `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressPatch {
    pub full_name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    /// Overlay this patch on an existing address.
    #[must_use]
    pub fn apply(self, current: &Address) -> AddressInput {
        AddressInput {
            full_name: self.full_name.unwrap_or_else(|| current.full_name.clone()),
            line1: self.line1.unwrap_or_else(|| current.line1.clone()),
            line2: self.line2.or_else(|| current.line2.clone()),
            city: self.city.unwrap_or_else(|| current.city.clone()),
            region: self.region.unwrap_or_else(|| current.region.clone()),
            postal_code: self.postal_code.unwrap_or_else(|| current.postal_code.clone()),
            country: self.country.unwrap_or_else(|| current.country.clone()),
            phone: self.phone.or_else(|| current.phone.clone()),
            is_default: self.is_default.unwrap_or(current.is_default),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: " Jane Doe ".into(),
            line1: "1 Main St".into(),
            line2: Some("  ".into()),
            city: "Springfield".into(),
            region: "IL".into(),
            postal_code: "62701".into(),
            country: "US".into(),
            phone: None,
            is_default: false,
        }
    }

    fn stored() -> Address {
        Address {
            id: AddressId::new(4),
            user_id: UserId::new(1),
            full_name: "Jane Doe".into(),
            line1: "1 Main St".into(),
            line2: Some("Apt 2".into()),
            city: "Springfield".into(),
            region: "IL".into(),
            postal_code: "62701".into(),
            country: "US".into(),
            phone: Some("555-0100".into()),
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_trims_and_drops_blank_optionals() {
        let valid = input().validate().unwrap();
        assert_eq!(valid.full_name, "Jane Doe");
        assert_eq!(valid.line2, None);
    }

    #[test]
    fn test_validate_rejects_blank_required_field() {
        let mut bad = input();
        bad.city = "   ".into();
        assert_eq!(bad.validate().unwrap_err(), "city is required");
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let patch = AddressPatch {
            city: Some("Shelbyville".into()),
            ..Default::default()
        };
        let merged = patch.apply(&stored());
        assert_eq!(merged.city, "Shelbyville");
        assert_eq!(merged.line2.as_deref(), Some("Apt 2"));
        assert!(merged.is_default);
    }

    #[test]
    fn test_to_shipping_copies_fields() {
        let shipping = stored().to_shipping();
        assert_eq!(shipping.name, "Jane Doe");
        assert_eq!(shipping.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_input_deserializes_with_defaults() {
        let parsed: AddressInput = serde_json::from_value(serde_json::json!({
            "full_name": "Jane",
            "line1": "1 Main St",
            "city": "Springfield",
            "postal_code": "62701",
            "country": "US"
        }))
        .unwrap();
        assert!(!parsed.is_default);
        assert_eq!(parsed.region, "");
    }
}
