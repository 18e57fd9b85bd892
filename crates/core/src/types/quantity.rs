//! Cart and order line quantities.
//!
//! Clients send quantities as JSON numbers or numeric strings (`2`, `"2"`).
//! [`RawQuantity`] accepts whatever shape arrived; conversion into a
//! [`Quantity`] is where the rules live.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound for a single line; keeps `stock + quantity` far from `i32` overflow.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Errors produced when validating a quantity.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// The value is not an integer (fractional number, non-numeric string, object...).
    #[error("Quantity must be an integer")]
    NotInteger,
    /// The value is zero or negative where a positive quantity is required.
    #[error("Quantity must be positive")]
    NotPositive,
    /// The value is negative where zero is allowed.
    #[error("Quantity cannot be negative")]
    Negative,
    /// The value exceeds [`MAX_LINE_QUANTITY`].
    #[error("Quantity must be at most {MAX_LINE_QUANTITY}")]
    TooLarge,
}

/// A quantity exactly as it arrived in a request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawQuantity {
    /// A JSON integer.
    Int(i64),
    /// A JSON float; accepted only when it has no fractional part.
    Float(f64),
    /// A string such as `"3"`.
    Text(String),
    /// Anything else (bool, object, array).
    Other(serde::de::IgnoredAny),
}

impl RawQuantity {
    /// Interpret the raw value as an integer.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotInteger` if the value has no integer reading.
    pub fn as_integer(&self) -> Result<i64, QuantityError> {
        match self {
            Self::Int(n) => Ok(*n),
            #[allow(clippy::cast_possible_truncation)] // guarded by the range check
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(*f as i64),
            Self::Text(s) => s.trim().parse::<i64>().map_err(|_| QuantityError::NotInteger),
            Self::Float(_) | Self::Other(_) => Err(QuantityError::NotInteger),
        }
    }

    /// Validate as a strictly positive quantity (cart add, guest cart lines).
    ///
    /// # Errors
    ///
    /// Returns `NotInteger`, `NotPositive`, or `TooLarge`.
    pub fn positive(&self) -> Result<Quantity, QuantityError> {
        Quantity::try_from(self.as_integer()?)
    }

    /// Validate as a quantity that may be zero (cart quantity updates).
    ///
    /// Returns `None` for zero, meaning "delete the line".
    ///
    /// # Errors
    ///
    /// Returns `NotInteger`, `Negative`, or `TooLarge`.
    pub fn non_negative(&self) -> Result<Option<Quantity>, QuantityError> {
        match self.as_integer()? {
            0 => Ok(None),
            n if n < 0 => Err(QuantityError::Negative),
            n => Quantity::try_from(n).map(Some),
        }
    }
}

impl From<i64> for RawQuantity {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// A validated, strictly positive line quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Quantity(i32);

impl Quantity {
    /// A quantity of one, the default when a request omits the field.
    pub const ONE: Self = Self(1);

    /// Create a quantity, rejecting zero, negatives and values above the line cap.
    ///
    /// # Errors
    ///
    /// Returns `NotPositive` or `TooLarge`.
    pub const fn new(n: i32) -> Result<Self, QuantityError> {
        if n <= 0 {
            return Err(QuantityError::NotPositive);
        }
        if n > MAX_LINE_QUANTITY {
            return Err(QuantityError::TooLarge);
        }
        Ok(Self(n))
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Add two quantities, saturating at [`MAX_LINE_QUANTITY`].
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(MAX_LINE_QUANTITY))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        if n <= 0 {
            return Err(QuantityError::NotPositive);
        }
        let n = i32::try_from(n).map_err(|_| QuantityError::TooLarge)?;
        Self::new(n)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawQuantity::deserialize(deserializer)?
            .positive()
            .map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawQuantity {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_positive_accepts_integers_and_numeric_strings() {
        assert_eq!(raw("3").positive().unwrap().get(), 3);
        assert_eq!(raw("\"4\"").positive().unwrap().get(), 4);
        assert_eq!(raw("\" 5 \"").positive().unwrap().get(), 5);
        assert_eq!(raw("2.0").positive().unwrap().get(), 2);
    }

    #[test]
    fn test_positive_rejections() {
        assert_eq!(raw("0").positive(), Err(QuantityError::NotPositive));
        assert_eq!(raw("-1").positive(), Err(QuantityError::NotPositive));
        assert_eq!(raw("1.5").positive(), Err(QuantityError::NotInteger));
        assert_eq!(raw("\"two\"").positive(), Err(QuantityError::NotInteger));
        assert_eq!(raw("true").positive(), Err(QuantityError::NotInteger));
        assert_eq!(raw("{}").positive(), Err(QuantityError::NotInteger));
        assert_eq!(raw("10001").positive(), Err(QuantityError::TooLarge));
        assert_eq!(raw("99999999999").positive(), Err(QuantityError::TooLarge));
    }

    #[test]
    fn test_non_negative_zero_means_delete() {
        assert_eq!(raw("0").non_negative().unwrap(), None);
        assert_eq!(raw("\"0\"").non_negative().unwrap(), None);
        assert_eq!(raw("7").non_negative().unwrap().map(Quantity::get), Some(7));
        assert_eq!(raw("-3").non_negative(), Err(QuantityError::Negative));
    }

    #[test]
    fn test_saturating_add_caps_at_line_maximum() {
        let a = Quantity::new(MAX_LINE_QUANTITY - 1).unwrap();
        let b = Quantity::new(5).unwrap();
        assert_eq!(a.saturating_add(b).get(), MAX_LINE_QUANTITY);
        assert_eq!(Quantity::ONE.saturating_add(Quantity::ONE).get(), 2);
    }

    #[test]
    fn test_deserialize_quantity_directly() {
        let q: Quantity = serde_json::from_str("\"6\"").unwrap();
        assert_eq!(q.get(), 6);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
