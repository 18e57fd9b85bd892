//! Core types for Marketstall.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod quantity;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use quantity::{MAX_LINE_QUANTITY, Quantity, QuantityError, RawQuantity};
pub use status::*;
