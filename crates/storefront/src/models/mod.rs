//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the internal row types
//! in [`crate::db`].

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;
