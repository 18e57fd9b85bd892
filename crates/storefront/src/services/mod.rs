//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password login and registration, guest cart hand-off, profiles
//! - `cart` - Persisted cart operations and guest cart merging
//! - `orders` - Checkout and cancellation
//! - `inventory` - Stock commits and restores
//! - `addresses` - Address book with a single default per user
//!
//! Each mutating method opens its own transaction and commits only on the
//! success path; an early `?` return drops the transaction, which rolls it back.

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod inventory;
pub mod orders;
