//! Marketstall Core - Shared domain types and rules.
//!
//! This crate provides the types and pure rules shared by the Marketstall crates:
//! - `storefront` - JSON API server for accounts, carts, and orders
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Anything that decides *what* to write (which cart lines a
//! guest payload produces, how much stock a cancellation returns) lives here so
//! it can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, quantities, and order statuses
//! - [`cart`] - Guest cart payload parsing and merge planning
//! - [`inventory`] - Restock planning for canceled order lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod inventory;
pub mod types;

pub use types::*;
