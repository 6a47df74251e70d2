//! Shopfront Core - domain types and pure storefront logic.
//!
//! Used by the `storefront` binary and the integration tests. The crate holds
//! no I/O: no HTTP clients, no sockets, no session store. Everything here can
//! be exercised with plain unit tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, email and status enums
//! - [`catalog`] - Products, categories, catalog query and pagination
//! - [`cart`] - The session cart
//! - [`pricing`] - Promo codes, shipping and order totals
//! - [`checkout`] - The address / payment / review wizard
//! - [`address`] - Address book entries and validation
//! - [`order`] - Orders and the order payload
//! - [`review`] - Reviews and review eligibility
//! - [`local`] - Recently viewed products and the wishlist
//! - [`notification`] - Notifications and the dropdown feed

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod local;
pub mod notification;
pub mod order;
pub mod pricing;
pub mod review;
pub mod types;
pub mod validation;

pub use types::*;
pub use validation::ValidationError;
