//! Session-held models for the storefront.

pub mod session;

pub use session::{BearerToken, CurrentUser, keys as session_keys};
