//! Form validation error shared by the address, review, card and account forms.

use thiserror::Error;

/// A single rejected form field.
///
/// The storefront shows `message` in a toast and uses `field` to highlight
/// the input, so the message is written for shoppers, not developers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Form field name (matches the HTML `name` attribute).
    pub field: &'static str,
    /// Shopper-facing explanation.
    pub message: String,
}

impl ValidationError {
    /// Build an error for `field`.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Return an error when a trimmed value is empty.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming `field` when `value` is blank.
pub fn require(field: &'static str, label: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, format!("{label} is required")));
    }
    Ok(())
}

/// Trim and turn blank optional input into `None`.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
