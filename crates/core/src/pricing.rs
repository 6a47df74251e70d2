//! Promo codes, shipping and order totals.
//!
//! The storefront shows totals before the backend sees the order, so the
//! arithmetic here has to match the backend rule: total equals the item
//! subtotal minus the discount plus shipping.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Money;

/// Errors parsing or applying promo codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoError {
    /// Malformed `CODE=percent` entry in configuration.
    #[error("invalid promo entry '{0}' (expected CODE=percent)")]
    InvalidEntry(String),
    /// Percentage outside (0, 100].
    #[error("promo {code} has invalid percentage {percent}")]
    InvalidPercent { code: String, percent: Decimal },
    /// Code not recognised.
    #[error("promo code '{0}' is not valid")]
    Unknown(String),
}

/// A percentage-off promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub percent_off: Decimal,
}

impl PromoCode {
    /// Create a promo, upper-casing the code.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::InvalidPercent`] unless `0 < percent_off <= 100`.
    pub fn new(code: &str, percent_off: Decimal) -> Result<Self, PromoError> {
        let code = code.trim().to_uppercase();
        if percent_off <= Decimal::ZERO || percent_off > Decimal::ONE_HUNDRED {
            return Err(PromoError::InvalidPercent {
                code,
                percent: percent_off,
            });
        }
        Ok(Self { code, percent_off })
    }

    /// Discount on `subtotal`, rounded to cents.
    #[must_use]
    pub fn discount_on(&self, subtotal: Money) -> Money {
        Money::new(subtotal.amount() * self.percent_off / Decimal::ONE_HUNDRED).round_to_cents()
    }

    /// Label such as `WELCOME10 (10% off)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({}% off)", self.code, self.percent_off.normalize())
    }
}

/// The set of promo codes the store accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromoBook {
    codes: HashMap<String, PromoCode>,
}

impl PromoBook {
    /// Build from promos.
    #[must_use]
    pub fn new(promos: impl IntoIterator<Item = PromoCode>) -> Self {
        Self {
            codes: promos
                .into_iter()
                .map(|promo| (promo.code.clone(), promo))
                .collect(),
        }
    }

    /// Parse a `CODE=percent,CODE=percent` list.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError`] for the first malformed entry.
    pub fn parse(list: &str) -> Result<Self, PromoError> {
        let mut promos = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, percent) = entry
                .split_once('=')
                .ok_or_else(|| PromoError::InvalidEntry(entry.to_string()))?;
            let percent = percent
                .trim()
                .parse::<Decimal>()
                .map_err(|_| PromoError::InvalidEntry(entry.to_string()))?;
            if code.trim().is_empty() {
                return Err(PromoError::InvalidEntry(entry.to_string()));
            }
            promos.push(PromoCode::new(code, percent)?);
        }
        Ok(Self::new(promos))
    }

    /// Look a code up, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::Unknown`] when the code is not accepted.
    pub fn lookup(&self, code: &str) -> Result<PromoCode, PromoError> {
        let key = code.trim().to_uppercase();
        self.codes
            .get(&key)
            .cloned()
            .ok_or(PromoError::Unknown(key))
    }

    /// Number of configured codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no codes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Money,
    pub free_over: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Money::from_cents(500),
            free_over: Money::from_cents(5000),
        }
    }
}

impl ShippingPolicy {
    /// Shipping for a subtotal: free for an empty cart or at the threshold.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal.is_zero() || subtotal >= self.free_over {
            Money::ZERO
        } else {
            self.flat_fee
        }
    }

    /// How much more the shopper needs for free shipping.
    #[must_use]
    pub fn remaining_for_free(&self, subtotal: Money) -> Option<Money> {
        if subtotal.is_zero() || subtotal >= self.free_over {
            None
        } else {
            Some(self.free_over - subtotal)
        }
    }
}

/// Computed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    /// `total = subtotal - discount + shipping`, never negative.
    ///
    /// Shipping is decided on the pre-discount subtotal.
    #[must_use]
    pub fn compute(subtotal: Money, promo: Option<&PromoCode>, shipping: &ShippingPolicy) -> Self {
        let discount = promo.map_or(Money::ZERO, |p| p.discount_on(subtotal));
        let shipping = shipping.shipping_for(subtotal);
        let total = (subtotal - discount + shipping).max_zero().round_to_cents();
        Self {
            subtotal,
            discount,
            shipping,
            total,
        }
    }
}
