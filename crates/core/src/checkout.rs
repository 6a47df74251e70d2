//! Checkout wizard: address, payment, review, then placement.
//!
//! The draft lives in the shopper's session between requests. Each step
//! only becomes reachable once the steps before it hold valid data, and
//! [`CheckoutDraft::ready`] is the single gate in front of order placement.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::ShippingAddress;
use crate::pricing::PromoCode;
use crate::types::{AddressId, PaymentMethod};
use crate::validation::ValidationError;

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Address,
    Payment,
    Review,
}

impl CheckoutStep {
    /// All steps, for the progress bar.
    pub const ALL: [Self; 3] = [Self::Address, Self::Payment, Self::Review];

    /// Progress bar label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Address => "Shipping address",
            Self::Payment => "Payment",
            Self::Review => "Review & place order",
        }
    }

    /// 1-based position.
    #[must_use]
    pub const fn number(self) -> usize {
        match self {
            Self::Address => 1,
            Self::Payment => 2,
            Self::Review => 3,
        }
    }

    const fn previous(self) -> Self {
        match self {
            Self::Address | Self::Payment => Self::Address,
            Self::Review => Self::Payment,
        }
    }
}

/// Errors from wizard transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// A form field failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// A later step was requested before its prerequisites were met.
    #[error("complete the {0} step first")]
    StepLocked(&'static str),
    /// The cart is empty.
    #[error("your cart is empty")]
    EmptyCart,
}

/// What the card validator lets through: nothing that could charge the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub brand: CardBrand,
    pub last4: String,
    pub holder: String,
    pub exp_month: u32,
    pub exp_year: i32,
}

/// Card network, guessed from the number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Other,
}

impl CardBrand {
    fn detect(digits: &str) -> Self {
        let prefix2: u32 = digits.get(..2).and_then(|p| p.parse().ok()).unwrap_or(0);
        let prefix4: u32 = digits.get(..4).and_then(|p| p.parse().ok()).unwrap_or(0);
        if digits.starts_with('4') {
            Self::Visa
        } else if (51..=55).contains(&prefix2) || (2221..=2720).contains(&prefix4) {
            Self::Mastercard
        } else if prefix2 == 34 || prefix2 == 37 {
            Self::Amex
        } else if prefix4 == 6011 || prefix2 == 65 {
            Self::Discover
        } else {
            Self::Other
        }
    }

    /// Display name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Visa => "Visa",
            Self::Mastercard => "Mastercard",
            Self::Amex => "American Express",
            Self::Discover => "Discover",
            Self::Other => "Card",
        }
    }
}

/// Raw card form input.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardDetails {
    #[serde(default)]
    pub holder: String,
    #[serde(default)]
    pub number: String,
    /// `MM/YY`.
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub cvc: String,
}

impl CardDetails {
    /// Validate the card against `today` and reduce it to a summary.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for the first invalid field.
    pub fn validate(&self, today: NaiveDate) -> Result<CardSummary, ValidationError> {
        let holder = self.holder.trim();
        if holder.is_empty() {
            return Err(ValidationError::new("holder", "Cardholder name is required"));
        }

        let digits: String = self
            .number
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if !digits.chars().all(|c| c.is_ascii_digit())
            || !(12..=19).contains(&digits.len())
            || !luhn_valid(&digits)
        {
            return Err(ValidationError::new("number", "Card number is not valid"));
        }

        let (exp_month, exp_year) = parse_expiry(&self.expiry)
            .ok_or_else(|| ValidationError::new("expiry", "Expiry must be MM/YY"))?;
        let current = (today.year(), today.month());
        if (exp_year, exp_month) < current {
            return Err(ValidationError::new("expiry", "Card has expired"));
        }

        let cvc = self.cvc.trim();
        if !(3..=4).contains(&cvc.len()) || !cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new("cvc", "Security code must be 3 or 4 digits"));
        }

        let last4 = digits.get(digits.len() - 4..).unwrap_or_default().to_string();
        Ok(CardSummary {
            brand: CardBrand::detect(&digits),
            last4,
            holder: holder.to_string(),
            exp_month,
            exp_year,
        })
    }
}

/// Luhn checksum over an all-digit string.
#[must_use]
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    !digits.is_empty() && sum % 10 == 0
}

fn parse_expiry(raw: &str) -> Option<(u32, i32)> {
    let (month, year) = raw.trim().split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let year = year.trim();
    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };
    (1..=12).contains(&month).then_some((month, year))
}

/// The chosen payment branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentChoice {
    CashOnDelivery,
    Card(CardSummary),
}

impl PaymentChoice {
    /// Method and card summary, as the order payload wants them.
    #[must_use]
    pub fn into_parts(self) -> (PaymentMethod, Option<CardSummary>) {
        match self {
            Self::CashOnDelivery => (PaymentMethod::CashOnDelivery, None),
            Self::Card(card) => (PaymentMethod::Card, Some(card)),
        }
    }

    /// Payment method.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::CashOnDelivery => PaymentMethod::CashOnDelivery,
            Self::Card(_) => PaymentMethod::Card,
        }
    }

    /// Summary line for the review step.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CashOnDelivery => PaymentMethod::CashOnDelivery.label().to_string(),
            Self::Card(card) => format!(
                "{} ending in {} (exp {:02}/{})",
                card.brand.label(),
                card.last4,
                card.exp_month,
                card.exp_year % 100
            ),
        }
    }
}

/// Checkout state kept between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub step: CheckoutStep,
    pub address: Option<ShippingAddress>,
    /// Saved address the shipping address came from, if any.
    pub address_id: Option<AddressId>,
    pub payment: Option<PaymentChoice>,
    pub promo: Option<PromoCode>,
}

/// A draft with everything needed to place the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceableCheckout {
    pub address: ShippingAddress,
    pub payment: PaymentChoice,
    pub promo: Option<PromoCode>,
}

impl CheckoutDraft {
    /// Record the shipping address and move to payment.
    pub fn submit_address(&mut self, address: ShippingAddress, address_id: Option<AddressId>) {
        self.address = Some(address);
        self.address_id = address_id;
        self.step = CheckoutStep::Payment;
    }

    /// Record the payment choice and move to review.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepLocked`] when no address was given yet.
    pub fn submit_payment(&mut self, payment: PaymentChoice) -> Result<(), CheckoutError> {
        if self.address.is_none() {
            self.step = CheckoutStep::Address;
            return Err(CheckoutError::StepLocked(CheckoutStep::Address.label()));
        }
        self.payment = Some(payment);
        self.step = CheckoutStep::Review;
        Ok(())
    }

    /// Go back one step. Data already entered is kept.
    pub fn back(&mut self) {
        self.step = self.step.previous();
    }

    /// Whether `step` may be shown.
    #[must_use]
    pub const fn can_visit(&self, step: CheckoutStep) -> bool {
        match step {
            CheckoutStep::Address => true,
            CheckoutStep::Payment => self.address.is_some(),
            CheckoutStep::Review => self.address.is_some() && self.payment.is_some(),
        }
    }

    /// Jump to a step whose prerequisites are met.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepLocked`] naming the first missing step.
    pub fn goto(&mut self, step: CheckoutStep) -> Result<(), CheckoutError> {
        if !self.can_visit(step) {
            let missing = if self.address.is_none() {
                CheckoutStep::Address
            } else {
                CheckoutStep::Payment
            };
            return Err(CheckoutError::StepLocked(missing.label()));
        }
        self.step = step;
        Ok(())
    }

    /// Apply a promo code (replaces any previous one).
    pub fn apply_promo(&mut self, promo: PromoCode) {
        self.promo = Some(promo);
    }

    /// Remove the promo code.
    pub fn remove_promo(&mut self) {
        self.promo = None;
    }

    /// Everything needed to place the order, or the step still missing.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepLocked`] unless the draft is on the review
    /// step with an address and a payment choice.
    pub fn ready(&self) -> Result<PlaceableCheckout, CheckoutError> {
        let address = self
            .address
            .clone()
            .ok_or(CheckoutError::StepLocked(CheckoutStep::Address.label()))?;
        let payment = self
            .payment
            .clone()
            .ok_or(CheckoutError::StepLocked(CheckoutStep::Payment.label()))?;
        if self.step != CheckoutStep::Review {
            return Err(CheckoutError::StepLocked(CheckoutStep::Review.label()));
        }
        Ok(PlaceableCheckout {
            address,
            payment,
            promo: self.promo.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn card(number: &str, expiry: &str) -> CardDetails {
        CardDetails {
            holder: "Ada Lovelace".to_string(),
            number: number.to_string(),
            expiry: expiry.to_string(),
            cvc: "123".to_string(),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada".to_string(),
            street: "1 Main St".to_string(),
            city: "Town".to_string(),
            state: None,
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4242424242424242"));
        assert!(luhn_valid("5555555555554444"));
        assert!(!luhn_valid("4242424242424241"));
        assert!(!luhn_valid(""));
    }

    #[test]
    fn test_card_summary_keeps_only_safe_fields() {
        let summary = card("4242 4242 4242 4242", "12/27").validate(today()).unwrap();
        assert_eq!(summary.brand, CardBrand::Visa);
        assert_eq!(summary.last4, "4242");
        assert_eq!((summary.exp_month, summary.exp_year), (12, 2027));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("4242424242424242"));
    }

    #[test]
    fn test_card_rejections() {
        assert_eq!(
            card("4242424242424241", "12/27").validate(today()).unwrap_err().field,
            "number"
        );
        assert_eq!(
            card("4242424242424242", "05/25").validate(today()).unwrap_err().field,
            "expiry"
        );
        assert_eq!(
            card("4242424242424242", "13/27").validate(today()).unwrap_err().field,
            "expiry"
        );
        let mut no_cvc = card("5555555555554444", "06/25");
        no_cvc.cvc = "12".to_string();
        assert_eq!(no_cvc.validate(today()).unwrap_err().field, "cvc");
    }

    #[test]
    fn test_current_month_is_still_valid() {
        let summary = card("5555555555554444", "06/2025").validate(today()).unwrap();
        assert_eq!(summary.brand, CardBrand::Mastercard);
    }

    #[test]
    fn test_wizard_happy_path() {
        let mut draft = CheckoutDraft::default();
        assert!(draft.ready().is_err());

        draft.submit_address(address(), None);
        assert_eq!(draft.step, CheckoutStep::Payment);
        draft.submit_payment(PaymentChoice::CashOnDelivery).unwrap();
        assert_eq!(draft.step, CheckoutStep::Review);

        let placeable = draft.ready().unwrap();
        assert_eq!(placeable.payment.method(), PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn test_payment_requires_address() {
        let mut draft = CheckoutDraft::default();
        let err = draft.submit_payment(PaymentChoice::CashOnDelivery).unwrap_err();
        assert!(matches!(err, CheckoutError::StepLocked(_)));
        assert_eq!(draft.step, CheckoutStep::Address);
    }

    #[test]
    fn test_back_keeps_data_and_blocks_placement() {
        let mut draft = CheckoutDraft::default();
        draft.submit_address(address(), None);
        draft.submit_payment(PaymentChoice::CashOnDelivery).unwrap();
        draft.back();
        assert_eq!(draft.step, CheckoutStep::Payment);
        assert!(draft.payment.is_some());
        assert!(draft.ready().is_err());
        draft.goto(CheckoutStep::Review).unwrap();
        assert!(draft.ready().is_ok());
    }

    #[test]
    fn test_goto_locked_step() {
        let mut draft = CheckoutDraft::default();
        assert!(draft.goto(CheckoutStep::Review).is_err());
        assert!(draft.goto(CheckoutStep::Address).is_ok());
    }

    #[test]
    fn test_payment_description() {
        let summary = card("378282246310005", "01/30").validate(today()).unwrap();
        let choice = PaymentChoice::Card(summary);
        assert_eq!(choice.describe(), "American Express ending in 0005 (exp 01/30)");
    }
}
