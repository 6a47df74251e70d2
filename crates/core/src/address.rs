//! Address book entries and shipping addresses.

use serde::{Deserialize, Serialize};

use crate::types::AddressId;
use crate::validation::{ValidationError, non_blank, require};

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "_id", alias = "id")]
    pub id: AddressId,
    pub full_name: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Copy into the shape embedded in an order.
    #[must_use]
    pub fn to_shipping(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            phone: self.phone.clone(),
        }
    }

    /// Pre-fill an edit form.
    #[must_use]
    pub fn to_input(&self) -> AddressInput {
        AddressInput {
            full_name: self.full_name.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            phone: self.phone.clone(),
            is_default: self.is_default,
        }
    }
}

/// Address as embedded in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Single-line rendering for summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.street.as_str(), self.city.as_str()];
        if let Some(state) = self.state.as_deref() {
            parts.push(state);
        }
        parts.push(self.postal_code.as_str());
        parts.push(self.country.as_str());
        parts.join(", ")
    }
}

/// Address form input; also the backend create/update body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Validate and trim.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(self) -> Result<Self, ValidationError> {
        require("full_name", "Full name", &self.full_name)?;
        require("street", "Street", &self.street)?;
        require("city", "City", &self.city)?;
        require("postal_code", "Postal code", &self.postal_code)?;
        require("country", "Country", &self.country)?;

        let postal_code = self.postal_code.trim().to_string();
        if postal_code.len() > 12
            || !postal_code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        {
            return Err(ValidationError::new(
                "postal_code",
                "Postal code may only contain letters, digits, spaces and dashes",
            ));
        }

        let phone = non_blank(self.phone.as_deref());
        if let Some(phone) = &phone {
            let allowed = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
            if !allowed || !(7..=20).contains(&phone.len()) {
                return Err(ValidationError::new(
                    "phone",
                    "Phone number must be 7 to 20 digits",
                ));
            }
        }

        Ok(Self {
            full_name: self.full_name.trim().to_string(),
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: non_blank(self.state.as_deref()),
            postal_code,
            country: self.country.trim().to_string(),
            phone,
            is_default: self.is_default,
        })
    }

    /// Shipping address from validated input.
    #[must_use]
    pub fn to_shipping(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Mirror the backend rule locally: after promoting `id`, exactly that
/// address is the default, and it is listed first.
///
/// Returns `false` (and leaves the list alone) when `id` is not present.
pub fn promote_default(addresses: &mut [Address], id: &AddressId) -> bool {
    if !addresses.iter().any(|a| &a.id == id) {
        return false;
    }
    for address in addresses.iter_mut() {
        address.is_default = &address.id == id;
    }
    sort_default_first(addresses);
    true
}

/// Stable sort with the default address first.
pub fn sort_default_first(addresses: &mut [Address]) {
    addresses.sort_by_key(|a| !a.is_default);
}

/// The default address, falling back to the first one.
#[must_use]
pub fn preferred(addresses: &[Address]) -> Option<&Address> {
    addresses
        .iter()
        .find(|a| a.is_default)
        .or_else(|| addresses.first())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(id: &str, is_default: bool) -> Address {
        Address {
            id: AddressId::new(id),
            full_name: "Ada Lovelace".to_string(),
            street: "12 Analytical Row".to_string(),
            city: "London".to_string(),
            state: None,
            postal_code: "N1 9GU".to_string(),
            country: "UK".to_string(),
            phone: None,
            is_default,
        }
    }

    fn input() -> AddressInput {
        AddressInput {
            full_name: " Ada Lovelace ".to_string(),
            street: "12 Analytical Row".to_string(),
            city: "London".to_string(),
            state: Some("  ".to_string()),
            postal_code: " N1 9GU ".to_string(),
            country: "UK".to_string(),
            phone: Some("+44 20 7946 0000".to_string()),
            is_default: false,
        }
    }

    #[test]
    fn test_promote_default_is_unique() {
        let mut list = vec![address("a", true), address("b", false), address("c", true)];
        assert!(promote_default(&mut list, &AddressId::new("b")));
        assert_eq!(list.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(list[0].id.as_str(), "b");
        assert!(!promote_default(&mut list, &AddressId::new("zzz")));
        assert_eq!(list[0].id.as_str(), "b");
    }

    #[test]
    fn test_preferred_falls_back_to_first() {
        let list = vec![address("a", false), address("b", false)];
        assert_eq!(preferred(&list).unwrap().id.as_str(), "a");
        assert!(preferred(&[]).is_none());
    }

    #[test]
    fn test_validate_trims_and_normalizes() {
        let valid = input().validate().unwrap();
        assert_eq!(valid.full_name, "Ada Lovelace");
        assert_eq!(valid.postal_code, "N1 9GU");
        assert_eq!(valid.state, None);
        assert_eq!(
            valid.to_shipping().one_line(),
            "12 Analytical Row, London, N1 9GU, UK"
        );
    }

    #[test]
    fn test_validate_rejects_missing_and_bad_fields() {
        let missing = AddressInput {
            city: String::new(),
            ..input()
        };
        assert_eq!(missing.validate().unwrap_err().field, "city");

        let bad_phone = AddressInput {
            phone: Some("call me".to_string()),
            ..input()
        };
        assert_eq!(bad_phone.validate().unwrap_err().field, "phone");

        let bad_zip = AddressInput {
            postal_code: "12#45".to_string(),
            ..input()
        };
        assert_eq!(bad_zip.validate().unwrap_err().field, "postal_code");
    }
}
