//! Address book route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::AddressId;
use shopfront_core::address::{Address, AddressInput, promote_default, sort_default_first};
use tower_sessions::Session;
use tracing::instrument;

use super::shell::Shell;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireUser;
use crate::state::AppState;
use crate::toast::{Toast, flash};

/// Address card display data.
#[derive(Debug, Clone)]
pub struct AddressView {
    pub id: String,
    pub full_name: String,
    pub street: String,
    pub locality: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
}

impl From<&Address> for AddressView {
    fn from(address: &Address) -> Self {
        let locality = match &address.state {
            Some(state) => format!("{}, {state} {}", address.city, address.postal_code),
            None => format!("{} {}", address.city, address.postal_code),
        };
        Self {
            id: address.id.to_string(),
            full_name: address.full_name.clone(),
            street: address.street.clone(),
            locality,
            country: address.country.clone(),
            phone: address.phone.clone(),
            is_default: address.is_default,
        }
    }
}

/// Address form values (create and edit).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressForm {
    fn into_input(self) -> AddressInput {
        AddressInput {
            full_name: self.full_name,
            street: self.street,
            city: self.city,
            state: Some(self.state),
            postal_code: self.postal_code,
            country: self.country,
            phone: Some(self.phone),
            is_default: self.is_default,
        }
    }
}

impl From<AddressInput> for AddressForm {
    fn from(input: AddressInput) -> Self {
        Self {
            full_name: input.full_name,
            street: input.street,
            city: input.city,
            state: input.state.unwrap_or_default(),
            postal_code: input.postal_code,
            country: input.country,
            phone: input.phone.unwrap_or_default(),
            is_default: input.is_default,
        }
    }
}

/// Address book page template.
#[derive(Template, WebTemplate)]
#[template(path = "addresses/index.html")]
pub struct AddressesTemplate {
    pub shell: Shell,
    pub list: AddressListTemplate,
}

/// Address cards (for HTMX after delete and set-default).
#[derive(Template, WebTemplate)]
#[template(path = "partials/address_list.html")]
pub struct AddressListTemplate {
    pub addresses: Vec<AddressView>,
}

impl AddressListTemplate {
    fn new(addresses: &[Address]) -> Self {
        Self {
            addresses: addresses.iter().map(AddressView::from).collect(),
        }
    }
}

/// Create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "addresses/form.html")]
pub struct AddressFormTemplate {
    pub shell: Shell,
    /// `None` when creating.
    pub address_id: Option<String>,
    pub form: AddressForm,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the address book, default first.
#[instrument(skip(state, shell, token))]
pub async fn index(
    State(state): State<AppState>,
    shell: Shell,
    RequireUser(_user, token): RequireUser,
) -> Result<AddressesTemplate> {
    let mut addresses = state.api().addresses(&token).await?;
    sort_default_first(&mut addresses);
    Ok(AddressesTemplate {
        shell,
        list: AddressListTemplate::new(&addresses),
    })
}

/// Display the new address form.
#[instrument(skip(shell, user))]
pub async fn new(shell: Shell, RequireUser(user, _token): RequireUser) -> AddressFormTemplate {
    AddressFormTemplate {
        shell,
        address_id: None,
        form: AddressForm {
            full_name: user.name,
            ..AddressForm::default()
        },
    }
}

/// Save a new address.
#[instrument(skip(state, session, token, form))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Form(form): Form<AddressForm>,
) -> Result<Redirect> {
    let input = form.into_input().validate()?;
    state.api().create_address(&token, &input).await?;
    flash(&session, &Toast::success("Address saved")).await;
    Ok(Redirect::to("/addresses"))
}

/// Display the edit form.
#[instrument(skip(state, shell, token), fields(address_id = %id))]
pub async fn edit(
    State(state): State<AppState>,
    shell: Shell,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<AddressFormTemplate> {
    let id = AddressId::new(id);
    let addresses = state.api().addresses(&token).await?;
    let address = addresses
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| AppError::NotFound("Address".to_string()))?;

    Ok(AddressFormTemplate {
        shell,
        address_id: Some(id.into_inner()),
        form: AddressForm::from(address.to_input()),
    })
}

/// Save changes to an address.
#[instrument(skip(state, session, token, form), fields(address_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
    Form(form): Form<AddressForm>,
) -> Result<Redirect> {
    let input = form.into_input().validate()?;
    state.api().update_address(&token, &AddressId::new(id), &input).await?;
    flash(&session, &Toast::success("Address updated")).await;
    Ok(Redirect::to("/addresses"))
}

/// Delete an address (HTMX).
#[instrument(skip(state, token), fields(address_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<Response> {
    state.api().delete_address(&token, &AddressId::new(id)).await?;

    let mut addresses = state.api().addresses(&token).await?;
    sort_default_first(&mut addresses);
    Ok((Toast::info("Address deleted"), AddressListTemplate::new(&addresses)).into_response())
}

/// Make an address the default (HTMX).
///
/// The list is re-read and the promotion applied locally too, so exactly
/// one card shows as default even if the listing lags the update.
#[instrument(skip(state, token), fields(address_id = %id))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = AddressId::new(id);
    state.api().set_default_address(&token, &id).await?;

    let mut addresses = state.api().addresses(&token).await?;
    if !promote_default(&mut addresses, &id) {
        return Err(AppError::NotFound("Address".to_string()));
    }
    Ok((
        Toast::success("Default address updated"),
        AddressListTemplate::new(&addresses),
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_optional_fields_are_dropped() {
        let form = AddressForm {
            full_name: " Ada Lovelace ".to_string(),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "  ".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            phone: String::new(),
            is_default: true,
        };
        let input = form.into_input().validate().unwrap();
        assert_eq!(input.full_name, "Ada Lovelace");
        assert!(input.state.is_none());
        assert!(input.phone.is_none());
        assert!(input.is_default);
    }

    #[test]
    fn test_address_view_locality() {
        let address = Address {
            id: AddressId::new("a1"),
            full_name: "Ada".to_string(),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: Some("IL".to_string()),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            phone: None,
            is_default: false,
        };
        assert_eq!(AddressView::from(&address).locality, "Springfield, IL 62701");
    }
}
