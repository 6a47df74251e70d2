//! Toast messages delivered through the `HX-Trigger` response header.
//!
//! HTMX raises every key of the header's JSON object as a DOM event; the
//! page script listens for `showToast` and renders the message. Other keys
//! (e.g. `cart-updated`) let fragments elsewhere on the page refresh.

use std::fmt::Write as _;

use axum::http::HeaderValue;
use axum::response::{IntoResponseParts, ResponseParts};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tower_sessions::Session;

use crate::models::session_keys;

/// Name of the HTMX trigger header.
pub const HX_TRIGGER: &str = "hx-trigger";

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

/// A transient message, optionally with extra HTMX events to raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    #[serde(skip)]
    events: Vec<&'static str>,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, message)
    }

    fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            events: Vec::new(),
        }
    }

    /// Also raise `event` on the page.
    #[must_use]
    pub fn with_event(mut self, event: &'static str) -> Self {
        self.events.push(event);
        self
    }

    /// JSON value of the `HX-Trigger` header.
    #[must_use]
    pub fn trigger_json(&self) -> String {
        let mut map = Map::new();
        for event in &self.events {
            map.insert((*event).to_string(), Value::Null);
        }
        map.insert(
            "showToast".to_string(),
            json!({ "level": self.level, "message": self.message }),
        );
        ascii_only(&Value::Object(map).to_string())
    }
}

/// Header values must be visible ASCII; escape everything else as JSON
/// `\uXXXX` sequences (which only ever occur inside strings).
fn ascii_only(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                let _ = write!(out, "\\u{unit:04x}");
            }
        }
    }
    out
}

impl IntoResponseParts for Toast {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        match HeaderValue::from_str(&self.trigger_json()) {
            Ok(value) => {
                res.headers_mut().insert(HX_TRIGGER, value);
            }
            Err(e) => tracing::warn!(error = %e, "Toast is not a valid header value"),
        }
        Ok(res)
    }
}

/// Keep a toast for the next full page render (after a redirect).
pub async fn flash(session: &Session, toast: &Toast) {
    if let Err(e) = session.insert(session_keys::FLASH, toast).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Take the pending flash toast, if any.
pub async fn take_flash(session: &Session) -> Option<Toast> {
    session.remove::<Toast>(session_keys::FLASH).await.ok().flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_json_shape() {
        let toast = Toast::success("Added to cart").with_event("cart-updated");
        let value: Value = serde_json::from_str(&toast.trigger_json()).unwrap();
        assert_eq!(value["showToast"]["level"], "success");
        assert_eq!(value["showToast"]["message"], "Added to cart");
        assert!(value["cart-updated"].is_null());
        assert!(value.as_object().unwrap().contains_key("cart-updated"));
    }

    #[test]
    fn test_header_is_set() {
        use axum::response::IntoResponse;

        let response = (Toast::error("Nope"), "body").into_response();
        let header = response.headers().get(HX_TRIGGER).unwrap().to_str().unwrap();
        assert!(header.contains("\"error\""));
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let json = Toast::info("Café ☕").trigger_json();
        assert!(json.is_ascii());
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["showToast"]["message"], "Café ☕");
    }
}
