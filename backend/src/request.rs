//! Typed view of the `POST /wishlist` body.

use santa_core::{ParticipantName, Wish};
use serde_json::Value;

use crate::service::ServiceError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WishlistSubmission {
    pub name: ParticipantName,
    /// Raw entries, text-coerced but not yet normalized.
    pub wishlist: Vec<Wish>,
}

impl WishlistSubmission {
    pub fn from_json(body: Value) -> Result<Self, ServiceError> {
        let Value::Object(mut body) = body else {
            return Err(malformed("body must be a JSON object"));
        };

        let name = match body.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(malformed("name must be a non-empty string")),
        };

        let Some(Value::Array(entries)) = body.remove("wishlist") else {
            return Err(malformed("wishlist must be a list"));
        };

        Ok(Self {
            name,
            wishlist: entries.into_iter().map(wish_from_value).collect(),
        })
    }
}

fn malformed(reason: &str) -> ServiceError {
    ServiceError::MalformedRequest(reason.to_string())
}

fn wish_from_value(entry: Value) -> Wish {
    match entry {
        Value::Object(mut fields) => Wish {
            url: fields.remove("url").map(coerce_text).unwrap_or_default(),
            note: fields.remove("note").map(coerce_text).unwrap_or_default(),
        },
        _ => Wish::default(),
    }
}

/// Falsy values (`null`, `false`, zero, `""`) read as empty.
fn coerce_text(value: Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        other => element_text(other),
    }
}

/// Arrays join their elements with `,`; objects keep their compact JSON.
fn element_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .into_iter()
            .map(element_text)
            .collect::<Vec<_>>()
            .join(","),
        object @ Value::Object(_) => object.to_string(),
    }
}
