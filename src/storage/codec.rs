//! Key and value encoding.
//!
//! Storage keys are opaque strings from the backend's point of view; the
//! (name, discriminator) structure is imposed here and only here. Values
//! are stored as text: scalars in their plain form, structured documents
//! serialized to compact JSON.

use serde_json::Value;

/// Build the storage key for a variable.
///
/// Returns `name` unchanged when no discriminator is supplied, otherwise
/// `name_discriminator`. Pure and total.
pub fn encode_key(name: &str, discriminator: Option<&str>) -> String {
    match discriminator {
        Some(id) if !id.is_empty() => format!("{name}_{id}"),
        _ => name.to_string(),
    }
}

/// Result of encoding a value for storage.
///
/// Serialization failure is deliberately lenient: instead of failing the
/// write, the value's display form passes through tagged as such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedValue {
    /// The value serialized normally.
    Encoded(String),
    /// Serialization failed; the original value passed through unchanged.
    Passthrough(String),
}

impl EncodedValue {
    /// The text that will be written to the backend either way.
    pub fn into_text(self) -> String {
        match self {
            Self::Encoded(text) | Self::Passthrough(text) => text,
        }
    }
}

/// Serialize a value to its stored text form.
///
/// Strings are stored without JSON quoting so that scalar and structured
/// values are indistinguishable to callers expecting text; objects and
/// arrays are serialized compactly.
pub fn encode_value(value: &Value) -> EncodedValue {
    match value {
        Value::String(s) => EncodedValue::Encoded(s.clone()),
        Value::Null | Value::Bool(_) | Value::Number(_) => {
            EncodedValue::Encoded(value.to_string())
        }
        Value::Object(_) | Value::Array(_) => match serde_json::to_string(value) {
            Ok(text) => EncodedValue::Encoded(text),
            Err(_) => EncodedValue::Passthrough(value.to_string()),
        },
    }
}
