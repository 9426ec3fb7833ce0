//! Payload Module
//!
//! Stored form of cached values and their byte-size estimate.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Payload ==
/// A cached value as stored.
///
/// Typed values go through serde: anything that serializes to a JSON string
/// is kept as `Text`, everything else as `Json`. Binary buffers bypass serde
/// and are kept as `Bytes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl Payload {
    /// Converts a serializable value into its stored form.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        Ok(match serde_json::to_value(value)? {
            Value::String(text) => Payload::Text(text),
            other => Payload::Json(other),
        })
    }

    /// Converts the stored form back into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        let value = match self {
            Payload::Text(text) => Value::String(text),
            Payload::Json(value) => value,
            Payload::Bytes(bytes) => serde_json::to_value(bytes)?,
        };
        serde_json::from_value(value)
    }

    /// Byte-size estimate used for the cache's size budget.
    ///
    /// Text counts two bytes per UTF-16 code unit, binary counts its length,
    /// and structured values count twice their compact JSON length.
    pub fn size_bytes(&self) -> usize {
        match self {
            Payload::Text(text) => text.encode_utf16().count() * 2,
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Json(value) => value.to_string().len() * 2,
        }
    }
}
