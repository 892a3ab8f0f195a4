//! Application payloads
//!
//! The envelope codec does not know the application's message type, so a
//! direct message carries its payload as a separately serialized JSON string
//! which is decoded in a second pass once the envelope has been accepted.
//! Payloads carry their own `type` discriminant, checked before decoding.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{BravoError, Result};
use crate::protocol::codec::{insert_tag, tag_of, TYPE_FIELD};

/// Field holding a payload that does not serialize to a JSON object
const VALUE_FIELD: &str = "value";

/// A message type the application exchanges through a communicator
///
/// `TYPE` must be unique per payload type sharing a channel. Encoding fails
/// with [`BravoError::InvalidPayload`] if the payload's own serialized form
/// has a top-level `type` field, as `#[serde(tag = "type")]` enums do.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;
}

/// Serialize a payload for embedding in a direct message
pub fn encode_payload<T: Payload>(payload: &T) -> Result<String> {
    let object = match serde_json::to_value(payload)? {
        Value::Object(fields) if fields.contains_key(TYPE_FIELD) => {
            return Err(BravoError::invalid_payload(format!(
                "{} payload already has a top-level `{}` field",
                T::TYPE,
                TYPE_FIELD
            )));
        }
        object @ Value::Object(_) => insert_tag(object, T::TYPE)?,
        other => {
            let mut object = Map::new();
            object.insert(TYPE_FIELD.to_string(), Value::String(T::TYPE.to_string()));
            object.insert(VALUE_FIELD.to_string(), other);
            object
        }
    };
    Ok(serde_json::to_string(&object)?)
}

/// Decode an embedded payload
///
/// Returns `None` if the text is not JSON, names another payload type, or
/// does not fit `T`.
pub fn decode_payload<T: Payload>(raw: &str) -> Option<T> {
    let value: Value = serde_json::from_str(raw).ok()?;
    if tag_of(&value)? != T::TYPE {
        return None;
    }

    let Value::Object(mut object) = value else {
        return None;
    };
    object.remove(TYPE_FIELD);

    if let Ok(payload) = T::deserialize(&Value::Object(object.clone())) {
        return Some(payload);
    }
    match (object.len(), object.remove(VALUE_FIELD)) {
        (1, Some(inner)) => T::deserialize(&inner).ok(),
        _ => None,
    }
}
