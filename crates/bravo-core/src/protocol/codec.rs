//! Envelope wire codec
//!
//! Envelopes travel as JSON objects carrying a string `type` discriminant next
//! to the variant fields. Decoding checks the discriminant before attempting
//! structural decoding, and a mismatch in either step means "not this
//! variant" rather than an error, so one channel can carry heterogeneous
//! traffic.

use serde_json::{Map, Value};

use crate::errors::{BravoError, Result};
use crate::protocol::envelope::{
    DirectMessage, Envelope, EnvelopeVariant, PresenceAck, PresenceAnnouncement,
};
use crate::types::Group;

/// Name of the discriminant field on every tagged object
pub const TYPE_FIELD: &str = "type";

// ----------------------------------------------------------------------------
// Tagging Helpers
// ----------------------------------------------------------------------------

/// Read the discriminant of a parsed object, if it has one
pub(crate) fn tag_of(value: &Value) -> Option<&str> {
    value.get(TYPE_FIELD)?.as_str()
}

/// Insert the discriminant into an encoded object
pub(crate) fn insert_tag(value: Value, tag: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(mut object) => {
            object.insert(TYPE_FIELD.to_string(), Value::String(tag.to_string()));
            Ok(object)
        }
        other => Err(BravoError::invalid_payload(format!(
            "tagged value must encode to an object, got {}",
            other
        ))),
    }
}

// ----------------------------------------------------------------------------
// Variant Codec
// ----------------------------------------------------------------------------

/// Encode one variant as a tagged JSON string
pub fn encode_variant<V: EnvelopeVariant>(variant: &V) -> Result<String> {
    let object = insert_tag(serde_json::to_value(variant)?, V::TAG)?;
    Ok(serde_json::to_string(&object)?)
}

/// Decode a parsed object as one variant
///
/// Returns `None` when the discriminant is missing or names another variant,
/// or when the fields do not fit the variant.
pub fn decode_variant<V: EnvelopeVariant>(value: &Value) -> Option<V> {
    if tag_of(value)? != V::TAG {
        return None;
    }
    V::deserialize(value).ok()
}

/// Parse a raw payload and decode it as one variant
pub fn decode_variant_str<V: EnvelopeVariant>(raw: &str) -> Option<V> {
    let value: Value = serde_json::from_str(raw).ok()?;
    decode_variant(&value)
}

// ----------------------------------------------------------------------------
// Envelope Dispatcher
// ----------------------------------------------------------------------------

impl<G: Group> Envelope<G> {
    /// Serialize to the wire format
    pub fn encode(&self) -> Result<String> {
        match self {
            Envelope::Direct(message) => encode_variant(message),
            Envelope::Announcement(announcement) => encode_variant(announcement),
            Envelope::Ack(ack) => encode_variant(ack),
        }
    }

    /// Classify a raw channel payload
    ///
    /// Variants are tried in a fixed priority order: direct message, presence
    /// announcement, presence ack. Payloads matching none of them yield `None`.
    pub fn decode(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;

        if let Some(message) = decode_variant::<DirectMessage<G>>(&value) {
            return Some(Envelope::Direct(message));
        }
        if let Some(announcement) = decode_variant::<PresenceAnnouncement<G>>(&value) {
            return Some(Envelope::Announcement(announcement));
        }
        if let Some(ack) = decode_variant::<PresenceAck<G>>(&value) {
            return Some(Envelope::Ack(ack));
        }
        None
    }
}
