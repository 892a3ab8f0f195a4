//! Bravo wire protocol
//!
//! Envelope variants, the tagged codec that classifies raw channel payloads,
//! and the second-pass codec for application payloads.

pub mod codec;
pub mod envelope;
pub mod payload;

pub use codec::{decode_variant, decode_variant_str, encode_variant, TYPE_FIELD};
pub use envelope::{
    DirectMessage, Envelope, EnvelopeVariant, PresenceAck, PresenceAnnouncement,
    DIRECT_MESSAGE_TAG, PRESENCE_ACK_TAG, PRESENCE_ANNOUNCEMENT_TAG,
};
pub use payload::{decode_payload, encode_payload, Payload};
