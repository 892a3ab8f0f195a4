//! Protocol envelopes
//!
//! Every message on the channel is one of three envelope variants. Each
//! variant is a plain struct with a canonical tag; the closed [`Envelope`]
//! sum type is what the router matches on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity::Identifier;
use crate::types::Group;

// ----------------------------------------------------------------------------
// Variant Tags
// ----------------------------------------------------------------------------

pub const DIRECT_MESSAGE_TAG: &str = "DirectMessage";
pub const PRESENCE_ANNOUNCEMENT_TAG: &str = "PresenceAnnouncement";
pub const PRESENCE_ACK_TAG: &str = "PresenceAck";

/// A struct that can appear on the wire as one envelope variant
pub trait EnvelopeVariant: Serialize + DeserializeOwned {
    /// Value of the discriminant field for this variant
    const TAG: &'static str;
}

// ----------------------------------------------------------------------------
// Variants
// ----------------------------------------------------------------------------

/// Application message, broadcast to the sender's group or addressed to one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "G: Group")]
pub struct DirectMessage<G> {
    /// Serialized application payload, decoded in a second pass
    pub payload: String,
    pub sender: Identifier<G>,
    /// Absent for group broadcasts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Identifier<G>>,
}

impl<G: Group> DirectMessage<G> {
    pub fn broadcast(payload: String, sender: Identifier<G>) -> Self {
        Self {
            payload,
            sender,
            recipient: None,
        }
    }

    pub fn to(payload: String, sender: Identifier<G>, recipient: Identifier<G>) -> Self {
        Self {
            payload,
            sender,
            recipient: Some(recipient),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}

impl<G: Group> EnvelopeVariant for DirectMessage<G> {
    const TAG: &'static str = DIRECT_MESSAGE_TAG;
}

/// "I am here", published once the sender's channel join completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "G: Group")]
pub struct PresenceAnnouncement<G> {
    pub sender: Identifier<G>,
}

impl<G: Group> EnvelopeVariant for PresenceAnnouncement<G> {
    const TAG: &'static str = PRESENCE_ANNOUNCEMENT_TAG;
}

/// Directed reply to an announcement so the newcomer learns about existing peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "G: Group")]
pub struct PresenceAck<G> {
    pub sender: Identifier<G>,
    pub recipient: Identifier<G>,
}

impl<G: Group> EnvelopeVariant for PresenceAck<G> {
    const TAG: &'static str = PRESENCE_ACK_TAG;
}

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// Any protocol message carried on the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<G> {
    Direct(DirectMessage<G>),
    Announcement(PresenceAnnouncement<G>),
    Ack(PresenceAck<G>),
}

impl<G: Group> Envelope<G> {
    /// Canonical tag of the wrapped variant
    pub fn tag(&self) -> &'static str {
        match self {
            Envelope::Direct(_) => DIRECT_MESSAGE_TAG,
            Envelope::Announcement(_) => PRESENCE_ANNOUNCEMENT_TAG,
            Envelope::Ack(_) => PRESENCE_ACK_TAG,
        }
    }

    /// Identifier of whoever produced this envelope
    pub fn sender(&self) -> &Identifier<G> {
        match self {
            Envelope::Direct(message) => &message.sender,
            Envelope::Announcement(announcement) => &announcement.sender,
            Envelope::Ack(ack) => &ack.sender,
        }
    }
}

impl<G> From<DirectMessage<G>> for Envelope<G> {
    fn from(message: DirectMessage<G>) -> Self {
        Envelope::Direct(message)
    }
}

impl<G> From<PresenceAnnouncement<G>> for Envelope<G> {
    fn from(announcement: PresenceAnnouncement<G>) -> Self {
        Envelope::Announcement(announcement)
    }
}

impl<G> From<PresenceAck<G>> for Envelope<G> {
    fn from(ack: PresenceAck<G>) -> Self {
        Envelope::Ack(ack)
    }
}
