//! Transport abstraction for the Bravo protocol
//!
//! The communicator needs very little from its pub/sub collaborator: a way to
//! subscribe to a named channel with presence enabled, a serial stream of
//! channel events, and best-effort publishing of strings to every subscriber.
//! No acknowledgement, ordering or delivery guarantee is assumed.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::errors::Result;

pub mod memory;

pub use memory::{MemoryHub, MemoryTransport, MemoryTransportConfig, PresenceMode, PublishedPayload};

// ----------------------------------------------------------------------------
// Channel Events
// ----------------------------------------------------------------------------

/// Events delivered by a channel subscription, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A raw payload published by some subscriber, possibly ourselves
    Message(String),
    /// Our own join/presence handshake on the channel has completed
    PresenceFull,
}

/// Options for subscribing to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    /// Request presence tracking, which drives [`ChannelEvent::PresenceFull`]
    pub presence: bool,
}

impl SubscribeOptions {
    pub fn with_presence() -> Self {
        Self { presence: true }
    }
}

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// Publishing half of a channel subscription
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Name of the channel this publisher writes to
    fn channel_name(&self) -> &str;

    /// Fire-and-forget broadcast of `payload` to every channel subscriber
    async fn publish(&self, payload: String) -> Result<()>;
}

/// A live channel subscription
pub struct Subscription {
    pub publisher: Arc<dyn ChannelPublisher>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.publisher.channel_name())
            .finish_non_exhaustive()
    }
}

/// Connection to a presence-enabled pub/sub service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identity of this client connection
    ///
    /// Used by [`ClientRegistry`](crate::registry::ClientRegistry) to keep at
    /// most one communicator per connection.
    fn client_id(&self) -> &str;

    /// Subscribe to `channel`
    async fn subscribe(&self, channel: &str, options: SubscribeOptions) -> Result<Subscription>;
}
