//! In-process presence channel
//!
//! A [`MemoryHub`] is a set of named pub/sub channels living in one process.
//! Each [`MemoryTransport`] obtained from it acts as one client connection.
//! Every payload published on a channel reaches every subscriber of that
//! channel, the publisher included, in publish order. Presence completion is
//! signalled per subscription according to [`PresenceMode`].
//!
//! The hub also keeps a bounded log of the most recent payloads published on
//! each channel and can inject raw payloads, which makes it the channel used
//! by tests and the demo binary.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::{self, Duration};
use tracing::{debug, trace};

use super::{ChannelEvent, ChannelPublisher, SubscribeOptions, Subscription, Transport};
use crate::errors::{BravoError, Result};

/// Client id recorded for payloads injected from outside any transport
pub const EXTERNAL_CLIENT: &str = "external";

/// Published payloads kept per channel before the oldest are discarded
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// When a presence subscription reports [`ChannelEvent::PresenceFull`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceMode {
    /// As soon as the subscription is registered
    Immediate,
    /// After a fixed delay, modelling connect/join latency
    Delayed(Duration),
    /// Never, modelling a channel whose join does not complete
    Never,
}

/// Behaviour of one in-process client connection
#[derive(Debug, Clone)]
pub struct MemoryTransportConfig {
    pub presence: PresenceMode,
}

impl Default for MemoryTransportConfig {
    fn default() -> Self {
        Self {
            presence: PresenceMode::Immediate,
        }
    }
}

impl MemoryTransportConfig {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            presence: PresenceMode::Delayed(delay),
        }
    }

    pub fn never_joins() -> Self {
        Self {
            presence: PresenceMode::Never,
        }
    }
}

// ----------------------------------------------------------------------------
// Hub State
// ----------------------------------------------------------------------------

/// A payload as it was published on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPayload {
    pub client_id: String,
    pub payload: String,
}

#[derive(Debug)]
struct Subscriber {
    client_id: String,
    sender: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Debug, Default)]
struct ChannelState {
    subscribers: Vec<Subscriber>,
    log: VecDeque<PublishedPayload>,
}

#[derive(Debug, Default)]
struct HubState {
    channels: HashMap<String, ChannelState>,
}

/// Shared in-process pub/sub service
#[derive(Debug, Clone)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
    next_client: Arc<AtomicU64>,
    log_capacity: usize,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that remembers at most `log_capacity` payloads per channel
    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            state: Arc::default(),
            next_client: Arc::default(),
            log_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a client connection that joins immediately
    pub fn connect(&self) -> MemoryTransport {
        self.connect_with(MemoryTransportConfig::default())
    }

    /// Open a client connection with custom presence behaviour
    pub fn connect_with(&self, config: MemoryTransportConfig) -> MemoryTransport {
        let n = self.next_client.fetch_add(1, Ordering::Relaxed);
        MemoryTransport {
            hub: self.clone(),
            client_id: format!("memory-client-{}", n),
            config,
        }
    }

    fn register(&self, channel: &str, subscriber: Subscriber) {
        let mut state = self.lock();
        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .subscribers
            .push(subscriber);
    }

    /// Deliver `payload` to every live subscriber, returning how many received it
    fn deliver(&self, channel: &str, client_id: &str, payload: String) -> usize {
        let mut state = self.lock();
        let channel_state = state.channels.entry(channel.to_string()).or_default();

        if self.log_capacity > 0 {
            if channel_state.log.len() == self.log_capacity {
                channel_state.log.pop_front();
            }
            channel_state.log.push_back(PublishedPayload {
                client_id: client_id.to_string(),
                payload: payload.clone(),
            });
        }
        channel_state
            .subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());

        let mut delivered = 0;
        for subscriber in &channel_state.subscribers {
            if subscriber
                .sender
                .send(ChannelEvent::Message(payload.clone()))
                .is_ok()
            {
                delivered += 1;
            }
        }
        trace!(channel, client_id, delivered, "Delivered payload");
        delivered
    }

    /// Publish a raw payload on `channel` as if from an outside client
    pub fn inject(&self, channel: &str, payload: impl Into<String>) -> usize {
        self.deliver(channel, EXTERNAL_CLIENT, payload.into())
    }

    /// The most recent payloads published on `channel`, oldest first
    pub fn published(&self, channel: &str) -> Vec<PublishedPayload> {
        self.lock()
            .channels
            .get(channel)
            .map(|channel_state| channel_state.log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Payloads published on `channel` by one client
    pub fn published_by(&self, channel: &str, client_id: &str) -> Vec<String> {
        self.published(channel)
            .into_iter()
            .filter(|published| published.client_id == client_id)
            .map(|published| published.payload)
            .collect()
    }

    /// Number of live subscriptions on `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.lock()
            .channels
            .get(channel)
            .map(|channel_state| {
                channel_state
                    .subscribers
                    .iter()
                    .filter(|subscriber| !subscriber.sender.is_closed())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop every subscription on `channel` and its log, ending their event streams
    pub fn close_channel(&self, channel: &str) {
        if let Some(channel_state) = self.lock().channels.remove(channel) {
            let clients: Vec<&str> = channel_state
                .subscribers
                .iter()
                .map(|subscriber| subscriber.client_id.as_str())
                .collect();
            debug!(channel, ?clients, "Closing channel");
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Implementation
// ----------------------------------------------------------------------------

/// One client connection to a [`MemoryHub`]
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    hub: MemoryHub,
    client_id: String,
    config: MemoryTransportConfig,
}

impl MemoryTransport {
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn subscribe(&self, channel: &str, options: SubscribeOptions) -> Result<Subscription> {
        if channel.is_empty() {
            return Err(BravoError::subscribe_failed(channel, "empty channel name"));
        }

        let (sender, events) = mpsc::unbounded_channel();
        self.hub.register(
            channel,
            Subscriber {
                client_id: self.client_id.clone(),
                sender: sender.clone(),
            },
        );
        debug!(channel, client_id = %self.client_id, "Subscribed");

        if options.presence {
            match self.config.presence {
                PresenceMode::Immediate => {
                    let _ = sender.send(ChannelEvent::PresenceFull);
                }
                PresenceMode::Delayed(delay) => {
                    tokio::spawn(async move {
                        time::sleep(delay).await;
                        let _ = sender.send(ChannelEvent::PresenceFull);
                    });
                }
                PresenceMode::Never => {}
            }
        }

        Ok(Subscription {
            publisher: Arc::new(MemoryPublisher {
                hub: self.hub.clone(),
                channel: channel.to_string(),
                client_id: self.client_id.clone(),
            }),
            events,
        })
    }
}

struct MemoryPublisher {
    hub: MemoryHub,
    channel: String,
    client_id: String,
}

#[async_trait]
impl ChannelPublisher for MemoryPublisher {
    fn channel_name(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, payload: String) -> Result<()> {
        self.hub.deliver(&self.channel, &self.client_id, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_including_self() {
        let hub = MemoryHub::new();
        let a = hub.connect();
        let b = hub.connect();

        let mut sub_a = a.subscribe("lobby", SubscribeOptions::default()).await.unwrap();
        let mut sub_b = b.subscribe("lobby", SubscribeOptions::default()).await.unwrap();

        sub_a.publisher.publish("hello".into()).await.unwrap();

        assert_eq!(
            sub_a.events.recv().await,
            Some(ChannelEvent::Message("hello".into()))
        );
        assert_eq!(
            sub_b.events.recv().await,
            Some(ChannelEvent::Message("hello".into()))
        );
        assert_eq!(hub.published_by("lobby", a.client_id()), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let hub = MemoryHub::new();
        let a = hub.connect();
        let mut other = a.subscribe("other", SubscribeOptions::default()).await.unwrap();

        assert_eq!(hub.inject("lobby", "x"), 0);
        assert!(other.events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_modes() {
        let hub = MemoryHub::new();
        let immediate = hub.connect();
        let delayed = hub.connect_with(MemoryTransportConfig::delayed(Duration::from_millis(500)));
        let never = hub.connect_with(MemoryTransportConfig::never_joins());
        let presence = SubscribeOptions::with_presence();

        let mut sub = immediate.subscribe("lobby", presence).await.unwrap();
        assert_eq!(sub.events.try_recv(), Ok(ChannelEvent::PresenceFull));

        let mut sub = delayed.subscribe("lobby", presence).await.unwrap();
        assert!(sub.events.try_recv().is_err());
        assert_eq!(sub.events.recv().await, Some(ChannelEvent::PresenceFull));

        let mut sub = never.subscribe("lobby", presence).await.unwrap();
        time::sleep(Duration::from_secs(60)).await;
        assert!(sub.events.try_recv().is_err());

        // Without presence tracking nothing is signalled
        let mut sub = immediate.subscribe("quiet", SubscribeOptions::default()).await.unwrap();
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriptions_are_pruned() {
        let hub = MemoryHub::new();
        let a = hub.connect();
        let sub = a.subscribe("lobby", SubscribeOptions::default()).await.unwrap();
        assert_eq!(hub.subscriber_count("lobby"), 1);

        drop(sub);
        assert_eq!(hub.subscriber_count("lobby"), 0);
        assert_eq!(hub.inject("lobby", "anyone?"), 0);
    }

    #[tokio::test]
    async fn test_close_channel_ends_streams() {
        let hub = MemoryHub::new();
        let a = hub.connect();
        let mut sub = a.subscribe("lobby", SubscribeOptions::default()).await.unwrap();

        hub.close_channel("lobby");
        assert_eq!(sub.events.recv().await, None);
        assert!(hub.published("lobby").is_empty());
    }

    #[tokio::test]
    async fn test_log_keeps_most_recent_payloads() {
        let hub = MemoryHub::with_log_capacity(3);
        let a = hub.connect();
        let mut sub = a.subscribe("lobby", SubscribeOptions::default()).await.unwrap();

        for i in 0..5 {
            sub.publisher.publish(format!("m{}", i)).await.unwrap();
        }

        // Delivery is unaffected, only the log is trimmed
        for i in 0..5 {
            assert_eq!(
                sub.events.recv().await,
                Some(ChannelEvent::Message(format!("m{}", i)))
            );
        }
        assert_eq!(hub.published_by("lobby", a.client_id()), vec!["m2", "m3", "m4"]);

        let silent = MemoryHub::with_log_capacity(0);
        silent.inject("lobby", "x");
        assert!(silent.published("lobby").is_empty());
    }
}
