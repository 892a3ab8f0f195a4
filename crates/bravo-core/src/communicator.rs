//! The communicator
//!
//! Owns the local signer, the channel subscription, the peer table and the
//! join gate. A spawned event loop consumes channel events serially: presence
//! completion triggers the announcement and opens the join gate, and every
//! inbound payload goes through the [`Router`]. Outbound calls wait on the join
//! gate without blocking that loop.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::CommunicatorConfig;
use crate::errors::{BravoError, Result};
use crate::handlers::{ErrorHandler, LogErrorHandler, MessageHandler};
use crate::identity::Identifier;
use crate::join::{JoinGate, JoinState};
use crate::peers::{PeerEntry, PeerTable};
use crate::protocol::{encode_payload, DirectMessage, Envelope, Payload, PresenceAnnouncement};
use crate::registry::{ClientLease, ClientRegistry};
use crate::router::{Route, Router};
use crate::transport::{ChannelEvent, ChannelPublisher, SubscribeOptions, Transport};
use crate::types::Group;

// ----------------------------------------------------------------------------
// Recipients
// ----------------------------------------------------------------------------

/// Target of a direct send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient<G> {
    /// Display key looked up in the peer table
    Key(String),
    /// Explicit identifier, e.g. the sender of an inbound message
    Peer(Identifier<G>),
}

impl<G> From<&str> for Recipient<G> {
    fn from(key: &str) -> Self {
        Recipient::Key(key.to_string())
    }
}

impl<G> From<String> for Recipient<G> {
    fn from(key: String) -> Self {
        Recipient::Key(key)
    }
}

impl<G> From<Identifier<G>> for Recipient<G> {
    fn from(identifier: Identifier<G>) -> Self {
        Recipient::Peer(identifier)
    }
}

impl<G: Clone> From<&Identifier<G>> for Recipient<G> {
    fn from(identifier: &Identifier<G>) -> Self {
        Recipient::Peer(identifier.clone())
    }
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Collects handlers before connecting a communicator
pub struct CommunicatorBuilder<T, G> {
    config: CommunicatorConfig<G>,
    handler: Arc<dyn MessageHandler<T, G>>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl<T: Payload, G: Group> CommunicatorBuilder<T, G> {
    /// Replace the default logging error handler
    pub fn on_error(mut self, error_handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(error_handler);
        self
    }

    /// Subscribe to the configured channel and start the event loop
    ///
    /// Fails with [`BravoError::DuplicateClient`] if `transport` already backs
    /// a live communicator in `registry`.
    pub async fn connect(
        self,
        transport: &dyn Transport,
        registry: &ClientRegistry,
    ) -> Result<Communicator<T, G>> {
        self.config.validate()?;
        let lease = registry.claim(transport.client_id())?;

        let signer = Identifier::new(self.config.group.clone(), self.config.name.clone());
        let gate = JoinGate::new();

        let subscription = transport
            .subscribe(&self.config.channel_name, SubscribeOptions::with_presence())
            .await?;
        gate.transition(JoinState::Joining);
        info!(
            channel = %self.config.channel_name,
            signer = %signer.display_key(),
            "Joining channel"
        );

        let shared = Arc::new(Shared {
            router: Router::new(signer.clone()),
            peers: RwLock::new(PeerTable::new(signer.id())),
            signer,
            publisher: subscription.publisher,
            gate,
            join_timeout: self.config.join.timeout(),
            handler: self.handler,
            error_handler: self.error_handler,
        });

        let event_loop = tokio::spawn(run_event_loop(shared.clone(), subscription.events));

        Ok(Communicator {
            shared,
            event_loop: Some(event_loop),
            _lease: lease,
        })
    }
}

// ----------------------------------------------------------------------------
// Communicator
// ----------------------------------------------------------------------------

struct Shared<T, G> {
    signer: Identifier<G>,
    router: Router<T, G>,
    peers: RwLock<PeerTable<G>>,
    publisher: Arc<dyn ChannelPublisher>,
    gate: JoinGate,
    join_timeout: Duration,
    handler: Arc<dyn MessageHandler<T, G>>,
    error_handler: Arc<dyn ErrorHandler>,
}

/// A peer on a presence-enabled channel
///
/// Dropping the communicator stops its event loop and releases its claim on
/// the transport client.
pub struct Communicator<T, G> {
    shared: Arc<Shared<T, G>>,
    event_loop: Option<JoinHandle<()>>,
    _lease: ClientLease,
}

impl<T: Payload, G: Group> Communicator<T, G> {
    /// Start building a communicator that hands messages to `handler`
    pub fn builder(
        config: CommunicatorConfig<G>,
        handler: impl MessageHandler<T, G> + 'static,
    ) -> CommunicatorBuilder<T, G> {
        CommunicatorBuilder {
            config,
            handler: Arc::new(handler),
            error_handler: Arc::new(LogErrorHandler),
        }
    }

    /// This peer's own identifier
    pub fn signer(&self) -> &Identifier<G> {
        &self.shared.signer
    }

    pub fn channel_name(&self) -> &str {
        self.shared.publisher.channel_name()
    }

    pub fn join_state(&self) -> JoinState {
        self.shared.gate.state()
    }

    pub fn is_joined(&self) -> bool {
        self.shared.gate.is_joined()
    }

    /// Wait for the channel join, bounded by the configured join timeout
    pub async fn wait_joined(&self) -> Result<()> {
        self.shared.gate.wait_joined(self.shared.join_timeout).await
    }

    /// Snapshot of the peer table, sorted by display key
    pub async fn peers(&self) -> Vec<PeerEntry<G>> {
        let mut entries: Vec<PeerEntry<G>> =
            self.shared.peers.read().await.iter().cloned().collect();
        entries.sort_by_key(PeerEntry::display_key);
        entries
    }

    /// Last-known identifier for a display key
    pub async fn peer(&self, key: &str) -> Option<Identifier<G>> {
        self.shared
            .peers
            .read()
            .await
            .get(key)
            .map(|entry| entry.identifier.clone())
    }

    /// Remove a peer from the table until it is heard from again
    pub async fn forget_peer(&self, key: &str) -> Option<Identifier<G>> {
        self.shared
            .peers
            .write()
            .await
            .remove(key)
            .map(|entry| entry.identifier)
    }

    /// Remove peers not heard from within `max_age`, returning how many were removed
    pub async fn prune_peers(&self, max_age: Duration) -> usize {
        let Some(cutoff) = Instant::now().checked_sub(max_age) else {
            return 0;
        };
        let pruned = self.shared.peers.write().await.prune_older_than(cutoff);
        if pruned > 0 {
            debug!(pruned, "Pruned stale peers");
        }
        pruned
    }

    /// Send `payload` to every peer in this peer's group
    pub async fn broadcast(&self, payload: &T) -> Result<()> {
        let message =
            DirectMessage::broadcast(encode_payload(payload)?, self.shared.signer.clone());
        self.send(message.into()).await
    }

    /// Send `payload` to one peer, regardless of its group
    ///
    /// A display key that is not in the peer table is reported to the error
    /// handler and returned as [`BravoError::RecipientNotFound`]; nothing is
    /// published.
    pub async fn send_to(&self, payload: &T, recipient: impl Into<Recipient<G>>) -> Result<()> {
        let recipient = match recipient.into() {
            Recipient::Peer(identifier) => identifier,
            Recipient::Key(key) => match self.peer(&key).await {
                Some(identifier) => identifier,
                None => {
                    let error = BravoError::recipient_not_found(key);
                    self.shared.error_handler.on_error(&error);
                    return Err(error);
                }
            },
        };

        let message = DirectMessage::to(
            encode_payload(payload)?,
            self.shared.signer.clone(),
            recipient,
        );
        self.send(message.into()).await
    }

    async fn send(&self, envelope: Envelope<G>) -> Result<()> {
        let raw = envelope.encode()?;
        self.shared.gate.wait_joined(self.shared.join_timeout).await?;
        trace!(kind = envelope.tag(), "Publishing envelope");
        self.shared.publisher.publish(raw).await
    }

    /// Stop the event loop and release the transport client
    pub async fn shutdown(mut self) {
        if let Some(event_loop) = self.event_loop.take() {
            event_loop.abort();
            let _ = event_loop.await;
        }
        info!(signer = %self.shared.signer.display_key(), "Communicator shut down");
    }
}

impl<T, G> Drop for Communicator<T, G> {
    fn drop(&mut self) {
        if let Some(event_loop) = self.event_loop.take() {
            event_loop.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Event Loop
// ----------------------------------------------------------------------------

async fn run_event_loop<T: Payload, G: Group>(
    shared: Arc<Shared<T, G>>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    debug!("Event loop starting");

    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::PresenceFull => shared.on_presence_full().await,
            ChannelEvent::Message(raw) => shared.on_message(&raw).await,
        }
    }

    info!(
        channel = %shared.publisher.channel_name(),
        "Channel event stream closed"
    );
}

impl<T: Payload, G: Group> Shared<T, G> {
    async fn on_presence_full(&self) {
        if self.gate.state() != JoinState::Joining {
            debug!(state = %self.gate.state(), "Ignoring repeated presence signal");
            return;
        }

        let announcement: Envelope<G> = PresenceAnnouncement {
            sender: self.signer.clone(),
        }
        .into();
        self.publish_protocol(&announcement).await;

        self.gate.transition(JoinState::Joined);
        info!(
            channel = %self.publisher.channel_name(),
            signer = %self.signer.display_key(),
            "Joined channel"
        );
    }

    async fn on_message(&self, raw: &str) {
        let route = {
            let mut peers = self.peers.write().await;
            self.router.route_raw(raw, &mut peers, Instant::now())
        };

        match route {
            Route::Deliver(delivery) => {
                trace!(
                    from = %delivery.sender.display_key(),
                    direct = delivery.direct,
                    "Delivering message"
                );
                self.handler.on_message(delivery);
            }
            Route::Reply { ack, outcome } => {
                debug!(peer = %ack.recipient.display_key(), ?outcome, "Peer announced");
                let reply: Envelope<G> = ack.into();
                self.publish_protocol(&reply).await;
            }
            Route::Recorded { peer, outcome } => {
                debug!(peer = %peer.display_key(), ?outcome, "Peer acknowledged");
            }
            Route::Dropped(reason) => {
                debug!(%reason, "Dropped inbound payload");
            }
        }
    }

    /// Publish a protocol envelope from the event loop, reporting failures
    async fn publish_protocol(&self, envelope: &Envelope<G>) {
        let result = match envelope.encode() {
            Ok(raw) => self.publisher.publish(raw).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            warn!(kind = envelope.tag(), %error, "Failed to publish protocol message");
            self.error_handler.on_error(&error);
        }
    }
}
