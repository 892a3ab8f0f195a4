//! Inbound routing and filtering
//!
//! The router classifies raw channel payloads and decides what each one
//! means for the local peer. It mutates the peer table and returns a
//! [`Route`] describing the effect to perform; publishing and handler calls
//! are left to the caller so the decision logic stays synchronous.
//!
//! Rules, first match wins:
//!
//! Direct message
//! 1. sent by us: drop
//! 2. addressed to another peer: drop
//! 3. broadcast from another group: drop
//! 4. payload does not decode as the application type: drop
//! 5. otherwise deliver
//!
//! Presence announcement
//! 1. sent by us: drop
//! 2. otherwise record the sender and reply with a directed ack
//!
//! Presence ack
//! 1. addressed to another peer: drop
//! 2. sent by us: drop
//! 3. otherwise record the sender

use core::fmt;
use core::marker::PhantomData;
use tokio::time::Instant;

use crate::handlers::Delivery;
use crate::identity::Identifier;
use crate::peers::{PeerTable, UpsertOutcome};
use crate::protocol::{
    decode_payload, DirectMessage, Envelope, Payload, PresenceAck, PresenceAnnouncement,
};
use crate::types::Group;

// ----------------------------------------------------------------------------
// Routing Outcomes
// ----------------------------------------------------------------------------

/// Why an inbound payload was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a protocol envelope this peer understands
    Unrecognized,
    /// Our own envelope echoed back by the channel
    Echo,
    /// Direct message or ack meant for another peer
    AddressedElsewhere,
    /// Broadcast from a different group
    OtherGroup,
    /// Inner payload is not the application's message type
    PayloadMismatch,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::Unrecognized => "unrecognized payload",
            DropReason::Echo => "own message",
            DropReason::AddressedElsewhere => "addressed to another peer",
            DropReason::OtherGroup => "broadcast from another group",
            DropReason::PayloadMismatch => "payload type mismatch",
        };
        f.write_str(reason)
    }
}

/// What to do with an inbound payload
#[derive(Debug, Clone, PartialEq)]
pub enum Route<T, G> {
    /// Hand the message to the application
    Deliver(Delivery<T, G>),
    /// A peer announced itself; it was recorded and should be acked
    Reply {
        ack: PresenceAck<G>,
        outcome: UpsertOutcome,
    },
    /// A peer acked our announcement and was recorded
    Recorded {
        peer: Identifier<G>,
        outcome: UpsertOutcome,
    },
    Dropped(DropReason),
}

// ----------------------------------------------------------------------------
// Router
// ----------------------------------------------------------------------------

/// Routing rules for one signer and one application payload type
#[derive(Debug, Clone)]
pub struct Router<T, G> {
    signer: Identifier<G>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload, G: Group> Router<T, G> {
    pub fn new(signer: Identifier<G>) -> Self {
        Self {
            signer,
            _payload: PhantomData,
        }
    }

    pub fn signer(&self) -> &Identifier<G> {
        &self.signer
    }

    /// Classify and route a raw channel payload
    pub fn route_raw(&self, raw: &str, peers: &mut PeerTable<G>, now: Instant) -> Route<T, G> {
        match Envelope::decode(raw) {
            Some(envelope) => self.route(envelope, peers, now),
            None => Route::Dropped(DropReason::Unrecognized),
        }
    }

    /// Route a decoded envelope
    pub fn route(
        &self,
        envelope: Envelope<G>,
        peers: &mut PeerTable<G>,
        now: Instant,
    ) -> Route<T, G> {
        match envelope {
            Envelope::Direct(message) => self.route_direct(message),
            Envelope::Announcement(announcement) => {
                self.route_announcement(announcement, peers, now)
            }
            Envelope::Ack(ack) => self.route_ack(ack, peers, now),
        }
    }

    fn route_direct(&self, message: DirectMessage<G>) -> Route<T, G> {
        if message.sender.same_peer(&self.signer) {
            return Route::Dropped(DropReason::Echo);
        }

        let direct = match &message.recipient {
            Some(recipient) if !recipient.same_peer(&self.signer) => {
                return Route::Dropped(DropReason::AddressedElsewhere);
            }
            Some(_) => true,
            None if !message.sender.same_group(&self.signer) => {
                return Route::Dropped(DropReason::OtherGroup);
            }
            None => false,
        };

        match decode_payload::<T>(&message.payload) {
            Some(payload) => Route::Deliver(Delivery {
                payload,
                sender: message.sender,
                direct,
            }),
            None => Route::Dropped(DropReason::PayloadMismatch),
        }
    }

    fn route_announcement(
        &self,
        announcement: PresenceAnnouncement<G>,
        peers: &mut PeerTable<G>,
        now: Instant,
    ) -> Route<T, G> {
        if announcement.sender.same_peer(&self.signer) {
            return Route::Dropped(DropReason::Echo);
        }

        let outcome = peers.upsert(announcement.sender.clone(), now);
        Route::Reply {
            ack: PresenceAck {
                sender: self.signer.clone(),
                recipient: announcement.sender,
            },
            outcome,
        }
    }

    fn route_ack(
        &self,
        ack: PresenceAck<G>,
        peers: &mut PeerTable<G>,
        now: Instant,
    ) -> Route<T, G> {
        if !ack.recipient.same_peer(&self.signer) {
            return Route::Dropped(DropReason::AddressedElsewhere);
        }
        if ack.sender.same_peer(&self.signer) {
            return Route::Dropped(DropReason::Echo);
        }

        let outcome = peers.upsert(ack.sender.clone(), now);
        Route::Recorded {
            peer: ack.sender,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_payload;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Chat {
        text: String,
    }

    impl Payload for Chat {
        const TYPE: &'static str = "Chat";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Other {
        text: String,
    }

    impl Payload for Other {
        const TYPE: &'static str = "Other";
    }

    fn peer(group: &str, name: &str) -> Identifier<String> {
        Identifier::new(group.to_string(), Some(name.to_string()))
    }

    fn chat(text: &str) -> String {
        encode_payload(&Chat { text: text.into() }).unwrap()
    }

    fn setup() -> (Router<Chat, String>, PeerTable<String>) {
        let signer = peer("g1", "me");
        let peers = PeerTable::new(signer.id());
        (Router::new(signer), peers)
    }

    #[test]
    fn test_group_broadcast_is_delivered() {
        let (router, mut peers) = setup();
        let alice = peer("g1", "alice");
        let envelope = DirectMessage::broadcast(chat("hi"), alice.clone()).into();

        let route = router.route(envelope, &mut peers, Instant::now());
        assert_eq!(
            route,
            Route::Deliver(Delivery {
                payload: Chat { text: "hi".into() },
                sender: alice,
                direct: false,
            })
        );
        // Messages never touch the peer table
        assert!(peers.is_empty());
    }

    #[test]
    fn test_direct_message_filters() {
        let (router, mut peers) = setup();
        let me = router.signer().clone();
        let outsider = peer("g2", "outsider");
        let bob = peer("g1", "bob");
        let now = Instant::now();

        // Echo
        let echo = DirectMessage::broadcast(chat("x"), me.clone()).into();
        assert_eq!(router.route(echo, &mut peers, now), Route::Dropped(DropReason::Echo));

        // Addressed to someone else, even from our own group
        let elsewhere = DirectMessage::to(chat("x"), bob.clone(), outsider.clone()).into();
        assert_eq!(
            router.route(elsewhere, &mut peers, now),
            Route::Dropped(DropReason::AddressedElsewhere)
        );

        // Broadcast from another group
        let foreign = DirectMessage::broadcast(chat("x"), outsider.clone()).into();
        assert_eq!(
            router.route(foreign, &mut peers, now),
            Route::Dropped(DropReason::OtherGroup)
        );

        // Direct messages bypass the group check
        let direct = DirectMessage::to(chat("psst"), outsider.clone(), me).into();
        match router.route(direct, &mut peers, now) {
            Route::Deliver(delivery) => {
                assert!(delivery.direct);
                assert_eq!(delivery.sender, outsider);
            }
            other => panic!("expected delivery, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_of_other_type_is_dropped() {
        let (router, mut peers) = setup();
        let alice = peer("g1", "alice");
        let payload = encode_payload(&Other { text: "x".into() }).unwrap();
        let envelope = DirectMessage::broadcast(payload, alice).into();

        assert_eq!(
            router.route(envelope, &mut peers, Instant::now()),
            Route::Dropped(DropReason::PayloadMismatch)
        );
    }

    #[test]
    fn test_announcement_records_and_acks() {
        let (router, mut peers) = setup();
        let alice = peer("g2", "alice");
        let envelope = PresenceAnnouncement {
            sender: alice.clone(),
        }
        .into();

        match router.route(envelope, &mut peers, Instant::now()) {
            Route::Reply { ack, outcome } => {
                assert_eq!(outcome, UpsertOutcome::Inserted);
                assert_eq!(&ack.sender, router.signer());
                assert_eq!(ack.recipient, alice);
            }
            other => panic!("expected reply, got {:?}", other),
        }
        // Discovery is not group scoped
        assert_eq!(peers.get("alice").unwrap().identifier, alice);
    }

    #[test]
    fn test_own_announcement_is_ignored() {
        let (router, mut peers) = setup();
        let envelope = PresenceAnnouncement {
            sender: router.signer().clone(),
        }
        .into();
        assert_eq!(
            router.route(envelope, &mut peers, Instant::now()),
            Route::Dropped(DropReason::Echo)
        );
        assert!(peers.is_empty());
    }

    #[test]
    fn test_ack_only_accepted_when_addressed_to_us() {
        let (router, mut peers) = setup();
        let alice = peer("g1", "alice");
        let bob = peer("g1", "bob");
        let now = Instant::now();

        let for_bob = PresenceAck {
            sender: alice.clone(),
            recipient: bob,
        }
        .into();
        assert_eq!(
            router.route(for_bob, &mut peers, now),
            Route::Dropped(DropReason::AddressedElsewhere)
        );
        assert!(peers.is_empty());

        let for_us = PresenceAck {
            sender: alice.clone(),
            recipient: router.signer().clone(),
        }
        .into();
        assert_eq!(
            router.route(for_us, &mut peers, now),
            Route::Recorded {
                peer: alice,
                outcome: UpsertOutcome::Inserted,
            }
        );
        assert!(peers.contains("alice"));
    }

    #[test]
    fn test_unrecognized_raw_payload() {
        let (router, mut peers) = setup();
        assert_eq!(
            router.route_raw(r#"{"type":"Chatter","text":"hi"}"#, &mut peers, Instant::now()),
            Route::Dropped(DropReason::Unrecognized)
        );
    }
}
