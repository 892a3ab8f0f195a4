//! Bravo Core
//!
//! Peer discovery and message routing for applications that share a single
//! presence-enabled publish/subscribe channel. Each participant runs a
//! [`Communicator`]: it announces itself once the channel join completes,
//! acknowledges other peers' announcements, keeps a table of known peers, and
//! delivers group broadcasts and directed messages to an application handler.
//!
//! The channel service itself sits behind the [`Transport`] trait. An
//! in-process implementation lives in [`transport::memory`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod communicator;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod join;
pub mod peers;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use communicator::{Communicator, CommunicatorBuilder, Recipient};
pub use config::{CommunicatorConfig, JoinConfig, DEFAULT_JOIN_TIMEOUT_MS};
pub use errors::{BravoError, BravoResult, Result, TransportError};
pub use handlers::{Delivery, ErrorHandler, LogErrorHandler, MessageHandler};
pub use identity::Identifier;
pub use join::{JoinGate, JoinState};
pub use peers::{PeerEntry, PeerTable, UpsertOutcome};
pub use protocol::{DirectMessage, Envelope, Payload, PresenceAck, PresenceAnnouncement};
pub use registry::{ClientLease, ClientRegistry};
pub use router::{DropReason, Route, Router};
pub use transport::{
    ChannelEvent, ChannelPublisher, MemoryHub, MemoryTransport, MemoryTransportConfig,
    PresenceMode, SubscribeOptions, Subscription, Transport,
};
pub use types::{Group, SessionId};
