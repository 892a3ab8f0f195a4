//! Error types for the Bravo protocol
//!
//! This module contains every error surfaced by the communicator: transport
//! collaborator failures, addressing failures, join timeouts and construction
//! invariants. Shape mismatches while decoding inbound traffic are not errors;
//! the codec reports them as `None` and the router drops the payload.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by the pub/sub channel collaborator
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Subscribe to channel {channel} failed: {reason}")]
    SubscribeFailed { channel: String, reason: String },
    #[error("Publish on channel {channel} failed: {reason}")]
    PublishFailed { channel: String, reason: String },
    #[error("Channel {channel} is closed")]
    ChannelClosed { channel: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error types for the Bravo protocol
#[derive(Debug, thiserror::Error)]
pub enum BravoError {
    /// Direct send to a display key that is not in the peer table
    #[error("Recipient not found: {key}")]
    RecipientNotFound { key: String },

    /// The channel never reported full presence within the join bound
    #[error("Could not join channel, timed out after {waited_ms}ms")]
    JoinTimeout { waited_ms: u64 },

    /// A second communicator tried to claim an already active transport client
    #[error("Only one communicator can be active per transport client ({transport})")]
    DuplicateClient { transport: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value could not be put into tagged wire form
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// The communicator event loop has stopped
    #[error("Communicator is shut down")]
    Closed,
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl BravoError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        BravoError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid payload error with a reason
    pub fn invalid_payload<T: Into<String>>(reason: T) -> Self {
        BravoError::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Create a recipient not found error for a display key
    pub fn recipient_not_found<K: Into<String>>(key: K) -> Self {
        BravoError::RecipientNotFound { key: key.into() }
    }

    /// Create a publish failure for a channel
    pub fn publish_failed<C: Into<String>, R: Into<String>>(channel: C, reason: R) -> Self {
        BravoError::Transport(TransportError::PublishFailed {
            channel: channel.into(),
            reason: reason.into(),
        })
    }

    /// Create a subscribe failure for a channel
    pub fn subscribe_failed<C: Into<String>, R: Into<String>>(channel: C, reason: R) -> Self {
        BravoError::Transport(TransportError::SubscribeFailed {
            channel: channel.into(),
            reason: reason.into(),
        })
    }

    /// Whether this error was reported because the peer was unknown
    pub fn is_recipient_not_found(&self) -> bool {
        matches!(self, BravoError::RecipientNotFound { .. })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, BravoError>;
pub type BravoResult<T> = Result<T>;
