//! Application-facing handlers
//!
//! A communicator reports decoded application messages to a
//! [`MessageHandler`] and caller-visible failures to an [`ErrorHandler`].
//! Both are implemented for plain closures.

use tracing::error;

use crate::errors::BravoError;
use crate::identity::Identifier;

// ----------------------------------------------------------------------------
// Deliveries
// ----------------------------------------------------------------------------

/// An application message accepted by the router
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<T, G> {
    pub payload: T,
    /// Who sent it; pass back to `send_to` to reply
    pub sender: Identifier<G>,
    /// Addressed to this peer rather than broadcast to the group
    pub direct: bool,
}

// ----------------------------------------------------------------------------
// Handler Traits
// ----------------------------------------------------------------------------

/// Receives application messages, one at a time, on the event loop
pub trait MessageHandler<T, G>: Send + Sync {
    fn on_message(&self, delivery: Delivery<T, G>);
}

impl<T, G, F> MessageHandler<T, G> for F
where
    F: Fn(Delivery<T, G>) + Send + Sync,
{
    fn on_message(&self, delivery: Delivery<T, G>) {
        self(delivery)
    }
}

/// Receives errors that have no caller to return to, or that the caller asked to see
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, error: &BravoError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&BravoError) + Send + Sync,
{
    fn on_error(&self, error: &BravoError) {
        self(error)
    }
}

/// Default error handler: log and carry on
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn on_error(&self, error: &BravoError) {
        error!(%error, "Communicator error");
    }
}
