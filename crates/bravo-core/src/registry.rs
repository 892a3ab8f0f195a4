//! Active client registry
//!
//! A transport connection can back at most one communicator. The registry is
//! an explicit object handed to every communicator constructor; claiming a
//! transport client yields a [`ClientLease`] that releases the claim when
//! dropped, so uniqueness follows the communicator's lifetime.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::errors::{BravoError, Result};

/// Tracks which transport clients currently back a communicator
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `client_id`, failing with [`BravoError::DuplicateClient`] if it is taken
    pub fn claim(&self, client_id: &str) -> Result<ClientLease> {
        if !self.lock().insert(client_id.to_string()) {
            return Err(BravoError::DuplicateClient {
                transport: client_id.to_string(),
            });
        }
        debug!(client_id, "Claimed transport client");
        Ok(ClientLease {
            registry: self.clone(),
            client_id: client_id.to_string(),
        })
    }

    pub fn is_active(&self, client_id: &str) -> bool {
        self.lock().contains(client_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// Exclusive claim on a transport client, released on drop
#[derive(Debug)]
pub struct ClientLease {
    registry: ClientRegistry,
    client_id: String,
}

impl ClientLease {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.client_id);
        debug!(client_id = %self.client_id, "Released transport client");
    }
}
