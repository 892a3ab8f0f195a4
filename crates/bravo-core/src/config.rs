//! Communicator configuration
//!
//! Plain serde structures so applications can embed them in their own
//! configuration files. Transport settings are not part of this: each
//! transport carries its own configuration.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{BravoError, Result};
use crate::types::{Group, SessionId};

// ----------------------------------------------------------------------------
// Join Configuration
// ----------------------------------------------------------------------------

/// Default bound on how long a send waits for the channel join
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 10_000;

/// Configuration for the outbound join gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// How long a send may wait for the channel join before failing
    pub timeout_ms: u64,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl JoinConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self { timeout_ms: 500 }
    }
}

// ----------------------------------------------------------------------------
// Communicator Configuration
// ----------------------------------------------------------------------------

/// Everything a communicator needs besides its transport and handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "G: Group")]
pub struct CommunicatorConfig<G> {
    /// Presence-enabled channel every peer joins
    pub channel_name: String,
    /// Broadcast scope of this peer
    pub group: G,
    /// Stable human-readable name, used as this peer's display key by others
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub join: JoinConfig,
}

impl<G: Group> CommunicatorConfig<G> {
    pub fn new(channel_name: impl Into<String>, group: G) -> Self {
        Self {
            channel_name: channel_name.into(),
            group,
            name: None,
            join: JoinConfig::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(BravoError::config_error("channel_name must not be empty"));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(BravoError::config_error(
                    "name must not be empty when provided",
                ));
            }
            if name.parse::<SessionId>().is_ok() {
                return Err(BravoError::config_error(
                    "name must not be a session id, peers would ignore it",
                ));
            }
        }
        if self.join.timeout_ms == 0 {
            return Err(BravoError::config_error(
                "join.timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}
