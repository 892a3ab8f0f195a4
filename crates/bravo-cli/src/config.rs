//! Bravo CLI configuration
//!
//! The simulation is described by a TOML file: the shared channel, join and
//! presence timing, and the peers to spawn. Missing fields take defaults and
//! command-line flags override whatever the file says.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use bravo_core::{CommunicatorConfig, DEFAULT_JOIN_TIMEOUT_MS};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// One simulated peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    pub group: String,
}

impl PeerConfig {
    pub fn new(name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
        }
    }
}

/// Complete configuration for the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Channel every simulated peer joins
    pub channel_name: String,
    /// Bound on how long a send waits for the channel join
    pub join_timeout_ms: u64,
    /// Delay before the channel reports full presence; 0 joins immediately
    pub presence_delay_ms: u64,
    /// How long to wait for every peer table to fill
    pub discovery_timeout_ms: u64,
    /// Broadcast text sent by the first peer
    pub message: String,
    pub peers: Vec<PeerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel_name: "bravo-lobby".to_string(),
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            presence_delay_ms: 0,
            discovery_timeout_ms: 5_000,
            message: "Hello from Bravo".to_string(),
            peers: vec![
                PeerConfig::new("alice", "blue"),
                PeerConfig::new("bob", "blue"),
                PeerConfig::new("carol", "green"),
            ],
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Validation
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.peers.len() < 2 {
            return Err(CliError::Config(
                "at least two peers are needed to simulate discovery".to_string(),
            ));
        }
        if self.discovery_timeout_ms == 0 {
            return Err(CliError::Config(
                "discovery_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for peer in &self.peers {
            if !names.insert(peer.name.as_str()) {
                return Err(CliError::Config(format!("duplicate peer name: {}", peer.name)));
            }
            self.communicator_config(peer).validate()?;
        }
        Ok(())
    }

    /// Communicator configuration for one simulated peer
    pub fn communicator_config(&self, peer: &PeerConfig) -> CommunicatorConfig<String> {
        let mut config = CommunicatorConfig::new(self.channel_name.clone(), peer.group.clone())
            .with_name(peer.name.clone());
        config.join.timeout_ms = self.join_timeout_ms;
        config
    }

    pub fn presence_delay(&self) -> Duration {
        Duration::from_millis(self.presence_delay_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.peers.len(), 3);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            channel_name = "ops"
            presence_delay_ms = 250

            [[peers]]
            name = "red-1"
            group = "red"

            [[peers]]
            name = "red-2"
            group = "red"
            "#,
        )
        .unwrap();

        assert_eq!(config.channel_name, "ops");
        assert_eq!(config.presence_delay(), Duration::from_millis(250));
        assert_eq!(config.join_timeout_ms, DEFAULT_JOIN_TIMEOUT_MS);
        assert_eq!(config.peers[1], PeerConfig::new("red-2", "red"));

        let communicator = config.communicator_config(&config.peers[0]);
        assert_eq!(communicator.channel_name, "ops");
        assert_eq!(communicator.name.as_deref(), Some("red-1"));
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let duplicate = r#"
            [[peers]]
            name = "same"
            group = "a"

            [[peers]]
            name = "same"
            group = "b"
        "#;
        assert!(matches!(
            AppConfig::from_toml(duplicate),
            Err(CliError::Config(_))
        ));

        let lonely = r#"
            [[peers]]
            name = "solo"
            group = "a"
        "#;
        assert!(AppConfig::from_toml(lonely).is_err());

        let zero_timeout = "join_timeout_ms = 0";
        assert!(matches!(
            AppConfig::from_toml(zero_timeout),
            Err(CliError::BravoCore(_))
        ));

        assert!(matches!(
            AppConfig::from_toml("peers = 3"),
            Err(CliError::TomlParsing(_))
        ));
    }
}
