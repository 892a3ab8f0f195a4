//! Bravo CLI library
//!
//! Configuration, argument parsing and the in-process simulation behind the
//! `bravo` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod simulate;

pub use cli::{Cli, Commands};
pub use config::{AppConfig, PeerConfig};
pub use error::{CliError, Result};
pub use simulate::{ChatMessage, Received, SimulationReport};
