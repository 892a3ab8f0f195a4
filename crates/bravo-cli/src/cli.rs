//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured peers on one in-process channel
    Simulate {
        /// Override the channel name
        #[arg(long)]
        channel: Option<String>,
        /// Override the join timeout in milliseconds
        #[arg(long)]
        join_timeout_ms: Option<u64>,
        /// Override the presence delay in milliseconds
        #[arg(long)]
        presence_delay_ms: Option<u64>,
        /// Text of the broadcast sent by the first peer
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Validate a configuration file and exit
    CheckConfig {
        /// File to check; falls back to --config
        path: Option<String>,
    },
}
