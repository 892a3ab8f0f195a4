//! Bravo CLI entry point

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bravo_cli::{
    cli::{Cli, Commands},
    config::AppConfig,
    error::{CliError, Result},
    simulate,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    if let Err(e) = execute(cli).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Simulate {
            channel,
            join_timeout_ms,
            presence_delay_ms,
            message,
        } => {
            let mut config = load_configuration(cli.config.as_deref())?;
            if let Some(channel) = channel {
                config.channel_name = channel;
            }
            if let Some(timeout) = join_timeout_ms {
                config.join_timeout_ms = timeout;
            }
            if let Some(delay) = presence_delay_ms {
                config.presence_delay_ms = delay;
            }
            if let Some(message) = message {
                config.message = message;
            }

            info!(
                channel = %config.channel_name,
                peers = config.peers.len(),
                "Starting simulation"
            );
            let report = simulate::run(&config).await?;

            println!("Peer tables:");
            for (peer, keys) in &report.tables {
                println!("  {} knows [{}]", peer, keys.join(", "));
            }
            println!("Deliveries:");
            for received in &report.received {
                let kind = if received.direct { "direct" } else { "broadcast" };
                println!(
                    "  {} <- {} ({}): {}",
                    received.receiver, received.sender, kind, received.text
                );
            }
            Ok(())
        }
        Commands::CheckConfig { path } => {
            let path = path
                .or(cli.config)
                .ok_or_else(|| CliError::Config("no configuration file given".to_string()))?;
            let config = AppConfig::load_from_file(&path)?;
            println!(
                "{}: ok ({} peers on channel {})",
                path,
                config.peers.len(),
                config.channel_name
            );
            Ok(())
        }
    }
}

/// Setup logging based on verbosity level, letting RUST_LOG take precedence
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(path: Option<&str>) -> Result<AppConfig> {
    if let Some(config_path) = path {
        info!("Loading configuration from: {}", config_path);
        let config = AppConfig::load_from_file(config_path)?;
        Ok(config)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::default())
    }
}
