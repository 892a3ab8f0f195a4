//! Multi-peer simulation over the in-process channel
//!
//! Spawns one communicator per configured peer on a shared [`MemoryHub`],
//! waits for every peer table to fill, then has the first peer broadcast to
//! its group and send a direct message to the last peer by display key.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{self, Duration};
use tracing::{debug, info};

use bravo_core::{
    ClientRegistry, Communicator, Delivery, MemoryHub, MemoryTransportConfig, Payload,
};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Chat payload exchanged by simulated peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
}

impl Payload for ChatMessage {
    const TYPE: &'static str = "ChatMessage";
}

/// A message as received by one simulated peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub receiver: String,
    pub sender: String,
    pub text: String,
    pub direct: bool,
}

/// What the simulation observed
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    /// Each peer's name and sorted display keys of the peers it discovered
    pub tables: Vec<(String, Vec<String>)>,
    pub received: Vec<Received>,
}

type Inbox = Arc<Mutex<Vec<Received>>>;

fn lock(inbox: &Inbox) -> std::sync::MutexGuard<'_, Vec<Received>> {
    inbox.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run the simulation described by `config`
pub async fn run(config: &AppConfig) -> Result<SimulationReport> {
    config.validate()?;

    let hub = MemoryHub::new();
    let registry = ClientRegistry::new();
    let inbox: Inbox = Arc::default();
    let transport_config = if config.presence_delay_ms == 0 {
        MemoryTransportConfig::default()
    } else {
        MemoryTransportConfig::delayed(config.presence_delay())
    };

    let mut communicators: Vec<Communicator<ChatMessage, String>> = Vec::new();
    for peer in &config.peers {
        let transport = hub.connect_with(transport_config.clone());
        let receiver = peer.name.clone();
        let sink = inbox.clone();
        let handler = move |delivery: Delivery<ChatMessage, String>| {
            info!(
                to = %receiver,
                from = %delivery.sender.display_key(),
                direct = delivery.direct,
                text = %delivery.payload.text,
                "Message received"
            );
            lock(&sink).push(Received {
                receiver: receiver.clone(),
                sender: delivery.sender.display_key(),
                text: delivery.payload.text,
                direct: delivery.direct,
            });
        };

        let communicator = Communicator::builder(config.communicator_config(peer), handler)
            .connect(&transport, &registry)
            .await?;
        debug!(peer = %peer.name, group = %peer.group, "Spawned peer");
        communicators.push(communicator);
    }

    wait_for_discovery(&communicators, config.discovery_timeout()).await?;

    let mut report = SimulationReport::default();
    for communicator in &communicators {
        let keys = communicator
            .peers()
            .await
            .iter()
            .map(|entry| entry.display_key())
            .collect();
        report.tables.push((communicator.signer().display_key(), keys));
    }

    let (first, last) = match (communicators.first(), communicators.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(CliError::Simulation("no peers configured".to_string())),
    };
    let target = last.signer().display_key();

    first
        .broadcast(&ChatMessage {
            text: config.message.clone(),
        })
        .await?;
    first
        .send_to(
            &ChatMessage {
                text: format!("Direct hello to {}", target),
            },
            target.as_str(),
        )
        .await?;

    let expected = expected_deliveries(config);
    let settled = time::timeout(config.discovery_timeout(), async {
        while lock(&inbox).len() < expected {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if settled.is_err() {
        return Err(CliError::Simulation(format!(
            "expected {} deliveries, saw {}",
            expected,
            lock(&inbox).len()
        )));
    }

    for communicator in communicators {
        communicator.shutdown().await;
    }

    report.received = lock(&inbox).clone();
    Ok(report)
}

/// Broadcast recipients in the first peer's group, plus the direct message
fn expected_deliveries(config: &AppConfig) -> usize {
    let Some(first) = config.peers.first() else {
        return 0;
    };
    let group_mates = config.peers[1..]
        .iter()
        .filter(|peer| peer.group == first.group)
        .count();
    group_mates + 1
}

async fn wait_for_discovery(
    communicators: &[Communicator<ChatMessage, String>],
    timeout: Duration,
) -> Result<()> {
    let want = communicators.len().saturating_sub(1);
    let converged = time::timeout(timeout, async {
        for communicator in communicators {
            while communicator.peers().await.len() < want {
                time::sleep(Duration::from_millis(10)).await;
            }
        }
    })
    .await;

    match converged {
        Ok(()) => {
            info!(peers = communicators.len(), "Discovery converged");
            Ok(())
        }
        Err(_) => Err(CliError::Simulation(format!(
            "peer tables did not converge within {}ms",
            timeout.as_millis()
        ))),
    }
}
