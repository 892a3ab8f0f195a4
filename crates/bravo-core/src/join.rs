//! Channel join state and the outbound join gate
//!
//! A communicator starts `Disconnected`, becomes `Joining` once its channel
//! subscription exists and `Joined` when the channel reports full presence.
//! `Joined` is terminal for the life of the subscription. Outbound sends wait
//! on the gate until the state is `Joined`, bounded by the configured timeout.

use core::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{self, Duration};

use crate::errors::{BravoError, Result};

// ----------------------------------------------------------------------------
// Join State
// ----------------------------------------------------------------------------

/// Lifecycle of the communicator's channel membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Disconnected,
    Joining,
    Joined,
}

impl JoinState {
    pub fn is_joined(&self) -> bool {
        matches!(self, JoinState::Joined)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: JoinState) -> bool {
        matches!(
            (self, next),
            (JoinState::Disconnected, JoinState::Joining) | (JoinState::Joining, JoinState::Joined)
        )
    }
}

impl fmt::Display for JoinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinState::Disconnected => "disconnected",
            JoinState::Joining => "joining",
            JoinState::Joined => "joined",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Join Gate
// ----------------------------------------------------------------------------

/// Shared join state with a notification for waiters
///
/// The event loop owns the transitions; any number of senders can wait.
#[derive(Debug, Clone)]
pub struct JoinGate {
    state: Arc<watch::Sender<JoinState>>,
}

impl Default for JoinGate {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(JoinState::Disconnected);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> JoinState {
        *self.state.borrow()
    }

    pub fn is_joined(&self) -> bool {
        self.state().is_joined()
    }

    /// Apply a transition, returning whether it was legal and took effect
    pub fn transition(&self, next: JoinState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the state is `Joined`
    ///
    /// Fails with [`BravoError::JoinTimeout`] if that does not happen within
    /// `timeout`. Returns immediately when already joined.
    pub async fn wait_joined(&self, timeout: Duration) -> Result<()> {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let waited = time::timeout(timeout, receiver.wait_for(JoinState::is_joined))
            .await
            .map(|changed| changed.map(|_| ()));
        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(BravoError::Closed),
            Err(_) => Err(BravoError::JoinTimeout {
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let gate = JoinGate::new();
        assert_eq!(gate.state(), JoinState::Disconnected);

        assert!(!gate.transition(JoinState::Joined));
        assert!(gate.transition(JoinState::Joining));
        assert!(!gate.transition(JoinState::Joining));
        assert!(gate.transition(JoinState::Joined));
        assert!(gate.is_joined());

        // Joined is terminal
        assert!(!gate.transition(JoinState::Joining));
        assert!(!gate.transition(JoinState::Disconnected));
        assert_eq!(gate.state(), JoinState::Joined);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_when_never_joined() {
        let gate = JoinGate::new();
        gate.transition(JoinState::Joining);

        let start = time::Instant::now();
        let err = gate.wait_joined(Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, BravoError::JoinTimeout { waited_ms: 10_000 }));
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolves_on_join() {
        let gate = JoinGate::new();
        gate.transition(JoinState::Joining);

        let joiner = gate.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(250)).await;
            joiner.transition(JoinState::Joined);
        });

        let start = time::Instant::now();
        gate.wait_joined(Duration::from_secs(10)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_joined() {
        let gate = JoinGate::new();
        gate.transition(JoinState::Joining);
        gate.transition(JoinState::Joined);
        gate.wait_joined(Duration::from_millis(1)).await.unwrap();
    }
}
