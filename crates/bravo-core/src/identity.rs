//! Peer identifiers
//!
//! An [`Identifier`] is the self-describing handle a peer puts on every
//! envelope it sends: its random session id, the application group it
//! broadcasts to, and an optional human-readable name.

use serde::{Deserialize, Serialize};

use crate::types::{Group, SessionId};

/// A peer handle travelling inside envelopes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound = "G: Group")]
pub struct Identifier<G> {
    id: SessionId,
    group: G,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl<G: Group> Identifier<G> {
    /// Create an identifier with a freshly generated session id
    pub fn new(group: G, name: Option<String>) -> Self {
        Self::with_id(SessionId::generate(), group, name)
    }

    /// Create an identifier around an existing session id
    pub fn with_id(id: SessionId, group: G, name: Option<String>) -> Self {
        Self { id, group, name }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Key used to address this peer in a peer table: the name if set, else the id
    pub fn display_key(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    /// Same physical peer session, regardless of group or name
    pub fn same_peer(&self, other: &Identifier<G>) -> bool {
        self.id == other.id
    }

    /// Same broadcast scope
    pub fn same_group(&self, other: &Identifier<G>) -> bool {
        self.group == other.group
    }
}
