//! Peer address book
//!
//! Tracks the last-known [`Identifier`] of every peer discovered through
//! presence announcements and acknowledgements. Entries are stored by session
//! id with a secondary index from peer name to session id, and are looked up
//! by display key: the peer's name if it has one, otherwise its id.
//!
//! Keying rules:
//! - at most one entry per session id and at most one entry per name
//! - a named peer that reappears under a new session id replaces the old entry
//! - a peer that changes or drops its name loses the old name mapping
//! - the table owner's own session is never stored
//! - peers whose name parses as a session id are never stored

use hashbrown::HashMap;
use tokio::time::Instant;

use crate::identity::Identifier;
use crate::types::{Group, SessionId};

// ----------------------------------------------------------------------------
// Peer Entry
// ----------------------------------------------------------------------------

/// A known peer and when it was last heard from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry<G> {
    pub identifier: Identifier<G>,
    pub last_seen: Instant,
}

impl<G: Group> PeerEntry<G> {
    pub fn display_key(&self) -> String {
        self.identifier.display_key()
    }
}

/// Result of recording a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this display key was seen
    Inserted,
    /// An existing entry was refreshed or superseded
    Updated,
    /// The identifier belongs to the table owner or has an id-shaped name
    Ignored,
}

// ----------------------------------------------------------------------------
// Peer Table
// ----------------------------------------------------------------------------

/// Address book mapping display keys to last-known identifiers
#[derive(Debug, Clone)]
pub struct PeerTable<G> {
    owner: SessionId,
    entries: HashMap<SessionId, PeerEntry<G>>,
    names: HashMap<String, SessionId>,
}

impl<G: Group> PeerTable<G> {
    /// Create an empty table for the peer with session id `owner`
    pub fn new(owner: SessionId) -> Self {
        Self {
            owner,
            entries: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Record `identifier` as the latest state of its peer
    pub fn upsert(&mut self, identifier: Identifier<G>, now: Instant) -> UpsertOutcome {
        let id = identifier.id();
        if id == self.owner {
            return UpsertOutcome::Ignored;
        }
        // A name spelling a session id would share that session's display key.
        if identifier
            .name()
            .is_some_and(|name| name.parse::<SessionId>().is_ok())
        {
            return UpsertOutcome::Ignored;
        }

        let mut existed = false;

        // A name moving to a new session supersedes the old session's entry.
        if let Some(name) = identifier.name() {
            if let Some(previous) = self.names.get(name).copied() {
                existed = true;
                if previous != id {
                    self.entries.remove(&previous);
                }
            }
        }

        if let Some(current) = self.entries.get(&id) {
            existed = true;
            if let Some(old_name) = current.identifier.name() {
                if Some(old_name) != identifier.name() {
                    self.names.remove(old_name);
                }
            }
        }

        if let Some(name) = identifier.name() {
            self.names.insert(name.to_string(), id);
        }
        self.entries.insert(
            id,
            PeerEntry {
                identifier,
                last_seen: now,
            },
        );

        if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        }
    }

    fn resolve(&self, key: &str) -> Option<SessionId> {
        if let Some(id) = self.names.get(key) {
            return Some(*id);
        }
        let id: SessionId = key.parse().ok()?;
        self.entries.contains_key(&id).then_some(id)
    }

    /// Look up a peer by display key (name, or id for unnamed peers)
    pub fn get(&self, key: &str) -> Option<&PeerEntry<G>> {
        self.entries.get(&self.resolve(key)?)
    }

    /// Look up a peer by session id
    pub fn get_by_id(&self, id: &SessionId) -> Option<&PeerEntry<G>> {
        self.entries.get(id)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// Remove a peer by display key
    pub fn remove(&mut self, key: &str) -> Option<PeerEntry<G>> {
        let id = self.resolve(key)?;
        let entry = self.entries.remove(&id)?;
        if let Some(name) = entry.identifier.name() {
            self.names.remove(name);
        }
        Some(entry)
    }

    /// Drop every peer last seen before `cutoff`, returning how many were dropped
    pub fn prune_older_than(&mut self, cutoff: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_seen >= cutoff);
        let entries = &self.entries;
        self.names.retain(|_, id| entries.contains_key(id));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerEntry<G>> {
        self.entries.values()
    }

    /// Display keys of all known peers, sorted
    pub fn display_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.values().map(PeerEntry::display_key).collect();
        keys.sort();
        keys
    }
}
