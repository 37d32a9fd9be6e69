//! Identifier types used throughout the world-sync core.
//!
//! Local entities are addressed by a stable string id that travels inside the
//! shared document. Document nodes carry a separate, provider-assigned
//! [`NodeId`] made of the creating replica's [`ClientId`] and a per-replica
//! clock, the same shape Yjs uses for its item ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a local entity.
///
/// Ids minted locally are UUID v7 strings, but any non-empty string received
/// from a peer is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new, globally unique entity id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parses an entity id, rejecting empty strings.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidEntityId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one document replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    /// Reserved client id owning the named root nodes of every document.
    pub const ROOT: ClientId = ClientId(0);

    /// Creates a random client id. Never returns [`ClientId::ROOT`].
    #[must_use]
    pub fn random() -> Self {
        let (hi, lo) = Uuid::new_v4().as_u64_pair();
        match hi ^ lo {
            0 => Self(1),
            n => Self(n),
        }
    }

    /// Creates a client id from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a node (map or array) inside the replicated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Replica that created the node.
    pub client: ClientId,
    /// Position in that replica's creation sequence.
    pub clock: u64,
}

impl NodeId {
    /// Creates a node id from its components.
    #[must_use]
    pub const fn new(client: ClientId, clock: u64) -> Self {
        Self { client, clock }
    }

    /// Deterministic id of a named root node.
    ///
    /// Every replica derives the same id for the same name, so updates that
    /// address a root resolve everywhere.
    #[must_use]
    pub const fn root(name: &str) -> Self {
        Self {
            client: ClientId::ROOT,
            clock: fnv1a(name.as_bytes()),
        }
    }

    /// Returns true if this id belongs to a named root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.client.0 == ClientId::ROOT.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client, self.clock)
    }
}

impl FromStr for NodeId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidNodeId(s.to_string());
        let (client, clock) = s.split_once(':').ok_or_else(invalid)?;
        let client: u64 = client.parse().map_err(|_| invalid())?;
        let clock: u64 = clock.parse().map_err(|_| invalid())?;
        Ok(Self::new(ClientId(client), clock))
    }
}

const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
        i += 1;
    }
    hash
}
