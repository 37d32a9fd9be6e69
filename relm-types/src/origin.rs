//! Transaction origins.

use crate::ClientId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a document transaction came from.
///
/// The inbound observer drops `Local` transactions outright: the local world
/// already reflects them. Every other origin is reconstructed into local world
/// mutations, undo/redo replays included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "client", rename_all = "snake_case")]
pub enum Origin {
    /// Produced by this replica's outbound sync path.
    Local,
    /// Received from a peer through the transport.
    Remote(ClientId),
    /// Replayed by the undo journal.
    Undo,
    /// Replayed by the redo journal.
    Redo,
    /// Bulk seeding of a document from an exported world.
    Import,
}

impl Origin {
    /// True for transactions produced by this replica's own outbound path.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }

    /// True for undo or redo replays.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        matches!(self, Origin::Undo | Origin::Redo)
    }

    /// True if the transaction was created on this replica and must be
    /// shipped to peers.
    #[must_use]
    pub const fn is_outgoing(&self) -> bool {
        !matches!(self, Origin::Remote(_))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => f.write_str("local"),
            Origin::Remote(client) => write!(f, "remote({client})"),
            Origin::Undo => f.write_str("undo"),
            Origin::Redo => f.write_str("redo"),
            Origin::Import => f.write_str("import"),
        }
    }
}
