//! Replayable document updates.
//!
//! An [`Update`] is the id-addressed operation log of one committed
//! transaction. Array operations name the slots they anchor on or delete,
//! map operations carry the stamp they compete with, so updates commute:
//! replicas that have integrated the same set of updates hold the same tree
//! whatever order they arrived in. An update is integrated only once its
//! producer's prior updates (`deps`) are in; earlier arrivals wait.

use crate::content::{Content, SlotContent};
use crate::error::DocResult;
use crate::state::StateVector;
use relm_types::{ClientId, NodeId};
use serde::{Deserialize, Serialize};

/// Kind of a named root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    Map,
    Array,
}

/// Address of the node an operation applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A named root, created on first use.
    Root { name: String, kind: RootKind },
    Node(NodeId),
}

/// One primitive operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UpdateOp {
    /// Writes a key unless a write with a later stamp got there first.
    MapSet {
        target: Target,
        key: String,
        stamp: NodeId,
        content: Content,
    },
    /// Removes a key, competing with writes like [`UpdateOp::MapSet`].
    MapRemove {
        target: Target,
        key: String,
        stamp: NodeId,
    },
    /// Inserts consecutive slots after `origin` (`None`: at the start).
    ArrayInsert {
        target: Target,
        origin: Option<NodeId>,
        items: Vec<SlotContent>,
    },
    /// Tombstones slots by id.
    ArrayDelete { target: Target, slots: Vec<NodeId> },
}

/// The operations of one committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Replica that produced the transaction.
    pub client: ClientId,
    /// Position in the producer's sequence of updates, from 1.
    pub seq: u64,
    /// What the producer had integrated when it committed.
    pub deps: StateVector,
    pub ops: Vec<UpdateOp>,
}

impl Update {
    /// Encodes the update for the transport.
    pub fn encode(&self) -> DocResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes bytes produced by [`Update::encode`].
    pub fn decode(bytes: &[u8]) -> DocResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
