//! Deep-observation events.
//!
//! Every committed transaction that changed anything yields one
//! [`TransactionBatch`]. Each [`DocEvent`] describes the net change to a single
//! map or array node that existed before the transaction; nodes created in the
//! same transaction are reported only through their insertion.

use relm_types::{NodeId, Origin, Path};
use serde_json::Value;
use std::collections::BTreeMap;

/// All events of one transaction, shallowest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBatch {
    pub origin: Origin,
    pub events: Vec<DocEvent>,
}

impl TransactionBatch {
    /// True when the transaction was produced by this replica's own outbound path.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin.is_local()
    }
}

/// The change to one node.
#[derive(Debug, Clone, PartialEq)]
pub struct DocEvent {
    /// The changed node.
    pub target: NodeId,
    /// Name of the root the target lives under.
    pub root: String,
    /// Keys and indices from the root to the target (empty for the root).
    pub path: Path,
    /// Node ids from the root to the target, both included; one longer than `path`.
    pub ancestors: Vec<NodeId>,
    pub change: EventChange,
}

/// What happened to the target node.
#[derive(Debug, Clone, PartialEq)]
pub enum EventChange {
    Map(BTreeMap<String, EntryChange>),
    Array(Vec<ArrayDelta>),
}

/// Net change of one map key; values are materialized JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryChange {
    Inserted(Value),
    Updated { old: Value, new: Value },
    Removed(Value),
}

impl EntryChange {
    /// The value after the transaction, if the key still exists.
    #[must_use]
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            EntryChange::Inserted(v) | EntryChange::Updated { new: v, .. } => Some(v),
            EntryChange::Removed(_) => None,
        }
    }

    /// The value before the transaction, if the key existed.
    #[must_use]
    pub fn old_value(&self) -> Option<&Value> {
        match self {
            EntryChange::Updated { old: v, .. } | EntryChange::Removed(v) => Some(v),
            EntryChange::Inserted(_) => None,
        }
    }
}

/// One array edit, in the order it was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayDelta {
    Insert {
        index: usize,
        items: Vec<InsertedItem>,
    },
    Delete {
        index: usize,
        removed: Vec<RemovedItem>,
    },
}

/// An inserted array slot.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertedItem {
    Value(Value),
    /// A node that is still alive at commit time; read it from the document.
    Node(NodeId),
}

/// A removed array slot, captured before removal.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedItem {
    /// Former id when the slot held a node.
    pub node: Option<NodeId>,
    /// Materialized content at the time of removal.
    pub value: Value,
}
