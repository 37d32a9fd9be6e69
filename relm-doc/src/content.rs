//! Values stored in, inserted into, and shipped between documents.

use relm_types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A slot inside a map or array node: a JSON leaf or a nested node.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Any(Value),
    Node(NodeId),
}

impl Item {
    /// The nested node id, if this slot holds one.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Item::Node(id) => Some(*id),
            Item::Any(_) => None,
        }
    }

    /// The JSON leaf, if this slot holds one.
    #[must_use]
    pub fn as_any(&self) -> Option<&Value> {
        match self {
            Item::Any(v) => Some(v),
            Item::Node(_) => None,
        }
    }
}

/// Content to be inserted by a local transaction. Nested maps and arrays
/// become new document nodes.
///
/// Snapshots of removed content remember the ids they were stored under
/// (`former`, and `former_slots` parallel to `items`). Re-inserted content
/// always gets fresh ids; the former ones redirect to them so older journal
/// entries still resolve.
#[derive(Debug, Clone, PartialEq)]
pub enum Prelim {
    Any(Value),
    Map {
        entries: BTreeMap<String, Prelim>,
        former: Option<NodeId>,
    },
    Array {
        items: Vec<Prelim>,
        former: Option<NodeId>,
        former_slots: Vec<NodeId>,
    },
}

impl Prelim {
    /// A JSON leaf.
    pub fn any(value: impl Into<Value>) -> Self {
        Prelim::Any(value.into())
    }

    /// A new map node.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Prelim)>) -> Self {
        Prelim::Map {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            former: None,
        }
    }

    /// A new array node.
    pub fn array(items: impl IntoIterator<Item = Prelim>) -> Self {
        Prelim::Array {
            items: items.into_iter().collect(),
            former: None,
            former_slots: Vec::new(),
        }
    }
}

impl From<Value> for Prelim {
    fn from(value: Value) -> Self {
        Prelim::Any(value)
    }
}

/// Id-carrying content as recorded in an [`Update`](crate::Update), so every
/// replica creates the same node and slot ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Content {
    Any {
        value: Value,
    },
    Map {
        id: NodeId,
        entries: BTreeMap<String, Content>,
    },
    Array {
        id: NodeId,
        items: Vec<SlotContent>,
    },
}

/// One array slot of an insertion: its id and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotContent {
    pub id: NodeId,
    pub content: Content,
}

impl Content {
    /// Id of the node this content creates, if any.
    #[must_use]
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Content::Any { .. } => None,
            Content::Map { id, .. } | Content::Array { id, .. } => Some(*id),
        }
    }

    /// Every node id and slot id this content mints, outermost first.
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut Vec<NodeId>) {
        match self {
            Content::Any { .. } => {}
            Content::Map { id, entries } => {
                ids.push(*id);
                for child in entries.values() {
                    child.collect_ids(ids);
                }
            }
            Content::Array { id, items } => {
                ids.push(*id);
                for slot in items {
                    ids.push(slot.id);
                    slot.content.collect_ids(ids);
                }
            }
        }
    }
}
