//! Identity correlation between local entities and document nodes.

use relm_types::{EntityId, NodeId};
use std::collections::HashMap;

/// Bidirectional map between entity ids and the ids of their document nodes.
///
/// The two directions are always mutual inverses: binding a pair first
/// unbinds whatever either side was bound to.
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    node_to_entity: HashMap<NodeId, EntityId>,
    entity_to_node: HashMap<EntityId, NodeId>,
}

impl Correlation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `entity` to `node`. Returns false if exactly this pair was
    /// already bound.
    pub fn insert(&mut self, entity: EntityId, node: NodeId) -> bool {
        if self.entity_to_node.get(&entity) == Some(&node) {
            return false;
        }
        self.remove_entity(&entity);
        self.remove_node(node);
        self.node_to_entity.insert(node, entity.clone());
        self.entity_to_node.insert(entity, node);
        true
    }

    /// Unbinds an entity, returning its node.
    pub fn remove_entity(&mut self, entity: &EntityId) -> Option<NodeId> {
        let node = self.entity_to_node.remove(entity)?;
        self.node_to_entity.remove(&node);
        Some(node)
    }

    /// Unbinds a node, returning its entity.
    pub fn remove_node(&mut self, node: NodeId) -> Option<EntityId> {
        let entity = self.node_to_entity.remove(&node)?;
        self.entity_to_node.remove(&entity);
        Some(entity)
    }

    #[must_use]
    pub fn node(&self, entity: &EntityId) -> Option<NodeId> {
        self.entity_to_node.get(entity).copied()
    }

    #[must_use]
    pub fn entity(&self, node: NodeId) -> Option<&EntityId> {
        self.node_to_entity.get(&node)
    }

    #[must_use]
    pub fn is_synced(&self, entity: &EntityId) -> bool {
        self.entity_to_node.contains_key(entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_to_node.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_to_node.is_empty()
    }

    /// All bound pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, NodeId)> {
        self.entity_to_node.iter().map(|(e, n)| (e, *n))
    }

    pub fn clear(&mut self) {
        self.node_to_entity.clear();
        self.entity_to_node.clear();
    }
}
