//! In-memory implementation of [`World`].
//!
//! Used by tests and by hosts that keep their scene graph elsewhere and only
//! need a mirror of the shared state.

use crate::component::Component;
use crate::entity::EntityJson;
use crate::property::PropertyValue;
use crate::schema::ComponentRegistry;
use crate::world::{World, WorldError, WorldResult};
use relm_types::EntityId;
use std::collections::BTreeMap;

/// One live entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub components: Vec<Component>,
    pub active: bool,
}

impl EntityRecord {
    fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
            active: false,
        }
    }
}

/// A flat entity table with a forest hierarchy.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    registry: ComponentRegistry,
    entities: BTreeMap<EntityId, EntityRecord>,
}

impl MemoryWorld {
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            entities: BTreeMap::new(),
        }
    }

    /// Creates an active, empty entity with a fresh id.
    pub fn spawn(&mut self, name: impl Into<String>) -> EntityId {
        let id = EntityId::new();
        let mut record = EntityRecord::new(id.clone(), name);
        record.active = true;
        self.entities.insert(id.clone(), record);
        id
    }

    /// Creates an active, empty entity with a caller-chosen id.
    pub fn spawn_with_id(&mut self, id: EntityId, name: impl Into<String>) -> WorldResult<()> {
        if self.entities.contains_key(&id) {
            return Err(WorldError::EntityExists(id));
        }
        let mut record = EntityRecord::new(id.clone(), name);
        record.active = true;
        self.entities.insert(id, record);
        Ok(())
    }

    /// Adds a component built from the registry with its initial values.
    pub fn insert_component(&mut self, id: &EntityId, name: &str) -> WorldResult<()> {
        let schema = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| WorldError::UnknownComponent(name.to_string()))?;
        self.add_component(id, Component::new(schema))
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn record_mut(&mut self, id: &EntityId) -> WorldResult<&mut EntityRecord> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))
    }

    fn build_components(&self, data: &EntityJson) -> WorldResult<Vec<Component>> {
        data.components
            .iter()
            .map(|c| {
                let schema = self
                    .registry
                    .get(&c.name)
                    .cloned()
                    .ok_or_else(|| WorldError::UnknownComponent(c.name.clone()))?;
                Component::from_json(schema, c)
            })
            .collect()
    }

    fn is_ancestor(&self, ancestor: &EntityId, of: &EntityId) -> bool {
        let mut cursor = Some(of.clone());
        while let Some(current) = cursor {
            if &current == ancestor {
                return true;
            }
            cursor = self.entities.get(&current).and_then(|r| r.parent.clone());
        }
        false
    }

    fn detach(&mut self, id: &EntityId) {
        let parent = self.entities.get_mut(id).and_then(|r| r.parent.take());
        if let Some(parent) = parent
            && let Some(p) = self.entities.get_mut(&parent)
        {
            p.children.retain(|c| c != id);
        }
    }
}

impl World for MemoryWorld {
    fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().cloned().collect()
    }

    fn to_json(&self, id: &EntityId) -> Option<EntityJson> {
        let record = self.entities.get(id)?;
        Some(EntityJson {
            id: record.id.clone(),
            name: record.name.clone(),
            parent: record.parent.clone(),
            children: record.children.clone(),
            components: record
                .components
                .iter()
                .filter(|c| c.schema().kind.is_shared())
                .map(Component::to_json)
                .collect(),
        })
    }

    fn create_from_json(&mut self, data: &EntityJson) -> WorldResult<()> {
        if self.entities.contains_key(&data.id) {
            return Err(WorldError::EntityExists(data.id.clone()));
        }
        let components = self.build_components(data)?;
        let mut record = EntityRecord::new(data.id.clone(), data.name.clone());
        record.components = components;
        record.active = true;
        self.entities.insert(data.id.clone(), record);
        Ok(())
    }

    fn apply_json(&mut self, data: &EntityJson) -> WorldResult<()> {
        let components = self.build_components(data)?;
        let record = self.record_mut(&data.id)?;
        record.name = data.name.clone();
        // Local-only components survive a reapply.
        record.components.retain(|c| !c.schema().kind.is_shared());
        record.components.extend(components);
        Ok(())
    }

    fn destroy(&mut self, id: &EntityId) -> bool {
        if !self.entities.contains_key(id) {
            return false;
        }
        self.detach(id);
        if let Some(record) = self.entities.remove(id) {
            for child in record.children {
                if let Some(c) = self.entities.get_mut(&child) {
                    c.parent = None;
                }
            }
        }
        true
    }

    fn set_name(&mut self, id: &EntityId, name: &str) -> WorldResult<()> {
        self.record_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn parent(&self, id: &EntityId) -> Option<EntityId> {
        self.entities.get(id).and_then(|r| r.parent.clone())
    }

    fn children(&self, id: &EntityId) -> Vec<EntityId> {
        self.entities
            .get(id)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    fn set_parent(&mut self, id: &EntityId, parent: Option<&EntityId>) -> WorldResult<()> {
        if !self.entities.contains_key(id) {
            return Err(WorldError::EntityNotFound(id.clone()));
        }
        let Some(parent) = parent else {
            self.detach(id);
            return Ok(());
        };
        if !self.entities.contains_key(parent) {
            return Err(WorldError::EntityNotFound(parent.clone()));
        }
        if self.parent(id).as_ref() == Some(parent) {
            return Ok(());
        }
        if self.is_ancestor(id, parent) {
            return Err(WorldError::HierarchyCycle {
                child: id.clone(),
                parent: parent.clone(),
            });
        }
        self.detach(id);
        self.record_mut(id)?.parent = Some(parent.clone());
        let p = self.record_mut(parent)?;
        if !p.children.contains(id) {
            p.children.push(id.clone());
        }
        Ok(())
    }

    fn reorder_children(&mut self, id: &EntityId, order: &[EntityId]) -> WorldResult<()> {
        let record = self.record_mut(id)?;
        let mut sorted: Vec<EntityId> = Vec::with_capacity(record.children.len());
        for child in order {
            if record.children.contains(child) && !sorted.contains(child) {
                sorted.push(child.clone());
            }
        }
        for child in &record.children {
            if !sorted.contains(child) {
                sorted.push(child.clone());
            }
        }
        record.children = sorted;
        Ok(())
    }

    fn add_component(&mut self, id: &EntityId, component: Component) -> WorldResult<()> {
        let record = self.record_mut(id)?;
        if record.components.iter().any(|c| c.name() == component.name()) {
            return Err(WorldError::ComponentExists {
                entity: id.clone(),
                component: component.name().to_string(),
            });
        }
        record.components.push(component);
        Ok(())
    }

    fn remove_component(&mut self, id: &EntityId, name: &str) -> WorldResult<bool> {
        let record = self.record_mut(id)?;
        let before = record.components.len();
        record.components.retain(|c| c.name() != name);
        Ok(record.components.len() != before)
    }

    fn component(&self, id: &EntityId, name: &str) -> Option<&Component> {
        self.entities
            .get(id)?
            .components
            .iter()
            .find(|c| c.name() == name)
    }

    fn set_property(
        &mut self,
        id: &EntityId,
        component: &str,
        property: &str,
        value: PropertyValue,
    ) -> WorldResult<()> {
        let record = self.record_mut(id)?;
        let target = record
            .components
            .iter_mut()
            .find(|c| c.name() == component)
            .ok_or_else(|| WorldError::ComponentNotFound {
                entity: id.clone(),
                component: component.to_string(),
            })?;
        target.set(property, value)?;
        target.modified();
        Ok(())
    }
}
