use relm_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The serialized form of one entity.
///
/// This exact shape is what the document mirrors and what the diff engine
/// compares: `{ id, name, parent, children: [id...], components: [{ name, values }...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityJson {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<EntityId>,
    #[serde(default)]
    pub children: Vec<EntityId>,
    #[serde(default)]
    pub components: Vec<ComponentJson>,
}

impl EntityJson {
    /// An entity with no hierarchy and no components.
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Converts to a plain JSON tree.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Parses a plain JSON tree.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Looks up a serialized component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ComponentJson> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// The serialized form of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentJson {
    pub name: String,
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl ComponentJson {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Map::new(),
        }
    }

    /// Adds a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

/// An exported world: every entity plus the world-level maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldJson {
    #[serde(default)]
    pub entities: Vec<EntityJson>,
    /// Named spawn points (`name -> [x, y, z]`).
    #[serde(default)]
    pub entryways: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}
