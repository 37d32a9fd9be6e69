use crate::property::{PropertyType, PropertyValue, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether a component is shared through the document or stays on this replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Serialized into the shared document (default).
    #[default]
    Shared,
    /// Authored locally, never synced (e.g. bone attachments of the local avatar).
    Local,
    /// Runtime state derived by local systems, never synced.
    State,
}

impl ComponentKind {
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        matches!(self, ComponentKind::Shared)
    }
}

/// One declared property of a component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PropertyType,
    /// Falls back to [`PropertyType::default_value`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PropertyValue>,
}

impl PropertySchema {
    /// The value a freshly constructed component starts with.
    #[must_use]
    pub fn initial_value(&self) -> PropertyValue {
        self.default.clone().unwrap_or_else(|| self.ty.default_value())
    }
}

/// The ordered property schema of one component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub name: String,
    #[serde(default)]
    pub kind: ComponentKind,
    pub properties: Vec<PropertySchema>,
}

impl ComponentSchema {
    /// Starts a shared component schema with no properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Shared,
            properties: Vec::new(),
        }
    }

    /// Sets the component kind.
    #[must_use]
    pub fn kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declares a property with the type's default value.
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    /// Declares a property with an explicit default.
    #[must_use]
    pub fn prop_with_default(
        mut self,
        name: impl Into<String>,
        ty: PropertyType,
        default: PropertyValue,
    ) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            ty,
            default: Some(default),
        });
        self
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Read-only lookup table from component type name to schema.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    schemas: BTreeMap<String, Arc<ComponentSchema>>,
}

impl ComponentRegistry {
    /// Builds a registry from a list of schemas. A later schema with the same
    /// name replaces an earlier one.
    pub fn new(schemas: impl IntoIterator<Item = ComponentSchema>) -> Self {
        Self {
            schemas: schemas
                .into_iter()
                .map(|s| (s.name.clone(), Arc::new(s)))
                .collect(),
        }
    }

    /// Registry holding the built-in component types.
    #[must_use]
    pub fn core() -> Self {
        Self::new(core_schemas())
    }

    /// Returns a copy of this registry extended with more schemas.
    #[must_use]
    pub fn with(mut self, schemas: impl IntoIterator<Item = ComponentSchema>) -> Self {
        for schema in schemas {
            self.schemas.insert(schema.name.clone(), Arc::new(schema));
        }
        self
    }

    /// Looks up a schema by component name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ComponentSchema>> {
        self.schemas.get(name)
    }

    /// Returns true if a schema is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Registered component names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Built-in component types every world understands.
#[must_use]
pub fn core_schemas() -> Vec<ComponentSchema> {
    vec![
        ComponentSchema::new("Transform")
            .prop("position", PropertyType::Vector3)
            .prop_with_default(
                "rotation",
                PropertyType::Quaternion,
                PropertyValue::Quaternion(Quat::IDENTITY),
            )
            .prop_with_default("scale", PropertyType::Vector3, PropertyValue::Vector3(Vec3::ONE)),
        ComponentSchema::new("Shape")
            .prop_with_default("kind", PropertyType::String, PropertyValue::String("BOX".into()))
            .prop_with_default("boxSize", PropertyType::Vector3, PropertyValue::Vector3(Vec3::ONE))
            .prop_with_default("sphereRadius", PropertyType::Number, PropertyValue::Number(0.5))
            .prop_with_default("color", PropertyType::Color, PropertyValue::Color("#ffffff".into())),
        ComponentSchema::new("Html2d")
            .prop_with_default("kind", PropertyType::String, PropertyValue::String("INFO".into()))
            .prop("offset", PropertyType::Vector3)
            .prop_with_default("width", PropertyType::Number, PropertyValue::Number(3.0))
            .prop("title", PropertyType::String)
            .prop("content", PropertyType::String)
            .prop_with_default("visible", PropertyType::Boolean, PropertyValue::Boolean(true)),
        ComponentSchema::new("Html2dRef")
            .kind(ComponentKind::State)
            .prop("container", PropertyType::Ref)
            .prop("component", PropertyType::Ref),
        ComponentSchema::new("ThrustController").prop_with_default(
            "thrust",
            PropertyType::Number,
            PropertyValue::Number(30.0),
        ),
    ]
}
