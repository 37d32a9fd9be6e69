use crate::entity::ComponentJson;
use crate::property::PropertyValue;
use crate::schema::ComponentSchema;
use crate::world::{WorldError, WorldResult};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A live component: a schema plus exactly one value per declared property.
#[derive(Debug, Clone)]
pub struct Component {
    schema: Arc<ComponentSchema>,
    values: BTreeMap<String, PropertyValue>,
    /// Bumped by [`Component::modified`] so dependent systems can react.
    version: u64,
}

impl Component {
    /// Creates a component with every property at its initial value.
    #[must_use]
    pub fn new(schema: Arc<ComponentSchema>) -> Self {
        let values = schema
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.initial_value()))
            .collect();
        Self {
            schema,
            values,
            version: 0,
        }
    }

    /// Builds a component from its document form.
    ///
    /// Keys missing from `data` keep their initial value; keys the schema does
    /// not declare are rejected.
    pub fn from_json(schema: Arc<ComponentSchema>, data: &ComponentJson) -> WorldResult<Self> {
        if data.name != schema.name {
            return Err(WorldError::UnknownComponent(data.name.clone()));
        }
        let mut component = Self::new(schema);
        for (key, raw) in &data.values {
            let prop = component.schema.property(key).ok_or_else(|| WorldError::UnknownProperty {
                component: component.schema.name.clone(),
                property: key.clone(),
            })?;
            if !prop.ty.is_serialized() {
                continue;
            }
            let value = prop.ty.decode(raw).map_err(|source| WorldError::Decode {
                component: component.schema.name.clone(),
                property: key.clone(),
                source,
            })?;
            component.values.insert(key.clone(), value);
        }
        Ok(component)
    }

    /// Serializes the component for the document, skipping references.
    #[must_use]
    pub fn to_json(&self) -> ComponentJson {
        let values = self
            .schema
            .properties
            .iter()
            .filter_map(|p| {
                let value = self.values.get(&p.name)?;
                p.ty.encode(value).map(|v| (p.name.clone(), v))
            })
            .collect();
        ComponentJson {
            name: self.schema.name.clone(),
            values,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<ComponentSchema> {
        &self.schema
    }

    #[must_use]
    pub fn get(&self, property: &str) -> Option<&PropertyValue> {
        self.values.get(property)
    }

    /// Assigns one property. The value must match the declared type.
    pub fn set(&mut self, property: &str, value: PropertyValue) -> WorldResult<()> {
        let prop = self.schema.property(property).ok_or_else(|| WorldError::UnknownProperty {
            component: self.schema.name.clone(),
            property: property.to_string(),
        })?;
        if prop.ty != value.property_type() {
            return Err(WorldError::TypeMismatch {
                component: self.schema.name.clone(),
                property: property.to_string(),
                expected: prop.ty,
                found: value.property_type(),
            });
        }
        self.values.insert(property.to_string(), value);
        Ok(())
    }

    /// Marks the component as mutated.
    pub fn modified(&mut self) {
        self.version += 1;
    }

    /// Number of times the component was marked modified.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Iterates property values in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.schema
            .properties
            .iter()
            .filter_map(|p| self.values.get(&p.name).map(|v| (p.name.as_str(), v)))
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.values == other.values
    }
}
