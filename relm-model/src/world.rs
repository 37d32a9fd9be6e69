use crate::component::Component;
use crate::entity::EntityJson;
use crate::property::{DecodeError, PropertyType, PropertyValue};
use crate::schema::ComponentRegistry;
use relm_types::EntityId;

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;

/// Errors raised by the local world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("entity already exists: {0}")]
    EntityExists(EntityId),

    #[error("unknown component type: {0}")]
    UnknownComponent(String),

    #[error("entity {entity} has no component {component}")]
    ComponentNotFound { entity: EntityId, component: String },

    #[error("entity {entity} already has component {component}")]
    ComponentExists { entity: EntityId, component: String },

    #[error("component {component} has no property {property}")]
    UnknownProperty { component: String, property: String },

    #[error("{component}.{property}: expected {expected:?}, got {found:?}")]
    TypeMismatch {
        component: String,
        property: String,
        expected: PropertyType,
        found: PropertyType,
    },

    #[error("{component}.{property}: {source}")]
    Decode {
        component: String,
        property: String,
        #[source]
        source: DecodeError,
    },

    #[error("making {parent} the parent of {child} would create a cycle")]
    HierarchyCycle { child: EntityId, parent: EntityId },
}

/// The local scene graph the sync engine keeps in agreement with the document.
///
/// The engine only calls into the world; it never owns its scheduling. The
/// hierarchy is a forest: at most one parent per entity, children ordered and
/// free of duplicates.
pub trait World {
    /// The component-type registry used to rebuild components by name.
    fn registry(&self) -> &ComponentRegistry;

    /// Returns true if the entity exists.
    fn contains(&self, id: &EntityId) -> bool;

    /// All live entity ids.
    fn entity_ids(&self) -> Vec<EntityId>;

    /// Serializes an entity, skipping non-shared components and references.
    fn to_json(&self, id: &EntityId) -> Option<EntityJson>;

    /// Creates and activates an entity from its serialized form.
    ///
    /// `parent` and `children` in `data` are ignored: attachment is resolved
    /// by the caller once both ends exist.
    fn create_from_json(&mut self, data: &EntityJson) -> WorldResult<()>;

    /// Overwrites the name and component set of an existing entity.
    /// Hierarchy fields are ignored as in [`World::create_from_json`].
    fn apply_json(&mut self, data: &EntityJson) -> WorldResult<()>;

    /// Destroys one entity. Its children are detached, not destroyed.
    /// Returns false if it did not exist.
    fn destroy(&mut self, id: &EntityId) -> bool;

    fn set_name(&mut self, id: &EntityId, name: &str) -> WorldResult<()>;

    fn parent(&self, id: &EntityId) -> Option<EntityId>;

    fn children(&self, id: &EntityId) -> Vec<EntityId>;

    /// Attaches `id` under `parent`, or detaches it with `None`. Idempotent.
    fn set_parent(&mut self, id: &EntityId, parent: Option<&EntityId>) -> WorldResult<()>;

    /// Sorts the children of `id` by their position in `order`. Children
    /// missing from `order` keep their relative order after the listed ones;
    /// listed ids that are not children are ignored.
    fn reorder_children(&mut self, id: &EntityId, order: &[EntityId]) -> WorldResult<()>;

    fn add_component(&mut self, id: &EntityId, component: Component) -> WorldResult<()>;

    /// Removes a component by name. Returns false if it was not present.
    fn remove_component(&mut self, id: &EntityId, name: &str) -> WorldResult<bool>;

    fn component(&self, id: &EntityId, name: &str) -> Option<&Component>;

    /// Assigns one property and marks the component as modified.
    fn set_property(
        &mut self,
        id: &EntityId,
        component: &str,
        property: &str,
        value: PropertyValue,
    ) -> WorldResult<()>;
}
