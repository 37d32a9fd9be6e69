//! Local world model for relm world-sync.
//!
//! Defines the types the sync engine reads from and writes to:
//! - [`PropertyType`] / [`PropertyValue`]: typed component properties with JSON codecs
//! - [`ComponentSchema`] / [`ComponentRegistry`]: read-only name → property-schema lookup
//! - [`Component`]: a live component holding exactly its schema's properties
//! - [`EntityJson`] / [`ComponentJson`] / [`WorldJson`]: the serialization boundary
//! - [`World`]: the local scene-graph collaborator, with [`MemoryWorld`] as an
//!   in-memory implementation

mod component;
mod entity;
mod memory;
mod property;
mod schema;
mod world;

pub use component::Component;
pub use entity::{ComponentJson, EntityJson, WorldJson};
pub use memory::{EntityRecord, MemoryWorld};
pub use property::{DecodeError, PropertyType, PropertyValue, Quat, Vec3};
pub use schema::{ComponentKind, ComponentRegistry, ComponentSchema, PropertySchema, core_schemas};
pub use world::{World, WorldError, WorldResult};
