//! Inbound observation: document event batches → local world mutations.
//!
//! Batches from this replica's own outbound path ([`Origin::Local`]) are
//! ignored outright, since the world already holds those changes. Everything
//! else, undo and redo replays included, is reconstructed into world
//! mutations. Each event is dispatched on its path shape:
//!
//! | path                          | meaning                          |
//! |-------------------------------|----------------------------------|
//! | `[]`                          | entities added / removed         |
//! | `[i]`                         | entity attributes changed        |
//! | `[i, children]`               | children attached / detached     |
//! | `[i, components]`             | components added / removed       |
//! | `[i, components, j, values]`  | component properties changed     |
//!
//! Failures are handled per item: a race with a peer is a warning, a layout
//! violation an error, and neither stops the rest of the batch.
//!
//! Concurrent reparenting can leave a child listed under two parents. Once a
//! batch is dispatched, every entity whose attachment it touched is settled
//! on the merged `parent` attribute of its node, and the siblings it joined
//! or left are put in document order, so replicas agree on the hierarchy.

use crate::correlation::Correlation;
use crate::diff::{CHILDREN, COMPONENTS, PARENT, VALUES};
use crate::engine::SyncConfig;
use crate::error::{SyncError, SyncResult};
use relm_doc::{
    ArrayDelta, Doc, DocEvent, EntryChange, EventChange, InsertedItem, Item, RemovedItem,
    TransactionBatch,
};
use relm_model::{Component, ComponentJson, ComponentSchema, EntityJson, World, WorldError};
use relm_types::{EntityId, NodeId, Origin, Path, PathSegment};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A semantic change applied to the local world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A new local entity was created from its document node.
    EntityAdded { entity: EntityId },
    /// An existing local entity was overwritten from its document node.
    EntityApplied { entity: EntityId },
    EntityRemoved { entity: EntityId },
    NameChanged { entity: EntityId, name: String },
    ParentChanged {
        entity: EntityId,
        parent: Option<EntityId>,
    },
    ComponentAdded { entity: EntityId, component: String },
    ComponentRemoved { entity: EntityId, component: String },
    /// A property was assigned and its component marked modified.
    PropertyChanged {
        entity: EntityId,
        component: String,
        property: String,
    },
    /// An attachment is waiting for one of its ends to arrive.
    AttachmentDeferred { child: EntityId, parent: EntityId },
}

/// Outcome of observing one batch.
#[derive(Debug)]
pub struct BatchReport {
    pub origin: Origin,
    /// True if the batch was dropped by the origin filter.
    pub ignored: bool,
    pub events: Vec<SyncEvent>,
    /// Recoverable conditions, each of which skipped one item.
    pub warnings: Vec<SyncError>,
    /// Layout violations and decode failures, each of which dropped one item.
    pub errors: Vec<SyncError>,
}

impl BatchReport {
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            ignored: false,
            events: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// True if nothing was skipped or dropped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }
}

/// Attachments (child → parent) waiting for an entity that has not been
/// observed yet.
#[derive(Debug, Clone, Default)]
pub struct PendingAttachments {
    by_child: BTreeMap<EntityId, EntityId>,
}

impl PendingAttachments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attachment. Returns false if exactly this one was pending.
    pub fn insert(&mut self, child: EntityId, parent: EntityId) -> bool {
        self.by_child.insert(child, parent.clone()).as_ref() != Some(&parent)
    }

    pub fn remove(&mut self, child: &EntityId) -> Option<EntityId> {
        self.by_child.remove(child)
    }

    #[must_use]
    pub fn parent_of(&self, child: &EntityId) -> Option<&EntityId> {
        self.by_child.get(child)
    }

    /// Drops every attachment with `id` on either end.
    pub fn forget(&mut self, id: &EntityId) {
        self.by_child.retain(|child, parent| child != id && parent != id);
    }

    /// Attachments with `id` on either end.
    #[must_use]
    pub fn involving(&self, id: &EntityId) -> Vec<(EntityId, EntityId)> {
        self.by_child
            .iter()
            .filter(|(child, parent)| *child == id || *parent == id)
            .map(|(c, p)| (c.clone(), p.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &EntityId)> {
        self.by_child.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_child.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_child.is_empty()
    }
}

/// Where an event sits in the entity tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventShape {
    Entities,
    Attributes { entity: NodeId },
    Children { entity: NodeId },
    Components { entity: NodeId },
    Properties { entity: NodeId, component: NodeId },
}

fn shape(event: &DocEvent) -> SyncResult<EventShape> {
    use PathSegment::{Index, Key};
    let unrecognized = || SyncError::UnrecognizedPath(event.path.clone());
    let entity = || event.ancestors.get(1).copied().ok_or_else(unrecognized);
    match event.path.segments() {
        [] => Ok(EventShape::Entities),
        [Index(_)] => Ok(EventShape::Attributes { entity: entity()? }),
        [Index(_), Key(k)] if k == CHILDREN => Ok(EventShape::Children { entity: entity()? }),
        [Index(_), Key(k)] if k == COMPONENTS => Ok(EventShape::Components { entity: entity()? }),
        [Index(_), Key(list), Index(_), Key(values)] if list == COMPONENTS && values == VALUES => {
            Ok(EventShape::Properties {
                entity: entity()?,
                component: event.ancestors.get(3).copied().ok_or_else(unrecognized)?,
            })
        }
        _ => Err(unrecognized()),
    }
}

/// One pass of the inbound path over the engine's state.
pub(crate) struct Inbound<'a, W: World> {
    world: &'a mut W,
    doc: &'a Doc,
    correlation: &'a mut Correlation,
    pending: &'a mut PendingAttachments,
    config: &'a SyncConfig,
    /// Children whose attachment changed during this pass.
    touched: BTreeSet<EntityId>,
    report: BatchReport,
}

impl<'a, W: World> Inbound<'a, W> {
    pub(crate) fn new(
        world: &'a mut W,
        doc: &'a Doc,
        correlation: &'a mut Correlation,
        pending: &'a mut PendingAttachments,
        config: &'a SyncConfig,
        origin: Origin,
    ) -> Self {
        Self {
            world,
            doc,
            correlation,
            pending,
            config,
            touched: BTreeSet::new(),
            report: BatchReport::new(origin),
        }
    }

    /// Applies one batch to the world.
    pub(crate) fn observe(mut self, batch: &TransactionBatch) -> BatchReport {
        if batch.is_local() {
            debug!(events = batch.events.len(), "ignoring local batch");
            self.report.ignored = true;
            return self.report;
        }
        for event in &batch.events {
            if event.root != self.config.entities_root {
                debug!(root = %event.root, "ignoring event outside the entity tree");
                continue;
            }
            let result = shape(event).and_then(|shape| self.dispatch(shape, event));
            self.record(result);
        }
        self.settle();
        self.report
    }

    /// Creates or overwrites the entities behind `nodes`, then links them.
    pub(crate) fn reapply(mut self, nodes: &[NodeId]) -> BatchReport {
        let mut added = Vec::new();
        for node in nodes {
            match self.add_entity(*node) {
                Ok(data) => added.push(data),
                Err(e) => self.record(Err(e)),
            }
        }
        self.link(&added);
        self.settle();
        self.report
    }

    fn record(&mut self, result: SyncResult<()>) {
        let Err(e) = result else {
            return;
        };
        if e.is_fatal() {
            error!(origin = %self.report.origin, error = %e, "inbound event dropped");
            self.report.errors.push(e);
        } else {
            warn!(origin = %self.report.origin, error = %e, "inbound item skipped");
            self.report.warnings.push(e);
        }
    }

    fn emit(&mut self, event: SyncEvent) {
        self.report.events.push(event);
    }

    fn dispatch(&mut self, shape: EventShape, event: &DocEvent) -> SyncResult<()> {
        match (shape, &event.change) {
            (EventShape::Entities, EventChange::Array(deltas)) => {
                self.entities_changed(deltas);
                Ok(())
            }
            (EventShape::Attributes { entity }, EventChange::Map(keys)) => {
                self.attributes_changed(entity, keys, &event.path)
            }
            (EventShape::Children { entity }, EventChange::Array(deltas)) => {
                self.children_changed(entity, deltas, &event.path)
            }
            (EventShape::Components { entity }, EventChange::Array(deltas)) => {
                self.components_changed(entity, deltas, &event.path)
            }
            (EventShape::Properties { entity, component }, EventChange::Map(keys)) => {
                self.properties_changed(entity, component, keys, &event.path)
            }
            _ => Err(SyncError::UnrecognizedPath(event.path.clone())),
        }
    }

    // ── Entities ────────────────────────────────────────────────

    fn entities_changed(&mut self, deltas: &[ArrayDelta]) {
        let mut added = Vec::new();
        for delta in deltas {
            match delta {
                ArrayDelta::Insert { index, items } => {
                    for item in items {
                        let result = match item {
                            InsertedItem::Node(node) => self.add_entity(*node),
                            InsertedItem::Value(_) => {
                                Err(SyncError::UnrecognizedPath(Path::root().child(*index)))
                            }
                        };
                        match result {
                            Ok(data) => added.push(data),
                            Err(e) => self.record(Err(e)),
                        }
                    }
                }
                ArrayDelta::Delete { removed, .. } => {
                    for item in removed {
                        let result = self.remove_entity(item);
                        self.record(result);
                    }
                }
            }
        }
        self.link(&added);
    }

    fn add_entity(&mut self, node: NodeId) -> SyncResult<EntityJson> {
        let data = EntityJson::from_value(self.doc.materialize(node)?)?;
        if self.world.contains(&data.id) {
            self.world.apply_json(&data)?;
            self.emit(SyncEvent::EntityApplied {
                entity: data.id.clone(),
            });
        } else {
            self.world.create_from_json(&data)?;
            info!(entity = %data.id, %node, "entity added from document");
            self.emit(SyncEvent::EntityAdded {
                entity: data.id.clone(),
            });
        }
        self.correlation.insert(data.id.clone(), node);
        Ok(data)
    }

    /// Attaches freshly added entities to each other and to the rest of the
    /// world, then settles attachments that were waiting for them.
    fn link(&mut self, added: &[EntityJson]) {
        let ids: HashSet<&EntityId> = added.iter().map(|d| &d.id).collect();
        for data in added {
            for child in &data.children {
                let result = self.attach(child, &data.id);
                self.record(result);
            }
            if let Some(parent) = &data.parent
                && !ids.contains(parent)
            {
                let result = self.attach(&data.id, parent);
                self.record(result);
            }
        }
        for data in added {
            self.resolve_pending(&data.id);
        }
    }

    fn remove_entity(&mut self, removed: &RemovedItem) -> SyncResult<()> {
        let id = removed
            .node
            .and_then(|node| self.correlation.remove_node(node))
            .or_else(|| {
                removed
                    .value
                    .get("id")
                    .and_then(Value::as_str)
                    .map(EntityId::from)
            })
            .ok_or_else(|| SyncError::UnrecognizedPath(Path::root()))?;
        self.correlation.remove_entity(&id);
        self.pending.forget(&id);
        if !self.world.destroy(&id) {
            return Err(SyncError::UnknownEntity(id));
        }
        info!(entity = %id, "entity removed from document");
        self.emit(SyncEvent::EntityRemoved { entity: id });
        Ok(())
    }

    fn entity_of(&self, node: NodeId) -> SyncResult<EntityId> {
        if let Some(id) = self.correlation.entity(node) {
            return Ok(id.clone());
        }
        let id = self
            .doc
            .map_get(node, "id")
            .ok()
            .flatten()
            .and_then(Item::as_any)
            .and_then(Value::as_str)
            .map_or_else(|| EntityId::from(node.to_string()), EntityId::from);
        Err(SyncError::UnknownEntity(id))
    }

    // ── Attributes ──────────────────────────────────────────────

    fn attributes_changed(
        &mut self,
        node: NodeId,
        keys: &BTreeMap<String, EntryChange>,
        path: &Path,
    ) -> SyncResult<()> {
        let id = self.entity_of(node)?;
        for (key, change) in keys {
            let result = self.attribute_changed(&id, node, key, change, path);
            self.record(result);
        }
        Ok(())
    }

    fn attribute_changed(
        &mut self,
        id: &EntityId,
        node: NodeId,
        key: &str,
        change: &EntryChange,
        path: &Path,
    ) -> SyncResult<()> {
        match key {
            "name" => {
                let name = change
                    .new_value()
                    .and_then(Value::as_str)
                    .ok_or_else(|| SyncError::UnrecognizedPath(path.child(key)))?
                    .to_string();
                self.world.set_name(id, &name)?;
                self.emit(SyncEvent::NameChanged {
                    entity: id.clone(),
                    name,
                });
                Ok(())
            }
            PARENT => match change.new_value() {
                Some(Value::String(parent)) => self.attach(id, &EntityId::from(parent.as_str())),
                _ => {
                    self.pending.remove(id);
                    self.detach(id, None)
                }
            },
            "id" => {
                debug!(entity = %id, "ignoring identity rewrite");
                Ok(())
            }
            CHILDREN | COMPONENTS => {
                let data = self.add_entity(node)?;
                self.link(std::slice::from_ref(&data));
                Ok(())
            }
            other => Err(SyncError::UnknownAttribute(other.to_string())),
        }
    }

    // ── Hierarchy ───────────────────────────────────────────────

    fn attach(&mut self, child: &EntityId, parent: &EntityId) -> SyncResult<()> {
        self.touched.insert(child.clone());
        if !self.world.contains(parent) || !self.world.contains(child) {
            return self.defer(child, parent);
        }
        self.pending.remove(child);
        if self.world.parent(child).as_ref() == Some(parent) {
            return Ok(());
        }
        self.world.set_parent(child, Some(parent))?;
        debug!(%child, %parent, "attached");
        self.emit(SyncEvent::ParentChanged {
            entity: child.clone(),
            parent: Some(parent.clone()),
        });
        Ok(())
    }

    /// Detaches `child`, from `parent` only if given.
    fn detach(&mut self, child: &EntityId, parent: Option<&EntityId>) -> SyncResult<()> {
        self.touched.insert(child.clone());
        if parent.is_some() && self.pending.parent_of(child) == parent {
            self.pending.remove(child);
        }
        if !self.world.contains(child) {
            return Ok(());
        }
        let current = self.world.parent(child);
        if current.is_none() || (parent.is_some() && current.as_ref() != parent) {
            return Ok(());
        }
        self.world.set_parent(child, None)?;
        self.emit(SyncEvent::ParentChanged {
            entity: child.clone(),
            parent: None,
        });
        Ok(())
    }

    fn defer(&mut self, child: &EntityId, parent: &EntityId) -> SyncResult<()> {
        let missing = if self.world.contains(parent) {
            child
        } else {
            parent
        };
        if !self.config.defer_forward_references {
            return Err(SyncError::UnknownEntity(missing.clone()));
        }
        if self.pending.insert(child.clone(), parent.clone()) {
            debug!(%child, %parent, %missing, "attachment deferred");
            self.emit(SyncEvent::AttachmentDeferred {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        Ok(())
    }

    fn resolve_pending(&mut self, id: &EntityId) {
        for (child, parent) in self.pending.involving(id) {
            if self.world.contains(&child) && self.world.contains(&parent) {
                let result = self.attach(&child, &parent);
                self.record(result);
            }
        }
    }

    /// Brings every touched child in line with its node's `parent`
    /// attribute, then orders the children of every parent involved the way
    /// the parent's node lists them.
    fn settle(&mut self) {
        let touched = std::mem::take(&mut self.touched);
        let mut parents = BTreeSet::new();
        for child in &touched {
            parents.extend(self.world.parent(child));
            let result = self.settle_parent(child);
            self.record(result);
            parents.extend(self.world.parent(child));
        }
        for parent in &parents {
            let result = self.order_children(parent);
            self.record(result);
        }
    }

    fn settle_parent(&mut self, child: &EntityId) -> SyncResult<()> {
        if !self.world.contains(child) {
            return Ok(());
        }
        let Some(node) = self.correlation.node(child) else {
            return Ok(());
        };
        let Some(item) = self.doc.map_get(node, PARENT).ok().flatten() else {
            return Ok(());
        };
        match item.as_any() {
            Some(Value::String(parent)) => {
                let parent = EntityId::from(parent.as_str());
                if !self.world.contains(&parent) || self.world.parent(child).as_ref() == Some(&parent)
                {
                    return Ok(());
                }
                debug!(%child, %parent, "settling on the document's parent");
                self.attach(child, &parent)
            }
            _ => {
                self.pending.remove(child);
                self.detach(child, None)
            }
        }
    }

    fn order_children(&mut self, parent: &EntityId) -> SyncResult<()> {
        let Some(node) = self.correlation.node(parent) else {
            return Ok(());
        };
        let Some(list) = self.doc.map_get(node, CHILDREN).ok().flatten().and_then(Item::node) else {
            return Ok(());
        };
        let order: Vec<EntityId> = self
            .doc
            .array_items(list)?
            .iter()
            .filter_map(|item| item.as_any().and_then(Value::as_str))
            .map(EntityId::from)
            .collect();
        self.world.reorder_children(parent, &order)?;
        Ok(())
    }

    fn children_changed(
        &mut self,
        node: NodeId,
        deltas: &[ArrayDelta],
        path: &Path,
    ) -> SyncResult<()> {
        let parent = self.entity_of(node)?;
        let child_id = |value: &Value| {
            value
                .as_str()
                .map(EntityId::from)
                .ok_or_else(|| SyncError::UnrecognizedPath(path.clone()))
        };
        for delta in deltas {
            match delta {
                ArrayDelta::Insert { items, .. } => {
                    for item in items {
                        let result = match item {
                            InsertedItem::Value(v) => {
                                child_id(v).and_then(|child| self.attach(&child, &parent))
                            }
                            InsertedItem::Node(_) => Err(SyncError::UnrecognizedPath(path.clone())),
                        };
                        self.record(result);
                    }
                }
                ArrayDelta::Delete { removed, .. } => {
                    for item in removed {
                        let result =
                            child_id(&item.value).and_then(|child| self.detach(&child, Some(&parent)));
                        self.record(result);
                    }
                }
            }
        }
        Ok(())
    }

    // ── Components ──────────────────────────────────────────────

    fn components_changed(
        &mut self,
        node: NodeId,
        deltas: &[ArrayDelta],
        path: &Path,
    ) -> SyncResult<()> {
        let id = self.entity_of(node)?;
        for delta in deltas {
            match delta {
                ArrayDelta::Insert { items, .. } => {
                    for item in items {
                        let result = match item {
                            InsertedItem::Node(component) => self.component_added(&id, *component),
                            InsertedItem::Value(_) => Err(SyncError::UnrecognizedPath(path.clone())),
                        };
                        self.record(result);
                    }
                }
                ArrayDelta::Delete { removed, .. } => {
                    for item in removed {
                        let result = self.component_removed(&id, item, path);
                        self.record(result);
                    }
                }
            }
        }
        Ok(())
    }

    fn component_added(&mut self, id: &EntityId, node: NodeId) -> SyncResult<()> {
        let data: ComponentJson = serde_json::from_value(self.doc.materialize(node)?)?;
        let schema = self.schema(id, &data.name)?;
        let component = Component::from_json(schema, &data)?;
        if self.world.component(id, &data.name).is_some() {
            self.world.remove_component(id, &data.name)?;
        }
        self.world.add_component(id, component)?;
        self.emit(SyncEvent::ComponentAdded {
            entity: id.clone(),
            component: data.name,
        });
        Ok(())
    }

    fn component_removed(&mut self, id: &EntityId, item: &RemovedItem, path: &Path) -> SyncResult<()> {
        let name = item
            .value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::UnrecognizedPath(path.clone()))?;
        if !self.world.remove_component(id, name)? {
            return Err(SyncError::UnknownComponent {
                entity: id.clone(),
                component: name.to_string(),
            });
        }
        self.emit(SyncEvent::ComponentRemoved {
            entity: id.clone(),
            component: name.to_string(),
        });
        Ok(())
    }

    fn schema(&self, id: &EntityId, name: &str) -> SyncResult<Arc<ComponentSchema>> {
        self.world
            .registry()
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::UnknownComponent {
                entity: id.clone(),
                component: name.to_string(),
            })
    }

    // ── Properties ──────────────────────────────────────────────

    fn properties_changed(
        &mut self,
        entity: NodeId,
        component: NodeId,
        keys: &BTreeMap<String, EntryChange>,
        path: &Path,
    ) -> SyncResult<()> {
        let id = self.entity_of(entity)?;
        let name = self
            .doc
            .map_get(component, "name")?
            .and_then(Item::as_any)
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::UnrecognizedPath(path.clone()))?
            .to_string();
        let schema = self.schema(&id, &name)?;
        let mut changed = BTreeSet::new();
        for (key, change) in keys {
            match self.property_changed(&id, &schema, key, change) {
                Ok(true) => {
                    changed.insert(key.clone());
                }
                Ok(false) => {}
                Err(e) => self.record(Err(e)),
            }
        }
        for property in changed {
            self.emit(SyncEvent::PropertyChanged {
                entity: id.clone(),
                component: name.clone(),
                property,
            });
        }
        Ok(())
    }

    /// Decodes and assigns one property. Returns false for reference
    /// properties, which are never synced.
    fn property_changed(
        &mut self,
        id: &EntityId,
        schema: &ComponentSchema,
        key: &str,
        change: &EntryChange,
    ) -> SyncResult<bool> {
        let prop = schema.property(key).ok_or_else(|| {
            SyncError::World(WorldError::UnknownProperty {
                component: schema.name.clone(),
                property: key.to_string(),
            })
        })?;
        if !prop.ty.is_serialized() {
            debug!(component = %schema.name, property = key, "skipping reference property");
            return Ok(false);
        }
        let value = match change.new_value() {
            Some(raw) => prop.ty.decode(raw).map_err(|source| SyncError::Decode {
                component: schema.name.clone(),
                property: key.to_string(),
                source,
            })?,
            None => prop.initial_value(),
        };
        match self.world.set_property(id, &schema.name, key, value) {
            Err(WorldError::ComponentNotFound { entity, component }) => {
                Err(SyncError::UnknownComponent { entity, component })
            }
            other => other.map(|()| true).map_err(SyncError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relm_types::{ClientId, path};

    fn event(path: Path, ancestors: usize, change: EventChange) -> DocEvent {
        DocEvent {
            target: NodeId::new(ClientId::from_raw(1), ancestors as u64),
            root: "entities".into(),
            path,
            ancestors: (0..=ancestors as u64)
                .map(|c| NodeId::new(ClientId::from_raw(1), c))
                .collect(),
            change,
        }
    }

    #[test]
    fn shapes_follow_the_entity_layout() {
        let map = EventChange::Map(BTreeMap::new());
        let list = EventChange::Array(Vec::new());
        let n = |c| NodeId::new(ClientId::from_raw(1), c);

        assert_eq!(shape(&event(path![], 0, list.clone())).unwrap(), EventShape::Entities);
        assert_eq!(
            shape(&event(path![3], 1, map.clone())).unwrap(),
            EventShape::Attributes { entity: n(1) }
        );
        assert_eq!(
            shape(&event(path![3, "children"], 2, list.clone())).unwrap(),
            EventShape::Children { entity: n(1) }
        );
        assert_eq!(
            shape(&event(path![3, "components"], 2, list)).unwrap(),
            EventShape::Components { entity: n(1) }
        );
        assert_eq!(
            shape(&event(path![3, "components", 0, "values"], 4, map)).unwrap(),
            EventShape::Properties {
                entity: n(1),
                component: n(3)
            }
        );
    }

    #[test]
    fn unknown_shapes_are_fatal() {
        let map = EventChange::Map(BTreeMap::new());
        for p in [path!["x"], path![0, "name"], path![0, "components", 0]] {
            let len = p.len();
            let err = shape(&event(p, len, map.clone())).unwrap_err();
            assert!(matches!(err, SyncError::UnrecognizedPath(_)));
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn pending_attachments_forget_both_ends() {
        let mut pending = PendingAttachments::new();
        assert!(pending.insert("c1".into(), "p".into()));
        assert!(!pending.insert("c1".into(), "p".into()));
        pending.insert("c2".into(), "p".into());
        pending.insert("p".into(), "g".into());
        assert_eq!(pending.involving(&"p".into()).len(), 3);

        pending.forget(&"p".into());
        assert!(pending.is_empty());
    }
}
