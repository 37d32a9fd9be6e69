//! The document: a forest of map and array nodes under named roots.
//!
//! Arrays are replicated growable arrays: every slot has a globally unique
//! id, deleted slots stay behind as tombstones, and a slot inserted after a
//! given neighbour lands in the same place on every replica. Map keys are
//! last-writer-wins registers stamped with the id of the write. Ids are
//! Lamport-ordered, so a replica's new writes always supersede what it has
//! seen and concurrent writes are ordered the same way everywhere.

use crate::content::{Content, Item, Prelim, SlotContent};
use crate::error::{DocError, DocResult};
use crate::event::TransactionBatch;
use crate::state::StateVector;
use crate::undo::{UndoManager, UndoOptions};
use crate::update::{RootKind, Target, Update};
use relm_types::{ClientId, NodeId, Path, PathSegment};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Where a node sits inside its parent.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Place {
    Key(String),
    Array,
}

/// One array slot. Deleted slots are kept as tombstones so inserts anchored
/// on them still find their position.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) id: NodeId,
    pub(crate) item: Item,
    pub(crate) deleted: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    /// Live entries, plus the stamp of the latest write to every key ever
    /// written (removals included).
    Map {
        entries: BTreeMap<String, Item>,
        stamps: BTreeMap<String, NodeId>,
    },
    Array(Vec<Element>),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<(NodeId, Place)>,
}

/// Lamport order: the later clock wins, ties go to the higher client.
pub(crate) fn supersedes(a: NodeId, b: NodeId) -> bool {
    (a.clock, a.client) > (b.clock, b.client)
}

/// One replica of a shared document.
///
/// All mutation goes through [`Doc::transact`] or [`Doc::apply_update`]. Each
/// commit queues a [`TransactionBatch`] for observers and, unless the
/// transaction came from a peer, an [`Update`] for the transport.
#[derive(Debug)]
pub struct Doc {
    client: ClientId,
    clock: u64,
    pub(crate) nodes: HashMap<NodeId, Node>,
    roots: BTreeMap<String, (NodeId, RootKind)>,
    root_names: HashMap<NodeId, String>,
    /// Removed nodes, and nodes of peer writes that lost before being created.
    pub(crate) gone: HashSet<NodeId>,
    /// Former id → id that replaced it after re-insertion.
    pub(crate) redirects: HashMap<NodeId, NodeId>,
    pub(crate) state: StateVector,
    /// Peer updates held back until the updates they build on arrive.
    pub(crate) pending: Vec<Update>,
    pub(crate) batches: VecDeque<TransactionBatch>,
    pub(crate) updates: VecDeque<Update>,
    pub(crate) undo: Option<UndoManager>,
}

impl Default for Doc {
    fn default() -> Self {
        Self::new()
    }
}

impl Doc {
    /// Creates an empty document with a random client id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(ClientId::random())
    }

    /// Creates an empty document owned by `client`.
    #[must_use]
    pub fn with_client(client: ClientId) -> Self {
        Self {
            client,
            clock: 0,
            nodes: HashMap::new(),
            roots: BTreeMap::new(),
            root_names: HashMap::new(),
            gone: HashSet::new(),
            redirects: HashMap::new(),
            state: StateVector::new(),
            pending: Vec::new(),
            batches: VecDeque::new(),
            updates: VecDeque::new(),
            undo: None,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client
    }

    /// Updates integrated so far, per client, this replica's own included.
    #[must_use]
    pub fn state_vector(&self) -> &StateVector {
        &self.state
    }

    /// Number of peer updates waiting for their dependencies.
    #[must_use]
    pub fn pending_updates(&self) -> usize {
        self.pending.len()
    }

    // ── Roots ───────────────────────────────────────────────────

    /// Returns the named root array, creating it if needed.
    pub fn get_or_insert_array(&mut self, name: &str) -> DocResult<NodeId> {
        self.ensure_root(name, RootKind::Array)
    }

    /// Returns the named root map, creating it if needed.
    pub fn get_or_insert_map(&mut self, name: &str) -> DocResult<NodeId> {
        self.ensure_root(name, RootKind::Map)
    }

    /// Looks up an existing root.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).map(|(id, _)| *id)
    }

    pub(crate) fn ensure_root(&mut self, name: &str, kind: RootKind) -> DocResult<NodeId> {
        if let Some((id, existing)) = self.roots.get(name) {
            if *existing != kind {
                return Err(DocError::RootKindMismatch {
                    name: name.to_string(),
                });
            }
            return Ok(*id);
        }
        let id = NodeId::root(name);
        let node_kind = match kind {
            RootKind::Map => NodeKind::Map {
                entries: BTreeMap::new(),
                stamps: BTreeMap::new(),
            },
            RootKind::Array => NodeKind::Array(Vec::new()),
        };
        self.nodes.insert(
            id,
            Node {
                kind: node_kind,
                parent: None,
            },
        );
        self.roots.insert(name.to_string(), (id, kind));
        self.root_names.insert(id, name.to_string());
        Ok(id)
    }

    pub(crate) fn target_of(&self, id: NodeId) -> Target {
        match self.root_names.get(&id) {
            Some(name) => Target::Root {
                name: name.clone(),
                kind: self.roots[name].1,
            },
            None => Target::Node(id),
        }
    }

    // ── Reads ───────────────────────────────────────────────────

    /// True if the node is alive.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// True if the node existed on this replica and was removed since.
    #[must_use]
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.gone.contains(&id)
    }

    /// Follows re-insertion redirects to the id currently standing in for `id`.
    #[must_use]
    pub fn resolve(&self, id: NodeId) -> NodeId {
        let mut current = id;
        // Bounded: each hop moves to a strictly newer re-insertion.
        for _ in 0..self.redirects.len() {
            match self.redirects.get(&current) {
                Some(next) if *next != current => current = *next,
                _ => break,
            }
        }
        current
    }

    fn node(&self, id: NodeId) -> DocResult<&Node> {
        self.nodes.get(&id).ok_or(DocError::NodeNotFound(id))
    }

    /// Borrows a map node's live entries.
    pub fn map_entries(&self, map: NodeId) -> DocResult<&BTreeMap<String, Item>> {
        match &self.node(map)?.kind {
            NodeKind::Map { entries, .. } => Ok(entries),
            NodeKind::Array(_) => Err(DocError::NotAMap(map)),
        }
    }

    /// Reads one map entry.
    pub fn map_get(&self, map: NodeId, key: &str) -> DocResult<Option<&Item>> {
        Ok(self.map_entries(map)?.get(key))
    }

    /// Stamp of the latest write to a key, removals included.
    pub(crate) fn stamp(&self, map: NodeId, key: &str) -> DocResult<Option<NodeId>> {
        match &self.node(map)?.kind {
            NodeKind::Map { stamps, .. } => Ok(stamps.get(key).copied()),
            NodeKind::Array(_) => Err(DocError::NotAMap(map)),
        }
    }

    /// All slots of an array node, tombstones included, in document order.
    pub(crate) fn elements(&self, array: NodeId) -> DocResult<&[Element]> {
        match &self.node(array)?.kind {
            NodeKind::Array(elements) => Ok(elements),
            NodeKind::Map { .. } => Err(DocError::NotAnArray(array)),
        }
    }

    fn visible(&self, array: NodeId) -> DocResult<impl Iterator<Item = &Element>> {
        Ok(self.elements(array)?.iter().filter(|e| !e.deleted))
    }

    /// The live items of an array node, in order.
    pub fn array_items(&self, array: NodeId) -> DocResult<Vec<Item>> {
        Ok(self.visible(array)?.map(|e| e.item.clone()).collect())
    }

    pub fn array_len(&self, array: NodeId) -> DocResult<usize> {
        Ok(self.visible(array)?.count())
    }

    pub fn array_get(&self, array: NodeId, index: usize) -> DocResult<Option<&Item>> {
        Ok(self.visible(array)?.nth(index).map(|e| &e.item))
    }

    /// Id of the live slot at `index`.
    pub(crate) fn slot_at(&self, array: NodeId, index: usize) -> DocResult<Option<NodeId>> {
        Ok(self.visible(array)?.nth(index).map(|e| e.id))
    }

    /// Document-order position of a slot, tombstones counted.
    pub(crate) fn position_of(&self, array: NodeId, slot: NodeId) -> DocResult<Option<usize>> {
        Ok(self.elements(array)?.iter().position(|e| e.id == slot))
    }

    /// Number of live slots before document-order position `pos`.
    pub(crate) fn visible_index(&self, array: NodeId, pos: usize) -> DocResult<usize> {
        Ok(self.elements(array)?[..pos].iter().filter(|e| !e.deleted).count())
    }

    /// True if `slot` is a live slot of `array`.
    pub(crate) fn is_visible(&self, array: NodeId, slot: NodeId) -> bool {
        self.elements(array)
            .is_ok_and(|elements| elements.iter().any(|e| e.id == slot && !e.deleted))
    }

    /// Converts a subtree to plain JSON.
    pub fn materialize(&self, id: NodeId) -> DocResult<Value> {
        Ok(match &self.node(id)?.kind {
            NodeKind::Map { entries, .. } => Value::Object(
                entries
                    .iter()
                    .map(|(k, item)| (k.clone(), self.materialize_item(item)))
                    .collect::<Map<String, Value>>(),
            ),
            NodeKind::Array(_) => Value::Array(
                self.visible(id)?
                    .map(|e| self.materialize_item(&e.item))
                    .collect(),
            ),
        })
    }

    /// Converts one slot to plain JSON. Dangling node references read as null.
    #[must_use]
    pub fn materialize_item(&self, item: &Item) -> Value {
        match item {
            Item::Any(v) => v.clone(),
            Item::Node(id) => self.materialize(*id).unwrap_or(Value::Null),
        }
    }

    /// Locates a node: its root name, the path from the root, and the node
    /// ids along that path (root first, `id` last). Detached nodes have no
    /// location.
    #[must_use]
    pub fn locate(&self, id: NodeId) -> Option<(String, Path, Vec<NodeId>)> {
        let mut segments = Vec::new();
        let mut ancestors = vec![id];
        let mut current = id;
        while let Some((parent, place)) = &self.nodes.get(&current)?.parent {
            let segment = match place {
                Place::Key(key) => {
                    if self.map_get(*parent, key).ok()?.and_then(Item::node) != Some(current) {
                        return None;
                    }
                    PathSegment::Key(key.clone())
                }
                Place::Array => {
                    let index = self
                        .visible(*parent)
                        .ok()?
                        .position(|e| e.item.node() == Some(current))?;
                    PathSegment::Index(index)
                }
            };
            segments.push(segment);
            ancestors.push(*parent);
            current = *parent;
        }
        let root = self.root_names.get(&current)?.clone();
        segments.reverse();
        ancestors.reverse();
        Some((root, Path::from(segments), ancestors))
    }

    // ── Queues ──────────────────────────────────────────────────

    /// Drains the event batches committed since the last call, oldest first.
    pub fn take_batches(&mut self) -> Vec<TransactionBatch> {
        self.batches.drain(..).collect()
    }

    /// Drains the updates to ship to peers, oldest first.
    pub fn take_updates(&mut self) -> Vec<Update> {
        self.updates.drain(..).collect()
    }

    #[must_use]
    pub fn has_pending_batches(&self) -> bool {
        !self.batches.is_empty()
    }

    // ── Undo configuration ──────────────────────────────────────

    /// Starts journaling tracked transactions.
    pub fn enable_undo(&mut self, options: UndoOptions) {
        self.undo = Some(UndoManager::new(options));
    }

    /// Borrows the undo journal, if enabled.
    #[must_use]
    pub fn undo_manager(&self) -> Option<&UndoManager> {
        self.undo.as_ref()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.undo.as_ref().is_some_and(UndoManager::can_undo)
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.undo.as_ref().is_some_and(UndoManager::can_redo)
    }

    /// Closes the current coalescing group: the next tracked transaction
    /// starts a new undo step.
    pub fn stop_capturing(&mut self) {
        if let Some(undo) = self.undo.as_mut() {
            undo.stop_capturing();
        }
    }

    // ── Raw node surgery (no journaling) ────────────────────────

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(self.client, self.clock);
        self.clock += 1;
        id
    }

    /// Lamport receive: local ids minted from now on supersede `id`.
    pub(crate) fn observe_clock(&mut self, id: NodeId) {
        if !id.is_root() && id.clock >= self.clock {
            self.clock = id.clock + 1;
        }
    }

    pub(crate) fn map_parts_mut(
        &mut self,
        map: NodeId,
    ) -> DocResult<(&mut BTreeMap<String, Item>, &mut BTreeMap<String, NodeId>)> {
        match &mut self.nodes.get_mut(&map).ok_or(DocError::NodeNotFound(map))?.kind {
            NodeKind::Map { entries, stamps } => Ok((entries, stamps)),
            NodeKind::Array(_) => Err(DocError::NotAMap(map)),
        }
    }

    pub(crate) fn elements_mut(&mut self, array: NodeId) -> DocResult<&mut Vec<Element>> {
        match &mut self.nodes.get_mut(&array).ok_or(DocError::NodeNotFound(array))?.kind {
            NodeKind::Array(elements) => Ok(elements),
            NodeKind::Map { .. } => Err(DocError::NotAnArray(array)),
        }
    }

    /// Document-order position for a new slot `id` anchored after `origin`
    /// (`None` anchors at the start). Slots already after the anchor that
    /// supersede `id` stay in front of it.
    pub(crate) fn place_after(
        &self,
        array: NodeId,
        origin: Option<NodeId>,
        id: NodeId,
    ) -> DocResult<usize> {
        let elements = self.elements(array)?;
        let mut pos = match origin {
            None => 0,
            Some(slot) => {
                elements
                    .iter()
                    .position(|e| e.id == slot)
                    .ok_or(DocError::UnknownSlot { array, slot })?
                    + 1
            }
        };
        while pos < elements.len() && supersedes(elements[pos].id, id) {
            pos += 1;
        }
        Ok(pos)
    }

    /// Mints ids for local content. Snapshot ids are never reused: each
    /// former id is paired with the fresh id replacing it.
    pub(crate) fn assign_ids(
        &mut self,
        prelim: Prelim,
        redirects: &mut Vec<(NodeId, NodeId)>,
    ) -> Content {
        match prelim {
            Prelim::Any(value) => Content::Any { value },
            Prelim::Map { entries, former } => {
                let id = self.claim_id(former, redirects);
                let entries = entries
                    .into_iter()
                    .map(|(k, v)| (k, self.assign_ids(v, redirects)))
                    .collect();
                Content::Map { id, entries }
            }
            Prelim::Array {
                items,
                former,
                former_slots,
            } => {
                let id = self.claim_id(former, redirects);
                let items = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let slot = self.claim_id(former_slots.get(i).copied(), redirects);
                        SlotContent {
                            id: slot,
                            content: self.assign_ids(v, redirects),
                        }
                    })
                    .collect();
                Content::Array { id, items }
            }
        }
    }

    fn claim_id(&mut self, former: Option<NodeId>, redirects: &mut Vec<(NodeId, NodeId)>) -> NodeId {
        let id = self.next_id();
        if let Some(former) = former.filter(|f| !f.is_root()) {
            redirects.push((former, id));
        }
        id
    }

    /// Fails if creating `content` would collide with a live node.
    pub(crate) fn check_content(&self, content: &Content) -> DocResult<()> {
        match content.node_id() {
            Some(id) if self.nodes.contains_key(&id) => Err(DocError::DuplicateNode(id)),
            _ => match content {
                Content::Any { .. } => Ok(()),
                Content::Map { entries, .. } => {
                    entries.values().try_for_each(|c| self.check_content(c))
                }
                Content::Array { items, .. } => {
                    items.iter().try_for_each(|s| self.check_content(&s.content))
                }
            },
        }
    }

    /// Creates the nodes described by `content` and returns the slot value.
    /// Callers run [`Doc::check_content`] first.
    pub(crate) fn integrate(
        &mut self,
        content: Content,
        parent: (NodeId, Place),
        created: &mut Vec<NodeId>,
    ) -> Item {
        match content {
            Content::Any { value } => Item::Any(value),
            Content::Map { id, entries } => {
                self.observe_clock(id);
                self.nodes.insert(
                    id,
                    Node {
                        kind: NodeKind::Map {
                            entries: BTreeMap::new(),
                            stamps: BTreeMap::new(),
                        },
                        parent: Some(parent),
                    },
                );
                created.push(id);
                let mut map = BTreeMap::new();
                let mut stamps = BTreeMap::new();
                for (key, child) in entries {
                    let item = self.integrate(child, (id, Place::Key(key.clone())), created);
                    stamps.insert(key.clone(), id);
                    map.insert(key, item);
                }
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.kind = NodeKind::Map {
                        entries: map,
                        stamps,
                    };
                }
                Item::Node(id)
            }
            Content::Array { id, items } => {
                self.observe_clock(id);
                self.nodes.insert(
                    id,
                    Node {
                        kind: NodeKind::Array(Vec::new()),
                        parent: Some(parent),
                    },
                );
                created.push(id);
                let elements: Vec<Element> = items
                    .into_iter()
                    .map(|slot| {
                        self.observe_clock(slot.id);
                        Element {
                            id: slot.id,
                            item: self.integrate(slot.content, (id, Place::Array), created),
                            deleted: false,
                        }
                    })
                    .collect();
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.kind = NodeKind::Array(elements);
                }
                Item::Node(id)
            }
        }
    }

    /// Drops a node and everything below it, remembering their ids.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        self.gone.insert(id);
        let children: Vec<NodeId> = match &node.kind {
            NodeKind::Map { entries, .. } => entries.values().filter_map(Item::node).collect(),
            NodeKind::Array(elements) => elements.iter().filter_map(|e| e.item.node()).collect(),
        };
        for child in children {
            self.remove_subtree(child);
        }
    }

    /// Captures a slot as re-insertable content remembering former ids.
    pub(crate) fn snapshot(&self, item: &Item) -> Prelim {
        match item {
            Item::Any(v) => Prelim::Any(v.clone()),
            Item::Node(id) => match self.nodes.get(id).map(|n| &n.kind) {
                Some(NodeKind::Map { entries, .. }) => Prelim::Map {
                    entries: entries
                        .iter()
                        .map(|(k, v)| (k.clone(), self.snapshot(v)))
                        .collect(),
                    former: Some(*id),
                },
                Some(NodeKind::Array(elements)) => {
                    let live: Vec<&Element> = elements.iter().filter(|e| !e.deleted).collect();
                    Prelim::Array {
                        items: live.iter().map(|e| self.snapshot(&e.item)).collect(),
                        former: Some(*id),
                        former_slots: live.iter().map(|e| e.id).collect(),
                    }
                }
                None => Prelim::Any(Value::Null),
            },
        }
    }
}
