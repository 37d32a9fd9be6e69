//! Atomic, journaled mutation of a [`Doc`].

use crate::content::{Content, Item, Prelim, SlotContent};
use crate::doc::{Doc, Element, Place, supersedes};
use crate::error::{DocError, DocResult};
use crate::event::{
    ArrayDelta, DocEvent, EntryChange, EventChange, InsertedItem, RemovedItem, TransactionBatch,
};
use crate::undo::InverseOp;
use crate::update::{Target, Update, UpdateOp};
use relm_types::{NodeId, Origin};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::time::Instant;
use tracing::debug;

/// Accumulated change to one pre-existing node.
#[derive(Debug)]
enum Pending {
    /// Key → value before the transaction (first write wins).
    Map(BTreeMap<String, Option<Value>>),
    Array(Vec<ArrayDelta>),
}

/// Raw record of one mutation, for rollback.
#[derive(Debug)]
enum Revert {
    Entry {
        map: NodeId,
        key: String,
        item: Option<Item>,
        stamp: Option<NodeId>,
    },
    Inserted {
        array: NodeId,
        slot: NodeId,
    },
    Deleted {
        array: NodeId,
        slot: NodeId,
    },
    Redirect {
        former: NodeId,
        previous: Option<NodeId>,
    },
}

/// A transaction in progress. Reads go through [`Deref`] to the document.
///
/// Created by [`Doc::transact`]; on error every change it made is reverted.
pub struct TransactionMut<'doc> {
    doc: &'doc mut Doc,
    origin: Origin,
    ops: Vec<UpdateOp>,
    inverse: Vec<InverseOp>,
    revert: Vec<Revert>,
    created: HashSet<NodeId>,
    /// Nodes detached by this transaction, dropped on commit.
    doomed: HashSet<NodeId>,
    /// Ids of peer content that lost to a later write and is never created.
    buried: HashSet<NodeId>,
    changes: Vec<(NodeId, Pending)>,
    change_index: HashMap<NodeId, usize>,
}

impl Deref for TransactionMut<'_> {
    type Target = Doc;

    fn deref(&self) -> &Doc {
        self.doc
    }
}

impl<'doc> TransactionMut<'doc> {
    fn new(doc: &'doc mut Doc, origin: Origin) -> Self {
        Self {
            doc,
            origin,
            ops: Vec::new(),
            inverse: Vec::new(),
            revert: Vec::new(),
            created: HashSet::new(),
            doomed: HashSet::new(),
            buried: HashSet::new(),
            changes: Vec::new(),
            change_index: HashMap::new(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Sets a map key. Returns the id of the node created for the value, if any.
    pub fn map_set(
        &mut self,
        map: NodeId,
        key: &str,
        value: impl Into<Prelim>,
    ) -> DocResult<Option<NodeId>> {
        self.live(map)?;
        self.doc.map_entries(map)?;
        let stamp = self.doc.next_id();
        let content = self.assign(value.into());
        let id = content.node_id();
        self.integrate_map_set(map, key.to_string(), stamp, content)?;
        Ok(id)
    }

    /// Removes a map key. Returns false if it was absent.
    pub fn map_remove(&mut self, map: NodeId, key: &str) -> DocResult<bool> {
        self.live(map)?;
        if self.doc.map_get(map, key)?.is_none() {
            return Ok(false);
        }
        let stamp = self.doc.next_id();
        self.integrate_map_remove(map, key.to_string(), stamp)
    }

    /// Inserts items at `index`. Returns the ids of the nodes created, per item.
    pub fn array_insert(
        &mut self,
        array: NodeId,
        index: usize,
        items: Vec<Prelim>,
    ) -> DocResult<Vec<Option<NodeId>>> {
        self.live(array)?;
        let len = self.doc.array_len(array)?;
        if index > len {
            return Err(DocError::IndexOutOfBounds {
                node: array,
                index,
                len,
            });
        }
        let origin = match index {
            0 => None,
            i => self.doc.slot_at(array, i - 1)?,
        };
        let mut slots = Vec::with_capacity(items.len());
        for prelim in items {
            let id = self.doc.next_id();
            let content = self.assign(prelim);
            slots.push(SlotContent { id, content });
        }
        let ids = slots.iter().map(|s| s.content.node_id()).collect();
        self.integrate_array_insert(array, origin, slots)?;
        Ok(ids)
    }

    /// Appends items.
    pub fn array_push(
        &mut self,
        array: NodeId,
        items: Vec<Prelim>,
    ) -> DocResult<Vec<Option<NodeId>>> {
        let len = self.doc.array_len(array)?;
        self.array_insert(array, len, items)
    }

    /// Removes `len` items starting at `index`.
    pub fn array_delete(&mut self, array: NodeId, index: usize, len: usize) -> DocResult<()> {
        self.live(array)?;
        let current = self.doc.array_len(array)?;
        if index + len > current {
            return Err(DocError::IndexOutOfBounds {
                node: array,
                index: index + len,
                len: current,
            });
        }
        if len == 0 {
            return Ok(());
        }
        let slots: Vec<NodeId> = self
            .doc
            .elements(array)?
            .iter()
            .filter(|e| !e.deleted)
            .skip(index)
            .take(len)
            .map(|e| e.id)
            .collect();
        self.integrate_array_delete(array, &slots)
    }

    // ── Integration (shared by local edits and update replay) ───

    fn live(&self, node: NodeId) -> DocResult<()> {
        if self.doomed.contains(&node) || !self.doc.contains(node) {
            return Err(DocError::NodeNotFound(node));
        }
        Ok(())
    }

    fn is_live(&self, node: NodeId) -> bool {
        self.live(node).is_ok()
    }

    fn tracked(&self, node: NodeId) -> bool {
        !self.created.contains(&node)
    }

    fn assign(&mut self, prelim: Prelim) -> Content {
        let mut pairs = Vec::new();
        let content = self.doc.assign_ids(prelim, &mut pairs);
        for (former, fresh) in pairs {
            self.redirect(former, fresh);
        }
        content
    }

    fn redirect(&mut self, former: NodeId, fresh: NodeId) {
        let previous = self.doc.redirects.insert(former, fresh);
        self.revert.push(Revert::Redirect { former, previous });
    }

    fn bury(&mut self, content: &Content) {
        for id in content.ids() {
            self.doc.observe_clock(id);
            self.buried.insert(id);
        }
    }

    fn pending(&mut self, node: NodeId, fresh: impl FnOnce() -> Pending) -> &mut Pending {
        let slot = *self.change_index.entry(node).or_insert_with(|| {
            self.changes.push((node, fresh()));
            self.changes.len() - 1
        });
        &mut self.changes[slot].1
    }

    fn note_map_old(&mut self, map: NodeId, key: &str, old: Option<Value>) {
        if let Pending::Map(keys) = self.pending(map, || Pending::Map(BTreeMap::new())) {
            keys.entry(key.to_string()).or_insert(old);
        }
    }

    fn note_insert(&mut self, array: NodeId, index: usize, items: Vec<InsertedItem>) {
        if let Pending::Array(deltas) = self.pending(array, || Pending::Array(Vec::new())) {
            deltas.push(ArrayDelta::Insert { index, items });
        }
    }

    /// Successive deletes at the same index fold into one delta.
    fn note_delete(&mut self, array: NodeId, index: usize, item: RemovedItem) {
        if let Pending::Array(deltas) = self.pending(array, || Pending::Array(Vec::new())) {
            match deltas.last_mut() {
                Some(ArrayDelta::Delete { index: at, removed }) if *at == index => {
                    removed.push(item);
                }
                _ => deltas.push(ArrayDelta::Delete {
                    index,
                    removed: vec![item],
                }),
            }
        }
    }

    fn journal_restore(&mut self, map: NodeId, key: &str, old: Option<&Item>) {
        if self.inverse.iter().any(|op| op.restores(map, key)) {
            return;
        }
        let value = old.map(|item| self.doc.snapshot(item));
        self.inverse.push(InverseOp::MapRestore {
            map,
            key: key.to_string(),
            value,
        });
    }

    fn integrate_map_set(
        &mut self,
        map: NodeId,
        key: String,
        stamp: NodeId,
        content: Content,
    ) -> DocResult<()> {
        self.doc.observe_clock(stamp);
        let current = self.doc.stamp(map, &key)?;
        if current.is_some_and(|c| !supersedes(stamp, c)) {
            debug!(%map, key, %stamp, "write superseded by a later one");
            self.bury(&content);
            return Ok(());
        }
        self.doc.check_content(&content)?;
        let old = self.doc.map_get(map, &key)?.cloned();
        if self.tracked(map) {
            let old_value = old.as_ref().map(|i| self.doc.materialize_item(i));
            self.note_map_old(map, &key, old_value);
            self.journal_restore(map, &key, old.as_ref());
        }
        self.revert.push(Revert::Entry {
            map,
            key: key.clone(),
            item: old.clone(),
            stamp: current,
        });
        self.ops.push(UpdateOp::MapSet {
            target: self.doc.target_of(map),
            key: key.clone(),
            stamp,
            content: content.clone(),
        });
        let mut created = Vec::new();
        let item = self
            .doc
            .integrate(content, (map, Place::Key(key.clone())), &mut created);
        self.created.extend(created);
        if let Some(Item::Node(old_id)) = old {
            self.doomed.insert(old_id);
        }
        let (entries, stamps) = self.doc.map_parts_mut(map)?;
        entries.insert(key.clone(), item);
        stamps.insert(key, stamp);
        Ok(())
    }

    fn integrate_map_remove(&mut self, map: NodeId, key: String, stamp: NodeId) -> DocResult<bool> {
        self.doc.observe_clock(stamp);
        let current = self.doc.stamp(map, &key)?;
        if current.is_some_and(|c| !supersedes(stamp, c)) {
            debug!(%map, key, %stamp, "removal superseded by a later write");
            return Ok(false);
        }
        let old = self.doc.map_get(map, &key)?.cloned();
        if let Some(old_item) = &old
            && self.tracked(map)
        {
            let old_value = self.doc.materialize_item(old_item);
            self.note_map_old(map, &key, Some(old_value));
            self.journal_restore(map, &key, Some(old_item));
        }
        self.revert.push(Revert::Entry {
            map,
            key: key.clone(),
            item: old.clone(),
            stamp: current,
        });
        self.ops.push(UpdateOp::MapRemove {
            target: self.doc.target_of(map),
            key: key.clone(),
            stamp,
        });
        if let Some(Item::Node(old_id)) = old {
            self.doomed.insert(old_id);
        }
        let (entries, stamps) = self.doc.map_parts_mut(map)?;
        entries.remove(&key);
        stamps.insert(key, stamp);
        Ok(old.is_some())
    }

    fn integrate_array_insert(
        &mut self,
        array: NodeId,
        origin: Option<NodeId>,
        items: Vec<SlotContent>,
    ) -> DocResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        for slot in &items {
            self.doc.check_content(&slot.content)?;
            if self.doc.position_of(array, slot.id)?.is_some() {
                return Err(DocError::DuplicateNode(slot.id));
            }
        }
        self.ops.push(UpdateOp::ArrayInsert {
            target: self.doc.target_of(array),
            origin,
            items: items.clone(),
        });
        let mut anchor = origin;
        let mut first = None;
        let mut inserted = Vec::with_capacity(items.len());
        let mut slots = Vec::with_capacity(items.len());
        for SlotContent { id, content } in items {
            self.doc.observe_clock(id);
            let pos = self.doc.place_after(array, anchor, id)?;
            let mut created = Vec::new();
            let item = self.doc.integrate(content, (array, Place::Array), &mut created);
            self.created.extend(created);
            inserted.push(match &item {
                Item::Any(v) => InsertedItem::Value(v.clone()),
                Item::Node(node) => InsertedItem::Node(*node),
            });
            self.doc.elements_mut(array)?.insert(
                pos,
                Element {
                    id,
                    item,
                    deleted: false,
                },
            );
            self.revert.push(Revert::Inserted { array, slot: id });
            if first.is_none() {
                first = Some(self.doc.visible_index(array, pos)?);
            }
            slots.push(id);
            anchor = Some(id);
        }
        if self.tracked(array) {
            self.inverse.push(InverseOp::ArrayRemove { array, slots });
            self.note_insert(array, first.unwrap_or_default(), inserted);
        }
        Ok(())
    }

    fn integrate_array_delete(&mut self, array: NodeId, slots: &[NodeId]) -> DocResult<()> {
        let tracked = self.tracked(array);
        let mut deleted = Vec::with_capacity(slots.len());
        for &slot in slots {
            let pos = self
                .doc
                .position_of(array, slot)?
                .ok_or(DocError::UnknownSlot { array, slot })?;
            let (item, was_deleted, origin) = {
                let elements = self.doc.elements(array)?;
                (
                    elements[pos].item.clone(),
                    elements[pos].deleted,
                    pos.checked_sub(1).map(|p| elements[p].id),
                )
            };
            if was_deleted {
                continue;
            }
            if tracked {
                let index = self.doc.visible_index(array, pos)?;
                self.inverse.push(InverseOp::ArrayReinsert {
                    array,
                    origin,
                    slot,
                    item: self.doc.snapshot(&item),
                });
                let removed = RemovedItem {
                    node: item.node(),
                    value: self.doc.materialize_item(&item),
                };
                self.note_delete(array, index, removed);
            }
            self.doc.elements_mut(array)?[pos].deleted = true;
            self.revert.push(Revert::Deleted { array, slot });
            if let Item::Node(node) = item {
                self.doomed.insert(node);
            }
            deleted.push(slot);
        }
        if !deleted.is_empty() {
            self.ops.push(UpdateOp::ArrayDelete {
                target: self.doc.target_of(array),
                slots: deleted,
            });
        }
        Ok(())
    }

    /// Resolves a peer operation's target. `None` means the target was
    /// removed here, concurrently, and the operation has nothing to act on.
    fn peer_target(&mut self, target: &Target) -> DocResult<Option<NodeId>> {
        match target {
            Target::Root { name, kind } => self.doc.ensure_root(name, *kind).map(Some),
            Target::Node(id)
                if self.doomed.contains(id)
                    || self.buried.contains(id)
                    || self.doc.is_removed(*id) =>
            {
                debug!(node = %id, "dropping operation on a removed node");
                Ok(None)
            }
            Target::Node(id) if self.doc.contains(*id) => Ok(Some(*id)),
            Target::Node(id) => Err(DocError::NodeNotFound(*id)),
        }
    }

    /// Replays one peer operation.
    fn apply_op(&mut self, op: UpdateOp) -> DocResult<()> {
        match op {
            UpdateOp::MapSet {
                target,
                key,
                stamp,
                content,
            } => match self.peer_target(&target)? {
                Some(map) => self.integrate_map_set(map, key, stamp, content),
                None => {
                    self.doc.observe_clock(stamp);
                    self.bury(&content);
                    Ok(())
                }
            },
            UpdateOp::MapRemove { target, key, stamp } => match self.peer_target(&target)? {
                Some(map) => self.integrate_map_remove(map, key, stamp).map(|_| ()),
                None => {
                    self.doc.observe_clock(stamp);
                    Ok(())
                }
            },
            UpdateOp::ArrayInsert {
                target,
                origin,
                items,
            } => match self.peer_target(&target)? {
                Some(array) => self.integrate_array_insert(array, origin, items),
                None => {
                    for slot in &items {
                        self.doc.observe_clock(slot.id);
                        self.bury(&slot.content);
                    }
                    Ok(())
                }
            },
            UpdateOp::ArrayDelete { target, slots } => match self.peer_target(&target)? {
                Some(array) => self.integrate_array_delete(array, &slots),
                None => Ok(()),
            },
        }
    }

    /// Re-applies one journaled inverse as a regular, journaled edit.
    /// Targets are re-resolved through redirects.
    pub(crate) fn apply_inverse(&mut self, op: InverseOp) -> DocResult<()> {
        match op {
            InverseOp::MapRestore { map, key, value } => {
                let map = self.doc.resolve(map);
                if !self.is_live(map) {
                    debug!(%map, key, "undo: map already gone");
                    return Ok(());
                }
                if let Some(stamp) = self.doc.stamp(map, &key)?
                    && stamp.client != self.doc.client_id()
                {
                    debug!(%map, key, writer = %stamp.client, "undo: key since written by a peer");
                    return Ok(());
                }
                match value {
                    Some(prelim) => self.map_set(map, &key, prelim).map(|_| ()),
                    None => self.map_remove(map, &key).map(|_| ()),
                }
            }
            InverseOp::ArrayRemove { array, slots } => {
                let array = self.doc.resolve(array);
                if !self.is_live(array) {
                    debug!(%array, "undo: array already gone");
                    return Ok(());
                }
                let live: Vec<NodeId> = slots
                    .into_iter()
                    .map(|slot| self.doc.resolve(slot))
                    .filter(|slot| self.doc.is_visible(array, *slot))
                    .collect();
                if live.is_empty() {
                    debug!(%array, "undo: inserted slots already gone");
                    return Ok(());
                }
                self.integrate_array_delete(array, &live)
            }
            InverseOp::ArrayReinsert {
                array,
                origin,
                slot,
                item,
            } => {
                let array = self.doc.resolve(array);
                if !self.is_live(array) {
                    debug!(%array, "undo: array already gone");
                    return Ok(());
                }
                let origin = match origin {
                    Some(o) => self.anchor(array, o)?,
                    None => None,
                };
                let id = self.doc.next_id();
                let content = self.assign(item);
                self.redirect(slot, id);
                self.integrate_array_insert(array, origin, vec![SlotContent { id, content }])
            }
        }
    }

    /// The slot to re-insert after: the former neighbour, tombstone or not,
    /// or whatever replaced it. Falls back to the end of the array.
    fn anchor(&self, array: NodeId, origin: NodeId) -> DocResult<Option<NodeId>> {
        for candidate in [origin, self.doc.resolve(origin)] {
            if self.doc.position_of(array, candidate)?.is_some() {
                return Ok(Some(candidate));
            }
        }
        Ok(self.doc.elements(array)?.last().map(|e| e.id))
    }

    // ── Commit / rollback ───────────────────────────────────────

    fn build_events(&self) -> Vec<DocEvent> {
        let mut events = Vec::new();
        for (node, pending) in &self.changes {
            if self.created.contains(node) || self.doomed.contains(node) {
                continue;
            }
            let Some((root, path, ancestors)) = self.doc.locate(*node) else {
                continue;
            };
            let change = match pending {
                Pending::Map(keys) => {
                    let entries: BTreeMap<String, EntryChange> = keys
                        .iter()
                        .filter_map(|(key, old)| {
                            let new = self
                                .doc
                                .map_get(*node, key)
                                .ok()
                                .flatten()
                                .map(|i| self.doc.materialize_item(i));
                            let change = match (old.clone(), new) {
                                (None, Some(new)) => EntryChange::Inserted(new),
                                (Some(old), Some(new)) if old != new => {
                                    EntryChange::Updated { old, new }
                                }
                                (Some(old), None) => EntryChange::Removed(old),
                                _ => return None,
                            };
                            Some((key.clone(), change))
                        })
                        .collect();
                    if entries.is_empty() {
                        continue;
                    }
                    EventChange::Map(entries)
                }
                Pending::Array(deltas) => {
                    let deltas: Vec<ArrayDelta> = deltas
                        .iter()
                        .filter_map(|delta| self.settle_delta(delta))
                        .collect();
                    if deltas.is_empty() {
                        continue;
                    }
                    EventChange::Array(deltas)
                }
            };
            events.push(DocEvent {
                target: *node,
                root,
                path,
                ancestors,
                change,
            });
        }
        events.sort_by_key(|e| e.path.len());
        events
    }

    /// Drops slots that were both created and removed within the transaction.
    fn settle_delta(&self, delta: &ArrayDelta) -> Option<ArrayDelta> {
        match delta {
            ArrayDelta::Insert { index, items } => {
                let items: Vec<InsertedItem> = items
                    .iter()
                    .filter(|item| match item {
                        InsertedItem::Node(id) => !self.doomed.contains(id),
                        InsertedItem::Value(_) => true,
                    })
                    .cloned()
                    .collect();
                (!items.is_empty()).then_some(ArrayDelta::Insert {
                    index: *index,
                    items,
                })
            }
            ArrayDelta::Delete { index, removed } => {
                let removed: Vec<RemovedItem> = removed
                    .iter()
                    .filter(|r| !r.node.is_some_and(|id| self.created.contains(&id)))
                    .cloned()
                    .collect();
                (!removed.is_empty()).then_some(ArrayDelta::Delete {
                    index: *index,
                    removed,
                })
            }
        }
    }

    fn commit(self) {
        let events = self.build_events();
        let TransactionMut {
            doc,
            origin,
            ops,
            inverse,
            doomed,
            buried,
            ..
        } = self;
        for id in doomed {
            doc.remove_subtree(id);
        }
        doc.gone.extend(buried);
        if !events.is_empty() {
            doc.batches.push_back(TransactionBatch { origin, events });
        }
        if origin.is_outgoing() && !ops.is_empty() {
            let client = doc.client_id();
            let deps = doc.state.clone();
            let seq = doc.state.increment(client);
            doc.updates.push_back(Update {
                client,
                seq,
                deps,
                ops,
            });
        }
        if let Some(undo) = doc.undo.as_mut() {
            undo.record(origin, inverse, Instant::now());
        }
    }

    fn rollback(self) {
        let TransactionMut {
            doc,
            revert,
            created,
            ..
        } = self;
        for step in revert.into_iter().rev() {
            match step {
                Revert::Entry {
                    map,
                    key,
                    item,
                    stamp,
                } => {
                    if let Ok((entries, stamps)) = doc.map_parts_mut(map) {
                        match item {
                            Some(item) => entries.insert(key.clone(), item),
                            None => entries.remove(&key),
                        };
                        match stamp {
                            Some(stamp) => stamps.insert(key, stamp),
                            None => stamps.remove(&key),
                        };
                    }
                }
                Revert::Inserted { array, slot } => {
                    if let Ok(elements) = doc.elements_mut(array) {
                        elements.retain(|e| e.id != slot);
                    }
                }
                Revert::Deleted { array, slot } => {
                    if let Ok(elements) = doc.elements_mut(array)
                        && let Some(element) = elements.iter_mut().find(|e| e.id == slot)
                    {
                        element.deleted = false;
                    }
                }
                Revert::Redirect { former, previous } => match previous {
                    Some(previous) => {
                        doc.redirects.insert(former, previous);
                    }
                    None => {
                        doc.redirects.remove(&former);
                    }
                },
            }
        }
        for id in created {
            doc.nodes.remove(&id);
        }
    }
}

impl Doc {
    /// Runs `f` as one atomic transaction tagged with `origin`.
    ///
    /// If `f` returns an error every change it made is reverted and nothing is
    /// emitted. Otherwise one event batch, one update (for non-remote origins)
    /// and one undo record are produced.
    pub fn transact<R>(
        &mut self,
        origin: Origin,
        f: impl FnOnce(&mut TransactionMut<'_>) -> DocResult<R>,
    ) -> DocResult<R> {
        self.try_transact(origin, f)
    }

    /// [`Doc::transact`] for callers with their own error type.
    pub fn try_transact<R, E: fmt::Display>(
        &mut self,
        origin: Origin,
        f: impl FnOnce(&mut TransactionMut<'_>) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut txn = TransactionMut::new(self, origin);
        match f(&mut txn) {
            Ok(value) => {
                txn.commit();
                Ok(value)
            }
            Err(e) => {
                debug!(%origin, error = %e, "transaction rolled back");
                txn.rollback();
                Err(e)
            }
        }
    }

    /// Integrates an update produced by another replica.
    ///
    /// Updates already integrated are ignored. An update whose dependencies
    /// have not all arrived is held back and integrated, together with any
    /// other held-back updates it unblocks, once they have. Integration is
    /// atomic: a failing operation leaves the document unchanged.
    pub fn apply_update(&mut self, update: &Update) -> DocResult<()> {
        if self.state.get(update.client) >= update.seq {
            debug!(client = %update.client, seq = update.seq, "update already integrated");
            return Ok(());
        }
        if !self.is_ready(update) {
            let queued = self
                .pending
                .iter()
                .any(|p| p.client == update.client && p.seq == update.seq);
            if !queued {
                debug!(client = %update.client, seq = update.seq, "update waiting for dependencies");
                self.pending.push(update.clone());
            }
            return Ok(());
        }
        self.integrate_update(update)?;
        self.drain_pending()
    }

    fn is_ready(&self, update: &Update) -> bool {
        self.state.get(update.client) + 1 == update.seq && self.state.covers(&update.deps)
    }

    fn integrate_update(&mut self, update: &Update) -> DocResult<()> {
        self.transact(Origin::Remote(update.client), |txn| {
            update
                .ops
                .iter()
                .cloned()
                .try_for_each(|op| txn.apply_op(op))
        })?;
        self.state.set(update.client, update.seq);
        Ok(())
    }

    fn drain_pending(&mut self) -> DocResult<()> {
        loop {
            self.pending
                .retain(|p| p.seq > self.state.get(p.client));
            let Some(at) = self.pending.iter().position(|p| self.is_ready(p)) else {
                return Ok(());
            };
            let update = self.pending.swap_remove(at);
            self.integrate_update(&update)?;
        }
    }
}
