//! The sync engine: one world, one document, kept in agreement.
//!
//! Local changes flow out through [`WorldSync::sync_from`] and
//! [`WorldSync::delete`], each one document transaction tagged
//! [`Origin::Local`]. Everything the document commits (peer updates, undo and
//! redo replays, imports) flows back in through the inbound observer when the
//! engine polls the document's event queue. Every engine call that commits a
//! transaction polls before returning, so the observer always sees the
//! document in the state its events describe.

use crate::applicator::{apply_op, entity_prelim};
use crate::correlation::Correlation;
use crate::diff::{CHILDREN, DiffOp, diff_entity};
use crate::error::{SyncError, SyncResult};
use crate::import::{export_world_doc, import_world_doc};
use crate::observer::{BatchReport, Inbound, PendingAttachments};
use crate::transport::{ConnectOptions, ConnectionStatus, Provider};
use relm_doc::{DEFAULT_CAPTURE_TIMEOUT, Doc, Item, TransactionBatch, UndoOptions, Update};
use relm_model::{World, WorldJson};
use relm_types::{ClientId, EntityId, NodeId, Origin};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name of the document's top-level entity sequence.
    pub entities_root: String,
    /// Local transactions closer together than this undo as one step (ms).
    pub undo_capture_timeout_ms: u64,
    /// Whether local transactions are journaled for undo.
    pub track_undo: bool,
    /// Hold attachments whose parent or child has not arrived yet instead of
    /// reporting them as unknown entities.
    pub defer_forward_references: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            entities_root: "entities".to_string(),
            undo_capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT.as_millis() as u64,
            track_undo: true,
            defer_forward_references: true,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.undo_capture_timeout_ms)
    }

    /// Journal options: local transactions only, with the configured window.
    #[must_use]
    pub fn undo_options(&self) -> UndoOptions {
        UndoOptions {
            capture_timeout: self.capture_timeout(),
            tracked_origins: vec![Origin::Local],
        }
    }
}

/// What [`WorldSync::sync_from`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The entity was shared for the first time.
    Created { node: NodeId },
    /// The entity's node was patched with these operations.
    Updated { ops: Vec<DiffOp> },
    /// The node already matched the entity.
    Unchanged,
    /// The entity no longer exists locally.
    Skipped,
}

impl SyncOutcome {
    /// Operations applied by an update; empty otherwise.
    #[must_use]
    pub fn ops(&self) -> &[DiffOp] {
        match self {
            SyncOutcome::Updated { ops } => ops,
            _ => &[],
        }
    }
}

/// Keeps a local [`World`] and a shared [`Doc`] in agreement.
pub struct WorldSync<W: World> {
    config: SyncConfig,
    doc: Doc,
    world: W,
    entities: NodeId,
    correlation: Correlation,
    pending: PendingAttachments,
    provider: Option<Box<dyn Provider>>,
}

impl<W: World> WorldSync<W> {
    /// Creates an engine over a fresh document.
    pub fn new(world: W, config: SyncConfig) -> SyncResult<Self> {
        Self::with_doc(world, Doc::new(), config)
    }

    /// Creates an engine over an existing document. Entities already in the
    /// document are not loaded until [`WorldSync::reapply_world`].
    pub fn with_doc(world: W, mut doc: Doc, config: SyncConfig) -> SyncResult<Self> {
        let entities = doc.get_or_insert_array(&config.entities_root)?;
        if config.track_undo {
            doc.enable_undo(config.undo_options());
        }
        debug!(client = %doc.client_id(), root = %config.entities_root, "world sync ready");
        Ok(Self {
            config,
            doc,
            world,
            entities,
            correlation: Correlation::new(),
            pending: PendingAttachments::new(),
            provider: None,
        })
    }

    // ── Accessors ───────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn world(&self) -> &W {
        &self.world
    }

    /// Mutable access for local edits. Follow them with [`WorldSync::sync_from`].
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    #[must_use]
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.doc.client_id()
    }

    #[must_use]
    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    #[must_use]
    pub fn pending_attachments(&self) -> &PendingAttachments {
        &self.pending
    }

    /// The document node of a synced entity.
    #[must_use]
    pub fn node_of(&self, id: &EntityId) -> Option<NodeId> {
        self.correlation.node(id)
    }

    /// Materialized document copy of a synced entity.
    #[must_use]
    pub fn get_json(&self, id: &EntityId) -> Option<Value> {
        let node = self.correlation.node(id)?;
        self.doc.materialize(node).ok()
    }

    // ── Outbound ────────────────────────────────────────────────

    /// Writes the entity's current state to the document in one transaction.
    ///
    /// An entity without a node is inserted whole; otherwise its node is
    /// diffed against the entity and patched. A destroyed entity is skipped.
    pub fn sync_from(&mut self, id: &EntityId) -> SyncResult<SyncOutcome> {
        let Some(data) = self.world.to_json(id) else {
            warn!(entity = %id, "sync requested for an entity that no longer exists");
            return Ok(SyncOutcome::Skipped);
        };
        let after = data.to_value()?;

        let outcome = match self.correlation.node(id) {
            None => {
                let root = self.entities;
                let subtree = entity_prelim(&after);
                let node = self.doc.try_transact(Origin::Local, |txn| -> SyncResult<NodeId> {
                    txn.array_push(root, vec![subtree])?
                        .into_iter()
                        .flatten()
                        .next()
                        .ok_or_else(|| SyncError::EntityNotSynced(id.clone()))
                })?;
                self.correlation.insert(id.clone(), node);
                info!(entity = %id, %node, "entity shared");
                SyncOutcome::Created { node }
            }
            Some(node) => {
                let before = self.doc.materialize(node)?;
                let ops = diff_entity(&before, &after);
                if ops.is_empty() {
                    debug!(entity = %id, "entity already in sync");
                    return Ok(SyncOutcome::Unchanged);
                }
                self.doc.try_transact(Origin::Local, |txn| {
                    ops.iter().try_for_each(|op| apply_op(txn, node, op))
                })?;
                debug!(entity = %id, ops = ops.len(), "entity patched");
                SyncOutcome::Updated { ops }
            }
        };
        self.poll();
        Ok(outcome)
    }

    /// Removes an entity and its descendants from the document and the world.
    ///
    /// Descendants go first, innermost first, all in one transaction; a
    /// surviving parent's `children` list drops the entity in the same
    /// transaction. Returns the synced entities removed, in removal order.
    pub fn delete(&mut self, id: &EntityId) -> SyncResult<Vec<EntityId>> {
        if !self.correlation.is_synced(id) {
            warn!(entity = %id, "delete requested for an entity that was never synced");
            return Ok(Vec::new());
        }
        let order = self.subtree_post_order(id);
        let nodes: Vec<NodeId> = order
            .iter()
            .filter_map(|e| self.correlation.node(e))
            .collect();
        let parent_node = self
            .world
            .parent(id)
            .and_then(|p| self.correlation.node(&p));
        let listed = Value::String(id.to_string());
        let root = self.entities;

        self.doc.try_transact(Origin::Local, |txn| -> SyncResult<()> {
            if let Some(parent) = parent_node
                && let Some(children) = txn.map_get(parent, CHILDREN)?.and_then(Item::node)
                && let Some(at) = txn
                    .array_items(children)?
                    .iter()
                    .position(|item| item.as_any() == Some(&listed))
            {
                txn.array_delete(children, at, 1)?;
            }
            for node in &nodes {
                let at = txn
                    .array_items(root)?
                    .iter()
                    .position(|item| item.node() == Some(*node));
                match at {
                    Some(at) => txn.array_delete(root, at, 1)?,
                    None => warn!(%node, "entity node already gone from the document"),
                }
            }
            Ok(())
        })?;

        let mut removed = Vec::new();
        for entity in order {
            if self.correlation.remove_entity(&entity).is_some() {
                removed.push(entity.clone());
            }
            self.pending.forget(&entity);
            self.world.destroy(&entity);
        }
        info!(entity = %id, removed = removed.len(), "entity deleted");
        self.poll();
        Ok(removed)
    }

    fn subtree_post_order(&self, id: &EntityId) -> Vec<EntityId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        self.collect_post_order(id, &mut order, &mut seen);
        order
    }

    fn collect_post_order(
        &self,
        id: &EntityId,
        order: &mut Vec<EntityId>,
        seen: &mut HashSet<EntityId>,
    ) {
        if !seen.insert(id.clone()) {
            return;
        }
        for child in self.world.children(id) {
            self.collect_post_order(&child, order, seen);
        }
        order.push(id.clone());
    }

    // ── Inbound ─────────────────────────────────────────────────

    /// Drains the document's committed batches and applies them to the world.
    /// Local batches come back marked as ignored.
    pub fn poll(&mut self) -> Vec<BatchReport> {
        let batches = self.doc.take_batches();
        batches
            .iter()
            .map(|batch| self.observe_batch(batch))
            .collect()
    }

    /// Runs one batch through the inbound path.
    pub fn observe_batch(&mut self, batch: &TransactionBatch) -> BatchReport {
        Inbound::new(
            &mut self.world,
            &self.doc,
            &mut self.correlation,
            &mut self.pending,
            &self.config,
            batch.origin,
        )
        .observe(batch)
    }

    /// Applies a peer's update and observes the result.
    pub fn apply_update(&mut self, update: &Update) -> SyncResult<Vec<BatchReport>> {
        self.doc.apply_update(update)?;
        Ok(self.poll())
    }

    /// [`WorldSync::apply_update`] for an update still in wire form.
    pub fn apply_encoded(&mut self, bytes: &[u8]) -> SyncResult<Vec<BatchReport>> {
        let update = Update::decode(bytes)?;
        self.apply_update(&update)
    }

    /// Drains the updates to ship to peers.
    pub fn take_updates(&mut self) -> Vec<Update> {
        self.doc.take_updates()
    }

    /// Loads every entity node of the document into the world: known entities
    /// are overwritten, unknown ones created, then the hierarchy is linked.
    pub fn reapply_world(&mut self) -> SyncResult<BatchReport> {
        let nodes: Vec<NodeId> = self
            .doc
            .array_items(self.entities)?
            .iter()
            .filter_map(Item::node)
            .collect();
        info!(entities = nodes.len(), "reapplying world from document");
        Ok(Inbound::new(
            &mut self.world,
            &self.doc,
            &mut self.correlation,
            &mut self.pending,
            &self.config,
            Origin::Import,
        )
        .reapply(&nodes))
    }

    // ── Undo ────────────────────────────────────────────────────

    /// Reverts the last undo step; the replay is observed like any other
    /// document change. Empty when there was nothing to undo.
    pub fn undo(&mut self) -> SyncResult<Vec<BatchReport>> {
        if !self.doc.undo()? {
            debug!("nothing to undo");
            return Ok(Vec::new());
        }
        Ok(self.poll())
    }

    /// Re-applies the last undone step.
    pub fn redo(&mut self) -> SyncResult<Vec<BatchReport>> {
        if !self.doc.redo()? {
            debug!("nothing to redo");
            return Ok(Vec::new());
        }
        Ok(self.poll())
    }

    /// Ends the current undo step; the next local change starts a new one.
    pub fn stop_capturing(&mut self) {
        self.doc.stop_capturing();
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.doc.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.doc.can_redo()
    }

    // ── Import / export ─────────────────────────────────────────

    /// Seeds the document from an exported world and observes the result.
    pub fn import_world(&mut self, world: &WorldJson) -> SyncResult<Vec<BatchReport>> {
        import_world_doc(&mut self.doc, &self.config.entities_root, world)?;
        Ok(self.poll())
    }

    pub fn export_world(&self) -> SyncResult<WorldJson> {
        export_world_doc(&self.doc, &self.config.entities_root)
    }

    // ── Transport ───────────────────────────────────────────────

    /// Installs the provider connect/disconnect requests are forwarded to.
    pub fn set_provider(&mut self, provider: impl Provider + 'static) {
        self.provider = Some(Box::new(provider));
    }

    pub fn connect(&mut self, options: &ConnectOptions) -> SyncResult<()> {
        let provider = self
            .provider
            .as_mut()
            .ok_or_else(|| SyncError::Transport("no provider installed".into()))?;
        info!(url = %options.url, room = %options.room, "connecting");
        provider.connect(options)
    }

    pub fn disconnect(&mut self) -> SyncResult<()> {
        match self.provider.as_mut() {
            Some(provider) => {
                info!("disconnecting");
                provider.disconnect()
            }
            None => Ok(()),
        }
    }

    /// The provider's status; `Disconnected` without one.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.provider
            .as_ref()
            .map_or(ConnectionStatus::Disconnected, |p| p.status())
    }
}
