//! Undo/redo journal.
//!
//! Every tracked transaction records the inverse of its primitive edits.
//! Transactions committed within `capture_timeout` of the previous one are
//! coalesced into a single undo step. Undo replays a step's inverses, newest
//! first, in an [`Origin::Undo`] transaction whose own inverses become the
//! matching redo step.
//!
//! Inverses are addressed by node and slot id, never by index: undoing an
//! insert tombstones exactly the slots it created, undoing a delete puts the
//! content back next to the slot it used to follow, and a key is restored
//! only while no peer has written it since. Peer edits made in between
//! survive the undo.

use crate::content::Prelim;
use crate::doc::Doc;
use crate::error::DocResult;
use relm_types::{NodeId, Origin};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default coalescing window.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(50);

/// Journal configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoOptions {
    /// Transactions closer together than this merge into one undo step.
    pub capture_timeout: Duration,
    /// Origins whose transactions are journaled.
    pub tracked_origins: Vec<Origin>,
}

impl Default for UndoOptions {
    fn default() -> Self {
        Self {
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            tracked_origins: vec![Origin::Local],
        }
    }
}

/// Inverse of one primitive edit.
#[derive(Debug, Clone)]
pub(crate) enum InverseOp {
    /// Put a key back to its previous value, or remove it if it was absent.
    MapRestore {
        map: NodeId,
        key: String,
        value: Option<Prelim>,
    },
    /// Tombstone slots that were inserted.
    ArrayRemove { array: NodeId, slots: Vec<NodeId> },
    /// Re-insert a deleted slot after the slot that preceded it.
    ArrayReinsert {
        array: NodeId,
        origin: Option<NodeId>,
        slot: NodeId,
        item: Prelim,
    },
}

impl InverseOp {
    pub(crate) fn restores(&self, map: NodeId, key: &str) -> bool {
        matches!(self, InverseOp::MapRestore { map: m, key: k, .. } if *m == map && k == key)
    }
}

#[derive(Debug)]
struct StackItem {
    ops: Vec<InverseOp>,
    last_change: Instant,
}

impl StackItem {
    /// Appends a later transaction's inverses. A key already restored by this
    /// step keeps its oldest value.
    fn absorb(&mut self, ops: Vec<InverseOp>, now: Instant) {
        for op in ops {
            if let InverseOp::MapRestore { map, key, .. } = &op
                && self.ops.iter().any(|o| o.restores(*map, key))
            {
                continue;
            }
            self.ops.push(op);
        }
        self.last_change = now;
    }
}

/// Undo and redo stacks of one document.
#[derive(Debug)]
pub struct UndoManager {
    options: UndoOptions,
    undo_stack: Vec<StackItem>,
    redo_stack: Vec<StackItem>,
    capturing: bool,
}

impl UndoManager {
    #[must_use]
    pub fn new(options: UndoOptions) -> Self {
        Self {
            options,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            capturing: true,
        }
    }

    #[must_use]
    pub fn options(&self) -> &UndoOptions {
        &self.options
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Makes the next tracked transaction start a new step.
    pub fn stop_capturing(&mut self) {
        self.capturing = false;
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub(crate) fn record(&mut self, origin: Origin, ops: Vec<InverseOp>, now: Instant) {
        if ops.is_empty() {
            return;
        }
        let item = StackItem {
            ops,
            last_change: now,
        };
        match origin {
            Origin::Undo => self.redo_stack.push(item),
            Origin::Redo => self.undo_stack.push(item),
            tracked if self.options.tracked_origins.contains(&tracked) => {
                self.redo_stack.clear();
                match self.undo_stack.last_mut() {
                    Some(top)
                        if self.capturing
                            && now.duration_since(top.last_change)
                                < self.options.capture_timeout =>
                    {
                        top.absorb(item.ops, now);
                    }
                    _ => self.undo_stack.push(item),
                }
                self.capturing = true;
            }
            _ => {}
        }
    }
}

impl Doc {
    /// Reverts the most recent undo step. Returns false if there was none.
    pub fn undo(&mut self) -> DocResult<bool> {
        self.replay(Origin::Undo)
    }

    /// Re-applies the most recently undone step. Returns false if there was none.
    pub fn redo(&mut self) -> DocResult<bool> {
        self.replay(Origin::Redo)
    }

    fn replay(&mut self, origin: Origin) -> DocResult<bool> {
        let Some(undo) = self.undo.as_mut() else {
            return Ok(false);
        };
        let stack = match origin {
            Origin::Undo => &mut undo.undo_stack,
            _ => &mut undo.redo_stack,
        };
        let Some(item) = stack.pop() else {
            return Ok(false);
        };
        debug!(%origin, ops = item.ops.len(), "replaying journal step");
        self.transact(origin, |txn| {
            for op in item.ops.into_iter().rev() {
                if let Err(e) = txn.apply_inverse(op) {
                    warn!(%origin, error = %e, "skipping journal op");
                }
            }
            Ok(())
        })?;
        self.stop_capturing();
        Ok(true)
    }
}
