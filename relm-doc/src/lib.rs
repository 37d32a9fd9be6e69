//! Shared document for relm world sync.
//!
//! A [`Doc`] is a tree of map and array nodes hanging off named roots, with
//! the transaction and observation surface of a Yjs document:
//!
//! - [`Doc::transact`] runs an atomic, origin-tagged transaction
//! - every commit queues a [`TransactionBatch`] of deep [`DocEvent`]s carrying
//!   the path and ancestor ids of each changed node
//! - non-remote commits queue an [`Update`] for the transport, which
//!   [`Doc::apply_update`] replays on another replica
//! - [`Doc::undo`] and [`Doc::redo`] replay the journal kept by an
//!   [`UndoManager`]
//!
//! Concurrent edits merge: arrays are replicated growable arrays addressed by
//! slot id, map keys are last-writer-wins registers, and updates are held
//! back until the updates they depend on have arrived. Replicas that have
//! integrated the same updates hold the same tree, in whatever order the
//! updates were delivered.

mod content;
mod doc;
mod error;
mod event;
mod state;
mod transaction;
mod undo;
mod update;

pub use content::{Content, Item, Prelim, SlotContent};
pub use doc::Doc;
pub use error::{DocError, DocResult};
pub use event::{
    ArrayDelta, DocEvent, EntryChange, EventChange, InsertedItem, RemovedItem, TransactionBatch,
};
pub use state::StateVector;
pub use transaction::TransactionMut;
pub use undo::{DEFAULT_CAPTURE_TIMEOUT, UndoManager, UndoOptions};
pub use update::{RootKind, Target, Update, UpdateOp};
