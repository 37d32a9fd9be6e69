//! Bidirectional sync between a local relm world and its shared document.
//!
//! A [`WorldSync`] owns a [`World`](relm_model::World) and a
//! [`Doc`](relm_doc::Doc) and keeps them in agreement:
//!
//! - **Outbound**: after a local edit, [`WorldSync::sync_from`] diffs the
//!   entity against its document node and applies the difference as one
//!   local transaction. New entities are inserted whole.
//! - **Inbound**: every transaction the document commits that did not
//!   originate locally (peer updates, undo/redo, imports) is translated into
//!   world mutations. Local transactions are ignored, so nothing echoes.
//! - **Undo**: local transactions are journaled by the document; undoing one
//!   replays the inverse through the inbound path.
//!
//! # Document layout
//!
//! ```text
//! entities: [
//!   { id, name, parent, children: [id, ...],
//!     components: [ { name, values: { key: value, ... } }, ... ] },
//!   ...
//! ]
//! ```
//!
//! # Example
//!
//! ```
//! use relm_model::{ComponentRegistry, MemoryWorld, PropertyValue, Vec3, World};
//! use relm_sync::{SyncConfig, SyncOutcome, WorldSync};
//!
//! let mut world = MemoryWorld::new(ComponentRegistry::core());
//! let id = world.spawn("Box");
//! world.insert_component(&id, "Transform").unwrap();
//!
//! let mut sync = WorldSync::new(world, SyncConfig::default()).unwrap();
//! assert!(matches!(sync.sync_from(&id).unwrap(), SyncOutcome::Created { .. }));
//!
//! sync.world_mut()
//!     .set_property(&id, "Transform", "position", PropertyValue::Vector3(Vec3::new(1.0, 2.0, 3.0)))
//!     .unwrap();
//! assert_eq!(sync.sync_from(&id).unwrap().ops().len(), 1);
//! ```

pub mod applicator;
mod correlation;
pub mod diff;
mod engine;
mod error;
pub mod import;
mod observer;
pub mod transport;

pub use applicator::{OpTarget, apply_op, classify};
pub use correlation::Correlation;
pub use diff::{DiffOp, OpKind, diff_entity};
pub use engine::{SyncConfig, SyncOutcome, WorldSync};
pub use error::{SyncError, SyncResult};
pub use import::{export_world_doc, import_world_doc};
pub use observer::{BatchReport, PendingAttachments, SyncEvent};
pub use transport::{ConnectOptions, ConnectionStatus, Provider};
