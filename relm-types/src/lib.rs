//! Core type definitions for the relm world-sync engine.
//!
//! This crate defines the small vocabulary shared by every layer:
//! - Entity identifiers (stable strings, UUID v7 when minted locally)
//! - Replica client ids and document node ids (`client:clock`)
//! - Transaction origins (local, remote, undo, redo, import)
//! - Document paths (sequences of map keys and array indices)

mod ids;
mod origin;
mod path;

pub use ids::{ClientId, EntityId, NodeId};
pub use origin::Origin;
pub use path::{Path, PathSegment};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
}
