//! Error types for the document layer.

use relm_types::NodeId;
use thiserror::Error;

/// Result type for document operations.
pub type DocResult<T> = Result<T, DocError>;

/// Errors that can occur while reading or mutating a document.
#[derive(Debug, Error)]
pub enum DocError {
    /// The addressed node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node {0} is not a map")]
    NotAMap(NodeId),

    #[error("node {0} is not an array")]
    NotAnArray(NodeId),

    #[error("index {index} out of bounds for array {node} of length {len}")]
    IndexOutOfBounds { node: NodeId, index: usize, len: usize },

    /// An operation anchored on or deleted a slot this replica never saw.
    #[error("array {array} has no slot {slot}")]
    UnknownSlot { array: NodeId, slot: NodeId },

    /// An update tried to create a node whose id is already live.
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// A root was requested as a different kind than it was created with.
    #[error("root {name} already exists with a different kind")]
    RootKindMismatch { name: String },

    /// Update encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
