//! Error types for the sync layer.

use relm_doc::DocError;
use relm_model::{DecodeError, WorldError};
use relm_types::{EntityId, Path};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing a world with its document.
///
/// [`SyncError::is_fatal`] splits them into conditions a peer can cause by
/// racing us (logged and skipped) and violations of the document layout this
/// engine owns (logged as errors, the offending event dropped).
#[derive(Debug, Error)]
pub enum SyncError {
    /// An event referenced an entity this replica does not know.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// An event referenced a component the entity or registry does not have.
    #[error("entity {entity} has no component {component}")]
    UnknownComponent { entity: EntityId, component: String },

    /// The entity has no document node, or no longer exists locally.
    #[error("entity not synced: {0}")]
    EntityNotSynced(EntityId),

    /// An attribute update named a key the entity layout does not have.
    #[error("unknown entity attribute: {0}")]
    UnknownAttribute(String),

    /// An operation or event path matches no known layout position.
    #[error("unrecognized document path: {0}")]
    UnrecognizedPath(Path),

    /// A property value failed its type's decoder.
    #[error("{component}.{property}: {source}")]
    Decode {
        component: String,
        property: String,
        #[source]
        source: DecodeError,
    },

    /// A diff operation could not be applied to the document.
    #[error("cannot apply {path}: {reason}")]
    Apply { path: Path, reason: String },

    #[error("document error: {0}")]
    Doc(#[from] DocError),

    #[error("world error: {0}")]
    World(#[from] WorldError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport provider refused a request.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SyncError {
    /// True for layout violations and failures that must not be silently
    /// skipped; false for races with peers.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::UnknownEntity(_)
                | SyncError::UnknownComponent { .. }
                | SyncError::EntityNotSynced(_)
                | SyncError::World(
                    WorldError::EntityNotFound(_) | WorldError::ComponentNotFound { .. }
                )
        )
    }
}
