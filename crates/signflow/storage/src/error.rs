use signflow_types::DocumentId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A unique index already holds `key`.
    #[error("duplicate key {key:?} in {index}")]
    DuplicateKey { index: &'static str, key: String },

    /// Compare-and-swap on a document revision lost the race.
    #[error("revision conflict on {document_id}: expected {expected}, found {found}")]
    RevisionConflict {
        document_id: DocumentId,
        expected: u64,
        found: u64,
    },

    /// A conditional update found the record in a different state.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}
