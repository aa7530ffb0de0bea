//! Workflow error taxonomy.

use chrono::{DateTime, Utc};
use signflow_storage::{StorageError, PENDING_INVITATION_INDEX, REFERENCE_INDEX, TOKEN_INDEX};
use signflow_types::{
    DocumentId, DocumentStatus, InvitationId, InvitationStatus, SignatureStatus, Team,
    TransitionError, UserId,
};
use thiserror::Error;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Error class surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Conflict,
    State,
    NotFound,
    Authorization,
    ExternalService,
    /// Loss of the underlying store. The only fatal class.
    Storage,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("document reference {0:?} is already in use")]
    DuplicateReference(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("document {document_id} changed: expected revision {expected}, found {found}")]
    StaleRevision {
        document_id: DocumentId,
        expected: u64,
        found: u64,
    },

    #[error("document {document_id} gave up after {attempts} contended attempts")]
    ContentionExhausted {
        document_id: DocumentId,
        attempts: u32,
    },

    #[error("cannot {action} document {document_id} while it is {status}")]
    InvalidState {
        document_id: DocumentId,
        status: DocumentStatus,
        action: &'static str,
    },

    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("{user_id} is not a contributor of {document_id} in {team}")]
    NotAContributor {
        document_id: DocumentId,
        user_id: UserId,
        team: Team,
    },

    #[error("{team} cannot sign while the document is {status}")]
    WrongTier { team: Team, status: DocumentStatus },

    #[error("{user_id} has already {status} in {team} this round")]
    AlreadySigned {
        user_id: UserId,
        team: Team,
        status: SignatureStatus,
    },

    #[error("{user_id} is not enlisted in {team} this round")]
    NotEnlisted { user_id: UserId, team: Team },

    #[error("invitation token not found")]
    TokenNotFound,

    #[error("invitation {invitation_id} expired at {expired_at}")]
    TokenExpired {
        invitation_id: InvitationId,
        expired_at: DateTime<Utc>,
    },

    #[error("invitation {invitation_id} is already {status}")]
    AlreadyUsed {
        invitation_id: InvitationId,
        status: InvitationStatus,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Authorization(String),

    #[error("external service failed: {0}")]
    ExternalService(String),

    #[error("storage failure: {0}")]
    Storage(#[source] StorageError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::DuplicateReference(_)
            | WorkflowError::Conflict(_)
            | WorkflowError::StaleRevision { .. }
            | WorkflowError::ContentionExhausted { .. }
            | WorkflowError::AlreadyUsed { .. } => ErrorKind::Conflict,
            WorkflowError::InvalidState { .. }
            | WorkflowError::IllegalTransition(_)
            | WorkflowError::WrongTier { .. }
            | WorkflowError::AlreadySigned { .. }
            | WorkflowError::NotEnlisted { .. }
            | WorkflowError::TokenExpired { .. } => ErrorKind::State,
            WorkflowError::NotFound(_) | WorkflowError::TokenNotFound => ErrorKind::NotFound,
            WorkflowError::NotAContributor { .. } | WorkflowError::Authorization(_) => {
                ErrorKind::Authorization
            }
            WorkflowError::ExternalService(_) => ErrorKind::ExternalService,
            WorkflowError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "VALIDATION",
            WorkflowError::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            WorkflowError::Conflict(_) => "CONFLICT",
            WorkflowError::StaleRevision { .. } => "STALE_REVISION",
            WorkflowError::ContentionExhausted { .. } => "CONTENTION_EXHAUSTED",
            WorkflowError::InvalidState { .. } => "INVALID_STATE",
            WorkflowError::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            WorkflowError::NotAContributor { .. } => "NOT_A_CONTRIBUTOR",
            WorkflowError::WrongTier { .. } => "WRONG_TIER",
            WorkflowError::AlreadySigned { .. } => "ALREADY_SIGNED",
            WorkflowError::NotEnlisted { .. } => "NOT_ENLISTED",
            WorkflowError::TokenNotFound => "TOKEN_NOT_FOUND",
            WorkflowError::TokenExpired { .. } => "TOKEN_EXPIRED",
            WorkflowError::AlreadyUsed { .. } => "ALREADY_USED",
            WorkflowError::NotFound(_) => "NOT_FOUND",
            WorkflowError::Authorization(_) => "FORBIDDEN",
            WorkflowError::ExternalService(_) => "EXTERNAL_SERVICE",
            WorkflowError::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => WorkflowError::NotFound(what),
            StorageError::Conflict(what) | StorageError::PreconditionFailed(what) => {
                WorkflowError::Conflict(what)
            }
            StorageError::DuplicateKey { index, key } if index == REFERENCE_INDEX => {
                WorkflowError::DuplicateReference(key)
            }
            StorageError::DuplicateKey { index, key } if index == PENDING_INVITATION_INDEX => {
                WorkflowError::Conflict(format!("a pending invitation already exists for {key}"))
            }
            StorageError::DuplicateKey { index, key } if index == TOKEN_INDEX => {
                WorkflowError::Conflict(format!("invitation token collision on {key}"))
            }
            StorageError::DuplicateKey { index, key } => {
                WorkflowError::Conflict(format!("duplicate {key} in {index}"))
            }
            StorageError::RevisionConflict {
                document_id,
                expected,
                found,
            } => WorkflowError::StaleRevision {
                document_id,
                expected,
                found,
            },
            StorageError::InvalidInput(what) => WorkflowError::Validation(what),
            other @ (StorageError::Serialization(_) | StorageError::Backend(_)) => {
                WorkflowError::Storage(other)
            }
        }
    }
}
