use crate::batch::{CommitReceipt, WriteBatch};
use crate::StorageResult;
use async_trait::async_trait;
use signflow_types::{
    ActivityAppend, ActivityEvent, Document, DocumentId, ExportJob, ExportJobId, Invitation,
    InvitationId, InvitationToken, Permission, PermissionKind, SnapshotId, UserId,
    VersionSnapshot,
};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    /// No limit, no offset.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// Atomic multi-record writes.
///
/// Every mutation of documents, invitations, permissions and versions goes
/// through `commit`, so the preconditions carried by a batch (revision,
/// invitation status, unique indexes) are checked and applied as one unit.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Apply every op in order, or none of them.
    async fn commit(&self, batch: WriteBatch) -> StorageResult<CommitReceipt>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, document_id: &DocumentId) -> StorageResult<Option<Document>>;

    async fn find_document_by_reference(&self, reference: &str)
        -> StorageResult<Option<Document>>;

    /// List documents, most recently updated first.
    async fn list_documents(&self, window: QueryWindow) -> StorageResult<Vec<Document>>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn get_invitation(&self, invitation_id: &InvitationId)
        -> StorageResult<Option<Invitation>>;

    async fn find_invitation_by_token(
        &self,
        token: &InvitationToken,
    ) -> StorageResult<Option<Invitation>>;

    /// Invitations of one document, newest first.
    async fn list_invitations(&self, document_id: &DocumentId) -> StorageResult<Vec<Invitation>>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn get_permission(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
    ) -> StorageResult<Option<Permission>>;

    async fn list_permissions(&self, document_id: &DocumentId) -> StorageResult<Vec<Permission>>;

    async fn list_user_permissions(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
    ) -> StorageResult<Vec<Permission>>;
}

/// Read side of the append-only version history. There is no update or
/// delete; snapshots are written through [`TransactionalStore::commit`].
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Snapshots of one document, newest first.
    async fn list_versions(
        &self,
        document_id: &DocumentId,
        window: QueryWindow,
    ) -> StorageResult<Vec<VersionSnapshot>>;

    async fn get_version(&self, snapshot_id: &SnapshotId)
        -> StorageResult<Option<VersionSnapshot>>;
}

/// Append-only, hash-linked activity log.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Append a standalone event outside any batch.
    async fn append_activity(&self, event: ActivityAppend) -> StorageResult<ActivityEvent>;

    /// Read events newest-first, optionally restricted to one document.
    async fn list_activity(
        &self,
        document_id: Option<&DocumentId>,
        window: QueryWindow,
    ) -> StorageResult<Vec<ActivityEvent>>;
}

#[async_trait]
pub trait ExportStore: Send + Sync {
    async fn get_export(&self, job_id: &ExportJobId) -> StorageResult<Option<ExportJob>>;
}

/// Unified storage bundle consumed by the workflow engine.
pub trait SignflowStorage:
    TransactionalStore
    + DocumentStore
    + InvitationStore
    + PermissionStore
    + SnapshotStore
    + ActivityStore
    + ExportStore
    + Send
    + Sync
{
}

impl<T> SignflowStorage for T where
    T: TransactionalStore
        + DocumentStore
        + InvitationStore
        + PermissionStore
        + SnapshotStore
        + ActivityStore
        + ExportStore
        + Send
        + Sync
{
}
