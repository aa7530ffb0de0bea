//! In-memory reference implementation of the signflow storage traits.
//!
//! This adapter is deterministic and test-friendly. All tables sit behind a
//! single lock. A commit applies its ops in place and keeps an undo entry per
//! applied op; when an op fails the entries are replayed in reverse, so a
//! failed batch leaves no trace.

use crate::batch::{
    CommitReceipt, WriteBatch, WriteOp, PENDING_INVITATION_INDEX, REFERENCE_INDEX, TOKEN_INDEX,
};
use crate::chain::compute_activity_hash;
use crate::traits::{
    ActivityStore, DocumentStore, ExportStore, InvitationStore, PermissionStore, QueryWindow,
    SnapshotStore, TransactionalStore,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use signflow_types::{
    ActivityAppend, ActivityEvent, Document, DocumentId, ExportJob, ExportJobId, Invitation,
    InvitationId, InvitationStatus, InvitationToken, Permission, PermissionKind, SnapshotId,
    UserId, VersionSnapshot,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

type PermissionKey = (DocumentId, UserId, PermissionKind);

#[derive(Debug, Default)]
struct Tables {
    documents: HashMap<DocumentId, Document>,
    references: HashMap<String, DocumentId>,
    invitations: Vec<Invitation>,
    invitation_index: HashMap<InvitationId, usize>,
    tokens: HashMap<InvitationToken, usize>,
    permissions: HashMap<PermissionKey, Permission>,
    versions: Vec<VersionSnapshot>,
    exports: Vec<ExportJob>,
    export_index: HashMap<ExportJobId, usize>,
    activity: Vec<ActivityEvent>,
}

/// Inverse of one applied [`WriteOp`].
enum Undo {
    RemoveDocument(DocumentId),
    RestoreDocument(Document),
    PopInvitation,
    RestoreInvitation { index: usize, previous: Invitation },
    RestorePermission {
        key: PermissionKey,
        previous: Option<Permission>,
    },
    PopVersion,
    PopExport,
    RestoreExport { index: usize, previous: ExportJob },
    PopActivity,
}

/// In-memory signflow storage adapter.
#[derive(Default)]
pub struct InMemorySignflowStorage {
    tables: RwLock<Tables>,
}

impl InMemorySignflowStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::Backend("signflow tables lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::Backend("signflow tables lock poisoned".to_string()))
    }
}

impl Tables {
    fn apply(&mut self, op: WriteOp, receipt: &mut CommitReceipt) -> StorageResult<Undo> {
        match op {
            WriteOp::InsertDocument(document) => self.insert_document(document),
            WriteOp::ReplaceDocument {
                document,
                expected_revision,
            } => self.replace_document(document, expected_revision),
            WriteOp::InsertInvitation(invitation) => self.insert_invitation(invitation),
            WriteOp::UpdateInvitation {
                invitation,
                expected_status,
            } => self.update_invitation(invitation, expected_status),
            WriteOp::UpsertPermission(permission) => {
                let key = (
                    permission.document_id,
                    permission.user_id.clone(),
                    permission.kind,
                );
                let previous = self.permissions.insert(key.clone(), permission);
                Ok(Undo::RestorePermission { key, previous })
            }
            WriteOp::AppendVersion(snapshot) => {
                if self.versions.iter().any(|v| v.id() == snapshot.id()) {
                    return Err(StorageError::Conflict(format!(
                        "snapshot {} already exists",
                        snapshot.id()
                    )));
                }
                self.versions.push(snapshot);
                Ok(Undo::PopVersion)
            }
            WriteOp::InsertExport(job) => {
                if self.export_index.contains_key(&job.id) {
                    return Err(StorageError::Conflict(format!(
                        "export {} already exists",
                        job.id
                    )));
                }
                self.export_index.insert(job.id, self.exports.len());
                self.exports.push(job);
                Ok(Undo::PopExport)
            }
            WriteOp::UpdateExport {
                job,
                expected_status,
            } => {
                let index = *self
                    .export_index
                    .get(&job.id)
                    .ok_or_else(|| StorageError::NotFound(format!("export {} not found", job.id)))?;
                let current = &mut self.exports[index];
                if current.status != expected_status {
                    return Err(StorageError::PreconditionFailed(format!(
                        "export {} is {:?}, expected {:?}",
                        job.id, current.status, expected_status
                    )));
                }
                let previous = std::mem::replace(current, job);
                Ok(Undo::RestoreExport { index, previous })
            }
            WriteOp::AppendActivity(event) => {
                let stored = self.append_activity(event)?;
                receipt.activity.push(stored);
                Ok(Undo::PopActivity)
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveDocument(document_id) => {
                if let Some(document) = self.documents.remove(&document_id) {
                    self.references.remove(&document.reference);
                }
            }
            Undo::RestoreDocument(document) => {
                self.documents.insert(document.id, document);
            }
            Undo::PopInvitation => {
                if let Some(invitation) = self.invitations.pop() {
                    self.invitation_index.remove(&invitation.id);
                    self.tokens.remove(&invitation.token);
                }
            }
            Undo::RestoreInvitation { index, previous } => {
                let current = std::mem::replace(&mut self.invitations[index], previous);
                if current.token != self.invitations[index].token {
                    self.tokens.remove(&current.token);
                    self.tokens
                        .insert(self.invitations[index].token.clone(), index);
                }
            }
            Undo::RestorePermission { key, previous } => match previous {
                Some(permission) => {
                    self.permissions.insert(key, permission);
                }
                None => {
                    self.permissions.remove(&key);
                }
            },
            Undo::PopVersion => {
                self.versions.pop();
            }
            Undo::PopExport => {
                if let Some(job) = self.exports.pop() {
                    self.export_index.remove(&job.id);
                }
            }
            Undo::RestoreExport { index, previous } => {
                self.exports[index] = previous;
            }
            Undo::PopActivity => {
                self.activity.pop();
            }
        }
    }

    fn insert_document(&mut self, document: Document) -> StorageResult<Undo> {
        if self.documents.contains_key(&document.id) {
            return Err(StorageError::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        if self.references.contains_key(&document.reference) {
            return Err(StorageError::DuplicateKey {
                index: REFERENCE_INDEX,
                key: document.reference.clone(),
            });
        }
        let document_id = document.id;
        self.references.insert(document.reference.clone(), document_id);
        self.documents.insert(document_id, document);
        Ok(Undo::RemoveDocument(document_id))
    }

    fn replace_document(
        &mut self,
        document: Document,
        expected_revision: u64,
    ) -> StorageResult<Undo> {
        let current = self
            .documents
            .get(&document.id)
            .ok_or_else(|| StorageError::NotFound(format!("document {} not found", document.id)))?;

        if current.revision != expected_revision {
            return Err(StorageError::RevisionConflict {
                document_id: document.id,
                expected: expected_revision,
                found: current.revision,
            });
        }
        if document.revision != expected_revision + 1 {
            return Err(StorageError::InvalidInput(format!(
                "replacement for {} must carry revision {}, got {}",
                document.id,
                expected_revision + 1,
                document.revision
            )));
        }
        if current.reference != document.reference {
            return Err(StorageError::InvalidInput(format!(
                "reference of {} is immutable",
                document.id
            )));
        }

        match self.documents.insert(document.id, document) {
            Some(previous) => Ok(Undo::RestoreDocument(previous)),
            None => Err(StorageError::Backend(
                "document vanished during replace".to_string(),
            )),
        }
    }

    fn insert_invitation(&mut self, invitation: Invitation) -> StorageResult<Undo> {
        if self.invitation_index.contains_key(&invitation.id) {
            return Err(StorageError::Conflict(format!(
                "invitation {} already exists",
                invitation.id
            )));
        }
        if self.tokens.contains_key(&invitation.token) {
            return Err(StorageError::DuplicateKey {
                index: TOKEN_INDEX,
                key: invitation.id.to_string(),
            });
        }
        let live_duplicate = self.invitations.iter().any(|existing| {
            existing.document_id == invitation.document_id
                && existing.invitee_email == invitation.invitee_email
                && existing.is_live(invitation.sent_at)
        });
        if live_duplicate {
            return Err(StorageError::DuplicateKey {
                index: PENDING_INVITATION_INDEX,
                key: invitation.invitee_email.clone(),
            });
        }

        let index = self.invitations.len();
        self.invitation_index.insert(invitation.id, index);
        self.tokens.insert(invitation.token.clone(), index);
        self.invitations.push(invitation);
        Ok(Undo::PopInvitation)
    }

    fn update_invitation(
        &mut self,
        invitation: Invitation,
        expected_status: InvitationStatus,
    ) -> StorageResult<Undo> {
        let index = *self.invitation_index.get(&invitation.id).ok_or_else(|| {
            StorageError::NotFound(format!("invitation {} not found", invitation.id))
        })?;

        let current = &self.invitations[index];
        if current.status != expected_status {
            return Err(StorageError::PreconditionFailed(format!(
                "invitation {} is {}, expected {}",
                invitation.id, current.status, expected_status
            )));
        }
        if current.document_id != invitation.document_id {
            return Err(StorageError::InvalidInput(format!(
                "invitation {} cannot move between documents",
                invitation.id
            )));
        }

        if current.token != invitation.token {
            if self.tokens.contains_key(&invitation.token) {
                return Err(StorageError::DuplicateKey {
                    index: TOKEN_INDEX,
                    key: invitation.id.to_string(),
                });
            }
            let old_token = current.token.clone();
            self.tokens.remove(&old_token);
            self.tokens.insert(invitation.token.clone(), index);
        }

        let previous = std::mem::replace(&mut self.invitations[index], invitation);
        Ok(Undo::RestoreInvitation { index, previous })
    }

    fn append_activity(&mut self, event: ActivityAppend) -> StorageResult<ActivityEvent> {
        let previous_hash = self.activity.last().map(|e| e.hash.clone());
        let sequence = self.activity.len() as u64 + 1;
        let hash = compute_activity_hash(&event, previous_hash.as_deref(), sequence)?;

        let record = ActivityEvent {
            event_id: format!("activity-{}", Uuid::new_v4()),
            sequence,
            timestamp: event.timestamp,
            actor: event.actor,
            action: event.action,
            document_id: event.document_id,
            description: event.description,
            success: event.success,
            details: event.details,
            previous_hash,
            hash,
        };
        self.activity.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl TransactionalStore for InMemorySignflowStorage {
    async fn commit(&self, batch: WriteBatch) -> StorageResult<CommitReceipt> {
        let mut guard = self.write()?;
        let tables = &mut *guard;
        let mut receipt = CommitReceipt::default();
        let mut undo_log = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            match tables.apply(op, &mut receipt) {
                Ok(undo) => undo_log.push(undo),
                Err(err) => {
                    while let Some(undo) = undo_log.pop() {
                        tables.revert(undo);
                    }
                    return Err(err);
                }
            }
        }
        Ok(receipt)
    }
}

#[async_trait]
impl DocumentStore for InMemorySignflowStorage {
    async fn get_document(&self, document_id: &DocumentId) -> StorageResult<Option<Document>> {
        Ok(self.read()?.documents.get(document_id).cloned())
    }

    async fn find_document_by_reference(
        &self,
        reference: &str,
    ) -> StorageResult<Option<Document>> {
        let guard = self.read()?;
        Ok(guard
            .references
            .get(reference)
            .and_then(|id| guard.documents.get(id))
            .cloned())
    }

    async fn list_documents(&self, window: QueryWindow) -> StorageResult<Vec<Document>> {
        let guard = self.read()?;
        let mut values = guard.documents.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl InvitationStore for InMemorySignflowStorage {
    async fn get_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> StorageResult<Option<Invitation>> {
        let guard = self.read()?;
        Ok(guard
            .invitation_index
            .get(invitation_id)
            .map(|index| guard.invitations[*index].clone()))
    }

    async fn find_invitation_by_token(
        &self,
        token: &InvitationToken,
    ) -> StorageResult<Option<Invitation>> {
        let guard = self.read()?;
        Ok(guard
            .tokens
            .get(token)
            .map(|index| guard.invitations[*index].clone()))
    }

    async fn list_invitations(&self, document_id: &DocumentId) -> StorageResult<Vec<Invitation>> {
        let guard = self.read()?;
        Ok(guard
            .invitations
            .iter()
            .rev()
            .filter(|inv| &inv.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PermissionStore for InMemorySignflowStorage {
    async fn get_permission(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
    ) -> StorageResult<Option<Permission>> {
        let guard = self.read()?;
        Ok(guard
            .permissions
            .get(&(*document_id, user_id.clone(), kind))
            .cloned())
    }

    async fn list_permissions(&self, document_id: &DocumentId) -> StorageResult<Vec<Permission>> {
        let guard = self.read()?;
        let mut values = guard
            .permissions
            .values()
            .filter(|p| &p.document_id == document_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.user_id.cmp(&b.user_id).then(a.kind.cmp(&b.kind)));
        Ok(values)
    }

    async fn list_user_permissions(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
    ) -> StorageResult<Vec<Permission>> {
        let guard = self.read()?;
        let mut values = guard
            .permissions
            .values()
            .filter(|p| &p.document_id == document_id && &p.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|p| p.kind);
        Ok(values)
    }
}

#[async_trait]
impl SnapshotStore for InMemorySignflowStorage {
    async fn list_versions(
        &self,
        document_id: &DocumentId,
        window: QueryWindow,
    ) -> StorageResult<Vec<VersionSnapshot>> {
        let guard = self.read()?;
        let values = guard
            .versions
            .iter()
            .rev()
            .filter(|v| &v.document_id() == document_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(apply_window(values, window))
    }

    async fn get_version(
        &self,
        snapshot_id: &SnapshotId,
    ) -> StorageResult<Option<VersionSnapshot>> {
        let guard = self.read()?;
        Ok(guard
            .versions
            .iter()
            .find(|v| &v.id() == snapshot_id)
            .cloned())
    }
}

#[async_trait]
impl ActivityStore for InMemorySignflowStorage {
    async fn append_activity(&self, event: ActivityAppend) -> StorageResult<ActivityEvent> {
        self.write()?.append_activity(event)
    }

    async fn list_activity(
        &self,
        document_id: Option<&DocumentId>,
        window: QueryWindow,
    ) -> StorageResult<Vec<ActivityEvent>> {
        let guard = self.read()?;
        let values = guard
            .activity
            .iter()
            .rev()
            .filter(|e| document_id.map_or(true, |id| e.document_id.as_ref() == Some(id)))
            .cloned()
            .collect::<Vec<_>>();
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl ExportStore for InMemorySignflowStorage {
    async fn get_export(&self, job_id: &ExportJobId) -> StorageResult<Option<ExportJob>> {
        let guard = self.read()?;
        Ok(guard
            .export_index
            .get(job_id)
            .map(|index| guard.exports[*index].clone()))
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
