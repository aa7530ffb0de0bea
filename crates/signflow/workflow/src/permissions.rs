//! Permission ledger: explicit grants and effective access.
//!
//! Effective access on a document is the union of
//! - full access for the owner and for externally granted admins,
//! - read for any contributor, and sign for members of the tier currently
//!   under review,
//! - explicit grants that are `Active` and not past `expires_at`.
//!
//! Expiry is lazy. A grant whose `expires_at` has passed still reads
//! `Active` in storage but no longer counts.

use crate::activity::ActivityRecorder;
use crate::clock::Clock;
use crate::directory::UserDirectory;
use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use signflow_storage::{
    DocumentStore, PermissionStore, SignflowStorage, TransactionalStore, WriteBatch,
};
use signflow_types::{
    ActivityAction, Document, DocumentId, EffectiveAccess, Permission, PermissionKind,
    PermissionStatus, UserId,
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct PermissionLedger {
    storage: Arc<dyn SignflowStorage>,
    directory: Arc<dyn UserDirectory>,
    activity: ActivityRecorder,
    clock: Arc<dyn Clock>,
}

impl PermissionLedger {
    pub fn new(
        storage: Arc<dyn SignflowStorage>,
        directory: Arc<dyn UserDirectory>,
        activity: ActivityRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            directory,
            activity,
            clock,
        }
    }

    /// Upsert the grant keyed by `(document_id, user_id, kind)`.
    ///
    /// Granting again refreshes the expiry and reactivates a revoked grant;
    /// the original `granted_at` is kept while the grant stays active.
    pub async fn grant(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
        granted_by: &UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> WorkflowResult<Permission> {
        if self.storage.get_document(document_id).await?.is_none() {
            return Err(WorkflowError::NotFound(format!("document {document_id}")));
        }

        let mut batch = WriteBatch::new();
        let permission = self
            .stage_grant(&mut batch, document_id, user_id, kind, granted_by, expires_at)
            .await?;
        self.storage.commit(batch).await?;

        info!(%document_id, %user_id, %kind, "permission granted");
        Ok(permission)
    }

    /// Build the upserted grant and stage it with its activity event.
    pub async fn stage_grant(
        &self,
        batch: &mut WriteBatch,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
        granted_by: &UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> WorkflowResult<Permission> {
        let now = self.clock.now();
        let existing = self
            .storage
            .get_permission(document_id, user_id, kind)
            .await?;

        let granted_at = match &existing {
            Some(current) if current.status == PermissionStatus::Active => current.granted_at,
            _ => now,
        };
        let permission = Permission {
            document_id: *document_id,
            user_id: user_id.clone(),
            kind,
            status: PermissionStatus::Active,
            granted_by: granted_by.clone(),
            granted_at,
            expires_at,
            revoked_at: None,
            updated_at: now,
        };

        batch.upsert_permission(permission.clone());
        self.activity.stage(
            batch,
            Some(granted_by),
            ActivityAction::PermissionGranted,
            Some(*document_id),
            format!("Granted {kind} to {user_id}"),
            serde_json::json!({
                "user_id": user_id.as_str(),
                "kind": kind,
                "expires_at": expires_at,
            }),
        );
        Ok(permission)
    }

    /// Mark the grant revoked. Fails with `NotFound` if it never existed.
    pub async fn revoke(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
        revoked_by: &UserId,
    ) -> WorkflowResult<Permission> {
        let mut permission = self
            .storage
            .get_permission(document_id, user_id, kind)
            .await?
            .ok_or_else(|| {
                WorkflowError::NotFound(format!("{kind} permission of {user_id} on {document_id}"))
            })?;

        if permission.status == PermissionStatus::Revoked {
            return Ok(permission);
        }

        let now = self.clock.now();
        permission.status = PermissionStatus::Revoked;
        permission.revoked_at = Some(now);
        permission.updated_at = now;

        let mut batch = WriteBatch::new();
        batch.upsert_permission(permission.clone());
        self.activity.stage(
            &mut batch,
            Some(revoked_by),
            ActivityAction::PermissionRevoked,
            Some(*document_id),
            format!("Revoked {kind} from {user_id}"),
            serde_json::json!({ "user_id": user_id.as_str(), "kind": kind }),
        );
        self.storage.commit(batch).await?;

        info!(%document_id, %user_id, %kind, "permission revoked");
        Ok(permission)
    }

    /// Access `user_id` holds on `document` right now.
    pub async fn effective_access(
        &self,
        document: &Document,
        user_id: &UserId,
    ) -> WorkflowResult<EffectiveAccess> {
        if document.is_owner(user_id) || self.is_admin(user_id).await? {
            return Ok(EffectiveAccess::full());
        }

        let mut access = EffectiveAccess::none();
        if document.contributors.contains_user(user_id) {
            access.insert(PermissionKind::Read);
        }
        if let Some(tier) = document.active_tier() {
            if document.contributors.find(tier, user_id).is_some() {
                access.insert(PermissionKind::Sign);
            }
        }

        let now = self.clock.now();
        for permission in self
            .storage
            .list_user_permissions(&document.id, user_id)
            .await?
        {
            if permission.is_effective_at(now) {
                access.insert(permission.kind);
            }
        }
        Ok(access)
    }

    /// Fail with `Authorization` unless `user_id` holds `kind`.
    pub async fn require(
        &self,
        document: &Document,
        user_id: &UserId,
        kind: PermissionKind,
    ) -> WorkflowResult<EffectiveAccess> {
        let access = self.effective_access(document, user_id).await?;
        if access.contains(kind) {
            Ok(access)
        } else {
            Err(WorkflowError::Authorization(format!(
                "{user_id} lacks {kind} on {}",
                document.reference
            )))
        }
    }

    /// Fail with `Authorization` unless `user_id` is the owner or an admin.
    pub async fn require_full(&self, document: &Document, user_id: &UserId) -> WorkflowResult<()> {
        if document.is_owner(user_id) || self.is_admin(user_id).await? {
            Ok(())
        } else {
            Err(WorkflowError::Authorization(format!(
                "{user_id} does not manage {}",
                document.reference
            )))
        }
    }

    async fn is_admin(&self, user_id: &UserId) -> WorkflowResult<bool> {
        Ok(self
            .directory
            .get_user(user_id)
            .await?
            .map_or(false, |profile| profile.is_admin))
    }

    pub async fn list(&self, document_id: &DocumentId) -> WorkflowResult<Vec<Permission>> {
        Ok(self.storage.list_permissions(document_id).await?)
    }
}
