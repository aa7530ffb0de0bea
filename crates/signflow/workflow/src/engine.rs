//! Composition root: wires storage, directory, notifier, renderer and clock
//! into the workflow components and exposes one facade.

use crate::activity::ActivityRecorder;
use crate::background::BackgroundTasks;
use crate::clock::{Clock, SystemClock};
use crate::config::SignflowConfig;
use crate::contributors::ContributorRegistry;
use crate::controller::{SignOutcome, SignRequest, SignatureWorkflowController};
use crate::directory::{InMemoryDirectory, UserDirectory};
use crate::error::WorkflowResult;
use crate::export::{ExportCoordinator, Renderer, StaticRenderer};
use crate::invitations::{Acceptance, InvitationManager, InviteRequest};
use crate::notify::{LogNotifier, NotificationDispatcher, Notifier};
use crate::permissions::PermissionLedger;
use crate::versions::VersionStore;
use chrono::{DateTime, Utc};
use signflow_storage::{InMemorySignflowStorage, QueryWindow, SignflowStorage};
use signflow_types::{
    ActivityEvent, Document, DocumentId, DocumentPatch, EffectiveAccess, ExportJob, ExportJobId,
    Invitation, InvitationId, InvitationToken, NewDocument, Permission, PermissionKind, SnapshotId,
    UserId, VersionSnapshot,
};
use std::sync::Arc;
use tracing::instrument;

/// Builder for [`Signflow`]. Every collaborator has an in-process default.
pub struct SignflowBuilder {
    storage: Option<Arc<dyn SignflowStorage>>,
    directory: Option<Arc<dyn UserDirectory>>,
    notifier: Option<Arc<dyn Notifier>>,
    renderer: Option<Arc<dyn Renderer>>,
    clock: Option<Arc<dyn Clock>>,
    config: SignflowConfig,
}

impl SignflowBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            directory: None,
            notifier: None,
            renderer: None,
            clock: None,
            config: SignflowConfig::default(),
        }
    }

    pub fn storage(mut self, storage: Arc<dyn SignflowStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: SignflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Signflow {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemorySignflowStorage::new()));
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(InMemoryDirectory::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(StaticRenderer::new("memory://exports")));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = self.config;

        let tasks = Arc::new(BackgroundTasks::new());
        let activity = ActivityRecorder::new(storage.clone(), clock.clone());
        let notifications = NotificationDispatcher::new(notifier, activity.clone(), tasks.clone());
        let permissions = PermissionLedger::new(
            storage.clone(),
            directory.clone(),
            activity.clone(),
            clock.clone(),
        );
        let versions = VersionStore::new(storage.clone(), activity.clone());
        let exports = ExportCoordinator::new(
            storage.clone(),
            renderer,
            activity.clone(),
            clock.clone(),
            tasks.clone(),
        );
        let controller = SignatureWorkflowController::new(
            storage.clone(),
            ContributorRegistry::new(directory.clone()),
            permissions.clone(),
            versions.clone(),
            activity.clone(),
            notifications.clone(),
            exports.clone(),
            clock.clone(),
            config.workflow.clone(),
        );
        let invitations = InvitationManager::new(
            storage,
            directory,
            permissions.clone(),
            activity.clone(),
            notifications,
            clock,
            config.invitations.clone(),
            config.workflow.max_commit_retries,
        );

        Signflow {
            controller,
            invitations,
            permissions,
            versions,
            activity,
            exports,
            tasks,
            config,
        }
    }
}

impl Default for SignflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Document lifecycle and signature workflow engine.
#[derive(Clone)]
pub struct Signflow {
    controller: SignatureWorkflowController,
    invitations: InvitationManager,
    permissions: PermissionLedger,
    versions: VersionStore,
    activity: ActivityRecorder,
    exports: ExportCoordinator,
    tasks: Arc<BackgroundTasks>,
    config: SignflowConfig,
}

impl Signflow {
    pub fn builder() -> SignflowBuilder {
        SignflowBuilder::new()
    }

    pub fn config(&self) -> &SignflowConfig {
        &self.config
    }

    // Documents

    #[instrument(skip(self, input), fields(reference = %input.reference))]
    pub async fn create_document(
        &self,
        owner_id: &UserId,
        input: NewDocument,
    ) -> WorkflowResult<Document> {
        self.controller.create(owner_id, input).await
    }

    pub async fn get_document(&self, document_id: &DocumentId) -> WorkflowResult<Document> {
        self.controller.load(document_id).await
    }

    pub async fn find_document_by_reference(
        &self,
        reference: &str,
        actor: &UserId,
    ) -> WorkflowResult<Document> {
        self.controller.find_by_reference(reference, actor).await
    }

    /// Documents `actor` may read: owned, contributed to, explicitly shared,
    /// or all of them for an admin.
    pub async fn list_documents(
        &self,
        actor: &UserId,
        window: QueryWindow,
    ) -> WorkflowResult<Vec<Document>> {
        self.controller.list_readable(actor, window).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update_document(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        expected_revision: u64,
        patch: DocumentPatch,
    ) -> WorkflowResult<Document> {
        self.controller
            .update(document_id, actor, expected_revision, patch)
            .await
    }

    #[instrument(skip(self))]
    pub async fn duplicate_document(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
    ) -> WorkflowResult<Document> {
        self.controller.duplicate(document_id, actor).await
    }

    // Workflow

    #[instrument(skip(self))]
    pub async fn publish(&self, document_id: &DocumentId, actor: &UserId) -> WorkflowResult<Document> {
        self.controller.publish(document_id, actor).await
    }

    #[instrument(
        skip(self, request),
        fields(document_id = %request.document_id, user_id = %request.user_id, team = %request.team)
    )]
    pub async fn sign(&self, request: SignRequest) -> WorkflowResult<SignOutcome> {
        self.controller.sign(request).await
    }

    #[instrument(skip(self))]
    pub async fn archive(&self, document_id: &DocumentId, actor: &UserId) -> WorkflowResult<Document> {
        self.controller.archive(document_id, actor).await
    }

    // Invitations

    #[instrument(
        skip(self, request),
        fields(document_id = %request.document_id, team = %request.team)
    )]
    pub async fn invite(&self, request: InviteRequest) -> WorkflowResult<Invitation> {
        self.invitations.invite(request).await
    }

    #[instrument(skip(self, token))]
    pub async fn accept_invitation(
        &self,
        token: &InvitationToken,
        user_id: &UserId,
    ) -> WorkflowResult<Acceptance> {
        self.invitations.accept(token, user_id).await
    }

    #[instrument(skip(self, token, reason))]
    pub async fn decline_invitation(
        &self,
        token: &InvitationToken,
        reason: Option<String>,
    ) -> WorkflowResult<Invitation> {
        self.invitations.decline(token, reason).await
    }

    #[instrument(skip(self))]
    pub async fn revoke_invitation(
        &self,
        invitation_id: &InvitationId,
        actor: &UserId,
    ) -> WorkflowResult<Invitation> {
        self.invitations.revoke(invitation_id, actor).await
    }

    #[instrument(skip(self))]
    pub async fn resend_invitation(
        &self,
        invitation_id: &InvitationId,
        actor: &UserId,
    ) -> WorkflowResult<Invitation> {
        self.invitations.resend(invitation_id, actor).await
    }

    pub async fn list_invitations(&self, document_id: &DocumentId) -> WorkflowResult<Vec<Invitation>> {
        self.invitations.list(document_id).await
    }

    // Permissions

    #[instrument(skip(self))]
    pub async fn grant_permission(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
        actor: &UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> WorkflowResult<Permission> {
        let document = self.controller.load(document_id).await?;
        self.permissions.require_full(&document, actor).await?;
        self.permissions
            .grant(document_id, user_id, kind, actor, expires_at)
            .await
    }

    #[instrument(skip(self))]
    pub async fn revoke_permission(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
        kind: PermissionKind,
        actor: &UserId,
    ) -> WorkflowResult<Permission> {
        let document = self.controller.load(document_id).await?;
        self.permissions.require_full(&document, actor).await?;
        self.permissions
            .revoke(document_id, user_id, kind, actor)
            .await
    }

    pub async fn effective_access(
        &self,
        document_id: &DocumentId,
        user_id: &UserId,
    ) -> WorkflowResult<EffectiveAccess> {
        let document = self.controller.load(document_id).await?;
        self.permissions.effective_access(&document, user_id).await
    }

    pub async fn list_permissions(&self, document_id: &DocumentId) -> WorkflowResult<Vec<Permission>> {
        self.permissions.list(document_id).await
    }

    // History

    pub async fn list_versions(
        &self,
        document_id: &DocumentId,
    ) -> WorkflowResult<Vec<VersionSnapshot>> {
        self.versions.list(document_id).await
    }

    pub async fn get_version(&self, snapshot_id: &SnapshotId) -> WorkflowResult<VersionSnapshot> {
        self.versions.get(snapshot_id).await
    }

    pub async fn list_activity(
        &self,
        document_id: Option<&DocumentId>,
        window: QueryWindow,
    ) -> WorkflowResult<Vec<ActivityEvent>> {
        self.activity.list(document_id, window).await
    }

    pub async fn verify_activity_chain(&self) -> WorkflowResult<bool> {
        self.activity.verify_chain().await
    }

    // Export

    #[instrument(skip(self))]
    pub async fn request_export(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
    ) -> WorkflowResult<ExportJob> {
        self.controller.request_export(document_id, actor).await
    }

    pub async fn export_status(&self, job_id: &ExportJobId) -> WorkflowResult<ExportJob> {
        self.exports.status(job_id).await
    }

    /// Wait for queued notifications and exports to finish.
    pub async fn drain_background(&self) {
        self.tasks.drain().await;
    }
}
