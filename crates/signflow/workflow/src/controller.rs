//! Signature workflow controller.
//!
//! Drives `Document.status` through
//! `Draft -> AuthorReview -> VerifierReview -> ValidatorReview -> Approved -> Archived`
//! with a reject edge from every review status back to `Draft`.
//!
//! Publish, sign and archive are read-check-write cycles closed by a
//! compare-and-swap on the document revision. A cycle that loses the race is
//! re-run against the fresh document, so of two concurrent signatures that
//! complete a tier only the one committed last observes the completion, and a
//! second publish sees the first one's status and fails.

use crate::activity::ActivityRecorder;
use crate::clock::Clock;
use crate::config::WorkflowConfig;
use crate::contributors::ContributorRegistry;
use crate::error::{WorkflowError, WorkflowResult};
use crate::export::ExportCoordinator;
use crate::notify::{Notification, NotificationDispatcher, NotificationTemplate, Recipient};
use crate::permissions::PermissionLedger;
use crate::versions::VersionStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signflow_storage::{
    DocumentStore, QueryWindow, SignflowStorage, StorageError, TransactionalStore, WriteBatch,
};
use signflow_types::{
    ActivityAction, Contributor, Document, DocumentId, DocumentPatch, DocumentStatus, ExportJob,
    NewDocument, PermissionKind, Rejection, SignatureStatus, Team, UserId,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A reviewer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRequest {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub team: Team,
    pub decision: Decision,
    pub comments: Option<String>,
}

impl SignRequest {
    pub fn approve(document_id: DocumentId, user_id: impl Into<UserId>, team: Team) -> Self {
        Self {
            document_id,
            user_id: user_id.into(),
            team,
            decision: Decision::Approve,
            comments: None,
        }
    }

    pub fn reject(
        document_id: DocumentId,
        user_id: impl Into<UserId>,
        team: Team,
        comments: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            user_id: user_id.into(),
            team,
            decision: Decision::Reject,
            comments: Some(comments.into()),
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

/// Result of a signature.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    /// Document as committed.
    pub document: Document,
    /// The signer's record as the decision left it (`Signed` or `Rejected`),
    /// before any document-wide reset.
    pub contributor: Contributor,
    /// This call collected the last signature of the active tier.
    pub tier_complete: bool,
    /// Statuses entered by this call, in order.
    pub transitions: Vec<DocumentStatus>,
}

#[derive(Clone)]
pub struct SignatureWorkflowController {
    storage: Arc<dyn SignflowStorage>,
    contributors: ContributorRegistry,
    permissions: PermissionLedger,
    versions: VersionStore,
    activity: ActivityRecorder,
    notifications: NotificationDispatcher,
    exports: ExportCoordinator,
    clock: Arc<dyn Clock>,
    config: WorkflowConfig,
}

impl SignatureWorkflowController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn SignflowStorage>,
        contributors: ContributorRegistry,
        permissions: PermissionLedger,
        versions: VersionStore,
        activity: ActivityRecorder,
        notifications: NotificationDispatcher,
        exports: ExportCoordinator,
        clock: Arc<dyn Clock>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            storage,
            contributors,
            permissions,
            versions,
            activity,
            notifications,
            exports,
            clock,
            config,
        }
    }

    pub async fn load(&self, document_id: &DocumentId) -> WorkflowResult<Document> {
        self.storage
            .get_document(document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {document_id}")))
    }

    /// Look a document up by its reference. The caller needs read access.
    pub async fn find_by_reference(
        &self,
        reference: &str,
        actor: &UserId,
    ) -> WorkflowResult<Document> {
        let document = self
            .storage
            .find_document_by_reference(reference.trim())
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {reference}")))?;
        self.permissions
            .require(&document, actor, PermissionKind::Read)
            .await?;
        Ok(document)
    }

    /// Documents `actor` can read, most recently updated first.
    pub async fn list_readable(
        &self,
        actor: &UserId,
        window: QueryWindow,
    ) -> WorkflowResult<Vec<Document>> {
        let mut readable = Vec::new();
        for document in self.storage.list_documents(QueryWindow::all()).await? {
            let access = self.permissions.effective_access(&document, actor).await?;
            if access.contains(PermissionKind::Read) {
                readable.push(document);
            }
        }
        let page = readable.into_iter().skip(window.offset);
        Ok(if window.limit == 0 {
            page.collect()
        } else {
            page.take(window.limit).collect()
        })
    }

    /// Create a draft owned by `owner_id`, who joins as an author.
    pub async fn create(&self, owner_id: &UserId, input: NewDocument) -> WorkflowResult<Document> {
        let reference = input.reference.trim().to_string();
        if reference.is_empty() {
            return Err(WorkflowError::Validation("reference is required".to_string()));
        }
        if input.title.trim().is_empty() {
            return Err(WorkflowError::Validation("title is required".to_string()));
        }
        if input.version.trim().is_empty() {
            return Err(WorkflowError::Validation("version label is required".to_string()));
        }

        let now = self.clock.now();
        let mut document = Document {
            id: DocumentId::generate(),
            reference,
            title: input.title,
            version: input.version,
            status: DocumentStatus::Draft,
            revision: 1,
            contributors: Default::default(),
            content: input.content,
            created_by: owner_id.clone(),
            created_at: now,
            updated_at: now,
            approved_at: None,
            last_rejection: None,
        };

        let owner = self.contributors.enroll(owner_id, Team::Authors, now).await?;
        ContributorRegistry::add(&mut document, owner)?;
        for seed in input.contributors {
            if seed.team == Team::Authors && &seed.user_id == owner_id {
                continue;
            }
            let contributor = self.contributors.enroll(&seed.user_id, seed.team, now).await?;
            ContributorRegistry::add(&mut document, contributor).map_err(|_| {
                WorkflowError::Validation(format!("{} is listed twice in {}", seed.user_id, seed.team))
            })?;
        }

        let mut batch = WriteBatch::new();
        batch.insert_document(document.clone());
        self.activity.stage(
            &mut batch,
            Some(owner_id),
            ActivityAction::DocumentCreated,
            Some(document.id),
            format!("Document {} created", document.reference),
            serde_json::json!({
                "reference": document.reference,
                "contributors": document.contributors.len(),
            }),
        );
        self.versions
            .stage(&mut batch, &document, "Initial version", owner_id, now)?;
        self.storage.commit(batch).await?;

        info!(document_id = %document.id, reference = %document.reference, "document created");
        Ok(document)
    }

    /// Edit title, version label or content.
    ///
    /// The write is rejected with `StaleRevision` unless the document is still
    /// at `expected_revision`. A changed version label captures a snapshot.
    pub async fn update(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
        expected_revision: u64,
        patch: DocumentPatch,
    ) -> WorkflowResult<Document> {
        if patch.is_empty() {
            return Err(WorkflowError::Validation("nothing to update".to_string()));
        }
        if matches!(&patch.title, Some(title) if title.trim().is_empty()) {
            return Err(WorkflowError::Validation("title cannot be empty".to_string()));
        }
        if matches!(&patch.version, Some(version) if version.trim().is_empty()) {
            return Err(WorkflowError::Validation("version label cannot be empty".to_string()));
        }

        let mut document = self.load(document_id).await?;
        self.permissions
            .require(&document, actor, PermissionKind::Write)
            .await?;
        if document.status.is_locked() {
            return Err(WorkflowError::InvalidState {
                document_id: document.id,
                status: document.status,
                action: "edit",
            });
        }
        if document.revision != expected_revision {
            return Err(WorkflowError::StaleRevision {
                document_id: document.id,
                expected: expected_revision,
                found: document.revision,
            });
        }

        let now = self.clock.now();
        let previous_version = document.version.clone();
        let DocumentPatch {
            title,
            version,
            content,
            change_note,
        } = patch;
        let mut changed = Vec::new();
        if let Some(title) = title {
            document.title = title;
            changed.push("title");
        }
        if let Some(version) = version {
            document.version = version;
            changed.push("version");
        }
        if let Some(content) = content {
            document.content = content;
            changed.push("content");
        }
        document.revision = expected_revision + 1;
        document.updated_at = now;

        let mut batch = WriteBatch::new();
        batch.replace_document(document.clone(), expected_revision);
        self.activity.stage(
            &mut batch,
            Some(actor),
            ActivityAction::DocumentUpdated,
            Some(document.id),
            format!("Document {} updated", document.reference),
            serde_json::json!({ "fields": changed, "revision": document.revision }),
        );
        if document.version != previous_version {
            let note = change_note
                .unwrap_or_else(|| format!("Updated to version {}", document.version));
            self.versions
                .stage(&mut batch, &document, &note, actor, now)?;
        }
        self.storage.commit(batch).await?;

        debug!(document_id = %document.id, revision = document.revision, "document updated");
        Ok(document)
    }

    /// Copy a document into a new draft owned by `actor`.
    pub async fn duplicate(&self, document_id: &DocumentId, actor: &UserId) -> WorkflowResult<Document> {
        let source = self.load(document_id).await?;
        self.permissions
            .require(&source, actor, PermissionKind::Read)
            .await?;

        let now = self.clock.now();
        let mut document = Document {
            id: DocumentId::generate(),
            reference: format!("{}-COPY", source.reference),
            title: format!("{} (Copy)", source.title),
            version: "1.0".to_string(),
            status: DocumentStatus::Draft,
            revision: 1,
            contributors: source.contributors.clone(),
            content: source.content.clone(),
            created_by: actor.clone(),
            created_at: now,
            updated_at: now,
            approved_at: None,
            last_rejection: None,
        };
        ContributorRegistry::reset_all(&mut document);
        if document.contributors.find(Team::Authors, actor).is_none() {
            let owner = self.contributors.enroll(actor, Team::Authors, now).await?;
            ContributorRegistry::add(&mut document, owner)?;
        }

        let mut batch = WriteBatch::new();
        batch.insert_document(document.clone());
        self.activity.stage(
            &mut batch,
            Some(actor),
            ActivityAction::DocumentDuplicated,
            Some(document.id),
            format!("Duplicated from {}", source.reference),
            serde_json::json!({ "source_id": source.id, "source_reference": source.reference }),
        );
        self.versions
            .stage(&mut batch, &document, "Initial version", actor, now)?;
        self.storage.commit(batch).await?;

        info!(source = %source.id, document_id = %document.id, "document duplicated");
        Ok(document)
    }

    /// Move a draft into author review, enlisting every joined contributor.
    pub async fn publish(&self, document_id: &DocumentId, actor: &UserId) -> WorkflowResult<Document> {
        let current = self.load(document_id).await?;
        self.permissions
            .require(&current, actor, PermissionKind::Write)
            .await?;

        let (document, entered) = self
            .mutate(document_id, |document, batch, now| {
                if document.status != DocumentStatus::Draft {
                    return Err(WorkflowError::InvalidState {
                        document_id: document.id,
                        status: document.status,
                        action: "publish",
                    });
                }
                let enlisted = ContributorRegistry::enlist_all(document);
                self.activity.stage(
                    batch,
                    Some(actor),
                    ActivityAction::DocumentPublished,
                    Some(document.id),
                    format!("Published {} for review", document.reference),
                    serde_json::json!({ "enlisted": enlisted }),
                );
                self.step(document, DocumentStatus::AuthorReview, batch, Some(actor), now)?;
                let mut entered = vec![DocumentStatus::AuthorReview];
                entered.extend(self.settle(document, batch, Some(actor), now)?);
                Ok(entered)
            })
            .await?;

        log_transitions(&document, &entered);
        self.notify_transitions(&document, &entered);
        Ok(document)
    }

    /// Record an approval or rejection from a pending contributor of the
    /// active tier.
    pub async fn sign(&self, request: SignRequest) -> WorkflowResult<SignOutcome> {
        let SignRequest {
            document_id,
            user_id,
            team,
            decision,
            comments,
        } = request;

        let (document, (contributor, tier_complete, transitions)) = self
            .mutate(&document_id, |document, batch, now| {
                if document.contributors.find(team, &user_id).is_none() {
                    return Err(WorkflowError::NotAContributor {
                        document_id: document.id,
                        user_id: user_id.clone(),
                        team,
                    });
                }
                let Some(active) = document.active_tier() else {
                    return Err(WorkflowError::InvalidState {
                        document_id: document.id,
                        status: document.status,
                        action: "sign",
                    });
                };
                if active != team {
                    return Err(WorkflowError::WrongTier {
                        team,
                        status: document.status,
                    });
                }

                match decision {
                    Decision::Approve => {
                        let contributor = ContributorRegistry::decide(
                            document,
                            team,
                            &user_id,
                            SignatureStatus::Signed,
                            comments.clone(),
                            now,
                        )?;
                        self.activity.stage(
                            batch,
                            Some(&user_id),
                            ActivityAction::DocumentSigned,
                            Some(document.id),
                            format!("{} signed for {}", user_id, team.display_name()),
                            serde_json::json!({ "team": team, "comments": comments }),
                        );
                        let tier_complete =
                            ContributorRegistry::quorum(document, team).is_satisfied();
                        let transitions = if tier_complete {
                            self.settle(document, batch, Some(&user_id), now)?
                        } else {
                            Vec::new()
                        };
                        Ok((contributor, tier_complete, transitions))
                    }
                    Decision::Reject => {
                        let contributor = ContributorRegistry::decide(
                            document,
                            team,
                            &user_id,
                            SignatureStatus::Rejected,
                            comments.clone(),
                            now,
                        )?;
                        document.last_rejection = Some(Rejection {
                            user_id: user_id.clone(),
                            team,
                            comments: comments.clone(),
                            rejected_at: now,
                        });
                        self.activity.stage(
                            batch,
                            Some(&user_id),
                            ActivityAction::DocumentRejected,
                            Some(document.id),
                            format!("{} rejected for {}", user_id, team.display_name()),
                            serde_json::json!({ "team": team, "comments": comments }),
                        );
                        self.step(document, DocumentStatus::Draft, batch, Some(&user_id), now)?;
                        ContributorRegistry::reset_all(document);
                        Ok((contributor, false, vec![DocumentStatus::Draft]))
                    }
                }
            })
            .await?;

        info!(
            document_id = %document.id,
            user_id = %contributor.user_id,
            team = %team,
            decision = %contributor.status,
            tier_complete,
            "signature recorded"
        );
        log_transitions(&document, &transitions);
        if tier_complete {
            self.notifications.dispatch(Notification {
                template: NotificationTemplate::TierCompleted,
                recipient: Recipient::User(document.created_by.clone()),
                document_id: Some(document.id),
                payload: serde_json::json!({
                    "reference": document.reference,
                    "team": team,
                }),
            });
        }
        self.notify_transitions(&document, &transitions);

        Ok(SignOutcome {
            document,
            contributor,
            tier_complete,
            transitions,
        })
    }

    /// Archive an approved document and, if configured, export it.
    pub async fn archive(&self, document_id: &DocumentId, actor: &UserId) -> WorkflowResult<Document> {
        let current = self.load(document_id).await?;
        self.permissions.require_full(&current, actor).await?;

        let (document, entered) = self
            .mutate(document_id, |document, batch, now| {
                if document.status != DocumentStatus::Approved {
                    return Err(WorkflowError::InvalidState {
                        document_id: document.id,
                        status: document.status,
                        action: "archive",
                    });
                }
                self.step(document, DocumentStatus::Archived, batch, Some(actor), now)?;
                self.activity.stage(
                    batch,
                    Some(actor),
                    ActivityAction::DocumentArchived,
                    Some(document.id),
                    format!("Document {} archived", document.reference),
                    serde_json::Value::Null,
                );
                Ok(vec![DocumentStatus::Archived])
            })
            .await?;

        log_transitions(&document, &entered);
        self.notify_transitions(&document, &entered);

        if self.config.export_on_archive {
            if let Err(err) = self.exports.request(&document, Some(actor)).await {
                warn!(document_id = %document.id, error = %err, "export trigger failed");
            }
        }
        Ok(document)
    }

    /// Export a finalized document on request.
    pub async fn request_export(
        &self,
        document_id: &DocumentId,
        actor: &UserId,
    ) -> WorkflowResult<ExportJob> {
        let document = self.load(document_id).await?;
        self.permissions
            .require(&document, actor, PermissionKind::Read)
            .await?;
        self.exports.request(&document, Some(actor)).await
    }

    /// Load, apply, and commit with a revision check; re-run on lost races.
    async fn mutate<T, F>(
        &self,
        document_id: &DocumentId,
        mut apply: F,
    ) -> WorkflowResult<(Document, T)>
    where
        F: FnMut(&mut Document, &mut WriteBatch, DateTime<Utc>) -> WorkflowResult<T> + Send,
        T: Send,
    {
        let attempts = self.config.max_commit_retries.max(1);
        for attempt in 1..=attempts {
            let mut document = self.load(document_id).await?;
            let expected = document.revision;
            let now = self.clock.now();

            let mut staged = WriteBatch::new();
            let output = apply(&mut document, &mut staged, now)?;
            document.revision = expected + 1;
            document.updated_at = now;

            let mut batch = WriteBatch::new();
            batch
                .replace_document(document.clone(), expected)
                .extend(staged);
            match self.storage.commit(batch).await {
                Ok(_) => return Ok((document, output)),
                Err(StorageError::RevisionConflict { found, .. }) => {
                    debug!(%document_id, attempt, expected, found, "revision moved; retrying");
                    tokio::task::yield_now().await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(%document_id, attempts, "giving up on contended document");
        Err(WorkflowError::ContentionExhausted {
            document_id: *document_id,
            attempts,
        })
    }

    /// Take one edge of the status graph and record it.
    fn step(
        &self,
        document: &mut Document,
        next: DocumentStatus,
        batch: &mut WriteBatch,
        actor: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let from = document.status;
        document.status = from.transition(next)?;
        if next == DocumentStatus::Approved {
            document.approved_at = Some(now);
        }
        self.activity.stage(
            batch,
            actor,
            ActivityAction::StatusChanged,
            Some(document.id),
            format!("Status changed from {from} to {next}"),
            serde_json::json!({ "from": from, "to": next }),
        );
        Ok(())
    }

    /// Advance past every review tier whose quorum is already met, one edge
    /// at a time. Empty tiers are skipped this way.
    fn settle(
        &self,
        document: &mut Document,
        batch: &mut WriteBatch,
        actor: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<DocumentStatus>> {
        let mut entered = Vec::new();
        while let Some(tier) = document.active_tier() {
            if !ContributorRegistry::quorum(document, tier).is_satisfied() {
                break;
            }
            let next = tier
                .next()
                .map_or(DocumentStatus::Approved, Team::review_status);
            self.step(document, next, batch, actor, now)?;
            entered.push(next);
        }
        Ok(entered)
    }

    fn notify_transitions(&self, document: &Document, entered: &[DocumentStatus]) {
        let payload = serde_json::json!({
            "reference": document.reference,
            "title": document.title,
            "status": document.status,
        });
        let mut notifications = Vec::new();
        for status in entered {
            match status {
                DocumentStatus::AuthorReview
                | DocumentStatus::VerifierReview
                | DocumentStatus::ValidatorReview => {
                    if let Some(tier) = status.review_tier() {
                        for user_id in ContributorRegistry::pending_members(document, tier) {
                            notifications.push(Notification {
                                template: NotificationTemplate::ReviewRequested,
                                recipient: Recipient::User(user_id),
                                document_id: Some(document.id),
                                payload: payload.clone(),
                            });
                        }
                    }
                }
                DocumentStatus::Approved | DocumentStatus::Draft => {
                    let mut details = payload.clone();
                    let template = if *status == DocumentStatus::Approved {
                        NotificationTemplate::DocumentApproved
                    } else {
                        if let Some(rejection) = &document.last_rejection {
                            details["rejection"] = serde_json::json!(rejection);
                        }
                        NotificationTemplate::DocumentRejected
                    };
                    for user_id in stakeholders(document) {
                        notifications.push(Notification {
                            template,
                            recipient: Recipient::User(user_id),
                            document_id: Some(document.id),
                            payload: details.clone(),
                        });
                    }
                }
                DocumentStatus::Archived => notifications.push(Notification {
                    template: NotificationTemplate::DocumentArchived,
                    recipient: Recipient::User(document.created_by.clone()),
                    document_id: Some(document.id),
                    payload: payload.clone(),
                }),
            }
        }
        self.notifications.dispatch_all(notifications);
    }
}

/// Owner plus every contributor, once each.
fn stakeholders(document: &Document) -> BTreeSet<UserId> {
    let mut users: BTreeSet<UserId> = document
        .contributors
        .iter()
        .map(|c| c.user_id.clone())
        .collect();
    users.insert(document.created_by.clone());
    users
}

fn log_transitions(document: &Document, entered: &[DocumentStatus]) {
    for status in entered {
        info!(document_id = %document.id, to = %status, "document status changed");
    }
}
