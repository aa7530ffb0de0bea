//! Invitation manager: token issuance, acceptance, decline, revoke, resend.
//!
//! Acceptance is one all-or-nothing commit: contributor added (document
//! revision check), invitation marked accepted (conditional on `Pending`),
//! permission granted and activity appended. A concurrent acceptance of the
//! same token loses the status precondition, re-reads the invitation and
//! fails with `AlreadyUsed`, leaving no partial records.
//!
//! A contributor accepted while the document is in review joins the running
//! round as `Pending` when their tier has not signed off yet, so the tier
//! cannot advance without them.

use crate::activity::ActivityRecorder;
use crate::clock::Clock;
use crate::config::InvitationConfig;
use crate::contributors::ContributorRegistry;
use crate::directory::{require_user, UserDirectory};
use crate::error::{WorkflowError, WorkflowResult};
use crate::notify::{Notification, NotificationDispatcher, NotificationTemplate, Recipient};
use crate::permissions::PermissionLedger;
use chrono::Duration;
use rand::RngCore;
use signflow_storage::{
    DocumentStore, InvitationStore, SignflowStorage, StorageError, TransactionalStore, WriteBatch,
};
use signflow_types::{
    ActivityAction, Contributor, Document, DocumentId, Invitation, InvitationId, InvitationStatus,
    InvitationToken, Permission, PermissionKind, SignatureStatus, Team, UserId,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Tokens shorter than this are never issued, whatever the configuration.
const MIN_TOKEN_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub document_id: DocumentId,
    pub inviter_id: UserId,
    pub email: String,
    pub team: Team,
    /// Permission granted on acceptance.
    pub permission: PermissionKind,
    /// Lifetime; the configured default when `None`.
    pub ttl: Option<Duration>,
    pub message: Option<String>,
}

impl InviteRequest {
    pub fn new(
        document_id: DocumentId,
        inviter_id: impl Into<UserId>,
        email: impl Into<String>,
        team: Team,
        permission: PermissionKind,
    ) -> Self {
        Self {
            document_id,
            inviter_id: inviter_id.into(),
            email: email.into(),
            team,
            permission,
            ttl: None,
            message: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Everything an acceptance produced.
#[derive(Debug, Clone)]
pub struct Acceptance {
    pub invitation: Invitation,
    pub contributor: Contributor,
    pub permission: Permission,
    pub document: Document,
}

#[derive(Clone)]
pub struct InvitationManager {
    storage: Arc<dyn SignflowStorage>,
    directory: Arc<dyn UserDirectory>,
    permissions: PermissionLedger,
    activity: ActivityRecorder,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    config: InvitationConfig,
    max_commit_retries: u32,
}

impl InvitationManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn SignflowStorage>,
        directory: Arc<dyn UserDirectory>,
        permissions: PermissionLedger,
        activity: ActivityRecorder,
        notifications: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        config: InvitationConfig,
        max_commit_retries: u32,
    ) -> Self {
        Self {
            storage,
            directory,
            permissions,
            activity,
            notifications,
            clock,
            config,
            max_commit_retries: max_commit_retries.max(1),
        }
    }

    /// Issue a single-use invitation and notify the invitee.
    pub async fn invite(&self, request: InviteRequest) -> WorkflowResult<Invitation> {
        let email = normalize_email(&request.email)?;
        let ttl = request.ttl.unwrap_or_else(|| self.config.default_ttl());
        if ttl <= Duration::zero() {
            return Err(WorkflowError::Validation(
                "invitation lifetime must be positive".to_string(),
            ));
        }
        if ttl > self.config.max_ttl() {
            return Err(WorkflowError::Validation(format!(
                "invitation lifetime exceeds {} seconds",
                self.config.max_ttl_secs
            )));
        }

        let document = self.load_document(&request.document_id).await?;
        if document.status.is_locked() {
            return Err(WorkflowError::InvalidState {
                document_id: document.id,
                status: document.status,
                action: "invite to",
            });
        }
        self.permissions
            .require(&document, &request.inviter_id, PermissionKind::Write)
            .await?;

        let now = self.clock.now();
        let invitation = Invitation {
            id: InvitationId::generate(),
            token: self.issue_token(),
            document_id: document.id,
            inviter_id: request.inviter_id,
            invitee_email: email,
            team: request.team,
            permission: request.permission,
            status: InvitationStatus::Pending,
            message: request.message,
            sent_at: now,
            expires_at: now + ttl,
            accepted_at: None,
            accepted_by: None,
            declined_at: None,
            decline_reason: None,
            revoked_at: None,
        };

        let mut batch = WriteBatch::new();
        batch.insert_invitation(invitation.clone());
        self.activity.stage(
            &mut batch,
            Some(&invitation.inviter_id),
            ActivityAction::InvitationSent,
            Some(document.id),
            format!(
                "Invited {} to {}",
                invitation.invitee_email,
                invitation.team.display_name()
            ),
            invitation_details(&invitation),
        );
        self.storage.commit(batch).await?;

        info!(
            document_id = %document.id,
            invitation_id = %invitation.id,
            team = %invitation.team,
            "invitation sent"
        );
        self.notify_invitee(&document, &invitation);
        Ok(invitation)
    }

    /// Redeem `token` as `user_id`.
    pub async fn accept(
        &self,
        token: &InvitationToken,
        user_id: &UserId,
    ) -> WorkflowResult<Acceptance> {
        let mut contended = None;

        for attempt in 1..=self.max_commit_retries {
            let invitation = self.find_redeemable(token).await?;
            let now = self.clock.now();

            let profile = require_user(self.directory.as_ref(), user_id).await?;
            if !profile.email_matches(&invitation.invitee_email) {
                return Err(WorkflowError::Authorization(format!(
                    "invitation {} was issued to a different address",
                    invitation.id
                )));
            }

            let mut document = self.load_document(&invitation.document_id).await?;
            if document.status.is_locked() {
                return Err(WorkflowError::InvalidState {
                    document_id: document.id,
                    status: document.status,
                    action: "join",
                });
            }
            let expected = document.revision;
            let mut contributor = Contributor::joined(
                profile.user_id.clone(),
                profile.snapshot(now),
                invitation.team,
                invitation.sent_at,
            );
            if ContributorRegistry::joins_current_round(&document, invitation.team) {
                contributor.status = SignatureStatus::Pending;
            }
            if let Err(err) = ContributorRegistry::add(&mut document, contributor.clone()) {
                // A racing acceptance may have seated the user after our read.
                let current = self.get(&invitation.id).await?;
                if current.status != InvitationStatus::Pending {
                    return Err(WorkflowError::AlreadyUsed {
                        invitation_id: current.id,
                        status: current.status,
                    });
                }
                return Err(err);
            }
            document.revision = expected + 1;
            document.updated_at = now;

            let mut accepted = invitation.clone();
            accepted.status = InvitationStatus::Accepted;
            accepted.accepted_at = Some(now);
            accepted.accepted_by = Some(user_id.clone());

            let mut batch = WriteBatch::new();
            batch
                .replace_document(document.clone(), expected)
                .update_invitation(accepted.clone(), InvitationStatus::Pending);
            let permission = self
                .permissions
                .stage_grant(
                    &mut batch,
                    &document.id,
                    user_id,
                    invitation.permission,
                    &invitation.inviter_id,
                    None,
                )
                .await?;
            self.activity.stage(
                &mut batch,
                Some(user_id),
                ActivityAction::InvitationAccepted,
                Some(document.id),
                format!("{} joined {}", user_id, invitation.team.display_name()),
                invitation_details(&accepted),
            );

            match self.storage.commit(batch).await {
                Ok(_) => {
                    info!(
                        document_id = %document.id,
                        invitation_id = %accepted.id,
                        %user_id,
                        "invitation accepted"
                    );
                    self.notifications.dispatch(Notification {
                        template: NotificationTemplate::InvitationAccepted,
                        recipient: Recipient::User(accepted.inviter_id.clone()),
                        document_id: Some(document.id),
                        payload: serde_json::json!({
                            "reference": document.reference,
                            "user_id": user_id,
                            "team": accepted.team,
                        }),
                    });
                    if document.active_tier() == Some(accepted.team) {
                        self.notifications.dispatch(Notification {
                            template: NotificationTemplate::ReviewRequested,
                            recipient: Recipient::User(user_id.clone()),
                            document_id: Some(document.id),
                            payload: serde_json::json!({
                                "reference": document.reference,
                                "title": document.title,
                                "status": document.status,
                            }),
                        });
                    }
                    return Ok(Acceptance {
                        invitation: accepted,
                        contributor,
                        permission,
                        document,
                    });
                }
                Err(
                    err @ (StorageError::RevisionConflict { .. }
                    | StorageError::PreconditionFailed(_)),
                ) => {
                    debug!(invitation_id = %invitation.id, attempt, error = %err, "acceptance raced; retrying");
                    contended = Some(document.id);
                    tokio::task::yield_now().await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        match contended {
            Some(document_id) => Err(WorkflowError::ContentionExhausted {
                document_id,
                attempts: self.max_commit_retries,
            }),
            None => Err(WorkflowError::TokenNotFound),
        }
    }

    /// Decline `token`. The invitation becomes unusable.
    pub async fn decline(
        &self,
        token: &InvitationToken,
        reason: Option<String>,
    ) -> WorkflowResult<Invitation> {
        for _ in 0..self.max_commit_retries {
            let mut invitation = self.find_redeemable(token).await?;
            let now = self.clock.now();
            invitation.status = InvitationStatus::Declined;
            invitation.declined_at = Some(now);
            invitation.decline_reason = reason.clone();

            let mut batch = WriteBatch::new();
            batch.update_invitation(invitation.clone(), InvitationStatus::Pending);
            self.activity.stage(
                &mut batch,
                None,
                ActivityAction::InvitationDeclined,
                Some(invitation.document_id),
                format!("{} declined the invitation", invitation.invitee_email),
                serde_json::json!({ "invitation_id": invitation.id, "reason": reason }),
            );
            match self.storage.commit(batch).await {
                Ok(_) => {
                    info!(invitation_id = %invitation.id, "invitation declined");
                    return Ok(invitation);
                }
                Err(StorageError::PreconditionFailed(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(WorkflowError::TokenNotFound)
    }

    /// Withdraw a pending invitation. Allowed for the inviter and for users
    /// who manage the document.
    pub async fn revoke(
        &self,
        invitation_id: &InvitationId,
        actor: &UserId,
    ) -> WorkflowResult<Invitation> {
        let mut invitation = self.get(invitation_id).await?;
        if &invitation.inviter_id != actor {
            let document = self.load_document(&invitation.document_id).await?;
            self.permissions.require_full(&document, actor).await?;
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(WorkflowError::AlreadyUsed {
                invitation_id: invitation.id,
                status: invitation.status,
            });
        }

        let now = self.clock.now();
        invitation.status = InvitationStatus::Revoked;
        invitation.revoked_at = Some(now);

        let mut batch = WriteBatch::new();
        batch.update_invitation(invitation.clone(), InvitationStatus::Pending);
        self.activity.stage(
            &mut batch,
            Some(actor),
            ActivityAction::InvitationRevoked,
            Some(invitation.document_id),
            format!("Invitation for {} revoked", invitation.invitee_email),
            serde_json::json!({ "invitation_id": invitation.id }),
        );
        self.commit_status_change(batch, &invitation).await?;

        info!(invitation_id = %invitation.id, %actor, "invitation revoked");
        Ok(invitation)
    }

    /// Re-issue a pending invitation under a fresh token and expiry. The old
    /// token stops resolving.
    pub async fn resend(
        &self,
        invitation_id: &InvitationId,
        actor: &UserId,
    ) -> WorkflowResult<Invitation> {
        let mut invitation = self.get(invitation_id).await?;
        if &invitation.inviter_id != actor {
            return Err(WorkflowError::Authorization(format!(
                "only the inviter can resend invitation {}",
                invitation.id
            )));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(WorkflowError::AlreadyUsed {
                invitation_id: invitation.id,
                status: invitation.status,
            });
        }
        let document = self.load_document(&invitation.document_id).await?;
        if document.status.is_locked() {
            return Err(WorkflowError::InvalidState {
                document_id: document.id,
                status: document.status,
                action: "invite to",
            });
        }

        let now = self.clock.now();
        let superseded = self
            .storage
            .list_invitations(&document.id)
            .await?
            .into_iter()
            .any(|other| {
                other.id != invitation.id
                    && other.invitee_email == invitation.invitee_email
                    && other.is_live(now)
            });
        if superseded {
            return Err(WorkflowError::Conflict(format!(
                "a newer pending invitation exists for {}",
                invitation.invitee_email
            )));
        }

        let lifetime = invitation.expires_at - invitation.sent_at;
        invitation.token = self.issue_token();
        invitation.sent_at = now;
        invitation.expires_at = now + lifetime;

        let mut batch = WriteBatch::new();
        batch.update_invitation(invitation.clone(), InvitationStatus::Pending);
        self.activity.stage(
            &mut batch,
            Some(actor),
            ActivityAction::InvitationResent,
            Some(document.id),
            format!("Invitation for {} resent", invitation.invitee_email),
            invitation_details(&invitation),
        );
        self.commit_status_change(batch, &invitation).await?;

        info!(invitation_id = %invitation.id, "invitation resent");
        self.notify_invitee(&document, &invitation);
        Ok(invitation)
    }

    /// Invitations of a document, newest first.
    pub async fn list(&self, document_id: &DocumentId) -> WorkflowResult<Vec<Invitation>> {
        Ok(self.storage.list_invitations(document_id).await?)
    }

    pub async fn get(&self, invitation_id: &InvitationId) -> WorkflowResult<Invitation> {
        self.storage
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("invitation {invitation_id}")))
    }

    /// Resolve a token that can still be accepted or declined. Expiry is
    /// checked before status so a stale link reports `TokenExpired`.
    async fn find_redeemable(&self, token: &InvitationToken) -> WorkflowResult<Invitation> {
        let invitation = self
            .storage
            .find_invitation_by_token(token)
            .await?
            .ok_or(WorkflowError::TokenNotFound)?;
        let now = self.clock.now();
        if invitation.is_expired_at(now) {
            return Err(WorkflowError::TokenExpired {
                invitation_id: invitation.id,
                expired_at: invitation.expires_at,
            });
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(WorkflowError::AlreadyUsed {
                invitation_id: invitation.id,
                status: invitation.status,
            });
        }
        Ok(invitation)
    }

    /// Commit a status change conditional on `Pending`, reporting the status
    /// that won if another writer got there first.
    async fn commit_status_change(
        &self,
        batch: WriteBatch,
        invitation: &Invitation,
    ) -> WorkflowResult<()> {
        match self.storage.commit(batch).await {
            Ok(_) => Ok(()),
            Err(StorageError::PreconditionFailed(_)) => {
                let current = self.get(&invitation.id).await?;
                Err(WorkflowError::AlreadyUsed {
                    invitation_id: current.id,
                    status: current.status,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn load_document(&self, document_id: &DocumentId) -> WorkflowResult<Document> {
        self.storage
            .get_document(document_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("document {document_id}")))
    }

    fn issue_token(&self) -> InvitationToken {
        let mut bytes = vec![0u8; self.config.token_bytes.max(MIN_TOKEN_BYTES)];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        InvitationToken::new(hex::encode(bytes))
    }

    fn notify_invitee(&self, document: &Document, invitation: &Invitation) {
        self.notifications.dispatch(Notification {
            template: NotificationTemplate::InvitationSent,
            recipient: Recipient::Email(invitation.invitee_email.clone()),
            document_id: Some(document.id),
            payload: serde_json::json!({
                "reference": document.reference,
                "title": document.title,
                "inviter": invitation.inviter_id,
                "team": invitation.team,
                "permission": invitation.permission,
                "token": invitation.token.as_str(),
                "expires_at": invitation.expires_at,
                "message": invitation.message,
            }),
        });
    }
}

/// Audit details. The token is never logged.
fn invitation_details(invitation: &Invitation) -> serde_json::Value {
    serde_json::json!({
        "invitation_id": invitation.id,
        "email": invitation.invitee_email,
        "team": invitation.team,
        "permission": invitation.permission,
        "expires_at": invitation.expires_at,
    })
}

fn normalize_email(raw: &str) -> WorkflowResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(WorkflowError::Validation(format!("{raw:?} is not an email address"))),
    }
}
