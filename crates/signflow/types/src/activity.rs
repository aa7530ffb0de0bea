//! Audit events emitted by every mutating operation.

use crate::ids::{DocumentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    DocumentCreated,
    DocumentUpdated,
    DocumentDuplicated,
    DocumentPublished,
    StatusChanged,
    DocumentSigned,
    DocumentRejected,
    DocumentArchived,
    VersionCaptured,
    InvitationSent,
    InvitationResent,
    InvitationAccepted,
    InvitationDeclined,
    InvitationRevoked,
    PermissionGranted,
    PermissionRevoked,
    NotificationFailed,
    ExportRequested,
    ExportCompleted,
    ExportFailed,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::DocumentCreated => "document_created",
            ActivityAction::DocumentUpdated => "document_updated",
            ActivityAction::DocumentDuplicated => "document_duplicated",
            ActivityAction::DocumentPublished => "document_published",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::DocumentSigned => "document_signed",
            ActivityAction::DocumentRejected => "document_rejected",
            ActivityAction::DocumentArchived => "document_archived",
            ActivityAction::VersionCaptured => "version_captured",
            ActivityAction::InvitationSent => "invitation_sent",
            ActivityAction::InvitationResent => "invitation_resent",
            ActivityAction::InvitationAccepted => "invitation_accepted",
            ActivityAction::InvitationDeclined => "invitation_declined",
            ActivityAction::InvitationRevoked => "invitation_revoked",
            ActivityAction::PermissionGranted => "permission_granted",
            ActivityAction::PermissionRevoked => "permission_revoked",
            ActivityAction::NotificationFailed => "notification_failed",
            ActivityAction::ExportRequested => "export_requested",
            ActivityAction::ExportCompleted => "export_completed",
            ActivityAction::ExportFailed => "export_failed",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event to append. Sequence and hashes are assigned by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityAppend {
    pub timestamp: DateTime<Utc>,
    pub actor: Option<UserId>,
    pub action: ActivityAction,
    pub document_id: Option<DocumentId>,
    pub description: String,
    pub success: bool,
    #[serde(default)]
    pub details: Value,
}

impl ActivityAppend {
    pub fn new(
        timestamp: DateTime<Utc>,
        actor: Option<UserId>,
        action: ActivityAction,
        document_id: Option<DocumentId>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            actor,
            action,
            document_id,
            description: description.into(),
            success: true,
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Stored, hash-linked activity event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub event_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: Option<UserId>,
    pub action: ActivityAction,
    pub document_id: Option<DocumentId>,
    pub description: String,
    pub success: bool,
    pub details: Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}
