//! Token invitations for onboarding collaborators.

use crate::ids::{DocumentId, InvitationId, UserId};
use crate::permission::PermissionKind;
use crate::status::Team;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Secret, single-use invitation token.
///
/// `Debug` is redacted so tokens do not end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationToken(String);

impl InvitationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InvitationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "InvitationToken({prefix}..)")
    }
}

/// Stored invitation status.
///
/// `Expired` is never written by a sweeper; readers derive it from
/// `expires_at` via [`Invitation::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub token: InvitationToken,
    pub document_id: DocumentId,
    pub inviter_id: UserId,
    /// Stored lowercased.
    pub invitee_email: String,
    pub team: Team,
    pub permission: PermissionKind,
    pub status: InvitationStatus,
    #[serde(default)]
    pub message: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<UserId>,
    pub declined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decline_reason: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Status as observed at `now`: a pending invitation past its expiry reads
    /// as `Expired`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && self.is_expired_at(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    /// Pending and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == InvitationStatus::Pending
    }
}
