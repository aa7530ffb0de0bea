//! Per-document team membership and signature state.

use crate::ids::UserId;
use crate::status::Team;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity details copied from the user directory when a contributor record
/// is created.
///
/// This is a point-in-time copy, not a reference. It is never re-synced: if
/// the user later changes name, title or department, existing contributor
/// records keep the values they were created with. Documents therefore show
/// who signed as they were at the time, at the cost of drifting from the
/// directory. Read the directory when current details are needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub name: String,
    pub title: String,
    pub department: String,
    pub captured_at: DateTime<Utc>,
}

/// Signature status of one contributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Joined,
    Pending,
    Signed,
    Rejected,
}

impl SignatureStatus {
    /// Forward edges of `Joined -> Pending -> {Signed | Rejected}`.
    ///
    /// The document-wide reset back to `Joined` is not an advance and is
    /// applied separately.
    pub fn can_advance_to(self, next: SignatureStatus) -> bool {
        matches!(
            (self, next),
            (SignatureStatus::Joined, SignatureStatus::Pending)
                | (SignatureStatus::Pending, SignatureStatus::Signed)
                | (SignatureStatus::Pending, SignatureStatus::Rejected)
        )
    }

    /// Whether the contributor has already cast a decision this round.
    pub fn has_decided(self) -> bool {
        matches!(self, SignatureStatus::Signed | SignatureStatus::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignatureStatus::Joined => "joined",
            SignatureStatus::Pending => "pending",
            SignatureStatus::Signed => "signed",
            SignatureStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's membership in one team of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub user_id: UserId,
    pub identity: IdentitySnapshot,
    pub team: Team,
    pub status: SignatureStatus,
    pub signature_date: Option<DateTime<Utc>>,
    pub invited_at: DateTime<Utc>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl Contributor {
    pub fn joined(
        user_id: UserId,
        identity: IdentitySnapshot,
        team: Team,
        invited_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            identity,
            team,
            status: SignatureStatus::Joined,
            signature_date: None,
            invited_at,
            comments: None,
        }
    }

    /// Counted towards the quorum of the current review round.
    pub fn is_enlisted(&self) -> bool {
        matches!(
            self.status,
            SignatureStatus::Pending | SignatureStatus::Signed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SignatureStatus; 4] = [
        SignatureStatus::Joined,
        SignatureStatus::Pending,
        SignatureStatus::Signed,
        SignatureStatus::Rejected,
    ];

    #[test]
    fn decided_statuses_are_terminal() {
        for from in [SignatureStatus::Signed, SignatureStatus::Rejected] {
            for to in ALL {
                assert!(!from.can_advance_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn joined_cannot_skip_pending() {
        assert!(!SignatureStatus::Joined.can_advance_to(SignatureStatus::Signed));
        assert!(!SignatureStatus::Joined.can_advance_to(SignatureStatus::Rejected));
        assert!(SignatureStatus::Joined.can_advance_to(SignatureStatus::Pending));
    }
}
