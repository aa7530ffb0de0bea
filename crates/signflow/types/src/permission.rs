//! Explicit per-document access grants.

use crate::ids::{DocumentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Read,
    Write,
    Sign,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 3] =
        [PermissionKind::Read, PermissionKind::Write, PermissionKind::Sign];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKind::Read => "read",
            PermissionKind::Write => "write",
            PermissionKind::Sign => "sign",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Active,
    Revoked,
    Expired,
}

/// One `(document, user, kind)` grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub kind: PermissionKind,
    pub status: PermissionStatus,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Active and not past `expires_at`. The stored status is not consulted
    /// for expiry; nothing sweeps expired grants.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PermissionStatus::Active
            && self.expires_at.map_or(true, |expires| now <= expires)
    }
}

/// Set of permission kinds a user holds on a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAccess(BTreeSet<PermissionKind>);

impl EffectiveAccess {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self(PermissionKind::ALL.into_iter().collect())
    }

    pub fn insert(&mut self, kind: PermissionKind) {
        self.0.insert(kind);
    }

    pub fn contains(&self, kind: PermissionKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_full(&self) -> bool {
        self.0.len() == PermissionKind::ALL.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PermissionKind> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PermissionKind> for EffectiveAccess {
    fn from_iter<I: IntoIterator<Item = PermissionKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
