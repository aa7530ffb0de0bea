//! Documents and their contributor teams.

use crate::content::DocumentContent;
use crate::contributor::Contributor;
use crate::ids::{DocumentId, UserId};
use crate::status::{DocumentStatus, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three contributor teams of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributors {
    #[serde(default)]
    pub authors: Vec<Contributor>,
    #[serde(default)]
    pub verifiers: Vec<Contributor>,
    #[serde(default)]
    pub validators: Vec<Contributor>,
}

impl Contributors {
    pub fn team(&self, team: Team) -> &[Contributor] {
        match team {
            Team::Authors => &self.authors,
            Team::Verifiers => &self.verifiers,
            Team::Validators => &self.validators,
        }
    }

    pub fn team_mut(&mut self, team: Team) -> &mut Vec<Contributor> {
        match team {
            Team::Authors => &mut self.authors,
            Team::Verifiers => &mut self.verifiers,
            Team::Validators => &mut self.validators,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contributor> {
        self.authors
            .iter()
            .chain(self.verifiers.iter())
            .chain(self.validators.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Contributor> {
        self.authors
            .iter_mut()
            .chain(self.verifiers.iter_mut())
            .chain(self.validators.iter_mut())
    }

    pub fn find(&self, team: Team, user_id: &UserId) -> Option<&Contributor> {
        self.team(team).iter().find(|c| &c.user_id == user_id)
    }

    pub fn find_mut(&mut self, team: Team, user_id: &UserId) -> Option<&mut Contributor> {
        self.team_mut(team).iter_mut().find(|c| &c.user_id == user_id)
    }

    /// Whether the user belongs to any team.
    pub fn contains_user(&self, user_id: &UserId) -> bool {
        self.iter().any(|c| &c.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.authors.len() + self.verifiers.len() + self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reason recorded when a reviewer sends the document back to draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub user_id: UserId,
    pub team: Team,
    pub comments: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

/// A procedure document moving through the approval lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Globally unique human-readable reference.
    pub reference: String,
    pub title: String,
    /// Free-text version label; changing it captures a snapshot.
    pub version: String,
    pub status: DocumentStatus,
    /// Monotonic counter bumped on every stored change, used for
    /// compare-and-swap writes.
    pub revision: u64,
    pub contributors: Contributors,
    #[serde(default)]
    pub content: DocumentContent,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_rejection: Option<Rejection>,
}

impl Document {
    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.created_by == user_id
    }

    /// Tier currently collecting signatures.
    pub fn active_tier(&self) -> Option<Team> {
        self.status.review_tier()
    }
}

/// Contributor to enlist when a document is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorSeed {
    pub user_id: UserId,
    pub team: Team,
}

impl ContributorSeed {
    pub fn new(user_id: impl Into<UserId>, team: Team) -> Self {
        Self {
            user_id: user_id.into(),
            team,
        }
    }
}

/// Input for creating a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub reference: String,
    pub title: String,
    #[serde(default = "default_version_label")]
    pub version: String,
    #[serde(default)]
    pub content: DocumentContent,
    /// Additional contributors. The owner is always added as an author.
    #[serde(default)]
    pub contributors: Vec<ContributorSeed>,
}

impl NewDocument {
    pub fn new(reference: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            title: title.into(),
            version: default_version_label(),
            ..Self::default()
        }
    }

    pub fn with_contributor(mut self, user_id: impl Into<UserId>, team: Team) -> Self {
        self.contributors.push(ContributorSeed::new(user_id, team));
        self
    }

    pub fn with_content(mut self, content: DocumentContent) -> Self {
        self.content = content;
        self
    }
}

pub fn default_version_label() -> String {
    "1.0".to_string()
}

/// Partial edit of a document's editable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub version: Option<String>,
    pub content: Option<DocumentContent>,
    /// Free-text note stored with the snapshot when the version label changes.
    pub change_note: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.version.is_none() && self.content.is_none()
    }
}
