//! Contributor registry: team membership and signature state of a document.
//!
//! Membership changes are applied to an in-memory [`Document`] and persisted by
//! the caller's compare-and-swap commit, so every helper here is synchronous
//! except profile resolution.

use crate::directory::{require_user, UserDirectory};
use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use signflow_types::{Contributor, Document, SignatureStatus, Team, UserId};
use std::sync::Arc;

/// Signature tally of one tier for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    /// Contributors enlisted by the last publish (pending or signed).
    pub enlisted: usize,
    pub signed: usize,
}

impl Quorum {
    /// All enlisted contributors signed. An empty tier is vacuously satisfied.
    pub fn is_satisfied(&self) -> bool {
        self.signed == self.enlisted
    }
}

#[derive(Clone)]
pub struct ContributorRegistry {
    directory: Arc<dyn UserDirectory>,
}

impl ContributorRegistry {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Build a `Joined` contributor with an identity snapshot taken at `at`.
    pub async fn enroll(
        &self,
        user_id: &UserId,
        team: Team,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Contributor> {
        let profile = require_user(self.directory.as_ref(), user_id).await?;
        Ok(Contributor::joined(
            profile.user_id.clone(),
            profile.snapshot(at),
            team,
            at,
        ))
    }

    /// Add `contributor` to its team. A user holds at most one seat per team.
    pub fn add(document: &mut Document, contributor: Contributor) -> WorkflowResult<()> {
        if document
            .contributors
            .find(contributor.team, &contributor.user_id)
            .is_some()
        {
            return Err(WorkflowError::Conflict(format!(
                "{} is already in {} of {}",
                contributor.user_id, contributor.team, document.reference
            )));
        }
        document
            .contributors
            .team_mut(contributor.team)
            .push(contributor);
        Ok(())
    }

    /// Move every `Joined` contributor to `Pending`. Returns how many moved.
    pub fn enlist_all(document: &mut Document) -> usize {
        let mut moved = 0;
        for contributor in document.contributors.iter_mut() {
            if contributor.status == SignatureStatus::Joined {
                contributor.status = SignatureStatus::Pending;
                moved += 1;
            }
        }
        moved
    }

    /// A contributor joining `team` now takes part in the running round: the
    /// document is in review and `team` has not signed off yet.
    pub fn joins_current_round(document: &Document, team: Team) -> bool {
        document
            .active_tier()
            .map_or(false, |active| team >= active)
    }

    pub fn quorum(document: &Document, team: Team) -> Quorum {
        let members = document.contributors.team(team);
        Quorum {
            enlisted: members.iter().filter(|c| c.is_enlisted()).count(),
            signed: members
                .iter()
                .filter(|c| c.status == SignatureStatus::Signed)
                .count(),
        }
    }

    /// Record a decision of a pending contributor and return the updated record.
    pub fn decide(
        document: &mut Document,
        team: Team,
        user_id: &UserId,
        decision: SignatureStatus,
        comments: Option<String>,
        at: DateTime<Utc>,
    ) -> WorkflowResult<Contributor> {
        let document_id = document.id;
        let contributor = document
            .contributors
            .find_mut(team, user_id)
            .ok_or_else(|| WorkflowError::NotAContributor {
                document_id,
                user_id: user_id.clone(),
                team,
            })?;

        if !decision.has_decided() {
            return Err(WorkflowError::Validation(format!(
                "{decision} is not a signature decision"
            )));
        }
        match contributor.status {
            SignatureStatus::Pending => {}
            SignatureStatus::Joined => {
                return Err(WorkflowError::NotEnlisted {
                    user_id: user_id.clone(),
                    team,
                })
            }
            SignatureStatus::Signed | SignatureStatus::Rejected => {
                return Err(WorkflowError::AlreadySigned {
                    user_id: user_id.clone(),
                    team,
                    status: contributor.status,
                })
            }
        }
        debug_assert!(contributor.status.can_advance_to(decision));

        contributor.status = decision;
        contributor.signature_date = Some(at);
        contributor.comments = comments;
        Ok(contributor.clone())
    }

    /// Document-wide reset: every contributor back to `Joined`, decisions
    /// cleared.
    pub fn reset_all(document: &mut Document) {
        for contributor in document.contributors.iter_mut() {
            contributor.status = SignatureStatus::Joined;
            contributor.signature_date = None;
            contributor.comments = None;
        }
    }

    /// Users of `team` who still have to sign this round.
    pub fn pending_members(document: &Document, team: Team) -> Vec<UserId> {
        document
            .contributors
            .team(team)
            .iter()
            .filter(|c| c.status == SignatureStatus::Pending)
            .map(|c| c.user_id.clone())
            .collect()
    }
}
