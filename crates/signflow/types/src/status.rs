//! Document lifecycle status and signer tiers.
//!
//! The transition graph is closed: every status change made by the workflow
//! goes through [`DocumentStatus::transition`], so an edge that is not listed
//! here cannot be taken.
//!
//! ```text
//! Draft -> AuthorReview -> VerifierReview -> ValidatorReview -> Approved -> Archived
//!              |                 |                  |
//!              +-----------------+------------------+---> Draft (reject)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status of a document in the approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    AuthorReview,
    VerifierReview,
    ValidatorReview,
    Approved,
    Archived,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 6] = [
        DocumentStatus::Draft,
        DocumentStatus::AuthorReview,
        DocumentStatus::VerifierReview,
        DocumentStatus::ValidatorReview,
        DocumentStatus::Approved,
        DocumentStatus::Archived,
    ];

    /// Whether `next` is a defined edge from `self`.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Draft, AuthorReview)
                | (AuthorReview, VerifierReview)
                | (VerifierReview, ValidatorReview)
                | (ValidatorReview, Approved)
                | (Approved, Archived)
                | (AuthorReview, Draft)
                | (VerifierReview, Draft)
                | (ValidatorReview, Draft)
        )
    }

    /// Take the edge `self -> next`, or fail if it is not in the graph.
    pub fn transition(self, next: DocumentStatus) -> Result<DocumentStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    /// The tier whose signatures are collected in this status.
    pub fn review_tier(self) -> Option<Team> {
        match self {
            DocumentStatus::AuthorReview => Some(Team::Authors),
            DocumentStatus::VerifierReview => Some(Team::Verifiers),
            DocumentStatus::ValidatorReview => Some(Team::Validators),
            _ => None,
        }
    }

    pub fn is_review(self) -> bool {
        self.review_tier().is_some()
    }

    /// Approved and archived documents no longer accept edits or new members.
    pub fn is_locked(self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Archived)
    }

    /// Approved or archived documents can be handed to the renderer.
    pub fn is_finalized(self) -> bool {
        self.is_locked()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::AuthorReview => "author_review",
            DocumentStatus::VerifierReview => "verifier_review",
            DocumentStatus::ValidatorReview => "validator_review",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted status change outside the transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
}

/// Contributor team. Teams are also the ordered signer tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Authors,
    Verifiers,
    Validators,
}

impl Team {
    /// Tiers in signing order.
    pub const ALL: [Team; 3] = [Team::Authors, Team::Verifiers, Team::Validators];

    /// Review status during which this tier signs.
    pub fn review_status(self) -> DocumentStatus {
        match self {
            Team::Authors => DocumentStatus::AuthorReview,
            Team::Verifiers => DocumentStatus::VerifierReview,
            Team::Validators => DocumentStatus::ValidatorReview,
        }
    }

    /// The tier that signs after this one.
    pub fn next(self) -> Option<Team> {
        match self {
            Team::Authors => Some(Team::Verifiers),
            Team::Verifiers => Some(Team::Validators),
            Team::Validators => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::Authors => "authors",
            Team::Verifiers => "verifiers",
            Team::Validators => "validators",
        }
    }

    /// Human-facing label used in notifications.
    pub fn display_name(self) -> &'static str {
        match self {
            Team::Authors => "Authors",
            Team::Verifiers => "Verifiers",
            Team::Validators => "Validators",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reject_edges_only_leave_review_states() {
        for status in DocumentStatus::ALL {
            assert_eq!(
                status.can_transition_to(DocumentStatus::Draft),
                status.is_review(),
                "{status}"
            );
        }
    }

    #[test]
    fn tiers_map_onto_review_statuses() {
        for team in Team::ALL {
            assert_eq!(team.review_status().review_tier(), Some(team));
        }
        assert_eq!(Team::Validators.next(), None);
    }

    #[test]
    fn archived_is_terminal() {
        for next in DocumentStatus::ALL {
            assert!(DocumentStatus::Archived.transition(next).is_err());
        }
    }

    fn status_strategy() -> impl Strategy<Value = DocumentStatus> {
        proptest::sample::select(DocumentStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn transition_agrees_with_graph(from in status_strategy(), to in status_strategy()) {
            prop_assert_eq!(from.transition(to).is_ok(), from.can_transition_to(to));
        }

        #[test]
        fn no_self_loops(status in status_strategy()) {
            prop_assert!(!status.can_transition_to(status));
        }
    }
}
