//! Signflow Types - Data model for the document approval workflow
//!
//! A document moves through a draft, three review tiers and approval. Each
//! tier is a contributor team that must fully sign before the next one starts.
//!
//! ## Key Concepts
//!
//! - **Document**: reference-unique procedure with a revision counter
//! - **Contributor**: membership of one user in one team, with a signature status
//!   and an intentionally stale identity snapshot
//! - **Invitation**: single-use, time-boxed token offering a team seat
//! - **Permission**: explicit read/write/sign grant, lazily expired
//! - **VersionSnapshot**: immutable serialized copy of a document
//! - **ActivityEvent**: hash-linked audit record

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod activity;
pub mod content;
pub mod contributor;
pub mod document;
pub mod export;
pub mod ids;
pub mod invitation;
pub mod permission;
pub mod status;
pub mod user;
pub mod version;

// Re-export main types
pub use activity::{ActivityAction, ActivityAppend, ActivityEvent};
pub use content::{
    Annex, AnnexContent, DocumentContent, DocumentMetadata, FileAttachment, ProcessDescription,
    ProcessGroup, ProcessStep, Term,
};
pub use contributor::{Contributor, IdentitySnapshot, SignatureStatus};
pub use document::{
    Contributors, ContributorSeed, Document, DocumentPatch, NewDocument, Rejection,
};
pub use export::{ExportJob, ExportStatus};
pub use ids::{DocumentId, ExportJobId, InvitationId, SnapshotId, UserId};
pub use invitation::{Invitation, InvitationStatus, InvitationToken};
pub use permission::{EffectiveAccess, Permission, PermissionKind, PermissionStatus};
pub use status::{DocumentStatus, Team, TransitionError};
pub use user::UserProfile;
pub use version::VersionSnapshot;
