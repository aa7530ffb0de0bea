//! Signflow storage abstractions.
//!
//! This crate defines the store contract the workflow engine consumes:
//! - documents with a unique reference and a compare-and-swap revision
//! - invitations with a unique token and conditional status updates
//! - permission grants keyed by (document, user, kind)
//! - append-only version snapshots
//! - a hash-linked activity log
//! - export jobs
//!
//! Reads go through per-record traits. Writes go through
//! [`TransactionalStore::commit`] so each workflow step is all-or-nothing.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod batch;
pub mod chain;
mod error;
pub mod memory;
mod traits;

pub use batch::{
    CommitReceipt, WriteBatch, WriteOp, PENDING_INVITATION_INDEX, REFERENCE_INDEX, TOKEN_INDEX,
};
pub use error::{StorageError, StorageResult};
pub use memory::InMemorySignflowStorage;
pub use traits::{
    ActivityStore, DocumentStore, ExportStore, InvitationStore, PermissionStore, QueryWindow,
    SignflowStorage, SnapshotStore, TransactionalStore,
};
