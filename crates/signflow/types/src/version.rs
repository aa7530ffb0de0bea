//! Immutable document snapshots.

use crate::document::Document;
use crate::ids::{DocumentId, SnapshotId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full copy of a document at the moment it was captured.
///
/// Fields are private and there are no setters: once captured, a snapshot is
/// only ever read. The document is stored as serialized bytes so read-back is
/// byte-identical to what was written, and `content_hash` (blake3 over those
/// bytes) lets callers check that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    id: SnapshotId,
    document_id: DocumentId,
    version: String,
    content: Vec<u8>,
    content_hash: String,
    change_note: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl VersionSnapshot {
    pub fn capture(
        document: &Document,
        change_note: impl Into<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let content = serde_json::to_vec(document)?;
        let content_hash = blake3::hash(&content).to_hex().to_string();
        Ok(Self {
            id: SnapshotId::generate(),
            document_id: document.id,
            version: document.version.clone(),
            content,
            content_hash,
            change_note: change_note.into(),
            created_by,
            created_at,
        })
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Serialized document bytes exactly as captured.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn change_note(&self) -> &str {
        &self.change_note
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Decode the captured document.
    pub fn document(&self) -> Result<Document, serde_json::Error> {
        serde_json::from_slice(&self.content)
    }

    /// Recompute the hash of the stored bytes and compare.
    pub fn verify(&self) -> bool {
        blake3::hash(&self.content).to_hex().as_str() == self.content_hash
    }
}
