//! Version store: append-only document snapshots.
//!
//! Snapshots are taken at creation and whenever the version label changes,
//! not on every edit. There is no update or delete path.

use crate::activity::ActivityRecorder;
use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use signflow_storage::{QueryWindow, SignflowStorage, SnapshotStore, WriteBatch};
use signflow_types::{ActivityAction, Document, DocumentId, SnapshotId, UserId, VersionSnapshot};
use std::sync::Arc;

#[derive(Clone)]
pub struct VersionStore {
    storage: Arc<dyn SignflowStorage>,
    activity: ActivityRecorder,
}

impl VersionStore {
    pub fn new(storage: Arc<dyn SignflowStorage>, activity: ActivityRecorder) -> Self {
        Self { storage, activity }
    }

    /// Capture `document` into `batch` so the snapshot commits with the
    /// mutation that produced it.
    pub fn stage(
        &self,
        batch: &mut WriteBatch,
        document: &Document,
        change_note: &str,
        created_by: &UserId,
        at: DateTime<Utc>,
    ) -> WorkflowResult<VersionSnapshot> {
        let snapshot = VersionSnapshot::capture(document, change_note, created_by.clone(), at)
            .map_err(|e| WorkflowError::Validation(format!("document does not serialize: {e}")))?;
        batch.append_version(snapshot.clone());
        self.activity.stage(
            batch,
            Some(created_by),
            ActivityAction::VersionCaptured,
            Some(document.id),
            format!("Version {} captured", document.version),
            serde_json::json!({
                "snapshot_id": snapshot.id(),
                "version": snapshot.version(),
                "content_hash": snapshot.content_hash(),
            }),
        );
        Ok(snapshot)
    }

    /// Snapshots of a document, newest first.
    pub async fn list(&self, document_id: &DocumentId) -> WorkflowResult<Vec<VersionSnapshot>> {
        Ok(self
            .storage
            .list_versions(document_id, QueryWindow::all())
            .await?)
    }

    pub async fn get(&self, snapshot_id: &SnapshotId) -> WorkflowResult<VersionSnapshot> {
        self.storage
            .get_version(snapshot_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("snapshot {snapshot_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use signflow_storage::{InMemorySignflowStorage, TransactionalStore};
    use signflow_types::{Contributors, DocumentStatus};

    fn document() -> Document {
        let now = Utc::now();
        Document {
            id: DocumentId::generate(),
            reference: "TG-1".into(),
            title: "Procedure".into(),
            version: "1.0".into(),
            status: DocumentStatus::Draft,
            revision: 1,
            contributors: Contributors::default(),
            content: Default::default(),
            created_by: UserId::new("owner"),
            created_at: now,
            updated_at: now,
            approved_at: None,
            last_rejection: None,
        }
    }

    #[tokio::test]
    async fn read_back_is_byte_identical() {
        let storage = Arc::new(InMemorySignflowStorage::new());
        let store = VersionStore::new(
            storage.clone(),
            ActivityRecorder::new(storage.clone(), Arc::new(SystemClock)),
        );
        let owner = UserId::new("owner");
        let mut doc = document();

        let mut batch = WriteBatch::new();
        let first = store
            .stage(&mut batch, &doc, "Initial version", &owner, Utc::now())
            .unwrap();
        storage.commit(batch).await.unwrap();

        doc.version = "2.0".into();
        doc.title = "Changed".into();
        let mut batch = WriteBatch::new();
        store
            .stage(&mut batch, &doc, "Updated to version 2.0", &owner, Utc::now())
            .unwrap();
        storage.commit(batch).await.unwrap();

        let stored = store.get(&first.id()).await.unwrap();
        assert_eq!(stored.content(), first.content());
        assert_eq!(stored.document().unwrap().title, "Procedure");

        let listed = store.list(&doc.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].version(), "2.0");
    }
}
