//! Activity recorder: the audit trail every mutation writes into.

use crate::clock::Clock;
use crate::error::WorkflowResult;
use serde_json::Value;
use signflow_storage::{chain, ActivityStore, QueryWindow, SignflowStorage, WriteBatch};
use signflow_types::{ActivityAction, ActivityAppend, ActivityEvent, DocumentId, UserId};
use std::sync::Arc;

/// Builds activity events and appends them, either inside a mutation's batch
/// or on their own for failed background work.
#[derive(Clone)]
pub struct ActivityRecorder {
    storage: Arc<dyn SignflowStorage>,
    clock: Arc<dyn Clock>,
}

impl ActivityRecorder {
    pub fn new(storage: Arc<dyn SignflowStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Stage an event in `batch` so it commits with the mutation it describes.
    pub fn stage(
        &self,
        batch: &mut WriteBatch,
        actor: Option<&UserId>,
        action: ActivityAction,
        document_id: Option<DocumentId>,
        description: impl Into<String>,
        details: Value,
    ) {
        batch.append_activity(
            ActivityAppend::new(
                self.clock.now(),
                actor.cloned(),
                action,
                document_id,
                description,
            )
            .with_details(details),
        );
    }

    /// Record an external-service failure. Never fails; storage errors are
    /// logged.
    pub async fn record_failure(
        &self,
        action: ActivityAction,
        document_id: Option<DocumentId>,
        description: String,
        details: Value,
    ) {
        let event = ActivityAppend::new(self.clock.now(), None, action, document_id, description)
            .with_details(details)
            .failed();
        if let Err(err) = self.storage.append_activity(event).await {
            tracing::warn!(error = %err, %action, "failed to record failure activity");
        }
    }

    /// Events newest-first, optionally for one document.
    pub async fn list(
        &self,
        document_id: Option<&DocumentId>,
        window: QueryWindow,
    ) -> WorkflowResult<Vec<ActivityEvent>> {
        Ok(self.storage.list_activity(document_id, window).await?)
    }

    /// Recompute the whole hash chain.
    pub async fn verify_chain(&self) -> WorkflowResult<bool> {
        let mut events = self.storage.list_activity(None, QueryWindow::all()).await?;
        events.reverse();
        Ok(chain::verify_chain(&events)?)
    }
}
