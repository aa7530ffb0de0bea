//! Export of finalized documents through an external renderer.
//!
//! A job is stored as `Generating` together with its request activity, the
//! renderer runs in the background, and the job is then moved to `Completed`
//! or `Failed` with a conditional update. Render failures are recorded on the
//! job and in the activity log; they never fail the request.

use crate::activity::ActivityRecorder;
use crate::background::BackgroundTasks;
use crate::clock::Clock;
use crate::error::{WorkflowError, WorkflowResult};
use async_trait::async_trait;
use signflow_storage::{ExportStore, SignflowStorage, TransactionalStore, WriteBatch};
use signflow_types::{
    ActivityAction, ActivityAppend, Document, ExportJob, ExportJobId, ExportStatus, UserId,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// External renderer producing a downloadable artifact.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `document` and return the artifact URL.
    async fn render(&self, document: &Document) -> Result<String, RenderError>;
}

/// Renderer returning predictable URLs, or a fixed failure.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    base_url: String,
    failure: Option<String>,
}

impl StaticRenderer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            failure: None,
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            base_url: String::new(),
            failure: Some(reason.into()),
        }
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(&self, document: &Document) -> Result<String, RenderError> {
        match &self.failure {
            Some(reason) => Err(RenderError(reason.clone())),
            None => Ok(format!(
                "{}/{}-r{}.pdf",
                self.base_url.trim_end_matches('/'),
                document.reference,
                document.revision
            )),
        }
    }
}

#[derive(Clone)]
pub struct ExportCoordinator {
    storage: Arc<dyn SignflowStorage>,
    renderer: Arc<dyn Renderer>,
    activity: ActivityRecorder,
    clock: Arc<dyn Clock>,
    tasks: Arc<BackgroundTasks>,
}

impl ExportCoordinator {
    pub fn new(
        storage: Arc<dyn SignflowStorage>,
        renderer: Arc<dyn Renderer>,
        activity: ActivityRecorder,
        clock: Arc<dyn Clock>,
        tasks: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            storage,
            renderer,
            activity,
            clock,
            tasks,
        }
    }

    /// Store a `Generating` job for a finalized document and start rendering.
    pub async fn request(
        &self,
        document: &Document,
        requested_by: Option<&UserId>,
    ) -> WorkflowResult<ExportJob> {
        if !document.status.is_finalized() {
            return Err(WorkflowError::InvalidState {
                document_id: document.id,
                status: document.status,
                action: "export",
            });
        }

        let job = ExportJob::generating(
            document.id,
            document.revision,
            requested_by.cloned(),
            self.clock.now(),
        );
        let mut batch = WriteBatch::new();
        batch.insert_export(job.clone());
        self.activity.stage(
            &mut batch,
            requested_by,
            ActivityAction::ExportRequested,
            Some(document.id),
            format!("Export requested for {}", document.reference),
            serde_json::json!({ "job_id": job.id }),
        );
        self.storage.commit(batch).await?;
        info!(document_id = %document.id, job_id = %job.id, "export requested");

        let worker = self.clone();
        let snapshot = document.clone();
        let pending = job.clone();
        self.tasks.spawn("export", async move {
            worker.run(snapshot, pending).await;
        });

        Ok(job)
    }

    async fn run(&self, document: Document, mut job: ExportJob) {
        let rendered = self.renderer.render(&document).await;
        let now = self.clock.now();
        let (action, description, success) = match rendered {
            Ok(url) => {
                job.complete(url, now);
                (
                    ActivityAction::ExportCompleted,
                    format!("Export of {} completed", document.reference),
                    true,
                )
            }
            Err(err) => {
                warn!(document_id = %document.id, job_id = %job.id, error = %err, "export failed");
                job.fail(err.to_string(), now);
                (
                    ActivityAction::ExportFailed,
                    format!("Export of {} failed", document.reference),
                    false,
                )
            }
        };

        let mut event = ActivityAppend::new(now, None, action, Some(document.id), description)
            .with_details(serde_json::json!({ "job_id": job.id, "url": job.url, "error": job.error }));
        if !success {
            event = event.failed();
        }

        let mut batch = WriteBatch::new();
        batch
            .update_export(job.clone(), ExportStatus::Generating)
            .append_activity(event);
        if let Err(err) = self.storage.commit(batch).await {
            warn!(job_id = %job.id, error = %err, "failed to store export outcome");
        }
    }

    pub async fn status(&self, job_id: &ExportJobId) -> WorkflowResult<ExportJob> {
        self.storage
            .get_export(job_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("export {job_id}")))
    }
}
