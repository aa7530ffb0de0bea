//! Rendered-artifact export jobs.

use crate::ids::{DocumentId, ExportJobId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `Generating -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Generating,
    Completed,
    Failed,
}

impl ExportStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExportStatus::Generating)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: ExportJobId,
    pub document_id: DocumentId,
    /// Document revision handed to the renderer.
    pub revision: u64,
    pub requested_by: Option<UserId>,
    pub status: ExportStatus,
    pub url: Option<String>,
    pub error: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    pub fn generating(
        document_id: DocumentId,
        revision: u64,
        requested_by: Option<UserId>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ExportJobId::generate(),
            document_id,
            revision,
            requested_by,
            status: ExportStatus::Generating,
            url: None,
            error: None,
            requested_at,
            finished_at: None,
        }
    }

    pub fn complete(&mut self, url: String, at: DateTime<Utc>) {
        self.status = ExportStatus::Completed;
        self.url = Some(url);
        self.finished_at = Some(at);
    }

    pub fn fail(&mut self, error: String, at: DateTime<Utc>) {
        self.status = ExportStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(at);
    }
}
