use signflow_types::{
    ActivityAppend, ActivityEvent, Document, ExportJob, ExportStatus, Invitation,
    InvitationStatus, Permission, VersionSnapshot,
};

/// Unique index on document references.
pub const REFERENCE_INDEX: &str = "documents.reference";
/// Unique index on invitation tokens.
pub const TOKEN_INDEX: &str = "invitations.token";
/// Partial unique index: one live pending invitation per (document, email).
pub const PENDING_INVITATION_INDEX: &str = "invitations.pending_email";

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert a new document. Fails on duplicate id or reference.
    InsertDocument(Document),
    /// Replace a document if its stored revision is still `expected_revision`.
    /// The replacement must carry `expected_revision + 1`.
    ReplaceDocument {
        document: Document,
        expected_revision: u64,
    },
    /// Insert a new invitation. Fails on duplicate token or when another live
    /// pending invitation exists for the same document and email.
    InsertInvitation(Invitation),
    /// Replace an invitation if its stored status is still `expected_status`.
    UpdateInvitation {
        invitation: Invitation,
        expected_status: InvitationStatus,
    },
    /// Insert or replace the grant keyed by (document, user, kind).
    UpsertPermission(Permission),
    AppendVersion(VersionSnapshot),
    InsertExport(ExportJob),
    UpdateExport {
        job: ExportJob,
        expected_status: ExportStatus,
    },
    /// Append a hash-linked activity event.
    AppendActivity(ActivityAppend),
}

/// Ordered set of writes applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn insert_document(&mut self, document: Document) -> &mut Self {
        self.push(WriteOp::InsertDocument(document))
    }

    pub fn replace_document(&mut self, document: Document, expected_revision: u64) -> &mut Self {
        self.push(WriteOp::ReplaceDocument {
            document,
            expected_revision,
        })
    }

    pub fn insert_invitation(&mut self, invitation: Invitation) -> &mut Self {
        self.push(WriteOp::InsertInvitation(invitation))
    }

    pub fn update_invitation(
        &mut self,
        invitation: Invitation,
        expected_status: InvitationStatus,
    ) -> &mut Self {
        self.push(WriteOp::UpdateInvitation {
            invitation,
            expected_status,
        })
    }

    pub fn upsert_permission(&mut self, permission: Permission) -> &mut Self {
        self.push(WriteOp::UpsertPermission(permission))
    }

    pub fn append_version(&mut self, snapshot: VersionSnapshot) -> &mut Self {
        self.push(WriteOp::AppendVersion(snapshot))
    }

    pub fn insert_export(&mut self, job: ExportJob) -> &mut Self {
        self.push(WriteOp::InsertExport(job))
    }

    pub fn update_export(&mut self, job: ExportJob, expected_status: ExportStatus) -> &mut Self {
        self.push(WriteOp::UpdateExport {
            job,
            expected_status,
        })
    }

    pub fn append_activity(&mut self, event: ActivityAppend) -> &mut Self {
        self.push(WriteOp::AppendActivity(event))
    }

    /// Append every op of `other` after the ops already staged.
    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    /// Activity events stored by the batch, in append order.
    pub activity: Vec<ActivityEvent>,
}
