//! Notification dispatch.
//!
//! Delivery is best effort. The dispatcher hands each notification to a
//! background task; a delivery failure is logged and recorded as an
//! unsuccessful activity event, and never reaches the caller that triggered it.

use crate::activity::ActivityRecorder;
use crate::background::BackgroundTasks;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use signflow_types::{ActivityAction, DocumentId, UserId};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    InvitationSent,
    InvitationAccepted,
    ReviewRequested,
    TierCompleted,
    DocumentApproved,
    DocumentRejected,
    DocumentArchived,
}

impl NotificationTemplate {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationTemplate::InvitationSent => "invitation_sent",
            NotificationTemplate::InvitationAccepted => "invitation_accepted",
            NotificationTemplate::ReviewRequested => "review_requested",
            NotificationTemplate::TierCompleted => "tier_completed",
            NotificationTemplate::DocumentApproved => "document_approved",
            NotificationTemplate::DocumentRejected => "document_rejected",
            NotificationTemplate::DocumentArchived => "document_archived",
        }
    }
}

impl fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "to", rename_all = "snake_case")]
pub enum Recipient {
    User(UserId),
    /// Address with no account yet, e.g. an invitee.
    Email(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::User(user_id) => write!(f, "{user_id}"),
            Recipient::Email(email) => write!(f, "email:{email}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub recipient: Recipient,
    pub document_id: Option<DocumentId>,
    pub payload: Value,
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound delivery sink (email, push, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Hands notifications to a [`Notifier`] off the caller's path.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    activity: ActivityRecorder,
    tasks: Arc<BackgroundTasks>,
}

impl NotificationDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        activity: ActivityRecorder,
        tasks: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            notifier,
            activity,
            tasks,
        }
    }

    /// Queue delivery and return immediately.
    pub fn dispatch(&self, notification: Notification) {
        let notifier = self.notifier.clone();
        let activity = self.activity.clone();
        self.tasks.spawn("notification", async move {
            match notifier.notify(&notification).await {
                Ok(()) => debug!(
                    template = %notification.template,
                    recipient = %notification.recipient,
                    "notification delivered"
                ),
                Err(err) => {
                    warn!(
                        template = %notification.template,
                        recipient = %notification.recipient,
                        error = %err,
                        "notification delivery failed"
                    );
                    activity
                        .record_failure(
                            ActivityAction::NotificationFailed,
                            notification.document_id,
                            format!(
                                "{} notification to {} failed",
                                notification.template, notification.recipient
                            ),
                            serde_json::json!({
                                "template": notification.template,
                                "error": err.to_string(),
                            }),
                        )
                        .await;
                }
            }
        });
    }

    pub fn dispatch_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.dispatch(notification);
        }
    }
}

/// Notifier that only logs. Default when no delivery channel is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            template = %notification.template,
            recipient = %notification.recipient,
            "notification"
        );
        Ok(())
    }
}

/// Notifier that forwards every notification to a channel.
pub struct RecordingNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl RecordingNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sender
            .send(notification.clone())
            .map_err(|_| NotifyError("recording channel closed".to_string()))
    }
}

/// Notifier whose every delivery fails.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier {
    reason: String,
}

impl FailingNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError(self.reason.clone()))
    }
}
