#![allow(dead_code)]

use signflow_types::{Document, NewDocument, Team, UserId, UserProfile};
use signflow_workflow::{
    InMemoryDirectory, ManualClock, Notification, Notifier, RecordingNotifier, Renderer, Signflow,
    SignflowBuilder, StaticRenderer,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const OWNER: &str = "alice";
pub const AUTHOR: &str = "bob";
pub const VERIFIER: &str = "victor";
pub const VALIDATOR: &str = "vera";
pub const GUEST: &str = "xavier";
pub const GUEST_EMAIL: &str = "x@example.com";
pub const ADMIN: &str = "root";
pub const OUTSIDER: &str = "mallory";

pub struct Harness {
    pub engine: Signflow,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<InMemoryDirectory>,
    pub notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    /// Harness with default doubles; `customize` may override any of them.
    pub fn with(customize: impl FnOnce(SignflowBuilder) -> SignflowBuilder) -> Self {
        let clock = Arc::new(ManualClock::default());
        let directory = Arc::new(InMemoryDirectory::with_users(profiles()));
        let (notifier, notifications) = RecordingNotifier::channel();
        let builder = Signflow::builder()
            .clock(clock.clone())
            .directory(directory.clone())
            .notifier(Arc::new(notifier));
        Self {
            engine: customize(builder).build(),
            clock,
            directory,
            notifications,
        }
    }

    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self::with(|builder| builder.notifier(notifier))
    }

    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self::with(|builder| builder.renderer(renderer))
    }

    /// `TG-1` owned by alice (author) with victor verifying and vera validating.
    pub async fn standard_document(&self) -> Document {
        self.engine
            .create_document(
                &user(OWNER),
                NewDocument::new("TG-1", "Tank cleaning procedure")
                    .with_contributor(VERIFIER, Team::Verifiers)
                    .with_contributor(VALIDATOR, Team::Validators),
            )
            .await
            .unwrap()
    }

    /// Drain background work and collect every notification delivered so far.
    pub async fn delivered(&mut self) -> Vec<Notification> {
        self.engine.drain_background().await;
        let mut delivered = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            delivered.push(notification);
        }
        delivered
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub fn profiles() -> Vec<UserProfile> {
    vec![
        UserProfile::new(OWNER, "alice@example.com", "Alice Martin").with_title("Engineer", "Process"),
        UserProfile::new(AUTHOR, "bob@example.com", "Bob Stone"),
        UserProfile::new(VERIFIER, "victor@example.com", "Victor Hale").with_title("Lead", "QA"),
        UserProfile::new(VALIDATOR, "vera@example.com", "Vera Lind").with_title("Director", "Ops"),
        UserProfile::new(GUEST, GUEST_EMAIL, "Xavier Roe"),
        UserProfile::new(ADMIN, "root@example.com", "Root").admin(),
        UserProfile::new(OUTSIDER, "mallory@example.com", "Mallory"),
    ]
}

pub fn renderer_failing() -> Arc<dyn Renderer> {
    Arc::new(StaticRenderer::failing("renderer offline"))
}
