//! Signflow workflow engine.
//!
//! Drives procedure documents through a draft, three-tier review and approval
//! lifecycle:
//!
//! ```text
//! Draft -> AuthorReview -> VerifierReview -> ValidatorReview -> Approved -> Archived
//!   ^            |               |                 |
//!   +------------+---------------+-----------------+   (reject)
//! ```
//!
//! External collaborators join through single-use, expiring invitation tokens.
//! Every mutation commits atomically together with its version snapshot and
//! hash-chained activity events. Notifications and exports run in the
//! background and never fail the call that triggered them.
//!
//! [`Signflow`] is the entry point; build one with [`Signflow::builder`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod activity;
pub mod background;
pub mod clock;
pub mod config;
pub mod contributors;
pub mod controller;
pub mod directory;
pub mod engine;
pub mod error;
pub mod export;
pub mod invitations;
pub mod notify;
pub mod permissions;
pub mod telemetry;
pub mod versions;

pub use activity::ActivityRecorder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{InvitationConfig, LoggingConfig, SignflowConfig, WorkflowConfig};
pub use contributors::{ContributorRegistry, Quorum};
pub use controller::{Decision, SignOutcome, SignRequest, SignatureWorkflowController};
pub use directory::{InMemoryDirectory, UserDirectory};
pub use engine::{Signflow, SignflowBuilder};
pub use error::{ErrorKind, WorkflowError, WorkflowResult};
pub use export::{ExportCoordinator, RenderError, Renderer, StaticRenderer};
pub use invitations::{Acceptance, InvitationManager, InviteRequest};
pub use notify::{
    FailingNotifier, LogNotifier, Notification, NotificationDispatcher, NotificationTemplate,
    Notifier, NotifyError, RecordingNotifier, Recipient,
};
pub use permissions::PermissionLedger;
pub use versions::VersionStore;
