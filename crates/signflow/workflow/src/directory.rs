//! User directory seam.
//!
//! Users live in an external identity provider. The workflow only needs to
//! resolve a profile: for identity snapshots, for matching invitation emails,
//! and for the externally granted administrative role.

use crate::error::{WorkflowError, WorkflowResult};
use async_trait::async_trait;
use signflow_types::{UserId, UserProfile};
use std::collections::HashMap;
use std::sync::RwLock;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &UserId) -> WorkflowResult<Option<UserProfile>>;
}

/// Directory backed by a map, for tests and local runs.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let users = users
            .into_iter()
            .map(|profile| (profile.user_id.clone(), profile))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Insert or replace a profile.
    pub fn upsert(&self, profile: UserProfile) -> WorkflowResult<()> {
        let mut guard = self
            .users
            .write()
            .map_err(|_| WorkflowError::ExternalService("directory lock poisoned".to_string()))?;
        guard.insert(profile.user_id.clone(), profile);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get_user(&self, user_id: &UserId) -> WorkflowResult<Option<UserProfile>> {
        let guard = self
            .users
            .read()
            .map_err(|_| WorkflowError::ExternalService("directory lock poisoned".to_string()))?;
        Ok(guard.get(user_id).cloned())
    }
}

/// Resolve a profile or fail with `NotFound`.
pub(crate) async fn require_user(
    directory: &dyn UserDirectory,
    user_id: &UserId,
) -> WorkflowResult<UserProfile> {
    directory
        .get_user(user_id)
        .await?
        .ok_or_else(|| WorkflowError::NotFound(format!("user {user_id}")))
}
