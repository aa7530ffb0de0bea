use crate::contributor::IdentitySnapshot;
use crate::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User as resolved from the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub department: String,
    /// Administrative role granted outside this system.
    #[serde(default)]
    pub is_admin: bool,
}

impl UserProfile {
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            name: name.into(),
            title: String::new(),
            department: String::new(),
            is_admin: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>, department: impl Into<String>) -> Self {
        self.title = title.into();
        self.department = department.into();
        self
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Capture the identity fields as of `at`.
    pub fn snapshot(&self, at: DateTime<Utc>) -> IdentitySnapshot {
        IdentitySnapshot {
            name: self.name.clone(),
            title: self.title.clone(),
            department: self.department.clone(),
            captured_at: at,
        }
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}
