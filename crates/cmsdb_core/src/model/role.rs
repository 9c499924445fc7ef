//! Role entity.

use serde::{Deserialize, Serialize};

/// Table backing `Role` on every backend.
pub const ROLES_TABLE: &str = "roles";

/// Stored role row. `id` is a UUID generated at insert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
}

/// Insert params for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub label: String,
    pub description: Option<String>,
}

impl NewRole {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Full-replacement update params for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanges {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
}
