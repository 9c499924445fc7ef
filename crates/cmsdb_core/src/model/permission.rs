//! Permission entity. Ids are assigned by the database.

use serde::{Deserialize, Serialize};

pub const PERMISSIONS_TABLE: &str = "permissions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: i64,
    pub role_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
    pub role_id: String,
    pub name: String,
}

/// Renames a permission; the owning role is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionChanges {
    pub id: i64,
    pub name: String,
}
