//! Permission commands and reads for SQLite.
//!
//! # Invariants
//! - Permission ids come from `AUTOINCREMENT` and are never reused.
//! - `role_id` must reference an existing role (`foreign_keys=ON`).

use crate::command::{AuditedCommand, CommandSession, CreateCommand, DeleteCommand, UpdateCommand};
use crate::db::{DbError, DbResult};
use crate::model::permission::{
    NewPermission, Permission, PermissionChanges, PERMISSIONS_TABLE,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

pub struct CreatePermission<'a> {
    session: CommandSession<'a, Connection>,
    params: NewPermission,
}

impl<'a> CreatePermission<'a> {
    pub fn new(session: CommandSession<'a, Connection>, params: NewPermission) -> Self {
        Self { session, params }
    }
}

impl AuditedCommand for CreatePermission<'_> {
    type Db = Connection;

    fn table_name(&self) -> &str {
        PERMISSIONS_TABLE
    }

    fn session(&self) -> &CommandSession<'_, Connection> {
        &self.session
    }
}

impl CreateCommand for CreatePermission<'_> {
    type Row = Permission;
    type Params = NewPermission;

    fn params(&self) -> &NewPermission {
        &self.params
    }

    fn execute(&self, tx: &mut Transaction<'_>) -> DbResult<Permission> {
        let permission = tx.query_row(
            "INSERT INTO permissions (role_id, name)
             VALUES (?1, ?2)
             RETURNING id, role_id, name;",
            params![self.params.role_id.as_str(), self.params.name.as_str()],
            parse_permission_row,
        )?;
        Ok(permission)
    }

    fn get_id(&self, row: &Permission) -> String {
        row.id.to_string()
    }
}

pub struct UpdatePermission<'a> {
    session: CommandSession<'a, Connection>,
    changes: PermissionChanges,
}

impl<'a> UpdatePermission<'a> {
    pub fn new(session: CommandSession<'a, Connection>, changes: PermissionChanges) -> Self {
        Self { session, changes }
    }
}

impl AuditedCommand for UpdatePermission<'_> {
    type Db = Connection;

    fn table_name(&self) -> &str {
        PERMISSIONS_TABLE
    }

    fn session(&self) -> &CommandSession<'_, Connection> {
        &self.session
    }
}

impl UpdateCommand for UpdatePermission<'_> {
    type Row = Permission;
    type Params = PermissionChanges;

    fn params(&self) -> &PermissionChanges {
        &self.changes
    }

    fn get_id(&self) -> String {
        self.changes.id.to_string()
    }

    fn get_before(&self, tx: &mut Transaction<'_>) -> DbResult<Permission> {
        require_permission(tx, self.changes.id)
    }

    fn execute(&self, tx: &mut Transaction<'_>) -> DbResult<()> {
        let changed = tx.execute(
            "UPDATE permissions SET name = ?2 WHERE id = ?1;",
            params![self.changes.id, self.changes.name.as_str()],
        )?;
        if changed == 0 {
            return Err(DbError::not_found(
                PERMISSIONS_TABLE,
                self.changes.id.to_string(),
            ));
        }
        Ok(())
    }
}

pub struct DeletePermission<'a> {
    session: CommandSession<'a, Connection>,
    id: i64,
}

impl<'a> DeletePermission<'a> {
    pub fn new(session: CommandSession<'a, Connection>, id: i64) -> Self {
        Self { session, id }
    }
}

impl AuditedCommand for DeletePermission<'_> {
    type Db = Connection;

    fn table_name(&self) -> &str {
        PERMISSIONS_TABLE
    }

    fn session(&self) -> &CommandSession<'_, Connection> {
        &self.session
    }
}

impl DeleteCommand for DeletePermission<'_> {
    type Row = Permission;

    fn get_id(&self) -> String {
        self.id.to_string()
    }

    fn get_before(&self, tx: &mut Transaction<'_>) -> DbResult<Permission> {
        require_permission(tx, self.id)
    }

    fn execute(&self, tx: &mut Transaction<'_>) -> DbResult<()> {
        let changed = tx.execute("DELETE FROM permissions WHERE id = ?1;", [self.id])?;
        if changed == 0 {
            return Err(DbError::not_found(PERMISSIONS_TABLE, self.id.to_string()));
        }
        Ok(())
    }
}

pub fn get_permission(conn: &Connection, id: i64) -> DbResult<Option<Permission>> {
    let permission = conn
        .query_row(
            "SELECT id, role_id, name FROM permissions WHERE id = ?1;",
            [id],
            parse_permission_row,
        )
        .optional()?;
    Ok(permission)
}

/// Lists permissions of one role in id order.
pub fn list_permissions_for_role(conn: &Connection, role_id: &str) -> DbResult<Vec<Permission>> {
    let mut stmt = conn.prepare(
        "SELECT id, role_id, name
         FROM permissions
         WHERE role_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([role_id])?;
    let mut permissions = Vec::new();
    while let Some(row) = rows.next()? {
        permissions.push(parse_permission_row(row)?);
    }
    Ok(permissions)
}

fn require_permission(conn: &Connection, id: i64) -> DbResult<Permission> {
    get_permission(conn, id)?.ok_or_else(|| DbError::not_found(PERMISSIONS_TABLE, id.to_string()))
}

fn parse_permission_row(row: &Row<'_>) -> rusqlite::Result<Permission> {
    Ok(Permission {
        id: row.get("id")?,
        role_id: row.get("role_id")?,
        name: row.get("name")?,
    })
}
