//! Role commands and reads for SQLite.
//!
//! # Responsibility
//! - Implement the create/update/delete command contracts for `roles`.
//! - Provide plain reads used by callers outside the engine.
//!
//! # Invariants
//! - Role ids are generated at insert and echoed back through `RETURNING`.
//! - Update/delete report `NotFound` when no row matched.

use crate::command::{AuditedCommand, CommandSession, CreateCommand, DeleteCommand, UpdateCommand};
use crate::db::{DbError, DbResult};
use crate::model::role::{NewRole, Role, RoleChanges, ROLES_TABLE};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

const ROLE_SELECT_SQL: &str = "SELECT
    id,
    label,
    description
FROM roles";

/// Creates one role.
pub struct CreateRole<'a> {
    session: CommandSession<'a, Connection>,
    params: NewRole,
}

impl<'a> CreateRole<'a> {
    pub fn new(session: CommandSession<'a, Connection>, params: NewRole) -> Self {
        Self { session, params }
    }
}

impl AuditedCommand for CreateRole<'_> {
    type Db = Connection;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, Connection> {
        &self.session
    }
}

impl CreateCommand for CreateRole<'_> {
    type Row = Role;
    type Params = NewRole;

    fn params(&self) -> &NewRole {
        &self.params
    }

    fn execute(&self, tx: &mut Transaction<'_>) -> DbResult<Role> {
        let role = tx.query_row(
            "INSERT INTO roles (id, label, description)
             VALUES (?1, ?2, ?3)
             RETURNING id, label, description;",
            params![
                Uuid::new_v4().to_string(),
                self.params.label.as_str(),
                self.params.description.as_deref(),
            ],
            parse_role_row,
        )?;
        Ok(role)
    }

    fn get_id(&self, row: &Role) -> String {
        row.id.clone()
    }
}

/// Replaces label and description of one role.
pub struct UpdateRole<'a> {
    session: CommandSession<'a, Connection>,
    changes: RoleChanges,
}

impl<'a> UpdateRole<'a> {
    pub fn new(session: CommandSession<'a, Connection>, changes: RoleChanges) -> Self {
        Self { session, changes }
    }
}

impl AuditedCommand for UpdateRole<'_> {
    type Db = Connection;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, Connection> {
        &self.session
    }
}

impl UpdateCommand for UpdateRole<'_> {
    type Row = Role;
    type Params = RoleChanges;

    fn params(&self) -> &RoleChanges {
        &self.changes
    }

    fn get_id(&self) -> String {
        self.changes.id.clone()
    }

    fn get_before(&self, tx: &mut Transaction<'_>) -> DbResult<Role> {
        require_role(tx, &self.changes.id)
    }

    fn execute(&self, tx: &mut Transaction<'_>) -> DbResult<()> {
        let changed = tx.execute(
            "UPDATE roles
             SET
                label = ?2,
                description = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                self.changes.id.as_str(),
                self.changes.label.as_str(),
                self.changes.description.as_deref(),
            ],
        )?;

        if changed == 0 {
            return Err(DbError::not_found(ROLES_TABLE, self.changes.id.as_str()));
        }
        Ok(())
    }
}

/// Physically deletes one role.
pub struct DeleteRole<'a> {
    session: CommandSession<'a, Connection>,
    id: String,
}

impl<'a> DeleteRole<'a> {
    pub fn new(session: CommandSession<'a, Connection>, id: impl Into<String>) -> Self {
        Self {
            session,
            id: id.into(),
        }
    }
}

impl AuditedCommand for DeleteRole<'_> {
    type Db = Connection;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, Connection> {
        &self.session
    }
}

impl DeleteCommand for DeleteRole<'_> {
    type Row = Role;

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_before(&self, tx: &mut Transaction<'_>) -> DbResult<Role> {
        require_role(tx, &self.id)
    }

    fn execute(&self, tx: &mut Transaction<'_>) -> DbResult<()> {
        let changed = tx.execute("DELETE FROM roles WHERE id = ?1;", [self.id.as_str()])?;
        if changed == 0 {
            return Err(DbError::not_found(ROLES_TABLE, self.id.as_str()));
        }
        Ok(())
    }
}

/// Gets one role by id.
pub fn get_role(conn: &Connection, id: &str) -> DbResult<Option<Role>> {
    let role = conn
        .query_row(
            &format!("{ROLE_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_role_row,
        )
        .optional()?;
    Ok(role)
}

/// Lists all roles ordered by label, then id.
pub fn list_roles(conn: &Connection) -> DbResult<Vec<Role>> {
    let mut stmt = conn.prepare(&format!("{ROLE_SELECT_SQL} ORDER BY label ASC, id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut roles = Vec::new();
    while let Some(row) = rows.next()? {
        roles.push(parse_role_row(row)?);
    }
    Ok(roles)
}

fn require_role(conn: &Connection, id: &str) -> DbResult<Role> {
    get_role(conn, id)?.ok_or_else(|| DbError::not_found(ROLES_TABLE, id))
}

fn parse_role_row(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get("id")?,
        label: row.get("label")?,
        description: row.get("description")?,
    })
}
