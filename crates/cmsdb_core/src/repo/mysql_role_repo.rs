//! Role commands and reads for MySQL (`mysql` feature).
//!
//! MySQL has no `RETURNING`, so create reads the inserted row back on the
//! same transaction before handing it to the engine.

use crate::command::{AuditedCommand, CommandSession, CreateCommand, DeleteCommand, UpdateCommand};
use crate::db::mysql::MysqlDatabase;
use crate::db::{DbError, DbResult};
use crate::model::role::{NewRole, Role, RoleChanges, ROLES_TABLE};
use ::mysql::prelude::Queryable;
use ::mysql::Transaction;
use uuid::Uuid;

type RoleColumns = (String, String, Option<String>);

pub struct MysqlCreateRole<'a> {
    session: CommandSession<'a, MysqlDatabase>,
    params: NewRole,
}

impl<'a> MysqlCreateRole<'a> {
    pub fn new(session: CommandSession<'a, MysqlDatabase>, params: NewRole) -> Self {
        Self { session, params }
    }
}

impl AuditedCommand for MysqlCreateRole<'_> {
    type Db = MysqlDatabase;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, MysqlDatabase> {
        &self.session
    }
}

impl CreateCommand for MysqlCreateRole<'_> {
    type Row = Role;
    type Params = NewRole;

    fn params(&self) -> &NewRole {
        &self.params
    }

    fn execute(&self, tx: &mut Transaction<'static>) -> DbResult<Role> {
        let id = Uuid::new_v4().to_string();
        tx.exec_drop(
            "INSERT INTO roles (id, label, description) VALUES (?, ?, ?)",
            (
                id.as_str(),
                self.params.label.as_str(),
                self.params.description.as_deref(),
            ),
        )?;
        select_role(tx, &id, false)?.ok_or_else(|| DbError::not_found(ROLES_TABLE, id))
    }

    fn get_id(&self, row: &Role) -> String {
        row.id.clone()
    }
}

pub struct MysqlUpdateRole<'a> {
    session: CommandSession<'a, MysqlDatabase>,
    changes: RoleChanges,
}

impl<'a> MysqlUpdateRole<'a> {
    pub fn new(session: CommandSession<'a, MysqlDatabase>, changes: RoleChanges) -> Self {
        Self { session, changes }
    }
}

impl AuditedCommand for MysqlUpdateRole<'_> {
    type Db = MysqlDatabase;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, MysqlDatabase> {
        &self.session
    }
}

impl UpdateCommand for MysqlUpdateRole<'_> {
    type Row = Role;
    type Params = RoleChanges;

    fn params(&self) -> &RoleChanges {
        &self.changes
    }

    fn get_id(&self) -> String {
        self.changes.id.clone()
    }

    fn get_before(&self, tx: &mut Transaction<'static>) -> DbResult<Role> {
        select_role(tx, &self.changes.id, true)?
            .ok_or_else(|| DbError::not_found(ROLES_TABLE, self.changes.id.as_str()))
    }

    fn execute(&self, tx: &mut Transaction<'static>) -> DbResult<()> {
        // The row is already locked by `get_before`; MySQL reports zero
        // affected rows for a no-op update, so that count is not checked.
        tx.exec_drop(
            "UPDATE roles SET label = ?, description = ? WHERE id = ?",
            (
                self.changes.label.as_str(),
                self.changes.description.as_deref(),
                self.changes.id.as_str(),
            ),
        )?;
        Ok(())
    }
}

pub struct MysqlDeleteRole<'a> {
    session: CommandSession<'a, MysqlDatabase>,
    id: String,
}

impl<'a> MysqlDeleteRole<'a> {
    pub fn new(session: CommandSession<'a, MysqlDatabase>, id: impl Into<String>) -> Self {
        Self {
            session,
            id: id.into(),
        }
    }
}

impl AuditedCommand for MysqlDeleteRole<'_> {
    type Db = MysqlDatabase;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, MysqlDatabase> {
        &self.session
    }
}

impl DeleteCommand for MysqlDeleteRole<'_> {
    type Row = Role;

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_before(&self, tx: &mut Transaction<'static>) -> DbResult<Role> {
        select_role(tx, &self.id, true)?
            .ok_or_else(|| DbError::not_found(ROLES_TABLE, self.id.as_str()))
    }

    fn execute(&self, tx: &mut Transaction<'static>) -> DbResult<()> {
        tx.exec_drop("DELETE FROM roles WHERE id = ?", (self.id.as_str(),))?;
        if tx.affected_rows() == 0 {
            return Err(DbError::not_found(ROLES_TABLE, self.id.as_str()));
        }
        Ok(())
    }
}

/// Gets one role by id outside any engine transaction.
pub fn mysql_get_role(db: &MysqlDatabase, id: &str) -> DbResult<Option<Role>> {
    let mut conn = db.pool().get_conn()?;
    let row: Option<RoleColumns> = conn.exec_first(
        "SELECT id, label, description FROM roles WHERE id = ?",
        (id,),
    )?;
    Ok(row.map(into_role))
}

fn select_role(tx: &mut Transaction<'static>, id: &str, for_update: bool) -> DbResult<Option<Role>> {
    let sql = if for_update {
        "SELECT id, label, description FROM roles WHERE id = ? FOR UPDATE"
    } else {
        "SELECT id, label, description FROM roles WHERE id = ?"
    };
    let row: Option<RoleColumns> = tx.exec_first(sql, (id,))?;
    Ok(row.map(into_role))
}

fn into_role((id, label, description): RoleColumns) -> Role {
    Role {
        id,
        label,
        description,
    }
}
