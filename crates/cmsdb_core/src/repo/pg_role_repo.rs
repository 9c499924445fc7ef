//! Role commands and reads for PostgreSQL (`postgres` feature).
//!
//! # Invariants
//! - Before-images are read `FOR UPDATE` so the row cannot change between the
//!   read and the mutation.

use crate::command::{AuditedCommand, CommandSession, CreateCommand, DeleteCommand, UpdateCommand};
use crate::db::postgres::{PgDatabase, PgTransaction};
use crate::db::{DbError, DbResult};
use crate::model::role::{NewRole, Role, RoleChanges, ROLES_TABLE};
use ::postgres::{Client, Row};
use uuid::Uuid;

pub struct PgCreateRole<'a> {
    session: CommandSession<'a, PgDatabase>,
    params: NewRole,
}

impl<'a> PgCreateRole<'a> {
    pub fn new(session: CommandSession<'a, PgDatabase>, params: NewRole) -> Self {
        Self { session, params }
    }
}

impl AuditedCommand for PgCreateRole<'_> {
    type Db = PgDatabase;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, PgDatabase> {
        &self.session
    }
}

impl CreateCommand for PgCreateRole<'_> {
    type Row = Role;
    type Params = NewRole;

    fn params(&self) -> &NewRole {
        &self.params
    }

    fn execute(&self, tx: &mut PgTransaction<'_>) -> DbResult<Role> {
        let id = Uuid::new_v4().to_string();
        let row = tx.client().query_one(
            "INSERT INTO roles (id, label, description)
             VALUES ($1, $2, $3)
             RETURNING id, label, description",
            &[&id, &self.params.label, &self.params.description],
        )?;
        parse_role_row(&row)
    }

    fn get_id(&self, row: &Role) -> String {
        row.id.clone()
    }
}

pub struct PgUpdateRole<'a> {
    session: CommandSession<'a, PgDatabase>,
    changes: RoleChanges,
}

impl<'a> PgUpdateRole<'a> {
    pub fn new(session: CommandSession<'a, PgDatabase>, changes: RoleChanges) -> Self {
        Self { session, changes }
    }
}

impl AuditedCommand for PgUpdateRole<'_> {
    type Db = PgDatabase;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, PgDatabase> {
        &self.session
    }
}

impl UpdateCommand for PgUpdateRole<'_> {
    type Row = Role;
    type Params = RoleChanges;

    fn params(&self) -> &RoleChanges {
        &self.changes
    }

    fn get_id(&self) -> String {
        self.changes.id.clone()
    }

    fn get_before(&self, tx: &mut PgTransaction<'_>) -> DbResult<Role> {
        lock_role(tx.client(), &self.changes.id)
    }

    fn execute(&self, tx: &mut PgTransaction<'_>) -> DbResult<()> {
        let changed = tx.client().execute(
            "UPDATE roles SET label = $2, description = $3 WHERE id = $1",
            &[
                &self.changes.id,
                &self.changes.label,
                &self.changes.description,
            ],
        )?;
        if changed == 0 {
            return Err(DbError::not_found(ROLES_TABLE, self.changes.id.as_str()));
        }
        Ok(())
    }
}

pub struct PgDeleteRole<'a> {
    session: CommandSession<'a, PgDatabase>,
    id: String,
}

impl<'a> PgDeleteRole<'a> {
    pub fn new(session: CommandSession<'a, PgDatabase>, id: impl Into<String>) -> Self {
        Self {
            session,
            id: id.into(),
        }
    }
}

impl AuditedCommand for PgDeleteRole<'_> {
    type Db = PgDatabase;

    fn table_name(&self) -> &str {
        ROLES_TABLE
    }

    fn session(&self) -> &CommandSession<'_, PgDatabase> {
        &self.session
    }
}

impl DeleteCommand for PgDeleteRole<'_> {
    type Row = Role;

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_before(&self, tx: &mut PgTransaction<'_>) -> DbResult<Role> {
        lock_role(tx.client(), &self.id)
    }

    fn execute(&self, tx: &mut PgTransaction<'_>) -> DbResult<()> {
        let changed = tx
            .client()
            .execute("DELETE FROM roles WHERE id = $1", &[&self.id])?;
        if changed == 0 {
            return Err(DbError::not_found(ROLES_TABLE, self.id.as_str()));
        }
        Ok(())
    }
}

/// Gets one role by id outside any engine transaction.
pub fn pg_get_role(db: &PgDatabase, id: &str) -> DbResult<Option<Role>> {
    db.with_client(|client| {
        let row = client.query_opt(
            "SELECT id, label, description FROM roles WHERE id = $1",
            &[&id],
        )?;
        row.as_ref().map(parse_role_row).transpose()
    })
}

fn lock_role(client: &mut Client, id: &str) -> DbResult<Role> {
    let row = client
        .query_opt(
            "SELECT id, label, description FROM roles WHERE id = $1 FOR UPDATE",
            &[&id],
        )?
        .ok_or_else(|| DbError::not_found(ROLES_TABLE, id))?;
    parse_role_row(&row)
}

fn parse_role_row(row: &Row) -> DbResult<Role> {
    Ok(Role {
        id: row.try_get("id")?,
        label: row.try_get("label")?,
        description: row.try_get("description")?,
    })
}
