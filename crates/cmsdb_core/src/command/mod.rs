//! Audited command contracts and the generic engine that drives them.
//!
//! # Responsibility
//! - Give every entity mutation one of three uniform shapes (create, update,
//!   delete) so a single engine can run all of them on any backend.
//! - Bundle connection, audit metadata and recorder into a `CommandSession`.
//!
//! # Invariants
//! - Create identity comes from the row the backend returned (`get_id(&row)`).
//! - Update/delete identity comes from caller params (`get_id()`).
//! - Failures are observable only through `get_before` and `execute`.

mod engine;
mod error;

pub use engine::{create, delete, update};
pub use error::{CommandError, CommandErrorKind, CommandResult};

use crate::audit::{AuditContext, ChangeEventRecorder};
use crate::db::{Database, DbResult, TxOf};
use serde::Serialize;

/// Connection, audit metadata and recorder shared by one command.
pub struct CommandSession<'a, D: Database> {
    connection: &'a D,
    audit: AuditContext,
    recorder: &'a dyn ChangeEventRecorder<D>,
}

impl<'a, D: Database> CommandSession<'a, D> {
    pub fn new(
        connection: &'a D,
        audit: AuditContext,
        recorder: &'a dyn ChangeEventRecorder<D>,
    ) -> Self {
        Self {
            connection,
            audit,
            recorder,
        }
    }

    pub fn connection(&self) -> &'a D {
        self.connection
    }

    pub fn audit_context(&self) -> &AuditContext {
        &self.audit
    }

    pub fn recorder(&self) -> &'a dyn ChangeEventRecorder<D> {
        self.recorder
    }
}

impl<D: Database> Clone for CommandSession<'_, D> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection,
            audit: self.audit.clone(),
            recorder: self.recorder,
        }
    }
}

/// Part of the contract shared by all three command shapes.
pub trait AuditedCommand {
    type Db: Database;

    /// Table the mutation targets; copied into the change event.
    fn table_name(&self) -> &str;

    fn session(&self) -> &CommandSession<'_, Self::Db>;
}

/// Insert of one new row.
pub trait CreateCommand: AuditedCommand {
    type Row: Serialize;
    type Params: Serialize;

    fn params(&self) -> &Self::Params;

    /// Inserts the row and returns it as the backend stored it.
    fn execute(&self, tx: &mut TxOf<'_, Self::Db>) -> DbResult<Self::Row>;

    /// Identity of a row returned by `execute`.
    fn get_id(&self, row: &Self::Row) -> String;
}

/// In-place update of one existing row.
pub trait UpdateCommand: AuditedCommand {
    type Row: Serialize;
    type Params: Serialize;

    fn params(&self) -> &Self::Params;

    /// Target identity, taken from the params.
    fn get_id(&self) -> String;

    /// Reads the current row. Must fail with `DbError::NotFound` when absent.
    fn get_before(&self, tx: &mut TxOf<'_, Self::Db>) -> DbResult<Self::Row>;

    fn execute(&self, tx: &mut TxOf<'_, Self::Db>) -> DbResult<()>;
}

/// Physical delete of one existing row.
pub trait DeleteCommand: AuditedCommand {
    type Row: Serialize;

    fn get_id(&self) -> String;

    /// Reads the current row. Must fail with `DbError::NotFound` when absent.
    fn get_before(&self, tx: &mut TxOf<'_, Self::Db>) -> DbResult<Self::Row>;

    fn execute(&self, tx: &mut TxOf<'_, Self::Db>) -> DbResult<()>;
}
