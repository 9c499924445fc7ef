//! Audited CRUD commands over relational backends.
//!
//! Every create, update and delete runs inside one transaction together with
//! the change event describing it, so a committed mutation always has exactly
//! one audit row.

pub mod audit;
pub mod command;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use audit::{
    AuditContext, ChangeEvent, ChangeEventQuery, ChangeEventRecorder, Operation,
    SqliteChangeEventRecorder, DEFAULT_CHANGE_EVENT_TABLE,
};
pub use command::{
    create, delete, update, AuditedCommand, CommandError, CommandErrorKind, CommandResult,
    CommandSession, CreateCommand, DeleteCommand, UpdateCommand,
};
pub use db::{
    open_db, open_db_in_memory, open_db_with, Database, DbError, DbOptions, DbResult,
    DbTransaction, TxOf,
};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
