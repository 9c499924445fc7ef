//! Audit records for mutations driven by the command engine.
//!
//! # Responsibility
//! - Define the audit metadata (`AuditContext`) and record (`ChangeEvent`).
//! - Define the recorder capability and its per-backend implementations.
//!
//! # Invariants
//! - Recorders write through the mutation's own transaction; an audit row is
//!   never committed without its mutation, and vice versa.
//! - Audit table names are validated before they are spliced into SQL.

pub mod context;
pub mod event;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod recorder;
pub mod sqlite;

pub use context::AuditContext;
pub use event::{ChangeEvent, Operation};
#[cfg(feature = "mysql")]
pub use self::mysql::MysqlChangeEventRecorder;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresChangeEventRecorder;
pub use recorder::{ChangeEventQuery, ChangeEventRecorder, DEFAULT_CHANGE_EVENT_TABLE};
pub use sqlite::SqliteChangeEventRecorder;
