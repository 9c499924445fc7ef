//! Storage backends and the transaction seam used by the command engine.
//!
//! # Responsibility
//! - Define the `Database`/`DbTransaction` contracts every backend implements.
//! - Open and configure SQLite connections and apply schema migrations.
//! - Host the optional PostgreSQL and MySQL backends (cargo features).
//!
//! # Invariants
//! - One `Database::begin` call yields exactly one transaction.
//! - Dropping an unfinished transaction rolls it back on every backend.
//! - SQLite migration version is tracked via `PRAGMA user_version`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
#[cfg(feature = "mysql")]
pub mod mysql;
mod open;
#[cfg(feature = "postgres")]
pub mod postgres;
mod sqlite;

pub use open::{open_db, open_db_in_memory, open_db_with, DbOptions};

pub type DbResult<T> = Result<T, DbError>;

/// Transaction type opened by database `D`.
pub type TxOf<'c, D> = <D as Database>::Tx<'c>;

/// Storage handle able to open one transaction per audited mutation.
///
/// Implemented once per backend. The engine only ever talks to this trait, so
/// backend selection happens at the type level when a command is built.
pub trait Database: 'static {
    /// Live transaction borrowed from this handle.
    type Tx<'c>: DbTransaction
    where
        Self: 'c;

    /// Stable backend label used in log events.
    fn backend_name(&self) -> &'static str;

    /// Opens a new transaction.
    fn begin(&self) -> DbResult<Self::Tx<'_>>;
}

/// Finishing operations for a backend transaction.
pub trait DbTransaction: Sized {
    fn commit(self) -> DbResult<()>;
    fn rollback(self) -> DbResult<()>;
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    #[cfg(feature = "postgres")]
    Postgres(::postgres::Error),
    #[cfg(feature = "mysql")]
    Mysql(::mysql::Error),
    /// Target row does not exist.
    NotFound {
        table: String,
        id: String,
    },
    InvalidData(String),
    InvalidIdentifier(String),
    Serialization(serde_json::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            #[cfg(feature = "postgres")]
            Self::Postgres(err) => write!(f, "{err}"),
            #[cfg(feature = "mysql")]
            Self::Mysql(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "{table} record not found: `{id}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier `{name}`"),
            Self::Serialization(err) => write!(f, "state serialization failed: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            #[cfg(feature = "postgres")]
            Self::Postgres(err) => Some(err),
            #[cfg(feature = "mysql")]
            Self::Mysql(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound { .. }
            | Self::InvalidData(_)
            | Self::InvalidIdentifier(_)
            | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(feature = "postgres")]
impl From<::postgres::Error> for DbError {
    fn from(value: ::postgres::Error) -> Self {
        Self::Postgres(value)
    }
}

#[cfg(feature = "mysql")]
impl From<::mysql::Error> for DbError {
    fn from(value: ::mysql::Error) -> Self {
        Self::Mysql(value)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;

    #[test]
    fn not_found_display_names_table_and_id() {
        let err = DbError::not_found("roles", "abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "roles record not found: `abc`");
    }
}
