//! Recorder capability and helpers shared by backend recorders.

use crate::audit::event::ChangeEvent;
use crate::db::{Database, DbError, DbResult, TxOf};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default audit table created by the bundled schema bootstrap.
pub const DEFAULT_CHANGE_EVENT_TABLE: &str = "change_events";

static SQL_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid sql identifier regex")
});

/// Persists change events for one storage backend.
///
/// `record` runs on the same transaction as the mutation it describes, so an
/// audit row only becomes visible together with the change.
pub trait ChangeEventRecorder<D: Database> {
    /// Short label used in log events.
    fn name(&self) -> &'static str;

    fn record(&self, tx: &mut TxOf<'_, D>, event: &ChangeEvent) -> DbResult<()>;
}

/// Filter for reading recorded change events back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEventQuery {
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub limit: Option<u32>,
}

impl ChangeEventQuery {
    /// Events for one record of one table.
    pub fn for_record(table_name: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            table_name: Some(table_name.into()),
            record_id: Some(record_id.into()),
            limit: None,
        }
    }
}

/// Returns `name` when it is safe to splice into SQL as a table name.
pub fn validate_table_name(name: &str) -> DbResult<String> {
    if SQL_IDENTIFIER_RE.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_table_name, DEFAULT_CHANGE_EVENT_TABLE};
    use crate::db::DbError;

    #[test]
    fn accepts_plain_identifiers() {
        assert_eq!(
            validate_table_name(DEFAULT_CHANGE_EVENT_TABLE).unwrap(),
            "change_events"
        );
        assert!(validate_table_name("_audit2").is_ok());
    }

    #[test]
    fn rejects_names_that_would_alter_sql() {
        for name in [
            "",
            "1events",
            "events; DROP TABLE roles",
            "audit.events",
            "a\"b",
        ] {
            let err = validate_table_name(name).unwrap_err();
            assert!(matches!(err, DbError::InvalidIdentifier(_)), "{name}");
        }
        assert!(validate_table_name(&"x".repeat(64)).is_err());
    }
}
