//! Embedded SQLite schema steps.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - `PRAGMA user_version` always equals the last step applied; every
//!   pending step plus the version bump runs inside one transaction.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "change_events",
        sql: include_str!("0001_change_events.sql"),
    },
    SchemaStep {
        version: 2,
        name: "roles",
        sql: include_str!("0002_roles.sql"),
    },
    SchemaStep {
        version: 3,
        name: "permissions",
        sql: include_str!("0003_permissions.sql"),
    },
];

/// Schema version this build brings databases up to.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings `conn` up to `latest_version()`.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer
///   build.
/// - Any SQL failure; the transaction is dropped and nothing is applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        debug!(
            "event=db_migrate_step module=db status=start version={} name={}",
            step.version, step.name
        );
        tx.execute_batch(step.sql)?;
    }
    // PRAGMA does not accept bound parameters.
    tx.execute_batch(&format!("PRAGMA user_version = {latest};"))?;
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from,
        latest,
        pending.len()
    );
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version, SCHEMA_STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_are_contiguous_from_one() {
        for (index, step) in SCHEMA_STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "{}", step.name);
        }
    }

    #[test]
    fn partially_migrated_database_only_runs_pending_steps() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_STEPS[0].sql).unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();

        apply_migrations(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        let permissions: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'permissions';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(permissions, 1);
    }

    #[test]
    fn failing_step_leaves_version_untouched() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE permissions (id INTEGER PRIMARY KEY);").unwrap();

        assert!(apply_migrations(&mut conn).is_err());
        assert_eq!(schema_version(&conn).unwrap(), 0);
        let audit_tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'change_events';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(audit_tables, 0);
    }
}
