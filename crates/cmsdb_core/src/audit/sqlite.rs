//! SQLite change event recorder.

use crate::audit::event::{ChangeEvent, StoredChangeEvent};
use crate::audit::recorder::{
    validate_table_name, ChangeEventQuery, ChangeEventRecorder, DEFAULT_CHANGE_EVENT_TABLE,
};
use crate::db::DbResult;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};

/// Writes change events into a SQLite audit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteChangeEventRecorder {
    table: String,
}

impl SqliteChangeEventRecorder {
    /// Recorder targeting the migrated `change_events` table.
    pub fn new() -> Self {
        Self {
            table: DEFAULT_CHANGE_EVENT_TABLE.to_string(),
        }
    }

    /// Recorder targeting a custom audit table.
    pub fn with_table(table: &str) -> DbResult<Self> {
        Ok(Self {
            table: validate_table_name(table)?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the audit table when it does not exist yet.
    pub fn ensure_table(&self, conn: &Connection) -> DbResult<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                event_id TEXT PRIMARY KEY NOT NULL,
                table_name TEXT NOT NULL,
                operation TEXT NOT NULL CHECK (operation IN ('create', 'update', 'delete')),
                record_id TEXT NOT NULL,
                before_state TEXT,
                after_state TEXT,
                actor_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                request_id TEXT NOT NULL,
                client_addr TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            );",
            table = self.table
        ))?;
        Ok(())
    }

    /// Reads recorded events back in recording order.
    pub fn events(&self, conn: &Connection, query: &ChangeEventQuery) -> DbResult<Vec<ChangeEvent>> {
        let mut sql = format!(
            "SELECT
                event_id,
                table_name,
                operation,
                record_id,
                before_state,
                after_state,
                actor_id,
                node_id,
                request_id,
                client_addr,
                recorded_at
             FROM {} WHERE 1 = 1",
            self.table
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(table_name) = query.table_name.as_ref() {
            sql.push_str(" AND table_name = ?");
            bind_values.push(Value::Text(table_name.clone()));
        }
        if let Some(record_id) = query.record_id.as_ref() {
            sql.push_str(" AND record_id = ?");
            bind_values.push(Value::Text(record_id.clone()));
        }

        sql.push_str(" ORDER BY rowid ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_stored_row(row)?.into_event()?);
        }

        Ok(events)
    }
}

impl Default for SqliteChangeEventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeEventRecorder<Connection> for SqliteChangeEventRecorder {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn record(&self, tx: &mut Transaction<'_>, event: &ChangeEvent) -> DbResult<()> {
        let stored = event.to_stored()?;
        tx.execute(
            &format!(
                "INSERT INTO {} (
                    event_id,
                    table_name,
                    operation,
                    record_id,
                    before_state,
                    after_state,
                    actor_id,
                    node_id,
                    request_id,
                    client_addr,
                    recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                self.table
            ),
            params![
                stored.event_id,
                stored.table_name,
                stored.operation,
                stored.record_id,
                stored.before_state,
                stored.after_state,
                stored.actor_id,
                stored.node_id,
                stored.request_id,
                stored.client_addr,
                stored.recorded_at,
            ],
        )?;
        Ok(())
    }
}

fn parse_stored_row(row: &Row<'_>) -> rusqlite::Result<StoredChangeEvent> {
    Ok(StoredChangeEvent {
        event_id: row.get("event_id")?,
        table_name: row.get("table_name")?,
        operation: row.get("operation")?,
        record_id: row.get("record_id")?,
        before_state: row.get("before_state")?,
        after_state: row.get("after_state")?,
        actor_id: row.get("actor_id")?,
        node_id: row.get("node_id")?,
        request_id: row.get("request_id")?,
        client_addr: row.get("client_addr")?,
        recorded_at: row.get("recorded_at")?,
    })
}
