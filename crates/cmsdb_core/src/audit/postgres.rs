//! PostgreSQL change event recorder (`postgres` feature).

use crate::audit::event::{ChangeEvent, StoredChangeEvent};
use crate::audit::recorder::{
    validate_table_name, ChangeEventQuery, ChangeEventRecorder, DEFAULT_CHANGE_EVENT_TABLE,
};
use crate::db::postgres::{PgDatabase, PgTransaction};
use crate::db::DbResult;
use ::postgres::types::ToSql;
use ::postgres::Row;

/// Writes change events into a PostgreSQL audit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresChangeEventRecorder {
    table: String,
}

impl PostgresChangeEventRecorder {
    pub fn new() -> Self {
        Self {
            table: DEFAULT_CHANGE_EVENT_TABLE.to_string(),
        }
    }

    pub fn with_table(table: &str) -> DbResult<Self> {
        Ok(Self {
            table: validate_table_name(table)?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn ensure_table(&self, db: &PgDatabase) -> DbResult<()> {
        db.with_client(|client| {
            client.batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    event_id TEXT PRIMARY KEY,
                    table_name TEXT NOT NULL,
                    operation TEXT NOT NULL CHECK (operation IN ('create', 'update', 'delete')),
                    record_id TEXT NOT NULL,
                    before_state TEXT,
                    after_state TEXT,
                    actor_id TEXT NOT NULL,
                    node_id TEXT NOT NULL,
                    request_id TEXT NOT NULL,
                    client_addr TEXT NOT NULL,
                    recorded_at BIGINT NOT NULL,
                    seq BIGSERIAL NOT NULL
                );
                ALTER TABLE {table} ADD COLUMN IF NOT EXISTS seq BIGSERIAL NOT NULL;",
                table = self.table
            ))?;
            Ok(())
        })
    }

    /// Reads recorded events back in insertion order (`seq`).
    pub fn events(&self, db: &PgDatabase, query: &ChangeEventQuery) -> DbResult<Vec<ChangeEvent>> {
        let mut sql = format!(
            "SELECT event_id, table_name, operation, record_id, before_state, after_state,
                    actor_id, node_id, request_id, client_addr, recorded_at
             FROM {} WHERE 1 = 1",
            self.table
        );
        let limit = query.limit.map(i64::from);
        let mut bind_values: Vec<&(dyn ToSql + Sync)> = Vec::new();

        if let Some(table_name) = query.table_name.as_ref() {
            bind_values.push(table_name);
            sql.push_str(&format!(" AND table_name = ${}", bind_values.len()));
        }
        if let Some(record_id) = query.record_id.as_ref() {
            bind_values.push(record_id);
            sql.push_str(&format!(" AND record_id = ${}", bind_values.len()));
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = limit.as_ref() {
            bind_values.push(limit);
            sql.push_str(&format!(" LIMIT ${}", bind_values.len()));
        }

        db.with_client(|client| {
            let rows = client.query(sql.as_str(), &bind_values)?;
            rows.iter()
                .map(|row| parse_stored_row(row)?.into_event())
                .collect()
        })
    }
}

impl Default for PostgresChangeEventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeEventRecorder<PgDatabase> for PostgresChangeEventRecorder {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn record(&self, tx: &mut PgTransaction<'_>, event: &ChangeEvent) -> DbResult<()> {
        let stored = event.to_stored()?;
        tx.client().execute(
            format!(
                "INSERT INTO {} (
                    event_id, table_name, operation, record_id, before_state, after_state,
                    actor_id, node_id, request_id, client_addr, recorded_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                self.table
            )
            .as_str(),
            &[
                &stored.event_id,
                &stored.table_name,
                &stored.operation,
                &stored.record_id,
                &stored.before_state,
                &stored.after_state,
                &stored.actor_id,
                &stored.node_id,
                &stored.request_id,
                &stored.client_addr,
                &stored.recorded_at,
            ],
        )?;
        Ok(())
    }
}

fn parse_stored_row(row: &Row) -> DbResult<StoredChangeEvent> {
    Ok(StoredChangeEvent {
        event_id: row.try_get("event_id")?,
        table_name: row.try_get("table_name")?,
        operation: row.try_get("operation")?,
        record_id: row.try_get("record_id")?,
        before_state: row.try_get("before_state")?,
        after_state: row.try_get("after_state")?,
        actor_id: row.try_get("actor_id")?,
        node_id: row.try_get("node_id")?,
        request_id: row.try_get("request_id")?,
        client_addr: row.try_get("client_addr")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}
