//! MySQL change event recorder (`mysql` feature).

use crate::audit::event::{ChangeEvent, StoredChangeEvent};
use crate::audit::recorder::{
    validate_table_name, ChangeEventQuery, ChangeEventRecorder, DEFAULT_CHANGE_EVENT_TABLE,
};
use crate::db::mysql::MysqlDatabase;
use crate::db::{DbError, DbResult};
use ::mysql::prelude::Queryable;
use ::mysql::{from_row_opt, Row, Transaction, Value};

/// Writes change events into a MySQL audit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlChangeEventRecorder {
    table: String,
}

impl MysqlChangeEventRecorder {
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

    pub fn ensure_table(&self, db: &MysqlDatabase) -> DbResult<()> {
        let mut conn = db.pool().get_conn()?;
        conn.query_drop(format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                event_id CHAR(36) NOT NULL PRIMARY KEY,
                table_name VARCHAR(128) NOT NULL,
                operation VARCHAR(16) NOT NULL,
                record_id VARCHAR(255) NOT NULL,
                before_state LONGTEXT NULL,
                after_state LONGTEXT NULL,
                actor_id VARCHAR(255) NOT NULL,
                node_id VARCHAR(255) NOT NULL,
                request_id VARCHAR(255) NOT NULL,
                client_addr VARCHAR(255) NOT NULL,
                recorded_at BIGINT NOT NULL,
                seq BIGINT NOT NULL AUTO_INCREMENT UNIQUE
            ) ENGINE = InnoDB",
            table = self.table
        ))?;
        Ok(())
    }

    /// Reads recorded events back in recording order.
    pub fn events(
        &self,
        db: &MysqlDatabase,
        query: &ChangeEventQuery,
    ) -> DbResult<Vec<ChangeEvent>> {
        let mut sql = format!(
            "SELECT event_id, table_name, operation, record_id, before_state, after_state,
                    actor_id, node_id, request_id, client_addr, recorded_at
             FROM {} WHERE 1 = 1",
            self.table
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(table_name) = query.table_name.as_ref() {
            sql.push_str(" AND table_name = ?");
            bind_values.push(Value::from(table_name.as_str()));
        }
        if let Some(record_id) = query.record_id.as_ref() {
            sql.push_str(" AND record_id = ?");
            bind_values.push(Value::from(record_id.as_str()));
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::from(limit));
        }

        let mut conn = db.pool().get_conn()?;
        let rows: Vec<Row> = conn.exec(sql, bind_values)?;
        rows.into_iter()
            .map(|row| parse_stored_row(row)?.into_event())
            .collect()
    }
}

impl Default for MysqlChangeEventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeEventRecorder<MysqlDatabase> for MysqlChangeEventRecorder {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn record(&self, tx: &mut Transaction<'static>, event: &ChangeEvent) -> DbResult<()> {
        let stored = event.to_stored()?;
        tx.exec_drop(
            format!(
                "INSERT INTO {} (
                    event_id, table_name, operation, record_id, before_state, after_state,
                    actor_id, node_id, request_id, client_addr, recorded_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                self.table
            ),
            vec![
                Value::from(stored.event_id),
                Value::from(stored.table_name),
                Value::from(stored.operation),
                Value::from(stored.record_id),
                Value::from(stored.before_state),
                Value::from(stored.after_state),
                Value::from(stored.actor_id),
                Value::from(stored.node_id),
                Value::from(stored.request_id),
                Value::from(stored.client_addr),
                Value::from(stored.recorded_at),
            ],
        )?;
        Ok(())
    }
}

type StoredColumns = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
    String,
    i64,
);

fn parse_stored_row(row: Row) -> DbResult<StoredChangeEvent> {
    let (
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
        recorded_at,
    ) = from_row_opt::<StoredColumns>(row)
        .map_err(|err| DbError::InvalidData(format!("unexpected change event row: {err}")))?;

    Ok(StoredChangeEvent {
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
        recorded_at,
    })
}
