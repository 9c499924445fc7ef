//! MySQL backend (`mysql` feature).
//!
//! # Invariants
//! - Each transaction checks out its own pooled connection.
//! - Dropping an unfinished `mysql::Transaction` rolls it back.

use super::{Database, DbResult, DbTransaction};
use ::mysql::prelude::Queryable;
use ::mysql::{Pool, Transaction, TxOpts};
use log::info;

const BOOTSTRAP_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS change_events (
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
        seq BIGINT NOT NULL AUTO_INCREMENT UNIQUE,
        INDEX idx_change_events_record (table_name, record_id)
    ) ENGINE = InnoDB",
    "CREATE TABLE IF NOT EXISTS roles (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        label VARCHAR(255) NOT NULL,
        description TEXT NULL
    ) ENGINE = InnoDB",
];

/// MySQL handle usable by the command engine.
pub struct MysqlDatabase {
    pool: Pool,
}

impl MysqlDatabase {
    /// Connects using a `mysql://` URL and bootstraps the schema.
    pub fn connect(url: &str) -> DbResult<Self> {
        let pool = Pool::new(url)?;
        Self::from_pool(pool)
    }

    /// Wraps an existing pool and bootstraps the schema.
    pub fn from_pool(pool: Pool) -> DbResult<Self> {
        let mut conn = pool.get_conn()?;
        for statement in BOOTSTRAP_SQL {
            conn.query_drop(*statement)?;
        }
        info!("event=db_open module=db status=ok mode=mysql");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl Database for MysqlDatabase {
    type Tx<'c> = Transaction<'static>;

    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    fn begin(&self) -> DbResult<Transaction<'static>> {
        Ok(self.pool.start_transaction(TxOpts::default())?)
    }
}

impl DbTransaction for Transaction<'static> {
    fn commit(self) -> DbResult<()> {
        Transaction::commit(self)?;
        Ok(())
    }

    fn rollback(self) -> DbResult<()> {
        Transaction::rollback(self)?;
        Ok(())
    }
}
