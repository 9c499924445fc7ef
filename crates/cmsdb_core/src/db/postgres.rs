//! PostgreSQL backend (`postgres` feature).
//!
//! # Responsibility
//! - Wrap a synchronous `postgres::Client` behind the `Database` seam.
//! - Bootstrap the audit and reference tables on connect.
//!
//! # Invariants
//! - At most one transaction per `PgDatabase` is open at a time.
//! - Transactions run at `READ COMMITTED`; dropping an unfinished one issues
//!   `ROLLBACK`.

use super::{Database, DbResult, DbTransaction};
use log::{info, warn};
use ::postgres::{Client, NoTls};
use std::sync::{Mutex, MutexGuard, PoisonError};

const BOOTSTRAP_SQL: &str = "
CREATE TABLE IF NOT EXISTS change_events (
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
ALTER TABLE change_events ADD COLUMN IF NOT EXISTS seq BIGSERIAL NOT NULL;
CREATE INDEX IF NOT EXISTS idx_change_events_record
    ON change_events (table_name, record_id);
CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    description TEXT
);
";

/// PostgreSQL handle usable by the command engine.
pub struct PgDatabase {
    client: Mutex<Client>,
}

impl PgDatabase {
    /// Connects without TLS and bootstraps the schema.
    ///
    /// `params` uses the libpq key/value or URL syntax accepted by
    /// `postgres::Client::connect`.
    pub fn connect(params: &str) -> DbResult<Self> {
        let client = Client::connect(params, NoTls)?;
        Self::from_client(client)
    }

    /// Wraps an already connected client and bootstraps the schema.
    pub fn from_client(mut client: Client) -> DbResult<Self> {
        client.batch_execute(BOOTSTRAP_SQL)?;
        info!("event=db_open module=db status=ok mode=postgres");
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    /// Runs `f` with exclusive access to the client, outside any engine
    /// transaction. Used for reads.
    ///
    /// Takes the same lock a live `PgTransaction` holds, so calling this on a
    /// thread that still owns an unfinished transaction from this handle
    /// deadlocks. Recorders and commands must use `PgTransaction::client`.
    pub fn with_client<T>(&self, f: impl FnOnce(&mut Client) -> DbResult<T>) -> DbResult<T> {
        let mut client = self.lock();
        f(&mut client)
    }

    fn lock(&self) -> MutexGuard<'_, Client> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Open PostgreSQL transaction holding the client lock.
pub struct PgTransaction<'c> {
    client: MutexGuard<'c, Client>,
    open: bool,
}

impl PgTransaction<'_> {
    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Drop for PgTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.client.batch_execute("ROLLBACK") {
                warn!("event=tx_drop module=db status=error backend=postgres error={err}");
            }
        }
    }
}

impl Database for PgDatabase {
    type Tx<'c> = PgTransaction<'c>;

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn begin(&self) -> DbResult<PgTransaction<'_>> {
        let mut client = self.lock();
        client.batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED")?;
        Ok(PgTransaction { client, open: true })
    }
}

impl DbTransaction for PgTransaction<'_> {
    fn commit(mut self) -> DbResult<()> {
        self.client.batch_execute("COMMIT")?;
        self.open = false;
        Ok(())
    }

    fn rollback(mut self) -> DbResult<()> {
        self.open = false;
        self.client.batch_execute("ROLLBACK")?;
        Ok(())
    }
}
