//! SQLite implementation of the transaction seam.

use super::{Database, DbError, DbResult, DbTransaction};
use rusqlite::{Connection, Transaction, TransactionBehavior};

impl Database for Connection {
    type Tx<'c> = Transaction<'c>;

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Begins an `IMMEDIATE` transaction so the write lock is held before the
    /// before-image read.
    fn begin(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            self,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl DbTransaction for Transaction<'_> {
    fn commit(self) -> DbResult<()> {
        Transaction::commit(self).map_err(DbError::from)
    }

    fn rollback(self) -> DbResult<()> {
        Transaction::rollback(self).map_err(DbError::from)
    }
}
