//! Transaction orchestration for audited commands.
//!
//! Each call owns exactly one transaction: begin, run the command callbacks,
//! hand the change event to the recorder on the same transaction, then commit.
//! Any failure rolls the whole transaction back, so a mutation is never
//! visible without its audit row.

use super::error::{CommandError, CommandErrorKind, CommandResult};
use super::{CreateCommand, DeleteCommand, UpdateCommand};
use crate::audit::{ChangeEvent, ChangeEventRecorder, Operation};
use crate::db::{Database, DbError, DbTransaction, TxOf};
use log::{debug, error, info, warn};
use std::time::Instant;

/// Inserts a row and records a `create` event for it.
///
/// Returns the row as the backend returned it. The recorded identifier is
/// always derived from that row, never predicted from the params.
pub fn create<C: CreateCommand>(cmd: &C) -> CommandResult<C::Row> {
    let session = cmd.session();
    let run = Run::start(cmd.table_name(), Operation::Create, session.connection());
    let mut tx = run.begin(session.connection())?;

    let row = match cmd.execute(&mut tx) {
        Ok(row) => row,
        Err(err) => {
            let kind = classify(&err, CommandErrorKind::Mutation);
            return Err(run.abort(tx, kind, err));
        }
    };

    let record_id = cmd.get_id(&row);
    let event = match ChangeEvent::created(
        run.table,
        record_id,
        &row,
        session.audit_context().clone(),
    ) {
        Ok(event) => event,
        Err(err) => return Err(run.abort(tx, CommandErrorKind::Audit, err)),
    };

    run.finish::<C::Db>(tx, session.recorder(), &event)?;
    Ok(row)
}

/// Updates an existing row and records an `update` event carrying the
/// before-image and the applied params.
pub fn update<C: UpdateCommand>(cmd: &C) -> CommandResult<()> {
    let session = cmd.session();
    let run = Run::start(cmd.table_name(), Operation::Update, session.connection());
    let record_id = cmd.get_id();
    let mut tx = run.begin(session.connection())?;

    let before = match cmd.get_before(&mut tx) {
        Ok(row) => row,
        Err(err) => {
            let kind = classify(&err, CommandErrorKind::ReadBefore);
            return Err(run.abort(tx, kind, err));
        }
    };

    if let Err(err) = cmd.execute(&mut tx) {
        let kind = classify(&err, CommandErrorKind::Mutation);
        return Err(run.abort(tx, kind, err));
    }

    let event = match ChangeEvent::updated(
        run.table,
        record_id,
        &before,
        cmd.params(),
        session.audit_context().clone(),
    ) {
        Ok(event) => event,
        Err(err) => return Err(run.abort(tx, CommandErrorKind::Audit, err)),
    };

    run.finish::<C::Db>(tx, session.recorder(), &event)
}

/// Physically deletes an existing row and records a `delete` event carrying
/// the before-image.
pub fn delete<C: DeleteCommand>(cmd: &C) -> CommandResult<()> {
    let session = cmd.session();
    let run = Run::start(cmd.table_name(), Operation::Delete, session.connection());
    let record_id = cmd.get_id();
    let mut tx = run.begin(session.connection())?;

    let before = match cmd.get_before(&mut tx) {
        Ok(row) => row,
        Err(err) => {
            let kind = classify(&err, CommandErrorKind::ReadBefore);
            return Err(run.abort(tx, kind, err));
        }
    };

    if let Err(err) = cmd.execute(&mut tx) {
        let kind = classify(&err, CommandErrorKind::Mutation);
        return Err(run.abort(tx, kind, err));
    }

    let event = match ChangeEvent::deleted(
        run.table,
        record_id,
        &before,
        session.audit_context().clone(),
    ) {
        Ok(event) => event,
        Err(err) => return Err(run.abort(tx, CommandErrorKind::Audit, err)),
    };

    run.finish::<C::Db>(tx, session.recorder(), &event)
}

fn classify(err: &DbError, fallback: CommandErrorKind) -> CommandErrorKind {
    if err.is_not_found() {
        CommandErrorKind::NotFound
    } else {
        fallback
    }
}

/// Per-call bookkeeping shared by the three operations.
struct Run<'a> {
    table: &'a str,
    operation: Operation,
    backend: &'static str,
    started_at: Instant,
}

impl<'a> Run<'a> {
    fn start<D: Database>(table: &'a str, operation: Operation, connection: &D) -> Self {
        Self {
            table,
            operation,
            backend: connection.backend_name(),
            started_at: Instant::now(),
        }
    }

    fn begin<'c, D: Database>(&self, connection: &'c D) -> CommandResult<TxOf<'c, D>> {
        debug!(
            "event=command_begin module=command status=start op={} table={} backend={}",
            self.operation, self.table, self.backend
        );
        connection.begin().map_err(|err| {
            error!(
                "event=command_begin module=command status=error op={} table={} backend={} error={}",
                self.operation, self.table, self.backend, err
            );
            CommandError::new(self.table, self.operation, CommandErrorKind::Begin, err)
        })
    }

    /// Rolls back and builds the error returned to the caller.
    fn abort<T: DbTransaction>(&self, tx: T, kind: CommandErrorKind, err: DbError) -> CommandError {
        let rollback_failure = tx.rollback().err();
        match &rollback_failure {
            None => warn!(
                "event=command_rollback module=command status=ok op={} table={} backend={} stage={:?} duration_ms={} error={}",
                self.operation,
                self.table,
                self.backend,
                kind,
                self.started_at.elapsed().as_millis(),
                err
            ),
            Some(rollback_err) => error!(
                "event=command_rollback module=command status=error op={} table={} backend={} stage={:?} duration_ms={} error={} rollback_error={}",
                self.operation,
                self.table,
                self.backend,
                kind,
                self.started_at.elapsed().as_millis(),
                err,
                rollback_err
            ),
        }
        CommandError::new(self.table, self.operation, kind, err)
            .with_rollback_failure(rollback_failure)
    }

    /// Records the event on the open transaction and commits only when the
    /// audit write succeeded.
    fn finish<D: Database>(
        &self,
        mut tx: TxOf<'_, D>,
        recorder: &dyn ChangeEventRecorder<D>,
        event: &ChangeEvent,
    ) -> CommandResult<()> {
        if let Err(err) = recorder.record(&mut tx, event) {
            return Err(self.abort(tx, CommandErrorKind::Audit, err));
        }

        if let Err(err) = tx.commit() {
            error!(
                "event=command_commit module=command status=error op={} table={} backend={} record_id={} error={}",
                self.operation, self.table, self.backend, event.record_id, err
            );
            return Err(CommandError::new(
                self.table,
                self.operation,
                CommandErrorKind::Commit,
                err,
            ));
        }

        info!(
            "event=command_commit module=command status=ok op={} table={} backend={} recorder={} record_id={} event_id={} duration_ms={}",
            self.operation,
            self.table,
            self.backend,
            recorder.name(),
            event.record_id,
            event.event_id,
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }
}
