#![cfg(feature = "postgres")]
//! Runs only when `CMSDB_TEST_POSTGRES_URL` points at a disposable database.

use cmsdb_core::audit::{
    AuditContext, ChangeEvent, ChangeEventQuery, ChangeEventRecorder, Operation,
    PostgresChangeEventRecorder,
};
use cmsdb_core::command::{self, CommandErrorKind, CommandSession};
use cmsdb_core::db::postgres::{PgDatabase, PgTransaction};
use cmsdb_core::db::{Database, DbError, DbResult, DbTransaction};
use cmsdb_core::model::role::{NewRole, Role, RoleChanges, ROLES_TABLE};
use cmsdb_core::repo::pg_role_repo::{pg_get_role, PgCreateRole, PgDeleteRole, PgUpdateRole};

fn connect() -> Option<PgDatabase> {
    let url = std::env::var("CMSDB_TEST_POSTGRES_URL").ok()?;
    Some(PgDatabase::connect(&url).unwrap())
}

fn audit() -> AuditContext {
    AuditContext::new("pg-user", "node-pg", "req-pg", "203.0.113.5")
}

fn events_for(db: &PgDatabase, id: &str) -> Vec<ChangeEvent> {
    PostgresChangeEventRecorder::new()
        .events(db, &ChangeEventQuery::for_record(ROLES_TABLE, id))
        .unwrap()
}

fn create_role(db: &PgDatabase, label: &str) -> Role {
    let recorder = PostgresChangeEventRecorder::new();
    command::create(&PgCreateRole::new(
        CommandSession::new(db, audit(), &recorder),
        NewRole::new(label),
    ))
    .unwrap()
}

/// Writes the event and then fails, so the audit insert must be rolled back
/// together with the mutation.
struct FailingRecorder {
    inner: PostgresChangeEventRecorder,
}

impl ChangeEventRecorder<PgDatabase> for FailingRecorder {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn record(&self, tx: &mut PgTransaction<'_>, event: &ChangeEvent) -> DbResult<()> {
        self.inner.record(tx, event)?;
        Err(DbError::InvalidData("audit sink unavailable".to_string()))
    }
}

fn failing() -> FailingRecorder {
    FailingRecorder {
        inner: PostgresChangeEventRecorder::new(),
    }
}

#[test]
fn role_lifecycle_is_audited() {
    let Some(db) = connect() else {
        eprintln!("skipping: CMSDB_TEST_POSTGRES_URL not set");
        return;
    };
    let recorder = PostgresChangeEventRecorder::new();
    let session = || CommandSession::new(&db, audit(), &recorder);

    let role = command::create(&PgCreateRole::new(session(), NewRole::new("pg-editor"))).unwrap();
    let before = pg_get_role(&db, &role.id).unwrap().unwrap();
    let changes = RoleChanges {
        id: role.id.clone(),
        label: "pg-editor-2".to_string(),
        description: Some("renamed".to_string()),
    };
    command::update(&PgUpdateRole::new(session(), changes.clone())).unwrap();
    assert_eq!(
        pg_get_role(&db, &role.id).unwrap().unwrap().label,
        "pg-editor-2"
    );
    command::delete(&PgDeleteRole::new(session(), role.id.as_str())).unwrap();
    assert_eq!(pg_get_role(&db, &role.id).unwrap(), None);

    let events = events_for(&db, &role.id);
    let operations: Vec<Operation> = events.iter().map(|event| event.operation).collect();
    assert_eq!(
        operations,
        vec![Operation::Create, Operation::Update, Operation::Delete]
    );
    assert_eq!(events[1].before, Some(serde_json::to_value(&before).unwrap()));
    assert_eq!(events[1].after, Some(serde_json::to_value(&changes).unwrap()));
}

#[test]
fn failing_recorder_rolls_back_every_command() {
    let Some(db) = connect() else {
        eprintln!("skipping: CMSDB_TEST_POSTGRES_URL not set");
        return;
    };
    let failing = failing();
    let session = || CommandSession::new(&db, audit(), &failing);

    let err = command::create(&PgCreateRole::new(session(), NewRole::new("pg-ghost")))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::Audit);
    assert!(err.rollback_failure().is_none());
    let ghosts: i64 = db
        .with_client(|client| {
            Ok(client
                .query_one("SELECT COUNT(*) FROM roles WHERE label = 'pg-ghost'", &[])?
                .try_get(0)?)
        })
        .unwrap();
    assert_eq!(ghosts, 0);

    let role = create_role(&db, "pg-kept");
    let err = command::update(&PgUpdateRole::new(
        session(),
        RoleChanges {
            id: role.id.clone(),
            label: "pg-renamed".to_string(),
            description: None,
        },
    ))
    .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::Audit);
    assert_eq!(pg_get_role(&db, &role.id).unwrap(), Some(role.clone()));

    let err = command::delete(&PgDeleteRole::new(session(), role.id.as_str())).unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::Audit);
    assert_eq!(pg_get_role(&db, &role.id).unwrap(), Some(role.clone()));

    let operations: Vec<Operation> = events_for(&db, &role.id)
        .into_iter()
        .map(|event| event.operation)
        .collect();
    assert_eq!(operations, vec![Operation::Create]);
}

#[test]
fn same_millisecond_events_keep_insertion_order() {
    let Some(db) = connect() else {
        eprintln!("skipping: CMSDB_TEST_POSTGRES_URL not set");
        return;
    };
    let recorder = PostgresChangeEventRecorder::new();
    let record_id = uuid::Uuid::new_v4().to_string();
    let row = serde_json::json!({ "id": record_id });

    let mut written = Vec::new();
    let mut tx = db.begin().unwrap();
    for _ in 0..5 {
        let mut event =
            ChangeEvent::updated(ROLES_TABLE, record_id.clone(), &row, &row, audit()).unwrap();
        event.recorded_at_ms = 1_000;
        recorder.record(&mut tx, &event).unwrap();
        written.push(event.event_id);
    }
    tx.commit().unwrap();

    let read: Vec<_> = events_for(&db, &record_id)
        .into_iter()
        .map(|event| event.event_id)
        .collect();
    assert_eq!(read, written);
}

#[test]
fn client_is_usable_again_once_transaction_ends() {
    let Some(db) = connect() else {
        eprintln!("skipping: CMSDB_TEST_POSTGRES_URL not set");
        return;
    };

    let tx = db.begin().unwrap();
    drop(tx);
    let one: i32 = db
        .with_client(|client| Ok(client.query_one("SELECT 1", &[])?.try_get(0)?))
        .unwrap();
    assert_eq!(one, 1);
}

#[test]
fn missing_role_is_not_found() {
    let Some(db) = connect() else {
        eprintln!("skipping: CMSDB_TEST_POSTGRES_URL not set");
        return;
    };
    let recorder = PostgresChangeEventRecorder::new();
    let missing = uuid::Uuid::new_v4().to_string();

    let err = command::delete(&PgDeleteRole::new(
        CommandSession::new(&db, audit(), &recorder),
        missing.as_str(),
    ))
    .unwrap_err();

    assert_eq!(err.kind(), CommandErrorKind::NotFound);
    assert!(events_for(&db, &missing).is_empty());
}
