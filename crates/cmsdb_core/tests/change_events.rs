use cmsdb_core::audit::{
    AuditContext, ChangeEvent, ChangeEventQuery, ChangeEventRecorder, Operation,
    SqliteChangeEventRecorder, DEFAULT_CHANGE_EVENT_TABLE,
};
use cmsdb_core::command::{self, CommandSession};
use cmsdb_core::db::{open_db_in_memory, DbError};
use cmsdb_core::model::role::{NewRole, ROLES_TABLE};
use cmsdb_core::repo::role_repo::CreateRole;
use rusqlite::Connection;
use serde_json::json;

fn audit() -> AuditContext {
    AuditContext::new("user-7", "node-b", "req-9", "198.51.100.4")
}

fn create_role(conn: &Connection, recorder: &SqliteChangeEventRecorder, label: &str) -> String {
    command::create(&CreateRole::new(
        CommandSession::new(conn, audit(), recorder),
        NewRole::new(label),
    ))
    .unwrap()
    .id
}

#[test]
fn default_recorder_targets_migrated_table() {
    let recorder = SqliteChangeEventRecorder::default();
    assert_eq!(recorder.table(), DEFAULT_CHANGE_EVENT_TABLE);
}

#[test]
fn recorded_event_reads_back_with_audit_context() {
    let conn = open_db_in_memory().unwrap();
    let recorder = SqliteChangeEventRecorder::new();
    let id = create_role(&conn, &recorder, "editor");

    let events = recorder
        .events(&conn, &ChangeEventQuery::for_record(ROLES_TABLE, id.as_str()))
        .unwrap();
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.operation, Operation::Create);
    assert_eq!(event.audit.actor_id(), "user-7");
    assert_eq!(event.audit.node_id(), "node-b");
    assert_eq!(event.audit.request_id(), "req-9");
    assert_eq!(event.audit.client_addr(), "198.51.100.4");
    assert!(event.recorded_at_ms > 0);

    let after = event.after.as_ref().unwrap();
    assert_eq!(after["id"], id.as_str());
    assert_eq!(after["label"], "editor");
    assert!(after["description"].is_null());
}

#[test]
fn query_filters_and_limits_events() {
    let conn = open_db_in_memory().unwrap();
    let recorder = SqliteChangeEventRecorder::new();
    let first = create_role(&conn, &recorder, "one");
    create_role(&conn, &recorder, "two");
    create_role(&conn, &recorder, "three");

    let limited = recorder
        .events(
            &conn,
            &ChangeEventQuery {
                table_name: Some(ROLES_TABLE.to_string()),
                record_id: None,
                limit: Some(2),
            },
        )
        .unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].record_id, first);

    let other_table = recorder
        .events(
            &conn,
            &ChangeEventQuery {
                table_name: Some("permissions".to_string()),
                ..ChangeEventQuery::default()
            },
        )
        .unwrap();
    assert!(other_table.is_empty());
}

#[test]
fn events_come_back_in_insertion_order_regardless_of_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let recorder = SqliteChangeEventRecorder::new();
    let row = json!({"id": "r-1", "label": "clock skew"});

    let mut created = ChangeEvent::created(ROLES_TABLE, "r-1".to_string(), &row, audit()).unwrap();
    let mut updated =
        ChangeEvent::updated(ROLES_TABLE, "r-1".to_string(), &row, &row, audit()).unwrap();
    let mut deleted = ChangeEvent::deleted(ROLES_TABLE, "r-1".to_string(), &row, audit()).unwrap();
    created.recorded_at_ms = 3_000;
    updated.recorded_at_ms = 1_000;
    deleted.recorded_at_ms = 1_000;

    let mut tx = conn.unchecked_transaction().unwrap();
    for event in [&created, &updated, &deleted] {
        recorder.record(&mut tx, event).unwrap();
    }
    tx.commit().unwrap();

    let events = recorder
        .events(&conn, &ChangeEventQuery::for_record(ROLES_TABLE, "r-1"))
        .unwrap();
    let ids: Vec<_> = events.iter().map(|event| event.event_id).collect();
    assert_eq!(
        ids,
        vec![created.event_id, updated.event_id, deleted.event_id]
    );
}

#[test]
fn custom_table_receives_events_instead_of_default() {
    let conn = open_db_in_memory().unwrap();
    let custom = SqliteChangeEventRecorder::with_table("role_audit").unwrap();
    custom.ensure_table(&conn).unwrap();
    custom.ensure_table(&conn).unwrap();

    let id = create_role(&conn, &custom, "auditor");

    let events = custom.events(&conn, &ChangeEventQuery::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].record_id, id);

    let default_events = SqliteChangeEventRecorder::new()
        .events(&conn, &ChangeEventQuery::default())
        .unwrap();
    assert!(default_events.is_empty());
}

#[test]
fn unsafe_table_name_is_rejected() {
    let err = SqliteChangeEventRecorder::with_table("events; DROP TABLE roles").unwrap_err();
    assert!(matches!(err, DbError::InvalidIdentifier(_)));
}

#[test]
fn corrupted_stored_event_is_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let recorder = SqliteChangeEventRecorder::new();
    create_role(&conn, &recorder, "victim");
    conn.execute("UPDATE change_events SET after_state = '{not json';", [])
        .unwrap();

    let err = recorder
        .events(&conn, &ChangeEventQuery::default())
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidData(_)), "{err}");
}
