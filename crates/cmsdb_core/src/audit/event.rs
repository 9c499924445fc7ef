//! Change event model and its storage encoding.
//!
//! # Invariants
//! - `before` is absent for create events, `after` is absent for delete events.
//! - A constructed event is never mutated; recorders receive `&ChangeEvent`.
//! - Stored rows that do not decode back into a valid event are rejected.

use crate::audit::context::AuditContext;
use crate::db::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Kind of mutation captured by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of one committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub table_name: String,
    pub operation: Operation,
    pub record_id: String,
    /// Row state read inside the transaction before the mutation.
    pub before: Option<Value>,
    /// Created row for creates, applied params for updates.
    pub after: Option<Value>,
    pub audit: AuditContext,
    /// Unix epoch milliseconds.
    pub recorded_at_ms: i64,
}

impl ChangeEvent {
    pub fn created<R: Serialize>(
        table_name: &str,
        record_id: String,
        row: &R,
        audit: AuditContext,
    ) -> DbResult<Self> {
        Ok(Self::build(
            table_name,
            Operation::Create,
            record_id,
            None,
            Some(serde_json::to_value(row)?),
            audit,
        ))
    }

    pub fn updated<R: Serialize, P: Serialize>(
        table_name: &str,
        record_id: String,
        before: &R,
        params: &P,
        audit: AuditContext,
    ) -> DbResult<Self> {
        Ok(Self::build(
            table_name,
            Operation::Update,
            record_id,
            Some(serde_json::to_value(before)?),
            Some(serde_json::to_value(params)?),
            audit,
        ))
    }

    pub fn deleted<R: Serialize>(
        table_name: &str,
        record_id: String,
        before: &R,
        audit: AuditContext,
    ) -> DbResult<Self> {
        Ok(Self::build(
            table_name,
            Operation::Delete,
            record_id,
            Some(serde_json::to_value(before)?),
            None,
            audit,
        ))
    }

    fn build(
        table_name: &str,
        operation: Operation,
        record_id: String,
        before: Option<Value>,
        after: Option<Value>,
        audit: AuditContext,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            table_name: table_name.to_string(),
            operation,
            record_id,
            before,
            after,
            audit,
            recorded_at_ms: now_epoch_ms(),
        }
    }

    /// Flattens the event into column values shared by every recorder.
    pub(crate) fn to_stored(&self) -> DbResult<StoredChangeEvent> {
        Ok(StoredChangeEvent {
            event_id: self.event_id.to_string(),
            table_name: self.table_name.clone(),
            operation: self.operation.as_str().to_string(),
            record_id: self.record_id.clone(),
            before_state: encode_state(self.before.as_ref())?,
            after_state: encode_state(self.after.as_ref())?,
            actor_id: self.audit.actor_id().to_string(),
            node_id: self.audit.node_id().to_string(),
            request_id: self.audit.request_id().to_string(),
            client_addr: self.audit.client_addr().to_string(),
            recorded_at: self.recorded_at_ms,
        })
    }
}

/// Column-level representation of a persisted change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredChangeEvent {
    pub event_id: String,
    pub table_name: String,
    pub operation: String,
    pub record_id: String,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub actor_id: String,
    pub node_id: String,
    pub request_id: String,
    pub client_addr: String,
    pub recorded_at: i64,
}

impl StoredChangeEvent {
    pub(crate) fn into_event(self) -> DbResult<ChangeEvent> {
        let event_id = Uuid::parse_str(&self.event_id).map_err(|_| {
            DbError::InvalidData(format!(
                "invalid event_id `{}` in change events",
                self.event_id
            ))
        })?;
        let operation = Operation::parse(&self.operation).ok_or_else(|| {
            DbError::InvalidData(format!(
                "invalid operation `{}` in change events",
                self.operation
            ))
        })?;

        Ok(ChangeEvent {
            event_id,
            table_name: self.table_name,
            operation,
            record_id: self.record_id,
            before: decode_state(self.before_state.as_deref(), "before_state")?,
            after: decode_state(self.after_state.as_deref(), "after_state")?,
            audit: AuditContext::new(
                self.actor_id,
                self.node_id,
                self.request_id,
                self.client_addr,
            ),
            recorded_at_ms: self.recorded_at,
        })
    }
}

fn encode_state(state: Option<&Value>) -> DbResult<Option<String>> {
    match state {
        Some(value) => Ok(Some(serde_json::to_string(value)?)),
        None => Ok(None),
    }
}

fn decode_state(state: Option<&str>, column: &str) -> DbResult<Option<Value>> {
    match state {
        Some(text) => serde_json::from_str(text).map(Some).map_err(|err| {
            DbError::InvalidData(format!("invalid json in change events {column}: {err}"))
        }),
        None => Ok(None),
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
