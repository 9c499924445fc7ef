use crate::audit::Operation;
use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CommandResult<T> = Result<T, CommandError>;

/// Stage of an audited command that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The transaction could not be opened.
    Begin,
    /// The target row does not exist.
    NotFound,
    /// Reading the before-image failed for a reason other than not-found.
    ReadBefore,
    /// The mutation itself failed.
    Mutation,
    /// Building or persisting the change event failed; the mutation was
    /// rolled back.
    Audit,
    Commit,
}

impl Display for CommandErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Begin => "failed to begin transaction",
            Self::NotFound => "record not found",
            Self::ReadBefore => "failed to read current state",
            Self::Mutation => "mutation failed",
            Self::Audit => "audit record failed, mutation rolled back",
            Self::Commit => "commit failed",
        };
        f.write_str(text)
    }
}

/// Failure of one audited command, tagged with table and operation.
#[derive(Debug)]
pub struct CommandError {
    table: String,
    operation: Operation,
    kind: CommandErrorKind,
    source: DbError,
    rollback_failure: Option<DbError>,
}

impl CommandError {
    pub(crate) fn new(
        table: &str,
        operation: Operation,
        kind: CommandErrorKind,
        source: DbError,
    ) -> Self {
        Self {
            table: table.to_string(),
            operation,
            kind,
            source,
            rollback_failure: None,
        }
    }

    pub(crate) fn with_rollback_failure(mut self, rollback_failure: Option<DbError>) -> Self {
        self.rollback_failure = rollback_failure;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn kind(&self) -> CommandErrorKind {
        self.kind
    }

    pub fn db_error(&self) -> &DbError {
        &self.source
    }

    /// Rollback error raised while cleaning up after the primary failure.
    pub fn rollback_failure(&self) -> Option<&DbError> {
        self.rollback_failure.as_ref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == CommandErrorKind::NotFound
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}: {}: {}",
            self.operation, self.table, self.kind, self.source
        )?;
        if let Some(rollback) = &self.rollback_failure {
            write!(f, "; rollback also failed: {rollback}")?;
        }
        Ok(())
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandError, CommandErrorKind};
    use crate::audit::Operation;
    use crate::db::DbError;
    use std::error::Error;

    #[test]
    fn display_names_operation_table_and_stage() {
        let err = CommandError::new(
            "roles",
            Operation::Update,
            CommandErrorKind::NotFound,
            DbError::not_found("roles", "r-9"),
        );

        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "update roles: record not found: roles record not found: `r-9`"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn display_appends_rollback_failure() {
        let err = CommandError::new(
            "roles",
            Operation::Create,
            CommandErrorKind::Audit,
            DbError::InvalidData("recorder offline".to_string()),
        )
        .with_rollback_failure(Some(DbError::InvalidData("connection lost".to_string())));

        let text = err.to_string();
        assert!(text.starts_with("create roles: audit record failed"));
        assert!(text.ends_with("rollback also failed: invalid persisted data: connection lost"));
        assert!(err.rollback_failure().is_some());
    }
}
