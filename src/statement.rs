use std::sync::Arc;

use crate::classify::{StatementKind, classify};
use crate::connection::Session;
use crate::error::SqlReactiveDbError;
use crate::results::SqlResult;

mod batch;
mod ddl;
mod dml;
mod query;

pub use batch::StatementBatch;
pub use ddl::DdlStatement;
pub use dml::DmlStatement;
pub use query::QueryStatement;

/// A statement created from SQL text, with its variant fixed by keyword classification.
///
/// Each variant only offers the operations valid for its kind: queries bind parameters, DML
/// binds and batches, DDL does neither.
#[derive(Debug)]
pub enum Statement {
    Query(QueryStatement),
    Dml(DmlStatement),
    Ddl(DdlStatement),
}

impl Statement {
    pub(crate) fn new(session: Arc<Session>, sql: String) -> Self {
        match classify(&sql) {
            StatementKind::Query => Statement::Query(QueryStatement::new(session, sql)),
            StatementKind::Dml => Statement::Dml(DmlStatement::new(session, sql)),
            StatementKind::Ddl => Statement::Ddl(DdlStatement::new(session, sql)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Query(_) => StatementKind::Query,
            Statement::Dml(_) => StatementKind::Dml,
            Statement::Ddl(_) => StatementKind::Ddl,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        match self {
            Statement::Query(stmt) => stmt.sql(),
            Statement::Dml(stmt) => stmt.sql(),
            Statement::Ddl(stmt) => stmt.sql(),
        }
    }

    /// # Errors
    /// Returns `InvalidOperation` if the text was not classified as a query.
    pub fn into_query(self) -> Result<QueryStatement, SqlReactiveDbError> {
        match self {
            Statement::Query(stmt) => Ok(stmt),
            other => Err(wrong_kind(StatementKind::Query, other.kind())),
        }
    }

    /// # Errors
    /// Returns `InvalidOperation` if the text was not classified as DML.
    pub fn into_dml(self) -> Result<DmlStatement, SqlReactiveDbError> {
        match self {
            Statement::Dml(stmt) => Ok(stmt),
            other => Err(wrong_kind(StatementKind::Dml, other.kind())),
        }
    }

    /// # Errors
    /// Returns `InvalidOperation` if the text was not classified as DDL.
    pub fn into_ddl(self) -> Result<DdlStatement, SqlReactiveDbError> {
        match self {
            Statement::Ddl(stmt) => Ok(stmt),
            other => Err(wrong_kind(StatementKind::Ddl, other.kind())),
        }
    }

    /// Execute whichever variant this is. DML yields one result per batch entry.
    ///
    /// # Errors
    /// Propagates the variant's execution error.
    pub async fn execute(self) -> Result<Vec<SqlResult>, SqlReactiveDbError> {
        match self {
            Statement::Query(stmt) => Ok(vec![stmt.execute().await?]),
            Statement::Dml(stmt) => stmt.execute().await,
            Statement::Ddl(stmt) => Ok(vec![stmt.execute().await?]),
        }
    }
}

fn wrong_kind(expected: StatementKind, actual: StatementKind) -> SqlReactiveDbError {
    SqlReactiveDbError::InvalidOperation(format!("expected a {expected} statement, got {actual}"))
}

pub(crate) fn validate_key(key: &str) -> Result<(), SqlReactiveDbError> {
    if key.is_empty() {
        return Err(SqlReactiveDbError::InvalidOperation(
            "parameter name must not be empty".into(),
        ));
    }
    Ok(())
}

pub(crate) fn positional_not_supported() -> SqlReactiveDbError {
    SqlReactiveDbError::NotSupported(
        "positional binding is not supported; bind parameters by name".into(),
    )
}
