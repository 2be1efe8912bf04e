use std::sync::Arc;

use tracing::debug;

use crate::classify::{StatementKind, classify};
use crate::connection::Session;
use crate::error::SqlReactiveDbError;
use crate::results::SqlResult;
use crate::types::{BoundStatement, Params};

/// Several DML statements sent to the engine as one batch request.
#[derive(Debug)]
pub struct StatementBatch {
    session: Arc<Session>,
    statements: Vec<BoundStatement>,
}

impl StatementBatch {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            statements: Vec::new(),
        }
    }

    /// Append a statement without parameters.
    ///
    /// # Errors
    /// Returns `InvalidOperation` if `sql` is not DML.
    pub fn add(self, sql: impl Into<String>) -> Result<Self, SqlReactiveDbError> {
        self.add_bound(sql, Params::new())
    }

    /// Append a statement with named parameters.
    ///
    /// # Errors
    /// Returns `InvalidOperation` if `sql` is not DML.
    pub fn add_bound(
        mut self,
        sql: impl Into<String>,
        params: Params,
    ) -> Result<Self, SqlReactiveDbError> {
        let sql = sql.into();
        let kind = classify(&sql);
        if kind != StatementKind::Dml {
            return Err(SqlReactiveDbError::InvalidOperation(format!(
                "only DML statements can be batched, got {kind}: {sql}"
            )));
        }
        self.statements.push(BoundStatement::new(sql, params));
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Run every statement in one engine request; one result per statement, in order.
    ///
    /// # Errors
    /// Returns `InvalidOperation` for an empty batch, a closed session, or a read-only
    /// transaction, and the engine's error if execution fails.
    pub async fn execute(self) -> Result<Vec<SqlResult>, SqlReactiveDbError> {
        self.session.ensure_open()?;
        execute_dml_batch(&self.session, self.statements).await
    }
}

pub(super) async fn execute_dml_batch(
    session: &Session,
    statements: Vec<BoundStatement>,
) -> Result<Vec<SqlResult>, SqlReactiveDbError> {
    if statements.is_empty() {
        return Err(SqlReactiveDbError::InvalidOperation("Batch is empty".into()));
    }

    let engine = &session.engine;
    let entries = statements.as_slice();
    let counts = session
        .transactions
        .run_gated(StatementKind::Dml, |context| async move {
            debug!(entries = entries.len(), ?context, "running DML batch");
            engine.execute_batch(entries).await
        })
        .await?;

    if counts.len() != statements.len() {
        return Err(SqlReactiveDbError::EngineError(format!(
            "batch of {} statements returned {} update counts",
            statements.len(),
            counts.len()
        )));
    }
    counts.into_iter().map(SqlResult::from_update_count).collect()
}
