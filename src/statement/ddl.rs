use std::sync::Arc;

use tracing::debug;

use crate::classify::StatementKind;
use crate::connection::Session;
use crate::error::SqlReactiveDbError;
use crate::results::SqlResult;

/// Schema change. Takes no parameters.
#[derive(Debug)]
pub struct DdlStatement {
    session: Arc<Session>,
    sql: String,
}

impl DdlStatement {
    pub(crate) fn new(session: Arc<Session>, sql: String) -> Self {
        Self { session, sql }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Submit the schema change. The result has no rows and a zero update count.
    ///
    /// # Errors
    /// Returns `InvalidOperation` on a closed session or inside a transaction, and the engine's
    /// error if submission fails.
    pub async fn execute(self) -> Result<SqlResult, SqlReactiveDbError> {
        self.session.ensure_open()?;
        let engine = &self.session.engine;
        let sql = self.sql.as_str();
        self.session
            .transactions
            .run_gated(StatementKind::Ddl, |_| async move {
                debug!(%sql, "submitting DDL statement");
                engine.update_ddl(sql).await
            })
            .await?;
        SqlResult::from_update_count(0)
    }
}
