use std::sync::Arc;

use tracing::debug;

use crate::classify::StatementKind;
use crate::connection::Session;
use crate::error::SqlReactiveDbError;
use crate::publisher::{Publisher, RowPublisher};
use crate::results::{Row, SqlResult};
use crate::types::{BoundStatement, Params, RowValues};

use super::{positional_not_supported, validate_key};

/// Row-returning statement.
#[derive(Debug)]
pub struct QueryStatement {
    session: Arc<Session>,
    sql: String,
    params: Params,
}

impl QueryStatement {
    pub(crate) fn new(session: Arc<Session>, sql: String) -> Self {
        Self {
            session,
            sql,
            params: Params::new(),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// # Errors
    /// Returns `InvalidOperation` for an empty name.
    pub fn bind(
        mut self,
        key: impl Into<String>,
        value: impl Into<RowValues>,
    ) -> Result<Self, SqlReactiveDbError> {
        let key = key.into();
        validate_key(&key)?;
        self.params.insert(key, value.into());
        Ok(self)
    }

    /// # Errors
    /// Returns `InvalidOperation` for an empty name.
    pub fn bind_null(self, key: impl Into<String>) -> Result<Self, SqlReactiveDbError> {
        self.bind(key, RowValues::Null)
    }

    /// # Errors
    /// Always returns `NotSupported`.
    pub fn bind_index(
        self,
        _index: usize,
        _value: impl Into<RowValues>,
    ) -> Result<Self, SqlReactiveDbError> {
        Err(positional_not_supported())
    }

    /// Start the query. Rows flow once the result's stream is subscribed and demand arrives.
    ///
    /// # Errors
    /// Returns `InvalidOperation` on a closed session and the engine's error if the query
    /// cannot be started.
    pub async fn execute(self) -> Result<SqlResult, SqlReactiveDbError> {
        let Self {
            session,
            sql,
            params,
        } = self;
        session.ensure_open()?;

        let statement = BoundStatement::new(sql, params);
        let engine = &session.engine;
        let statement = &statement;
        let cursor = session
            .transactions
            .run_gated(StatementKind::Query, |context| async move {
                debug!(sql = %statement.sql, ?context, "running query");
                engine.execute_query(statement, context).await
            })
            .await?;

        let rows: Arc<dyn Publisher<Row>> =
            Arc::new(RowPublisher::new(cursor, session.config.redelivery));
        SqlResult::new(Some(rows), 0)
    }
}
