use std::sync::Arc;

use tracing::debug;

use crate::classify::StatementKind;
use crate::connection::Session;
use crate::error::SqlReactiveDbError;
use crate::results::SqlResult;
use crate::types::{BoundStatement, Params, RowValues};

use super::batch::execute_dml_batch;
use super::{positional_not_supported, validate_key};

/// DML statement accumulating one or more parameter sets.
///
/// Without [`add`](Self::add) the bound parameters go out as a single statement. Each `add`
/// seals the current parameter set as a batch entry; at execute time the current set becomes
/// the final entry, even if nothing was bound since the last `add`.
///
/// ```rust,no_run
/// # use sql_reactive::prelude::*;
/// # async fn demo(conn: &Connection) -> Result<(), SqlReactiveDbError> {
/// let results = conn
///     .create_statement("UPDATE books SET price = @price WHERE id = @id")?
///     .into_dml()?
///     .bind("id", 1)?
///     .bind("price", 10)?
///     .add()
///     .bind("id", 2)?
///     .bind("price", 12)?
///     .execute()
///     .await?;
/// assert_eq!(results.len(), 2);
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct DmlStatement {
    session: Arc<Session>,
    sql: String,
    current: Params,
    entries: Vec<Params>,
    add_called: bool,
}

impl DmlStatement {
    pub(crate) fn new(session: Arc<Session>, sql: String) -> Self {
        Self {
            session,
            sql,
            current: Params::new(),
            entries: Vec::new(),
            add_called: false,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind a named parameter on the current, not yet sealed, parameter set.
    ///
    /// # Errors
    /// Returns `InvalidOperation` for an empty name.
    pub fn bind(
        mut self,
        key: impl Into<String>,
        value: impl Into<RowValues>,
    ) -> Result<Self, SqlReactiveDbError> {
        let key = key.into();
        validate_key(&key)?;
        self.current.insert(key, value.into());
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

    /// Seal the current parameter set as a batch entry and start an empty one.
    #[must_use]
    pub fn add(mut self) -> Self {
        let sealed = std::mem::take(&mut self.current);
        self.entries.push(sealed);
        self.add_called = true;
        self
    }

    /// Sealed entries so far, not counting the current parameter set.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Run the statement once, or as a single batch request if `add` was ever called.
    ///
    /// Yields one result per entry, in entry order.
    ///
    /// # Errors
    /// Returns `InvalidOperation` on a closed session or inside a read-only transaction, and
    /// the engine's error if execution fails.
    pub async fn execute(self) -> Result<Vec<SqlResult>, SqlReactiveDbError> {
        let Self {
            session,
            sql,
            current,
            mut entries,
            add_called,
        } = self;
        session.ensure_open()?;

        if add_called {
            entries.push(current);
            let statements = entries
                .into_iter()
                .map(|params| BoundStatement::new(sql.clone(), params))
                .collect();
            return execute_dml_batch(&session, statements).await;
        }

        let statement = BoundStatement::new(sql, current);
        let engine = &session.engine;
        let statement = &statement;
        let count = session
            .transactions
            .run_gated(StatementKind::Dml, |context| async move {
                debug!(sql = %statement.sql, ?context, "running DML statement");
                engine.execute_single(statement).await
            })
            .await?;
        Ok(vec![SqlResult::from_update_count(count)?])
    }
}
