//! Session handle tying the engine, the transaction state machine and statement creation together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::engine::QueryEngine;
use crate::error::SqlReactiveDbError;
use crate::statement::{Statement, StatementBatch};
use crate::transaction::{TransactionMode, TransactionStateMachine, TxOutcome};
use crate::types::ConsistencyBound;

/// State shared between a [`Connection`] and the statements it creates.
pub(crate) struct Session {
    pub(crate) engine: Arc<dyn QueryEngine>,
    pub(crate) transactions: TransactionStateMachine,
    pub(crate) config: SessionConfig,
    closed: AtomicBool,
}

impl Session {
    pub(crate) fn ensure_open(&self) -> Result<(), SqlReactiveDbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlReactiveDbError::InvalidOperation(
                "connection is closed".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// A database session over a callback-driven engine.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use futures_util::StreamExt;
/// # use sql_reactive::prelude::*;
/// # async fn demo(engine: Arc<dyn QueryEngine>) -> Result<(), SqlReactiveDbError> {
/// let conn = Connection::new(engine, SessionConfig::default())?;
/// let result = conn
///     .create_statement("SELECT id, name FROM users WHERE id = @id")?
///     .into_query()?
///     .bind("id", 7)?
///     .execute()
///     .await?;
/// let mut names = result
///     .map(|row, _meta| row.get("name").and_then(|v| v.as_text().map(str::to_owned)))
///     .into_stream(16);
/// while let Some(name) = names.next().await {
///     println!("{:?}", name?);
/// }
/// conn.close().await?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct Connection {
    session: Arc<Session>,
}

impl Connection {
    /// # Errors
    /// Returns `ConfigError` if `config` does not validate.
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        config: SessionConfig,
    ) -> Result<Self, SqlReactiveDbError> {
        config.validate()?;
        let transactions = TransactionStateMachine::new(Arc::clone(&engine), config.autocommit);
        Ok(Self {
            session: Arc::new(Session {
                engine,
                transactions,
                config,
                closed: AtomicBool::new(false),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.session.config
    }

    /// Classify `sql` and wrap it in the matching statement variant.
    ///
    /// # Errors
    /// Returns `InvalidOperation` for blank SQL or a closed connection.
    pub fn create_statement(&self, sql: impl Into<String>) -> Result<Statement, SqlReactiveDbError> {
        self.session.ensure_open()?;
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(SqlReactiveDbError::InvalidOperation(
                "statement SQL must not be empty".into(),
            ));
        }
        Ok(Statement::new(Arc::clone(&self.session), sql))
    }

    /// # Errors
    /// Returns `InvalidOperation` on a closed connection.
    pub fn create_batch(&self) -> Result<StatementBatch, SqlReactiveDbError> {
        self.session.ensure_open()?;
        Ok(StatementBatch::new(Arc::clone(&self.session)))
    }

    /// # Errors
    /// Returns `TransactionInProgress` if a transaction is already open.
    pub async fn begin_transaction(&self) -> Result<(), SqlReactiveDbError> {
        self.session.ensure_open()?;
        self.session.transactions.begin_read_write().await
    }

    /// # Errors
    /// Returns `TransactionInProgress` if a transaction is already open.
    pub async fn begin_read_only_transaction(
        &self,
        bound: ConsistencyBound,
    ) -> Result<(), SqlReactiveDbError> {
        self.session.ensure_open()?;
        self.session.transactions.begin_read_only(bound).await
    }

    /// # Errors
    /// Returns `InvalidOperation` on a closed connection, or the engine's commit error.
    pub async fn commit_transaction(&self) -> Result<TxOutcome, SqlReactiveDbError> {
        self.session.ensure_open()?;
        self.session.transactions.commit().await
    }

    /// # Errors
    /// Returns `InvalidOperation` on a closed connection, or the engine's rollback error.
    pub async fn rollback_transaction(&self) -> Result<TxOutcome, SqlReactiveDbError> {
        self.session.ensure_open()?;
        self.session.transactions.rollback().await
    }

    /// # Errors
    /// Returns the implicit commit's error when enabling autocommit mid-transaction.
    pub async fn set_autocommit(&self, autocommit: bool) -> Result<(), SqlReactiveDbError> {
        self.session.ensure_open()?;
        self.session.transactions.set_autocommit(autocommit).await
    }

    pub async fn is_autocommit(&self) -> bool {
        self.session.transactions.is_autocommit().await
    }

    pub async fn transaction_mode(&self) -> TransactionMode {
        self.session.transactions.mode().await
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.session.closed.load(Ordering::Acquire)
    }

    /// Close the session, rolling back a read/write transaction or releasing a snapshot.
    ///
    /// Only the first call does anything.
    ///
    /// # Errors
    /// Returns the engine's error from leaving the open transaction.
    pub async fn close(&self) -> Result<(), SqlReactiveDbError> {
        if self.session.closed.swap(true, Ordering::AcqRel) {
            debug!("connection already closed");
            return Ok(());
        }
        let outcome = self.session.transactions.abandon().await?;
        if let Some(kind) = outcome.ended_kind() {
            info!(%kind, "open transaction abandoned on close");
        }
        Ok(())
    }

    /// Whether this handle is still usable, without contacting the engine.
    #[must_use]
    pub fn local_health_check(&self) -> bool {
        !self.is_closed()
    }

    /// Run the validation query and drain its rows.
    ///
    /// Never fails; any error is reported as `false`.
    pub async fn health_check(&self) -> bool {
        if self.is_closed() || self.session.engine.is_closed() {
            return false;
        }
        match self.run_validation_query().await {
            Ok(rows) => {
                debug!(rows, "health check passed");
                true
            }
            Err(error) => {
                warn!(%error, "health check failed");
                false
            }
        }
    }

    async fn run_validation_query(&self) -> Result<usize, SqlReactiveDbError> {
        let query = self
            .create_statement(self.session.config.validation_query.clone())?
            .into_query()?;
        let result = query.execute().await?;
        let mut rows = result.into_stream(self.session.config.prefetch);
        let mut count = 0;
        while let Some(row) = rows.next().await {
            row?;
            count += 1;
        }
        Ok(count)
    }

    /// # Errors
    /// Always returns `NotSupported`.
    pub async fn create_savepoint(&self, _name: &str) -> Result<(), SqlReactiveDbError> {
        Err(not_supported("savepoints"))
    }

    /// # Errors
    /// Always returns `NotSupported`.
    pub async fn release_savepoint(&self, _name: &str) -> Result<(), SqlReactiveDbError> {
        Err(not_supported("savepoints"))
    }

    /// # Errors
    /// Always returns `NotSupported`.
    pub async fn rollback_to_savepoint(&self, _name: &str) -> Result<(), SqlReactiveDbError> {
        Err(not_supported("savepoints"))
    }

    /// # Errors
    /// Always returns `NotSupported`.
    pub async fn set_isolation_level(&self, _level: &str) -> Result<(), SqlReactiveDbError> {
        Err(not_supported("changing the isolation level"))
    }

    /// # Errors
    /// Always returns `NotSupported`.
    pub async fn begin_with_definition(
        &self,
        _definition: &serde_json::Value,
    ) -> Result<(), SqlReactiveDbError> {
        Err(not_supported("custom transaction definitions"))
    }
}

fn not_supported(what: &str) -> SqlReactiveDbError {
    SqlReactiveDbError::NotSupported(format!("{what} are not supported"))
}
