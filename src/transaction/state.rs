use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::classify::StatementKind;
use crate::engine::QueryEngine;
use crate::error::SqlReactiveDbError;
use crate::types::{ConsistencyBound, ExecutionContext, TransactionKind};

use super::outcome::{TxOutcome, TxWarning};

/// Transaction currently open on the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    #[default]
    None,
    ReadWrite,
    ReadOnly(ConsistencyBound),
}

impl TransactionMode {
    #[must_use]
    pub fn kind(&self) -> Option<TransactionKind> {
        match self {
            TransactionMode::None => None,
            TransactionMode::ReadWrite => Some(TransactionKind::ReadWrite),
            TransactionMode::ReadOnly(_) => Some(TransactionKind::ReadOnly),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    mode: TransactionMode,
    autocommit: bool,
    statements: usize,
}

impl SessionState {
    fn ensure_idle(&self) -> Result<(), SqlReactiveDbError> {
        match self.mode.kind() {
            Some(kind) => Err(SqlReactiveDbError::TransactionInProgress { kind }),
            None => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.mode = TransactionMode::None;
        self.statements = 0;
    }
}

/// Session transaction mode and autocommit flag, plus the gate every statement passes.
///
/// The state sits behind an async mutex that is held across the engine calls a transition
/// makes, so transitions and statement routing apply strictly in call order.
pub struct TransactionStateMachine {
    engine: Arc<dyn QueryEngine>,
    state: Mutex<SessionState>,
}

impl TransactionStateMachine {
    pub fn new(engine: Arc<dyn QueryEngine>, autocommit: bool) -> Self {
        Self {
            engine,
            state: Mutex::new(SessionState {
                mode: TransactionMode::None,
                autocommit,
                statements: 0,
            }),
        }
    }

    pub async fn mode(&self) -> TransactionMode {
        self.state.lock().await.mode
    }

    pub async fn is_autocommit(&self) -> bool {
        self.state.lock().await.autocommit
    }

    /// Statements routed into the open read/write transaction so far.
    pub async fn statement_count(&self) -> usize {
        self.state.lock().await.statements
    }

    /// # Errors
    /// Returns `TransactionInProgress` if any transaction is open, or the engine's error.
    pub async fn begin_read_write(&self) -> Result<(), SqlReactiveDbError> {
        let mut state = self.state.lock().await;
        state.ensure_idle()?;
        debug!("begin read/write transaction");
        self.engine.begin_read_write().await?;
        state.mode = TransactionMode::ReadWrite;
        state.statements = 0;
        Ok(())
    }

    /// Open a read-only snapshot with the given staleness bound.
    ///
    /// # Errors
    /// Returns `TransactionInProgress` if any transaction is open, even one with the same bound.
    pub async fn begin_read_only(&self, bound: ConsistencyBound) -> Result<(), SqlReactiveDbError> {
        let mut state = self.state.lock().await;
        state.ensure_idle()?;
        debug!(?bound, "begin read-only transaction");
        self.engine.begin_read_only(bound).await?;
        state.mode = TransactionMode::ReadOnly(bound);
        state.statements = 0;
        Ok(())
    }

    /// Commit a read/write transaction or release a read-only snapshot.
    ///
    /// Without an open transaction this is a successful no-op. A read/write transaction that ran
    /// no statements still commits; the outcome then carries [`TxWarning::NoStatements`].
    ///
    /// # Errors
    /// Returns the engine's error. The session is back to no transaction either way.
    pub async fn commit(&self) -> Result<TxOutcome, SqlReactiveDbError> {
        let mut state = self.state.lock().await;
        self.commit_locked(&mut state).await
    }

    /// Roll back a read/write transaction or release a read-only snapshot.
    ///
    /// # Errors
    /// Returns the engine's error. The session is back to no transaction either way.
    pub async fn rollback(&self) -> Result<TxOutcome, SqlReactiveDbError> {
        let mut state = self.state.lock().await;
        self.rollback_locked(&mut state).await
    }

    /// Switch autocommit. Turning it on while a read/write transaction is open commits first.
    ///
    /// # Errors
    /// Returns the implicit commit's error; the flag is left unchanged in that case.
    pub async fn set_autocommit(&self, autocommit: bool) -> Result<(), SqlReactiveDbError> {
        let mut state = self.state.lock().await;
        if state.autocommit == autocommit {
            return Ok(());
        }
        if autocommit && state.mode == TransactionMode::ReadWrite {
            debug!("autocommit enabled inside read/write transaction, committing");
            self.commit_locked(&mut state).await?;
        }
        state.autocommit = autocommit;
        Ok(())
    }

    /// Decide where a statement of `kind` runs, then run `op` there while transitions are held off.
    ///
    /// # Errors
    /// Returns `InvalidOperation` for DML inside a read-only snapshot and for DDL inside any
    /// transaction, or whatever `op` returns.
    pub async fn run_gated<T, F, Fut>(
        &self,
        kind: StatementKind,
        op: F,
    ) -> Result<T, SqlReactiveDbError>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<T, SqlReactiveDbError>>,
    {
        let mut state = self.state.lock().await;
        let context = Self::route(&mut state, kind)?;
        debug!(%kind, ?context, "routing statement");
        op(context).await
    }

    /// Leave whatever transaction is open without flushing it. Used when the session closes.
    ///
    /// # Errors
    /// Returns the engine's error.
    pub async fn abandon(&self) -> Result<TxOutcome, SqlReactiveDbError> {
        let mut state = self.state.lock().await;
        self.rollback_locked(&mut state).await
    }

    fn route(
        state: &mut MutexGuard<'_, SessionState>,
        kind: StatementKind,
    ) -> Result<ExecutionContext, SqlReactiveDbError> {
        match (kind, state.mode) {
            (StatementKind::Query, TransactionMode::None) => Ok(ExecutionContext::SingleUse),
            (StatementKind::Query, TransactionMode::ReadOnly(bound)) => {
                Ok(ExecutionContext::ReadOnlySnapshot(bound))
            }
            (StatementKind::Query | StatementKind::Dml, TransactionMode::ReadWrite) => {
                state.statements += 1;
                Ok(ExecutionContext::ReadWriteTransaction)
            }
            (StatementKind::Dml, TransactionMode::ReadOnly(_)) => {
                Err(SqlReactiveDbError::InvalidOperation(
                    "DML is not permitted inside a read-only transaction".into(),
                ))
            }
            (StatementKind::Dml | StatementKind::Ddl, TransactionMode::None) => {
                Ok(ExecutionContext::SingleUse)
            }
            (StatementKind::Ddl, _) => Err(SqlReactiveDbError::InvalidOperation(
                "DDL cannot run inside a transaction".into(),
            )),
        }
    }

    async fn commit_locked(
        &self,
        state: &mut MutexGuard<'_, SessionState>,
    ) -> Result<TxOutcome, SqlReactiveDbError> {
        match state.mode {
            TransactionMode::None => {
                warn!("commit called outside of an active transaction");
                Ok(TxOutcome::without_transaction())
            }
            TransactionMode::ReadOnly(_) => {
                debug!("closing read-only transaction");
                let released = self.engine.close_read_only().await;
                state.reset();
                released.map(|()| TxOutcome::ended(TransactionKind::ReadOnly))
            }
            TransactionMode::ReadWrite => {
                let mut outcome = TxOutcome::ended(TransactionKind::ReadWrite);
                if state.statements == 0 {
                    warn!("read/write transaction committing without any statements");
                    outcome = outcome.with_warning(TxWarning::NoStatements);
                }
                debug!(statements = state.statements, "commit read/write transaction");
                let committed = self.engine.commit().await;
                state.reset();
                committed.map(|()| outcome)
            }
        }
    }

    async fn rollback_locked(
        &self,
        state: &mut MutexGuard<'_, SessionState>,
    ) -> Result<TxOutcome, SqlReactiveDbError> {
        match state.mode {
            TransactionMode::None => {
                debug!("rollback called outside of an active transaction");
                Ok(TxOutcome::without_transaction())
            }
            TransactionMode::ReadOnly(_) => {
                debug!("closing read-only transaction");
                let released = self.engine.close_read_only().await;
                state.reset();
                released.map(|()| TxOutcome::ended(TransactionKind::ReadOnly))
            }
            TransactionMode::ReadWrite => {
                if state.statements == 0 {
                    warn!("read/write transaction rolling back without any statements");
                }
                debug!(statements = state.statements, "roll back read/write transaction");
                let rolled_back = self.engine.rollback().await;
                state.reset();
                rolled_back.map(|()| TxOutcome::ended(TransactionKind::ReadWrite))
            }
        }
    }
}

impl std::fmt::Debug for TransactionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStateMachine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
