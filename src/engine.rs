//! Traits describing the callback-driven query engine this crate sits on top of.
//!
//! The engine owns all network interaction. It reports row availability by calling a
//! [`CursorCallback`] from its own worker threads, one call at a time per cursor, and obeys
//! the returned [`CallbackDirective`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SqlReactiveDbError;
use crate::results::Row;
use crate::types::{BoundStatement, ConsistencyBound, ExecutionContext};

/// State of a cursor as observed by one callback invocation.
#[derive(Debug)]
pub enum CursorSignal<T> {
    /// A row is available and can be consumed.
    RowReady(T),
    /// No row yet; the engine will call back when one arrives.
    NotReady,
    /// The cursor is exhausted.
    Done,
    /// The cursor failed.
    Error(SqlReactiveDbError),
}

/// Control decision returned to the engine after each callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDirective {
    /// Keep invoking the callback as rows become available.
    Continue,
    /// Stop invoking the callback until `RowCursor::resume` is called.
    Pause,
    /// Stop invoking the callback for good.
    Done,
}

/// Receiver of cursor callbacks.
pub trait CursorCallback<T>: Send + Sync {
    /// Invoked by the engine whenever the cursor may have changed state.
    fn cursor_ready(&self, cursor: &dyn RowCursor<T>) -> CallbackDirective;
}

/// Engine-side handle of an executing query.
pub trait RowCursor<T>: Send + Sync {
    /// Register the callback and begin delivering cursor events to it.
    fn start(&self, callback: Arc<dyn CursorCallback<T>>);

    /// Advance the cursor by one position. Never re-entered for the same cursor.
    ///
    /// # Errors
    /// Returns `EngineError` if the underlying read failed.
    fn pull_next(&self) -> Result<CursorSignal<T>, SqlReactiveDbError>;

    /// Restart callbacks after a `Pause` directive.
    fn resume(&self);

    /// Discard the cursor; no further callbacks are expected.
    fn cancel(&self);
}

/// Operations consumed from the underlying engine.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Start a row-returning query; rows are delivered once the cursor is started.
    async fn execute_query(
        &self,
        statement: &BoundStatement,
        context: ExecutionContext,
    ) -> Result<Arc<dyn RowCursor<Row>>, SqlReactiveDbError>;

    /// Run one DML statement and return its affected-row count.
    async fn execute_single(&self, statement: &BoundStatement) -> Result<i64, SqlReactiveDbError>;

    /// Run DML statements as one batch request; one count per statement, in order.
    async fn execute_batch(
        &self,
        statements: &[BoundStatement],
    ) -> Result<Vec<i64>, SqlReactiveDbError>;

    /// Submit a schema change.
    async fn update_ddl(&self, sql: &str) -> Result<(), SqlReactiveDbError>;

    async fn begin_read_write(&self) -> Result<(), SqlReactiveDbError>;

    async fn begin_read_only(&self, bound: ConsistencyBound) -> Result<(), SqlReactiveDbError>;

    /// Flush and commit the open read/write transaction.
    async fn commit(&self) -> Result<(), SqlReactiveDbError>;

    /// Discard the open read/write transaction.
    async fn rollback(&self) -> Result<(), SqlReactiveDbError>;

    /// Release the open read-only snapshot.
    async fn close_read_only(&self) -> Result<(), SqlReactiveDbError>;

    /// Whether the engine client has been shut down.
    fn is_closed(&self) -> bool {
        false
    }
}
