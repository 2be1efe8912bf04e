//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to open a session, run statements
//! and consume their rows.

pub use crate::classify::{StatementKind, classify};
pub use crate::config::{RedeliveryPolicy, SessionConfig};
pub use crate::connection::Connection;
pub use crate::engine::{CallbackDirective, CursorCallback, CursorSignal, QueryEngine, RowCursor};
pub use crate::error::SqlReactiveDbError;
pub use crate::publisher::{
    EmptyPublisher, Publisher, RowPublisher, RowStream, Subscriber, Subscription,
    SubscriptionControl, UNBOUNDED,
};
pub use crate::results::{ColumnMetadata, MappedRows, Row, RowMetadata, SqlResult};
pub use crate::statement::{DdlStatement, DmlStatement, QueryStatement, Statement, StatementBatch};
pub use crate::transaction::{TransactionMode, TxOutcome, TxWarning};
pub use crate::types::{
    BoundStatement, ConsistencyBound, ExecutionContext, Params, RowValues, TransactionKind,
};
