//! Reactive session layer for callback-driven SQL engines.
//!
//! Engine cursors are exposed as demand-respecting row streams, session transactions follow
//! a small state machine that routes every statement, and DML statements can accumulate
//! parameter sets into a single batch request.

pub mod classify;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod publisher;
pub mod results;
pub mod statement;
pub mod transaction;
pub mod types;

pub use classify::{StatementKind, classify};
pub use config::{RedeliveryPolicy, SessionConfig};
pub use connection::Connection;
pub use error::SqlReactiveDbError;
pub use results::{Row, SqlResult};
pub use types::RowValues;
