use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be bound as statement parameters or read back from a row.
///
/// ```rust
/// use sql_reactive::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

/// Named parameters bound to one statement execution.
pub type Params = BTreeMap<String, RowValues>;

/// One SQL text together with the parameters bound for it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Params,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn without_params(sql: impl Into<String>) -> Self {
        Self::new(sql, Params::new())
    }
}

/// Kind of an open transaction, as reported by `TransactionInProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum TransactionKind {
    ReadWrite,
    ReadOnly,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::ReadWrite => f.write_str("read/write"),
            TransactionKind::ReadOnly => f.write_str("read-only"),
        }
    }
}

/// Staleness bound for a read-only snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyBound {
    /// Read the latest committed data.
    #[default]
    Strong,
    /// Read at exactly this timestamp.
    ReadTimestamp(DateTime<Utc>),
    /// Read at any timestamp no older than this one.
    MinReadTimestamp(DateTime<Utc>),
    /// Read data exactly this stale.
    ExactStaleness(Duration),
    /// Read data at most this stale.
    MaxStaleness(Duration),
}

/// Where the engine should run a statement, as decided by the session's transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A standalone single-use operation outside any session transaction.
    SingleUse,
    /// Inside the session's open read/write transaction.
    ReadWriteTransaction,
    /// Inside the session's read-only snapshot.
    ReadOnlySnapshot(ConsistencyBound),
}
