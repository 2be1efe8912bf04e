use thiserror::Error;

use crate::types::TransactionKind;

#[derive(Debug, Error)]
pub enum SqlReactiveDbError {
    /// A begin was attempted while another transaction is still open.
    #[error("Transaction already in progress: {kind}")]
    TransactionInProgress { kind: TransactionKind },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    ConfigParse(#[from] serde_json::Error),
}

impl SqlReactiveDbError {
    /// True for errors raised locally before any engine interaction.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::EngineError(_))
    }
}
