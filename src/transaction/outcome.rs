use std::fmt;

use crate::types::TransactionKind;

/// Diagnostic attached to a successful commit or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxWarning {
    /// The read/write transaction ended without running any statement.
    NoStatements,
}

impl fmt::Display for TxWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxWarning::NoStatements => {
                f.write_str("read/write transaction ended without any statements")
            }
        }
    }
}

/// Outcome returned by committing or rolling back a session transaction.
///
/// Ending a transaction normally yields nothing of interest, but callers may want to know
/// whether a transaction was actually open and whether the engine had anything to flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOutcome {
    ended: Option<TransactionKind>,
    warning: Option<TxWarning>,
}

impl TxOutcome {
    /// Outcome when no transaction was open; the call was a no-op.
    #[must_use]
    pub fn without_transaction() -> Self {
        Self::default()
    }

    /// Outcome for a transaction of `kind` that was ended.
    #[must_use]
    pub fn ended(kind: TransactionKind) -> Self {
        Self {
            ended: Some(kind),
            warning: None,
        }
    }

    #[must_use]
    pub fn with_warning(mut self, warning: TxWarning) -> Self {
        self.warning = Some(warning);
        self
    }

    /// Kind of the transaction that was ended, if any.
    #[must_use]
    pub fn ended_kind(&self) -> Option<TransactionKind> {
        self.ended
    }

    #[must_use]
    pub fn warning(&self) -> Option<TxWarning> {
        self.warning
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.ended.is_none()
    }
}
