mod outcome;
mod state;

pub use outcome::{TxOutcome, TxWarning};
pub use state::{TransactionMode, TransactionStateMachine};
