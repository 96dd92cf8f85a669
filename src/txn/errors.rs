//! Transaction error types.

use thiserror::Error;

use super::handle::TxnState;
use crate::wal::{TxnId, WalError};

/// Result type for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors raised by the transaction manager and handles.
#[derive(Debug, Error)]
pub enum TxnError {
    /// An operation requiring `Active` state was invoked on a handle
    /// in a terminal state.
    #[error("transaction {id} is {state}; `{op}` requires an active transaction")]
    StateViolation {
        /// The transaction.
        id: TxnId,
        /// Its state at the time of the call.
        state: TxnState,
        /// The rejected operation.
        op: &'static str,
    },

    /// Log failure while writing a transaction marker.
    #[error(transparent)]
    Wal(#[from] WalError),
}
