//! Recovery error types.

use thiserror::Error;

use crate::store::StoreError;
use crate::wal::{FileId, WalError};

/// Result type for recovery operations.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// Errors raised during crash recovery.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Log failure while scanning or truncating; corruption here halts
    /// recovery with no partial repair.
    #[error(transparent)]
    Wal(#[from] WalError),

    /// Store failure while re-applying or reversing a record.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record names a store that was not registered for recovery.
    #[error("log record references unknown store {file_id}")]
    UnknownStore {
        /// The unregistered store tag.
        file_id: FileId,
    },
}
