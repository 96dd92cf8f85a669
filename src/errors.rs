//! Crate-level error taxonomy.
//!
//! Each subsystem carries its own error type; `CoreError` unifies them
//! at the crate boundary and classifies every failure into the small
//! taxonomy collaborators program against.

use thiserror::Error;

use crate::pool::PoolError;
use crate::recovery::RecoveryError;
use crate::store::StoreError;
use crate::txn::TxnError;
use crate::wal::{WalError, WalErrorCode};

/// The failure classes collaborators can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Pool at capacity; no session within the bounded wait.
    ResourceExhausted,
    /// Caller lacks the role a privileged operation requires.
    PermissionDenied,
    /// An operation requiring an active transaction hit a terminal
    /// handle.
    TransactionStateViolation,
    /// A log record failed checksum or size accounting on read, or
    /// disagrees with the pages it describes.
    CorruptLogRecord,
    /// Underlying I/O failure in log or page storage.
    StorageIOFailure,
    /// The pool or engine has begun shutdown.
    Shutdown,
    /// A request the core cannot honor (oversized key, unknown store).
    InvalidOperation,
}

/// Unified error for the storage core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Write-ahead log failure.
    #[error(transparent)]
    Wal(#[from] WalError),
    /// B-tree store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Transaction lifecycle failure.
    #[error(transparent)]
    Txn(#[from] TxnError),
    /// Session pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Recovery failure.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

impl CoreError {
    /// Classifies this error into the taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Wal(e) => wal_kind(e),
            CoreError::Store(e) => store_kind(e),
            CoreError::Txn(e) => txn_kind(e),
            CoreError::Pool(e) => match e {
                PoolError::Exhausted { .. } => ErrorKind::ResourceExhausted,
                PoolError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
                PoolError::ShuttingDown => ErrorKind::Shutdown,
            },
            CoreError::Recovery(e) => match e {
                RecoveryError::Wal(e) => wal_kind(e),
                RecoveryError::Store(e) => store_kind(e),
                RecoveryError::UnknownStore { .. } => ErrorKind::InvalidOperation,
            },
        }
    }
}

fn wal_kind(e: &WalError) -> ErrorKind {
    match e.code() {
        WalErrorCode::Corruption | WalErrorCode::TornTail => ErrorKind::CorruptLogRecord,
        WalErrorCode::AppendFailed | WalErrorCode::FsyncFailed => ErrorKind::StorageIOFailure,
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::Io { .. } | StoreError::PageNotFound { .. } | StoreError::CorruptPage { .. } => {
            ErrorKind::StorageIOFailure
        }
        StoreError::Txn(e) => txn_kind(e),
        StoreError::Wal(e) => wal_kind(e),
        StoreError::KeyTooLarge { .. } => ErrorKind::InvalidOperation,
        // a record that disagrees with the page it describes
        StoreError::WrongStore { .. } | StoreError::SlotOutOfBounds { .. } => {
            ErrorKind::CorruptLogRecord
        }
    }
}

fn txn_kind(e: &TxnError) -> ErrorKind {
    match e {
        TxnError::StateViolation { .. } => ErrorKind::TransactionStateViolation,
        TxnError::Wal(e) => wal_kind(e),
    }
}
