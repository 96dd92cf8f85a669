//! Store error types.

use std::io;

use thiserror::Error;

use crate::txn::errors::TxnError;
use crate::wal::{FileId, PageNo, WalError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the B-tree page store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure while reading or writing page data.
    #[error("i/o failure on store {file_id}: {message}")]
    Io {
        /// Store the failure occurred in.
        file_id: FileId,
        /// What was being attempted.
        message: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A mutating call without an active transaction, or any other
    /// transaction-state fault surfaced through the store.
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// Log append or fsync failure; forces the enclosing transaction
    /// to abort.
    #[error(transparent)]
    Wal(#[from] WalError),

    /// A key too large to ever share a page with its neighbors.
    #[error("key of {len} bytes exceeds the {max} byte limit for a {page_size} byte page")]
    KeyTooLarge {
        /// Length of the offending key.
        len: usize,
        /// Maximum admissible entry key length.
        max: usize,
        /// Configured page size.
        page_size: usize,
    },

    /// A page number that does not exist in this store.
    #[error("page {page_no} not found in store {file_id}")]
    PageNotFound {
        /// Store searched.
        file_id: FileId,
        /// Missing page.
        page_no: PageNo,
    },

    /// A log record routed to the wrong store.
    #[error("record for store {expected} applied to store {actual}")]
    WrongStore {
        /// Store the record names.
        expected: FileId,
        /// Store it was applied to.
        actual: FileId,
    },

    /// A slot index outside the page's entry array, seen only when a
    /// log record disagrees with the page it describes.
    #[error("slot {idx} out of bounds on page {page_no} ({len} entries)")]
    SlotOutOfBounds {
        /// Page the record addressed.
        page_no: PageNo,
        /// Slot the record addressed.
        idx: u16,
        /// Entries actually on the page.
        len: usize,
    },

    /// A page image that does not decode.
    #[error("corrupt page {page_no} in store {file_id}: {message}")]
    CorruptPage {
        /// Store the page belongs to.
        file_id: FileId,
        /// The page.
        page_no: PageNo,
        /// What failed.
        message: String,
    },
}

impl StoreError {
    pub(crate) fn io(file_id: FileId, message: impl Into<String>, source: io::Error) -> Self {
        StoreError::Io {
            file_id,
            message: message.into(),
            source,
        }
    }
}
