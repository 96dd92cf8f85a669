//! Write-ahead log subsystem.
//!
//! The log is the authoritative durability mechanism: a structural
//! mutation exists once its log record is fully persisted, and not
//! before. Data pages are written to disk only after the records
//! covering them are durable.
//!
//! # Design Principles
//!
//! - Durability over throughput: fsync after every append
//! - Determinism over optimization: sequential, replayable byte stream
//! - Explicit failure over silent recovery: halt on corruption
//!
//! The log is append-only. Records are framed, type-tagged, and
//! checksummed; the reader never needs external framing to consume
//! them. Truncation happens only through checkpointing.

mod checksum;
mod errors;
mod reader;
mod record;
mod writer;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use reader::{ReplaySummary, WalReader};
pub use record::{
    CheckpointPayload, FileId, KeyInsertPayload, KeyRemovePayload, KeyUpdatePayload, LogOp,
    LogRecord, PageNo, PageSplitPayload, PageUpdatePayload, RecordKind, TxnId, NO_PAGE,
};
pub use writer::{Wal, WalWriter};

use std::fmt;

/// Log sequence number: the byte offset of a record in the log file.
///
/// Totally ordered by append sequence. Pages carry the LSN of the last
/// record applied to them, which gates redo during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn(pub u64);

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
