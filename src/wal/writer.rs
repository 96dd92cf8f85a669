//! Log writer with fsync enforcement.
//!
//! Every append is followed by fsync; no batching, no group commit.
//! An operation may proceed only once its record is durable. The log
//! position handed back is the byte offset the record was written at.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::errors::{WalError, WalResult};
use super::record::LogRecord;
use super::Lsn;

/// Append-only log writer. Opened with exclusive write access; the
/// file is never mutated in place and never truncated outside of
/// checkpointing.
pub struct WalWriter {
    wal_path: PathBuf,
    file: File,
    /// Byte offset the next record will be written at.
    tail: u64,
}

impl WalWriter {
    /// Opens or creates the log at `<data_dir>/wal/wal.log`, creating
    /// parent directories as needed.
    pub fn open(data_dir: &Path) -> WalResult<Self> {
        let wal_dir = data_dir.join("wal");
        let wal_path = wal_dir.join("wal.log");

        if !wal_dir.exists() {
            fs::create_dir_all(&wal_dir).map_err(|e| {
                WalError::append_failed(
                    format!("failed to create log directory: {}", wal_dir.display()),
                    e,
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)
            .map_err(|e| {
                WalError::append_failed(
                    format!("failed to open log file: {}", wal_path.display()),
                    e,
                )
            })?;

        let tail = file
            .metadata()
            .map_err(|e| WalError::append_failed("failed to read log metadata", e))?
            .len();

        Ok(Self { wal_path, file, tail })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Offset one past the last durable byte.
    pub fn tail(&self) -> Lsn {
        Lsn(self.tail)
    }

    /// Appends one record and fsyncs.
    ///
    /// Returns the record's log position. The in-memory tail advances
    /// only after a successful fsync, so a failed append never
    /// acknowledges a position.
    pub fn append(&mut self, record: &LogRecord) -> WalResult<Lsn> {
        let lsn = Lsn(self.tail);
        let bytes = record.serialize();

        self.file.write_all(&bytes).map_err(|e| {
            WalError::append_failed(
                format!("failed to write {:?} record at offset {}", record.kind(), lsn),
                e,
            )
        })?;

        self.file.sync_all().map_err(|e| {
            WalError::fsync_failed(
                format!("fsync failed after append at offset {}", lsn),
                e,
            )
        })?;

        self.tail += bytes.len() as u64;
        Ok(lsn)
    }

    /// Explicitly fsyncs the log file.
    pub fn sync(&self) -> WalResult<()> {
        self.file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("explicit log fsync failed", e))
    }

    /// Resets the log to empty. Valid only once every page covered by
    /// existing records is durable (checkpointing).
    ///
    /// The old file is removed, a fresh one created and fsynced, and
    /// the directory entry made durable before the writer reopens it.
    pub fn truncate(&mut self) -> WalResult<()> {
        let wal_dir = self.wal_path.parent().unwrap_or(Path::new("."));

        if self.wal_path.exists() {
            fs::remove_file(&self.wal_path).map_err(|e| {
                WalError::append_failed(
                    format!("failed to remove log during truncation: {}", self.wal_path.display()),
                    e,
                )
            })?;
        }

        let new_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.wal_path)
            .map_err(|e| {
                WalError::append_failed(
                    format!("failed to create fresh log: {}", self.wal_path.display()),
                    e,
                )
            })?;
        new_file
            .sync_all()
            .map_err(|e| WalError::fsync_failed("failed to fsync fresh log", e))?;

        let dir = OpenOptions::new().read(true).open(wal_dir).map_err(|e| {
            WalError::append_failed(
                format!("failed to open log directory for fsync: {}", wal_dir.display()),
                e,
            )
        })?;
        dir.sync_all()
            .map_err(|e| WalError::fsync_failed("failed to fsync log directory", e))?;

        let file = OpenOptions::new()
            .append(true)
            .open(&self.wal_path)
            .map_err(|e| {
                WalError::append_failed(
                    format!("failed to reopen log after truncation: {}", self.wal_path.display()),
                    e,
                )
            })?;

        self.file = file;
        self.tail = 0;
        Ok(())
    }
}

/// Shared front for the log tail.
///
/// Appends are serialized through an internal mutex: exactly one
/// writer at a time. Readers of already-durable positions never take
/// this lock; they open the file independently.
pub struct Wal {
    wal_path: PathBuf,
    inner: Mutex<WalWriter>,
}

impl Wal {
    /// Opens the shared log under `data_dir`.
    pub fn open(data_dir: &Path) -> WalResult<Self> {
        let writer = WalWriter::open(data_dir)?;
        Ok(Self {
            wal_path: writer.path().to_path_buf(),
            inner: Mutex::new(writer),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Appends one record, serialized across callers, durable on return.
    pub fn append(&self, record: &LogRecord) -> WalResult<Lsn> {
        self.inner.lock().unwrap().append(record)
    }

    /// Offset one past the last durable byte.
    pub fn tail(&self) -> Lsn {
        self.inner.lock().unwrap().tail()
    }

    /// Explicit fsync.
    pub fn sync(&self) -> WalResult<()> {
        self.inner.lock().unwrap().sync()
    }

    /// Resets the log to empty after a checkpoint.
    pub fn truncate(&self) -> WalResult<()> {
        self.inner.lock().unwrap().truncate()
    }
}
