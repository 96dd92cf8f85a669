//! Sequential log reader.
//!
//! Reads records in append order, validating the checksum and size
//! accounting of every record. Corruption in the middle of the log is
//! fatal; an incomplete record at the exact end of the file is the
//! residue of a crash mid-append and cleanly terminates the scan.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::errors::{WalError, WalResult};
use super::record::LogRecord;
use super::Lsn;

/// Outcome of a `replay_from` scan.
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    /// Number of records decoded and visited.
    pub records: u64,
    /// Offset of an incomplete trailing record, if the scan ended on one.
    pub torn_tail_at: Option<u64>,
    /// Offset one past the last fully decoded record.
    pub end: u64,
}

/// Forward-only log reader, restartable from any known position.
pub struct WalReader {
    wal_path: PathBuf,
    file: File,
    offset: u64,
    file_size: u64,
}

impl WalReader {
    /// Opens the log file for reading.
    pub fn open(wal_path: &Path) -> WalResult<Self> {
        let file = File::open(wal_path).map_err(|e| {
            WalError::corruption(format!(
                "failed to open log for reading: {}: {}",
                wal_path.display(),
                e
            ))
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| WalError::corruption(format!("failed to stat log: {}", e)))?
            .len();

        Ok(Self {
            wal_path: wal_path.to_path_buf(),
            file,
            offset: 0,
            file_size,
        })
    }

    /// Opens the log from a data directory (`<data_dir>/wal/wal.log`).
    pub fn open_from_data_dir(data_dir: &Path) -> WalResult<Self> {
        Self::open(&data_dir.join("wal").join("wal.log"))
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Repositions the reader at `lsn`.
    pub fn seek(&mut self, lsn: Lsn) -> WalResult<()> {
        if lsn.0 > self.file_size {
            return Err(WalError::corruption_at(
                lsn.0,
                format!("seek beyond end of log (size {})", self.file_size),
            ));
        }
        self.file
            .seek(SeekFrom::Start(lsn.0))
            .map_err(|e| WalError::corruption_at(lsn.0, format!("seek failed: {}", e)))?;
        self.offset = lsn.0;
        Ok(())
    }

    /// Decodes the next record.
    ///
    /// Returns `Ok(None)` at a clean end of log. An incomplete record
    /// touching end-of-file surfaces as a `TornTail` error; anything
    /// else that fails to decode is fatal corruption.
    pub fn read_next(&mut self) -> WalResult<Option<(Lsn, LogRecord)>> {
        if self.offset == self.file_size {
            return Ok(None);
        }

        let start = self.offset;
        let remaining = (self.file_size - start) as usize;

        // length prefix
        if remaining < 4 {
            return Err(WalError::torn_tail(start));
        }
        let mut len_buf = [0u8; 4];
        self.read_exact_at(&mut len_buf, start)?;
        let total = u32::from_le_bytes(len_buf) as usize;

        if total < 4 {
            return Err(WalError::corruption_at(
                start,
                format!("declared record length {} below minimum frame", total),
            ));
        }
        if remaining < total {
            // the record promises more bytes than the file holds
            return Err(WalError::torn_tail(start));
        }

        let mut frame = vec![0u8; total];
        frame[..4].copy_from_slice(&len_buf);
        self.read_exact_at(&mut frame[4..], start + 4)?;

        let (record, consumed) = LogRecord::deserialize(&frame)
            .map_err(|e| WalError::corruption_at(start, e.message().to_string()))?;
        debug_assert_eq!(consumed, total);

        self.offset = start + total as u64;
        Ok(Some((Lsn(start), record)))
    }

    /// Reads every record from all of `from` to the end of the log,
    /// invoking the visitor once per decoded record.
    ///
    /// Lazy and forward-only; the scan stops cleanly at a torn tail
    /// (reported in the summary) and propagates corruption as an error.
    pub fn replay_from<F>(&mut self, from: Lsn, mut visitor: F) -> WalResult<ReplaySummary>
    where
        F: FnMut(Lsn, LogRecord),
    {
        self.seek(from)?;
        let mut summary = ReplaySummary::default();

        loop {
            match self.read_next() {
                Ok(Some((lsn, record))) => {
                    summary.records += 1;
                    visitor(lsn, record);
                }
                Ok(None) => break,
                Err(e) if e.code() == super::errors::WalErrorCode::TornTail => {
                    summary.torn_tail_at = e.offset();
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        summary.end = self.offset;
        Ok(summary)
    }

    fn read_exact_at(&mut self, buf: &mut [u8], at: u64) -> WalResult<()> {
        self.file
            .seek(SeekFrom::Start(at))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e: io::Error| {
                WalError::corruption_at(at, format!("log read failed: {}", e))
            })
    }
}
