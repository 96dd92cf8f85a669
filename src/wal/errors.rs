//! Log error types.
//!
//! Error codes:
//! - XANA_WAL_APPEND_FAILED (ERROR severity)
//! - XANA_WAL_FSYNC_FAILED (FATAL severity)
//! - XANA_WAL_CORRUPTION (FATAL severity)
//! - XANA_WAL_TORN_TAIL (ERROR severity)
//!
//! A torn tail is an incomplete record at the exact end of the file,
//! the expected residue of a crash mid-append. It terminates replay at
//! that point and is reported, but it is not corruption: every byte
//! before it is intact. Corruption anywhere else is fatal.

use std::fmt;
use std::io;

/// Severity levels for log errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the process continues.
    Error,
    /// The storage core must stop.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Log-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// A log write failed.
    AppendFailed,
    /// fsync of the log failed.
    FsyncFailed,
    /// Checksum, framing or size-accounting failure on read.
    Corruption,
    /// Incomplete record at end of file.
    TornTail,
}

impl WalErrorCode {
    /// The stable string code.
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::AppendFailed => "XANA_WAL_APPEND_FAILED",
            WalErrorCode::FsyncFailed => "XANA_WAL_FSYNC_FAILED",
            WalErrorCode::Corruption => "XANA_WAL_CORRUPTION",
            WalErrorCode::TornTail => "XANA_WAL_TORN_TAIL",
        }
    }

    /// The severity for this code.
    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::AppendFailed => Severity::Error,
            WalErrorCode::FsyncFailed => Severity::Fatal,
            WalErrorCode::Corruption => Severity::Fatal,
            WalErrorCode::TornTail => Severity::Error,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Log error with code, message and optional byte-offset context.
#[derive(Debug)]
pub struct WalError {
    code: WalErrorCode,
    message: String,
    offset: Option<u64>,
    source: Option<io::Error>,
}

impl WalError {
    /// A failed log write.
    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: WalErrorCode::AppendFailed,
            message: message.into(),
            offset: None,
            source: Some(source),
        }
    }

    /// A failed fsync. Fatal.
    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: WalErrorCode::FsyncFailed,
            message: message.into(),
            offset: None,
            source: Some(source),
        }
    }

    /// Corruption without positional context.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: WalErrorCode::Corruption,
            message: message.into(),
            offset: None,
            source: None,
        }
    }

    /// Corruption at a known byte offset.
    pub fn corruption_at(offset: u64, message: impl Into<String>) -> Self {
        Self {
            code: WalErrorCode::Corruption,
            message: message.into(),
            offset: Some(offset),
            source: None,
        }
    }

    /// An incomplete record at the end of the file.
    pub fn torn_tail(offset: u64) -> Self {
        Self {
            code: WalErrorCode::TornTail,
            message: "incomplete record at end of log".to_string(),
            offset: Some(offset),
            source: None,
        }
    }

    /// The error code.
    pub fn code(&self) -> WalErrorCode {
        self.code
    }

    /// The severity of this error.
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset in the log, when known.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// True when the process must not continue past this error.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(offset) = self.offset {
            write!(f, " (byte_offset: {})", offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for log operations.
pub type WalResult<T> = Result<T, WalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(WalErrorCode::AppendFailed.code(), "XANA_WAL_APPEND_FAILED");
        assert_eq!(WalErrorCode::FsyncFailed.code(), "XANA_WAL_FSYNC_FAILED");
        assert_eq!(WalErrorCode::Corruption.code(), "XANA_WAL_CORRUPTION");
        assert_eq!(WalErrorCode::TornTail.code(), "XANA_WAL_TORN_TAIL");
    }

    #[test]
    fn test_corruption_and_fsync_are_fatal() {
        assert!(WalError::corruption("bad checksum").is_fatal());
        let io = io::Error::new(io::ErrorKind::Other, "disk gone");
        assert!(WalError::fsync_failed("fsync", io).is_fatal());
    }

    #[test]
    fn test_torn_tail_is_not_fatal() {
        let err = WalError::torn_tail(128);
        assert!(!err.is_fatal());
        assert_eq!(err.offset(), Some(128));
    }

    #[test]
    fn test_display_carries_offset() {
        let err = WalError::corruption_at(42, "checksum mismatch");
        let text = format!("{}", err);
        assert!(text.contains("XANA_WAL_CORRUPTION"));
        assert!(text.contains("FATAL"));
        assert!(text.contains("byte_offset: 42"));
    }
}
