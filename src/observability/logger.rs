//! Structured JSON logger.
//!
//! - One log line = one event
//! - Deterministic key ordering (event, severity, then fields sorted)
//! - Synchronous, unbuffered
//!
//! The storage core logs pool waits, recovery statistics and
//! checkpoint events through this; nothing here allocates a logging
//! framework or background thread.

use std::fmt;
use std::io::{self, Write};

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail.
    Trace = 0,
    /// Normal operations.
    Info = 1,
    /// Recoverable issues.
    Warn = 2,
    /// Operation failures.
    Error = 3,
    /// Unrecoverable; the core must stop.
    Fatal = 4,
}

impl Severity {
    /// String form used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous structured logger.
pub struct Logger;

impl Logger {
    /// Logs an event with sorted fields to stdout.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stdout());
    }

    /// Logs to stderr, for errors and fatal events.
    pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut output = String::with_capacity(256);

        output.push_str("{\"event\":\"");
        escape_into(&mut output, event);
        output.push_str("\",\"severity\":\"");
        output.push_str(severity.as_str());
        output.push('"');

        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            output.push_str(",\"");
            escape_into(&mut output, key);
            output.push_str("\":\"");
            escape_into(&mut output, value);
            output.push('"');
        }

        output.push_str("}\n");

        // one write, one flush, no interleaving between threads
        let _ = writer.write_all(output.as_bytes());
        let _ = writer.flush();
    }
}

fn escape_into(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut buf = Vec::new();
        Logger::log_to_writer(severity, event, fields, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_event_and_severity_lead() {
        let line = render(Severity::Info, "pool_waiting", &[]);
        assert_eq!(line, "{\"event\":\"pool_waiting\",\"severity\":\"INFO\"}\n");
    }

    #[test]
    fn test_fields_sorted_deterministically() {
        let line = render(
            Severity::Warn,
            "recovery_done",
            &[("zulu", "1"), ("alpha", "2")],
        );
        let alpha = line.find("alpha").unwrap();
        let zulu = line.find("zulu").unwrap();
        assert!(alpha < zulu);
    }

    #[test]
    fn test_special_characters_escaped() {
        let line = render(Severity::Error, "oops", &[("msg", "a\"b\nc")]);
        assert!(line.contains("a\\\"b\\nc"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Error < Severity::Fatal);
    }
}
