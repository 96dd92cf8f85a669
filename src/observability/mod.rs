//! Structured logging for the storage core.
//!
//! One log line per event, synchronous, deterministic key order.

mod logger;

pub use logger::{Logger, Severity};
