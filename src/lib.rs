//! xanadb - transactional storage core for a native XML database
//!
//! The core is a page-based B-tree store protected by a write-ahead log.
//! Callers acquire a session from the pool, begin a transaction, perform
//! keyed reads and writes against a store, then commit or abort. On
//! restart, recovery replays the log: committed transactions are redone,
//! uncommitted ones undone.

pub mod config;
pub mod errors;
pub mod observability;
pub mod pool;
pub mod recovery;
pub mod store;
pub mod txn;
pub mod wal;

pub use config::StorageConfig;
pub use errors::{CoreError, ErrorKind};
