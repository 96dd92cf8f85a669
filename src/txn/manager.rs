//! Transaction manager.
//!
//! The single issuer of transaction handles. Ids are monotonically
//! increasing and never reused within one log; after the log is
//! truncated by a checkpoint the counter may restart without
//! ambiguity, since no prior record survives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::wal::{LogRecord, TxnId, Wal};

use super::errors::TxnResult;
use super::handle::Txn;

/// Issues transaction handles and the ids behind them.
pub struct TransactionManager {
    wal: Arc<Wal>,
    next_id: AtomicU64,
}

impl TransactionManager {
    /// A manager appending markers to `wal`, issuing ids from 1.
    pub fn new(wal: Arc<Wal>) -> Self {
        Self {
            wal,
            next_id: AtomicU64::new(1),
        }
    }

    /// Begins a transaction: assigns the next id, journals the start
    /// marker, and hands out the `Active` handle.
    pub fn begin(&self) -> TxnResult<Arc<Txn>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.wal.append(&LogRecord::txn_start(id))?;
        Ok(Arc::new(Txn::new(id, Arc::clone(&self.wal))))
    }

    /// The id the next `begin` will assign.
    pub fn next_txn_id(&self) -> TxnId {
        self.next_id.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::handle::TxnState;
    use tempfile::TempDir;

    #[test]
    fn test_ids_are_monotonic() {
        let dir = TempDir::new().unwrap();
        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        let manager = TransactionManager::new(wal);

        let t1 = manager.begin().unwrap();
        let t2 = manager.begin().unwrap();
        let t3 = manager.begin().unwrap();

        assert!(t1.id() < t2.id());
        assert!(t2.id() < t3.id());
    }

    #[test]
    fn test_begin_hands_out_active_handles() {
        let dir = TempDir::new().unwrap();
        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        let manager = TransactionManager::new(wal);

        let txn = manager.begin().unwrap();
        assert_eq!(txn.state(), TxnState::Active);
    }

    #[test]
    fn test_concurrent_begins_never_collide() {
        use std::collections::HashSet;
        use std::sync::Mutex;

        let dir = TempDir::new().unwrap();
        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        let manager = TransactionManager::new(wal);
        let seen = Mutex::new(HashSet::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let txn = manager.begin().unwrap();
                        assert!(seen.lock().unwrap().insert(txn.id()));
                    }
                });
            }
        });

        assert_eq!(seen.lock().unwrap().len(), 400);
    }
}
