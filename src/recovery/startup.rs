//! Startup recovery orchestration and checkpointing.
//!
//! On restart: replay the log onto the registered stores, flush every
//! recovered page, then reset the log. A crash at any stage leaves a
//! log that replays to the same state, so the sequence is safe to
//! repeat.
//!
//! Checkpointing during normal operation is the non-truncating
//! variant: flush all stores, then append a checkpoint marker. Replay
//! restarts from the last marker, so everything before it may be
//! reclaimed by the next startup truncation.

use std::collections::HashMap;

use crate::observability::{Logger, Severity};
use crate::store::BTreeStore;
use crate::wal::{FileId, LogRecord, Lsn, Wal, WalReader};

use super::errors::RecoveryResult;
use super::replay::{RecoveryStats, WalReplayer};

/// Runs recovery and checkpoints.
pub struct RecoveryManager;

impl RecoveryManager {
    /// Recovers the registered stores from the shared log.
    ///
    /// Redoes committed transactions, undoes uncommitted ones, makes
    /// the outcome durable, then truncates the log. Returns the replay
    /// statistics.
    pub fn run(wal: &Wal, stores: &[&BTreeStore]) -> RecoveryResult<RecoveryStats> {
        let registry = build_registry(stores);

        let stats = {
            let mut reader = WalReader::open(wal.path())?;
            WalReplayer::replay(&mut reader, &registry)?
        };

        for store in stores {
            store.sync()?;
        }
        wal.truncate()?;

        if let Some(offset) = stats.torn_tail_at {
            Logger::log(
                Severity::Warn,
                "recovery_torn_tail",
                &[("byte_offset", &offset.to_string())],
            );
        }
        Logger::log(
            Severity::Info,
            "recovery_complete",
            &[
                ("records_scanned", &stats.records_scanned.to_string()),
                ("committed_txns", &stats.committed_txns.to_string()),
                ("rolled_back_txns", &stats.rolled_back_txns.to_string()),
                ("redo_applied", &stats.redo_applied.to_string()),
                ("undo_applied", &stats.undo_applied.to_string()),
            ],
        );

        Ok(stats)
    }

    /// Checkpoints during normal operation: flushes every store, then
    /// appends a checkpoint marker. Replay restarts from the marker.
    ///
    /// Valid only while no transaction is active; callers serialize
    /// checkpoints against running work through pool service mode.
    pub fn checkpoint(wal: &Wal, stores: &[&BTreeStore]) -> RecoveryResult<Lsn> {
        for store in stores {
            store.sync()?;
        }
        let lsn = wal.append(&LogRecord::checkpoint(stores.len() as u16))?;
        Logger::log(
            Severity::Info,
            "checkpoint_written",
            &[
                ("lsn", &lsn.to_string()),
                ("stores_flushed", &stores.len().to_string()),
            ],
        );
        Ok(lsn)
    }
}

fn build_registry<'a>(stores: &[&'a BTreeStore]) -> HashMap<FileId, &'a BTreeStore> {
    let mut registry = HashMap::new();
    for store in stores {
        let previous = registry.insert(store.file_id(), *store);
        debug_assert!(previous.is_none(), "duplicate store file id");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::TransactionManager;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_run_recovers_and_truncates() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("store.db");

        {
            let wal = Arc::new(Wal::open(dir.path()).unwrap());
            let manager = TransactionManager::new(Arc::clone(&wal));
            let store = BTreeStore::open(1, &store_path, 4096, wal).unwrap();
            let txn = manager.begin().unwrap();
            store.insert(&txn, b"survivor", 11).unwrap();
            txn.commit().unwrap();
        }

        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        let store = BTreeStore::open(1, &store_path, 4096, Arc::clone(&wal)).unwrap();
        let stats = RecoveryManager::run(&wal, &[&store]).unwrap();

        assert_eq!(stats.committed_txns, 1);
        assert_eq!(store.find(b"survivor").unwrap(), Some(11));
        assert_eq!(wal.tail(), Lsn(0), "log reset after recovery");

        // a second run over the empty log is a no-op
        let stats = RecoveryManager::run(&wal, &[&store]).unwrap();
        assert_eq!(stats.records_scanned, 0);
        assert_eq!(store.find(b"survivor").unwrap(), Some(11));
    }

    #[test]
    fn test_checkpoint_bounds_replay() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("store.db");

        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        let manager = TransactionManager::new(Arc::clone(&wal));
        let store = BTreeStore::open(1, &store_path, 4096, Arc::clone(&wal)).unwrap();

        let txn = manager.begin().unwrap();
        store.insert(&txn, b"early", 1).unwrap();
        txn.commit().unwrap();

        let checkpoint_lsn = RecoveryManager::checkpoint(&wal, &[&store]).unwrap();

        let txn = manager.begin().unwrap();
        store.insert(&txn, b"late", 2).unwrap();
        txn.commit().unwrap();

        let mut reader = WalReader::open(wal.path()).unwrap();
        let mut registry = HashMap::new();
        registry.insert(store.file_id(), &store);
        let stats = WalReplayer::replay(&mut reader, &registry).unwrap();

        assert_eq!(stats.start_lsn, checkpoint_lsn.0);
        // only the records after the checkpoint were scanned
        assert!(stats.records_scanned < 8);
        assert_eq!(store.find(b"early").unwrap(), Some(1));
        assert_eq!(store.find(b"late").unwrap(), Some(2));
    }
}
