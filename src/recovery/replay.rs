//! Log replay: redo committed work, undo uncommitted work.
//!
//! Replay is deterministic: the same log bytes produce the same
//! recovered state. It proceeds in passes:
//!
//! 1. scan for the last checkpoint, the position replay restarts from;
//! 2. scan from there, grouping records by transaction and collecting
//!    the set of committed transaction ids;
//! 3. redo: records of committed transactions re-applied in log order,
//!    each gated by its page's LSN;
//! 4. undo: records of uncommitted transactions reversed, newest
//!    first.
//!
//! Any corruption before the end of the log halts recovery. An
//! incomplete record at the tail is the residue of a crash mid-append;
//! it terminates the scan cleanly and is reported in the stats.

use std::collections::{HashMap, HashSet};

use crate::store::BTreeStore;
use crate::wal::{FileId, LogRecord, Lsn, RecordKind, TxnId, WalReader};

use super::errors::{RecoveryError, RecoveryResult};

/// Statistics from one replay run.
#[derive(Debug, Clone, Default)]
pub struct RecoveryStats {
    /// Records scanned after the starting checkpoint.
    pub records_scanned: u64,
    /// Transactions with a durable commit marker.
    pub committed_txns: u64,
    /// Transactions rolled back for lack of one.
    pub rolled_back_txns: u64,
    /// Redo applications performed.
    pub redo_applied: u64,
    /// Undo applications performed.
    pub undo_applied: u64,
    /// Byte position replay started from.
    pub start_lsn: u64,
    /// Offset of an incomplete trailing record, if the log ended in one.
    pub torn_tail_at: Option<u64>,
}

/// Drives replay over a set of stores sharing one log.
pub struct WalReplayer;

impl WalReplayer {
    /// Replays the log onto the registered stores.
    ///
    /// Every store named by any record after the last checkpoint must
    /// be present in `stores`, keyed by file id.
    pub fn replay(
        reader: &mut WalReader,
        stores: &HashMap<FileId, &BTreeStore>,
    ) -> RecoveryResult<RecoveryStats> {
        let mut stats = RecoveryStats::default();

        // pass 1: locate the last checkpoint
        let mut start = Lsn(0);
        reader.replay_from(Lsn(0), |lsn, record| {
            if record.kind() == RecordKind::Checkpoint {
                start = lsn;
            }
        })?;
        stats.start_lsn = start.0;

        // pass 2: group page records by transaction, note commit markers
        let mut ordered: Vec<(Lsn, LogRecord)> = Vec::new();
        let mut committed: HashSet<TxnId> = HashSet::new();
        let summary = reader.replay_from(start, |lsn, record| match record.kind() {
            RecordKind::TxnCommit => {
                committed.insert(record.txn_id);
            }
            RecordKind::TxnStart | RecordKind::TxnAbort | RecordKind::Checkpoint => {}
            _ => ordered.push((lsn, record)),
        })?;
        stats.records_scanned = summary.records;
        stats.torn_tail_at = summary.torn_tail_at;

        // pass 3: redo committed transactions in log order
        for (lsn, record) in &ordered {
            if !committed.contains(&record.txn_id) {
                continue;
            }
            let store = store_for(stores, record)?;
            if let Some(store) = store {
                record.redo(*lsn, store)?;
                stats.redo_applied += 1;
            }
        }

        // pass 4: undo uncommitted transactions, newest record first
        for (_, record) in ordered.iter().rev() {
            if committed.contains(&record.txn_id) {
                continue;
            }
            let store = store_for(stores, record)?;
            if let Some(store) = store {
                record.undo(store)?;
                stats.undo_applied += 1;
            }
        }

        stats.committed_txns = committed.len() as u64;
        stats.rolled_back_txns = ordered
            .iter()
            .filter(|(_, r)| !committed.contains(&r.txn_id))
            .map(|(_, r)| r.txn_id)
            .collect::<HashSet<_>>()
            .len() as u64;

        Ok(stats)
    }
}

fn store_for<'a>(
    stores: &HashMap<FileId, &'a BTreeStore>,
    record: &LogRecord,
) -> RecoveryResult<Option<&'a BTreeStore>> {
    match record.file_id() {
        Some(file_id) => stores
            .get(&file_id)
            .copied()
            .map(Some)
            .ok_or(RecoveryError::UnknownStore { file_id }),
        None => Ok(None),
    }
}
