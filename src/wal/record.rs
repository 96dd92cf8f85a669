//! Log record types and their binary codec.
//!
//! Every structural mutation of a store is described by exactly one
//! record. The set of operation kinds is closed: a tagged enum,
//! dispatched by pattern matching for serialize, deserialize, redo and
//! undo. Records are immutable once constructed.
//!
//! Wire format:
//!
//! - Record Length (u32 LE), total length including this field
//! - Record Kind (u8)
//! - Transaction Id (u64 LE)
//! - Payload (kind-specific, fixed field order)
//! - Checksum (u32 LE) over everything before it
//!
//! `declared_size` returns exactly the number of bytes `serialize`
//! produces; the reader relies on it to consume the stream without
//! external framing. A record whose payload does not account for every
//! byte it promised is corrupt, and corruption is fatal.

use super::checksum::compute_checksum;
use super::errors::{WalError, WalResult};
use super::Lsn;
use crate::store::errors::StoreResult;
use crate::store::BTreeStore;

/// Transaction identifier. Monotonically issued by the transaction
/// manager, never reused within one log.
pub type TxnId = u64;

/// Tag distinguishing independent B-tree files sharing one log.
pub type FileId = u8;

/// Page number within one store file.
pub type PageNo = u32;

/// Sentinel for "no page" in sibling links.
pub const NO_PAGE: PageNo = PageNo::MAX;

/// Record kind tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// A transaction began.
    TxnStart = 0,
    /// A transaction committed. Recovery redoes its records.
    TxnCommit = 1,
    /// A transaction aborted.
    TxnAbort = 2,
    /// All dirty pages were durable at this point; replay may start here.
    Checkpoint = 3,
    /// A key/pointer pair inserted into a page at a slot.
    KeyInsert = 4,
    /// A key/pointer pair removed from a page, payload captured for undo.
    KeyRemove = 5,
    /// A value pointer overwritten in place, old pointer captured.
    KeyUpdate = 6,
    /// A fresh sibling page populated with entries moved out of a full page.
    PageSplit = 7,
    /// A full logical page image, written when a page is restructured.
    PageUpdate = 8,
}

impl RecordKind {
    /// Decodes a kind tag. Returns None for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordKind::TxnStart),
            1 => Some(RecordKind::TxnCommit),
            2 => Some(RecordKind::TxnAbort),
            3 => Some(RecordKind::Checkpoint),
            4 => Some(RecordKind::KeyInsert),
            5 => Some(RecordKind::KeyRemove),
            6 => Some(RecordKind::KeyUpdate),
            7 => Some(RecordKind::PageSplit),
            8 => Some(RecordKind::PageUpdate),
            _ => None,
        }
    }

    /// Encodes the kind tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for transaction boundary markers.
    pub fn is_txn_marker(self) -> bool {
        matches!(
            self,
            RecordKind::TxnStart | RecordKind::TxnCommit | RecordKind::TxnAbort
        )
    }
}

/// Payload of a key insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInsertPayload {
    /// Store the page belongs to.
    pub file_id: FileId,
    /// Page that received the entry.
    pub page_no: PageNo,
    /// Slot index the entry was inserted at.
    pub idx: u16,
    /// Inserted key bytes.
    pub key: Vec<u8>,
    /// Inserted value pointer. For branch pages this is a child page number.
    pub ptr: u64,
}

/// Payload of a key removal. Captures enough to reinsert on undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRemovePayload {
    /// Store the page belongs to.
    pub file_id: FileId,
    /// Page the entry was removed from.
    pub page_no: PageNo,
    /// Slot index the entry occupied.
    pub idx: u16,
    /// Removed key bytes.
    pub key: Vec<u8>,
    /// Removed value pointer.
    pub ptr: u64,
}

/// Payload of an in-place value-pointer overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUpdatePayload {
    /// Store the page belongs to.
    pub file_id: FileId,
    /// Page holding the entry.
    pub page_no: PageNo,
    /// Slot index of the entry.
    pub idx: u16,
    /// Key whose pointer was overwritten.
    pub key: Vec<u8>,
    /// Pointer before the overwrite, restored on undo.
    pub old_ptr: u64,
    /// Pointer after the overwrite.
    pub new_ptr: u64,
}

/// Payload of a page split: the complete content of the new sibling.
///
/// Redo-only. Key-level records carry the logical undo; structure is
/// never reversed, mirroring how removals do not rebalance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSplitPayload {
    /// Store the pages belong to.
    pub file_id: FileId,
    /// The page that overflowed.
    pub page_no: PageNo,
    /// The freshly allocated sibling.
    pub new_page_no: PageNo,
    /// Page kind tag of the sibling (leaf or branch).
    pub status: u8,
    /// Sibling link the new page takes over (leaf chain).
    pub next_page: PageNo,
    /// Keys moved into the new page.
    pub keys: Vec<Vec<u8>>,
    /// Pointers moved into the new page. For a branch, one more than keys.
    pub ptrs: Vec<u64>,
}

/// Payload of a full logical page image. Redo-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdatePayload {
    /// Store the page belongs to.
    pub file_id: FileId,
    /// The rewritten page.
    pub page_no: PageNo,
    /// Page kind tag after the rewrite.
    pub status: u8,
    /// Sibling link after the rewrite.
    pub next_page: PageNo,
    /// Complete key array.
    pub keys: Vec<Vec<u8>>,
    /// Complete pointer array.
    pub ptrs: Vec<u64>,
}

/// Payload of a checkpoint marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPayload {
    /// Number of stores whose dirty pages were flushed.
    pub stores_flushed: u16,
}

/// The closed set of logged operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    /// Transaction began.
    TxnStart,
    /// Transaction committed.
    TxnCommit,
    /// Transaction aborted.
    TxnAbort,
    /// Checkpoint marker.
    Checkpoint(CheckpointPayload),
    /// Key insertion.
    KeyInsert(KeyInsertPayload),
    /// Key removal.
    KeyRemove(KeyRemovePayload),
    /// Value-pointer overwrite.
    KeyUpdate(KeyUpdatePayload),
    /// Page split.
    PageSplit(PageSplitPayload),
    /// Full page image.
    PageUpdate(PageUpdatePayload),
}

/// One log record: common header plus kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Owning transaction.
    pub txn_id: TxnId,
    /// The logged operation.
    pub op: LogOp,
}

// Header: length (4) + kind (1) + txn id (8). Trailer: checksum (4).
const HEADER_SIZE: usize = 4 + 1 + 8;
const TRAILER_SIZE: usize = 4;
const MIN_RECORD_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

impl LogRecord {
    /// A transaction-start marker.
    pub fn txn_start(txn_id: TxnId) -> Self {
        Self { txn_id, op: LogOp::TxnStart }
    }

    /// A commit marker.
    pub fn txn_commit(txn_id: TxnId) -> Self {
        Self { txn_id, op: LogOp::TxnCommit }
    }

    /// An abort marker.
    pub fn txn_abort(txn_id: TxnId) -> Self {
        Self { txn_id, op: LogOp::TxnAbort }
    }

    /// A checkpoint marker. Checkpoints are not owned by any
    /// transaction; they carry transaction id 0.
    pub fn checkpoint(stores_flushed: u16) -> Self {
        Self {
            txn_id: 0,
            op: LogOp::Checkpoint(CheckpointPayload { stores_flushed }),
        }
    }

    /// The kind tag of this record.
    pub fn kind(&self) -> RecordKind {
        match &self.op {
            LogOp::TxnStart => RecordKind::TxnStart,
            LogOp::TxnCommit => RecordKind::TxnCommit,
            LogOp::TxnAbort => RecordKind::TxnAbort,
            LogOp::Checkpoint(_) => RecordKind::Checkpoint,
            LogOp::KeyInsert(_) => RecordKind::KeyInsert,
            LogOp::KeyRemove(_) => RecordKind::KeyRemove,
            LogOp::KeyUpdate(_) => RecordKind::KeyUpdate,
            LogOp::PageSplit(_) => RecordKind::PageSplit,
            LogOp::PageUpdate(_) => RecordKind::PageUpdate,
        }
    }

    /// The store this record mutates, if it mutates one.
    pub fn file_id(&self) -> Option<FileId> {
        match &self.op {
            LogOp::KeyInsert(p) => Some(p.file_id),
            LogOp::KeyRemove(p) => Some(p.file_id),
            LogOp::KeyUpdate(p) => Some(p.file_id),
            LogOp::PageSplit(p) => Some(p.file_id),
            LogOp::PageUpdate(p) => Some(p.file_id),
            _ => None,
        }
    }

    /// Total byte length `serialize` will produce for this record.
    pub fn declared_size(&self) -> usize {
        HEADER_SIZE + self.payload_size() + TRAILER_SIZE
    }

    fn payload_size(&self) -> usize {
        match &self.op {
            LogOp::TxnStart | LogOp::TxnCommit | LogOp::TxnAbort => 0,
            LogOp::Checkpoint(_) => 2,
            // file_id + page_no + idx + key len prefix + key + ptr
            LogOp::KeyInsert(p) => 1 + 4 + 2 + 2 + p.key.len() + 8,
            LogOp::KeyRemove(p) => 1 + 4 + 2 + 2 + p.key.len() + 8,
            // as above, with old and new pointers
            LogOp::KeyUpdate(p) => 1 + 4 + 2 + 2 + p.key.len() + 8 + 8,
            LogOp::PageSplit(p) => 1 + 4 + 4 + 1 + 4 + keys_size(&p.keys) + ptrs_size(&p.ptrs),
            LogOp::PageUpdate(p) => 1 + 4 + 1 + 4 + keys_size(&p.keys) + ptrs_size(&p.ptrs),
        }
    }

    /// Serializes the record, framed and checksummed.
    pub fn serialize(&self) -> Vec<u8> {
        let total = self.declared_size();
        let mut buf = Vec::with_capacity(total);

        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.push(self.kind().as_u8());
        buf.extend_from_slice(&self.txn_id.to_le_bytes());

        match &self.op {
            LogOp::TxnStart | LogOp::TxnCommit | LogOp::TxnAbort => {}
            LogOp::Checkpoint(p) => {
                buf.extend_from_slice(&p.stores_flushed.to_le_bytes());
            }
            LogOp::KeyInsert(p) => {
                buf.push(p.file_id);
                buf.extend_from_slice(&p.page_no.to_le_bytes());
                buf.extend_from_slice(&p.idx.to_le_bytes());
                put_key(&mut buf, &p.key);
                buf.extend_from_slice(&p.ptr.to_le_bytes());
            }
            LogOp::KeyRemove(p) => {
                buf.push(p.file_id);
                buf.extend_from_slice(&p.page_no.to_le_bytes());
                buf.extend_from_slice(&p.idx.to_le_bytes());
                put_key(&mut buf, &p.key);
                buf.extend_from_slice(&p.ptr.to_le_bytes());
            }
            LogOp::KeyUpdate(p) => {
                buf.push(p.file_id);
                buf.extend_from_slice(&p.page_no.to_le_bytes());
                buf.extend_from_slice(&p.idx.to_le_bytes());
                put_key(&mut buf, &p.key);
                buf.extend_from_slice(&p.old_ptr.to_le_bytes());
                buf.extend_from_slice(&p.new_ptr.to_le_bytes());
            }
            LogOp::PageSplit(p) => {
                buf.push(p.file_id);
                buf.extend_from_slice(&p.page_no.to_le_bytes());
                buf.extend_from_slice(&p.new_page_no.to_le_bytes());
                buf.push(p.status);
                buf.extend_from_slice(&p.next_page.to_le_bytes());
                put_keys(&mut buf, &p.keys);
                put_ptrs(&mut buf, &p.ptrs);
            }
            LogOp::PageUpdate(p) => {
                buf.push(p.file_id);
                buf.extend_from_slice(&p.page_no.to_le_bytes());
                buf.push(p.status);
                buf.extend_from_slice(&p.next_page.to_le_bytes());
                put_keys(&mut buf, &p.keys);
                put_ptrs(&mut buf, &p.ptrs);
            }
        }

        let checksum = compute_checksum(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());

        debug_assert_eq!(buf.len(), total);
        buf
    }

    /// Deserializes one record from the head of `data`, verifying the
    /// checksum and that the payload accounts for every promised byte.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> WalResult<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(WalError::corruption("record shorter than minimum frame"));
        }

        let total = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if total < MIN_RECORD_SIZE {
            return Err(WalError::corruption(format!(
                "declared record length {} below minimum frame",
                total
            )));
        }
        if data.len() < total {
            return Err(WalError::corruption(format!(
                "record truncated: declared {} bytes, {} available",
                total,
                data.len()
            )));
        }

        let checksum_offset = total - TRAILER_SIZE;
        let stored = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed = compute_checksum(&data[..checksum_offset]);
        if computed != stored {
            return Err(WalError::corruption(format!(
                "checksum mismatch: computed {:08x}, stored {:08x}",
                computed, stored
            )));
        }

        let kind = RecordKind::from_u8(data[4]).ok_or_else(|| {
            WalError::corruption(format!("unknown record kind tag {}", data[4]))
        })?;
        let txn_id = u64::from_le_bytes([
            data[5], data[6], data[7], data[8], data[9], data[10], data[11], data[12],
        ]);

        let mut dec = Dec::new(&data[HEADER_SIZE..checksum_offset]);
        let op = match kind {
            RecordKind::TxnStart => LogOp::TxnStart,
            RecordKind::TxnCommit => LogOp::TxnCommit,
            RecordKind::TxnAbort => LogOp::TxnAbort,
            RecordKind::Checkpoint => LogOp::Checkpoint(CheckpointPayload {
                stores_flushed: dec.u16()?,
            }),
            RecordKind::KeyInsert => LogOp::KeyInsert(KeyInsertPayload {
                file_id: dec.u8()?,
                page_no: dec.u32()?,
                idx: dec.u16()?,
                key: dec.key()?,
                ptr: dec.u64()?,
            }),
            RecordKind::KeyRemove => LogOp::KeyRemove(KeyRemovePayload {
                file_id: dec.u8()?,
                page_no: dec.u32()?,
                idx: dec.u16()?,
                key: dec.key()?,
                ptr: dec.u64()?,
            }),
            RecordKind::KeyUpdate => LogOp::KeyUpdate(KeyUpdatePayload {
                file_id: dec.u8()?,
                page_no: dec.u32()?,
                idx: dec.u16()?,
                key: dec.key()?,
                old_ptr: dec.u64()?,
                new_ptr: dec.u64()?,
            }),
            RecordKind::PageSplit => LogOp::PageSplit(PageSplitPayload {
                file_id: dec.u8()?,
                page_no: dec.u32()?,
                new_page_no: dec.u32()?,
                status: dec.u8()?,
                next_page: dec.u32()?,
                keys: dec.keys()?,
                ptrs: dec.ptrs()?,
            }),
            RecordKind::PageUpdate => LogOp::PageUpdate(PageUpdatePayload {
                file_id: dec.u8()?,
                page_no: dec.u32()?,
                status: dec.u8()?,
                next_page: dec.u32()?,
                keys: dec.keys()?,
                ptrs: dec.ptrs()?,
            }),
        };

        if !dec.exhausted() {
            return Err(WalError::corruption(format!(
                "payload size mismatch for {:?}: {} bytes unaccounted",
                kind,
                dec.remaining()
            )));
        }

        let record = LogRecord { txn_id, op };
        debug_assert_eq!(record.declared_size(), total);
        Ok((record, total))
    }

    /// Re-applies the forward mutation to `store`, gated by the page
    /// LSN: a page already carrying this record's effect is skipped.
    ///
    /// Used when replaying a committed transaction after a crash.
    pub fn redo(&self, lsn: Lsn, store: &BTreeStore) -> StoreResult<()> {
        match &self.op {
            LogOp::KeyInsert(p) => store.redo_key_insert(lsn, p),
            LogOp::KeyRemove(p) => store.redo_key_remove(lsn, p),
            LogOp::KeyUpdate(p) => store.redo_key_update(lsn, p),
            LogOp::PageSplit(p) => store.redo_page_split(lsn, p),
            LogOp::PageUpdate(p) => store.redo_page_update(lsn, p),
            // markers and checkpoints have no page effect
            _ => Ok(()),
        }
    }

    /// Reverses the mutation logically: a removal reinserts the
    /// captured key and pointer, an insertion removes the inserted key,
    /// an update restores the old pointer. Structural records are not
    /// reversed.
    ///
    /// Used for live abort and for rolling back uncommitted
    /// transactions during recovery.
    pub fn undo(&self, store: &BTreeStore) -> StoreResult<()> {
        match &self.op {
            LogOp::KeyInsert(p) => store.undo_key_insert(p),
            LogOp::KeyRemove(p) => store.undo_key_remove(p),
            LogOp::KeyUpdate(p) => store.undo_key_update(p),
            _ => Ok(()),
        }
    }
}

fn keys_size(keys: &[Vec<u8>]) -> usize {
    2 + keys.iter().map(|k| 2 + k.len()).sum::<usize>()
}

fn ptrs_size(ptrs: &[u64]) -> usize {
    2 + ptrs.len() * 8
}

fn put_key(buf: &mut Vec<u8>, key: &[u8]) {
    buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
    buf.extend_from_slice(key);
}

fn put_keys(buf: &mut Vec<u8>, keys: &[Vec<u8>]) {
    buf.extend_from_slice(&(keys.len() as u16).to_le_bytes());
    for key in keys {
        put_key(buf, key);
    }
}

fn put_ptrs(buf: &mut Vec<u8>, ptrs: &[u64]) {
    buf.extend_from_slice(&(ptrs.len() as u16).to_le_bytes());
    for ptr in ptrs {
        buf.extend_from_slice(&ptr.to_le_bytes());
    }
}

/// Bounds-checked little-endian payload decoder.
struct Dec<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Dec<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> WalResult<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(WalError::corruption(format!(
                "payload underrun: need {} bytes at offset {}, {} remain",
                n,
                self.pos,
                self.data.len() - self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> WalResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> WalResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> WalResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> WalResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn key(&mut self) -> WalResult<Vec<u8>> {
        let len = self.u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn keys(&mut self) -> WalResult<Vec<Vec<u8>>> {
        let count = self.u16()? as usize;
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            keys.push(self.key()?);
        }
        Ok(keys)
    }

    fn ptrs(&mut self) -> WalResult<Vec<u64>> {
        let count = self.u16()? as usize;
        let mut ptrs = Vec::with_capacity(count);
        for _ in 0..count {
            ptrs.push(self.u64()?);
        }
        Ok(ptrs)
    }

    fn exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::super::errors::WalErrorCode;
    use super::*;

    fn sample_records() -> Vec<LogRecord> {
        vec![
            LogRecord::txn_start(7),
            LogRecord::txn_commit(7),
            LogRecord::txn_abort(8),
            LogRecord::checkpoint(2),
            LogRecord {
                txn_id: 9,
                op: LogOp::KeyInsert(KeyInsertPayload {
                    file_id: 1,
                    page_no: 3,
                    idx: 0,
                    key: b"/db/docs/a.xml".to_vec(),
                    ptr: 4096,
                }),
            },
            LogRecord {
                txn_id: 9,
                op: LogOp::KeyRemove(KeyRemovePayload {
                    file_id: 1,
                    page_no: 3,
                    idx: 2,
                    key: b"/db/docs/b.xml".to_vec(),
                    ptr: 8192,
                }),
            },
            LogRecord {
                txn_id: 10,
                op: LogOp::KeyUpdate(KeyUpdatePayload {
                    file_id: 2,
                    page_no: 11,
                    idx: 5,
                    key: b"node:1.2.3".to_vec(),
                    old_ptr: 100,
                    new_ptr: 200,
                }),
            },
            LogRecord {
                txn_id: 11,
                op: LogOp::PageSplit(PageSplitPayload {
                    file_id: 1,
                    page_no: 0,
                    new_page_no: 4,
                    status: 1,
                    next_page: NO_PAGE,
                    keys: vec![b"m".to_vec(), b"z".to_vec()],
                    ptrs: vec![77, 78],
                }),
            },
            LogRecord {
                txn_id: 11,
                op: LogOp::PageUpdate(PageUpdatePayload {
                    file_id: 1,
                    page_no: 0,
                    status: 0,
                    next_page: NO_PAGE,
                    keys: vec![b"m".to_vec()],
                    ptrs: vec![3, 4],
                }),
            },
        ]
    }

    #[test]
    fn test_roundtrip_every_kind() {
        for record in sample_records() {
            let bytes = record.serialize();
            let (decoded, consumed) = LogRecord::deserialize(&bytes).unwrap();
            assert_eq!(record, decoded);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn test_declared_size_matches_serialized_length() {
        for record in sample_records() {
            assert_eq!(record.declared_size(), record.serialize().len());
        }
    }

    #[test]
    fn test_kind_tag_roundtrip() {
        for tag in 0..=8u8 {
            let kind = RecordKind::from_u8(tag).unwrap();
            assert_eq!(kind.as_u8(), tag);
        }
        assert!(RecordKind::from_u8(9).is_none());
        assert!(RecordKind::from_u8(255).is_none());
    }

    #[test]
    fn test_txn_id_preserved() {
        let record = LogRecord::txn_commit(u64::MAX - 1);
        let (decoded, _) = LogRecord::deserialize(&record.serialize()).unwrap();
        assert_eq!(decoded.txn_id, u64::MAX - 1);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let record = sample_records().remove(4);
        let mut bytes = record.serialize();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;

        let err = LogRecord::deserialize(&bytes).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::Corruption);
    }

    #[test]
    fn test_truncated_record_rejected() {
        let record = sample_records().remove(5);
        let bytes = record.serialize();
        let err = LogRecord::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.code(), WalErrorCode::Corruption);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let record = LogRecord::txn_start(1);
        let mut bytes = record.serialize();
        bytes[4] = 0x7F;
        // re-stamp the checksum so only the kind tag is at fault
        let trailer = bytes.len() - 4;
        let sum = compute_checksum(&bytes[..trailer]);
        bytes[trailer..].copy_from_slice(&sum.to_le_bytes());

        let err = LogRecord::deserialize(&bytes).unwrap_err();
        assert!(err.message().contains("unknown record kind"));
    }

    #[test]
    fn test_deterministic_serialization() {
        for record in sample_records() {
            assert_eq!(record.serialize(), record.serialize());
        }
    }

    #[test]
    fn test_file_id_only_on_page_records() {
        assert_eq!(LogRecord::txn_start(1).file_id(), None);
        assert_eq!(LogRecord::checkpoint(1).file_id(), None);
        let insert = sample_records().remove(4);
        assert_eq!(insert.file_id(), Some(1));
    }
}
