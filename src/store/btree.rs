//! The B-tree page store.
//!
//! Persistent keyed storage over fixed-size pages, byte-lexicographic
//! key order. Every structural mutation follows the same discipline:
//! construct the log record, append it (durable on return), only then
//! touch the page. Dirty pages reach disk later, through `sync`, so a
//! data page is never ahead of the log.
//!
//! Leaf entries carry the logical undo in their key-level records;
//! structure (splits, full page images) is redo-only and never
//! reversed, which mirrors how removal does not rebalance.
//!
//! Concurrent mutation of the same page by two transactions is
//! prevented by the session discipline, not here: a transaction has
//! one logical owner at a time.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use crate::observability::{Logger, Severity};
use crate::txn::{Txn, TxnListener};
use crate::wal::{
    FileId, KeyInsertPayload, KeyRemovePayload, KeyUpdatePayload, LogOp, LogRecord, Lsn, PageNo,
    PageSplitPayload, PageUpdatePayload, TxnId, Wal, NO_PAGE,
};

use super::errors::{StoreError, StoreResult};
use super::file::PagedFile;
use super::page::{Page, PageKind, PAGE_HEADER_SIZE};

/// The root lives at page 0 and never moves; growing the tree rewrites
/// the root in place.
const ROOT_PAGE: PageNo = 0;

/// Per-entry overhead: length prefix plus value pointer.
const ENTRY_OVERHEAD: usize = 2 + 8;

fn requires_redo(page: &Page, lsn: Lsn) -> bool {
    page.lsn.map_or(true, |applied| lsn > applied)
}

struct StoreInner {
    file: PagedFile,
    cache: HashMap<PageNo, Page>,
    dirty: BTreeSet<PageNo>,
    /// Key-level records per open transaction, replayed in reverse on
    /// live abort.
    undo_log: HashMap<TxnId, Vec<LogRecord>>,
}

struct StoreCore {
    file_id: FileId,
    page_size: usize,
    max_key_len: usize,
    inner: Mutex<StoreInner>,
}

/// Rolls a transaction's page mutations back when it aborts, drops the
/// undo records when it commits. Registered on first mutation.
struct StoreTxnListener {
    core: Weak<StoreCore>,
}

impl TxnListener for StoreTxnListener {
    fn on_commit(&self, txn_id: TxnId) {
        if let Some(core) = self.core.upgrade() {
            core.clear_undo(txn_id);
        }
    }

    fn on_abort(&self, txn_id: TxnId) {
        if let Some(core) = self.core.upgrade() {
            core.rollback(txn_id);
        }
    }
}

/// One persistent B-tree file. Several stores with distinct file ids
/// share one write-ahead log.
pub struct BTreeStore {
    wal: Arc<Wal>,
    core: Arc<StoreCore>,
}

impl BTreeStore {
    /// Opens or creates the store file, installing an empty root leaf
    /// in a fresh file.
    pub fn open(
        file_id: FileId,
        path: &Path,
        page_size: usize,
        wal: Arc<Wal>,
    ) -> StoreResult<Self> {
        assert!(page_size >= 128, "page size below minimum");
        let file = PagedFile::open(path, page_size)
            .map_err(|e| StoreError::io(file_id, "failed to open store file", e))?;

        let mut inner = StoreInner {
            file,
            cache: HashMap::new(),
            dirty: BTreeSet::new(),
            undo_log: HashMap::new(),
        };

        if inner.file.page_count() == 0 {
            let root = inner.file.allocate();
            debug_assert_eq!(root, ROOT_PAGE);
            inner.cache.insert(ROOT_PAGE, Page::new_leaf(ROOT_PAGE));
            inner.dirty.insert(ROOT_PAGE);
        }

        // a page must fit several entries or splitting cannot converge
        let max_key_len = (page_size - PAGE_HEADER_SIZE) / 4 - ENTRY_OVERHEAD;

        Ok(Self {
            wal,
            core: Arc::new(StoreCore {
                file_id,
                page_size,
                max_key_len,
                inner: Mutex::new(inner),
            }),
        })
    }

    /// Tag of this store within the shared log.
    pub fn file_id(&self) -> FileId {
        self.core.file_id
    }

    /// Configured page size.
    pub fn page_size(&self) -> usize {
        self.core.page_size
    }

    /// Looks a key up. Read-only; requires no transaction.
    pub fn find(&self, key: &[u8]) -> StoreResult<Option<u64>> {
        let mut inner = self.core.inner.lock().unwrap();
        let (_, leaf_no) = self.core.descend(&mut inner, key)?;
        let leaf = self.core.load_page(&mut inner, leaf_no, false)?;
        Ok(match leaf.search(key) {
            Ok(i) => Some(leaf.ptrs[i]),
            Err(_) => None,
        })
    }

    /// Inserts or overwrites a key, scoped to an active transaction.
    ///
    /// A fresh key journals a key-insertion record; an existing key
    /// journals a pointer overwrite capturing the old pointer.
    pub fn insert(&self, txn: &Txn, key: &[u8], ptr: u64) -> StoreResult<()> {
        txn.ensure_active()?;
        if key.len() > self.core.max_key_len {
            return Err(StoreError::KeyTooLarge {
                len: key.len(),
                max: self.core.max_key_len,
                page_size: self.core.page_size,
            });
        }

        let mut inner = self.core.inner.lock().unwrap();
        self.track_txn(&mut inner, txn);
        self.core
            .insert_entry(&mut inner, Some((self.wal.as_ref(), txn)), key, ptr)
    }

    /// Removes a key, returning the removed value pointer.
    ///
    /// The record captures key bytes, pointer and slot so undo can
    /// reinsert them. Removing an absent key journals nothing.
    pub fn remove(&self, txn: &Txn, key: &[u8]) -> StoreResult<Option<u64>> {
        txn.ensure_active()?;

        let mut inner = self.core.inner.lock().unwrap();
        self.track_txn(&mut inner, txn);
        self.core
            .remove_entry(&mut inner, Some((self.wal.as_ref(), txn)), key)
    }

    /// Flushes every dirty page to disk and fsyncs the store file.
    ///
    /// The log records covering these pages are already durable, so
    /// this never writes data ahead of the log.
    pub fn sync(&self) -> StoreResult<()> {
        let mut inner = self.core.inner.lock().unwrap();
        let dirty: Vec<PageNo> = inner.dirty.iter().copied().collect();
        for page_no in dirty {
            let buf = {
                let page = self.core.load_page(&mut inner, page_no, false)?;
                page.serialize(self.core.page_size)
            };
            inner
                .file
                .write_page(page_no, &buf)
                .map_err(|e| StoreError::io(self.core.file_id, format!("flush of page {}", page_no), e))?;
        }
        inner
            .file
            .sync()
            .map_err(|e| StoreError::io(self.core.file_id, "store fsync", e))?;
        inner.dirty.clear();
        Ok(())
    }

    /// Number of entries across the leaf chain.
    pub fn entry_count(&self) -> StoreResult<usize> {
        let mut inner = self.core.inner.lock().unwrap();
        let mut no = ROOT_PAGE;
        loop {
            let page = self.core.load_page(&mut inner, no, false)?;
            if page.is_leaf() {
                break;
            }
            no = page.ptrs[0] as PageNo;
        }
        let mut count = 0;
        loop {
            let page = self.core.load_page(&mut inner, no, false)?;
            count += page.entry_count();
            if page.next_page == NO_PAGE {
                break;
            }
            no = page.next_page;
        }
        Ok(count)
    }

    /// Registers the rollback listener on the transaction's first
    /// mutation of this store.
    fn track_txn(&self, inner: &mut StoreInner, txn: &Txn) {
        if let Entry::Vacant(v) = inner.undo_log.entry(txn.id()) {
            v.insert(Vec::new());
            txn.register_listener(Box::new(StoreTxnListener {
                core: Arc::downgrade(&self.core),
            }));
        }
    }

    fn check_file(&self, file_id: FileId) -> StoreResult<()> {
        if file_id != self.core.file_id {
            return Err(StoreError::WrongStore {
                expected: file_id,
                actual: self.core.file_id,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Redo appliers, driven by log records during recovery. Each is
    // gated by the page LSN: a page already carrying the record's
    // effect is left alone.
    // ------------------------------------------------------------------

    pub(crate) fn redo_key_insert(&self, lsn: Lsn, p: &KeyInsertPayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let mut inner = self.core.inner.lock().unwrap();
        let changed = {
            let page = self.core.load_page(&mut inner, p.page_no, true)?;
            if requires_redo(page, lsn) {
                ensure_leaf_slot(p.file_id, page, p.page_no, p.idx, true)?;
                page.leaf_insert_at(p.idx as usize, p.key.clone(), p.ptr);
                page.lsn = Some(lsn);
                true
            } else {
                false
            }
        };
        if changed {
            inner.dirty.insert(p.page_no);
        }
        Ok(())
    }

    pub(crate) fn redo_key_remove(&self, lsn: Lsn, p: &KeyRemovePayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let mut inner = self.core.inner.lock().unwrap();
        let changed = {
            let page = self.core.load_page(&mut inner, p.page_no, true)?;
            if requires_redo(page, lsn) {
                ensure_leaf_slot(p.file_id, page, p.page_no, p.idx, false)?;
                page.leaf_remove_at(p.idx as usize);
                page.lsn = Some(lsn);
                true
            } else {
                false
            }
        };
        if changed {
            inner.dirty.insert(p.page_no);
        }
        Ok(())
    }

    pub(crate) fn redo_key_update(&self, lsn: Lsn, p: &KeyUpdatePayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let mut inner = self.core.inner.lock().unwrap();
        let changed = {
            let page = self.core.load_page(&mut inner, p.page_no, true)?;
            if requires_redo(page, lsn) {
                ensure_leaf_slot(p.file_id, page, p.page_no, p.idx, false)?;
                page.ptrs[p.idx as usize] = p.new_ptr;
                page.lsn = Some(lsn);
                true
            } else {
                false
            }
        };
        if changed {
            inner.dirty.insert(p.page_no);
        }
        Ok(())
    }

    pub(crate) fn redo_page_split(&self, lsn: Lsn, p: &PageSplitPayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let kind = PageKind::from_u8(p.status).ok_or(StoreError::CorruptPage {
            file_id: p.file_id,
            page_no: p.new_page_no,
            message: "split record with unknown page kind".to_string(),
        })?;
        let mut inner = self.core.inner.lock().unwrap();
        let changed = {
            let page = self.core.load_page(&mut inner, p.new_page_no, true)?;
            if requires_redo(page, lsn) {
                page.kind = kind;
                page.next_page = p.next_page;
                page.keys = p.keys.clone();
                page.ptrs = p.ptrs.clone();
                page.lsn = Some(lsn);
                true
            } else {
                false
            }
        };
        if changed {
            inner.dirty.insert(p.new_page_no);
        }
        Ok(())
    }

    pub(crate) fn redo_page_update(&self, lsn: Lsn, p: &PageUpdatePayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let kind = PageKind::from_u8(p.status).ok_or(StoreError::CorruptPage {
            file_id: p.file_id,
            page_no: p.page_no,
            message: "page image record with unknown page kind".to_string(),
        })?;
        let mut inner = self.core.inner.lock().unwrap();
        let changed = {
            let page = self.core.load_page(&mut inner, p.page_no, true)?;
            if requires_redo(page, lsn) {
                page.kind = kind;
                page.next_page = p.next_page;
                page.keys = p.keys.clone();
                page.ptrs = p.ptrs.clone();
                page.lsn = Some(lsn);
                true
            } else {
                false
            }
        };
        if changed {
            inner.dirty.insert(p.page_no);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Undo appliers. Logical: they navigate by key, not by slot, so
    // they hold regardless of splits that happened after the record.
    // Undo mutations are not themselves journaled; recovery always
    // ends in a checkpoint that makes their outcome durable.
    // ------------------------------------------------------------------

    pub(crate) fn undo_key_insert(&self, p: &KeyInsertPayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let mut inner = self.core.inner.lock().unwrap();
        self.core.remove_entry(&mut inner, None, &p.key)?;
        Ok(())
    }

    pub(crate) fn undo_key_remove(&self, p: &KeyRemovePayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let mut inner = self.core.inner.lock().unwrap();
        self.core.insert_entry(&mut inner, None, &p.key, p.ptr)
    }

    pub(crate) fn undo_key_update(&self, p: &KeyUpdatePayload) -> StoreResult<()> {
        self.check_file(p.file_id)?;
        let mut inner = self.core.inner.lock().unwrap();
        self.core.insert_entry(&mut inner, None, &p.key, p.old_ptr)
    }
}

fn ensure_leaf_slot(
    file_id: FileId,
    page: &Page,
    page_no: PageNo,
    idx: u16,
    inserting: bool,
) -> StoreResult<()> {
    if !page.is_leaf() {
        return Err(StoreError::CorruptPage {
            file_id,
            page_no,
            message: "key record addressed to a branch page".to_string(),
        });
    }
    let len = page.entry_count();
    let limit = if inserting { len } else { len.saturating_sub(1) };
    if (idx as usize) > limit || (!inserting && len == 0) {
        return Err(StoreError::SlotOutOfBounds { page_no, idx, len });
    }
    Ok(())
}

impl StoreCore {
    fn load_page<'a>(
        &self,
        inner: &'a mut StoreInner,
        page_no: PageNo,
        create: bool,
    ) -> StoreResult<&'a mut Page> {
        let StoreInner { file, cache, .. } = inner;
        match cache.entry(page_no) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                if page_no < file.page_count() {
                    let buf = file.read_page(page_no).map_err(|e| {
                        StoreError::io(self.file_id, format!("read of page {}", page_no), e)
                    })?;
                    Ok(v.insert(Page::deserialize(self.file_id, page_no, &buf)?))
                } else if create {
                    while file.page_count() <= page_no {
                        file.allocate();
                    }
                    Ok(v.insert(Page::new_leaf(page_no)))
                } else {
                    Err(StoreError::PageNotFound {
                        file_id: self.file_id,
                        page_no,
                    })
                }
            }
        }
    }

    /// Walks from the root to the leaf responsible for `key`,
    /// returning the branch path above it.
    fn descend(&self, inner: &mut StoreInner, key: &[u8]) -> StoreResult<(Vec<PageNo>, PageNo)> {
        let mut path = Vec::new();
        let mut no = ROOT_PAGE;
        loop {
            let page = self.load_page(inner, no, false)?;
            if page.is_leaf() {
                return Ok((path, no));
            }
            let child = page.route(key) as PageNo;
            path.push(no);
            no = child;
        }
    }

    /// Appends one record when a journaling context is present.
    /// Key-level records additionally land in the transaction's undo
    /// list for live rollback.
    fn append_record(
        &self,
        inner: &mut StoreInner,
        log: Option<(&Wal, &Txn)>,
        op: LogOp,
        undoable: bool,
    ) -> StoreResult<Option<Lsn>> {
        if let Some((wal, txn)) = log {
            let record = LogRecord {
                txn_id: txn.id(),
                op,
            };
            let lsn = wal.append(&record)?;
            txn.record_journal_write();
            if undoable {
                inner.undo_log.entry(txn.id()).or_default().push(record);
            }
            Ok(Some(lsn))
        } else {
            Ok(None)
        }
    }

    fn insert_entry(
        &self,
        inner: &mut StoreInner,
        log: Option<(&Wal, &Txn)>,
        key: &[u8],
        ptr: u64,
    ) -> StoreResult<()> {
        let (path, leaf_no) = self.descend(inner, key)?;
        let (slot, existing) = {
            let leaf = self.load_page(inner, leaf_no, false)?;
            match leaf.search(key) {
                Ok(i) => (i, Some(leaf.ptrs[i])),
                Err(i) => (i, None),
            }
        };

        match existing {
            Some(old_ptr) => {
                let lsn = self.append_record(
                    inner,
                    log,
                    LogOp::KeyUpdate(KeyUpdatePayload {
                        file_id: self.file_id,
                        page_no: leaf_no,
                        idx: slot as u16,
                        key: key.to_vec(),
                        old_ptr,
                        new_ptr: ptr,
                    }),
                    true,
                )?;
                let leaf = self.load_page(inner, leaf_no, false)?;
                leaf.ptrs[slot] = ptr;
                if lsn.is_some() {
                    leaf.lsn = lsn;
                }
                inner.dirty.insert(leaf_no);
                Ok(())
            }
            None => {
                let lsn = self.append_record(
                    inner,
                    log,
                    LogOp::KeyInsert(KeyInsertPayload {
                        file_id: self.file_id,
                        page_no: leaf_no,
                        idx: slot as u16,
                        key: key.to_vec(),
                        ptr,
                    }),
                    true,
                )?;
                {
                    let leaf = self.load_page(inner, leaf_no, false)?;
                    leaf.leaf_insert_at(slot, key.to_vec(), ptr);
                    if lsn.is_some() {
                        leaf.lsn = lsn;
                    }
                }
                inner.dirty.insert(leaf_no);
                self.split_if_needed(inner, log, path, leaf_no)
            }
        }
    }

    fn remove_entry(
        &self,
        inner: &mut StoreInner,
        log: Option<(&Wal, &Txn)>,
        key: &[u8],
    ) -> StoreResult<Option<u64>> {
        let (_, leaf_no) = self.descend(inner, key)?;
        let found = {
            let leaf = self.load_page(inner, leaf_no, false)?;
            match leaf.search(key) {
                Ok(i) => Some((i, leaf.keys[i].clone(), leaf.ptrs[i])),
                Err(_) => None,
            }
        };

        let (slot, removed_key, removed_ptr) = match found {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let lsn = self.append_record(
            inner,
            log,
            LogOp::KeyRemove(KeyRemovePayload {
                file_id: self.file_id,
                page_no: leaf_no,
                idx: slot as u16,
                key: removed_key,
                ptr: removed_ptr,
            }),
            true,
        )?;
        {
            let leaf = self.load_page(inner, leaf_no, false)?;
            leaf.leaf_remove_at(slot);
            if lsn.is_some() {
                leaf.lsn = lsn;
            }
        }
        inner.dirty.insert(leaf_no);
        Ok(Some(removed_ptr))
    }

    /// Splits overflowing pages from `target` upward along `path`.
    fn split_if_needed(
        &self,
        inner: &mut StoreInner,
        log: Option<(&Wal, &Txn)>,
        mut path: Vec<PageNo>,
        mut target: PageNo,
    ) -> StoreResult<()> {
        loop {
            let oversize = {
                let page = self.load_page(inner, target, false)?;
                page.encoded_size() > self.page_size
            };
            if !oversize {
                return Ok(());
            }
            if target == ROOT_PAGE {
                return self.split_root(inner, log);
            }

            let parent = path.pop().ok_or(StoreError::CorruptPage {
                file_id: self.file_id,
                page_no: target,
                message: "non-root page missing from descent path".to_string(),
            })?;

            let (separator, new_no) = self.split_page(inner, log, target)?;

            // splice the separator into the parent: full image record
            let (p_kind, p_next, p_keys, p_ptrs) = {
                let pp = self.load_page(inner, parent, false)?;
                let idx = match pp.search(&separator) {
                    Ok(i) | Err(i) => i,
                };
                let mut keys = pp.keys.clone();
                let mut ptrs = pp.ptrs.clone();
                keys.insert(idx, separator.clone());
                ptrs.insert(idx + 1, new_no as u64);
                (pp.kind, pp.next_page, keys, ptrs)
            };
            let lsn = self.append_record(
                inner,
                log,
                LogOp::PageUpdate(PageUpdatePayload {
                    file_id: self.file_id,
                    page_no: parent,
                    status: p_kind.as_u8(),
                    next_page: p_next,
                    keys: p_keys.clone(),
                    ptrs: p_ptrs.clone(),
                }),
                false,
            )?;
            {
                let pp = self.load_page(inner, parent, false)?;
                pp.keys = p_keys;
                pp.ptrs = p_ptrs;
                if lsn.is_some() {
                    pp.lsn = lsn;
                }
            }
            inner.dirty.insert(parent);

            target = parent;
        }
    }

    /// Splits one non-root page, returning the separator and the new
    /// sibling's page number.
    fn split_page(
        &self,
        inner: &mut StoreInner,
        log: Option<(&Wal, &Txn)>,
        page_no: PageNo,
    ) -> StoreResult<(Vec<u8>, PageNo)> {
        let (kind, old_next, keys, ptrs) = {
            let page = self.load_page(inner, page_no, false)?;
            (page.kind, page.next_page, page.keys.clone(), page.ptrs.clone())
        };
        let mid = keys.len() / 2;
        let new_no = inner.file.allocate();

        let (separator, right_keys, right_ptrs, right_next, left_keys, left_ptrs, left_next) =
            match kind {
                PageKind::Leaf => {
                    let right_keys = keys[mid..].to_vec();
                    let right_ptrs = ptrs[mid..].to_vec();
                    let separator = right_keys[0].clone();
                    (
                        separator,
                        right_keys,
                        right_ptrs,
                        old_next,
                        keys[..mid].to_vec(),
                        ptrs[..mid].to_vec(),
                        new_no,
                    )
                }
                PageKind::Branch => {
                    // the middle separator moves up, owned by neither side
                    let separator = keys[mid].clone();
                    (
                        separator,
                        keys[mid + 1..].to_vec(),
                        ptrs[mid + 1..].to_vec(),
                        NO_PAGE,
                        keys[..mid].to_vec(),
                        ptrs[..=mid].to_vec(),
                        NO_PAGE,
                    )
                }
            };

        let lsn_new = self.append_record(
            inner,
            log,
            LogOp::PageSplit(PageSplitPayload {
                file_id: self.file_id,
                page_no,
                new_page_no: new_no,
                status: kind.as_u8(),
                next_page: right_next,
                keys: right_keys.clone(),
                ptrs: right_ptrs.clone(),
            }),
            false,
        )?;
        inner.cache.insert(
            new_no,
            Page {
                page_no: new_no,
                kind,
                lsn: lsn_new,
                next_page: right_next,
                keys: right_keys,
                ptrs: right_ptrs,
            },
        );
        inner.dirty.insert(new_no);

        let lsn_left = self.append_record(
            inner,
            log,
            LogOp::PageUpdate(PageUpdatePayload {
                file_id: self.file_id,
                page_no,
                status: kind.as_u8(),
                next_page: if kind == PageKind::Leaf { left_next } else { old_next },
                keys: left_keys.clone(),
                ptrs: left_ptrs.clone(),
            }),
            false,
        )?;
        {
            let page = self.load_page(inner, page_no, false)?;
            page.keys = left_keys;
            page.ptrs = left_ptrs;
            page.next_page = if kind == PageKind::Leaf { left_next } else { old_next };
            if lsn_left.is_some() {
                page.lsn = lsn_left;
            }
        }
        inner.dirty.insert(page_no);

        Ok((separator, new_no))
    }

    /// Splits the root in place: its entries move into two fresh
    /// children and the root becomes a branch over them.
    fn split_root(&self, inner: &mut StoreInner, log: Option<(&Wal, &Txn)>) -> StoreResult<()> {
        let (kind, old_next, keys, ptrs) = {
            let root = self.load_page(inner, ROOT_PAGE, false)?;
            (root.kind, root.next_page, root.keys.clone(), root.ptrs.clone())
        };
        let mid = keys.len() / 2;
        let left_no = inner.file.allocate();
        let right_no = inner.file.allocate();

        let (separator, left_keys, left_ptrs, left_next, right_keys, right_ptrs, right_next) =
            match kind {
                PageKind::Leaf => {
                    let right_keys = keys[mid..].to_vec();
                    let separator = right_keys[0].clone();
                    (
                        separator,
                        keys[..mid].to_vec(),
                        ptrs[..mid].to_vec(),
                        right_no,
                        right_keys,
                        ptrs[mid..].to_vec(),
                        old_next,
                    )
                }
                PageKind::Branch => {
                    let separator = keys[mid].clone();
                    (
                        separator,
                        keys[..mid].to_vec(),
                        ptrs[..=mid].to_vec(),
                        NO_PAGE,
                        keys[mid + 1..].to_vec(),
                        ptrs[mid + 1..].to_vec(),
                        NO_PAGE,
                    )
                }
            };

        for (no, page_keys, page_ptrs, next) in [
            (right_no, &right_keys, &right_ptrs, right_next),
            (left_no, &left_keys, &left_ptrs, left_next),
        ] {
            let lsn = self.append_record(
                inner,
                log,
                LogOp::PageSplit(PageSplitPayload {
                    file_id: self.file_id,
                    page_no: ROOT_PAGE,
                    new_page_no: no,
                    status: kind.as_u8(),
                    next_page: next,
                    keys: page_keys.clone(),
                    ptrs: page_ptrs.clone(),
                }),
                false,
            )?;
            inner.cache.insert(
                no,
                Page {
                    page_no: no,
                    kind,
                    lsn,
                    next_page: next,
                    keys: page_keys.clone(),
                    ptrs: page_ptrs.clone(),
                },
            );
            inner.dirty.insert(no);
        }

        let root_keys = vec![separator];
        let root_ptrs = vec![left_no as u64, right_no as u64];
        let lsn = self.append_record(
            inner,
            log,
            LogOp::PageUpdate(PageUpdatePayload {
                file_id: self.file_id,
                page_no: ROOT_PAGE,
                status: PageKind::Branch.as_u8(),
                next_page: NO_PAGE,
                keys: root_keys.clone(),
                ptrs: root_ptrs.clone(),
            }),
            false,
        )?;
        {
            let root = self.load_page(inner, ROOT_PAGE, false)?;
            root.kind = PageKind::Branch;
            root.next_page = NO_PAGE;
            root.keys = root_keys;
            root.ptrs = root_ptrs;
            if lsn.is_some() {
                root.lsn = lsn;
            }
        }
        inner.dirty.insert(ROOT_PAGE);
        Ok(())
    }

    /// Drops a committed transaction's undo records.
    fn clear_undo(&self, txn_id: TxnId) {
        self.inner.lock().unwrap().undo_log.remove(&txn_id);
    }

    /// Reverses an aborting transaction's key-level mutations, newest
    /// first. Failures are reported and rollback continues; recovery
    /// re-establishes the invariant from the log if needed.
    fn rollback(&self, txn_id: TxnId) {
        let mut inner = self.inner.lock().unwrap();
        let records = match inner.undo_log.remove(&txn_id) {
            Some(records) => records,
            None => return,
        };

        for record in records.iter().rev() {
            let result = match &record.op {
                LogOp::KeyInsert(p) => self.remove_entry(&mut inner, None, &p.key).map(|_| ()),
                LogOp::KeyRemove(p) => self.insert_entry(&mut inner, None, &p.key, p.ptr),
                LogOp::KeyUpdate(p) => self.insert_entry(&mut inner, None, &p.key, p.old_ptr),
                _ => Ok(()),
            };
            if let Err(e) = result {
                Logger::log_stderr(
                    Severity::Error,
                    "txn_rollback_failed",
                    &[
                        ("txn_id", &txn_id.to_string()),
                        ("file_id", &self.file_id.to_string()),
                        ("error", &e.to_string()),
                    ],
                );
            }
        }
    }
}
