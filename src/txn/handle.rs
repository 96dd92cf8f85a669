//! Transaction handle and listener machinery.
//!
//! A handle moves `Active -> Committed | Aborted -> Closed` and never
//! backwards. Listeners fire exactly once, on the terminal transition,
//! in registration order; the guarantee is enforced by the state
//! machine itself (the winning transition drains the listener list
//! under the state lock), not by caller convention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::fmt;

use crate::observability::{Logger, Severity};
use crate::wal::{LogRecord, TxnId, Wal};

use super::errors::{TxnError, TxnResult};

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting operations.
    Active,
    /// Terminal: all effects durable.
    Committed,
    /// Terminal: all effects rolled back.
    Aborted,
    /// The handle is spent.
    Closed,
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnState::Active => write!(f, "Active"),
            TxnState::Committed => write!(f, "Committed"),
            TxnState::Aborted => write!(f, "Aborted"),
            TxnState::Closed => write!(f, "Closed"),
        }
    }
}

/// Outcome callbacks registered against a transaction.
///
/// Invoked synchronously, exactly once, on the terminal transition.
pub trait TxnListener: Send + Sync {
    /// The transaction committed.
    fn on_commit(&self, txn_id: TxnId);
    /// The transaction aborted.
    fn on_abort(&self, txn_id: TxnId);
}

/// Adapter turning a pair of closures into a listener.
pub struct FnListener<C, A> {
    commit: C,
    abort: A,
}

impl<C, A> FnListener<C, A>
where
    C: Fn(TxnId) + Send + Sync,
    A: Fn(TxnId) + Send + Sync,
{
    /// Wraps `on_commit` and `on_abort` callbacks.
    pub fn new(on_commit: C, on_abort: A) -> Self {
        Self {
            commit: on_commit,
            abort: on_abort,
        }
    }
}

impl<C, A> TxnListener for FnListener<C, A>
where
    C: Fn(TxnId) + Send + Sync,
    A: Fn(TxnId) + Send + Sync,
{
    fn on_commit(&self, txn_id: TxnId) {
        (self.commit)(txn_id)
    }

    fn on_abort(&self, txn_id: TxnId) {
        (self.abort)(txn_id)
    }
}

struct TxnInner {
    state: TxnState,
    listeners: Vec<Box<dyn TxnListener>>,
}

/// One unit of work against the store.
///
/// Handed out only by the transaction manager. The handle is shared
/// (`Arc`) but a transaction has a single logical owner; concurrent
/// terminal calls are safe and produce exactly one winner.
pub struct Txn {
    id: TxnId,
    wal: Arc<Wal>,
    /// Records journaled on behalf of this transaction.
    writes: AtomicU64,
    inner: Mutex<TxnInner>,
}

impl Txn {
    pub(crate) fn new(id: TxnId, wal: Arc<Wal>) -> Self {
        Self {
            id,
            wal,
            writes: AtomicU64::new(0),
            inner: Mutex::new(TxnInner {
                state: TxnState::Active,
                listeners: Vec::new(),
            }),
        }
    }

    /// The transaction id.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TxnState {
        self.inner.lock().unwrap().state
    }

    /// Errors unless the transaction is still `Active`.
    pub fn ensure_active(&self) -> TxnResult<()> {
        let state = self.state();
        if state == TxnState::Active {
            Ok(())
        } else {
            Err(TxnError::StateViolation {
                id: self.id,
                state,
                op: "store mutation",
            })
        }
    }

    /// Number of log records journaled by this transaction.
    pub fn journal_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Notes one journaled record. Called by the store per append.
    pub(crate) fn record_journal_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Registers an outcome listener. Listeners fire in registration
    /// order. Registering on a handle that already reached a terminal
    /// state is a caller error; such a listener never fires.
    pub fn register_listener(&self, listener: Box<dyn TxnListener>) {
        self.inner.lock().unwrap().listeners.push(listener);
    }

    /// Registers a pair of outcome callbacks.
    pub fn register_callbacks<C, A>(&self, on_commit: C, on_abort: A)
    where
        C: Fn(TxnId) + Send + Sync + 'static,
        A: Fn(TxnId) + Send + Sync + 'static,
    {
        self.register_listener(Box::new(FnListener::new(on_commit, on_abort)));
    }

    /// Commits the transaction.
    ///
    /// Valid only from `Active`; any other state is a state violation.
    /// The commit marker is journaled before the transition, but only
    /// when the transaction journaled at least one record. On a log
    /// failure the transaction aborts instead and the failure
    /// propagates.
    pub fn commit(&self) -> TxnResult<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            TxnState::Active => {}
            state => {
                return Err(TxnError::StateViolation {
                    id: self.id,
                    state,
                    op: "commit",
                })
            }
        }

        if self.journal_writes() > 0 {
            if let Err(e) = self.wal.append(&LogRecord::txn_commit(self.id)) {
                inner.state = TxnState::Aborted;
                let listeners = std::mem::take(&mut inner.listeners);
                drop(inner);
                for listener in &listeners {
                    listener.on_abort(self.id);
                }
                return Err(TxnError::Wal(e));
            }
        }

        inner.state = TxnState::Committed;
        let listeners = std::mem::take(&mut inner.listeners);
        drop(inner);
        for listener in &listeners {
            listener.on_commit(self.id);
        }
        Ok(())
    }

    /// Aborts the transaction.
    ///
    /// From `Active`: rolls the state to `Aborted`, journals an abort
    /// marker, and fires `on_abort` exactly once per listener. From any
    /// later state: a silent no-op that never re-fires listeners.
    pub fn abort(&self) {
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != TxnState::Active {
                return;
            }
            inner.state = TxnState::Aborted;
            std::mem::take(&mut inner.listeners)
        };

        if self.journal_writes() > 0 {
            // the abort already happened; a marker failure is reported,
            // recovery will roll the transaction back from the log
            if let Err(e) = self.wal.append(&LogRecord::txn_abort(self.id)) {
                Logger::log_stderr(
                    Severity::Error,
                    "txn_abort_marker_failed",
                    &[
                        ("txn_id", &self.id.to_string()),
                        ("error", &e.to_string()),
                    ],
                );
            }
        }

        for listener in &listeners {
            listener.on_abort(self.id);
        }
    }

    /// Closes the handle.
    ///
    /// An `Active` transaction is aborted first (firing `on_abort`
    /// exactly once); then the state becomes `Closed`. Idempotent.
    pub fn close(&self) {
        self.abort();
        self.inner.lock().unwrap().state = TxnState::Closed;
    }
}

/// A handle dropped while still `Active` aborts: acquisition is
/// scoped, and abandoning a transaction must not leave its effects
/// behind.
impl Drop for Txn {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Txn")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("journal_writes", &self.journal_writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn test_wal() -> (TempDir, Arc<Wal>) {
        let dir = TempDir::new().unwrap();
        let wal = Arc::new(Wal::open(dir.path()).unwrap());
        (dir, wal)
    }

    struct CountingListener {
        commits: AtomicUsize,
        aborts: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                commits: AtomicUsize::new(0),
                aborts: AtomicUsize::new(0),
            })
        }
    }

    impl TxnListener for Arc<CountingListener> {
        fn on_commit(&self, _txn_id: TxnId) {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
        fn on_abort(&self, _txn_id: TxnId) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_commit_fires_on_commit_once() {
        let (_dir, wal) = test_wal();
        let txn = Txn::new(1, wal);
        let counter = CountingListener::new();
        txn.register_listener(Box::new(Arc::clone(&counter)));

        txn.commit().unwrap();
        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(counter.commits.load(Ordering::SeqCst), 1);
        assert_eq!(counter.aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abort_after_commit_is_noop() {
        let (_dir, wal) = test_wal();
        let txn = Txn::new(1, wal);
        let counter = CountingListener::new();
        txn.register_listener(Box::new(Arc::clone(&counter)));

        txn.commit().unwrap();
        txn.abort();
        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(counter.commits.load(Ordering::SeqCst), 1);
        assert_eq!(counter.aborts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_triple_abort_fires_once() {
        let (_dir, wal) = test_wal();
        let txn = Txn::new(1, wal);
        let counter = CountingListener::new();
        txn.register_listener(Box::new(Arc::clone(&counter)));

        txn.abort();
        txn.abort();
        txn.abort();
        assert_eq!(txn.state(), TxnState::Aborted);
        assert_eq!(counter.aborts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_commit_after_abort_rejected() {
        let (_dir, wal) = test_wal();
        let txn = Txn::new(1, wal);
        txn.abort();

        let err = txn.commit().unwrap_err();
        assert!(matches!(
            err,
            TxnError::StateViolation {
                state: TxnState::Aborted,
                ..
            }
        ));
    }

    #[test]
    fn test_close_from_active_aborts_once() {
        let (_dir, wal) = test_wal();
        let txn = Txn::new(1, wal);
        let counter = CountingListener::new();
        txn.register_listener(Box::new(Arc::clone(&counter)));

        txn.close();
        assert_eq!(txn.state(), TxnState::Closed);
        assert_eq!(counter.aborts.load(Ordering::SeqCst), 1);

        txn.close();
        assert_eq!(counter.aborts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let (_dir, wal) = test_wal();
        let txn = Txn::new(1, wal);
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            txn.register_callbacks(
                move |_| order.lock().unwrap().push(tag),
                |_| {},
            );
        }

        txn.commit().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_concurrent_commit_abort_single_winner() {
        for _ in 0..32 {
            let (_dir, wal) = test_wal();
            let txn = Arc::new(Txn::new(1, wal));
            let counter = CountingListener::new();
            txn.register_listener(Box::new(Arc::clone(&counter)));

            std::thread::scope(|scope| {
                let t1 = Arc::clone(&txn);
                let t2 = Arc::clone(&txn);
                scope.spawn(move || {
                    let _ = t1.commit();
                });
                scope.spawn(move || {
                    t2.abort();
                });
            });

            let fired =
                counter.commits.load(Ordering::SeqCst) + counter.aborts.load(Ordering::SeqCst);
            assert_eq!(fired, 1, "exactly one terminal transition may fire");
            assert!(matches!(
                txn.state(),
                TxnState::Committed | TxnState::Aborted
            ));
        }
    }
}
