//! Transaction Lifecycle Invariant Tests
//!
//! - Listeners fire exactly once, on the terminal transition, in
//!   registration order
//! - commit then abort: Committed, on_commit once, on_abort never
//! - abort three times: on_abort once
//! - close from Active: on_abort once, final state Closed
//! - commit after abort is a state violation; abort after commit a
//!   silent no-op

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use xanadb::txn::{TransactionManager, Txn, TxnError, TxnListener, TxnState};
use xanadb::wal::{TxnId, Wal};

struct Fixture {
    _dir: TempDir,
    manager: TransactionManager,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let wal = Arc::new(Wal::open(dir.path()).unwrap());
    Fixture {
        _dir: dir,
        manager: TransactionManager::new(wal),
    }
}

#[derive(Default)]
struct Counts {
    commits: AtomicUsize,
    aborts: AtomicUsize,
}

struct Counting(Arc<Counts>);

impl TxnListener for Counting {
    fn on_commit(&self, _txn_id: TxnId) {
        self.0.commits.fetch_add(1, Ordering::SeqCst);
    }
    fn on_abort(&self, _txn_id: TxnId) {
        self.0.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

fn watch(txn: &Txn) -> Arc<Counts> {
    let counts = Arc::new(Counts::default());
    txn.register_listener(Box::new(Counting(Arc::clone(&counts))));
    counts
}

#[test]
fn test_commit_then_abort_fires_commit_only() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    let counts = watch(&txn);

    txn.commit().unwrap();
    txn.abort();

    assert_eq!(txn.state(), TxnState::Committed);
    assert_eq!(counts.commits.load(Ordering::SeqCst), 1);
    assert_eq!(counts.aborts.load(Ordering::SeqCst), 0);
}

#[test]
fn test_triple_abort_fires_abort_once() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    let counts = watch(&txn);

    txn.abort();
    txn.abort();
    txn.abort();

    assert_eq!(txn.state(), TxnState::Aborted);
    assert_eq!(counts.commits.load(Ordering::SeqCst), 0);
    assert_eq!(counts.aborts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_from_active_aborts_and_closes() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    let counts = watch(&txn);

    txn.close();

    assert_eq!(txn.state(), TxnState::Closed);
    assert_eq!(counts.aborts.load(Ordering::SeqCst), 1);

    // close is idempotent and never re-fires
    txn.close();
    assert_eq!(counts.aborts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_close_after_commit_keeps_commit_outcome() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    let counts = watch(&txn);

    txn.commit().unwrap();
    txn.close();

    assert_eq!(txn.state(), TxnState::Closed);
    assert_eq!(counts.commits.load(Ordering::SeqCst), 1);
    assert_eq!(counts.aborts.load(Ordering::SeqCst), 0);
}

#[test]
fn test_commit_after_abort_is_state_violation() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    txn.abort();

    match txn.commit() {
        Err(TxnError::StateViolation { state, .. }) => {
            assert_eq!(state, TxnState::Aborted);
        }
        other => panic!("expected a state violation, got {:?}", other.err()),
    }
}

#[test]
fn test_commit_on_closed_handle_rejected() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    txn.commit().unwrap();
    txn.close();

    assert!(matches!(
        txn.commit(),
        Err(TxnError::StateViolation {
            state: TxnState::Closed,
            ..
        })
    ));
}

#[test]
fn test_listener_registration_order_preserved() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let order = Arc::clone(&order);
        txn.register_callbacks(move |_| order.lock().unwrap().push(i), |_| {});
    }

    txn.commit().unwrap();
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_listener_receives_transaction_id() {
    let fx = fixture();
    let txn = fx.manager.begin().unwrap();
    let seen = Arc::new(Mutex::new(None));
    {
        let seen = Arc::clone(&seen);
        txn.register_callbacks(move |id| *seen.lock().unwrap() = Some(id), |_| {});
    }

    let id = txn.id();
    txn.commit().unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(id));
}

#[test]
fn test_concurrent_terminal_calls_one_winner() {
    for _ in 0..50 {
        let fx = fixture();
        let txn = fx.manager.begin().unwrap();
        let counts = watch(&txn);

        std::thread::scope(|scope| {
            let a = Arc::clone(&txn);
            let b = Arc::clone(&txn);
            let c = Arc::clone(&txn);
            scope.spawn(move || {
                let _ = a.commit();
            });
            scope.spawn(move || b.abort());
            scope.spawn(move || c.close());
        });

        let fired =
            counts.commits.load(Ordering::SeqCst) + counts.aborts.load(Ordering::SeqCst);
        assert_eq!(fired, 1, "listeners must fire exactly once");
        // close participated, so the handle always ends up spent
        assert_eq!(txn.state(), TxnState::Closed);
    }
}
