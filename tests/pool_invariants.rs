//! Session Pool Invariant Tests
//!
//! - Capacity: active + available == total_created <= max, at every
//!   observable point, under any interleaving of get/release
//! - Reentrancy: same caller, same session, two releases to free it
//! - Service mode: exclusive, drains other holders, blocks new ones
//! - Load: many concurrent callers against a tiny pool, no deadlock
//!
//! Waiter wake order is unspecified; nothing here depends on it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use xanadb::pool::{CallerId, PoolError, Principal, SessionPool};

fn pool(max: usize, timeout_ms: u64) -> Arc<SessionPool> {
    Arc::new(SessionPool::new(max, Duration::from_millis(timeout_ms)))
}

fn assert_capacity_invariant(pool: &SessionPool) {
    let active = pool.active();
    let available = pool.available();
    let total = pool.total_created();
    assert_eq!(
        active + available,
        total,
        "active {} + available {} != total_created {}",
        active,
        available,
        total
    );
    assert!(total <= pool.max());
}

// =============================================================================
// Capacity invariant
// =============================================================================

#[test]
fn test_capacity_invariant_under_churn() {
    let pool = pool(4, 2_000);
    let principal = Principal::new("worker");

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let principal = principal.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    let lease = pool.get(CallerId::new(), &principal).unwrap();
                    assert!(pool.active() <= pool.max());
                    drop(lease);
                }
            });
        }
    });

    assert_capacity_invariant(&pool);
    assert_eq!(pool.active(), 0);
}

#[test]
fn test_sessions_created_on_demand_up_to_max() {
    let pool = pool(3, 200);
    let principal = Principal::new("worker");

    let first = pool.get(CallerId::new(), &principal).unwrap();
    assert_eq!(pool.total_created(), 1);
    let second = pool.get(CallerId::new(), &principal).unwrap();
    assert_eq!(pool.total_created(), 2);
    drop(first);

    // a third caller reuses the freed session instead of creating
    let third = pool.get(CallerId::new(), &principal).unwrap();
    assert_eq!(pool.total_created(), 2);
    assert_capacity_invariant(&pool);
    drop(second);
    drop(third);
}

// =============================================================================
// Reentrancy
// =============================================================================

#[test]
fn test_reentrant_checkout_same_session_twice() {
    let pool = pool(1, 200);
    let principal = Principal::new("worker");
    let caller = CallerId::new();

    let outer = pool.get(caller, &principal).unwrap();
    let inner = pool.get(caller, &principal).unwrap();
    assert_eq!(outer.session().id(), inner.session().id());

    // one release is not enough to free the session for others
    inner.release();
    let err = pool
        .get(CallerId::new(), &principal)
        .expect_err("session must still be held");
    assert!(matches!(err, PoolError::Exhausted { .. }));

    outer.release();
    let lease = pool.get(CallerId::new(), &principal).unwrap();
    assert_eq!(pool.active(), 1);
    drop(lease);
}

#[test]
fn test_reentrant_checkout_does_not_self_deadlock_at_capacity() {
    let pool = pool(1, 5_000);
    let principal = Principal::new("worker");
    let caller = CallerId::new();

    // with max = 1 a non-reentrant pool would block forever here
    let started = Instant::now();
    let outer = pool.get(caller, &principal).unwrap();
    let inner = pool.get(caller, &principal).unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    drop(inner);
    drop(outer);
}

// =============================================================================
// Service mode
// =============================================================================

#[test]
fn test_service_mode_waits_for_drain_then_excludes_others() {
    let pool = pool(5, 10_000);
    let alice = Principal::new("alice");
    let admin = Principal::admin("admin");

    let held = pool.get(CallerId::new(), &alice).unwrap();

    std::thread::scope(|scope| {
        let service = {
            let pool = Arc::clone(&pool);
            let admin = admin.clone();
            scope.spawn(move || {
                // blocks until alice releases
                pool.enter_service_mode(&admin).unwrap();
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(!service.is_finished(), "must wait while alice holds a session");

        drop(held);
        service.join().unwrap();
        assert_eq!(pool.service_mode_holder().as_deref(), Some("admin"));

        // a third party is locked out until exit
        {
            let blocked_pool = Arc::clone(&pool);
            let alice = alice.clone();
            let blocked = scope.spawn(move || blocked_pool.get(CallerId::new(), &alice).is_ok());
            std::thread::sleep(Duration::from_millis(100));
            assert!(!blocked.is_finished(), "get must block during service mode");

            pool.exit_service_mode(&admin).unwrap();
            assert!(blocked.join().unwrap(), "get must succeed after exit");
        }
    });
}

#[test]
fn test_service_mode_holder_keeps_access() {
    let pool = pool(5, 1_000);
    let admin = Principal::admin("admin");

    pool.enter_service_mode(&admin).unwrap();
    let lease = pool.get(CallerId::new(), &admin).unwrap();
    drop(lease);
    pool.exit_service_mode(&admin).unwrap();
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_shutdown_wakes_blocked_waiters() {
    let pool = pool(1, 30_000);
    let principal = Principal::new("worker");

    let held = pool.get(CallerId::new(), &principal).unwrap();

    std::thread::scope(|scope| {
        let waiter = {
            let pool = Arc::clone(&pool);
            let principal = principal.clone();
            scope.spawn(move || pool.get(CallerId::new(), &principal).map(|_| ()))
        };

        std::thread::sleep(Duration::from_millis(100));
        let started = Instant::now();
        pool.shutdown();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(PoolError::ShuttingDown)));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "waiters must fail fast, not ride out their timeout"
        );
    });

    drop(held);
}

// =============================================================================
// Load
// =============================================================================

#[test]
fn test_load_1000_callers_against_pool_of_5() {
    let pool = pool(5, 60_000);
    let principal = Principal::new("worker");

    std::thread::scope(|scope| {
        for _ in 0..1000 {
            let pool = Arc::clone(&pool);
            let principal = principal.clone();
            scope.spawn(move || {
                let hold = Duration::from_micros(rand::thread_rng().gen_range(0..500));
                let lease = pool.get(CallerId::new(), &principal).unwrap();
                assert!(pool.active() <= 5, "active sessions exceeded the cap");
                std::thread::sleep(hold);
                drop(lease);
            });
        }
    });

    assert_eq!(pool.active(), 0);
    assert_eq!(pool.available(), pool.total_created());
    assert!(pool.total_created() <= 5);
}
