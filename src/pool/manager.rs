//! The session pool.
//!
//! A bounded set of session handles arbitrating exclusive access to
//! the storage engine. Checkout is reentrant per caller: asking again
//! with the same caller token returns the same session with a raised
//! reference count, so a caller never deadlocks against its own held
//! resource.
//!
//! All bookkeeping happens under one internal mutex; blocked waiters
//! sit on a condition variable, never on the mutex. The capacity
//! invariant holds at every observable point:
//!
//! ```text
//! active + available == total_created <= max
//! ```
//!
//! Service mode is a readers-writer discipline over the whole pool:
//! ordinary sessions are readers, the service-mode holder the
//! exclusive writer. Entering drains every session held by other
//! principals and blocks their new requests until exit.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::StorageConfig;
use crate::observability::{Logger, Severity};

use super::errors::{PoolError, PoolResult};
use super::session::{CallerId, Principal, Session};

struct ActiveEntry {
    session: Arc<Session>,
    refs: usize,
    principal: Principal,
}

struct PoolState {
    available: VecDeque<Arc<Session>>,
    active: HashMap<CallerId, ActiveEntry>,
    total_created: usize,
    service_holder: Option<String>,
    shutdown: bool,
}

/// Bounded pool of storage sessions.
pub struct SessionPool {
    max: usize,
    acquire_timeout: Duration,
    state: Mutex<PoolState>,
    cond: Condvar,
}

impl SessionPool {
    /// A pool of at most `max` sessions with the given bounded wait.
    pub fn new(max: usize, acquire_timeout: Duration) -> Self {
        assert!(max > 0, "pool capacity must be positive");
        Self {
            max,
            acquire_timeout,
            state: Mutex::new(PoolState {
                available: VecDeque::new(),
                active: HashMap::new(),
                total_created: 0,
                service_holder: None,
                shutdown: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// A pool sized from configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.max_sessions, config.acquire_timeout())
    }

    /// Configured capacity.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Sessions currently checked out.
    pub fn active(&self) -> usize {
        self.state.lock().unwrap().active.len()
    }

    /// Sessions currently idle in the pool.
    pub fn available(&self) -> usize {
        self.state.lock().unwrap().available.len()
    }

    /// Sessions created so far, active and idle together.
    pub fn total_created(&self) -> usize {
        self.state.lock().unwrap().total_created
    }

    /// Checks a session out for `caller`.
    ///
    /// Reentrant: a caller already holding a session receives the same
    /// session again with its reference count raised. Otherwise an
    /// idle session is reused, a new one created while under capacity,
    /// or the caller waits; the wait is bounded and ends in a typed
    /// exhaustion failure, never an unbounded block. While another
    /// principal holds service mode, non-holders wait here too.
    pub fn get(&self, caller: CallerId, principal: &Principal) -> PoolResult<SessionLease<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self.state.lock().unwrap();

        loop {
            if state.shutdown {
                return Err(PoolError::ShuttingDown);
            }

            if let Some(entry) = state.active.get_mut(&caller) {
                entry.refs += 1;
                let session = Arc::clone(&entry.session);
                return Ok(SessionLease {
                    pool: self,
                    caller,
                    session,
                    released: false,
                });
            }

            let excluded = state
                .service_holder
                .as_deref()
                .map_or(false, |holder| holder != principal.name());

            if !excluded {
                if let Some(session) = state.available.pop_front() {
                    return Ok(self.activate(&mut state, caller, principal, session));
                }
                if state.total_created < self.max {
                    state.total_created += 1;
                    let session = Arc::new(Session::create());
                    return Ok(self.activate(&mut state, caller, principal, session));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PoolError::Exhausted {
                    max: self.max,
                    active: state.active.len(),
                    waited_ms: self.acquire_timeout.as_millis() as u64,
                });
            }

            Logger::log(
                Severity::Trace,
                "session_pool_waiting",
                &[
                    ("principal", principal.name()),
                    ("active", &state.active.len().to_string()),
                ],
            );
            let (guard, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = guard;
        }
    }

    fn activate<'a>(
        &'a self,
        state: &mut PoolState,
        caller: CallerId,
        principal: &Principal,
        session: Arc<Session>,
    ) -> SessionLease<'a> {
        session.bind(principal.clone());
        state.active.insert(
            caller,
            ActiveEntry {
                session: Arc::clone(&session),
                refs: 1,
                principal: principal.clone(),
            },
        );
        SessionLease {
            pool: self,
            caller,
            session,
            released: false,
        }
    }

    /// Releases a lease. Equivalent to dropping it.
    pub fn release(&self, lease: SessionLease<'_>) {
        drop(lease);
    }

    fn release_internal(&self, caller: CallerId) {
        let mut state = self.state.lock().unwrap();

        let fully_released = match state.active.get_mut(&caller) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => {
                Logger::log_stderr(
                    Severity::Error,
                    "session_release_unknown_caller",
                    &[("caller", &caller.to_string())],
                );
                return;
            }
        };

        if fully_released {
            if let Some(entry) = state.active.remove(&caller) {
                entry.session.unbind();
                if state.shutdown {
                    // sessions are destroyed at shutdown, not recycled
                    state.total_created -= 1;
                } else {
                    state.available.push_back(entry.session);
                }
            }
            self.cond.notify_all();
        }
    }

    /// Switches the pool into service mode for `principal`.
    ///
    /// Requires the administrative role. Marks the pool first, so new
    /// requests from other principals start blocking, then waits until
    /// every session held by another principal is released. The
    /// holder's own sessions are unaffected.
    pub fn enter_service_mode(&self, principal: &Principal) -> PoolResult<()> {
        if !principal.is_admin() {
            return Err(PoolError::PermissionDenied {
                principal: principal.name().to_string(),
                reason: "service mode requires the administrative role".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return Err(PoolError::ShuttingDown);
            }
            match state.service_holder.as_deref() {
                Some(holder) if holder != principal.name() => {
                    state = self.cond.wait(state).unwrap();
                }
                _ => break,
            }
        }
        state.service_holder = Some(principal.name().to_string());

        while state
            .active
            .values()
            .any(|entry| entry.principal.name() != principal.name())
        {
            if state.shutdown {
                state.service_holder = None;
                self.cond.notify_all();
                return Err(PoolError::ShuttingDown);
            }
            state = self.cond.wait(state).unwrap();
        }

        Logger::log(
            Severity::Info,
            "service_mode_entered",
            &[("principal", principal.name())],
        );
        Ok(())
    }

    /// Leaves service mode and wakes every blocked request.
    ///
    /// Only the holding principal may exit; anyone else is rejected.
    pub fn exit_service_mode(&self, principal: &Principal) -> PoolResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.service_holder.as_deref() {
            Some(holder) if holder == principal.name() => {
                state.service_holder = None;
                self.cond.notify_all();
                Ok(())
            }
            _ => Err(PoolError::PermissionDenied {
                principal: principal.name().to_string(),
                reason: "the pool is locked by a different principal".to_string(),
            }),
        }
    }

    /// The principal currently holding service mode, if any.
    pub fn service_mode_holder(&self) -> Option<String> {
        self.state.lock().unwrap().service_holder.clone()
    }

    /// Begins shutdown: every waiter fails fast, idle sessions are
    /// destroyed, and sessions still checked out are destroyed on
    /// their final release.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        let discarded = state.available.len();
        state.available.clear();
        state.total_created -= discarded;
        self.cond.notify_all();
    }

    /// True once shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }
}

/// A scoped session acquisition: released on drop, on every exit path.
pub struct SessionLease<'a> {
    pool: &'a SessionPool,
    caller: CallerId,
    session: Arc<Session>,
    released: bool,
}

impl SessionLease<'_> {
    /// The checked-out session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The caller this lease belongs to.
    pub fn caller(&self) -> CallerId {
        self.caller
    }

    /// Explicitly releases the lease.
    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.release_internal(self.caller);
        }
    }
}

impl fmt::Debug for SessionLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLease")
            .field("caller", &self.caller)
            .field("session", &self.session)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.do_release();
    }
}
