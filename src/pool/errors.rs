//! Session pool error types.

use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised by the session pool.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The pool is at capacity and no session was released within the
    /// bounded wait.
    #[error("session pool exhausted: {active} of {max} sessions held, none freed within {waited_ms} ms")]
    Exhausted {
        /// Configured capacity.
        max: usize,
        /// Sessions held when the wait gave up.
        active: usize,
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// The caller lacks the role a privileged operation requires, or
    /// is not the principal holding service mode.
    #[error("permission denied for {principal}: {reason}")]
    PermissionDenied {
        /// The rejected principal.
        principal: String,
        /// Why the operation was rejected.
        reason: String,
    },

    /// The pool has begun shutdown; waiters fail fast instead of
    /// hanging.
    #[error("session pool is shutting down")]
    ShuttingDown,
}
