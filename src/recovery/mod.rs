//! Crash recovery subsystem.
//!
//! After a restart the log is the source of truth: recovery replays it
//! so that every committed transaction is applied and every
//! uncommitted one is undone, deterministically. Corruption halts
//! recovery; a torn record at the log tail is tolerated and reported.

mod errors;
mod replay;
mod startup;

pub use errors::{RecoveryError, RecoveryResult};
pub use replay::{RecoveryStats, WalReplayer};
pub use startup::RecoveryManager;
