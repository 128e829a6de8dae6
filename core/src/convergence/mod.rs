//! Convergence engine: turns a handler's side effects into host actions.
//!
//! The `planner` module decides which services to bounce from checksum
//! snapshots. The `executor` runs host actions in order, and `retry` holds
//! the backoff policy for the package operations that may hit a held lock.

pub mod executor;
pub mod planner;
pub mod retry;
