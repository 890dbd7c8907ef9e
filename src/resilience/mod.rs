//! Resilience helpers for external effects.
//!
//! # Data Flow
//! ```text
//! Restart / reload / probe / file I/O:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On reload failure: backoff.rs (jittered delay before next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timeout is reported as that call's failure and feeds the rollback path
//! - Only the reload signal is retried; restarts are not idempotent enough to repeat blindly

pub mod backoff;
pub mod timeouts;
