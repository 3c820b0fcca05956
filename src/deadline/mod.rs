// src/deadline/mod.rs

//! Deadline-governed execution.
//!
//! - [`executor`] races one process against its deadline and performs the
//!   graduated graceful-then-forced termination sequence on timeout.
//! - [`ledger`] persists the absolute stage deadline in an injected
//!   key/value store so that independent invocations (before-hook, main,
//!   after-hook, each its own process) share one wall-clock budget.

pub mod executor;
pub mod ledger;

pub use executor::{run_with_deadline, DeadlinePolicy, ExecOutcome};
pub use ledger::{EnvKvStore, KvStore, MemoryKvStore, StageTimeoutLedger};
