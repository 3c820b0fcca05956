// src/deadline/ledger.rs

//! Persisted stage deadline shared across orchestrator invocations.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

/// Minimal key/value store the ledger persists into.
///
/// Production binds this to the process environment (which the surrounding
/// CI job propagates between phase invocations); tests bind it to an
/// in-memory map.
pub trait KvStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Environment-variable-backed store.
#[derive(Debug, Default)]
pub struct EnvKvStore;

impl KvStore for EnvKvStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set(&self, key: &str, value: &str) {
        // SAFETY: `set_var` is unsound against a concurrent `getenv` on any
        // thread. The ledger writes exactly once, as the first step of
        // `run_stage`, sequenced before this crate's own environment reads
        // (PATH lookup, `ComSpec`) and before any phase spawns; at that
        // point the only other live tasks are channel pumps that never
        // touch the environment. A reader outside this crate on another
        // runtime thread would still race; callers needing a guarantee
        // inject `MemoryKvStore` instead.
        unsafe { std::env::set_var(key, value) };
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

/// Variable name holding the absolute deadline for a stage key.
pub fn deadline_key(stage_key: &str) -> String {
    format!("STAGE_END_{stage_key}")
}

/// Establishes or reuses the absolute deadline for a stage.
#[derive(Debug)]
pub struct StageTimeoutLedger<'a> {
    store: &'a dyn KvStore,
}

impl<'a> StageTimeoutLedger<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        Self { store }
    }

    /// Read the persisted deadline for `stage_key`, or compute
    /// `now + budget`, persist it and return it.
    ///
    /// Idempotent: a second call with the same key returns the identical
    /// timestamp, regardless of how much real time has passed. A malformed
    /// persisted value is treated as absent and rewritten.
    pub fn get_or_set_deadline(&self, stage_key: &str, budget: Duration) -> SystemTime {
        let key = deadline_key(stage_key);

        if let Some(raw) = self.store.get(&key) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => {
                    let deadline = UNIX_EPOCH + Duration::from_millis(ms);
                    debug!(stage_key, deadline_ms = ms, "reusing persisted deadline");
                    return deadline;
                }
                Err(_) => {
                    warn!(stage_key, value = %raw, "malformed persisted deadline; recomputing");
                }
            }
        }

        let ms = (SystemTime::now() + budget)
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        self.store.set(&key, &ms.to_string());
        debug!(
            stage_key,
            budget_ms = budget.as_millis() as u64,
            deadline_ms = ms,
            "established new stage deadline"
        );
        // Return the persisted precision so later invocations reading the
        // stored value see the identical instant.
        UNIX_EPOCH + Duration::from_millis(ms)
    }
}
