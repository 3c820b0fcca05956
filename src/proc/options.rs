// src/proc/options.rs

//! Immutable per-execution options.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Absolute or relative deadline for one execution.
#[derive(Debug, Clone, Copy)]
pub enum Deadline {
    /// Finish by this wall-clock instant.
    At(SystemTime),
    /// Finish within this duration, counted from execution start.
    In(Duration),
}

impl Deadline {
    /// Remaining budget as of now. Zero when the deadline has passed.
    pub fn remaining(&self) -> Duration {
        match self {
            Deadline::At(t) => t
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
            Deadline::In(d) => *d,
        }
    }
}

/// Options for one process execution.
///
/// Immutable once the execution starts; the runner and executor only read
/// from this.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory for the child. Defaults to the current directory.
    pub working_dir: Option<PathBuf>,

    /// Environment overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,

    /// Bytes written to the child's stdin. `None` closes stdin immediately.
    pub input: Option<Vec<u8>>,

    /// Treat any stderr output as a failure when building the outcome.
    pub fail_on_stderr: bool,

    /// Exit codes that are not treated as failures.
    pub ignore_exit_codes: Vec<i32>,

    /// Optional deadline for this execution.
    pub deadline: Option<Deadline>,
}

impl ExecOptions {
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
