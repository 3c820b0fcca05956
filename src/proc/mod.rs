// src/proc/mod.rs

//! Process execution layer.
//!
//! This module spawns external tools with `tokio::process::Command`, streams
//! their output line by line, and exposes a structured state machine for each
//! running process:
//!
//! - [`command`] resolves executables and builds the final spawn spec
//!   (including `.cmd`/`.bat` routing and shell wrapper selection).
//! - [`options`] holds the immutable per-execution options.
//! - [`line_buffer`] buffers partial output lines on the platform line
//!   ending and flushes the remainder when a stream ends.
//! - [`runner`] owns the spawn itself, the status/stdio-closed state machine
//!   and the control channel used for interrupt/kill.
//!
//! Failure policy (exit codes, stderr policy) is *not* applied here; the
//! deadline executor decides pass/fail when it builds the final outcome.

pub mod command;
pub mod line_buffer;
pub mod options;
pub mod runner;

pub use command::{ShellKind, StageCommand};
pub use line_buffer::LineBuffer;
pub use options::{Deadline, ExecOptions};
pub use runner::{start, OutputEvent, ProcessHandle, ProcessStatus};
