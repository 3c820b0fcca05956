// src/deadline/executor.rs

//! Run one process with an optional deadline and graduated termination.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::proc::runner::{start, OutputEvent, ProcessHandle, ProcessStatus};
use crate::proc::{ExecOptions, StageCommand};

/// Outcome of one logical step (before-hook / main / after-hook).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    Failure(String),
    TimedOut(String),
    Skipped,
}

impl ExecOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ExecOutcome::Failure(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, ExecOutcome::TimedOut(_))
    }
}

impl std::fmt::Display for ExecOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecOutcome::Success => f.write_str("success"),
            ExecOutcome::Failure(reason) => write!(f, "failure: {reason}"),
            ExecOutcome::TimedOut(reason) => write!(f, "timed out: {reason}"),
            ExecOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// Timing knobs for the timeout escalation sequence.
///
/// Abrupt termination can corrupt files the child was writing (e.g. a
/// half-finished archive); the graceful interrupts give well-behaved tools a
/// chance to flush before the hard kill.
#[derive(Debug, Clone, Copy)]
pub struct DeadlinePolicy {
    /// Wait after the deadline fires before sending any signal.
    pub settle: Duration,
    /// Number of graceful interrupts to attempt.
    pub interrupt_attempts: u32,
    /// Wait between interrupt attempts.
    pub interrupt_grace: Duration,
    /// Final wait after the last interrupt before the hard kill.
    pub final_wait: Duration,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            interrupt_attempts: 3,
            interrupt_grace: Duration::from_secs(3),
            final_wait: Duration::from_secs(10),
        }
    }
}

/// Run a command, racing its completion against the deadline in `options`.
///
/// Without a deadline this just waits for completion and applies the
/// exit-code/stderr policy. With one, a timer race decides: the losing timer
/// is dropped by the `select!`, and a losing process goes through
/// [`escalate`] rather than being dropped mid-flight.
pub async fn run_with_deadline(
    command: &StageCommand,
    options: &ExecOptions,
    output_tx: Option<mpsc::Sender<OutputEvent>>,
    policy: &DeadlinePolicy,
) -> ExecOutcome {
    let remaining = match options.deadline {
        Some(deadline) => {
            let remaining = deadline.remaining();
            if remaining.is_zero() {
                return ExecOutcome::TimedOut(format!(
                    "wall-clock budget exhausted before `{}` started",
                    command.display_line()
                ));
            }
            Some(remaining)
        }
        None => None,
    };

    let handle = start(command, options, output_tx);

    let status = match remaining {
        None => handle.wait_complete().await,
        Some(remaining) => {
            tokio::select! {
                status = handle.wait_complete() => status,
                _ = tokio::time::sleep(remaining) => {
                    info!(
                        command = %handle.command_line(),
                        "deadline exceeded; starting termination sequence"
                    );
                    escalate(&handle, policy).await;
                    return ExecOutcome::TimedOut(format!(
                        "deadline exceeded running `{}`",
                        handle.command_line()
                    ));
                }
            }
        }
    };

    build_outcome(&handle, options, status)
}

/// Graceful-then-forced termination.
///
/// Sequence: settle wait, up to `interrupt_attempts` graceful interrupts
/// with `interrupt_grace` between them, a final wait, then an unconditional
/// kill. Every step short-circuits as soon as the process is observed
/// exited.
pub async fn escalate(handle: &ProcessHandle, policy: &DeadlinePolicy) {
    if wait_exit_within(handle, policy.settle).await {
        return;
    }

    for attempt in 1..=policy.interrupt_attempts {
        debug!(
            command = %handle.command_line(),
            attempt,
            "sending graceful interrupt"
        );
        handle.interrupt().await;
        if wait_exit_within(handle, policy.interrupt_grace).await {
            return;
        }
    }

    if wait_exit_within(handle, policy.final_wait).await {
        return;
    }

    warn!(
        command = %handle.command_line(),
        "process ignored graceful interrupts; killing"
    );
    handle.kill().await;
    handle.wait_exited().await;
}

async fn wait_exit_within(handle: &ProcessHandle, window: Duration) -> bool {
    tokio::time::timeout(window, handle.wait_exited())
        .await
        .is_ok()
}

/// Apply the failure policy to a finished process.
fn build_outcome(
    handle: &ProcessHandle,
    options: &ExecOptions,
    status: ProcessStatus,
) -> ExecOutcome {
    let line = handle.command_line();
    match status {
        ProcessStatus::FailedToStart(reason) => {
            ExecOutcome::Failure(format!("failed to start `{line}`: {reason}"))
        }
        ProcessStatus::Exited(code) => {
            if options.fail_on_stderr && handle.saw_stderr() {
                return ExecOutcome::Failure(format!(
                    "`{line}` wrote to stderr (failOnStderr is set, exit code {code})"
                ));
            }
            if code == 0 {
                return ExecOutcome::Success;
            }
            if options.ignore_exit_codes.contains(&code) {
                // Ignored codes land in the timed-out bucket: "possibly
                // transient, treat like a timeout for retry purposes".
                return ExecOutcome::TimedOut(format!(
                    "`{line}` exited with ignored code {code}"
                ));
            }
            ExecOutcome::Failure(format!("`{line}` failed with exit code {code}"))
        }
        // wait_complete only returns terminal statuses.
        other => ExecOutcome::Failure(format!("`{line}` ended in unexpected state {other:?}")),
    }
}
