// src/proc/runner.rs

//! Spawn one external process and expose its lifecycle as a state machine.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::proc::command::StageCommand;
use crate::proc::line_buffer::LineBuffer;
use crate::proc::options::ExecOptions;

/// How long to wait for stdio pipes to drain after the process has exited.
///
/// An inherited pipe held open by an orphaned grandchild would otherwise
/// block completion forever; after this window we proceed as if closed and
/// log a diagnostic.
const STDIO_GRACE: Duration = Duration::from_secs(10);

/// Monotonically-advancing status of one spawned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Starting,
    Running,
    Exited(i32),
    FailedToStart(String),
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Exited(_) | ProcessStatus::FailedToStart(_))
    }
}

/// One complete line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
}

/// Control messages accepted by the driver task while the child runs.
#[derive(Debug)]
enum ControlMsg {
    Interrupt,
    Kill,
}

/// Handle to one live (or already finished) process.
///
/// The handle never bypasses the state machine: termination requests go
/// through the control channel into the driver task that owns the child.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    status_rx: watch::Receiver<ProcessStatus>,
    stdio_closed_rx: watch::Receiver<bool>,
    saw_stderr: Arc<AtomicBool>,
    control_tx: mpsc::Sender<ControlMsg>,
    command_line: String,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current status snapshot.
    pub fn status(&self) -> ProcessStatus {
        self.status_rx.borrow().clone()
    }

    /// Whether any bytes were ever written to stderr.
    pub fn saw_stderr(&self) -> bool {
        self.saw_stderr.load(Ordering::SeqCst)
    }

    /// The command line this handle was started with, for diagnostics.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Wait until the process has exited (or failed to start).
    ///
    /// Does not wait for stdio to drain; see [`ProcessHandle::wait_complete`].
    pub async fn wait_exited(&self) -> ProcessStatus {
        let mut rx = self.status_rx.clone();
        loop {
            let status = rx.borrow_and_update().clone();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    /// Wait until the process has exited *and* its stdio streams are fully
    /// drained (or the post-exit grace window has elapsed).
    ///
    /// "Process exited" and "stdio closed" are distinct events; both must be
    /// observed before the runner reports completion.
    pub async fn wait_complete(&self) -> ProcessStatus {
        let status = self.wait_exited().await;
        let mut rx = self.stdio_closed_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return status;
            }
            if rx.changed().await.is_err() {
                return status;
            }
        }
    }

    /// Request a graceful console interrupt (SIGINT on Unix).
    pub async fn interrupt(&self) {
        let _ = self.control_tx.send(ControlMsg::Interrupt).await;
    }

    /// Request an unconditional kill.
    pub async fn kill(&self) {
        let _ = self.control_tx.send(ControlMsg::Kill).await;
    }
}

/// Spawn a process and return a handle immediately.
///
/// Spawn refusal is not an `Err`: it surfaces as
/// [`ProcessStatus::FailedToStart`] so the caller applies its failure policy
/// in one place, when building the final outcome.
pub fn start(
    command: &StageCommand,
    options: &ExecOptions,
    output_tx: Option<mpsc::Sender<OutputEvent>>,
) -> ProcessHandle {
    let command_line = command.display_line();
    let working_dir = options
        .working_dir
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("."));

    let (status_tx, status_rx) = watch::channel(ProcessStatus::Starting);
    let (closed_tx, closed_rx) = watch::channel(false);
    let (control_tx, control_rx) = mpsc::channel::<ControlMsg>(4);
    let saw_stderr = Arc::new(AtomicBool::new(false));

    let (file_name, argv) = match command.spawn_spec(&working_dir) {
        Ok(spec) => spec,
        Err(reason) => {
            let _ = status_tx.send(ProcessStatus::FailedToStart(reason));
            let _ = closed_tx.send(true);
            return ProcessHandle {
                pid: None,
                status_rx,
                stdio_closed_rx: closed_rx,
                saw_stderr,
                control_tx,
                command_line,
            };
        }
    };

    debug!(
        command = %command_line,
        file_name = %file_name.display(),
        "spawning process"
    );

    let mut cmd = tokio::process::Command::new(&file_name);
    cmd.args(&argv)
        .current_dir(&working_dir)
        .envs(options.env.iter())
        .stdin(if options.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            let _ = status_tx.send(ProcessStatus::FailedToStart(err.to_string()));
            let _ = closed_tx.send(true);
            return ProcessHandle {
                pid: None,
                status_rx,
                stdio_closed_rx: closed_rx,
                saw_stderr,
                control_tx,
                command_line,
            };
        }
    };

    let pid = child.id();
    let _ = status_tx.send(ProcessStatus::Running);

    // Feed stdin, then close it so the child sees EOF.
    if let Some(input) = options.input.clone() {
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(error = %e, "failed to write child stdin");
                }
                let _ = stdin.shutdown().await;
            });
        }
    }

    let stdout_task = spawn_drain(
        child.stdout.take(),
        output_tx.clone(),
        false,
        Arc::clone(&saw_stderr),
        command_line.clone(),
    );
    let stderr_task = spawn_drain(
        child.stderr.take(),
        output_tx,
        true,
        Arc::clone(&saw_stderr),
        command_line.clone(),
    );

    tokio::spawn(drive(
        child,
        command_line.clone(),
        control_rx,
        status_tx,
        closed_tx,
        stdout_task,
        stderr_task,
    ));

    ProcessHandle {
        pid,
        status_rx,
        stdio_closed_rx: closed_rx,
        saw_stderr,
        control_tx,
        command_line,
    }
}

/// Driver task: owns the child, serves control messages, publishes the exit
/// status and finally the stdio-closed flag.
async fn drive(
    mut child: tokio::process::Child,
    command_line: String,
    mut control_rx: mpsc::Receiver<ControlMsg>,
    status_tx: watch::Sender<ProcessStatus>,
    closed_tx: watch::Sender<bool>,
    stdout_task: Option<tokio::task::JoinHandle<()>>,
    stderr_task: Option<tokio::task::JoinHandle<()>>,
) {
    let pid = child.id();
    loop {
        tokio::select! {
            status = child.wait() => {
                let code = match status {
                    Ok(status) => status.code().unwrap_or(-1),
                    Err(e) => {
                        warn!(command = %command_line, error = %e, "waiting for child failed");
                        -1
                    }
                };
                debug!(command = %command_line, exit_code = code, "process exited");
                let _ = status_tx.send(ProcessStatus::Exited(code));
                break;
            }
            msg = control_rx.recv() => {
                match msg {
                    Some(ControlMsg::Interrupt) => {
                        if let Some(pid) = pid {
                            send_interrupt(pid, &command_line);
                        }
                    }
                    Some(ControlMsg::Kill) => {
                        debug!(command = %command_line, "killing process");
                        if let Err(e) = child.start_kill() {
                            warn!(command = %command_line, error = %e, "kill failed");
                        }
                    }
                    // All handles dropped; keep waiting for the exit.
                    None => {
                        let code = match child.wait().await {
                            Ok(status) => status.code().unwrap_or(-1),
                            Err(_) => -1,
                        };
                        let _ = status_tx.send(ProcessStatus::Exited(code));
                        break;
                    }
                }
            }
        }
    }

    // The process is gone, but inherited pipe ends may still be open in a
    // grandchild. Give the drain tasks a bounded grace window.
    let drains = async {
        if let Some(t) = stdout_task {
            let _ = t.await;
        }
        if let Some(t) = stderr_task {
            let _ = t.await;
        }
    };
    if tokio::time::timeout(STDIO_GRACE, drains).await.is_err() {
        warn!(
            command = %command_line,
            grace_secs = STDIO_GRACE.as_secs(),
            "stdio not drained within grace window after exit; proceeding as closed"
        );
    }
    let _ = closed_tx.send(true);
}

/// Spawn a task that drains one output pipe into line events.
fn spawn_drain<R>(
    pipe: Option<R>,
    output_tx: Option<mpsc::Sender<OutputEvent>>,
    is_stderr: bool,
    saw_stderr: Arc<AtomicBool>,
    command_line: String,
) -> Option<tokio::task::JoinHandle<()>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut buffer = LineBuffer::new();
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if is_stderr {
                        saw_stderr.store(true, Ordering::SeqCst);
                    }
                    for line in buffer.push(&chunk[..n]) {
                        emit_line(&output_tx, is_stderr, &command_line, line).await;
                    }
                }
                Err(e) => {
                    debug!(command = %command_line, error = %e, "output pipe read failed");
                    break;
                }
            }
        }
        if let Some(line) = buffer.flush() {
            emit_line(&output_tx, is_stderr, &command_line, line).await;
        }
    }))
}

async fn emit_line(
    output_tx: &Option<mpsc::Sender<OutputEvent>>,
    is_stderr: bool,
    command_line: &str,
    line: String,
) {
    if is_stderr {
        debug!(command = %command_line, "stderr: {line}");
    } else {
        debug!(command = %command_line, "stdout: {line}");
    }
    if let Some(tx) = output_tx {
        let event = if is_stderr {
            OutputEvent::Stderr(line)
        } else {
            OutputEvent::Stdout(line)
        };
        let _ = tx.send(event).await;
    }
}

#[cfg(unix)]
fn send_interrupt(pid: u32, command_line: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    debug!(command = %command_line, pid, "sending SIGINT");
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        debug!(command = %command_line, pid, error = %e, "SIGINT failed");
    }
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32, command_line: &str) {
    // No portable console-interrupt facility here; the executor's
    // escalation will fall through to a hard kill.
    debug!(command = %command_line, "console interrupt unavailable on this platform");
}
