// src/snapshot/archiver.rs

//! Wrapper around the external archiver CLI (7-Zip flag grammar).

use std::path::Path;

use tokio::sync::mpsc;
use tracing::debug;

use crate::proc::runner::{start, OutputEvent, ProcessStatus};
use crate::proc::{ExecOptions, StageCommand};

/// Output substrings that mark the transient "file in use" error class.
const TRANSIENT_MARKERS: &[&str] = &[
    "The process cannot access the file",
    "is being used by another process",
];

/// Error class of a failed archiver invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorClass {
    /// "File in use" style failure; worth retrying after a delay.
    Transient,
    /// Everything else; abort immediately.
    Fatal,
}

/// A failed archiver invocation with its classified cause.
#[derive(Debug, Clone)]
pub struct ArchiveFailure {
    pub class: ArchiveErrorClass,
    pub detail: String,
}

/// External archiver with the fixed 7-Zip flag grammar.
#[derive(Debug, Clone)]
pub struct Archiver {
    program: String,
}

impl Default for Archiver {
    fn default() -> Self {
        Self {
            program: "7z".to_string(),
        }
    }
}

impl Archiver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Extract an archive in place: `x -y <archive>`.
    pub async fn extract(&self, archive: &Path, root: &Path) -> Result<(), ArchiveFailure> {
        let command = StageCommand::new(
            &self.program,
            vec!["x".into(), "-y".into(), archive.to_string_lossy().into_owned()],
        );
        self.run("extraction", &command, root).await
    }

    /// Create an archive from a manifest of paths:
    /// `a <archive> -m0=zstd -mx2 @<manifest> -x!<archive> -x!<manifest>`.
    ///
    /// The manifest and the output archive are explicitly excluded so the
    /// archive never contains itself or its own file listing.
    pub async fn create(
        &self,
        archive_name: &str,
        manifest_name: &str,
        root: &Path,
    ) -> Result<(), ArchiveFailure> {
        let command = StageCommand::new(
            &self.program,
            vec![
                "a".into(),
                archive_name.into(),
                "-m0=zstd".into(),
                "-mx2".into(),
                format!("@{manifest_name}"),
                format!("-x!{archive_name}"),
                format!("-x!{manifest_name}"),
            ],
        );
        self.run("creation", &command, root).await
    }

    async fn run(
        &self,
        action: &str,
        command: &StageCommand,
        root: &Path,
    ) -> Result<(), ArchiveFailure> {
        debug!(command = %command.display_line(), action, "invoking archiver");

        let options = ExecOptions::default().with_working_dir(root);
        let (tx, mut rx) = mpsc::channel::<OutputEvent>(64);
        let handle = start(command, &options, Some(tx));

        // Capture all output while waiting; the collector ends when the
        // drain tasks drop their senders.
        let collect = async {
            let mut captured = String::new();
            while let Some(event) = rx.recv().await {
                let (OutputEvent::Stdout(line) | OutputEvent::Stderr(line)) = event;
                captured.push_str(&line);
                captured.push('\n');
            }
            captured
        };
        let (status, captured) = tokio::join!(handle.wait_complete(), collect);

        match status {
            ProcessStatus::Exited(0) => Ok(()),
            ProcessStatus::Exited(code) => {
                let class = if TRANSIENT_MARKERS.iter().any(|m| captured.contains(m)) {
                    ArchiveErrorClass::Transient
                } else {
                    ArchiveErrorClass::Fatal
                };
                Err(ArchiveFailure {
                    class,
                    detail: format!(
                        "`{}` exited with code {code} ({})",
                        command.display_line(),
                        describe_exit_code(code)
                    ),
                })
            }
            ProcessStatus::FailedToStart(reason) => Err(ArchiveFailure {
                class: ArchiveErrorClass::Fatal,
                detail: format!("failed to start `{}`: {reason}", command.display_line()),
            }),
            other => Err(ArchiveFailure {
                class: ArchiveErrorClass::Fatal,
                detail: format!("archiver ended in unexpected state {other:?}"),
            }),
        }
    }
}

/// Defined meanings of the archiver's exit codes.
fn describe_exit_code(code: i32) -> &'static str {
    match code {
        2 => "fatal error",
        7 => "command-line error",
        8 => "out of memory",
        255 => "user aborted",
        _ => "generic failure",
    }
}
