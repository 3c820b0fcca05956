mod common;
use crate::common::{init_tracing, with_timeout};

use tokio::sync::mpsc;

use stagerun::proc::runner::{start, OutputEvent, ProcessStatus};
use stagerun::proc::{ExecOptions, LineBuffer, StageCommand};

async fn collect_events(mut rx: mpsc::Receiver<OutputEvent>) -> Vec<OutputEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[test]
fn line_buffer_splits_and_flushes() {
    init_tracing();
    let mut buffer = LineBuffer::new();
    assert!(buffer.push(b"par").is_empty());
    assert_eq!(buffer.push(b"tial\nrest"), vec!["partial"]);
    assert_eq!(buffer.flush().as_deref(), Some("rest"));
    assert_eq!(buffer.flush(), None);
}

#[test]
fn line_buffer_yields_multiple_lines_per_chunk() {
    init_tracing();
    let mut buffer = LineBuffer::new();
    assert_eq!(buffer.push(b"one\ntwo\nthr"), vec!["one", "two"]);
    assert_eq!(buffer.push(b"ee\n"), vec!["three"]);
    assert_eq!(buffer.flush(), None);
}

#[tokio::test]
async fn stdout_lines_are_streamed() {
    init_tracing();
    let command = StageCommand::from_raw("echo hello").expect("non-empty command");
    let (tx, rx) = mpsc::channel(16);

    let handle = start(&command, &ExecOptions::default(), Some(tx));
    let status = with_timeout(handle.wait_complete()).await;

    assert_eq!(status, ProcessStatus::Exited(0));
    assert!(!handle.saw_stderr());
    let events = collect_events(rx).await;
    assert!(events.contains(&OutputEvent::Stdout("hello".to_string())));
}

#[cfg(unix)]
#[tokio::test]
async fn stderr_bytes_set_saw_stderr() {
    init_tracing();
    let command =
        StageCommand::from_raw(r#"sh -c "echo oops 1>&2""#).expect("non-empty command");
    let (tx, rx) = mpsc::channel(16);

    let handle = start(&command, &ExecOptions::default(), Some(tx));
    let status = with_timeout(handle.wait_complete()).await;

    assert_eq!(status, ProcessStatus::Exited(0));
    assert!(handle.saw_stderr());
    let events = collect_events(rx).await;
    assert!(events.contains(&OutputEvent::Stderr("oops".to_string())));
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    init_tracing();
    let command = StageCommand::from_raw(r#"sh -c "exit 3""#).expect("non-empty command");

    let handle = start(&command, &ExecOptions::default(), None);
    let status = with_timeout(handle.wait_complete()).await;

    assert_eq!(status, ProcessStatus::Exited(3));
}

#[tokio::test]
async fn unknown_executable_fails_to_start() {
    init_tracing();
    let command =
        StageCommand::from_raw("definitely-not-a-real-binary-xyz").expect("non-empty command");

    let handle = start(&command, &ExecOptions::default(), None);
    let status = with_timeout(handle.wait_complete()).await;

    assert!(matches!(status, ProcessStatus::FailedToStart(_)));
    assert_eq!(handle.pid(), None);
}

#[cfg(unix)]
#[tokio::test]
async fn stdin_input_reaches_the_child() {
    init_tracing();
    let command = StageCommand::from_raw("cat").expect("non-empty command");
    let options = ExecOptions {
        input: Some(b"ping".to_vec()),
        ..ExecOptions::default()
    };
    let (tx, rx) = mpsc::channel(16);

    let handle = start(&command, &options, Some(tx));
    let status = with_timeout(handle.wait_complete()).await;

    assert_eq!(status, ProcessStatus::Exited(0));
    // No trailing newline: the remainder is flushed at stream end.
    let events = collect_events(rx).await;
    assert_eq!(events, vec![OutputEvent::Stdout("ping".to_string())]);
}

#[cfg(unix)]
#[tokio::test]
async fn relative_paths_resolve_against_the_working_dir() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    common::write_executable(dir.path(), "hello.sh", "#!/bin/sh\necho from-script\n");

    let command = StageCommand::from_raw("./hello.sh").expect("non-empty command");
    let options = ExecOptions::default().with_working_dir(dir.path());
    let (tx, rx) = mpsc::channel(16);

    let handle = start(&command, &options, Some(tx));
    let status = with_timeout(handle.wait_complete()).await;

    assert_eq!(status, ProcessStatus::Exited(0));
    let events = collect_events(rx).await;
    assert!(events.contains(&OutputEvent::Stdout("from-script".to_string())));
}
