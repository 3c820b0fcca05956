mod common;
use crate::common::{init_tracing, with_timeout};

use std::time::{Duration, Instant, SystemTime};

use stagerun::deadline::executor::{run_with_deadline, DeadlinePolicy, ExecOutcome};
use stagerun::proc::{Deadline, ExecOptions, StageCommand};

fn fast_policy() -> DeadlinePolicy {
    DeadlinePolicy {
        settle: Duration::from_millis(100),
        interrupt_attempts: 3,
        interrupt_grace: Duration::from_millis(500),
        final_wait: Duration::from_millis(300),
    }
}

#[tokio::test]
async fn passing_command_without_deadline_succeeds() {
    init_tracing();
    let command = StageCommand::from_raw(r#"echo "hello world""#).expect("non-empty command");

    let outcome = with_timeout(run_with_deadline(
        &command,
        &ExecOptions::default(),
        None,
        &DeadlinePolicy::default(),
    ))
    .await;

    assert_eq!(outcome, ExecOutcome::Success);
}

#[cfg(unix)]
#[tokio::test]
async fn sleeping_command_times_out_and_is_terminated() {
    init_tracing();
    let command = StageCommand::from_raw("sleep 5").expect("non-empty command");
    let options = ExecOptions::default().with_deadline(Deadline::In(Duration::from_millis(50)));

    let started = Instant::now();
    let outcome = with_timeout(run_with_deadline(
        &command,
        &options,
        None,
        &fast_policy(),
    ))
    .await;
    let elapsed = started.elapsed();

    assert!(outcome.is_timed_out(), "got {outcome:?}");
    // `sleep` dies on the first SIGINT; the escalation must have returned
    // long before the 5s sleep would have finished.
    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
}

#[tokio::test]
async fn exhausted_budget_times_out_without_spawning() {
    init_tracing();
    let command = StageCommand::from_raw("echo never-runs").expect("non-empty command");
    let options = ExecOptions::default()
        .with_deadline(Deadline::At(SystemTime::now() - Duration::from_secs(1)));

    let outcome = with_timeout(run_with_deadline(
        &command,
        &options,
        None,
        &DeadlinePolicy::default(),
    ))
    .await;

    match outcome {
        ExecOutcome::TimedOut(reason) => assert!(reason.contains("echo never-runs")),
        other => panic!("expected TimedOut, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn ignored_exit_code_is_not_a_failure() {
    init_tracing();
    let command = StageCommand::from_raw(r#"sh -c "exit 42""#).expect("non-empty command");
    let options = ExecOptions {
        ignore_exit_codes: vec![42],
        ..ExecOptions::default()
    };

    let outcome = with_timeout(run_with_deadline(
        &command,
        &options,
        None,
        &DeadlinePolicy::default(),
    ))
    .await;

    // Ignored codes land in the timed-out bucket, never in failure.
    assert!(!outcome.is_failure(), "got {outcome:?}");
    assert!(outcome.is_timed_out(), "got {outcome:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn unignored_exit_code_fails_with_command_and_code() {
    init_tracing();
    let command = StageCommand::from_raw(r#"sh -c "exit 42""#).expect("non-empty command");

    let outcome = with_timeout(run_with_deadline(
        &command,
        &ExecOptions::default(),
        None,
        &DeadlinePolicy::default(),
    ))
    .await;

    match outcome {
        ExecOutcome::Failure(reason) => {
            assert!(reason.contains("exit 42"), "reason: {reason}");
            assert!(reason.contains("42"), "reason: {reason}");
        }
        other => panic!("expected Failure, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn stderr_output_fails_when_configured() {
    init_tracing();
    let command =
        StageCommand::from_raw(r#"sh -c "echo warning 1>&2""#).expect("non-empty command");
    let options = ExecOptions {
        fail_on_stderr: true,
        ..ExecOptions::default()
    };

    let outcome = with_timeout(run_with_deadline(
        &command,
        &options,
        None,
        &DeadlinePolicy::default(),
    ))
    .await;

    assert!(outcome.is_failure(), "got {outcome:?}");
}

#[tokio::test]
async fn spawn_refusal_maps_to_failure() {
    init_tracing();
    let command =
        StageCommand::from_raw("definitely-not-a-real-binary-xyz").expect("non-empty command");

    let outcome = with_timeout(run_with_deadline(
        &command,
        &ExecOptions::default(),
        None,
        &DeadlinePolicy::default(),
    ))
    .await;

    match outcome {
        ExecOutcome::Failure(reason) => {
            assert!(reason.contains("failed to start"), "reason: {reason}");
        }
        other => panic!("expected Failure, got {other:?}"),
    }
}

/// A process that ignores graceful interrupts must receive all interrupt
/// attempts and sit through the grace windows before the hard kill.
#[cfg(unix)]
#[tokio::test]
async fn escalation_sends_all_interrupts_before_killing() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("interrupts.log");
    let script = common::write_executable(
        dir.path(),
        "stubborn.sh",
        r#"#!/bin/sh
trap 'echo int >> "$1"' INT
i=0
while [ $i -lt 200 ]; do
  sleep 0.1
  i=$((i+1))
done
"#,
    );

    let command = StageCommand::new(
        script.to_string_lossy().into_owned(),
        vec![marker.to_string_lossy().into_owned()],
    );
    let policy = fast_policy();
    let options = ExecOptions::default().with_deadline(Deadline::In(Duration::from_millis(100)));

    let started = Instant::now();
    let outcome = with_timeout(run_with_deadline(&command, &options, None, &policy)).await;
    let elapsed = started.elapsed();

    assert!(outcome.is_timed_out(), "got {outcome:?}");

    let recorded = std::fs::read_to_string(&marker).unwrap_or_default();
    let interrupts = recorded.lines().count();
    assert_eq!(interrupts, 3, "log: {recorded:?}");

    // Never hard-killed before the settle window, all interrupt attempts and
    // their grace intervals have elapsed.
    let escalation_floor = policy.settle
        + policy.interrupt_grace * policy.interrupt_attempts
        + policy.final_wait;
    assert!(
        elapsed >= escalation_floor,
        "escalated too early: {elapsed:?} < {escalation_floor:?}"
    );
    // And the 20s loop clearly did not run to completion.
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
}
