// src/lib.rs

pub mod cli;
pub mod cmdline;
pub mod config;
pub mod deadline;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod proc;
pub mod snapshot;
pub mod stage;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::ConfigFile;
use crate::deadline::executor::DeadlinePolicy;
use crate::deadline::ledger::EnvKvStore;
use crate::fs::RealFileSystem;
use crate::proc::runner::OutputEvent;
use crate::snapshot::{LocalDirArtifactStore, RetryPolicy};
use crate::stage::{run_stage, StageContext, StageReport};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the environment-backed deadline ledger
/// - the local artifact store (when snapshots are configured)
/// - the deadline-aware executor, with child output forwarded to our own
///   stdout/stderr
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let kv = EnvKvStore;
    let fs = RealFileSystem;
    let store = cfg
        .snapshot
        .as_ref()
        .map(|s| LocalDirArtifactStore::new(&s.store_dir));

    // Forward child output lines to our own streams as they arrive.
    let (output_tx, mut output_rx) = mpsc::channel::<OutputEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = output_rx.recv().await {
            match event {
                OutputEvent::Stdout(line) => println!("{line}"),
                OutputEvent::Stderr(line) => eprintln!("{line}"),
            }
        }
    });

    let report = run_stage(StageContext {
        config: &cfg,
        kv: &kv,
        fs: &fs,
        store: store.as_ref().map(|s| s as &dyn snapshot::ArtifactStore),
        policy: DeadlinePolicy::default(),
        retry: RetryPolicy::default(),
        output_tx: Some(output_tx),
        phase_filter: args.phase.map(Into::into),
    })
    .await?;

    let _ = printer.await;

    print_report(&cfg, &report);

    if let Some(failed) = report.first_failure() {
        bail!(
            "stage '{}' {} phase: {}",
            cfg.key,
            failed.phase,
            failed.outcome
        );
    }
    Ok(())
}

fn print_report(cfg: &ConfigFile, report: &StageReport) {
    println!("stage '{}':", cfg.key);
    if report.restored {
        println!("  restored snapshot");
    }
    for phase in &report.phases {
        println!("  {}: {}", phase.phase, phase.outcome);
    }
    if report.snapshot_saved {
        println!("  snapshot saved for the next invocation");
    }
    if report.timed_out() {
        info!(stage = %cfg.key, "stage timed out; progress preserved in snapshot");
    }
}

/// Simple dry-run output: print the resolved stage without executing.
fn print_dry_run(cfg: &ConfigFile) {
    println!("stagerun dry-run");
    println!("  stage.key = {}", cfg.key);
    println!("  stage.budget_ms = {}", cfg.budget.as_millis());
    println!("  stage.shell = {:?}", cfg.shell);
    if let Some(before) = &cfg.before {
        println!("  before: {before}");
    }
    println!("  run: {}", cfg.run);
    if let Some(after) = &cfg.after {
        println!("  after: {after}");
    }
    println!("  exec.working_dir = {}", cfg.exec.working_dir.display());
    println!("  exec.fail_on_stderr = {}", cfg.exec.fail_on_stderr);
    if !cfg.exec.ignore_exit_codes.is_empty() {
        println!(
            "  exec.ignore_exit_codes = {:?}",
            cfg.exec.ignore_exit_codes
        );
    }
    if let Some(snapshot) = &cfg.snapshot {
        println!("  snapshot.artifact = {}", snapshot.config.artifact);
        println!("  snapshot.archive_name = {}", snapshot.config.archive_name);
        println!("  snapshot.include = {:?}", snapshot.config.include);
        println!("  snapshot.restore = {}", snapshot.config.restore);
        println!("  snapshot.store_dir = {}", snapshot.store_dir.display());
    }
}
