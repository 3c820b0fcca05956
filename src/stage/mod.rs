// src/stage/mod.rs

//! Stage orchestration.
//!
//! A stage is one phase of a CI job: before-hook, main command or
//! after-hook. All phases share one wall-clock budget through the persisted
//! deadline, whether they run sequentially in one invocation or as separate
//! processes re-invoked by the CI provider.
//!
//! Control flow per invocation:
//!
//! 1. the timeout ledger establishes or reads the stage deadline,
//! 2. the snapshot manager optionally restores a prior snapshot,
//! 3. each selected phase runs through the deadline-aware executor,
//! 4. a timed-out main phase saves a snapshot before the stage exits.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::deadline::executor::{run_with_deadline, DeadlinePolicy, ExecOutcome};
use crate::deadline::ledger::{KvStore, StageTimeoutLedger};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::proc::runner::OutputEvent;
use crate::proc::{Deadline, ExecOptions};
use crate::snapshot::{Archiver, ArtifactStore, RetryPolicy, SnapshotManager};

/// One phase of a CI job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    Before,
    Main,
    After,
}

impl StagePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagePhase::Before => "before",
            StagePhase::Main => "main",
            StagePhase::After => "after",
        }
    }
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub phase: StagePhase,
    pub outcome: ExecOutcome,
}

/// What one stage invocation did.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub phases: Vec<PhaseResult>,
    pub restored: bool,
    pub snapshot_saved: bool,
}

impl StageReport {
    pub fn outcome_of(&self, phase: StagePhase) -> Option<&ExecOutcome> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| &p.outcome)
    }

    /// First hard failure, if any. Timed-out phases are not failures; they
    /// leave a snapshot behind so a later invocation can resume.
    pub fn first_failure(&self) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.outcome.is_failure())
    }

    pub fn timed_out(&self) -> bool {
        self.phases.iter().any(|p| p.outcome.is_timed_out())
    }
}

/// Everything one stage invocation needs, with the seams injected.
pub struct StageContext<'a> {
    pub config: &'a ConfigFile,
    pub kv: &'a dyn KvStore,
    pub fs: &'a dyn FileSystem,
    pub store: Option<&'a dyn ArtifactStore>,
    pub policy: DeadlinePolicy,
    pub retry: RetryPolicy,
    pub output_tx: Option<mpsc::Sender<OutputEvent>>,
    /// Run only this phase (the per-phase re-invocation model); `None` runs
    /// all configured phases sequentially.
    pub phase_filter: Option<StagePhase>,
}

/// Run one stage invocation.
pub async fn run_stage(ctx: StageContext<'_>) -> Result<StageReport> {
    let cfg = ctx.config;

    let ledger = StageTimeoutLedger::new(ctx.kv);
    let deadline = ledger.get_or_set_deadline(&cfg.key, cfg.budget);

    let manager = match (&cfg.snapshot, ctx.store) {
        (Some(settings), Some(store)) => Some(SnapshotManager::new(
            cfg.exec.working_dir.clone(),
            settings.config.clone(),
            ctx.fs,
            store,
            Archiver::new(&settings.archiver),
            ctx.retry,
        )),
        (Some(_), None) => {
            warn!("snapshot configured but no artifact store bound; snapshots disabled");
            None
        }
        _ => None,
    };

    let mut report = StageReport::default();

    // Restore belongs to the start of the stage: the full run, or the
    // before-hook invocation in the per-phase model.
    let restore_wanted = cfg.snapshot.as_ref().is_some_and(|s| s.config.restore)
        && matches!(ctx.phase_filter, None | Some(StagePhase::Before));
    if restore_wanted {
        if let Some(manager) = &manager {
            report.restored = manager.restore().await?;
        }
    }

    let phases: [(StagePhase, Option<&str>); 3] = [
        (StagePhase::Before, cfg.before.as_deref()),
        (StagePhase::Main, Some(cfg.run.as_str())),
        (StagePhase::After, cfg.after.as_deref()),
    ];

    let mut before_failed = false;
    for (phase, script) in phases {
        if ctx
            .phase_filter
            .is_some_and(|selected| selected != phase)
        {
            continue;
        }

        // A failed before-hook skips the main command; the after-hook still
        // runs as cleanup.
        if phase == StagePhase::Main && before_failed {
            info!(phase = %phase, "skipped: before-hook failed");
            report.phases.push(PhaseResult {
                phase,
                outcome: ExecOutcome::Skipped,
            });
            continue;
        }

        let outcome = match script {
            None => ExecOutcome::Skipped,
            Some(script) => match cfg.shell.wrap(script) {
                None => ExecOutcome::Skipped,
                Some(command) => {
                    let options = ExecOptions {
                        working_dir: Some(cfg.exec.working_dir.clone()),
                        fail_on_stderr: cfg.exec.fail_on_stderr,
                        ignore_exit_codes: cfg.exec.ignore_exit_codes.clone(),
                        deadline: Some(Deadline::At(deadline)),
                        ..ExecOptions::default()
                    };
                    info!(phase = %phase, command = %command.display_line(), "running phase");
                    run_with_deadline(&command, &options, ctx.output_tx.clone(), &ctx.policy).await
                }
            },
        };

        info!(phase = %phase, outcome = ?outcome, "phase finished");

        if phase == StagePhase::Before && outcome.is_failure() {
            before_failed = true;
        }

        // Preserve partial progress across the timeout boundary.
        if phase == StagePhase::Main && outcome.is_timed_out() {
            if let Some(manager) = &manager {
                manager.save().await?;
                report.snapshot_saved = true;
            }
        }

        report.phases.push(PhaseResult { phase, outcome });
    }

    Ok(report)
}
