// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::stage::StagePhase;

/// Command-line arguments for `stagerun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stagerun",
    version,
    about = "Run staged build commands under a shared wall-clock budget.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Stagerun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Stagerun.toml")]
    pub config: String,

    /// Run only a single phase of the stage.
    ///
    /// CI providers re-invoke the orchestrator as a fresh process per phase
    /// (before-hook, main, after-hook); all phases share one wall-clock
    /// budget via the persisted deadline. Without this flag all configured
    /// phases run sequentially in-process.
    #[arg(long, value_enum, value_name = "PHASE")]
    pub phase: Option<PhaseArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STAGERUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved stage, but don't execute
    /// any commands.
    #[arg(long)]
    pub dry_run: bool,
}

/// Phase selector as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum PhaseArg {
    Before,
    Main,
    After,
}

impl From<PhaseArg> for StagePhase {
    fn from(p: PhaseArg) -> Self {
        match p {
            PhaseArg::Before => StagePhase::Before,
            PhaseArg::Main => StagePhase::Main,
            PhaseArg::After => StagePhase::After,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
