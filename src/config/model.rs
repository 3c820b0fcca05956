// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, StageError};
use crate::proc::ShellKind;
use crate::snapshot::SnapshotConfig;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [stage]
/// key = "build"
/// budget_ms = 3600000
/// shell = "none"
/// run = "cargo build --release"
///
/// [exec]
/// working_dir = "."
/// ignore_exit_codes = [42]
///
/// [snapshot]
/// artifact = "build-workspace"
/// archive_name = "workspace.tar.zst"
/// ```
///
/// `[exec]` and `[snapshot]` are optional; a missing `[snapshot]` section
/// disables snapshots entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Stage identity, budget and commands from `[stage]`.
    pub stage: StageSection,

    /// Execution options from `[exec]`.
    #[serde(default)]
    pub exec: ExecSection,

    /// Snapshot settings from `[snapshot]`.
    #[serde(default)]
    pub snapshot: Option<SnapshotSection>,
}

/// `[stage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StageSection {
    /// Stage key; the persisted deadline variable is derived from this.
    pub key: String,

    /// Wall-clock budget in milliseconds, shared across all phases.
    pub budget_ms: u64,

    /// Shell wrapper: "none", "pwsh", "cmd", "python" or "node".
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Optional before-hook command string.
    #[serde(default)]
    pub before: Option<String>,

    /// Main command string.
    pub run: String,

    /// Optional after-hook command string.
    #[serde(default)]
    pub after: Option<String>,
}

fn default_shell() -> String {
    "none".to_string()
}

/// `[exec]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    #[serde(default)]
    pub fail_on_stderr: bool,

    #[serde(default)]
    pub ignore_exit_codes: Vec<i32>,
}

fn default_working_dir() -> String {
    ".".to_string()
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            fail_on_stderr: false,
            ignore_exit_codes: Vec::new(),
        }
    }
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSection {
    pub artifact: String,

    pub archive_name: String,

    #[serde(default = "default_include")]
    pub include: Vec<String>,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_restore")]
    pub restore: bool,

    /// Archiver executable; anything honouring the 7-Zip flag grammar.
    #[serde(default = "default_archiver")]
    pub archiver: String,

    /// Directory backing the local artifact store.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_retention_days() -> u32 {
    1
}

fn default_restore() -> bool {
    true
}

fn default_archiver() -> String {
    "7z".to_string()
}

fn default_store_dir() -> String {
    ".stagerun/artifacts".to_string()
}

/// Validated, typed configuration used by the rest of the crate.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub key: String,
    pub budget: Duration,
    pub shell: ShellKind,
    pub before: Option<String>,
    pub run: String,
    pub after: Option<String>,
    pub exec: ExecSettings,
    pub snapshot: Option<SnapshotSettings>,
}

/// Typed `[exec]` settings.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    pub working_dir: PathBuf,
    pub fail_on_stderr: bool,
    pub ignore_exit_codes: Vec<i32>,
}

/// Typed `[snapshot]` settings.
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub config: SnapshotConfig,
    pub archiver: String,
    pub store_dir: PathBuf,
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StageError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        crate::config::validate::validate(&raw)?;

        let shell: ShellKind = raw
            .stage
            .shell
            .parse()
            .map_err(StageError::ConfigError)?;

        let snapshot = raw.snapshot.map(|s| SnapshotSettings {
            config: SnapshotConfig {
                artifact: s.artifact,
                archive_name: s.archive_name,
                include: s.include,
                retention_days: s.retention_days,
                restore: s.restore,
            },
            archiver: s.archiver,
            store_dir: PathBuf::from(s.store_dir),
        });

        Ok(ConfigFile {
            key: raw.stage.key,
            budget: Duration::from_millis(raw.stage.budget_ms),
            shell,
            before: raw.stage.before.filter(|s| !s.trim().is_empty()),
            run: raw.stage.run,
            after: raw.stage.after.filter(|s| !s.trim().is_empty()),
            exec: ExecSettings {
                working_dir: PathBuf::from(raw.exec.working_dir),
                fail_on_stderr: raw.exec.fail_on_stderr,
                ignore_exit_codes: raw.exec.ignore_exit_codes,
            },
            snapshot,
        })
    }
}
