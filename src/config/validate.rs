// src/config/validate.rs

use globset::Glob;

use crate::config::model::RawConfigFile;
use crate::errors::{Result, StageError};
use crate::proc::ShellKind;
use crate::snapshot::MANIFEST_FILE;

/// Semantic checks beyond what the TOML parse enforces.
pub fn validate(cfg: &RawConfigFile) -> Result<()> {
    validate_stage(cfg)?;
    validate_snapshot(cfg)?;
    Ok(())
}

fn validate_stage(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stage.key.trim().is_empty() {
        return Err(StageError::ConfigError(
            "[stage].key must not be empty".to_string(),
        ));
    }

    if cfg.stage.budget_ms == 0 {
        return Err(StageError::ConfigError(
            "[stage].budget_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.stage.run.trim().is_empty() {
        return Err(StageError::ConfigError(
            "[stage].run must not be empty".to_string(),
        ));
    }

    cfg.stage
        .shell
        .parse::<ShellKind>()
        .map_err(StageError::ConfigError)?;

    Ok(())
}

fn validate_snapshot(cfg: &RawConfigFile) -> Result<()> {
    let Some(snapshot) = &cfg.snapshot else {
        return Ok(());
    };

    if snapshot.artifact.trim().is_empty() {
        return Err(StageError::ConfigError(
            "[snapshot].artifact must not be empty".to_string(),
        ));
    }

    if snapshot.archive_name.trim().is_empty() {
        return Err(StageError::ConfigError(
            "[snapshot].archive_name must not be empty".to_string(),
        ));
    }

    if snapshot.archive_name == MANIFEST_FILE {
        return Err(StageError::ConfigError(format!(
            "[snapshot].archive_name must not be the manifest file name ({MANIFEST_FILE})"
        )));
    }

    if snapshot.include.is_empty() {
        return Err(StageError::ConfigError(
            "[snapshot].include must contain at least one pattern".to_string(),
        ));
    }

    for pattern in &snapshot.include {
        Glob::new(pattern).map_err(|e| {
            StageError::ConfigError(format!("invalid [snapshot].include pattern {pattern:?}: {e}"))
        })?;
    }

    Ok(())
}
