mod common;
use crate::common::init_tracing;

use std::path::Path;
use std::time::Duration;

use stagerun::config::{load_and_validate, load_from_path, ConfigFile};
use stagerun::errors::StageError;
use stagerun::proc::ShellKind;
use stagerun::snapshot::MANIFEST_FILE;
use stagerun_test_utils::StageConfigBuilder;

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("Stagerun.toml");
    std::fs::write(&path, contents).expect("writing config file");
    path
}

#[test]
fn minimal_config_gets_defaults() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
[stage]
key = "build"
budget_ms = 3600000
run = "cargo build --release"
"#,
    );

    let cfg = load_and_validate(&path).expect("valid config");
    assert_eq!(cfg.key, "build");
    assert_eq!(cfg.budget, Duration::from_secs(3600));
    assert_eq!(cfg.shell, ShellKind::None);
    assert_eq!(cfg.before, None);
    assert_eq!(cfg.after, None);
    assert_eq!(cfg.exec.working_dir, Path::new("."));
    assert!(!cfg.exec.fail_on_stderr);
    assert!(cfg.exec.ignore_exit_codes.is_empty());
    assert!(cfg.snapshot.is_none());
}

#[test]
fn full_config_parses_every_section() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
[stage]
key = "test"
budget_ms = 600000
shell = "pwsh"
before = "restore-deps.ps1"
run = "run-tests.ps1"
after = "publish-results.ps1"

[exec]
working_dir = "work"
fail_on_stderr = true
ignore_exit_codes = [42, 137]

[snapshot]
artifact = "test-workspace"
archive_name = "workspace.tar.zst"
include = ["src/**", "target/**"]
retention_days = 7
restore = false
archiver = "7zz"
store_dir = "artifacts"
"#,
    );

    let cfg = load_and_validate(&path).expect("valid config");
    assert_eq!(cfg.shell, ShellKind::Pwsh);
    assert_eq!(cfg.before.as_deref(), Some("restore-deps.ps1"));
    assert_eq!(cfg.after.as_deref(), Some("publish-results.ps1"));
    assert_eq!(cfg.exec.working_dir, Path::new("work"));
    assert!(cfg.exec.fail_on_stderr);
    assert_eq!(cfg.exec.ignore_exit_codes, vec![42, 137]);

    let snapshot = cfg.snapshot.expect("snapshot section");
    assert_eq!(snapshot.config.artifact, "test-workspace");
    assert_eq!(snapshot.config.archive_name, "workspace.tar.zst");
    assert_eq!(snapshot.config.include, vec!["src/**", "target/**"]);
    assert_eq!(snapshot.config.retention_days, 7);
    assert!(!snapshot.config.restore);
    assert_eq!(snapshot.archiver, "7zz");
    assert_eq!(snapshot.store_dir, Path::new("artifacts"));
}

#[test]
fn missing_file_is_an_io_error() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_from_path(dir.path().join("absent.toml")).expect_err("missing file");
    assert!(matches!(err, StageError::IoError(_)), "got {err:?}");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_config(dir.path(), "[stage\nkey=");
    let err = load_from_path(&path).expect_err("malformed file");
    assert!(matches!(err, StageError::TomlError(_)), "got {err:?}");
}

#[test]
fn unknown_shell_is_rejected() {
    init_tracing();
    let raw = StageConfigBuilder::new("build", "make")
        .with_shell("fish")
        .build_raw();
    let err = ConfigFile::try_from(raw).expect_err("unknown shell");
    match err {
        StageError::ConfigError(msg) => assert!(msg.contains("fish"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn zero_budget_is_rejected() {
    init_tracing();
    let raw = StageConfigBuilder::new("build", "make")
        .with_budget_ms(0)
        .build_raw();
    let err = ConfigFile::try_from(raw).expect_err("zero budget");
    match err {
        StageError::ConfigError(msg) => assert!(msg.contains("budget_ms"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn empty_run_command_is_rejected() {
    init_tracing();
    let raw = StageConfigBuilder::new("build", "   ").build_raw();
    let err = ConfigFile::try_from(raw).expect_err("empty run");
    match err {
        StageError::ConfigError(msg) => assert!(msg.contains("run"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn empty_stage_key_is_rejected() {
    init_tracing();
    let raw = StageConfigBuilder::new("", "make").build_raw();
    let err = ConfigFile::try_from(raw).expect_err("empty key");
    match err {
        StageError::ConfigError(msg) => assert!(msg.contains("key"), "message: {msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn archive_name_may_not_shadow_the_manifest() {
    init_tracing();
    let raw = StageConfigBuilder::new("build", "make")
        .with_snapshot("cache", MANIFEST_FILE, "7z")
        .build_raw();
    let err = ConfigFile::try_from(raw).expect_err("archive shadows manifest");
    match err {
        StageError::ConfigError(msg) => {
            assert!(msg.contains(MANIFEST_FILE), "message: {msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn invalid_include_pattern_is_rejected() {
    init_tracing();
    let raw = StageConfigBuilder::new("build", "make")
        .with_snapshot("cache", "cache.tar.zst", "7z")
        .with_include(vec!["src/[invalid"])
        .build_raw();
    let err = ConfigFile::try_from(raw).expect_err("bad glob");
    assert!(matches!(err, StageError::ConfigError(_)), "got {err:?}");
}

#[test]
fn blank_hooks_are_dropped_during_conversion() {
    init_tracing();
    let raw = StageConfigBuilder::new("build", "make")
        .with_before("  ")
        .with_after("")
        .build_raw();
    let cfg = ConfigFile::try_from(raw).expect("valid config");
    assert_eq!(cfg.before, None);
    assert_eq!(cfg.after, None);
}
