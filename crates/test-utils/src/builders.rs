#![allow(dead_code)]

use stagerun::config::{ConfigFile, ExecSection, RawConfigFile, SnapshotSection, StageSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct StageConfigBuilder {
    raw: RawConfigFile,
}

impl StageConfigBuilder {
    pub fn new(key: &str, run: &str) -> Self {
        Self {
            raw: RawConfigFile {
                stage: StageSection {
                    key: key.to_string(),
                    budget_ms: 60_000,
                    shell: "none".to_string(),
                    before: None,
                    run: run.to_string(),
                    after: None,
                },
                exec: ExecSection::default(),
                snapshot: None,
            },
        }
    }

    pub fn with_budget_ms(mut self, budget_ms: u64) -> Self {
        self.raw.stage.budget_ms = budget_ms;
        self
    }

    pub fn with_before(mut self, before: &str) -> Self {
        self.raw.stage.before = Some(before.to_string());
        self
    }

    pub fn with_after(mut self, after: &str) -> Self {
        self.raw.stage.after = Some(after.to_string());
        self
    }

    pub fn with_shell(mut self, shell: &str) -> Self {
        self.raw.stage.shell = shell.to_string();
        self
    }

    pub fn with_working_dir(mut self, dir: &str) -> Self {
        self.raw.exec.working_dir = dir.to_string();
        self
    }

    pub fn with_fail_on_stderr(mut self) -> Self {
        self.raw.exec.fail_on_stderr = true;
        self
    }

    pub fn with_ignore_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.raw.exec.ignore_exit_codes = codes;
        self
    }

    /// Enable snapshots with a stub archiver program and sensible defaults.
    pub fn with_snapshot(mut self, artifact: &str, archive_name: &str, archiver: &str) -> Self {
        self.raw.snapshot = Some(SnapshotSection {
            artifact: artifact.to_string(),
            archive_name: archive_name.to_string(),
            include: vec!["**/*".to_string()],
            retention_days: 1,
            restore: true,
            archiver: archiver.to_string(),
            store_dir: ".stagerun/artifacts".to_string(),
        });
        self
    }

    pub fn with_include(mut self, patterns: Vec<&str>) -> Self {
        if let Some(snapshot) = &mut self.raw.snapshot {
            snapshot.include = patterns.into_iter().map(String::from).collect();
        }
        self
    }

    pub fn with_restore(mut self, restore: bool) -> Self {
        if let Some(snapshot) = &mut self.raw.snapshot {
            snapshot.restore = restore;
        }
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.raw).expect("builder produced invalid config")
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.raw
    }
}
