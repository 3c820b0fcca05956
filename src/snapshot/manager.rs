// src/snapshot/manager.rs

//! Save/restore of workspace snapshots with manifest bookkeeping.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use crate::errors::{Result, StageError};
use crate::fs::FileSystem;
use crate::snapshot::archiver::{ArchiveErrorClass, Archiver};
use crate::snapshot::store::{ArtifactEntry, ArtifactStore};

/// Side file listing the archived paths, one per line, relative to the root.
///
/// Written before archiving, excluded from the archive, and deleted on every
/// exit path of both `save` and `restore` so it never leaks into the
/// workspace.
pub const MANIFEST_FILE: &str = "snapshot-manifest.txt";

/// Bounded retry for transient store/archiver failures.
///
/// Fixed delay, no backoff: contention is rare (single job, single archive).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(10),
        }
    }
}

/// Snapshot settings from the `[snapshot]` config section.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Logical artifact name in the store.
    pub artifact: String,
    /// In-archive file name (also the local archive file name).
    pub archive_name: String,
    /// Include patterns, relative to the root.
    pub include: Vec<String>,
    /// Retention period passed to the store on upload.
    pub retention_days: u32,
    /// Whether `run_stage` should attempt a restore before running.
    pub restore: bool,
}

/// Archives/restores the workspace around a timeout boundary.
#[derive(Debug)]
pub struct SnapshotManager<'a> {
    root: PathBuf,
    config: SnapshotConfig,
    fs: &'a dyn FileSystem,
    store: &'a dyn ArtifactStore,
    archiver: Archiver,
    retry: RetryPolicy,
}

impl<'a> SnapshotManager<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        config: SnapshotConfig,
        fs: &'a dyn FileSystem,
        store: &'a dyn ArtifactStore,
        archiver: Archiver,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            fs,
            store,
            archiver,
            retry,
        }
    }

    /// Restore the named artifact into the root, if it exists.
    ///
    /// Returns `true` when something was restored. A missing artifact is not
    /// an error. Extraction retries only the transient "file in use" class;
    /// any other archiver failure aborts immediately.
    pub async fn restore(&self) -> Result<bool> {
        let Some(entry) = self.probe_artifact().await? else {
            info!(artifact = %self.config.artifact, "no snapshot artifact; nothing to restore");
            return Ok(false);
        };

        info!(
            artifact = %entry.name,
            file = %entry.file_name,
            "restoring snapshot"
        );
        let archive = self
            .store
            .download(&entry, &self.root)
            .with_context(|| format!("downloading artifact {}", entry.name))?;

        let result = self.extract_with_retry(&archive).await;

        // The manifest travels inside older archives from interrupted saves;
        // extraction may have re-created it in the root.
        let manifest = self.root.join(MANIFEST_FILE);
        if self.fs.exists(&manifest) {
            if let Err(e) = self.fs.remove_file(&manifest) {
                warn!(error = %e, "failed to remove restored manifest file");
            }
        }
        result?;

        self.fs
            .remove_file(&archive)
            .with_context(|| format!("removing extracted archive {:?}", archive))?;
        Ok(true)
    }

    /// Archive the matched workspace files and upload them under the
    /// configured artifact name.
    ///
    /// The manifest file is removed on every exit path.
    pub async fn save(&self) -> Result<()> {
        let files = self.matched_files()?;
        if files.is_empty() {
            warn!(
                root = %self.root.display(),
                "no files matched the snapshot include patterns; skipping save"
            );
            return Ok(());
        }

        let manifest = self.root.join(MANIFEST_FILE);
        let mut listing = files.join("\n");
        listing.push('\n');
        self.fs
            .write(&manifest, listing.as_bytes())
            .with_context(|| format!("writing manifest {:?}", manifest))?;

        let result = self.archive_and_upload().await;

        if self.fs.exists(&manifest) {
            if let Err(e) = self.fs.remove_file(&manifest) {
                warn!(error = %e, "failed to remove manifest file");
            }
        }
        result
    }

    async fn archive_and_upload(&self) -> Result<()> {
        info!(
            artifact = %self.config.artifact,
            archive = %self.config.archive_name,
            "saving snapshot"
        );
        self.archiver
            .create(&self.config.archive_name, MANIFEST_FILE, &self.root)
            .await
            .map_err(|f| StageError::ArchiverError {
                action: "creation".to_string(),
                detail: f.detail,
            })?;

        // Replace any earlier snapshot of the same name; absence is fine.
        let existed = self
            .store
            .delete(&self.config.artifact)
            .with_context(|| format!("deleting artifact {}", self.config.artifact))?;
        if existed {
            debug!(artifact = %self.config.artifact, "deleted pre-existing artifact");
        }

        let archive = self.root.join(&self.config.archive_name);
        self.upload_with_retry(&archive).await
    }

    /// Probe the store for the artifact with a single bounded retry loop.
    async fn probe_artifact(&self) -> Result<Option<ArtifactEntry>> {
        let mut last_err = String::new();
        for attempt in 1..=self.retry.attempts {
            match self.store.get_artifact(&self.config.artifact) {
                Ok(entry) => return Ok(entry),
                Err(e) => {
                    warn!(
                        artifact = %self.config.artifact,
                        attempt,
                        error = %e,
                        "artifact lookup failed; retrying"
                    );
                    last_err = e.to_string();
                }
            }
            if attempt < self.retry.attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }
        Err(StageError::TransientIoError {
            attempts: self.retry.attempts,
            detail: format!("artifact lookup: {last_err}"),
        })
    }

    async fn extract_with_retry(&self, archive: &Path) -> Result<()> {
        for attempt in 1..=self.retry.attempts {
            match self.archiver.extract(archive, &self.root).await {
                Ok(()) => return Ok(()),
                Err(f) if f.class == ArchiveErrorClass::Transient => {
                    warn!(
                        attempt,
                        detail = %f.detail,
                        "transient extraction failure; retrying"
                    );
                    if attempt == self.retry.attempts {
                        return Err(StageError::TransientIoError {
                            attempts: self.retry.attempts,
                            detail: f.detail,
                        });
                    }
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(f) => {
                    return Err(StageError::ArchiverError {
                        action: "extraction".to_string(),
                        detail: f.detail,
                    });
                }
            }
        }
        unreachable!("retry loop always returns");
    }

    async fn upload_with_retry(&self, archive: &Path) -> Result<()> {
        let mut last_err = String::new();
        for attempt in 1..=self.retry.attempts {
            match self
                .store
                .upload(&self.config.artifact, archive, self.config.retention_days)
            {
                Ok(()) => {
                    info!(artifact = %self.config.artifact, "snapshot uploaded");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        artifact = %self.config.artifact,
                        attempt,
                        error = %e,
                        "upload failed; retrying"
                    );
                    last_err = e.to_string();
                }
            }
            if attempt < self.retry.attempts {
                tokio::time::sleep(self.retry.delay).await;
            }
        }
        Err(StageError::TransientIoError {
            attempts: self.retry.attempts,
            detail: format!("artifact upload: {last_err}"),
        })
    }

    /// Walk the root and return the include-matched paths, relative to the
    /// root, with the manifest and the archive itself excluded.
    fn matched_files(&self) -> Result<Vec<String>> {
        let globs = build_globset(&self.config.include)?;
        let mut matched = Vec::new();
        self.walk(&self.root, &globs, &mut matched)?;
        matched.sort();
        Ok(matched)
    }

    fn walk(&self, dir: &Path, globs: &GlobSet, out: &mut Vec<String>) -> Result<()> {
        for entry in self.fs.read_dir(dir).map_err(StageError::Other)? {
            if self.fs.is_dir(&entry) {
                self.walk(&entry, globs, out)?;
                continue;
            }
            let Ok(relative) = entry.strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if relative == MANIFEST_FILE || relative == self.config.archive_name {
                continue;
            }
            if globs.is_match(&relative) {
                out.push(relative);
            }
        }
        Ok(())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| StageError::ConfigError(format!("invalid include pattern {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| StageError::ConfigError(format!("building include patterns: {e}")))
}
