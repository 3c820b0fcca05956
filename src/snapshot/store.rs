// src/snapshot/store.rs

//! Artifact store seam.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// A stored artifact: logical name plus the in-archive file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub name: String,
    pub file_name: String,
}

/// Storage for named snapshot artifacts.
///
/// A missing artifact is never an error: lookups return `None` and deletes
/// return `false`. Errors are reserved for the transient I/O class that the
/// snapshot manager retries.
pub trait ArtifactStore: Send + Sync + Debug {
    /// Look up an artifact by name.
    fn get_artifact(&self, name: &str) -> Result<Option<ArtifactEntry>>;

    /// Download an artifact's archive file into `dest_dir`; returns the
    /// downloaded path.
    fn download(&self, entry: &ArtifactEntry, dest_dir: &Path) -> Result<PathBuf>;

    /// Upload an archive file under the given artifact name.
    fn upload(&self, name: &str, archive: &Path, retention_days: u32) -> Result<()>;

    /// Delete an artifact. Returns `false` when it did not exist.
    fn delete(&self, name: &str) -> Result<bool>;
}

/// Directory-backed artifact store for tests and local runs.
///
/// Layout: `<dir>/<artifact-name>/<file-name>`.
#[derive(Debug, Clone)]
pub struct LocalDirArtifactStore {
    dir: PathBuf,
}

impl LocalDirArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl ArtifactStore for LocalDirArtifactStore {
    fn get_artifact(&self, name: &str) -> Result<Option<ArtifactEntry>> {
        let dir = self.artifact_dir(name);
        if !dir.is_dir() {
            return Ok(None);
        }
        let entry = fs::read_dir(&dir)
            .with_context(|| format!("reading artifact dir {:?}", dir))?
            .filter_map(|e| e.ok())
            .find(|e| e.path().is_file());
        Ok(entry.map(|e| ArtifactEntry {
            name: name.to_string(),
            file_name: e.file_name().to_string_lossy().into_owned(),
        }))
    }

    fn download(&self, entry: &ArtifactEntry, dest_dir: &Path) -> Result<PathBuf> {
        let src = self.artifact_dir(&entry.name).join(&entry.file_name);
        let dest = dest_dir.join(&entry.file_name);
        fs::copy(&src, &dest)
            .with_context(|| format!("downloading artifact {:?} to {:?}", src, dest))?;
        Ok(dest)
    }

    fn upload(&self, name: &str, archive: &Path, _retention_days: u32) -> Result<()> {
        let dir = self.artifact_dir(name);
        fs::create_dir_all(&dir).with_context(|| format!("creating artifact dir {:?}", dir))?;
        let file_name = archive
            .file_name()
            .with_context(|| format!("archive path has no file name: {:?}", archive))?;
        fs::copy(archive, dir.join(file_name))
            .with_context(|| format!("uploading archive {:?}", archive))?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.artifact_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).with_context(|| format!("deleting artifact {:?}", dir))?;
        Ok(true)
    }
}
