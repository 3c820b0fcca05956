use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use stagerun::snapshot::{ArtifactEntry, ArtifactStore, LocalDirArtifactStore};

/// An artifact store that:
/// - delegates to a real directory-backed store
/// - fails the first `fail_lookups` / `fail_uploads` calls with a transient
///   error
/// - records every operation for assertions.
#[derive(Debug)]
pub struct FlakyArtifactStore {
    inner: LocalDirArtifactStore,
    fail_lookups: AtomicU32,
    fail_uploads: AtomicU32,
    pub operations: Arc<Mutex<Vec<String>>>,
}

impl FlakyArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalDirArtifactStore::new(dir),
            fail_lookups: AtomicU32::new(0),
            fail_uploads: AtomicU32::new(0),
            operations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_next_lookups(self, n: u32) -> Self {
        self.fail_lookups.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_next_uploads(self, n: u32) -> Self {
        self.fail_uploads.store(n, Ordering::SeqCst);
        self
    }

    fn record(&self, op: &str) {
        self.operations.lock().unwrap().push(op.to_string());
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ArtifactStore for FlakyArtifactStore {
    fn get_artifact(&self, name: &str) -> Result<Option<ArtifactEntry>> {
        self.record("get_artifact");
        if Self::take_failure(&self.fail_lookups) {
            return Err(anyhow!("injected transient lookup failure"));
        }
        self.inner.get_artifact(name)
    }

    fn download(&self, entry: &ArtifactEntry, dest_dir: &Path) -> Result<PathBuf> {
        self.record("download");
        self.inner.download(entry, dest_dir)
    }

    fn upload(&self, name: &str, archive: &Path, retention_days: u32) -> Result<()> {
        self.record("upload");
        if Self::take_failure(&self.fail_uploads) {
            return Err(anyhow!("injected transient upload failure"));
        }
        self.inner.upload(name, archive, retention_days)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        self.record("delete");
        self.inner.delete(name)
    }
}
