// src/snapshot/mod.rs

//! Workspace snapshots around a timeout boundary.
//!
//! A snapshot is a compressed archive of the workspace's matched files,
//! keyed by a logical artifact name. It preserves partial build progress when
//! a stage times out, so a later invocation can resume where it left off.
//!
//! - [`archiver`] wraps the external 7-Zip-compatible CLI (fixed flag
//!   grammar, exit-code meanings, transient-error detection).
//! - [`store`] is the artifact store seam: production binds a remote client
//!   (out of scope here), tests and local runs use a directory-backed store.
//! - [`manager`] implements `save`/`restore` with manifest bookkeeping and
//!   bounded retry.

pub mod archiver;
pub mod manager;
pub mod store;

pub use archiver::Archiver;
pub use manager::{RetryPolicy, SnapshotConfig, SnapshotManager, MANIFEST_FILE};
pub use store::{ArtifactEntry, ArtifactStore, LocalDirArtifactStore};
