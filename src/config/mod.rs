// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] maps the TOML file to raw serde structs and converts them
//!   into the validated [`model::ConfigFile`].
//! - [`loader`] reads and parses a config file from disk.
//! - [`validate`] performs the semantic checks the raw parse cannot.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ExecSection, ExecSettings, RawConfigFile, SnapshotSection, SnapshotSettings,
    StageSection,
};
