#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub use stagerun_test_utils::{init_tracing, with_timeout};

/// Write an executable script into `dir` and return its path.
pub fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("writing script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("marking script executable");
    }
    path
}

/// A stand-in archiver honouring the 7-Zip flag grammar, backed by `tar`.
///
/// Supports exactly the two invocations the snapshot manager issues:
/// `a <archive> -m0=zstd -mx2 @<manifest> -x!...` and `x -y <archive>`.
pub fn stub_archiver(dir: &Path) -> PathBuf {
    write_executable(
        dir,
        "stub7z.sh",
        r#"#!/bin/sh
set -e
mode="$1"; shift
case "$mode" in
  a)
    archive="$1"; shift
    manifest=""
    for arg in "$@"; do
      case "$arg" in
        @*) manifest="${arg#@}" ;;
      esac
    done
    tar -czf "$archive" -T "$manifest"
    ;;
  x)
    for arg in "$@"; do
      case "$arg" in
        -*) ;;
        *) tar -xzf "$arg" ;;
      esac
    done
    ;;
  *)
    echo "unsupported archiver mode: $mode" >&2
    exit 7
    ;;
esac
"#,
    )
}
