// src/proc/command.rs

//! Command construction: raw-string <-> argv conversion, executable
//! resolution and shell wrapper selection.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::cmdline::{join, quote, tokenize, QuoteDialect};

/// An executable plus its ordered arguments.
///
/// The optional raw form is kept only for display; conversions between the
/// raw string and argv always go through [`tokenize`] / [`join`].
#[derive(Debug, Clone)]
pub struct StageCommand {
    program: String,
    args: Vec<String>,
    raw: Option<String>,
}

impl StageCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            raw: None,
        }
    }

    /// Build a command from a raw shell-like string.
    ///
    /// Returns `None` when the string tokenizes to nothing.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let mut argv = tokenize(raw);
        if argv.is_empty() {
            return None;
        }
        let program = argv.remove(0);
        Some(Self {
            program,
            args: argv,
            raw: Some(raw.to_string()),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Human-readable command line for logs and failure messages.
    pub fn display_line(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => {
                let mut parts = vec![self.program.clone()];
                parts.extend(self.args.iter().cloned());
                join(parts, QuoteDialect::Posix)
            }
        }
    }

    /// Resolve the final (file name, argv) pair to hand to the OS.
    ///
    /// - A bare name is searched on `PATH`; a relative path is rooted at
    ///   `working_dir`.
    /// - `.cmd`/`.bat` files cannot be spawned directly on Windows; they are
    ///   routed through `cmd.exe /D /S /C "<line>"` with the line quoted in
    ///   the `cmd.exe` dialect.
    pub fn spawn_spec(&self, working_dir: &Path) -> Result<(PathBuf, Vec<String>), String> {
        let resolved = resolve_executable(&self.program, working_dir)?;

        let ext = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if matches!(ext.as_deref(), Some("cmd") | Some("bat")) {
            let mut line = quote(&resolved.to_string_lossy(), QuoteDialect::WindowsCmd);
            for arg in &self.args {
                line.push(' ');
                line.push_str(&quote(arg, QuoteDialect::WindowsCmd));
            }
            let shell = std::env::var("ComSpec").unwrap_or_else(|_| "cmd.exe".to_string());
            return Ok((
                PathBuf::from(shell),
                vec!["/D".into(), "/S".into(), "/C".into(), line],
            ));
        }

        Ok((resolved, self.args.clone()))
    }
}

/// Logical shell wrapper for a configured command string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// Tokenize the string and spawn it directly.
    #[default]
    None,
    /// PowerShell Core, falling back to Windows PowerShell with `-Sta`.
    Pwsh,
    /// `cmd.exe /D /S /C`.
    Cmd,
    /// `python -c`.
    Python,
    /// `node -e`.
    Node,
}

impl FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ShellKind::None),
            "pwsh" => Ok(ShellKind::Pwsh),
            "cmd" => Ok(ShellKind::Cmd),
            "python" => Ok(ShellKind::Python),
            "node" => Ok(ShellKind::Node),
            other => Err(format!(
                "invalid shell: {other} (expected \"none\", \"pwsh\", \"cmd\", \"python\" or \"node\")"
            )),
        }
    }
}

impl ShellKind {
    /// Wrap a script string into a runnable [`StageCommand`].
    ///
    /// Returns `None` for an empty script under `ShellKind::None`.
    pub fn wrap(self, script: &str) -> Option<StageCommand> {
        match self {
            ShellKind::None => StageCommand::from_raw(script),
            ShellKind::Pwsh => {
                // Prefer pwsh; Windows PowerShell needs -Sta on top of the
                // shared flag template.
                let (program, mut args) = if find_on_path("pwsh").is_some() {
                    ("pwsh", Vec::new())
                } else {
                    ("powershell", vec!["-Sta".to_string()])
                };
                args.extend(
                    [
                        "-NoLogo",
                        "-NoProfile",
                        "-NonInteractive",
                        "-ExecutionPolicy",
                        "Unrestricted",
                        "-Command",
                    ]
                    .map(String::from),
                );
                args.push(script.to_string());
                let mut cmd = StageCommand::new(program, args);
                cmd.raw = Some(script.to_string());
                Some(cmd)
            }
            ShellKind::Cmd => {
                let mut cmd = StageCommand::new(
                    "cmd",
                    vec!["/D".into(), "/S".into(), "/C".into(), script.to_string()],
                );
                cmd.raw = Some(script.to_string());
                Some(cmd)
            }
            ShellKind::Python => {
                let mut cmd = StageCommand::new("python", vec!["-c".into(), script.to_string()]);
                cmd.raw = Some(script.to_string());
                Some(cmd)
            }
            ShellKind::Node => {
                let mut cmd = StageCommand::new("node", vec!["-e".into(), script.to_string()]);
                cmd.raw = Some(script.to_string());
                Some(cmd)
            }
        }
    }
}

/// Resolve an executable name to a concrete path.
///
/// - Names containing a path separator are rooted at `working_dir` when
///   relative and used as-is when absolute.
/// - Bare names are searched on `PATH` (with the usual executable extensions
///   on Windows).
pub fn resolve_executable(name: &str, working_dir: &Path) -> Result<PathBuf, String> {
    let as_path = Path::new(name);

    if name.contains('/') || name.contains('\\') {
        let candidate = if as_path.is_absolute() {
            as_path.to_path_buf()
        } else {
            working_dir.join(as_path)
        };
        if candidate.is_file() {
            return Ok(candidate);
        }
        return Err(format!("executable not found: {}", candidate.display()));
    }

    find_on_path(name).ok_or_else(|| format!("executable not found on PATH: {name}"))
}

/// Search `PATH` for a bare executable name.
fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            for ext in ["com", "exe", "bat", "cmd"] {
                let candidate = dir.join(format!("{name}.{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}
