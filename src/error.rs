//! Typed leaf errors.
//!
//! Most of the crate works in `anyhow::Result`; these types exist where a
//! caller (or a test) needs to tell failure kinds apart by downcasting.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors raised while locating or rewriting a patch target.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("invalid locator pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("patch target '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Only produced in strict mode; otherwise an unmatched rule is a warning.
    #[error("no line matching '{pattern}' in '{}'", .path.display())]
    PatternNotFound { path: PathBuf, pattern: String },
}

/// Failure of an external toolchain invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with {status}{}", stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{}", stderr)
    }
}

/// Configuration values that cannot produce a valid build.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("kernel dir '{}' is not inside project root '{}'", .kernel_dir.display(), .project_root.display())]
    Layout {
        kernel_dir: PathBuf,
        project_root: PathBuf,
    },

    #[error("{field} = {value:#x} overflows when adding {offset:#x}")]
    Overflow {
        field: &'static str,
        value: u64,
        offset: u64,
    },

    #[error("option '{0}' is listed in both patch.enable and patch.disable")]
    ConflictingSwitch(String),
}
