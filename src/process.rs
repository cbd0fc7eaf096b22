//! Command execution for toolchain steps.
//!
//! Every external program goes through [`Cmd`], which checks the exit status
//! so a failed step stops the build right there instead of surfacing later
//! as a missing file.
//!
//! ```rust,ignore
//! use cont_kernel_builder::process::Cmd;
//!
//! Cmd::new("make")
//!     .args(["defconfig", "ARCH=arm"])
//!     .arg_path(&build_arg)
//!     .dir(&kernel_dir)
//!     .error_msg("kernel configuration failed")
//!     .run_interactive()?;
//! ```

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::ToolError;

/// Lines of stderr kept in a [`ToolError::Failed`].
const STDERR_TAIL_LINES: usize = 20;

/// Captured result of [`Cmd::run`].
#[derive(Debug)]
pub struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Builder for one external command.
#[derive(Debug)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            dir: None,
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Working directory for the child.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Context attached to any failure of this command.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Human-readable command line, for logs.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn context_msg(&self) -> String {
        self.error_msg
            .clone()
            .unwrap_or_else(|| format!("running '{}'", self.display()))
    }

    /// Run with stdout and stderr captured.
    pub fn run(self) -> Result<CmdOutput> {
        debug!(cmd = %self.display(), "run");
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })
            .with_context(|| self.context_msg())?;

        if !output.status.success() {
            let err = ToolError::Failed {
                program: self.program_name(),
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            };
            return Err(anyhow::Error::new(err).context(self.context_msg()));
        }

        Ok(CmdOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run with the parent's stdio, so long builds show their progress.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        debug!(cmd = %self.display(), "run (interactive)");
        let status = self
            .command()
            .status()
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })
            .with_context(|| self.context_msg())?;

        if !status.success() {
            let err = ToolError::Failed {
                program: self.program_name(),
                status,
                stderr: String::new(),
            };
            return Err(anyhow::Error::new(err).context(self.context_msg()));
        }

        Ok(status)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
