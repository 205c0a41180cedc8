//! Command runner abstraction and remote shell target types.

use std::ffi::OsString;
use std::net::IpAddr;
use std::process::{Command, Stdio};

use camino::Utf8PathBuf;

use super::ShellError;

/// Exit code and captured streams of a finished command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code, or `None` when a signal ended the process.
    pub code: Option<i32>,
    /// Everything written to stdout, lossily decoded.
    pub stdout: String,
    /// Everything written to stderr, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable exit status, `unknown` when the process was killed.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Seam between the crate and local process execution. Both `ssh` and
/// `ssh-keygen` go through it.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` to completion with `args` and no stdin.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ShellError>;
}

/// Runner spawning real processes via [`std::process::Command`].
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ShellError> {
        let spawn_error = |err: std::io::Error| ShellError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        };
        let finished = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(spawn_error)?;

        let decode = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        Ok(CommandOutput {
            code: finished.status.code(),
            stdout: decode(&finished.stdout),
            stderr: decode(&finished.stderr),
        })
    }
}

/// Where and as whom a remote command runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshTarget {
    /// Address of the instance.
    pub host: IpAddr,
    /// SSH port on the instance.
    pub port: u16,
    /// Remote login user.
    pub user: String,
    /// Private key used to authenticate.
    pub identity_file: Utf8PathBuf,
}
