//! Remote shell execution over the system `ssh` client.
//!
//! The [`RemoteShell`] trait is the seam the post-provision configurator and
//! the facade's ad hoc `ssh` operation run through. [`SshShell`] implements it
//! by shelling out via a [`CommandRunner`], so tests can script outcomes
//! without spawning processes.

use std::ffi::OsString;

use thiserror::Error;

mod config;
mod types;
mod util;

pub use config::{DEFAULT_SSH_PORT, SshConfig};
pub use types::{CommandOutput, CommandRunner, ProcessCommandRunner, SshTarget};
pub use util::expand_tilde;

/// Errors surfaced while running remote or local commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ShellError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}: set RACKHOST_SSH_{env_suffix} or add {field} to [ssh] in rackhost.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    ConfigLoad(String),
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

/// Executes a command string on an instance.
pub trait RemoteShell: Send + Sync {
    /// Runs `command` on `target` and returns its captured output. A
    /// non-zero exit is reported through [`CommandOutput::code`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError`] when the client cannot be started.
    fn run(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, ShellError>;
}

/// Remote shell backed by the `ssh` binary.
#[derive(Clone, Debug)]
pub struct SshShell<R: CommandRunner> {
    config: SshConfig,
    runner: R,
}

impl SshShell<ProcessCommandRunner> {
    /// Shell spawning the configured `ssh` binary directly.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, ShellError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshShell<R> {
    /// Creates a new shell using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, ShellError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Client settings this shell was built with.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Returns the command runner, shared with key generation.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// `-o` options derived from the configuration, in a fixed order.
    fn client_options(&self) -> Vec<String> {
        let ssh = &self.config;
        let mut options = Vec::new();
        if ssh.ssh_batch_mode {
            options.push(String::from("BatchMode=yes"));
        }
        if !ssh.ssh_strict_host_key_checking {
            options.push(String::from("StrictHostKeyChecking=no"));
        }
        if !ssh.ssh_known_hosts_file.trim().is_empty() {
            options.push(format!("UserKnownHostsFile={}", ssh.ssh_known_hosts_file));
        }
        options
    }

    fn build_ssh_args(&self, target: &SshTarget, remote_command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(target.port.to_string()),
            OsString::from("-i"),
            OsString::from(expand_tilde(target.identity_file.as_str())),
        ];

        for option in self.client_options() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(option));
        }

        args.push(OsString::from(format!("{}@{}", target.user, target.host)));
        args.push(OsString::from(remote_command));
        args
    }
}

impl<R: CommandRunner> RemoteShell for SshShell<R> {
    fn run(&self, target: &SshTarget, command: &str) -> Result<CommandOutput, ShellError> {
        let args = self.build_ssh_args(target, command);
        self.runner.run(&self.config.ssh_bin, &args)
    }
}
