//! SSH client configuration structures and validation.
//!
//! This module defines [`SshConfig`] for the `ssh` and `ssh-keygen` client
//! settings. Configuration is loaded via `ortho-config` which merges
//! defaults, configuration files, and environment variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;

use super::ShellError;

/// Default SSH port on freshly built servers.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// SSH client settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RACKHOST_SSH",
    discovery(
        app_name = "rackhost",
        env_var = "RACKHOST_CONFIG_PATH",
        config_file_name = "rackhost.toml",
        dotfile_name = ".rackhost.toml",
        project_file_name = "rackhost.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `ssh-keygen` executable.
    #[ortho_config(default = "ssh-keygen".to_owned())]
    pub ssh_keygen_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = "core".to_owned())]
    pub ssh_user: String,
    /// SSH port on the instance.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking; defaults to disabling because
    /// every server is new.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null`.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
}

impl SshConfig {
    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::InvalidConfig`] when any required field is empty
    /// or the port is zero.
    pub fn validate(&self) -> Result<(), ShellError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.ssh_keygen_bin, "ssh_keygen_bin")?;
        Self::require_value(&self.ssh_user, "ssh_user")?;
        if self.ssh_port == 0 {
            return Err(ShellError::InvalidConfig {
                field: String::from("ssh_port"),
            });
        }
        Ok(())
    }

    /// Loads configuration using defaults, configuration files, and
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ShellError::ConfigLoad`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ShellError> {
        Self::load_from_iter([std::ffi::OsString::from("rackhost")])
            .map_err(|err| ShellError::ConfigLoad(err.to_string()))
    }

    fn require_value(value: &str, field: &str) -> Result<(), ShellError> {
        if value.trim().is_empty() {
            return Err(ShellError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}
