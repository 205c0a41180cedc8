//! Command-line interface definitions for the `rackhost` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Host name used when `--name` is omitted.
pub(crate) const DEFAULT_HOST_NAME: &str = "default";

/// Top-level CLI for the `rackhost` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rackhost",
    about = "Provision and manage a container host on Rackspace Cloud Servers",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Name of the host; each host keeps its own record and key pair.
    #[arg(long, short = 'n', global = true, value_name = "HOST", default_value = DEFAULT_HOST_NAME)]
    pub(crate) name: String,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations on a host.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create the server and expose the container daemon over TCP.
    Create(CreateCommand),
    /// Print the state reported by the provider.
    State,
    /// Print the public IPv4 address.
    Ip,
    /// Print the container daemon URL.
    Url,
    /// Start a stopped host.
    Start,
    /// Stop a running host.
    Stop,
    /// Soft-reboot the host and wait for it to come back.
    Restart,
    /// Delete the server and its key pair.
    Remove,
    /// Forcefully delete the server and its key pair.
    Kill,
    /// Run a command on the host over SSH.
    Ssh(SshCommand),
}

/// Arguments for `rackhost create`.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Driver that provisions the host.
    #[arg(long, short = 'd', value_name = "DRIVER", default_value = "rackspace")]
    pub(crate) driver: String,
}

/// Arguments for `rackhost ssh`.
#[derive(Debug, Parser)]
pub(crate) struct SshCommand {
    /// Command to execute on the host (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}
