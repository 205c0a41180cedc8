//! Error taxonomy shared by the lifecycle controller and the driver facade.

use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::{ProviderError, ServerId};
use crate::ssh::ShellError;

/// Why an operation needing a server could not run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvalidState {
    /// `create` has not produced a server yet.
    NotCreated,
    /// The server has already been removed.
    Removed,
    /// `create` was called on a record that already holds a server.
    AlreadyCreated,
}

impl InvalidState {
    const fn describe(self) -> &'static str {
        match self {
            Self::NotCreated => "server has not been created yet",
            Self::Removed => "server has been removed",
            Self::AlreadyCreated => "server has already been created",
        }
    }
}

/// Errors raised by driver operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DriverError {
    /// A required option is missing; raised before any network call.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The provider rejected the account credentials.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message returned by the identity service.
        message: String,
    },
    /// A status poll exceeded its budget.
    #[error("timeout waiting for {action} on server {server_id} after {waited:?}")]
    ProvisionTimeout {
        /// Action being waited on.
        action: &'static str,
        /// Server being polled.
        server_id: ServerId,
        /// Time spent polling.
        waited: Duration,
    },
    /// A wait was interrupted by the cancellation token.
    #[error("{action} on server {server_id} was cancelled")]
    Cancelled {
        /// Action being waited on.
        action: &'static str,
        /// Server being polled.
        server_id: ServerId,
    },
    /// The server became active but never reported an IPv4 address.
    #[error("server {server_id} missing public IPv4 address")]
    MissingAddress {
        /// Server being polled.
        server_id: ServerId,
    },
    /// Any other provider failure, propagated verbatim.
    #[error("provider error: {0}")]
    Provider(ProviderError),
    /// A setup command failed on the instance.
    #[error("remote step {step} failed with status {status_text}: {stderr}")]
    RemoteExecution {
        /// Name of the failed step.
        step: &'static str,
        /// Human readable exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// The remote shell could not be started.
    #[error("remote shell error: {0}")]
    Shell(#[from] ShellError),
    /// Local key material could not be prepared.
    #[error("key material at {path}: {message}")]
    KeyMaterial {
        /// File or directory involved.
        path: Utf8PathBuf,
        /// Underlying error text.
        message: String,
    },
    /// The operation needs a server the record does not hold.
    #[error("invalid state: {}", .0.describe())]
    InvalidState(InvalidState),
    /// The driver does not implement the operation.
    #[error("{operation} is not supported by the {driver} driver")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Driver name.
        driver: &'static str,
    },
    /// No factory is registered under the requested name.
    #[error("unknown driver: {0}")]
    UnknownDriver(String),
}

impl From<ProviderError> for DriverError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Authentication { message } => Self::Authentication { message },
            other => Self::Provider(other),
        }
    }
}
