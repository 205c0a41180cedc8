//! Core library for the `rackhost` container host driver.
//!
//! A host is a single Rackspace Cloud Server provisioned with a freshly
//! registered key pair and configured to expose its container daemon over
//! TCP. The crate separates the provider transport ([`rackspace`]) from the
//! lifecycle sequencing ([`lifecycle`]) and exposes the result through the
//! [`Driver`] trait, which the [`DriverRegistry`] builds by name.

pub mod config;
pub mod configure;
pub mod driver;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod provider;
pub mod rackspace;
pub mod registry;
pub mod ssh;
pub mod state;
pub mod store;
pub mod test_support;
pub mod wait;

pub use config::{ConfigError, DriverConfig, RackspaceConfig};
pub use driver::{Driver, HostDriver, InstanceRecord, RACKSPACE_DRIVER, RackspaceDriver};
pub use error::{DriverError, InvalidState};
pub use lifecycle::{BuildRequest, InstanceController};
pub use provider::{Credentials, Provider, ProviderError, RebootMode, ServerDetails, ServerId};
pub use rackspace::RackspaceProvider;
pub use registry::{DriverContext, DriverFactory, DriverRegistry};
pub use ssh::{CommandOutput, CommandRunner, ShellError, SshConfig, SshShell, SshTarget};
pub use state::LifecycleState;
pub use store::{HostDocument, HostStore, StoreConfig, StoreError};
pub use wait::{WaitError, WaitPolicy};
