//! Explicit map from driver names to driver constructors.
//!
//! The binary builds the registry once at startup and hands it to the CLI,
//! so there is no global mutable state and tests can register fakes.

use std::collections::HashMap;

use camino::Utf8PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DriverConfig;
use crate::driver::{Driver, InstanceRecord, RACKSPACE_DRIVER, RackspaceDriver};
use crate::error::DriverError;
use crate::rackspace::RackspaceProvider;
use crate::ssh::{SshConfig, SshShell};

/// Everything a factory needs to build a driver for one host.
#[derive(Clone, Debug)]
pub struct DriverContext {
    /// Validated-at-construction driver configuration.
    pub config: DriverConfig,
    /// SSH client settings.
    pub ssh: SshConfig,
    /// Host directory holding key material.
    pub store_path: Utf8PathBuf,
    /// Record persisted by an earlier invocation, or an empty one.
    pub record: InstanceRecord,
    /// Token interrupting long waits.
    pub cancel: CancellationToken,
}

/// Constructor registered under a driver name.
pub type DriverFactory =
    Box<dyn Fn(DriverContext) -> Result<Box<dyn Driver>, DriverError> + Send + Sync>;

/// Registry of driver factories keyed by name.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every driver shipped with the crate.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(RACKSPACE_DRIVER, rackspace_factory);
        registry
    }

    /// Registers `factory` under `name`, replacing any earlier entry.
    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn(DriverContext) -> Result<Box<dyn Driver>, DriverError> + Send + Sync + 'static,
    {
        debug!(driver = name, "registering driver");
        self.factories.insert(name, Box::new(factory));
    }

    /// Returns `true` when a factory exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered driver names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Builds the driver named by the context's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::UnknownDriver`] when no factory is registered,
    /// and whatever the factory returns otherwise.
    pub fn build(&self, context: DriverContext) -> Result<Box<dyn Driver>, DriverError> {
        let name = context.config.driver_name();
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DriverError::UnknownDriver(name.to_owned()))?;
        factory(context)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

fn rackspace_factory(context: DriverContext) -> Result<Box<dyn Driver>, DriverError> {
    let DriverConfig::Rackspace(config) = context.config;
    let provider = RackspaceProvider::new(&config);
    let shell = SshShell::with_process_runner(context.ssh)?;
    let driver: RackspaceDriver = RackspaceDriver::new(config, provider, shell, context.store_path)?
        .with_record(context.record)
        .with_cancellation(context.cancel);
    Ok(Box::new(driver))
}
