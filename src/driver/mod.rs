//! Uniform host driver surface.
//!
//! [`Driver`] is what the CLI and the registry work with. [`HostDriver`]
//! implements it by sequencing authentication, key registration, the
//! lifecycle controller, and post-provision setup. Every operation that
//! talks to the provider authenticates afresh; no session outlives a call.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;

use camino::Utf8PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RackspaceConfig;
use crate::configure::{DOCKER_PORT, configure};
use crate::error::{DriverError, InvalidState};
use crate::keys::CredentialManager;
use crate::lifecycle::{BuildRequest, InstanceController};
use crate::provider::Provider;
use crate::rackspace::RackspaceProvider;
use crate::ssh::{CommandOutput, CommandRunner, ProcessCommandRunner, RemoteShell, SshShell, SshTarget};
use crate::state::LifecycleState;
use crate::wait::WaitPolicy;

mod record;

pub use record::InstanceRecord;

/// Registry name of the Rackspace driver.
pub const RACKSPACE_DRIVER: &str = "rackspace";

/// Future returned by asynchronous driver operations.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Operations every host driver exposes.
pub trait Driver: Send + Sync {
    /// Registry name of the driver.
    fn name(&self) -> &'static str;

    /// Current instance record, for persistence.
    fn record(&self) -> &InstanceRecord;

    /// Provisions the host: key pair, server, and daemon setup.
    fn create(&mut self) -> DriverFuture<'_, ()>;

    /// Observed public address.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidState`] before `create` completed or
    /// after `remove`.
    fn ip(&self) -> Result<Ipv4Addr, DriverError>;

    /// Daemon URL, `tcp://<ip>:2375`.
    ///
    /// # Errors
    ///
    /// Fails like [`Driver::ip`].
    fn url(&self) -> Result<String, DriverError> {
        let address = self.ip()?;
        Ok(format!("tcp://{address}:{DOCKER_PORT}"))
    }

    /// Current normalised state, queried from the provider.
    fn state(&self) -> DriverFuture<'_, LifecycleState>;

    /// Starts a stopped host.
    ///
    /// # Errors
    ///
    /// Drivers without power control return [`DriverError::Unsupported`].
    fn start(&mut self) -> Result<(), DriverError>;

    /// Stops a running host.
    ///
    /// # Errors
    ///
    /// Drivers without power control return [`DriverError::Unsupported`].
    fn stop(&mut self) -> Result<(), DriverError>;

    /// Reboots the host and waits for it to come back.
    fn restart(&mut self) -> DriverFuture<'_, ()>;

    /// Deletes the server and its key pair.
    fn remove(&mut self) -> DriverFuture<'_, ()>;

    /// Forcefully terminates the host.
    fn kill(&mut self) -> DriverFuture<'_, ()>;

    /// Runs an ad hoc command on the host.
    ///
    /// # Errors
    ///
    /// Fails like [`Driver::ip`], or with [`DriverError::Shell`] when the
    /// remote shell cannot start.
    fn ssh(&self, command: &str) -> Result<CommandOutput, DriverError>;
}

/// Driver backed by a [`Provider`] and an `ssh` client.
#[derive(Debug)]
pub struct HostDriver<P: Provider, R: CommandRunner> {
    config: RackspaceConfig,
    controller: InstanceController<P>,
    keys: CredentialManager<R>,
    shell: SshShell<R>,
    record: InstanceRecord,
    cancel: CancellationToken,
}

/// Production Rackspace driver.
pub type RackspaceDriver = HostDriver<RackspaceProvider, ProcessCommandRunner>;

impl<P: Provider, R: CommandRunner + Clone> HostDriver<P, R> {
    /// Builds a driver with an empty record.
    ///
    /// Key material is kept in `store_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when a required option is missing.
    pub fn new(
        config: RackspaceConfig,
        provider: P,
        shell: SshShell<R>,
        store_path: impl Into<Utf8PathBuf>,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        let keys = CredentialManager::new(
            store_path,
            shell.config().ssh_keygen_bin.clone(),
            shell.runner().clone(),
        );
        Ok(Self {
            config,
            controller: InstanceController::new(provider),
            keys,
            shell,
            record: InstanceRecord::default(),
            cancel: CancellationToken::new(),
        })
    }
}

impl<P: Provider, R: CommandRunner> HostDriver<P, R> {
    /// Resumes a previously persisted record.
    #[must_use]
    pub fn with_record(mut self, record: InstanceRecord) -> Self {
        self.record = record;
        self
    }

    /// Interrupts waits when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Overrides the create and reboot wait budgets.
    #[must_use]
    pub fn with_wait_policies(mut self, create: WaitPolicy, reboot: WaitPolicy) -> Self {
        self.controller = self
            .controller
            .with_create_wait(create)
            .with_reboot_wait(reboot);
        self
    }

    async fn authenticate(&self) -> Result<P::Session, DriverError> {
        let credentials = self.config.credentials();
        debug!(user = %credentials.username, region = %credentials.region, "authenticating");
        let session = self.controller.provider().authenticate(&credentials).await?;
        Ok(session)
    }

    fn target(&self, address: Ipv4Addr) -> SshTarget {
        let ssh = self.shell.config();
        SshTarget {
            host: IpAddr::V4(address),
            port: ssh.ssh_port,
            user: ssh.ssh_user.clone(),
            identity_file: self.keys.private_key_path(),
        }
    }

    fn unsupported(operation: &'static str) -> DriverError {
        DriverError::Unsupported {
            operation,
            driver: RACKSPACE_DRIVER,
        }
    }

    async fn create_host(&mut self) -> Result<(), DriverError> {
        if self.record.removed {
            return Err(DriverError::InvalidState(InvalidState::Removed));
        }
        if !self.record.is_pristine() {
            return Err(DriverError::InvalidState(InvalidState::AlreadyCreated));
        }

        let base_name = Uuid::new_v4().simple().to_string();
        self.record.base_name = Some(base_name.clone());
        debug!(base = %base_name, "creating host");

        let session = self.authenticate().await?;
        let keypair_name = self
            .keys
            .register(self.controller.provider(), &session, &base_name)
            .await?;
        self.record.keypair_name = Some(keypair_name.clone());

        let request = BuildRequest {
            base_name,
            image_id: self.config.image_id.trim().to_owned(),
            flavor_id: self.config.flavor_id.trim().to_owned(),
            keypair_name,
        };
        let server_id = self.controller.create(&session, &request).await?;
        self.record.server_id = Some(server_id.clone());

        let address = self
            .controller
            .wait_for_ready(&session, &server_id, &self.cancel)
            .await?;
        self.record.ipv4 = Some(address);

        debug!(ip = %address, "configuring container daemon");
        configure(&self.shell, &self.target(address))?;
        info!(server_id = %server_id, ip = %address, "host created");
        Ok(())
    }

    async fn query_state(&self) -> Result<LifecycleState, DriverError> {
        let server_id = self.record.live_server()?;
        let session = self.authenticate().await?;
        self.controller.status(&session, server_id).await
    }

    async fn restart_host(&mut self) -> Result<(), DriverError> {
        let server_id = self.record.live_server()?.clone();
        let session = self.authenticate().await?;
        self.controller
            .reboot(&session, &server_id, &self.cancel)
            .await
    }

    async fn remove_host(&mut self) -> Result<(), DriverError> {
        if self.record.removed {
            return Err(DriverError::InvalidState(InvalidState::Removed));
        }
        let Some(keypair_name) = self.record.keypair_name.clone() else {
            return Err(DriverError::InvalidState(InvalidState::NotCreated));
        };

        let session = self.authenticate().await?;
        match self.record.server_id.clone() {
            Some(server_id) => {
                self.controller
                    .destroy(&session, &server_id, &keypair_name)
                    .await?;
            }
            None => {
                debug!(keypair = %keypair_name, "no server recorded; revoking key pair only");
                self.keys
                    .revoke(self.controller.provider(), &session, &keypair_name)
                    .await?;
            }
        }
        self.record.removed = true;
        info!(keypair = %keypair_name, "host removed");
        Ok(())
    }
}

impl<P, R> Driver for HostDriver<P, R>
where
    P: Provider,
    R: CommandRunner,
{
    fn name(&self) -> &'static str {
        RACKSPACE_DRIVER
    }

    fn record(&self) -> &InstanceRecord {
        &self.record
    }

    fn create(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(self.create_host())
    }

    fn ip(&self) -> Result<Ipv4Addr, DriverError> {
        self.record.live_address()
    }

    fn state(&self) -> DriverFuture<'_, LifecycleState> {
        Box::pin(self.query_state())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        Err(Self::unsupported("start"))
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        Err(Self::unsupported("stop"))
    }

    fn restart(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(self.restart_host())
    }

    fn remove(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(self.remove_host())
    }

    fn kill(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(self.remove_host())
    }

    fn ssh(&self, command: &str) -> Result<CommandOutput, DriverError> {
        let address = self.ip()?;
        let output = self.shell.run(&self.target(address), command)?;
        Ok(output)
    }
}
