//! Instance lifecycle controller.
//!
//! Builds, polls, reboots, and tears down a single server through a
//! [`Provider`]. Polling goes through [`crate::wait::poll_until`] so every
//! wait honours both its budget and the caller's cancellation token.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DriverError;
use crate::provider::{DiskConfig, Provider, ProviderError, RebootMode, ServerId, ServerSpec};
use crate::state::{LifecycleState, READY_STATUS};
use crate::wait::{WaitError, WaitPolicy, poll_until};

/// Prefix of every server name built by this crate.
pub const SERVER_NAME_PREFIX: &str = "rackhost-";

/// Image, flavour, and naming inputs for a server build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildRequest {
    /// Base name shared with the key pair.
    pub base_name: String,
    /// Image to boot.
    pub image_id: String,
    /// Flavour to allocate.
    pub flavor_id: String,
    /// Registered key-pair name.
    pub keypair_name: String,
}

impl BuildRequest {
    /// Server name derived from the base name.
    #[must_use]
    pub fn server_name(&self) -> String {
        format!("{SERVER_NAME_PREFIX}{}", self.base_name)
    }

    fn to_spec(&self) -> ServerSpec {
        ServerSpec {
            name: self.server_name(),
            image_id: self.image_id.clone(),
            flavor_id: self.flavor_id.clone(),
            keypair_name: self.keypair_name.clone(),
            disk_config: DiskConfig::Manual,
        }
    }
}

/// Drives a provider through the server lifecycle.
#[derive(Clone, Debug)]
pub struct InstanceController<P: Provider> {
    provider: P,
    create_wait: WaitPolicy,
    reboot_wait: WaitPolicy,
}

impl<P: Provider> InstanceController<P> {
    /// Creates a controller with the standard wait budgets.
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            create_wait: WaitPolicy::CREATE,
            reboot_wait: WaitPolicy::REBOOT,
        }
    }

    /// Overrides the wait applied after a build.
    #[must_use]
    pub const fn with_create_wait(mut self, policy: WaitPolicy) -> Self {
        self.create_wait = policy;
        self
    }

    /// Overrides the wait applied after a reboot.
    #[must_use]
    pub const fn with_reboot_wait(mut self, policy: WaitPolicy) -> Self {
        self.reboot_wait = policy;
        self
    }

    /// Returns the wrapped provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Submits the build request and returns the provider identifier
    /// without waiting for the build to finish.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error when the request is rejected.
    pub async fn create(
        &self,
        session: &P::Session,
        request: &BuildRequest,
    ) -> Result<ServerId, DriverError> {
        let spec = request.to_spec();
        debug!(server = %spec.name, image = %spec.image_id, flavor = %spec.flavor_id, "launching server");
        let id = self.provider.create_server(session, &spec).await?;
        info!(server = %spec.name, server_id = %id, "server build accepted");
        Ok(id)
    }

    /// Polls until the server is `ACTIVE` with an IPv4 address, bounded by
    /// the create budget.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ProvisionTimeout`] when the budget elapses,
    /// [`DriverError::MissingAddress`] when the server went active without
    /// an address, [`DriverError::Cancelled`] when `cancel` fires, and the
    /// mapped provider error when a status query fails.
    pub async fn wait_for_ready(
        &self,
        session: &P::Session,
        id: &ServerId,
        cancel: &CancellationToken,
    ) -> Result<Ipv4Addr, DriverError> {
        let saw_ready = AtomicBool::new(false);
        let outcome = poll_until(self.create_wait, cancel, || {
            let fetch = self.provider.get_server(session, id);
            let saw = &saw_ready;
            async move {
                fetch.await.map(|details| {
                    debug!(server_id = %details.id, status = %details.status, "polled server");
                    if details.status != READY_STATUS {
                        return None;
                    }
                    saw.store(true, Ordering::Relaxed);
                    details.ipv4
                })
            }
        })
        .await;

        match outcome {
            Ok(address) => {
                info!(server_id = %id, ip = %address, "server is ready");
                Ok(address)
            }
            Err(WaitError::TimedOut { .. }) if saw_ready.load(Ordering::Relaxed) => {
                Err(DriverError::MissingAddress {
                    server_id: id.clone(),
                })
            }
            Err(err) => Err(wait_failure("create", id, err)),
        }
    }

    /// Fetches and normalises the current status in a single round trip.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error when the query fails.
    pub async fn status(
        &self,
        session: &P::Session,
        id: &ServerId,
    ) -> Result<LifecycleState, DriverError> {
        let details = self.provider.get_server(session, id).await?;
        let state = LifecycleState::from_provider_status(&details.status);
        if let LifecycleState::Unknown(ref raw) = state {
            warn!(server_id = %id, status = %raw, "provider reported an unrecognised status");
        }
        Ok(state)
    }

    /// Issues a soft reboot and waits for the server to come back, bounded
    /// by the reboot budget.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error when the reboot request fails,
    /// [`DriverError::ProvisionTimeout`] when the budget elapses, and
    /// [`DriverError::Cancelled`] when `cancel` fires.
    pub async fn reboot(
        &self,
        session: &P::Session,
        id: &ServerId,
        cancel: &CancellationToken,
    ) -> Result<(), DriverError> {
        debug!(server_id = %id, "restarting server");
        self.provider
            .reboot_server(session, id, RebootMode::Soft)
            .await?;

        debug!(server_id = %id, "waiting for server to reboot");
        poll_until(self.reboot_wait, cancel, || {
            let fetch = self.provider.get_server(session, id);
            async move {
                fetch
                    .await
                    .map(|details| (details.status == READY_STATUS).then_some(()))
            }
        })
        .await
        .map_err(|err| wait_failure("reboot", id, err))?;
        info!(server_id = %id, "server rebooted");
        Ok(())
    }

    /// Deletes the server, then the key pair.
    ///
    /// A server or key pair the provider no longer knows counts as deleted.
    /// When server deletion fails the key pair is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error of the first failing deletion.
    pub async fn destroy(
        &self,
        session: &P::Session,
        id: &ServerId,
        keypair_name: &str,
    ) -> Result<(), DriverError> {
        debug!(server_id = %id, "deleting server");
        match self.provider.delete_server(session, id).await {
            Ok(()) => {}
            Err(ProviderError::NotFound { .. }) => {
                debug!(server_id = %id, "server already absent");
            }
            Err(err) => return Err(err.into()),
        }

        delete_keypair(&self.provider, session, keypair_name).await?;
        info!(server_id = %id, keypair = %keypair_name, "server and key pair removed");
        Ok(())
    }
}

/// Deletes a key pair, treating an absent registration as deleted.
pub(crate) async fn delete_keypair<P: Provider>(
    provider: &P,
    session: &P::Session,
    name: &str,
) -> Result<(), DriverError> {
    debug!(keypair = %name, "deleting SSH key pair");
    match provider.delete_keypair(session, name).await {
        Ok(()) => Ok(()),
        Err(ProviderError::NotFound { .. }) => {
            debug!(keypair = %name, "key pair already absent");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn wait_failure(action: &'static str, id: &ServerId, err: WaitError<ProviderError>) -> DriverError {
    match err {
        WaitError::TimedOut { waited, attempts } => {
            warn!(server_id = %id, action, attempts, "gave up waiting for server");
            DriverError::ProvisionTimeout {
                action,
                server_id: id.clone(),
                waited,
            }
        }
        WaitError::Cancelled => DriverError::Cancelled {
            action,
            server_id: id.clone(),
        },
        WaitError::Probe(source) => source.into(),
    }
}

#[cfg(test)]
mod tests;
