//! Provider abstraction over the compute control plane.
//!
//! A provider authenticates once per facade operation and hands back a
//! session that every later call borrows. Nothing here knows about polling
//! or ordering; that lives in [`crate::lifecycle`].

use std::fmt;
use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Account credentials presented to the identity service.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Account username.
    pub username: String,
    /// API key for the account.
    pub api_key: String,
    /// Region whose compute endpoint the session should target.
    pub region: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Provider-assigned server identifier.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Wraps a provider identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Disk partitioning mode requested at build time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiskConfig {
    /// The provider resizes the root filesystem automatically.
    Auto,
    /// The image's partition layout is kept as-is.
    Manual,
}

impl DiskConfig {
    /// Returns the wire value used by the compute API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
        }
    }
}

/// Reboot flavour passed to the compute API.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RebootMode {
    /// Ask the guest operating system to restart.
    Soft,
    /// Power-cycle the server.
    Hard,
}

impl RebootMode {
    /// Returns the wire value used by the compute API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "SOFT",
            Self::Hard => "HARD",
        }
    }
}

/// Parameters for a server creation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Display name of the server.
    pub name: String,
    /// Image to boot.
    pub image_id: String,
    /// Flavour (size) to allocate.
    pub flavor_id: String,
    /// Registered key pair injected into the server.
    pub keypair_name: String,
    /// Disk partitioning mode.
    pub disk_config: DiskConfig,
}

/// Server details returned by a status query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerDetails {
    /// Provider identifier.
    pub id: ServerId,
    /// Raw provider status (for example `BUILD` or `ACTIVE`).
    pub status: String,
    /// Public IPv4 address, once assigned.
    pub ipv4: Option<Ipv4Addr>,
}

/// Errors raised by provider calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// The identity service rejected the credentials.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message returned by the identity service.
        message: String,
    },
    /// The addressed resource does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource (`server` or `keypair`).
        resource: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// The API answered with an error status.
    #[error("provider API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// The service catalogue lists no compute endpoint for the region.
    #[error("no compute endpoint for region {region} in the service catalogue")]
    MissingEndpoint {
        /// Region that was requested.
        region: String,
    },
    /// The request never produced a usable response.
    #[error("provider transport error: {message}")]
    Transport {
        /// Transport level error description.
        message: String,
    },
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Compute control-plane operations used by the lifecycle controller.
pub trait Provider: Send + Sync {
    /// Authenticated session handed to every subsequent call.
    type Session: Send + Sync;

    /// Exchanges credentials for a session.
    fn authenticate<'a>(&'a self, credentials: &'a Credentials)
    -> ProviderFuture<'a, Self::Session>;

    /// Submits a server build and returns the assigned identifier.
    fn create_server<'a>(
        &'a self,
        session: &'a Self::Session,
        spec: &'a ServerSpec,
    ) -> ProviderFuture<'a, ServerId>;

    /// Fetches the current status and addresses of a server.
    fn get_server<'a>(
        &'a self,
        session: &'a Self::Session,
        id: &'a ServerId,
    ) -> ProviderFuture<'a, ServerDetails>;

    /// Deletes a server.
    fn delete_server<'a>(
        &'a self,
        session: &'a Self::Session,
        id: &'a ServerId,
    ) -> ProviderFuture<'a, ()>;

    /// Requests a reboot of the given flavour.
    fn reboot_server<'a>(
        &'a self,
        session: &'a Self::Session,
        id: &'a ServerId,
        mode: RebootMode,
    ) -> ProviderFuture<'a, ()>;

    /// Registers a public key and returns the name the provider stored.
    fn create_keypair<'a>(
        &'a self,
        session: &'a Self::Session,
        name: &'a str,
        public_key: &'a str,
    ) -> ProviderFuture<'a, String>;

    /// Removes a key pair registration.
    fn delete_keypair<'a>(
        &'a self,
        session: &'a Self::Session,
        name: &'a str,
    ) -> ProviderFuture<'a, ()>;
}
