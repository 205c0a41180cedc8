//! Persisted per-host instance record.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, InvalidState};
use crate::provider::ServerId;

/// What the driver knows about the server it manages.
///
/// Fields fill in during `create` in order: base name, key-pair name, server
/// id, address. A failed `create` leaves whatever was recorded so `remove`
/// can clean up.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceRecord {
    /// Random base name from which resource names are derived.
    #[serde(default)]
    pub base_name: Option<String>,
    /// Registered key-pair name.
    #[serde(default)]
    pub keypair_name: Option<String>,
    /// Provider-assigned server identifier.
    #[serde(default)]
    pub server_id: Option<ServerId>,
    /// Public IPv4 address observed once the server was ready.
    #[serde(default)]
    pub ipv4: Option<Ipv4Addr>,
    /// Set once `remove` completed.
    #[serde(default)]
    pub removed: bool,
}

impl InstanceRecord {
    /// Returns `true` when `create` has not started on this record.
    #[must_use]
    pub const fn is_pristine(&self) -> bool {
        self.base_name.is_none() && !self.removed
    }

    /// Returns the server identifier of a live server.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidState`] when the server was removed or
    /// never created.
    pub fn live_server(&self) -> Result<&ServerId, DriverError> {
        self.ensure_not_removed()?;
        self.server_id
            .as_ref()
            .ok_or(DriverError::InvalidState(InvalidState::NotCreated))
    }

    /// Returns the address of a live server.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidState`] when the server was removed or
    /// never became ready.
    pub fn live_address(&self) -> Result<Ipv4Addr, DriverError> {
        self.ensure_not_removed()?;
        self.ipv4
            .ok_or(DriverError::InvalidState(InvalidState::NotCreated))
    }

    const fn ensure_not_removed(&self) -> Result<(), DriverError> {
        if self.removed {
            return Err(DriverError::InvalidState(InvalidState::Removed));
        }
        Ok(())
    }
}
