//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::Credentials;

/// Identity v2 endpoint used when no override is configured.
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identity.api.rackspacecloud.com/v2.0";

/// Rackspace specific configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "RACKSPACE")]
pub struct RackspaceConfig {
    /// Rackspace account username.
    pub username: String,
    /// API key paired with the username. This value is required.
    pub api_key: String,
    /// Region hosting the server (for example `DFW` or `LON`).
    pub region: String,
    /// Image identifier used to boot the server.
    pub image_id: String,
    /// Flavour identifier controlling the server size.
    pub flavor_id: String,
    /// Identity service base URL. Only overridden for testing or private
    /// clouds.
    #[ortho_config(default = DEFAULT_IDENTITY_ENDPOINT.to_owned())]
    pub identity_endpoint: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section: "rackspace",
        }
    }
}

impl RackspaceConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in rackhost.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("rackhost")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the credentials presented to the identity service.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.trim().to_owned(),
            api_key: self.api_key.trim().to_owned(),
            region: self.region.trim().to_owned(),
        }
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.username,
            &FieldMetadata::new("Rackspace username", "RACKSPACE_USERNAME", "username"),
        )?;
        Self::require_field(
            &self.api_key,
            &FieldMetadata::new("Rackspace API key", "RACKSPACE_API_KEY", "api_key"),
        )?;
        Self::require_field(
            &self.region,
            &FieldMetadata::new("Rackspace region", "RACKSPACE_REGION", "region"),
        )?;
        Self::require_field(
            &self.image_id,
            &FieldMetadata::new("image ID", "RACKSPACE_IMAGE_ID", "image_id"),
        )?;
        Self::require_field(
            &self.flavor_id,
            &FieldMetadata::new("flavor ID", "RACKSPACE_FLAVOR_ID", "flavor_id"),
        )?;
        Self::require_field(
            &self.identity_endpoint,
            &FieldMetadata::new(
                "identity endpoint",
                "RACKSPACE_IDENTITY_ENDPOINT",
                "identity_endpoint",
            ),
        )?;
        Ok(())
    }
}

/// Provider-keyed driver configuration.
///
/// Each variant carries the configuration of exactly one driver so the
/// registry never has to downcast an opaque payload.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DriverConfig {
    /// Rackspace Cloud Servers.
    Rackspace(RackspaceConfig),
}

impl DriverConfig {
    /// Returns the registry name of the driver this configuration targets.
    #[must_use]
    pub const fn driver_name(&self) -> &'static str {
        match self {
            Self::Rackspace(_) => crate::driver::RACKSPACE_DRIVER,
        }
    }

    /// Loads the configuration of the named driver from files and the
    /// environment. Returns `None` for names no configuration exists for.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_for(driver: &str) -> Result<Option<Self>, ConfigError> {
        match driver {
            crate::driver::RACKSPACE_DRIVER => {
                RackspaceConfig::load_without_cli_args().map(|config| Some(Self::Rackspace(config)))
            }
            _ => Ok(None),
        }
    }

    /// Validates the wrapped configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Rackspace(config) => config.validate(),
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
