//! Per-host storage directories holding the instance record and key pair.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DriverConfig;
use crate::driver::InstanceRecord;
use crate::ssh::expand_tilde;

/// File holding the persisted host document.
pub const HOST_FILE: &str = "host.json";

/// Default root of the host store, before tilde expansion.
pub const DEFAULT_STORE_PATH: &str = "~/.rackhost/hosts";

/// Store location loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "RACKHOST")]
pub struct StoreConfig {
    /// Root directory under which every host gets its own directory.
    #[ortho_config(default = DEFAULT_STORE_PATH.to_owned())]
    pub store_path: String,
}

impl StoreConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigLoad`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, StoreError> {
        Self::load_from_iter([std::ffi::OsString::from("rackhost")])
            .map_err(|err| StoreError::ConfigLoad(err.to_string()))
    }

    /// Store root with a leading `~` expanded.
    #[must_use]
    pub fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(expand_tilde(self.store_path.trim()))
    }
}

/// Errors raised while reading or writing host directories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Raised when the store configuration cannot be loaded.
    #[error("store configuration parsing failed: {0}")]
    ConfigLoad(String),
    /// Raised when a host name is unusable as a directory name.
    #[error("invalid host name {0:?}: use letters, digits, '-', '_' or '.'")]
    InvalidName(String),
    /// Raised when the host has no persisted document.
    #[error("host {0} does not exist")]
    NotFound(String),
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a host document cannot be parsed or rendered.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path of the document.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Persisted state of one host: the configuration it was created with and
/// what the driver recorded.
///
/// Later operations rebuild the driver from `config`, so the account,
/// region, image and flavour stay those of the original `create` whatever
/// the current environment says.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HostDocument {
    /// Validated driver configuration, tagged with the driver name.
    pub config: DriverConfig,
    /// Instance record written by the driver.
    pub record: InstanceRecord,
}

impl HostDocument {
    /// Registry name of the driver owning the host.
    #[must_use]
    pub const fn driver_name(&self) -> &'static str {
        self.config.driver_name()
    }
}

/// Directory tree of hosts, one subdirectory per host name.
#[derive(Clone, Debug)]
pub struct HostStore {
    root: Utf8PathBuf,
}

impl HostStore {
    /// Creates a store rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding the host's document and key pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] when `name` is empty, a dot entry,
    /// or contains characters other than ASCII alphanumerics, `-`, `_` and `.`.
    pub fn host_dir(&self, name: &str) -> Result<Utf8PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Reads the host document, if the host exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the document cannot be read or parsed.
    pub fn load(&self, name: &str) -> Result<Option<HostDocument>, StoreError> {
        let dir_path = self.host_dir(name)?;
        let Some(dir) = open_existing(&dir_path)? else {
            return Ok(None);
        };
        let file_path = dir_path.join(HOST_FILE);
        let present = dir
            .try_exists(HOST_FILE)
            .map_err(|err| io_error(&file_path, &err))?;
        if !present {
            return Ok(None);
        }

        let contents = dir
            .read_to_string(HOST_FILE)
            .map_err(|err| io_error(&file_path, &err))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| StoreError::Parse {
                path: file_path,
                message: err.to_string(),
            })
    }

    /// Reads the host document, failing when the host does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown hosts.
    pub fn require(&self, name: &str) -> Result<HostDocument, StoreError> {
        self.load(name)?
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    /// Writes the host document, creating the host directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory or file cannot be written.
    pub fn save(&self, name: &str, document: &HostDocument) -> Result<(), StoreError> {
        let dir_path = self.host_dir(name)?;
        Dir::create_ambient_dir_all(&dir_path, ambient_authority())
            .map_err(|err| io_error(&dir_path, &err))?;
        let dir = Dir::open_ambient_dir(&dir_path, ambient_authority())
            .map_err(|err| io_error(&dir_path, &err))?;
        let file_path = dir_path.join(HOST_FILE);
        let rendered = serde_json::to_string_pretty(document).map_err(|err| StoreError::Parse {
            path: file_path.clone(),
            message: err.to_string(),
        })?;
        dir.write(HOST_FILE, rendered)
            .map_err(|err| io_error(&file_path, &err))
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_owned()))
    }
}

fn open_existing(path: &Utf8Path) -> Result<Option<Dir>, StoreError> {
    match Dir::open_ambient_dir(path, ambient_authority()) {
        Ok(dir) => Ok(Some(dir)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(path, &err)),
    }
}

fn io_error(path: &Utf8Path, err: &io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
