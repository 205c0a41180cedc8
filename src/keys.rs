//! Local key pair generation and provider key-pair registration.
//!
//! The key pair lives in the host's storage directory and must outlive the
//! process: remote shell access after `create` depends on it.

use std::ffi::OsString;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::debug;

use crate::error::DriverError;
use crate::provider::Provider;
use crate::ssh::CommandRunner;

/// File name of the private key inside the storage directory.
pub const PRIVATE_KEY_FILE: &str = "id_rsa";
/// File name of the public key inside the storage directory.
pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";
/// Prefix of every key-pair name registered with the provider.
pub const KEYPAIR_NAME_PREFIX: &str = "rackhost-key-";

const KEY_BITS: &str = "2048";

/// Derives the provider key-pair name for a base name.
#[must_use]
pub fn keypair_name(base_name: &str) -> String {
    format!("{KEYPAIR_NAME_PREFIX}{base_name}")
}

/// Generates the local key pair and registers it with the provider.
#[derive(Clone, Debug)]
pub struct CredentialManager<R: CommandRunner> {
    store_path: Utf8PathBuf,
    keygen_bin: String,
    runner: R,
}

impl<R: CommandRunner> CredentialManager<R> {
    /// Creates a manager writing key material below `store_path`.
    pub fn new(store_path: impl Into<Utf8PathBuf>, keygen_bin: impl Into<String>, runner: R) -> Self {
        Self {
            store_path: store_path.into(),
            keygen_bin: keygen_bin.into(),
            runner,
        }
    }

    /// Path of the private key handed to the SSH client.
    #[must_use]
    pub fn private_key_path(&self) -> Utf8PathBuf {
        self.store_path.join(PRIVATE_KEY_FILE)
    }

    /// Path of the public key registered with the provider.
    #[must_use]
    pub fn public_key_path(&self) -> Utf8PathBuf {
        self.store_path.join(PUBLIC_KEY_FILE)
    }

    /// Generates the key pair unless both halves already exist.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::KeyMaterial`] when the storage directory cannot
    /// be prepared or `ssh-keygen` fails.
    pub fn ensure_key_pair(&self) -> Result<(), DriverError> {
        let dir = self.open_store()?;
        let private_exists = exists(&dir, PRIVATE_KEY_FILE, &self.private_key_path())?;
        let public_exists = exists(&dir, PUBLIC_KEY_FILE, &self.public_key_path())?;
        if private_exists && public_exists {
            debug!(path = %self.private_key_path(), "reusing existing SSH key pair");
            return Ok(());
        }

        for (present, file) in [
            (private_exists, PRIVATE_KEY_FILE),
            (public_exists, PUBLIC_KEY_FILE),
        ] {
            if present {
                dir.remove_file(file)
                    .map_err(|err| key_error(&self.store_path.join(file), &err))?;
            }
        }

        debug!(path = %self.private_key_path(), "generating SSH key pair");
        let args = [
            OsString::from("-t"),
            OsString::from("rsa"),
            OsString::from("-b"),
            OsString::from(KEY_BITS),
            OsString::from("-N"),
            OsString::new(),
            OsString::from("-q"),
            OsString::from("-f"),
            OsString::from(self.private_key_path().as_str()),
        ];
        let output = self
            .runner
            .run(&self.keygen_bin, &args)
            .map_err(|err| DriverError::KeyMaterial {
                path: self.private_key_path(),
                message: err.to_string(),
            })?;
        if output.is_success() {
            return Ok(());
        }

        Err(DriverError::KeyMaterial {
            path: self.private_key_path(),
            message: format!(
                "{} exited with status {}: {}",
                self.keygen_bin,
                output.status_text(),
                output.stderr.trim()
            ),
        })
    }

    /// Reads the public half of the key pair.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::KeyMaterial`] when the file cannot be read or is
    /// empty.
    pub fn read_public_key(&self) -> Result<String, DriverError> {
        let dir = self.open_store()?;
        let contents = dir
            .read_to_string(PUBLIC_KEY_FILE)
            .map_err(|err| key_error(&self.public_key_path(), &err))?;
        let key = contents.trim();
        if key.is_empty() {
            return Err(DriverError::KeyMaterial {
                path: self.public_key_path(),
                message: String::from("public key file is empty"),
            });
        }
        Ok(key.to_owned())
    }

    /// Ensures the local key pair exists and registers its public half under
    /// a name derived from `base_name`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::KeyMaterial`] for local failures and the mapped
    /// provider error when registration fails.
    pub async fn register<P: Provider>(
        &self,
        provider: &P,
        session: &P::Session,
        base_name: &str,
    ) -> Result<String, DriverError> {
        self.ensure_key_pair()?;
        let public_key = self.read_public_key()?;
        let name = keypair_name(base_name);
        debug!(keypair = %name, "registering SSH key pair");
        let registered = provider.create_keypair(session, &name, &public_key).await?;
        Ok(registered)
    }

    /// Removes a key-pair registration. An already-absent registration is
    /// treated as removed.
    ///
    /// # Errors
    ///
    /// Returns the mapped provider error for any other failure.
    pub async fn revoke<P: Provider>(
        &self,
        provider: &P,
        session: &P::Session,
        name: &str,
    ) -> Result<(), DriverError> {
        crate::lifecycle::delete_keypair(provider, session, name).await
    }

    fn open_store(&self) -> Result<Dir, DriverError> {
        Dir::create_ambient_dir_all(&self.store_path, ambient_authority())
            .map_err(|err| key_error(&self.store_path, &err))?;
        Dir::open_ambient_dir(&self.store_path, ambient_authority())
            .map_err(|err| key_error(&self.store_path, &err))
    }
}

fn exists(dir: &Dir, file: &str, path: &Utf8Path) -> Result<bool, DriverError> {
    dir.try_exists(file).map_err(|err| key_error(path, &err))
}

fn key_error(path: &Utf8Path, err: &io::Error) -> DriverError {
    DriverError::KeyMaterial {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
