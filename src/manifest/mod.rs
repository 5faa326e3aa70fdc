//! This module contains the [`Manifest`], the persisted per-network record of
//! deployed implementations and their storage layouts.
//!
//! Each network has a single JSON file, shared by every tool invocation that
//! deploys to it. All access goes through an exclusive advisory lock on a
//! sidecar file, so that concurrent read-modify-write cycles cannot
//! interleave.

pub mod network;
pub mod version;

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    constant::{
        CURRENT_MANIFEST_VERSION,
        DEFAULT_LOCK_RETRIES,
        DEFAULT_LOCK_RETRY_INTERVAL_MS,
        DEFAULT_MANIFEST_DIRECTORY,
        LOCK_FILE_EXTENSION,
    },
    error::manifest::{Error, Result},
    layout::Layout,
    manifest::network::Network,
};

/// The contents of a manifest file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestData {
    /// The schema version of the document.
    pub manifest_version: String,

    /// The proxy admin deployed to the network, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Deployment>,

    /// The implementations deployed to the network, keyed by an identifier of
    /// their bytecode.
    #[serde(default)]
    pub impls: BTreeMap<String, Option<ImplDeployment>>,
}

impl Default for ManifestData {
    fn default() -> Self {
        Self {
            manifest_version: CURRENT_MANIFEST_VERSION.to_string(),
            admin:            None,
            impls:            BTreeMap::new(),
        }
    }
}

/// A contract deployed at an address.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub address: String,

    /// The hash of the deployment transaction, if it is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// A deployed implementation contract, along with the storage layout it was
/// deployed with.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImplDeployment {
    #[serde(flatten)]
    pub deployment: Deployment,
    pub layout:     Layout,
}

/// The configuration for manifests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The directory holding the manifest files.
    ///
    /// Defaults to [`DEFAULT_MANIFEST_DIRECTORY`].
    pub directory: PathBuf,

    /// The number of further attempts made to take the lock when it is held
    /// elsewhere.
    ///
    /// Defaults to [`DEFAULT_LOCK_RETRIES`].
    pub lock_retries: usize,

    /// The delay between attempts to take the lock.
    ///
    /// Defaults to [`DEFAULT_LOCK_RETRY_INTERVAL_MS`] milliseconds.
    pub retry_interval: Duration,
}

impl Config {
    /// Sets the `directory` config parameter to `value`.
    #[must_use]
    pub fn with_directory(mut self, value: impl Into<PathBuf>) -> Self {
        self.directory = value.into();
        self
    }

    /// Sets the `lock_retries` config parameter to `value`.
    #[must_use]
    pub fn with_lock_retries(mut self, value: usize) -> Self {
        self.lock_retries = value;
        self
    }

    /// Sets the `retry_interval` config parameter to `value`.
    #[must_use]
    pub fn with_retry_interval(mut self, value: Duration) -> Self {
        self.retry_interval = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let directory = PathBuf::from(DEFAULT_MANIFEST_DIRECTORY);
        let lock_retries = DEFAULT_LOCK_RETRIES;
        let retry_interval = Duration::from_millis(DEFAULT_LOCK_RETRY_INTERVAL_MS);
        Self {
            directory,
            lock_retries,
            retry_interval,
        }
    }
}

/// The manifest of a single network.
#[derive(Debug)]
pub struct Manifest {
    config: Config,

    /// The path of the manifest file.
    file: PathBuf,

    /// The open lock file, while the lock is held.
    lock: Option<File>,
}

impl Manifest {
    /// Creates the manifest for the network with the provided `chain_id`.
    ///
    /// Nothing is read from disk until the manifest is used.
    #[must_use]
    pub fn new(chain_id: u64, config: Config) -> Self {
        let network = Network::from_chain_id(chain_id);
        let file = config.directory.join(format!("{network}.json"));
        Self {
            config,
            file,
            lock: None,
        }
    }

    /// Creates the manifest for the network with the provided `chain_id` in
    /// the default location.
    #[must_use]
    pub fn for_network(chain_id: u64) -> Self {
        Self::new(chain_id, Config::default())
    }

    /// Gets the path of the manifest file.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Checks if this manifest currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Reads the manifest, taking the lock for the duration of the read unless
    /// it is already held.
    ///
    /// A manifest that does not exist yet reads as an empty one, and a
    /// manifest of the previous schema version is migrated on the fly.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the lock cannot be taken, if the file cannot be read
    /// or parsed, or if its schema version is not supported.
    pub fn read(&mut self) -> Result<ManifestData> {
        if self.is_locked() {
            self.read_file()
        } else {
            let guard = self.acquire()?;
            guard.read_file()
        }
    }

    /// Writes `data` to the manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the lock is not held or if the file cannot be
    /// written.
    pub fn write(&self, data: &ManifestData) -> Result<()> {
        if !self.is_locked() {
            return Err(Error::NotLocked);
        }

        let mut json = serde_json::to_string_pretty(data).map_err(|source| Error::Json {
            path: self.file.clone(),
            source,
        })?;
        json.push('\n');

        // The new contents are written beside the manifest and renamed over it,
        // so readers see either the old file or the new one.
        let directory = self
            .file
            .parent()
            .filter(|directory| !directory.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged =
            NamedTempFile::new_in(directory).map_err(|source| io_error(directory, source))?;
        staged
            .write_all(json.as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|source| io_error(staged.path(), source))?;
        staged
            .persist(&self.file)
            .map_err(|e| io_error(&self.file, e.error))?;
        debug!(file = %self.file.display(), "Wrote manifest");

        Ok(())
    }

    /// Runs `f` while holding the lock, releasing it afterwards whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the lock is already held by this manifest, if it
    /// cannot be taken, or if `f` fails.
    pub fn locked_run<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Manifest) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        if self.is_locked() {
            return Err(Error::AlreadyLocked.into());
        }

        let mut guard = self.acquire()?;
        f(&mut *guard)
    }

    /// Gets the proxy admin recorded in the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the manifest cannot be read.
    pub fn admin(&mut self) -> Result<Option<Deployment>> {
        Ok(self.read()?.admin)
    }

    /// Finds the implementation deployed at `address`.
    ///
    /// Addresses are compared by value, so differences in letter case (as in
    /// checksummed addresses) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the manifest cannot be read or has no implementation
    /// at `address`.
    pub fn deployment_from_address(&mut self, address: &str) -> Result<ImplDeployment> {
        self.read()?
            .impls
            .into_values()
            .flatten()
            .find(|deployment| same_address(&deployment.deployment.address, address))
            .ok_or_else(|| Error::DeploymentNotFound {
                address: address.to_string(),
            })
    }

    /// Reads and checks the manifest file without touching the lock.
    fn read_file(&self) -> Result<ManifestData> {
        let contents = match fs::read_to_string(&self.file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ManifestData::default()),
            Err(e) => return Err(io_error(&self.file, e)),
        };

        let json_error = |source| Error::Json {
            path: self.file.clone(),
            source,
        };
        let mut data: serde_json::Value = serde_json::from_str(&contents).map_err(json_error)?;
        version::validate_or_migrate(&mut data)?;
        serde_json::from_value(data).map_err(json_error)
    }

    /// Takes the lock, retrying while it is held elsewhere.
    fn acquire(&mut self) -> Result<LockGuard<'_>> {
        if let Some(directory) = self.file.parent() {
            fs::create_dir_all(directory).map_err(|e| io_error(directory, e))?;
        }

        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;

        let attempts = self.config.lock_retries + 1;
        for attempt in 1..=attempts {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %path.display(), attempt, "Locked manifest");
                    self.lock = Some(file);
                    return Ok(LockGuard { manifest: self });
                }
                Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                    if attempt < attempts {
                        warn!(
                            lock = %path.display(),
                            attempt,
                            "Manifest is locked elsewhere, retrying"
                        );
                        thread::sleep(self.config.retry_interval);
                    }
                }
                Err(e) => return Err(io_error(&path, e)),
            }
        }

        Err(Error::LockContention { path, attempts })
    }

    /// Releases the lock if it is held.
    fn release(&mut self) {
        if let Some(file) = self.lock.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!(lock = %self.lock_path().display(), error = %e, "Failed to unlock manifest");
            }
        }
    }

    /// Gets the path of the sidecar lock file.
    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.file.as_os_str());
        name.push(".");
        name.push(LOCK_FILE_EXTENSION);
        PathBuf::from(name)
    }
}

impl Drop for Manifest {
    fn drop(&mut self) {
        self.release();
    }
}

/// Holds the lock of a [`Manifest`], releasing it when dropped.
struct LockGuard<'m> {
    manifest: &'m mut Manifest,
}

impl Deref for LockGuard<'_> {
    type Target = Manifest;

    fn deref(&self) -> &Self::Target {
        self.manifest
    }
}

impl DerefMut for LockGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.manifest
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manifest.release();
    }
}

fn io_error(path: &Path, source: io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Checks if two hexadecimal addresses are the same, ignoring letter case.
///
/// Strings that are not hexadecimal are compared exactly.
fn same_address(left: &str, right: &str) -> bool {
    let decode = |address: &str| hex::decode(address.strip_prefix("0x").unwrap_or(address));
    match (decode(left), decode(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}
