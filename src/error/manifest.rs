//! This module contains errors pertaining to the persisted deployment
//! manifests.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that occur while reading, writing, or locking a
/// [`crate::manifest::Manifest`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not access the manifest at {path}: {source}")]
    Io {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("The manifest at {path} is not valid: {source}")]
    Json {
        path:   PathBuf,
        source: serde_json::Error,
    },

    #[error("Manifest version is missing")]
    MissingVersion,

    #[error(
        "Found a manifest file with version {version}, written by a legacy tool. An automated \
         migration is not available"
    )]
    LegacyCli { version: String },

    #[error("Unknown value for manifest version ({version})")]
    UnknownVersion { version: String },

    #[error("Manifest migration not available from version {version}")]
    MigrationUnavailable { version: String },

    #[error("Manifest must be locked")]
    NotLocked,

    #[error("Manifest is already locked")]
    AlreadyLocked,

    #[error("The manifest lock at {path} is still held after {attempts} attempts")]
    LockContention { path: PathBuf, attempts: usize },

    #[error("Deployment at address {address} is not registered")]
    DeploymentNotFound { address: String },
}

/// The result type for methods that may have manifest errors.
pub type Result<T> = std::result::Result<T, Error>;
