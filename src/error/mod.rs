//! This module contains the primary error type for the library's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod comparison;
pub mod container;
pub mod manifest;
pub mod resolution;

use thiserror::Error;

use crate::compare::report::StorageReport;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Subsystems should return the more-specific
/// child error types as appropriate.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors from resolving declarations that are not tied to a particular
    /// state variable.
    #[error(transparent)]
    Resolution(#[from] resolution::Error),

    /// Errors from resolving declarations while extracting the layout of a
    /// specific state variable.
    #[error(transparent)]
    Extraction(#[from] resolution::LocatedError),

    /// Errors from the layout comparison subsystem of the library.
    #[error(transparent)]
    Comparison(#[from] comparison::Error),

    /// Errors from the deployment manifest subsystem of the library.
    #[error(transparent)]
    Manifest(#[from] manifest::Error),

    /// The updated layout is not a safe replacement for the original one.
    #[error("{_0}")]
    UnsafeUpgrade(StorageReport),
}

impl Error {
    /// Gets the storage report if this error describes an unsafe upgrade.
    #[must_use]
    pub fn report(&self) -> Option<&StorageReport> {
        match self {
            Self::UnsafeUpgrade(report) => Some(report),
            _ => None,
        }
    }
}
