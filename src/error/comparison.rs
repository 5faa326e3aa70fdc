//! This module contains errors pertaining to the comparison of two storage
//! layouts.

use thiserror::Error;

use crate::layout::TypeId;

/// Errors that stop the [`crate::compare::StorageLayoutComparator`] from
/// producing a result.
///
/// Incompatibilities between layouts are _not_ errors. They are reported as
/// [`crate::compare::operation::StorageOperation`]s in the successful result.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error(
        "Recursion found in {label} while comparing {original} with {updated}: recursive types \
         are not supported"
    )]
    Recursion {
        original: TypeId,
        updated:  TypeId,
        label:    String,
    },
}

/// The result type for methods that may have comparison errors.
pub type Result<T> = std::result::Result<T, Error>;
