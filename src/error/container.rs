use std::fmt::Formatter;

use thiserror::Error;

/// An error that is localised to a particular declaration in the contract
/// sources.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Located<E>
where
    E: Clone,
{
    /// The decoded source location (usually `file:line`) of the declaration
    /// being processed when the error occurred.
    pub location: String,

    /// The error data
    pub payload: E,
}

/// Displays the error prefixed by the source location where it occurred.
impl<E> std::fmt::Display for Located<E>
where
    E: std::fmt::Display + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.payload)
    }
}

/// A trait for types that can have a source location attached to them.
pub trait Locatable
where
    Self: Sized,
{
    /// The return type with the attached source location.
    type Located;

    /// Attach the source `location` to the error.
    fn locate(self, location: impl Into<String>) -> Self::Located;
}

/// A blanket implementation that allows for attaching a location to any result.
impl<T, E> Locatable for Result<T, E>
where
    E: std::error::Error + Clone,
{
    type Located = Result<T, Located<E>>;

    fn locate(self, location: impl Into<String>) -> Self::Located {
        self.map_err(|e| Located {
            location: location.into(),
            payload:  e,
        })
    }
}
