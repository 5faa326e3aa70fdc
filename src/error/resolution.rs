//! This module contains errors pertaining to the resolution of declarations in
//! the compiled program and to the extraction of storage layouts from them.

use thiserror::Error;

use crate::{ast::NodeId, error::container};

/// Errors that occur while resolving references in the compiled program's AST
/// or while turning its declarations into a [`crate::layout::Layout`].
///
/// All of these indicate malformed or partially-compiled input, and are never
/// worth retrying.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("No declaration with node id {id} exists in the compiled program")]
    NotFound { id: NodeId },

    #[error("Node {id} is a {found} but a {expected} was expected")]
    WrongNodeType {
        id:       NodeId,
        expected: String,
        found:    String,
    },

    #[error("No contract named {name:?} exists in the compiled program")]
    ContractNotFound { name: String },

    #[error("Found {count} contracts named {name:?} where exactly one was expected")]
    AmbiguousContract { name: String, count: usize },

    #[error("The type annotation at node {node} has no type identifier")]
    MissingTypeIdentifier { node: NodeId },

    #[error("The type {id:?} cannot be placed in storage")]
    UnsupportedType { id: String },

    #[error("Declarations {first} and {second} both stabilize to the type id {id:?}")]
    AmbiguousTypeId {
        id:     String,
        first:  NodeId,
        second: NodeId,
    },

    #[error("The type {id:?} is too large to be placed in storage")]
    OversizedType { id: String },

    #[error("The type {id:?} contains itself, so it has no finite size")]
    SelfContainingType { id: String },

    #[error("The compiled program could not be read: {_0}")]
    InvalidAst(String),
}

/// A resolution error with an associated source location.
pub type LocatedError = container::Located<Error>;

/// The result type for methods that may have resolution errors.
pub type Result<T> = std::result::Result<T, Error>;
