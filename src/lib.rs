//! This library checks that a new version of an upgradeable
//! [Solidity](https://soliditylang.org) contract can safely replace the old
//! version, by verifying that the new contract's storage layout is compatible
//! with the layout of the data that the old one has already written.
//!
//! Incompatible changes to the layout silently corrupt the deployed state, so
//! the check is exhaustive and conservative: anything that it cannot prove
//! safe is reported.
//!
//! # How it Works
//!
//! From a very high level, the check is performed as follows:
//!
//! 1. The compiler's JSON AST output is read and indexed by an
//!    [`ast::resolver::Resolver`], which follows the integer cross-references
//!    between its nodes.
//! 2. The [`extractor`] walks the state variables of the contract and its
//!    bases, assigning each a slot and offset, and registering every type they
//!    use under a canonical id produced by
//!    [`type_id::stabilize_type_identifier`]. The result is a
//!    [`layout::Layout`].
//! 3. The [`compare::StorageLayoutComparator`] matches the storage of two
//!    layouts position by position, recursing into compound types, and returns
//!    a [`compare::operation::StorageOperation`] for every difference that is
//!    not an append.
//!
//! Layouts of deployed implementations can be persisted between runs in a
//! per-network [`manifest::Manifest`].
//!
//! # Basic Usage
//!
//! ```
//! use storage_layout_upgrades::{compare, compare::Config, layout::Layout};
//!
//! let original: Layout = serde_json::from_str(
//!     r#"{
//!         "storage": [
//!             {
//!                 "contract": "Box", "label": "value", "type": "t_uint256",
//!                 "slot": "0", "offset": 0
//!             }
//!         ],
//!         "types": {
//!             "t_uint256": { "label": "uint256", "numberOfBytes": "32", "kind": "value" }
//!         }
//!     }"#,
//! )?;
//!
//! let mut updated = original.clone();
//! updated.storage[0].label = "amount".into();
//!
//! let ops = compare(&original, &updated, &Config::default())?;
//! assert_eq!(ops.len(), 1);
//! assert_eq!(ops[0].kind(), "rename");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod ast;
pub mod compare;
pub mod constant;
pub mod error;
pub mod extractor;
pub mod layout;
pub mod manifest;
pub mod type_id;
pub mod utility;

// Re-exports to provide the library interface.
pub use compare::{compare, report::assert_storage_upgrade_safe};
pub use extractor::{extract_storage_layout, extract_storage_layout_by_name};
pub use layout::Layout;
