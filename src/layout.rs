//! This module contains the definitions for the layout representation types.
//!
//! A [`Layout`] is the canonical description of a contract's storage: the
//! ordered list of its slots, and the registry of every type those slots
//! refer to. Types are referred to by canonical [`TypeId`]s, so that layouts
//! extracted from independent compilations of the same code are identical.

use std::{
    borrow::Borrow,
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::{constant::BYTE_SIZE_BITS, utility::U256Wrapper};

/// A canonical type identifier, such as `t_uint256` or
/// `t_mapping(t_address,t_struct(Data)storage)`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    /// Wraps the already-canonical identifier `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gets the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for TypeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The storage layout of a contract.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Layout {
    /// The contract's storage items, ordered as declared, with the items of
    /// base contracts before those of the contracts that inherit from them.
    pub storage: Vec<StorageItem>,

    /// Every type referenced by `storage`, directly or transitively.
    pub types: BTreeMap<TypeId, TypeItem>,
}

impl Layout {
    /// Gets the registry entry for the type `id`, if it is known.
    #[must_use]
    pub fn type_item(&self, id: &TypeId) -> Option<&TypeItem> {
        self.types.get(id)
    }

    /// Gets the storage item with the provided `label`, if any.
    #[must_use]
    pub fn item(&self, label: &str) -> Option<&StorageItem> {
        self.storage.iter().find(|item| item.label == label)
    }

    /// Gets the number of storage items in the layout.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Checks if the layout declares no storage at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

/// A single declared storage variable.
///
/// Items compare equal regardless of the source location they were found at.
#[derive(Clone, Debug, Derivative, Deserialize, Eq, Serialize)]
#[derivative(PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct StorageItem {
    /// The name of the contract that declares the variable.
    pub contract: String,

    /// The name of the variable.
    pub label: String,

    /// The canonical id of the variable's type.
    #[serde(rename = "type")]
    pub typ: TypeId,

    /// The slot at which the variable starts.
    pub slot: U256Wrapper,

    /// The byte offset within `slot` at which the variable starts.
    pub offset: usize,

    /// The decoded source location of the declaration.
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// The label the variable had in a previous version, as declared by its
    /// documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
}

/// A member of a struct.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct StructMember {
    /// The name of the member.
    pub label: String,

    /// The canonical id of the member's type.
    #[serde(rename = "type")]
    pub typ: TypeId,
}

/// A type known to a [`Layout`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeItem {
    /// The human-readable name of the type, as written by the compiler.
    pub label: String,

    /// The number of bytes of storage that a value of the type occupies in
    /// place.
    pub number_of_bytes: U256Wrapper,

    /// The structure of the type.
    #[serde(flatten)]
    pub kind: TypeKind,
}

impl TypeItem {
    /// Gets the struct members of the type, if it is a struct whose members
    /// are known.
    #[must_use]
    pub fn struct_members(&self) -> Option<&[StructMember]> {
        match &self.kind {
            TypeKind::Struct { members } => members.as_deref(),
            _ => None,
        }
    }

    /// Gets the enum members of the type, if it is an enum whose members are
    /// known.
    #[must_use]
    pub fn enum_members(&self) -> Option<&[String]> {
        match &self.kind {
            TypeKind::Enum { members } => members.as_deref(),
            _ => None,
        }
    }

    /// Removes the member information of a struct or enum, leaving a type
    /// whose structure cannot be inspected.
    ///
    /// This is how layouts read from sources that do not record members (or
    /// degraded on purpose for testing) appear to the comparator.
    pub fn strip_members(&mut self) {
        match &mut self.kind {
            TypeKind::Struct { members } => *members = None,
            TypeKind::Enum { members } => *members = None,
            _ => (),
        }
    }
}

/// The structural variants of types that can be stored.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeKind {
    /// An elementary value type (integers, `address`, `bool`, `bytesN`,
    /// `bytes`, `string`, function types and user-defined value types).
    Value,

    /// A reference to a contract, stored as an address.
    Contract,

    /// A struct, with its members in declaration order when known.
    Struct {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        members: Option<Vec<StructMember>>,
    },

    /// An enum, with its member names in declaration order when known.
    Enum {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        members: Option<Vec<String>>,
    },

    /// A mapping, where only the `value` occupies storage.
    Mapping { key: TypeId, value: TypeId },

    /// A fixed or dynamically-sized array of `element`s.
    Array { element: TypeId, length: ArrayLength },
}

/// The length of an array type.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrayLength {
    /// The array has a length fixed at compile time.
    Fixed(U256Wrapper),

    /// The array's length is stored in its slot.
    Dynamic,
}

/// Computes the number of bytes used to store an enum with `member_count`
/// members.
///
/// This is the smallest number of bytes that can represent every member's
/// index.
#[must_use]
pub fn enum_size(member_count: usize) -> usize {
    let count = member_count.max(2);
    let bits = (usize::BITS - (count - 1).leading_zeros()) as usize;
    bits.div_ceil(BYTE_SIZE_BITS)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        layout::{enum_size, ArrayLength, StorageItem, TypeId, TypeItem, TypeKind},
        utility::U256Wrapper,
    };

    #[test]
    fn computes_enum_sizes() {
        assert_eq!(enum_size(0), 1);
        assert_eq!(enum_size(2), 1);
        assert_eq!(enum_size(256), 1);
        assert_eq!(enum_size(257), 2);
        assert_eq!(enum_size(65_536), 2);
        assert_eq!(enum_size(65_537), 3);
    }

    #[test]
    fn storage_items_ignore_source_locations() {
        let item = StorageItem {
            contract:     "C".into(),
            label:        "x".into(),
            typ:          TypeId::new("t_uint256"),
            slot:         U256Wrapper::ZERO,
            offset:       0,
            src:          Some("C.sol:3".into()),
            renamed_from: None,
        };
        let mut moved = item.clone();
        moved.src = Some("C.sol:30".into());
        assert_eq!(item, moved);
    }

    #[test]
    fn type_items_serialize_flat() -> anyhow::Result<()> {
        let item = TypeItem {
            label:           "uint256[3]".into(),
            number_of_bytes: 96_usize.into(),
            kind:            TypeKind::Array {
                element: TypeId::new("t_uint256"),
                length:  ArrayLength::Fixed(3_usize.into()),
            },
        };
        let value = serde_json::to_value(&item)?;
        assert_eq!(
            value,
            json!({
                "label": "uint256[3]",
                "numberOfBytes": "96",
                "kind": "array",
                "element": "t_uint256",
                "length": { "fixed": "3" }
            })
        );
        assert_eq!(serde_json::from_value::<TypeItem>(value)?, item);

        Ok(())
    }

    #[test]
    fn stripping_members_makes_structs_opaque() {
        let mut item = TypeItem {
            label:           "enum E".into(),
            number_of_bytes: 1_usize.into(),
            kind:            TypeKind::Enum {
                members: Some(vec!["A".into(), "B".into()]),
            },
        };
        assert_eq!(item.enum_members().map(<[String]>::len), Some(2));
        item.strip_members();
        assert_eq!(item.enum_members(), None);
    }
}
