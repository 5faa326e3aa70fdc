//! This module contains the operations that the comparator reports when two
//! layouts differ.

use serde::Serialize;

use crate::layout::{StorageItem, StructMember, TypeId};

/// A named, typed position in storage, either a top-level storage item or a
/// member of a struct.
///
/// The comparator matches sequences of fields positionally, so it only needs
/// to know their labels and types.
pub trait StorageField: Clone {
    /// The name of the field.
    fn label(&self) -> &str;

    /// The canonical id of the field's type.
    fn type_id(&self) -> &TypeId;

    /// The label the field had in a previous version, if it declares one.
    fn renamed_from(&self) -> Option<&str> {
        None
    }

    /// The decoded source location of the field, if it is known.
    fn location(&self) -> Option<&str> {
        None
    }
}

impl StorageField for StorageItem {
    fn label(&self) -> &str {
        &self.label
    }

    fn type_id(&self) -> &TypeId {
        &self.typ
    }

    fn renamed_from(&self) -> Option<&str> {
        self.renamed_from.as_deref()
    }

    fn location(&self) -> Option<&str> {
        self.src.as_deref()
    }
}

impl StorageField for StructMember {
    fn label(&self) -> &str {
        &self.label
    }

    fn type_id(&self) -> &TypeId {
        &self.typ
    }
}

/// A difference found between the `original` and `updated` sequences of
/// fields at a given position.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageOperation<F> {
    /// A field was added after the end of the original fields.
    Append { updated: F },

    /// A field at the end of the original fields no longer exists.
    Delete { original: F },

    /// The field in this position changed its name but kept a compatible
    /// type.
    Rename { original: F, updated: F },

    /// The field in this position changed both its name and its type.
    Replace { original: F, updated: F },

    /// The field in this position kept its name but changed to an
    /// incompatible type.
    #[serde(rename = "typechange")]
    TypeChange {
        original: F,
        updated:  F,
        change:   TypeChange,
    },
}

impl<F> StorageOperation<F> {
    /// Gets the name of the kind of operation, as it is serialized.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Append { .. } => "append",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::Replace { .. } => "replace",
            Self::TypeChange { .. } => "typechange",
        }
    }

    /// Gets the original field involved in the operation, if any.
    #[must_use]
    pub fn original(&self) -> Option<&F> {
        match self {
            Self::Append { .. } => None,
            Self::Delete { original }
            | Self::Rename { original, .. }
            | Self::Replace { original, .. }
            | Self::TypeChange { original, .. } => Some(original),
        }
    }

    /// Gets the updated field involved in the operation, if any.
    #[must_use]
    pub fn updated(&self) -> Option<&F> {
        match self {
            Self::Delete { .. } => None,
            Self::Append { updated }
            | Self::Rename { updated, .. }
            | Self::Replace { updated, .. }
            | Self::TypeChange { updated, .. } => Some(updated),
        }
    }

    /// Gets the description of the type change, if this is a type change.
    #[must_use]
    pub fn change(&self) -> Option<&TypeChange> {
        match self {
            Self::TypeChange { change, .. } => Some(change),
            _ => None,
        }
    }

    /// Checks if the operation is an append, the only operation that is always
    /// safe.
    #[must_use]
    pub fn is_append(&self) -> bool {
        matches!(self, Self::Append { .. })
    }
}

/// The reason that the type `original` cannot be safely replaced by the type
/// `updated`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TypeChange {
    pub original: TypeId,
    pub updated:  TypeId,

    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl TypeChange {
    /// Creates a new change of the provided `kind` from `original` to
    /// `updated`.
    #[must_use]
    pub fn new(original: &TypeId, updated: &TypeId, kind: ChangeKind) -> Self {
        Self {
            original: original.clone(),
            updated: updated.clone(),
            kind,
        }
    }

    /// Gets the nested change, for changes that are inside a mapping or array.
    #[must_use]
    pub fn inner(&self) -> Option<&TypeChange> {
        match &self.kind {
            ChangeKind::MappingValue { inner } | ChangeKind::ArrayValue { inner } => Some(inner),
            _ => None,
        }
    }
}

/// The kinds of incompatibility between two types.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ChangeKind {
    /// The types are unrelated.
    #[serde(rename = "obvious mismatch")]
    ObviousMismatch,

    /// The types are structs or enums, but the members of at least one of them
    /// are not known.
    #[serde(rename = "missing members")]
    MissingMembers,

    /// The types are structs whose members are incompatible.
    #[serde(rename = "struct members")]
    StructMembers {
        ops: Vec<StorageOperation<StructMember>>,
    },

    /// The types are enums whose members were edited unsafely.
    #[serde(rename = "enum members")]
    EnumMembers { ops: Vec<EnumOperation> },

    /// The types are enums that need a different number of bytes.
    #[serde(rename = "enum resize")]
    EnumResize,

    /// The types are mappings with different key types.
    #[serde(rename = "mapping key")]
    MappingKey,

    /// The types are mappings with incompatible value types.
    #[serde(rename = "mapping value")]
    MappingValue { inner: Box<TypeChange> },

    /// The types are fixed-size arrays and the updated one is shorter.
    #[serde(rename = "array shrink")]
    ArrayShrink,

    /// The types are fixed-size arrays and the updated one is longer.
    #[serde(rename = "array grow")]
    ArrayGrow,

    /// One type is a fixed-size array and the other is dynamically sized.
    #[serde(rename = "array dynamic")]
    ArrayDynamic,

    /// The types are arrays with incompatible element types.
    #[serde(rename = "array value")]
    ArrayValue { inner: Box<TypeChange> },
}

impl ChangeKind {
    /// Gets the name of the kind of change, as it is serialized.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ObviousMismatch => "obvious mismatch",
            Self::MissingMembers => "missing members",
            Self::StructMembers { .. } => "struct members",
            Self::EnumMembers { .. } => "enum members",
            Self::EnumResize => "enum resize",
            Self::MappingKey => "mapping key",
            Self::MappingValue { .. } => "mapping value",
            Self::ArrayShrink => "array shrink",
            Self::ArrayGrow => "array grow",
            Self::ArrayDynamic => "array dynamic",
            Self::ArrayValue { .. } => "array value",
        }
    }
}

/// An unsafe edit to the members of an enum.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EnumOperation {
    /// The member `original` was removed.
    Delete { original: String },

    /// The member `updated` was added before the last original member.
    Insert { updated: String },

    /// The member `original` was renamed to `updated`.
    Replace { original: String, updated: String },
}

impl EnumOperation {
    /// Gets the name of the kind of operation, as it is serialized.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Insert { .. } => "insert",
            Self::Replace { .. } => "replace",
        }
    }
}
