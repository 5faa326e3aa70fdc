//! This module contains the [`StorageLayoutComparator`], which decides whether
//! an updated storage layout can safely replace an original one.
//!
//! Storage items (and the members of structs) are matched by position. Types
//! are compared structurally, recursing into the members of structs and the
//! values of mappings and arrays, so two types with the same id may still be
//! found incompatible if their definitions changed between the layouts.

pub mod levenshtein;
pub mod operation;
pub mod report;

use std::collections::{HashMap, HashSet};

use itertools::{EitherOrBoth, Itertools};
use tracing::{debug, warn};

use crate::{
    compare::{
        levenshtein::{edit_script, Edit},
        operation::{ChangeKind, EnumOperation, StorageField, StorageOperation, TypeChange},
    },
    error,
    error::comparison::{Error, Result},
    layout::{
        enum_size,
        ArrayLength,
        Layout,
        StorageItem,
        StructMember,
        TypeId,
        TypeItem,
        TypeKind,
    },
};

/// Compares the `original` layout with the `updated` one, returning every
/// unsafe or auditable difference between them.
///
/// Items appended after the end of the original storage are safe and are not
/// reported.
///
/// # Errors
///
/// Returns [`Err`] if the layouts contain recursive types.
pub fn compare(
    original: &Layout,
    updated: &Layout,
    config: &Config,
) -> error::Result<Vec<StorageOperation<StorageItem>>> {
    let mut comparator = StorageLayoutComparator::new(original, updated, config.clone());
    Ok(comparator.compare_storage()?)
}

/// The configuration for the comparator.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Whether types whose members cannot be inspected are assumed to be
    /// compatible rather than reported.
    ///
    /// Defaults to `false`.
    pub unsafe_allow_custom_types: bool,
}

impl Config {
    /// Sets the `unsafe_allow_custom_types` config parameter to `value`.
    #[must_use]
    pub fn with_unsafe_allow_custom_types(mut self, value: bool) -> Self {
        self.unsafe_allow_custom_types = value;
        self
    }
}

/// The diff engine between an `original` and an `updated` layout.
///
/// A comparator remembers the result of every pair of types it has compared,
/// so comparing many items of the same types is cheap.
#[derive(Debug)]
pub struct StorageLayoutComparator<'a> {
    config: Config,

    /// The layout being upgraded from.
    original: &'a Layout,

    /// The layout being upgraded to.
    updated: &'a Layout,

    /// The pairs of types whose comparison is currently in progress.
    visiting: HashSet<(TypeId, TypeId)>,

    /// The results of completed type comparisons.
    cache: HashMap<(TypeId, TypeId), Option<TypeChange>>,

    /// Whether a type was assumed compatible because of
    /// [`Config::unsafe_allow_custom_types`].
    has_allowed_unchecked_custom_types: bool,
}

impl<'a> StorageLayoutComparator<'a> {
    /// Creates a comparator between the `original` and `updated` layouts.
    #[must_use]
    pub fn new(original: &'a Layout, updated: &'a Layout, config: Config) -> Self {
        Self {
            config,
            original,
            updated,
            visiting: HashSet::new(),
            cache: HashMap::new(),
            has_allowed_unchecked_custom_types: false,
        }
    }

    /// Compares the storage of the two layouts.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the layouts contain recursive types.
    pub fn compare_storage(&mut self) -> Result<Vec<StorageOperation<StorageItem>>> {
        let (original, updated) = (self.original, self.updated);
        let ops = self.compare_fields(&original.storage, &updated.storage)?;
        Ok(ops.into_iter().filter(|op| !op.is_append()).collect())
    }

    /// Checks whether any type was assumed compatible only because
    /// [`Config::unsafe_allow_custom_types`] was set.
    #[must_use]
    pub fn has_allowed_unchecked_custom_types(&self) -> bool {
        self.has_allowed_unchecked_custom_types
    }

    /// Matches `original` with `updated` field by field.
    fn compare_fields<F: StorageField>(
        &mut self,
        original: &[F],
        updated: &[F],
    ) -> Result<Vec<StorageOperation<F>>> {
        let mut ops = Vec::new();
        for pair in original.iter().zip_longest(updated) {
            let op = match pair {
                EitherOrBoth::Both(original, updated) => self.compare_field(original, updated)?,
                EitherOrBoth::Left(original) => Some(StorageOperation::Delete {
                    original: original.clone(),
                }),
                EitherOrBoth::Right(updated) => Some(StorageOperation::Append {
                    updated: updated.clone(),
                }),
            };
            ops.extend(op);
        }

        Ok(ops)
    }

    /// Compares two fields in the same position.
    fn compare_field<F: StorageField>(
        &mut self,
        original: &F,
        updated: &F,
    ) -> Result<Option<StorageOperation<F>>> {
        let same_label = original.label() == updated.label()
            || updated.renamed_from() == Some(original.label());
        let change = self.compare_types(updated.label(), original.type_id(), updated.type_id())?;

        let (original, updated) = (original.clone(), updated.clone());
        let op = match (same_label, change) {
            (true, None) => None,
            (true, Some(change)) => Some(StorageOperation::TypeChange {
                original,
                updated,
                change,
            }),
            (false, None) => Some(StorageOperation::Rename { original, updated }),
            (false, Some(_)) => Some(StorageOperation::Replace { original, updated }),
        };

        Ok(op)
    }

    /// Works out why the type `original` cannot be replaced by `updated`,
    /// returning [`None`] if it can.
    ///
    /// The `label` names the field being compared, for diagnostics.
    fn compare_types(
        &mut self,
        label: &str,
        original: &TypeId,
        updated: &TypeId,
    ) -> Result<Option<TypeChange>> {
        let key = (original.clone(), updated.clone());
        if let Some(change) = self.cache.get(&key) {
            return Ok(change.clone());
        }
        if !self.visiting.insert(key.clone()) {
            return Err(Error::Recursion {
                original: original.clone(),
                updated:  updated.clone(),
                label:    label.to_string(),
            });
        }

        debug!(%original, %updated, label, "Comparing types");
        let result = self.compare_shapes(label, original, updated);
        self.visiting.remove(&key);

        let change = result?;
        self.cache.insert(key, change.clone());
        Ok(change)
    }

    fn compare_shapes(
        &mut self,
        label: &str,
        original: &TypeId,
        updated: &TypeId,
    ) -> Result<Option<TypeChange>> {
        let (original_layout, updated_layout) = (self.original, self.updated);
        let original_shape = Shape::of(original, original_layout.type_item(original));
        let updated_shape = Shape::of(updated, updated_layout.type_item(updated));
        let change = |kind| Some(TypeChange::new(original, updated, kind));

        let result = match (original_shape, updated_shape) {
            (Shape::Contract, Shape::Contract) => None,
            (Shape::Contract, Shape::Value) if is_address(updated) => None,
            (Shape::Value, Shape::Contract) if is_address(original) => None,
            (Shape::Value, Shape::Value) => {
                if value_family(original) == value_family(updated) {
                    None
                } else {
                    change(ChangeKind::ObviousMismatch)
                }
            }
            (Shape::Struct(Some(original_members)), Shape::Struct(Some(updated_members))) => {
                let ops = self.compare_fields(original_members, updated_members)?;
                if ops.is_empty() {
                    None
                } else {
                    change(ChangeKind::StructMembers { ops })
                }
            }
            (Shape::Enum(Some(original_members)), Shape::Enum(Some(updated_members))) => {
                if enum_size(original_members.len()) == enum_size(updated_members.len()) {
                    let ops = enum_operations(original_members, updated_members);
                    if ops.is_empty() {
                        None
                    } else {
                        change(ChangeKind::EnumMembers { ops })
                    }
                } else {
                    change(ChangeKind::EnumResize)
                }
            }
            (Shape::Struct(_), Shape::Struct(_)) | (Shape::Enum(_), Shape::Enum(_)) => {
                self.missing_members(original, updated)
            }
            (
                Shape::Mapping(original_key, original_value),
                Shape::Mapping(updated_key, updated_value),
            ) => {
                if self.compare_types(label, original_key, updated_key)?.is_some() {
                    change(ChangeKind::MappingKey)
                } else {
                    self.compare_types(label, original_value, updated_value)?
                        .and_then(|inner| {
                            change(ChangeKind::MappingValue {
                                inner: Box::new(inner),
                            })
                        })
                }
            }
            (
                Shape::Array(original_element, original_length),
                Shape::Array(updated_element, updated_length),
            ) => match (original_length, updated_length) {
                (ArrayLength::Fixed(_), ArrayLength::Dynamic)
                | (ArrayLength::Dynamic, ArrayLength::Fixed(_)) => change(ChangeKind::ArrayDynamic),
                (ArrayLength::Fixed(original_length), ArrayLength::Fixed(updated_length))
                    if updated_length < original_length =>
                {
                    change(ChangeKind::ArrayShrink)
                }
                (ArrayLength::Fixed(original_length), ArrayLength::Fixed(updated_length))
                    if updated_length > original_length =>
                {
                    change(ChangeKind::ArrayGrow)
                }
                _ => self
                    .compare_types(label, original_element, updated_element)?
                    .and_then(|inner| {
                        change(ChangeKind::ArrayValue {
                            inner: Box::new(inner),
                        })
                    }),
            },
            (Shape::Unresolved, _) | (_, Shape::Unresolved) if original == updated => None,
            _ => change(ChangeKind::ObviousMismatch),
        };

        Ok(result)
    }

    /// Handles a pair of structs or enums whose members are not all known.
    fn missing_members(&mut self, original: &TypeId, updated: &TypeId) -> Option<TypeChange> {
        if self.config.unsafe_allow_custom_types {
            warn!(
                %original,
                %updated,
                "Assuming types with unknown members are compatible"
            );
            self.has_allowed_unchecked_custom_types = true;
            None
        } else {
            Some(TypeChange::new(original, updated, ChangeKind::MissingMembers))
        }
    }
}

/// The structure of a type as far as the comparator is concerned.
#[derive(Clone, Copy, Debug)]
enum Shape<'t> {
    Value,
    Contract,
    Struct(Option<&'t [StructMember]>),
    Enum(Option<&'t [String]>),
    Mapping(&'t TypeId, &'t TypeId),
    Array(&'t TypeId, ArrayLength),

    /// A type that the layout does not describe.
    Unresolved,
}

impl<'t> Shape<'t> {
    /// Gets the shape of the type `id`, whose registry entry is `item`.
    ///
    /// Types missing from the registry are treated as opaque if their id shows
    /// what kind of type they are.
    fn of(id: &TypeId, item: Option<&'t TypeItem>) -> Self {
        match item.map(|item| &item.kind) {
            Some(TypeKind::Value) => Self::Value,
            Some(TypeKind::Contract) => Self::Contract,
            Some(TypeKind::Struct { members }) => Self::Struct(members.as_deref()),
            Some(TypeKind::Enum { members }) => Self::Enum(members.as_deref()),
            Some(TypeKind::Mapping { key, value }) => Self::Mapping(key, value),
            Some(TypeKind::Array { element, length }) => Self::Array(element, *length),
            None if id.as_str().starts_with("t_struct(") => Self::Struct(None),
            None if id.as_str().starts_with("t_enum(") => Self::Enum(None),
            None if id.as_str().starts_with("t_contract(") => Self::Contract,
            None => Self::Unresolved,
        }
    }
}

/// Checks if the value type `id` is an address.
fn is_address(id: &TypeId) -> bool {
    value_family(id) == "t_address"
}

/// Gets the id that a value type is compared by, which is its own id except
/// for the types that share a representation.
fn value_family(id: &TypeId) -> &str {
    match id.as_str() {
        "t_address_payable" => "t_address",
        other => other,
    }
}

/// Describes the unsafe edits between two lists of enum members.
///
/// Members appended at the end are safe and are not described.
fn enum_operations(original: &[String], updated: &[String]) -> Vec<EnumOperation> {
    edit_script(original, updated)
        .into_iter()
        .filter_map(|edit| match edit {
            Edit::Keep { .. } | Edit::Insert { append: true, .. } => None,
            Edit::Substitute { original, updated } => Some(EnumOperation::Replace {
                original: original.clone(),
                updated:  updated.clone(),
            }),
            Edit::Insert { updated, .. } => Some(EnumOperation::Insert {
                updated: updated.clone(),
            }),
            Edit::Delete { original } => Some(EnumOperation::Delete {
                original: original.clone(),
            }),
        })
        .collect()
}
