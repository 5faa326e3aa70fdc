//! This module contains the extraction of a [`Layout`] from a compiled
//! contract's AST.
//!
//! The state variables of the contract and of every contract it inherits from
//! are laid out in linearization order, from the most basic base contract to
//! the contract itself. Each variable's type is registered (recursively) with
//! the layout under its canonical [`TypeId`], and the variable is assigned a
//! slot and offset according to the [`packing`] rules.

pub mod packing;

use std::collections::{BTreeMap, HashMap, HashSet};

use ethnum::U256;
use tracing::{debug, trace};

use crate::{
    ast::{
        resolver::{Declaration, Resolver},
        source::SourceDecoder,
        ContractDefinition,
        NodeId,
        TypeName,
    },
    constant::ADDRESS_WIDTH_BYTES,
    error,
    error::{
        container::Locatable,
        resolution::{Error, Result},
    },
    extractor::packing::{
        fixed_array_footprint,
        struct_footprint,
        value_footprint,
        Footprint,
        SlotAllocator,
    },
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
    type_id::{array_length, stabilize_type_identifier_with},
    utility::U256Wrapper,
};

/// Extracts the storage layout of `contract`.
///
/// The `resolver` must index the compilation that `contract` belongs to, and
/// the `decoder` is used to make the source locations of items and errors
/// human-readable.
///
/// # Errors
///
/// Returns [`Err`] if any of the contract's bases or the declarations their
/// state variables refer to cannot be resolved, or if a variable's type cannot
/// be placed in storage.
pub fn extract_storage_layout(
    contract: &ContractDefinition,
    decoder: &impl SourceDecoder,
    resolver: &Resolver,
) -> error::Result<Layout> {
    let bases = resolver.linearized_bases(contract)?;
    let mut registry = TypeRegistry::new(resolver);
    let mut allocator = SlotAllocator::new();
    let mut storage = Vec::new();

    for base in bases {
        for var in base.state_variables() {
            let location = decoder.decode(&var.src);
            let typ = registry.register(&var.type_name).locate(location.clone())?;
            let footprint = registry.footprint(&typ).locate(location.clone())?;
            let (slot, offset) = allocator
                .place(footprint)
                .ok_or_else(|| Error::OversizedType {
                    id: typ.to_string(),
                })
                .locate(location.clone())?;

            storage.push(StorageItem {
                contract: base.name.clone(),
                label: var.name.clone(),
                typ,
                slot: slot.into(),
                offset,
                src: Some(location),
                renamed_from: var.renamed_from(),
            });
        }
    }

    let types = registry.into_types().locate(decoder.decode(&contract.src))?;
    debug!(
        contract = %contract.name,
        items = storage.len(),
        types = types.len(),
        "Extracted storage layout"
    );

    Ok(Layout { storage, types })
}

/// Extracts the storage layout of the single contract called `name` in the
/// compilation indexed by `resolver`.
///
/// # Errors
///
/// Returns [`Err`] if there is not exactly one contract called `name`, or if
/// [`extract_storage_layout`] fails for it.
pub fn extract_storage_layout_by_name(
    name: &str,
    decoder: &impl SourceDecoder,
    resolver: &Resolver,
) -> error::Result<Layout> {
    let contract = resolver.contract_by_name(name)?;
    extract_storage_layout(contract, decoder, resolver)
}

/// The types discovered so far during an extraction.
#[derive(Debug)]
struct TypeRegistry<'a> {
    resolver: &'a Resolver,

    /// The registered types.
    types: BTreeMap<TypeId, TypeItem>,

    /// How the footprint of each registered type follows from those of the
    /// types it refers to.
    sizings: HashMap<TypeId, Sizing>,

    /// The footprints computed so far.
    footprints: HashMap<TypeId, Footprint>,

    /// The declaration that each user-defined type id was derived from.
    origins: HashMap<TypeId, NodeId>,
}

/// The rule that determines the in-place storage footprint of a type.
///
/// Footprints are only computed once the whole type graph reachable from a
/// variable has been registered, as a struct may be reached (through a
/// mapping) while its own members are still being registered.
#[derive(Clone, Debug)]
enum Sizing {
    Known(Footprint),
    SameAs(TypeId),
    FixedArray { element: TypeId, length: U256 },
    Struct(Vec<TypeId>),
}

impl<'a> TypeRegistry<'a> {
    fn new(resolver: &'a Resolver) -> Self {
        Self {
            resolver,
            types: BTreeMap::new(),
            sizings: HashMap::new(),
            footprints: HashMap::new(),
            origins: HashMap::new(),
        }
    }

    /// Gets the footprint of the already-registered type `id`.
    fn footprint(&mut self, id: &TypeId) -> Result<Footprint> {
        self.footprint_within(id, &mut HashSet::new())
    }

    /// Computes the footprint of `id`, where `enclosing` holds the types whose
    /// footprints depend on it.
    fn footprint_within(
        &mut self,
        id: &TypeId,
        enclosing: &mut HashSet<TypeId>,
    ) -> Result<Footprint> {
        if let Some(footprint) = self.footprints.get(id) {
            return Ok(*footprint);
        }
        if !enclosing.insert(id.clone()) {
            return Err(Error::SelfContainingType { id: id.to_string() });
        }

        let sizing = self
            .sizings
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnsupportedType { id: id.to_string() })?;
        let oversized = || Error::OversizedType { id: id.to_string() };
        let footprint = match sizing {
            Sizing::Known(footprint) => footprint,
            Sizing::SameAs(other) => self.footprint_within(&other, enclosing)?,
            Sizing::FixedArray { element, length } => {
                let element = self.footprint_within(&element, enclosing)?;
                fixed_array_footprint(element, length).ok_or_else(oversized)?
            }
            Sizing::Struct(members) => {
                let footprints = members
                    .iter()
                    .map(|member| self.footprint_within(member, enclosing))
                    .collect::<Result<Vec<_>>>()?;
                struct_footprint(footprints).ok_or_else(oversized)?
            }
        };
        enclosing.remove(id);

        trace!(%id, bytes = %footprint.bytes, "Sized storage type");
        self.footprints.insert(id.clone(), footprint);
        if let Some(item) = self.types.get_mut(id) {
            item.number_of_bytes = footprint.bytes.into();
        }
        Ok(footprint)
    }

    /// Sizes every registered type that has not been sized yet, and returns
    /// the registered types.
    fn into_types(mut self) -> Result<BTreeMap<TypeId, TypeItem>> {
        let unsized_ids = self
            .sizings
            .keys()
            .filter(|id| !self.footprints.contains_key(*id))
            .cloned()
            .collect::<Vec<_>>();
        for id in unsized_ids {
            self.footprint(&id)?;
        }
        Ok(self.types)
    }

    /// Registers the type annotated by `type_name` and everything it refers
    /// to, returning its canonical id.
    fn register(&mut self, type_name: &TypeName) -> Result<TypeId> {
        let resolver = self.resolver;
        let descriptions = type_name.type_descriptions();
        let raw = descriptions
            .type_identifier
            .as_deref()
            .ok_or(Error::MissingTypeIdentifier {
                node: type_name.id(),
            })?;
        let id = TypeId::new(stabilize_type_identifier_with(raw, |node| {
            resolver.qualified_name(node)
        }));

        let declaration = match type_name {
            TypeName::UserDefinedTypeName(user) => {
                let declaration = resolver.resolve_user_type(user)?;
                self.record_origin(&id, declaration.id())?;
                Some(declaration)
            }
            _ => None,
        };

        if self.types.contains_key(&id) {
            return Ok(id);
        }

        let label = descriptions
            .type_string
            .clone()
            .unwrap_or_else(|| id.to_string());

        let (kind, sizing) = match (type_name, declaration) {
            (TypeName::ElementaryTypeName(_) | TypeName::FunctionTypeName(_), _) => {
                (TypeKind::Value, Sizing::Known(self.value_footprint(&id)?))
            }
            (TypeName::Mapping(mapping), _) => {
                let key = self.register(&mapping.key_type)?;
                let value = self.register(&mapping.value_type)?;
                (TypeKind::Mapping { key, value }, Sizing::Known(Footprint::word()))
            }
            (TypeName::ArrayTypeName(array), _) => {
                let element = self.register(&array.base_type)?;
                let length = array_length(id.as_str()).ok_or_else(|| Error::UnsupportedType {
                    id: id.to_string(),
                })?;
                let sizing = match length {
                    ArrayLength::Dynamic => Sizing::Known(Footprint::word()),
                    ArrayLength::Fixed(length) => Sizing::FixedArray {
                        element: element.clone(),
                        length:  length.0,
                    },
                };
                (TypeKind::Array { element, length }, sizing)
            }
            (TypeName::UserDefinedTypeName(_), Some(Declaration::Contract(_))) => (
                TypeKind::Contract,
                Sizing::Known(Footprint::packed(ADDRESS_WIDTH_BYTES)),
            ),
            (TypeName::UserDefinedTypeName(_), Some(Declaration::Enum(definition))) => {
                let members = definition.members.iter().map(|m| m.name.clone()).collect::<Vec<_>>();
                let footprint = Footprint::packed(enum_size(members.len()));
                (
                    TypeKind::Enum {
                        members: Some(members),
                    },
                    Sizing::Known(footprint),
                )
            }
            (TypeName::UserDefinedTypeName(_), Some(Declaration::UserDefinedValueType(udvt))) => {
                let underlying = self.register(&udvt.underlying_type)?;
                (TypeKind::Value, Sizing::SameAs(underlying))
            }
            (TypeName::UserDefinedTypeName(_), Some(Declaration::Struct(definition))) => {
                // Structs may refer to themselves through mappings and dynamic
                // arrays, so the id must be known before the members are.
                let placeholder = TypeItem {
                    label:           label.clone(),
                    number_of_bytes: U256Wrapper::ZERO,
                    kind:            TypeKind::Struct { members: None },
                };
                self.types.insert(id.clone(), placeholder);

                let mut members = Vec::with_capacity(definition.members.len());
                for member in &definition.members {
                    members.push(StructMember {
                        label: member.name.clone(),
                        typ:   self.register(&member.type_name)?,
                    });
                }

                let sizing = Sizing::Struct(members.iter().map(|m| m.typ.clone()).collect());
                (
                    TypeKind::Struct {
                        members: Some(members),
                    },
                    sizing,
                )
            }
            (TypeName::UserDefinedTypeName(_), None) => {
                return Err(Error::UnsupportedType { id: id.to_string() });
            }
        };

        trace!(%id, "Registered storage type");
        self.types.insert(id.clone(), TypeItem {
            label,
            number_of_bytes: U256Wrapper::ZERO,
            kind,
        });
        self.sizings.insert(id.clone(), sizing);
        Ok(id)
    }

    /// Records that the user-defined type `id` was derived from the
    /// declaration `node`, making sure it was not derived from any other.
    fn record_origin(&mut self, id: &TypeId, node: NodeId) -> Result<()> {
        match self.origins.get(id) {
            Some(&first) if first != node => Err(Error::AmbiguousTypeId {
                id: id.to_string(),
                first,
                second: node,
            }),
            Some(_) => Ok(()),
            None => {
                self.origins.insert(id.clone(), node);
                Ok(())
            }
        }
    }

    fn value_footprint(&self, id: &TypeId) -> Result<Footprint> {
        value_footprint(id.as_str()).ok_or_else(|| Error::UnsupportedType { id: id.to_string() })
    }
}
