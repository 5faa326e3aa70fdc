//! This module contains the [`Resolver`], which turns the integer
//! cross-references of the compiler's AST into the declarations they name.

use std::{collections::HashMap, fmt::Display, fs, path::Path};

use crate::{
    ast::{
        ContractDefinition,
        ContractNode,
        EnumDefinition,
        NodeId,
        SolcOutput,
        SourceUnitNode,
        StructDefinition,
        UserDefinedTypeName,
        UserDefinedValueTypeDefinition,
    },
    error::resolution::{Error, Result},
};

/// A declaration that a type annotation can refer to.
#[derive(Clone, Debug)]
pub enum Declaration {
    Contract(ContractDefinition),
    Struct(StructDefinition),
    Enum(EnumDefinition),
    UserDefinedValueType(UserDefinedValueTypeDefinition),
}

impl Declaration {
    /// Gets the node id of the declaration.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Contract(c) => c.id,
            Self::Struct(s) => s.id,
            Self::Enum(e) => e.id,
            Self::UserDefinedValueType(u) => u.id,
        }
    }

    /// Gets the kind of node that this declaration is.
    #[must_use]
    pub fn kind(&self) -> DeclarationKind {
        match self {
            Self::Contract(_) => DeclarationKind::Contract,
            Self::Struct(_) => DeclarationKind::Struct,
            Self::Enum(_) => DeclarationKind::Enum,
            Self::UserDefinedValueType(_) => DeclarationKind::UserDefinedValueType,
        }
    }

    /// Gets the name that the declaration was given in the source.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Contract(c) => &c.name,
            Self::Struct(s) => &s.name,
            Self::Enum(e) => &e.name,
            Self::UserDefinedValueType(u) => &u.name,
        }
    }

    /// Gets the name of the declaration qualified by the contract it is
    /// declared in, if the compiler provided one.
    #[must_use]
    pub fn canonical_name(&self) -> Option<&str> {
        match self {
            Self::Contract(_) => None,
            Self::Struct(s) => s.canonical_name.as_deref(),
            Self::Enum(e) => e.canonical_name.as_deref(),
            Self::UserDefinedValueType(u) => u.canonical_name.as_deref(),
        }
    }
}

/// The kinds of [`Declaration`] that exist.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DeclarationKind {
    Contract,
    Struct,
    Enum,
    UserDefinedValueType,
}

impl Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Contract => "ContractDefinition",
            Self::Struct => "StructDefinition",
            Self::Enum => "EnumDefinition",
            Self::UserDefinedValueType => "UserDefinedValueTypeDefinition",
        };
        write!(f, "{name}")
    }
}

/// An arena of every declaration in a compilation, indexed by node id.
///
/// The arena spans all of the source units of the compilation, so references
/// that cross file boundaries resolve like any other.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    /// The declarations, keyed by their node id.
    declarations: HashMap<NodeId, Declaration>,

    /// The ids of the contracts with each name, in source order.
    contracts_by_name: HashMap<String, Vec<NodeId>>,

    /// The ids of the declarations of each kind that share each name.
    types_by_name: HashMap<(DeclarationKind, String), Vec<NodeId>>,
}

impl Resolver {
    /// Indexes the declarations in the compiler `output`.
    #[must_use]
    pub fn new(output: SolcOutput) -> Self {
        let mut resolver = Self::default();
        for entry in output.sources.into_values() {
            for node in entry.ast.nodes {
                match node {
                    SourceUnitNode::ContractDefinition(contract) => resolver.add_contract(contract),
                    SourceUnitNode::StructDefinition(s) => resolver.add(Declaration::Struct(s)),
                    SourceUnitNode::EnumDefinition(e) => resolver.add(Declaration::Enum(e)),
                    SourceUnitNode::UserDefinedValueTypeDefinition(u) => {
                        resolver.add(Declaration::UserDefinedValueType(u));
                    }
                    SourceUnitNode::Other => (),
                }
            }
        }

        resolver
    }

    /// Parses the compiler's standard JSON output from `json` and indexes its
    /// declarations.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `json` is not valid compiler output.
    pub fn from_json(json: &str) -> Result<Self> {
        let output: SolcOutput =
            serde_json::from_str(json).map_err(|e| Error::InvalidAst(e.to_string()))?;
        Ok(Self::new(output))
    }

    /// Reads the compiler's standard JSON output from the file at `path` and
    /// indexes its declarations.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the file cannot be read or does not contain valid
    /// compiler output.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::InvalidAst(format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Resolves the node with the provided `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no declaration has that id.
    pub fn resolve(&self, id: NodeId) -> Result<&Declaration> {
        self.declarations.get(&id).ok_or(Error::NotFound { id })
    }

    /// Resolves the node with the provided `id`, requiring that it is one of
    /// the `expected` kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no declaration has that id, or if it has a different
    /// kind.
    pub fn resolve_as(&self, id: NodeId, expected: &[DeclarationKind]) -> Result<&Declaration> {
        let declaration = self.resolve(id)?;
        if expected.contains(&declaration.kind()) {
            Ok(declaration)
        } else {
            let expected = expected.iter().map(ToString::to_string).collect::<Vec<_>>();
            Err(Error::WrongNodeType {
                id,
                expected: expected.join(" or "),
                found: declaration.kind().to_string(),
            })
        }
    }

    /// Finds the declaration of the user-defined type named by `type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the declaration is absent from the compilation.
    pub fn resolve_user_type(&self, type_name: &UserDefinedTypeName) -> Result<&Declaration> {
        self.resolve(type_name.referenced_declaration)
    }

    /// Gets the name that the type declared at `id` goes by in canonical type
    /// ids, if it differs from its declared name.
    ///
    /// That is the case when another declaration of the same kind shares the
    /// declared name, as with `LibA.Data` and `LibB.Data`, and the compiler
    /// recorded a canonical name for it.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let declaration = self.declarations.get(&id)?;
        let key = (declaration.kind(), declaration.name().to_string());
        let shared = self.types_by_name.get(&key).is_some_and(|ids| ids.len() > 1);
        if shared {
            declaration.canonical_name().map(ToString::to_string)
        } else {
            None
        }
    }

    /// Resolves the contract with the provided `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no contract has that id.
    pub fn contract(&self, id: NodeId) -> Result<&ContractDefinition> {
        match self.resolve_as(id, &[DeclarationKind::Contract])? {
            Declaration::Contract(contract) => Ok(contract),
            other => Err(Error::WrongNodeType {
                id,
                expected: DeclarationKind::Contract.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    /// Finds the single contract called `name` anywhere in the compilation.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if there is no such contract or if the name is shared
    /// between several contracts.
    pub fn contract_by_name(&self, name: &str) -> Result<&ContractDefinition> {
        match self.contracts_by_name.get(name).map(Vec::as_slice) {
            Some([id]) => self.contract(*id),
            Some(ids) if ids.len() > 1 => Err(Error::AmbiguousContract {
                name:  name.to_string(),
                count: ids.len(),
            }),
            _ => Err(Error::ContractNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Gets the contracts that `contract` inherits from, including itself,
    /// ordered from the most basic ancestor to `contract`.
    ///
    /// This is the order in which their state variables are laid out.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any of the bases cannot be resolved.
    pub fn linearized_bases<'a>(
        &'a self,
        contract: &'a ContractDefinition,
    ) -> Result<Vec<&'a ContractDefinition>> {
        if contract.linearized_base_contracts.is_empty() {
            return Ok(vec![contract]);
        }

        contract
            .linearized_base_contracts
            .iter()
            .rev()
            .map(|&id| {
                if id == contract.id {
                    Ok(contract)
                } else {
                    self.contract(id)
                }
            })
            .collect()
    }

    /// Gets the number of declarations known to the resolver.
    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Checks if the resolver knows of no declarations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Indexes `contract` along with the types it declares.
    fn add_contract(&mut self, contract: ContractDefinition) {
        for node in &contract.nodes {
            match node {
                ContractNode::StructDefinition(s) => self.add(Declaration::Struct(s.clone())),
                ContractNode::EnumDefinition(e) => self.add(Declaration::Enum(e.clone())),
                ContractNode::UserDefinedValueTypeDefinition(u) => {
                    self.add(Declaration::UserDefinedValueType(u.clone()));
                }
                ContractNode::VariableDeclaration(_) | ContractNode::Other => (),
            }
        }

        self.contracts_by_name
            .entry(contract.name.clone())
            .or_default()
            .push(contract.id);
        self.add(Declaration::Contract(contract));
    }

    /// Indexes a single `declaration`.
    fn add(&mut self, declaration: Declaration) {
        self.types_by_name
            .entry((declaration.kind(), declaration.name().to_string()))
            .or_default()
            .push(declaration.id());
        self.declarations.insert(declaration.id(), declaration);
    }
}
