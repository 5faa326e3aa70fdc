//! This module contains a typed model of the parts of the solc JSON AST that
//! influence a contract's storage layout.
//!
//! The compiler emits a graph in which nodes refer to one another by integer
//! id (`referencedDeclaration`, `linearizedBaseContracts`) rather than by
//! nesting. The node types here mirror the JSON faithfully, keeping those ids
//! as plain [`NodeId`]s. Following them is the job of the
//! [`resolver::Resolver`], which indexes the declarations into an arena.
//!
//! Node types that cannot affect storage are deserialized as the `Other`
//! variant of the enclosing enum and otherwise ignored.

pub mod resolver;
pub mod source;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constant::RENAMED_FROM_TAGS;

/// The integer id that the compiler assigns to each AST node.
///
/// Ids of built-in declarations are negative.
pub type NodeId = i64;

/// The subset of the compiler's standard JSON output that contains the ASTs.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SolcOutput {
    /// The compiled source units keyed by their path.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceEntry>,
}

/// A single compiled source file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SourceEntry {
    /// The source index used by `src` locations to refer to this file.
    pub id: u32,

    /// The AST of the file.
    pub ast: SourceUnit,
}

/// The root node of a source file's AST.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUnit {
    pub id:            NodeId,
    pub absolute_path: String,
    #[serde(default)]
    pub nodes:         Vec<SourceUnitNode>,
}

/// The top-level items of a source unit.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "nodeType")]
pub enum SourceUnitNode {
    ContractDefinition(ContractDefinition),
    StructDefinition(StructDefinition),
    EnumDefinition(EnumDefinition),
    UserDefinedValueTypeDefinition(UserDefinedValueTypeDefinition),
    #[serde(other)]
    Other,
}

/// A contract, interface or library.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDefinition {
    pub id:                        NodeId,
    pub name:                      String,
    /// The C3 linearization of the contract's inheritance graph, starting with
    /// the contract itself and ending with its most basic ancestor.
    #[serde(default)]
    pub linearized_base_contracts: Vec<NodeId>,
    #[serde(default)]
    pub nodes:                     Vec<ContractNode>,
    #[serde(default)]
    pub src:                       String,
}

impl ContractDefinition {
    /// Gets the variable declarations of this contract that occupy storage, in
    /// declaration order.
    ///
    /// Constants and immutables live in the bytecode and are not returned.
    pub fn state_variables(&self) -> impl Iterator<Item = &VariableDeclaration> {
        self.nodes.iter().filter_map(|node| match node {
            ContractNode::VariableDeclaration(var) if var.occupies_storage() => Some(var),
            _ => None,
        })
    }
}

/// The items declared inside a contract.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "nodeType")]
pub enum ContractNode {
    VariableDeclaration(VariableDeclaration),
    StructDefinition(StructDefinition),
    EnumDefinition(EnumDefinition),
    UserDefinedValueTypeDefinition(UserDefinedValueTypeDefinition),
    #[serde(other)]
    Other,
}

/// How a variable may be changed after deployment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Mutable,
    Immutable,
    Constant,
}

/// A variable declaration, used both for state variables and struct members.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub id:                NodeId,
    pub name:              String,
    pub type_name:         TypeName,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
    #[serde(default)]
    pub constant:          bool,
    #[serde(default)]
    pub mutability:        Option<Mutability>,
    #[serde(default)]
    pub state_variable:    bool,
    #[serde(default)]
    pub documentation:     Option<Documentation>,
    #[serde(default)]
    pub src:               String,
}

impl VariableDeclaration {
    /// Checks whether the variable is stored in contract storage rather than
    /// inlined into the bytecode.
    #[must_use]
    pub fn occupies_storage(&self) -> bool {
        !self.constant
            && !matches!(
                self.mutability,
                Some(Mutability::Immutable | Mutability::Constant)
            )
    }

    /// Gets the previous label of the variable, if its documentation declares
    /// that it was renamed.
    #[must_use]
    pub fn renamed_from(&self) -> Option<String> {
        let text = self.documentation.as_ref()?.text();
        text.lines().find_map(|line| {
            RENAMED_FROM_TAGS.iter().find_map(|tag| {
                let (_, rest) = line.split_once(tag)?;
                rest.split_whitespace().next().map(ToString::to_string)
            })
        })
    }
}

/// NatSpec documentation attached to a declaration.
///
/// Older compilers emit a bare string, newer ones a `StructuredDocumentation`
/// node.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Documentation {
    Structured { text: String },
    Raw(String),
}

impl Documentation {
    /// Gets the text of the documentation.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Structured { text } | Self::Raw(text) => text,
        }
    }
}

/// The compiler's description of the type of an expression or annotation.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptions {
    /// The raw, encoded, type identifier (e.g. `t_struct$_S_$12_storage`).
    pub type_identifier: Option<String>,

    /// The human-readable type (e.g. `struct C.S`).
    pub type_string: Option<String>,
}

/// A type annotation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "nodeType")]
pub enum TypeName {
    ElementaryTypeName(ElementaryTypeName),
    UserDefinedTypeName(UserDefinedTypeName),
    Mapping(Mapping),
    ArrayTypeName(ArrayTypeName),
    FunctionTypeName(FunctionTypeName),
}

impl TypeName {
    /// Gets the node id of the annotation.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::ElementaryTypeName(t) => t.id,
            Self::UserDefinedTypeName(t) => t.id,
            Self::Mapping(t) => t.id,
            Self::ArrayTypeName(t) => t.id,
            Self::FunctionTypeName(t) => t.id,
        }
    }

    /// Gets the compiler's type description for the annotation.
    #[must_use]
    pub fn type_descriptions(&self) -> &TypeDescriptions {
        match self {
            Self::ElementaryTypeName(t) => &t.type_descriptions,
            Self::UserDefinedTypeName(t) => &t.type_descriptions,
            Self::Mapping(t) => &t.type_descriptions,
            Self::ArrayTypeName(t) => &t.type_descriptions,
            Self::FunctionTypeName(t) => &t.type_descriptions,
        }
    }
}

/// A built-in value type such as `uint256` or `string`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementaryTypeName {
    pub id:                NodeId,
    pub name:              String,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
}

/// A reference to a struct, enum, contract or user-defined value type.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDefinedTypeName {
    pub id:                     NodeId,
    pub referenced_declaration: NodeId,
    #[serde(default)]
    pub name:                   Option<String>,
    #[serde(default)]
    pub type_descriptions:      TypeDescriptions,
}

/// A `mapping(K => V)` annotation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id:                NodeId,
    pub key_type:          Box<TypeName>,
    pub value_type:        Box<TypeName>,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
}

/// A `T[]` or `T[N]` annotation.
///
/// The length expression is not modelled, as the compiler folds it into the
/// type identifier.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayTypeName {
    pub id:                NodeId,
    pub base_type:         Box<TypeName>,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
}

/// A function type annotation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionTypeName {
    pub id:                NodeId,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
}

/// A struct declaration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructDefinition {
    pub id:             NodeId,
    pub name:           String,
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub members:        Vec<VariableDeclaration>,
    #[serde(default)]
    pub src:            String,
}

/// An enum declaration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDefinition {
    pub id:             NodeId,
    pub name:           String,
    #[serde(default)]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub members:        Vec<EnumValue>,
    #[serde(default)]
    pub src:            String,
}

/// A single member of an enum.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EnumValue {
    pub name: String,
}

/// A `type T is U;` declaration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDefinedValueTypeDefinition {
    pub id:              NodeId,
    pub name:            String,
    #[serde(default)]
    pub canonical_name:  Option<String>,
    pub underlying_type: TypeName,
    #[serde(default)]
    pub src:             String,
}
