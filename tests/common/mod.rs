//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.
//!
//! Rather than depending on a Solidity compiler, tests describe their
//! contracts with a [`Compilation`], which produces the same JSON AST shape
//! (node ids, encoded type identifiers and all) that the compiler emits.

#![cfg(test)]
#![allow(unused)] // Each test binary uses a different subset

use serde_json::{json, Value};
use storage_layout_upgrades::{
    ast::{resolver::Resolver, NodeId},
    extract_storage_layout_by_name,
    layout::Layout,
};

/// The source decoder used by the tests, which reports every item as being on
/// the first line of the same file.
pub fn dummy_decode_src(_: &str) -> String {
    "file.sol:1".to_string()
}

/// The kinds of user-defined declaration that can be referred to by a type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeclKind {
    Contract,
    Struct,
    Enum,
    UserDefinedValueType,
}

/// A declaration whose node id has been reserved, so that it can be referred
/// to before (or while) it is defined.
#[derive(Clone, Debug)]
pub struct Decl {
    pub id:        NodeId,
    pub name:      String,
    pub canonical: String,
    pub kind:      DeclKind,
}

/// A type annotation along with the descriptions the compiler attaches to it.
#[derive(Clone, Debug)]
pub struct Ty {
    pub node:       Value,
    pub identifier: String,
    pub string:     String,
}

impl Ty {
    /// The identifier of this type when it appears nested inside another
    /// type's identifier, where storage references never carry `_ptr`.
    fn nested_identifier(&self) -> &str {
        self.identifier.trim_end_matches("_ptr")
    }
}

/// A builder for a single-file compilation.
#[derive(Debug)]
pub struct Compilation {
    next_id: NodeId,
    nodes:   Vec<Value>,
}

impl Default for Compilation {
    fn default() -> Self {
        Self::new()
    }
}

impl Compilation {
    /// Creates an empty compilation.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            nodes:   Vec::new(),
        }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Skips `count` node ids, as if unrelated code had been added to the
    /// compilation.
    pub fn skip_ids(&mut self, count: NodeId) {
        self.next_id += count;
    }

    /// Reserves a node id for a file-level declaration called `name`.
    pub fn declare(&mut self, kind: DeclKind, name: &str) -> Decl {
        Decl {
            id: self.fresh_id(),
            name: name.to_string(),
            canonical: name.to_string(),
            kind,
        }
    }

    /// Reserves a node id for a declaration called `name` inside the contract
    /// `scope`.
    pub fn declare_in(&mut self, kind: DeclKind, scope: &Decl, name: &str) -> Decl {
        Decl {
            canonical: format!("{}.{name}", scope.name),
            ..self.declare(kind, name)
        }
    }

    /// Builds an elementary type annotation such as `uint256` or `string`.
    pub fn elementary(&mut self, name: &str) -> Ty {
        let identifier = match name {
            "string" | "bytes" => format!("t_{name}_storage_ptr"),
            "address payable" => "t_address_payable".to_string(),
            other => format!("t_{other}"),
        };
        let node = json!({
            "nodeType": "ElementaryTypeName",
            "id": self.fresh_id(),
            "name": name,
            "typeDescriptions": { "typeIdentifier": identifier, "typeString": name }
        });
        Ty {
            node,
            identifier,
            string: name.to_string(),
        }
    }

    /// Builds a reference to the user-defined type `decl`.
    pub fn user(&mut self, decl: &Decl) -> Ty {
        let (identifier, string) = match decl.kind {
            DeclKind::Contract => (
                format!("t_contract$_{}_${}", decl.name, decl.id),
                format!("contract {}", decl.name),
            ),
            DeclKind::Struct => (
                format!("t_struct$_{}_${}_storage_ptr", decl.name, decl.id),
                format!("struct {}", decl.canonical),
            ),
            DeclKind::Enum => (
                format!("t_enum$_{}_${}", decl.name, decl.id),
                format!("enum {}", decl.canonical),
            ),
            DeclKind::UserDefinedValueType => (
                format!("t_userDefinedValueType$_{}_${}", decl.name, decl.id),
                decl.canonical.clone(),
            ),
        };
        let node = json!({
            "nodeType": "UserDefinedTypeName",
            "id": self.fresh_id(),
            "referencedDeclaration": decl.id,
            "name": decl.name,
            "typeDescriptions": { "typeIdentifier": identifier, "typeString": string }
        });
        Ty {
            node,
            identifier,
            string,
        }
    }

    /// Builds a `mapping(key => value)` annotation.
    pub fn mapping(&mut self, key: &Ty, value: &Ty) -> Ty {
        let identifier = format!(
            "t_mapping$_{}_$_{}_$",
            key.nested_identifier(),
            value.nested_identifier()
        );
        let string = format!("mapping({} => {})", key.string, value.string);
        let node = json!({
            "nodeType": "Mapping",
            "id": self.fresh_id(),
            "keyType": key.node,
            "valueType": value.node,
            "typeDescriptions": { "typeIdentifier": identifier, "typeString": string }
        });
        Ty {
            node,
            identifier,
            string,
        }
    }

    /// Builds an array annotation of `element`, which is dynamically sized if
    /// `length` is [`None`].
    pub fn array(&mut self, element: &Ty, length: Option<u64>) -> Ty {
        let (suffix, brackets) = match length {
            Some(length) => (length.to_string(), format!("[{length}]")),
            None => ("dyn".to_string(), "[]".to_string()),
        };
        let identifier = format!(
            "t_array$_{}_${suffix}_storage_ptr",
            element.nested_identifier()
        );
        let string = format!("{}{brackets}", element.string);
        let node = json!({
            "nodeType": "ArrayTypeName",
            "id": self.fresh_id(),
            "baseType": element.node,
            "typeDescriptions": { "typeIdentifier": identifier, "typeString": string }
        });
        Ty {
            node,
            identifier,
            string,
        }
    }

    /// Builds a state variable declaration.
    pub fn var(&mut self, name: &str, typ: &Ty) -> Value {
        let id = self.fresh_id();
        json!({
            "nodeType": "VariableDeclaration",
            "id": id,
            "name": name,
            "stateVariable": true,
            "constant": false,
            "mutability": "mutable",
            "src": format!("{id}:1:0"),
            "typeName": typ.node
        })
    }

    /// Builds a constant declaration, which does not occupy storage.
    pub fn constant(&mut self, name: &str, typ: &Ty) -> Value {
        let mut var = self.var(name, typ);
        var["constant"] = json!(true);
        var["mutability"] = json!("constant");
        var
    }

    /// Builds a state variable declaration documented as having been renamed
    /// from `from`.
    pub fn renamed_var(&mut self, name: &str, typ: &Ty, from: &str) -> Value {
        let mut var = self.var(name, typ);
        var["documentation"] = json!({
            "nodeType": "StructuredDocumentation",
            "text": format!("@custom:oz-renamed-from {from}")
        });
        var
    }

    /// Builds a struct member declaration.
    pub fn member(&mut self, name: &str, typ: &Ty) -> Value {
        let mut var = self.var(name, typ);
        var["stateVariable"] = json!(false);
        var
    }

    /// Builds the definition of the struct `decl`.
    pub fn struct_def(&mut self, decl: &Decl, members: Vec<Value>) -> Value {
        json!({
            "nodeType": "StructDefinition",
            "id": decl.id,
            "name": decl.name,
            "canonicalName": decl.canonical,
            "members": members,
            "src": format!("{}:1:0", decl.id)
        })
    }

    /// Builds the definition of the enum `decl`.
    pub fn enum_def(&mut self, decl: &Decl, members: &[&str]) -> Value {
        let members: Vec<_> = members.iter().map(|name| json!({ "name": name })).collect();
        json!({
            "nodeType": "EnumDefinition",
            "id": decl.id,
            "name": decl.name,
            "canonicalName": decl.canonical,
            "members": members,
            "src": format!("{}:1:0", decl.id)
        })
    }

    /// Builds the definition of the user-defined value type `decl`.
    pub fn udvt_def(&mut self, decl: &Decl, underlying: &Ty) -> Value {
        json!({
            "nodeType": "UserDefinedValueTypeDefinition",
            "id": decl.id,
            "name": decl.name,
            "canonicalName": decl.canonical,
            "underlyingType": underlying.node,
            "src": format!("{}:1:0", decl.id)
        })
    }

    /// Adds the definition of the contract `decl` to the compilation.
    ///
    /// The `bases` are the linearization of the contract's ancestors, from
    /// the most derived to the most basic.
    pub fn contract(&mut self, decl: &Decl, bases: &[&Decl], nodes: Vec<Value>) {
        let linearized: Vec<_> = std::iter::once(decl.id)
            .chain(bases.iter().map(|base| base.id))
            .collect();
        self.nodes.push(json!({
            "nodeType": "ContractDefinition",
            "id": decl.id,
            "name": decl.name,
            "linearizedBaseContracts": linearized,
            "nodes": nodes,
            "src": format!("{}:1:0", decl.id)
        }));
    }

    /// Declares and defines a contract called `name` with no bases in one go.
    pub fn simple_contract(&mut self, name: &str, nodes: Vec<Value>) -> Decl {
        let decl = self.declare(DeclKind::Contract, name);
        self.contract(&decl, &[], nodes);
        decl
    }

    /// Adds a top-level node, such as a file-level struct, to the compilation.
    pub fn top_level(&mut self, node: Value) {
        self.nodes.push(node);
    }

    /// Produces the compiler's standard JSON output for the compilation.
    pub fn output(&self) -> Value {
        json!({
            "sources": {
                "contracts/test/Storage.sol": {
                    "id": 0,
                    "ast": {
                        "id": 0,
                        "absolutePath": "contracts/test/Storage.sol",
                        "nodes": self.nodes
                    }
                }
            }
        })
    }

    /// Indexes the compilation.
    pub fn resolver(&self) -> anyhow::Result<Resolver> {
        Ok(Resolver::from_json(&self.output().to_string())?)
    }
}

/// Extracts the layout of the contract called `name` from `resolver`.
pub fn layout_of(resolver: &Resolver, name: &str) -> anyhow::Result<Layout> {
    Ok(extract_storage_layout_by_name(name, &dummy_decode_src, resolver)?)
}
