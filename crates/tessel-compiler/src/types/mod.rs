//! Canonical type representations.
//!
//! Every type a compilation session knows about lives in one [`TypeRegistry`]
//! arena and is addressed through a [`TypeId`] handle. Primitives occupy fixed
//! ids, arrays are canonicalised per element type, and structs and procedures
//! get exactly one id per declaration so that nominal equality is identity.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::ast::DefRef;

/// Handle to a type stored in a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    /// `bool`
    pub const BOOL: TypeId = TypeId(0);
    /// `int`
    pub const INT: TypeId = TypeId(1);
    /// `float`
    pub const FLOAT: TypeId = TypeId(2);
    /// `string`
    pub const STRING: TypeId = TypeId(3);
    /// An HTML element, fragment or component result.
    pub const HTML_NODE: TypeId = TypeId(4);

    /// Position of this type in the registry arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shape of a registered type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Text
    String,
    /// Array of the underlying type
    Array(TypeId),
    /// Nominal struct
    Struct(StructType),
    /// Procedure signature
    Procedure(Signature),
    /// HTML node
    HtmlNode,
}

/// A struct type and its ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    /// Declared name (the component name for property structs)
    pub name: String,
    /// Fields in declaration order; the position is the runtime field index
    pub fields: Vec<FieldType>,
    /// The AST item declaring this struct, if it came from source
    pub definition: Option<DefRef>,
}

impl StructType {
    /// Finds a field by name, returning its positional index.
    pub fn field(&self, name: &str) -> Option<(usize, &FieldType)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

/// A resolved struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeId,
}

/// A procedure signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Procedure name
    pub name: String,
    /// Parameter types in order
    pub params: Vec<TypeId>,
    /// Return type, if the procedure returns a value
    pub returns: Option<TypeId>,
}

/// Field names of the built-in `Workspace` struct, in field order.
pub const WORKSPACE_FIELDS: [(&str, TypeId); 4] = [
    ("template_input_directory", TypeId::STRING),
    ("template_output_directory", TypeId::STRING),
    ("css_output_file", TypeId::STRING),
    ("prune_unused_css", TypeId::BOOL),
];

/// Name of the built-in workspace settings struct.
pub const WORKSPACE_STRUCT: &str = "Workspace";

/// The canonical store of types for one compilation session.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    by_key: FxHashMap<(String, u8), TypeId>,
    arrays: FxHashMap<TypeId, TypeId>,
    workspace: TypeId,
}

impl TypeRegistry {
    /// Creates a registry holding the primitives and the built-in `Workspace` struct.
    pub fn new() -> Self {
        let mut registry = Self {
            types: vec![
                TypeInfo::Bool,
                TypeInfo::Int,
                TypeInfo::Float,
                TypeInfo::String,
                TypeInfo::HtmlNode,
            ],
            by_key: FxHashMap::default(),
            arrays: FxHashMap::default(),
            workspace: TypeId::BOOL,
        };
        for (name, id) in [
            ("bool", TypeId::BOOL),
            ("int", TypeId::INT),
            ("float", TypeId::FLOAT),
            ("string", TypeId::STRING),
            ("html", TypeId::HTML_NODE),
        ] {
            registry.by_key.insert((name.to_string(), 0), id);
        }

        let workspace = registry.declare_struct(WORKSPACE_STRUCT, None);
        registry.types[workspace.index()] = TypeInfo::Struct(StructType {
            name: WORKSPACE_STRUCT.to_string(),
            fields: WORKSPACE_FIELDS
                .iter()
                .map(|(name, ty)| FieldType {
                    name: name.to_string(),
                    ty: *ty,
                })
                .collect(),
            definition: None,
        });
        registry.workspace = workspace;
        registry
    }

    fn push(&mut self, info: TypeInfo) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(info);
        id
    }

    /// Returns the type stored under `id`.
    pub fn get(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.index()]
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty (never true, primitives are always present).
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The built-in `Workspace` struct.
    pub fn workspace(&self) -> TypeId {
        self.workspace
    }

    /// Registers a named struct with no fields yet. Its fields are filled in
    /// by [`TypeRegistry::set_struct_fields`] once every struct name is known.
    pub fn declare_struct(&mut self, name: &str, definition: Option<DefRef>) -> TypeId {
        if let Some(existing) = self.by_key.get(&(name.to_string(), 0)) {
            return *existing;
        }
        let id = self.push(TypeInfo::Struct(StructType {
            name: name.to_string(),
            fields: Vec::new(),
            definition,
        }));
        self.by_key.insert((name.to_string(), 0), id);
        id
    }

    /// Registers a struct that cannot be looked up by name, such as the
    /// property struct of a component.
    pub fn declare_anonymous_struct(&mut self, name: &str, definition: Option<DefRef>) -> TypeId {
        self.push(TypeInfo::Struct(StructType {
            name: name.to_string(),
            fields: Vec::new(),
            definition,
        }))
    }

    /// Sets the resolved fields of a declared struct.
    pub fn set_struct_fields(&mut self, id: TypeId, fields: Vec<FieldType>) -> Result<(), Error> {
        match self.types.get_mut(id.index()) {
            Some(TypeInfo::Struct(st)) => {
                st.fields = fields;
                Ok(())
            }
            _ => Err(Error::internal(format!("type #{} is not a struct", id.index()))),
        }
    }

    /// Registers a procedure with an empty signature.
    pub fn declare_procedure(&mut self, name: &str) -> TypeId {
        self.push(TypeInfo::Procedure(Signature {
            name: name.to_string(),
            params: Vec::new(),
            returns: None,
        }))
    }

    /// Sets the resolved signature of a declared procedure.
    pub fn set_signature(
        &mut self,
        id: TypeId,
        params: Vec<TypeId>,
        returns: Option<TypeId>,
    ) -> Result<(), Error> {
        match self.types.get_mut(id.index()) {
            Some(TypeInfo::Procedure(sig)) => {
                sig.params = params;
                sig.returns = returns;
                Ok(())
            }
            _ => Err(Error::internal(format!("type #{} is not a procedure", id.index()))),
        }
    }

    /// Returns the canonical array type over `element`.
    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        if let Some(id) = self.arrays.get(&element) {
            return *id;
        }
        let id = self.push(TypeInfo::Array(element));
        self.arrays.insert(element, id);
        id
    }

    /// Resolves a type identifier such as `[][]string` or `Config`.
    pub fn lookup(&mut self, name: &str, array_depth: u8) -> Option<TypeId> {
        if let Some(id) = self.by_key.get(&(name.to_string(), array_depth)) {
            return Some(*id);
        }
        let mut id = *self.by_key.get(&(name.to_string(), 0))?;
        for _ in 0..array_depth {
            id = self.array_of(id);
        }
        self.by_key.insert((name.to_string(), array_depth), id);
        Some(id)
    }

    /// Type equality: arrays compare structurally, everything else by identity.
    pub fn type_equals(&self, a: TypeId, b: TypeId) -> bool {
        match (self.get(a), self.get(b)) {
            (TypeInfo::Array(x), TypeInfo::Array(y)) => self.type_equals(*x, *y),
            _ => a == b,
        }
    }

    /// The struct behind `id`, if it is one.
    pub fn struct_type(&self, id: TypeId) -> Option<&StructType> {
        match self.get(id) {
            TypeInfo::Struct(st) => Some(st),
            _ => None,
        }
    }

    /// The signature behind `id`, if it is a procedure.
    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match self.get(id) {
            TypeInfo::Procedure(sig) => Some(sig),
            _ => None,
        }
    }

    /// The element type of an array.
    pub fn element(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            TypeInfo::Array(element) => Some(*element),
            _ => None,
        }
    }

    /// Whether `id` is one of bool, int, float or string.
    pub fn is_primitive(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            TypeInfo::Bool | TypeInfo::Int | TypeInfo::Float | TypeInfo::String
        )
    }

    /// Renders a type the way it is written in source.
    pub fn display(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id);
        out
    }

    fn write_type(&self, out: &mut String, id: TypeId) {
        match self.get(id) {
            TypeInfo::Bool => out.push_str("bool"),
            TypeInfo::Int => out.push_str("int"),
            TypeInfo::Float => out.push_str("float"),
            TypeInfo::String => out.push_str("string"),
            TypeInfo::HtmlNode => out.push_str("html"),
            TypeInfo::Array(element) => {
                out.push_str("[]");
                self.write_type(out, *element);
            }
            TypeInfo::Struct(st) => out.push_str(&st.name),
            TypeInfo::Procedure(sig) => {
                out.push_str("procedure(");
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, *param);
                }
                out.push(')');
                if let Some(returns) = sig.returns {
                    let _ = write!(out, " {}", self.display(returns));
                }
            }
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_fixed() {
        let mut registry = TypeRegistry::new();
        assert_eq!(registry.lookup("int", 0), Some(TypeId::INT));
        assert_eq!(registry.lookup("string", 0), Some(TypeId::STRING));
        assert_eq!(registry.lookup("html", 0), Some(TypeId::HTML_NODE));
        assert!(registry.lookup("nope", 0).is_none());
    }

    #[test]
    fn test_type_equals_reflexive() {
        let mut registry = TypeRegistry::new();
        let config = registry.declare_struct("Config", None);
        for id in [TypeId::BOOL, TypeId::INT, TypeId::FLOAT, TypeId::STRING, config] {
            assert!(registry.type_equals(id, id));
        }
    }

    #[test]
    fn test_nested_arrays_are_equal() {
        let mut registry = TypeRegistry::new();
        let a = registry.lookup("string", 2).unwrap();
        let inner = registry.array_of(TypeId::STRING);
        let b = registry.array_of(inner);
        assert!(registry.type_equals(a, b));
        assert_eq!(registry.display(a), "[][]string");
        assert!(!registry.type_equals(a, inner));
    }

    #[test]
    fn test_structs_compare_by_identity() {
        let mut registry = TypeRegistry::new();
        let a = registry.declare_struct("A", None);
        let b = registry.declare_anonymous_struct("A", None);
        let fields = vec![FieldType {
            name: "x".into(),
            ty: TypeId::INT,
        }];
        registry.set_struct_fields(a, fields.clone()).unwrap();
        registry.set_struct_fields(b, fields).unwrap();
        assert!(!registry.type_equals(a, b));
        assert_eq!(registry.lookup("A", 0), Some(a));
    }

    #[test]
    fn test_declare_struct_is_not_duplicated() {
        let mut registry = TypeRegistry::new();
        let first = registry.declare_struct("Item", None);
        let second = registry.declare_struct("Item", None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_procedure_display() {
        let mut registry = TypeRegistry::new();
        let id = registry.declare_procedure("greet");
        registry
            .set_signature(id, vec![TypeId::STRING, TypeId::INT], Some(TypeId::STRING))
            .unwrap();
        assert_eq!(registry.display(id), "procedure(string, int) string");
        assert!(registry.set_struct_fields(id, Vec::new()).is_err());
    }

    #[test]
    fn test_workspace_struct_is_builtin() {
        let mut registry = TypeRegistry::new();
        let id = registry.lookup(WORKSPACE_STRUCT, 0).unwrap();
        assert_eq!(id, registry.workspace());
        let st = registry.struct_type(id).unwrap();
        assert_eq!(st.fields.len(), WORKSPACE_FIELDS.len());
        assert_eq!(st.field("prune_unused_css").map(|(i, _)| i), Some(3));
    }
}
