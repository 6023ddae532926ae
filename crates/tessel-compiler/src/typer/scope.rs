//! Lexical scopes for name resolution during type checking.

use rustc_hash::FxHashMap;

use crate::ast::DefRef;
use crate::types::TypeId;

/// What a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// A variable, parameter, or procedure (bound with its procedure type)
    Variable(TypeId),
    /// A struct declaration
    StructDefinition {
        /// The struct type
        ty: TypeId,
        /// Declaring item, `None` for built-ins
        def: Option<DefRef>,
    },
    /// A component declaration
    HtmlComponentDefinition {
        /// The property struct
        properties: TypeId,
        /// Declaring item
        def: DefRef,
    },
    /// A top-level CSS definition
    CssDefinition {
        /// Declaring item
        def: DefRef,
    },
    /// A top-level CSS config definition
    CssConfigDefinition {
        /// Declaring item
        def: DefRef,
    },
}

/// A name already bound in the innermost scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyDeclared(pub Symbol);

/// A scope layer with an owned link to its parent.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: FxHashMap<String, Symbol>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    /// Creates a root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope nested inside `parent`.
    pub fn with_parent(parent: Scope) -> Self {
        Self {
            symbols: FxHashMap::default(),
            parent: Some(Box::new(parent)),
        }
    }

    /// Binds a variable in this layer.
    pub fn set_variable(&mut self, name: &str, ty: TypeId) -> Result<(), AlreadyDeclared> {
        self.set_symbol(name, Symbol::Variable(ty))
    }

    /// Binds a symbol in this layer, failing if the name is already bound here.
    pub fn set_symbol(&mut self, name: &str, symbol: Symbol) -> Result<(), AlreadyDeclared> {
        if let Some(existing) = self.symbols.get(name) {
            return Err(AlreadyDeclared(*existing));
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Looks a name up through the parent chain.
    pub fn get_symbol(&self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.symbols.get(name) {
            return Some(*symbol);
        }
        self.parent.as_ref().and_then(|parent| parent.get_symbol(name))
    }

    /// Looks a name up in this layer only.
    pub fn get_symbol_local(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    /// Drops this layer and returns its parent. A root scope returns itself emptied.
    pub fn into_parent(self) -> Scope {
        match self.parent {
            Some(parent) => *parent,
            None => Scope::new(),
        }
    }

    /// Nesting depth, 0 for a root scope.
    pub fn depth(&self) -> usize {
        self.parent.as_ref().map_or(0, |parent| parent.depth() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_new() {
        let scope = Scope::new();
        assert_eq!(scope.depth(), 0);
        assert!(scope.get_symbol("x").is_none());
    }

    #[test]
    fn test_scope_nesting() {
        let mut global = Scope::new();
        global.set_variable("x", TypeId::INT).unwrap();
        let mut inner = Scope::with_parent(global);
        assert_eq!(inner.depth(), 1);
        assert_eq!(inner.get_symbol("x"), Some(Symbol::Variable(TypeId::INT)));
        assert!(inner.get_symbol_local("x").is_none());

        inner.set_variable("x", TypeId::STRING).unwrap();
        assert_eq!(inner.get_symbol("x"), Some(Symbol::Variable(TypeId::STRING)));

        let outer = inner.into_parent();
        assert_eq!(outer.get_symbol("x"), Some(Symbol::Variable(TypeId::INT)));
    }

    #[test]
    fn test_scope_duplicate_error() {
        let mut scope = Scope::new();
        scope.set_variable("x", TypeId::INT).unwrap();
        let result = scope.set_variable("x", TypeId::INT);
        assert_eq!(result, Err(AlreadyDeclared(Symbol::Variable(TypeId::INT))));
    }
}
