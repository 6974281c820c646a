// src/core/symbols.rs
//! Symbol table used by the semantic analyzer. Scopes form a stack pushed
//! and popped around each block-like construct; resolution walks the stack
//! from innermost to outermost.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    Block,
    Trait,
    Import,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub data_type: Option<String>,
    pub mutable: bool,
    pub constant: bool,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Symbol {
    pub fn variable(name: &str, data_type: &str, mutable: bool, constant: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::Variable,
            data_type: Some(data_type.to_string()),
            mutable,
            constant,
            params: Vec::new(),
            return_type: None,
            line: 0,
            column: 0,
        }
    }

    pub fn function(name: &str, params: Vec<String>, return_type: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::Function,
            data_type: None,
            mutable: false,
            constant: false,
            params,
            return_type,
            line: 0,
            column: 0,
        }
    }

    pub fn named(name: &str, kind: SymbolKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            data_type: None,
            mutable: false,
            constant: false,
            params: Vec::new(),
            return_type: None,
            line: 0,
            column: 0,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

pub struct SymbolTable {
    scopes: Vec<IndexMap<String, Symbol>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![IndexMap::new()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn define(&mut self, symbol: Symbol) {
        self.scopes
            .last_mut()
            .expect("symbol table always has a scope")
            .insert(symbol.name.clone(), symbol);
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Current scope only; used for redeclaration checks so shadowing in a
    /// nested scope stays legal.
    pub fn resolve_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes.last().and_then(|scope| scope.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_walks_scopes_but_local_does_not() {
        let mut table = SymbolTable::new();
        table.define(Symbol::variable("x", "int", false, false));
        table.push_scope();
        assert!(table.resolve("x").is_some());
        assert!(table.resolve_local("x").is_none());
        table.pop_scope();
        assert!(table.resolve_local("x").is_some());
    }

    #[test]
    fn inner_definition_shadows_outer() {
        let mut table = SymbolTable::new();
        table.define(Symbol::variable("x", "int", false, false));
        table.push_scope();
        table.define(Symbol::variable("x", "string", false, false));
        assert_eq!(table.resolve("x").unwrap().data_type.as_deref(), Some("string"));
        table.pop_scope();
        assert_eq!(table.resolve("x").unwrap().data_type.as_deref(), Some("int"));
    }
}
