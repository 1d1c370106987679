use cinder_ast::{DeclId, NamespaceHandle};
use cinder_common::Symbol;
use rustc_hash::FxHashMap;

/// One lexical scope: name bindings plus the usings introduced inside it.
#[derive(Debug, Default)]
pub struct Scope {
    symbols: FxHashMap<Symbol, DeclId>,
    using_declarations: FxHashMap<Symbol, DeclId>,
    using_directives: Vec<NamespaceHandle>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Hierarchical symbol table.
///
/// The bottom scope is the global scope and lives for the whole unit; inner
/// scopes push and pop with `{}`. Only the top scope is mutable; outer scopes
/// are read-only from the inside, which is what makes shadowing work.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `name` in the current scope, shadowing outer bindings.
    pub fn declare(&mut self, name: Symbol, decl: DeclId) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .symbols
            .insert(name, decl);
    }

    pub fn declare_global(&mut self, name: Symbol, decl: DeclId) {
        self.scopes[0].symbols.insert(name, decl);
    }

    pub fn add_using_declaration(&mut self, name: Symbol, decl: DeclId) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .using_declarations
            .insert(name, decl);
    }

    pub fn add_using_directive(&mut self, ns: NamespaceHandle) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .using_directives
            .push(ns);
    }

    /// Innermost-first lookup through all scopes.
    pub fn lookup(&self, name: Symbol) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.symbols.get(&name).copied())
    }

    /// Like [`lookup`], but also report the scope depth of the binding
    /// (0 = global). Lets a lambda body tell its own locals from captures.
    pub fn lookup_with_depth(&self, name: Symbol) -> Option<(DeclId, usize)> {
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(&d) = scope.symbols.get(&name) {
                return Some((d, depth));
            }
        }
        None
    }

    /// Lookup restricted to the global scope.
    pub fn lookup_global(&self, name: Symbol) -> Option<DeclId> {
        self.scopes[0].symbols.get(&name).copied()
    }

    /// Lookup through using-declarations visible from the current scope.
    pub fn lookup_using_declaration(&self, name: Symbol) -> Option<DeclId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.using_declarations.get(&name).copied())
    }

    /// All namespaces imported by using-directives visible here, innermost
    /// first.
    pub fn visible_using_directives(&self) -> Vec<NamespaceHandle> {
        let mut out = Vec::new();
        for scope in self.scopes.iter().rev() {
            out.extend(scope.using_directives.iter().copied());
        }
        out
    }

    /// True when `name` is bound in a non-global scope (a true local).
    pub fn is_local(&self, name: Symbol) -> bool {
        self.scopes[1..]
            .iter()
            .any(|s| s.symbols.contains_key(&name))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{Arenas, Decl, DeclKind, TypeSpec, ValueType};
    use cinder_common::{SourceMap, SymbolInterner, Token, TokenKind};

    fn decl(arenas: &mut Arenas, interner: &mut SymbolInterner, name: &str) -> DeclId {
        let mut sources = SourceMap::new();
        let file = sources.add_file("t.cpp");
        let sym = interner.intern(name);
        let tok = Token::new(TokenKind::Identifier, sym, file, 1, 1);
        arenas.alloc_decl(Decl::new(
            DeclKind::Placeholder {
                name: sym,
                ty: TypeSpec::builtin(ValueType::Int),
            },
            tok,
        ))
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut arenas = Arenas::new();
        let mut interner = SymbolInterner::new();
        let name = interner.intern("x");
        let outer = decl(&mut arenas, &mut interner, "x");
        let inner = decl(&mut arenas, &mut interner, "x");

        let mut scopes = ScopeStack::new();
        scopes.declare(name, outer);
        scopes.push_scope();
        scopes.declare(name, inner);
        assert_eq!(scopes.lookup(name), Some(inner));
        scopes.pop_scope();
        assert_eq!(scopes.lookup(name), Some(outer));
    }

    #[test]
    fn global_lookup_skips_locals() {
        let mut arenas = Arenas::new();
        let mut interner = SymbolInterner::new();
        let name = interner.intern("g");
        let global = decl(&mut arenas, &mut interner, "g");
        let local = decl(&mut arenas, &mut interner, "g");

        let mut scopes = ScopeStack::new();
        scopes.declare_global(name, global);
        scopes.push_scope();
        scopes.declare(name, local);
        assert_eq!(scopes.lookup_global(name), Some(global));
        assert!(scopes.is_local(name));
    }

    #[test]
    fn using_declaration_found_after_scope_walk() {
        let mut arenas = Arenas::new();
        let mut interner = SymbolInterner::new();
        let name = interner.intern("imported");
        let target = decl(&mut arenas, &mut interner, "imported");

        let mut scopes = ScopeStack::new();
        scopes.push_scope();
        scopes.add_using_declaration(name, target);
        assert_eq!(scopes.lookup(name), None);
        assert_eq!(scopes.lookup_using_declaration(name), Some(target));
    }
}
