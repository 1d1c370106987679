use cinder_ast::{DeclId, NamespaceHandle};
use cinder_common::{Symbol, SymbolInterner};
use rustc_hash::FxHashMap;

/// A `using namespace ns;` directive and the scope path it appeared in.
#[derive(Debug, Clone)]
pub struct UsingDirective {
    pub target: NamespaceHandle,
    pub scope: NamespaceHandle,
}

/// A `using ns::name;` declaration.
#[derive(Debug, Clone)]
pub struct UsingDeclaration {
    pub source: NamespaceHandle,
    pub name: Symbol,
    pub scope: NamespaceHandle,
}

#[derive(Debug)]
struct NamespaceNode {
    name: Symbol,
    parent: Option<NamespaceHandle>,
    children: FxHashMap<Symbol, NamespaceHandle>,
    symbols: FxHashMap<Symbol, DeclId>,
}

/// Tree of namespaces. Handle 0 is the global namespace.
///
/// Each handle resolves to a qualified name; lookup supports walking the
/// parent chain and the usings recorded against each namespace.
#[derive(Debug)]
pub struct NamespaceRegistry {
    nodes: Vec<NamespaceNode>,
    directives: Vec<UsingDirective>,
    declarations: Vec<UsingDeclaration>,
}

impl NamespaceRegistry {
    pub fn new(global_name: Symbol) -> Self {
        Self {
            nodes: vec![NamespaceNode {
                name: global_name,
                parent: None,
                children: FxHashMap::default(),
                symbols: FxHashMap::default(),
            }],
            directives: Vec::new(),
            declarations: Vec::new(),
        }
    }

    pub fn get_or_create(&mut self, parent: NamespaceHandle, name: Symbol) -> NamespaceHandle {
        if let Some(&h) = self.nodes[parent.index()].children.get(&name) {
            return h;
        }
        let h = NamespaceHandle(self.nodes.len() as u32);
        self.nodes.push(NamespaceNode {
            name,
            parent: Some(parent),
            children: FxHashMap::default(),
            symbols: FxHashMap::default(),
        });
        self.nodes[parent.index()].children.insert(name, h);
        h
    }

    pub fn child(&self, parent: NamespaceHandle, name: Symbol) -> Option<NamespaceHandle> {
        self.nodes[parent.index()].children.get(&name).copied()
    }

    pub fn parent(&self, ns: NamespaceHandle) -> Option<NamespaceHandle> {
        self.nodes[ns.index()].parent
    }

    pub fn name(&self, ns: NamespaceHandle) -> Symbol {
        self.nodes[ns.index()].name
    }

    /// `a::b::c` for a nested handle; empty string for the global namespace.
    pub fn qualified_name(&self, ns: NamespaceHandle, interner: &SymbolInterner) -> String {
        let mut parts = Vec::new();
        let mut current = Some(ns);
        while let Some(h) = current {
            if self.nodes[h.index()].parent.is_some() {
                parts.push(interner.view(self.nodes[h.index()].name).to_string());
            }
            current = self.nodes[h.index()].parent;
        }
        parts.reverse();
        parts.join("::")
    }

    /// The namespace path from the global namespace down to `ns`.
    pub fn path(&self, ns: NamespaceHandle) -> Vec<Symbol> {
        let mut parts = Vec::new();
        let mut current = Some(ns);
        while let Some(h) = current {
            if self.nodes[h.index()].parent.is_some() {
                parts.push(self.nodes[h.index()].name);
            }
            current = self.nodes[h.index()].parent;
        }
        parts.reverse();
        parts
    }

    pub fn declare(&mut self, ns: NamespaceHandle, name: Symbol, decl: DeclId) {
        self.nodes[ns.index()].symbols.insert(name, decl);
    }

    pub fn lookup_in(&self, ns: NamespaceHandle, name: Symbol) -> Option<DeclId> {
        self.nodes[ns.index()].symbols.get(&name).copied()
    }

    /// Unqualified lookup: search `from`, then each enclosing namespace out
    /// to the global one.
    pub fn lookup_from(&self, from: NamespaceHandle, name: Symbol) -> Option<DeclId> {
        let mut current = Some(from);
        while let Some(h) = current {
            if let Some(d) = self.lookup_in(h, name) {
                return Some(d);
            }
            current = self.parent(h);
        }
        None
    }

    /// Resolve a `::`-separated path of namespace segments starting at `from`
    /// (or the global namespace when `absolute`).
    pub fn resolve_path(
        &self,
        from: NamespaceHandle,
        absolute: bool,
        segments: &[Symbol],
    ) -> Option<NamespaceHandle> {
        let mut start = if absolute {
            NamespaceHandle::GLOBAL
        } else {
            from
        };
        // An unqualified first segment may name a namespace in an enclosing
        // scope; walk outward to find the anchor, then descend.
        if !absolute {
            let first = *segments.first()?;
            loop {
                if self.child(start, first).is_some() {
                    break;
                }
                start = self.parent(start)?;
            }
        }
        let mut current = start;
        for &seg in segments {
            current = self.child(current, seg)?;
        }
        Some(current)
    }

    pub fn add_directive(&mut self, directive: UsingDirective) {
        self.directives.push(directive);
    }

    pub fn add_declaration(&mut self, decl: UsingDeclaration) {
        self.declarations.push(decl);
    }

    /// Directives visible from `scope`: recorded in `scope` itself or any
    /// enclosing namespace.
    pub fn visible_directives(&self, scope: NamespaceHandle) -> Vec<NamespaceHandle> {
        self.directives
            .iter()
            .filter(|d| self.encloses(d.scope, scope))
            .map(|d| d.target)
            .collect()
    }

    /// Resolve `name` through using-declarations visible from `scope`.
    pub fn lookup_via_declarations(
        &self,
        scope: NamespaceHandle,
        name: Symbol,
    ) -> Option<DeclId> {
        self.declarations
            .iter()
            .filter(|d| d.name == name && self.encloses(d.scope, scope))
            .find_map(|d| self.lookup_in(d.source, name))
    }

    /// True when `outer` is `inner` or one of its ancestors.
    fn encloses(&self, outer: NamespaceHandle, inner: NamespaceHandle) -> bool {
        let mut current = Some(inner);
        while let Some(h) = current {
            if h == outer {
                return true;
            }
            current = self.parent(h);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{Arenas, Decl, DeclKind, TypeSpec, ValueType};
    use cinder_common::{SourceMap, Token, TokenKind};

    struct Fixture {
        interner: SymbolInterner,
        arenas: Arenas,
        registry: NamespaceRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let mut interner = SymbolInterner::new();
            let global = interner.intern("");
            Self {
                registry: NamespaceRegistry::new(global),
                arenas: Arenas::new(),
                interner,
            }
        }

        fn decl(&mut self, name: &str) -> DeclId {
            let mut sources = SourceMap::new();
            let file = sources.add_file("ns.cpp");
            let sym = self.interner.intern(name);
            let tok = Token::new(TokenKind::Identifier, sym, file, 1, 1);
            self.arenas.alloc_decl(Decl::new(
                DeclKind::Placeholder {
                    name: sym,
                    ty: TypeSpec::builtin(ValueType::Int),
                },
                tok,
            ))
        }
    }

    #[test]
    fn qualified_name_renders_path() {
        let mut fx = Fixture::new();
        let outer = fx.interner.intern("outer");
        let inner = fx.interner.intern("inner");
        let a = fx.registry.get_or_create(NamespaceHandle::GLOBAL, outer);
        let b = fx.registry.get_or_create(a, inner);
        assert_eq!(fx.registry.qualified_name(b, &fx.interner), "outer::inner");
        assert_eq!(
            fx.registry.qualified_name(NamespaceHandle::GLOBAL, &fx.interner),
            ""
        );
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut fx = Fixture::new();
        let name = fx.interner.intern("detail");
        let a = fx.registry.get_or_create(NamespaceHandle::GLOBAL, name);
        let b = fx.registry.get_or_create(NamespaceHandle::GLOBAL, name);
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_walks_enclosing_namespaces() {
        // namespace outer { int helper; namespace inner { /* from here */ } }
        let mut fx = Fixture::new();
        let helper = fx.interner.intern("helper");
        let outer = fx.registry.get_or_create(NamespaceHandle::GLOBAL, fx.interner.intern("outer"));
        let inner = fx.registry.get_or_create(outer, fx.interner.intern("inner"));
        let d = fx.decl("helper");
        fx.registry.declare(outer, helper, d);
        assert_eq!(fx.registry.lookup_from(inner, helper), Some(d));
        assert_eq!(fx.registry.lookup_from(NamespaceHandle::GLOBAL, helper), None);
    }

    #[test]
    fn directive_visibility_respects_scope() {
        // using namespace bar; recorded inside `outer` is invisible globally.
        let mut fx = Fixture::new();
        let bar = fx.registry.get_or_create(NamespaceHandle::GLOBAL, fx.interner.intern("bar"));
        let outer = fx.registry.get_or_create(NamespaceHandle::GLOBAL, fx.interner.intern("outer"));
        fx.registry.add_directive(UsingDirective {
            target: bar,
            scope: outer,
        });
        assert!(fx.registry.visible_directives(NamespaceHandle::GLOBAL).is_empty());
        assert_eq!(fx.registry.visible_directives(outer), vec![bar]);
    }

    #[test]
    fn using_declaration_resolves_name() {
        // namespace bar { int helper; } using bar::helper;
        let mut fx = Fixture::new();
        let helper = fx.interner.intern("helper");
        let bar = fx.registry.get_or_create(NamespaceHandle::GLOBAL, fx.interner.intern("bar"));
        let d = fx.decl("helper");
        fx.registry.declare(bar, helper, d);
        fx.registry.add_declaration(UsingDeclaration {
            source: bar,
            name: helper,
            scope: NamespaceHandle::GLOBAL,
        });
        assert_eq!(
            fx.registry.lookup_via_declarations(NamespaceHandle::GLOBAL, helper),
            Some(d)
        );
    }

    #[test]
    fn resolve_path_absolute_and_relative() {
        let mut fx = Fixture::new();
        let a = fx.interner.intern("a");
        let b = fx.interner.intern("b");
        let na = fx.registry.get_or_create(NamespaceHandle::GLOBAL, a);
        let nb = fx.registry.get_or_create(na, b);
        assert_eq!(
            fx.registry.resolve_path(NamespaceHandle::GLOBAL, true, &[a, b]),
            Some(nb)
        );
        // Relative from inside `a`, the single segment `b` resolves.
        assert_eq!(fx.registry.resolve_path(na, false, &[b]), Some(nb));
        // From inside `a::b`, `a::b` still resolves by walking outward.
        assert_eq!(fx.registry.resolve_path(nb, false, &[a, b]), Some(nb));
    }
}
