use cinder_ast::{DeclId, TemplateArg, TypeIndex};
use cinder_common::Symbol;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

/// How far a class instantiation has progressed.
///
/// `sizeof` forces `Layout`; calling a member forces that member to
/// `Definition`. Nothing is computed before it is demanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstantiationPhase {
    Declaration,
    Layout,
    Definition,
}

/// Stores template definitions and memoizes instantiations.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    definitions: FxHashMap<Symbol, DeclId>,
    /// Function/variable instantiation cache keyed by canonical arguments.
    cache: IndexMap<(Symbol, Vec<TemplateArg>), DeclId>,
    /// Canonical instantiation name → registry slot.
    class_cache: FxHashMap<Symbol, TypeIndex>,
    class_phase: FxHashMap<TypeIndex, InstantiationPhase>,
    /// Per-instantiation provenance for later phases.
    class_args: FxHashMap<TypeIndex, (Symbol, Vec<TemplateArg>)>,
    defined_members: FxHashSet<(TypeIndex, Symbol)>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: Symbol, decl: DeclId) {
        self.definitions.insert(name, decl);
    }

    pub fn definition(&self, name: Symbol) -> Option<DeclId> {
        self.definitions.get(&name).copied()
    }

    /// Whether `name` names any template; drives `<` disambiguation.
    pub fn is_template(&self, name: Symbol) -> bool {
        self.definitions.contains_key(&name)
    }

    pub fn cached(&self, name: Symbol, args: &[TemplateArg]) -> Option<DeclId> {
        self.cache.get(&(name, args.to_vec())).copied()
    }

    pub fn insert_cached(&mut self, name: Symbol, args: Vec<TemplateArg>, decl: DeclId) {
        self.cache.insert((name, args), decl);
    }

    pub fn class_for_name(&self, canonical: Symbol) -> Option<TypeIndex> {
        self.class_cache.get(&canonical).copied()
    }

    pub fn record_class(
        &mut self,
        canonical: Symbol,
        idx: TypeIndex,
        template_name: Symbol,
        args: Vec<TemplateArg>,
    ) {
        self.class_cache.insert(canonical, idx);
        self.class_phase.insert(idx, InstantiationPhase::Declaration);
        self.class_args.insert(idx, (template_name, args));
    }

    pub fn phase(&self, idx: TypeIndex) -> Option<InstantiationPhase> {
        self.class_phase.get(&idx).copied()
    }

    pub fn advance_phase(&mut self, idx: TypeIndex, phase: InstantiationPhase) {
        let entry = self
            .class_phase
            .entry(idx)
            .or_insert(InstantiationPhase::Declaration);
        if *entry < phase {
            *entry = phase;
        }
    }

    pub fn provenance(&self, idx: TypeIndex) -> Option<&(Symbol, Vec<TemplateArg>)> {
        self.class_args.get(&idx)
    }

    pub fn member_defined(&self, idx: TypeIndex, member: Symbol) -> bool {
        self.defined_members.contains(&(idx, member))
    }

    pub fn mark_member_defined(&mut self, idx: TypeIndex, member: Symbol) {
        self.defined_members.insert((idx, member));
    }

    pub fn instantiation_count(&self) -> usize {
        self.cache.len() + self.class_cache.len()
    }

    /// Instantiated function/variable declarations, in instantiation order.
    /// The driver lowers these after the parsed top-level functions.
    pub fn instantiated_decls(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.cache.values().copied()
    }
}
