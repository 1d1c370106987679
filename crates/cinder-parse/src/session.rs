use cinder_ast::{Arenas, DataModel, NamespaceHandle, TypeKind, TypeRegistry, ValueType};
use cinder_common::{SourceMap, Symbol, SymbolInterner};
use cinder_mangle::ManglingStyle;
use cinder_sema::NamespaceRegistry;
use cinder_templates::{InstantiationEngine, TemplateRegistry};

/// Which calling convention the lowering targets for variadics and struct
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetAbi {
    #[default]
    SystemV,
    Win64,
}

/// Per-translation-unit knobs handed in by the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileContext {
    pub mangling: ManglingStyle,
    pub data_model: DataModel,
    pub abi: TargetAbi,
}

impl CompileContext {
    pub fn windows() -> Self {
        Self {
            mangling: ManglingStyle::Msvc,
            data_model: DataModel::Llp64,
            abi: TargetAbi::Win64,
        }
    }

    /// Byte threshold above which a struct returns through a hidden slot.
    pub fn return_slot_threshold(&self) -> u32 {
        match self.abi {
            TargetAbi::SystemV => 16,
            TargetAbi::Win64 => 8,
        }
    }
}

/// All mutable compilation state, owned per instance.
///
/// Nothing here is process-global: running two sessions side by side is
/// safe because they share nothing, which is the whole concurrency story.
pub struct Session {
    pub interner: SymbolInterner,
    pub sources: SourceMap,
    pub arenas: Arenas,
    pub types: TypeRegistry,
    pub namespaces: NamespaceRegistry,
    pub templates: TemplateRegistry,
    pub context: CompileContext,
    /// Synthesized string literals (`__func__` texts), appended in order.
    pub aux_strings: Vec<Symbol>,
}

impl Session {
    pub fn new(context: CompileContext) -> Self {
        let mut interner = SymbolInterner::new();
        let void = interner.intern("void");
        let global_ns = interner.intern("");
        let mut types = TypeRegistry::new(void, context.data_model);
        register_builtin_names(&mut interner, &mut types);
        Self {
            interner,
            sources: SourceMap::new(),
            arenas: Arenas::new(),
            types,
            namespaces: NamespaceRegistry::new(global_ns),
            templates: TemplateRegistry::new(),
            context,
            aux_strings: Vec::new(),
        }
    }

    /// Borrow the registries as an instantiation engine.
    pub fn engine(&mut self) -> InstantiationEngine<'_> {
        InstantiationEngine::new(
            &mut self.arenas,
            &mut self.types,
            &mut self.templates,
            &mut self.interner,
            self.context.mangling,
        )
    }

    pub fn global_namespace(&self) -> NamespaceHandle {
        NamespaceHandle::GLOBAL
    }
}

/// Seed the registry so `lookup` answers for builtin spellings; the parser
/// folds multi-word spellings (`unsigned long`, `signed int`) itself.
fn register_builtin_names(interner: &mut SymbolInterner, types: &mut TypeRegistry) {
    let builtins: &[(&str, ValueType)] = &[
        ("bool", ValueType::Bool),
        ("char", ValueType::Char),
        ("short", ValueType::Short),
        ("int", ValueType::Int),
        ("long", ValueType::Long),
        ("float", ValueType::Float),
        ("double", ValueType::Double),
    ];
    for (name, vt) in builtins {
        let sym = interner.intern(name);
        types.get_or_create(sym, TypeKind::Builtin(*vt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_independent() {
        let mut a = Session::new(CompileContext::default());
        let mut b = Session::new(CompileContext::default());
        let sym_a = a.interner.intern("only_in_a");
        assert_eq!(a.interner.view(sym_a), "only_in_a");
        // b's interner never saw the string; counts differ.
        assert!(b.interner.len() < a.interner.len());
        let _ = b.interner.intern("only_in_b");
    }

    #[test]
    fn return_slot_thresholds_follow_abi() {
        assert_eq!(CompileContext::default().return_slot_threshold(), 16);
        assert_eq!(CompileContext::windows().return_slot_threshold(), 8);
    }
}
