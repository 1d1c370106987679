//! Name mangling for the two backend-visible dialects.
//!
//! The mangler consumes a language-level signature description rather than a
//! declaration node so both the parser (call sites) and the lowering (static
//! storage) can ask for names without threading arena access through.

mod itanium;
mod msvc;

use cinder_ast::{Linkage, TemplateArg, TypeRegistry, TypeSpec};
use cinder_common::SymbolInterner;

/// Which dialect the session emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManglingStyle {
    #[default]
    Itanium,
    Msvc,
}

/// Everything a function mangling needs.
///
/// For instantiated function templates, `params`/`return_type` are the
/// pattern's specs (still naming template parameters) and `template_args`
/// carries the concrete arguments; the Itanium dialect encodes parameter
/// references as `T_` with substitutions, matching what a toolchain emits.
#[derive(Debug, Clone)]
pub struct FunctionSignature<'a> {
    pub name: &'a str,
    pub namespace: &'a [&'a str],
    pub class_name: Option<&'a str>,
    pub is_const_member: bool,
    pub is_static_member: bool,
    pub params: &'a [TypeSpec],
    pub return_type: &'a TypeSpec,
    pub template_params: &'a [&'a str],
    pub template_args: Option<&'a [TemplateArg]>,
    pub linkage: Linkage,
    pub is_variadic: bool,
    /// `Some("==")` for `operator==`.
    pub operator_symbol: Option<&'a str>,
}

impl<'a> FunctionSignature<'a> {
    pub fn free(name: &'a str, params: &'a [TypeSpec], return_type: &'a TypeSpec) -> Self {
        Self {
            name,
            namespace: &[],
            class_name: None,
            is_const_member: false,
            is_static_member: false,
            params,
            return_type,
            template_params: &[],
            template_args: None,
            linkage: Linkage::CPlusPlus,
            is_variadic: false,
            operator_symbol: None,
        }
    }
}

/// A data symbol: global, static member, or static local.
#[derive(Debug, Clone)]
pub struct VariableSignature<'a> {
    pub name: &'a str,
    pub namespace: &'a [&'a str],
    pub class_name: Option<&'a str>,
    /// Enclosing function for static locals.
    pub enclosing_function: Option<&'a str>,
    pub ty: &'a TypeSpec,
}

pub fn mangle_function(
    style: ManglingStyle,
    sig: &FunctionSignature<'_>,
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    if sig.linkage == Linkage::C {
        return sig.name.to_string();
    }
    match style {
        ManglingStyle::Itanium => itanium::mangle_function(sig, types, interner),
        ManglingStyle::Msvc => msvc::mangle_function(sig, types, interner),
    }
}

pub fn mangle_variable(
    style: ManglingStyle,
    sig: &VariableSignature<'_>,
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    match style {
        ManglingStyle::Itanium => itanium::mangle_variable(sig, types, interner),
        ManglingStyle::Msvc => msvc::mangle_variable(sig, types, interner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{DataModel, TypeKind, ValueType};

    fn fixture() -> (SymbolInterner, TypeRegistry) {
        let mut interner = SymbolInterner::new();
        let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
        (interner, types)
    }

    #[test]
    fn extern_c_suppresses_mangling() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let params = [int.clone()];
        let mut sig = FunctionSignature::free("puts", &params, &int);
        sig.linkage = Linkage::C;
        assert_eq!(
            mangle_function(ManglingStyle::Itanium, &sig, &types, &interner),
            "puts"
        );
        assert_eq!(
            mangle_function(ManglingStyle::Msvc, &sig, &types, &interner),
            "puts"
        );
    }

    #[test]
    fn identity_template_instantiation_itanium() {
        // template<typename T> T identity(T x);  identity<int>
        let (mut interner, types) = fixture();
        let t = TypeSpec::template_param(interner.intern("T"));
        let params = [t.clone()];
        let targs = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];
        let tparams = ["T"];
        let mut sig = FunctionSignature::free("identity", &params, &t);
        sig.template_params = &tparams;
        sig.template_args = Some(&targs);
        assert_eq!(
            mangle_function(ManglingStyle::Itanium, &sig, &types, &interner),
            "_Z8identityIiET_S0_"
        );
    }

    #[test]
    fn const_member_operator_eq_itanium() {
        // struct P { bool operator==(const P&) const; };
        let (mut interner, mut types) = fixture();
        let p_idx = types.get_or_create(interner.intern("P"), TypeKind::Struct);
        let p_ref = TypeSpec::indexed(p_idx).with_reference().with_const();
        let params = [p_ref];
        let ret = TypeSpec::builtin(ValueType::Bool);
        let mut sig = FunctionSignature::free("operator==", &params, &ret);
        sig.class_name = Some("P");
        sig.is_const_member = true;
        sig.operator_symbol = Some("==");
        assert_eq!(
            mangle_function(ManglingStyle::Itanium, &sig, &types, &interner),
            "_ZNK1PeqERKS_"
        );
    }

    #[test]
    fn msvc_free_function_shape() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let params = [int.clone(), int.clone()];
        let sig = FunctionSignature::free("add", &params, &int);
        assert_eq!(
            mangle_function(ManglingStyle::Msvc, &sig, &types, &interner),
            "?add@@YAHHH@Z"
        );
    }
}
