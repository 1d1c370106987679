//! Canonical instantiation names.
//!
//! `vector<int>` and `vector<signed int>` must land in the same registry
//! slot, so arguments are canonicalized before naming, and a content hash
//! keeps names bounded no matter how deep the argument types nest.

use cinder_ast::{TemplateArg, TypeRegistry, TypeSpec, TypeSpecKind, ValueType};
use cinder_common::SymbolInterner;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Canonicalize one argument: top-level cv on by-value types is dropped and
/// spelling synonyms were already folded into `ValueType` by the parser.
pub fn canonical_arg(arg: &TemplateArg) -> TemplateArg {
    match arg {
        TemplateArg::Type(spec) => {
            let mut c = spec.clone();
            if !c.is_reference && !c.is_rvalue_reference && c.pointer_depth == 0 {
                c.is_const = false;
            }
            TemplateArg::Type(c)
        }
        TemplateArg::Value { value, ty } => TemplateArg::Value {
            value: *value,
            ty: if ty.is_integral() { ValueType::Int } else { *ty },
        },
    }
}

/// Canonicalize a whole argument list.
pub fn canonical_args(args: &[TemplateArg]) -> Vec<TemplateArg> {
    args.iter().map(canonical_arg).collect()
}

fn render_spec(spec: &TypeSpec, types: &TypeRegistry, interner: &SymbolInterner) -> String {
    let mut out = String::new();
    if spec.is_const {
        out.push_str("c_");
    }
    match &spec.kind {
        TypeSpecKind::Builtin(vt) => out.push_str(&format!("{vt:?}").to_lowercase()),
        TypeSpecKind::Indexed(idx) => {
            out.push_str(interner.view(types.get(types.resolve_alias(*idx)).name))
        }
        TypeSpecKind::TemplateParam(name)
        | TypeSpecKind::Pack(name)
        | TypeSpecKind::Dependent(name) => out.push_str(interner.view(*name)),
        TypeSpecKind::TemplateId { template, args } => {
            out.push_str(interner.view(*template));
            for arg in args {
                out.push('_');
                match arg {
                    TemplateArg::Type(s) => out.push_str(&render_spec(s, types, interner)),
                    TemplateArg::Value { value, .. } => out.push_str(&format!("v{value}")),
                }
            }
        }
    }
    for _ in 0..spec.pointer_depth {
        out.push_str("_p");
    }
    if let Some(n) = spec.array_size {
        out.push_str(&format!("_a{n}"));
    }
    if spec.is_rvalue_reference {
        out.push_str("_rr");
    } else if spec.is_reference {
        out.push_str("_r");
    }
    out
}

/// The canonical instantiation name for `base<args...>`.
///
/// Deterministic in the canonicalized argument list; readable prefix plus an
/// FxHash of the rendered arguments so the name stays bounded and injective
/// modulo alias resolution.
pub fn get_instantiated_class_name(
    base: &str,
    args: &[TemplateArg],
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    let canon = canonical_args(args);
    let mut rendered = Vec::with_capacity(canon.len());
    for arg in &canon {
        match arg {
            TemplateArg::Type(spec) => rendered.push(render_spec(spec, types, interner)),
            TemplateArg::Value { value, .. } => rendered.push(format!("v{value}")),
        }
    }
    let joined = rendered.join("_");
    let mut hasher = FxHasher::default();
    base.hash(&mut hasher);
    joined.hash(&mut hasher);
    let digest = hasher.finish() as u32;
    if joined.len() <= 32 {
        format!("{base}_{joined}_{digest:08x}")
    } else {
        format!("{base}_{digest:08x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::DataModel;

    fn fixture() -> (SymbolInterner, TypeRegistry) {
        let mut interner = SymbolInterner::new();
        let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
        (interner, types)
    }

    #[test]
    fn same_args_same_name() {
        let (interner, types) = fixture();
        let a = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];
        let b = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];
        assert_eq!(
            get_instantiated_class_name("vector", &a, &types, &interner),
            get_instantiated_class_name("vector", &b, &types, &interner)
        );
    }

    #[test]
    fn const_value_arg_folds_to_plain() {
        // vector<const int> canonicalizes like vector<int>.
        let (interner, types) = fixture();
        let plain = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];
        let constant = [TemplateArg::Type(
            TypeSpec::builtin(ValueType::Int).with_const(),
        )];
        assert_eq!(
            get_instantiated_class_name("vector", &plain, &types, &interner),
            get_instantiated_class_name("vector", &constant, &types, &interner)
        );
    }

    #[test]
    fn const_ref_is_distinct_from_plain_ref_target() {
        // const T& keeps its const (it is not top-level).
        let (interner, types) = fixture();
        let plain_ref = [TemplateArg::Type(
            TypeSpec::builtin(ValueType::Int).with_reference(),
        )];
        let const_ref = [TemplateArg::Type(
            TypeSpec::builtin(ValueType::Int).with_reference().with_const(),
        )];
        assert_ne!(
            get_instantiated_class_name("wrap", &plain_ref, &types, &interner),
            get_instantiated_class_name("wrap", &const_ref, &types, &interner)
        );
    }

    #[test]
    fn distinct_types_get_distinct_names() {
        let (interner, types) = fixture();
        let int_arg = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];
        let dbl_arg = [TemplateArg::Type(TypeSpec::builtin(ValueType::Double))];
        assert_ne!(
            get_instantiated_class_name("vector", &int_arg, &types, &interner),
            get_instantiated_class_name("vector", &dbl_arg, &types, &interner)
        );
    }

    #[test]
    fn non_type_args_participate() {
        let (interner, types) = fixture();
        let three = [TemplateArg::Value {
            value: 3,
            ty: ValueType::Int,
        }];
        let four = [TemplateArg::Value {
            value: 4,
            ty: ValueType::Int,
        }];
        assert_ne!(
            get_instantiated_class_name("array", &three, &types, &interner),
            get_instantiated_class_name("array", &four, &types, &interner)
        );
    }
}
