//! Template argument deduction.
//!
//! Unifies each formal parameter type against the corresponding call
//! argument type, recursing through pointers, references, and arrays, with
//! the forwarding-reference rule (`T&&` + lvalue deduces `T = U&`). Explicit
//! arguments are authoritative and never overridden by deduction.

use crate::registry::TemplateRegistry;
use cinder_ast::{TemplateArg, TemplateParam, TypeSpec, TypeSpecKind};
use cinder_common::{Symbol, SymbolInterner};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeductionError {
    #[error("template parameter deduced to conflicting types")]
    Conflict {
        param: Symbol,
        first: TypeSpec,
        second: TypeSpec,
    },
    #[error("argument type does not match parameter type")]
    TypeMismatch { expected: TypeSpec, got: TypeSpec },
    #[error("could not deduce all template parameters")]
    InsufficientArguments { missing: Vec<Symbol> },
}

/// Successful deduction: one argument per template parameter, in parameter
/// order, plus the collected bindings for any trailing parameter pack.
#[derive(Debug, Clone)]
pub struct DeductionResult {
    pub args: Vec<TemplateArg>,
    pub packs: FxHashMap<Symbol, Vec<TemplateArg>>,
}

/// Accumulates `param → type` bindings while unifying.
#[derive(Default)]
pub struct TypeDeducer<'r> {
    deductions: FxHashMap<Symbol, TypeSpec>,
    explicit_params: FxHashSet<Symbol>,
    /// Provenance lookups for unifying `Container<T>` against an already
    /// instantiated `Container<int>` argument.
    registry: Option<&'r TemplateRegistry>,
}

impl<'r> TypeDeducer<'r> {
    pub fn new(registry: Option<&'r TemplateRegistry>) -> Self {
        Self {
            deductions: FxHashMap::default(),
            explicit_params: FxHashSet::default(),
            registry,
        }
    }

    /// Deduce all template parameters from call-argument types.
    pub fn deduce(
        template_params: &[TemplateParam],
        fn_params: &[TypeSpec],
        arg_types: &[TypeSpec],
        interner: &SymbolInterner,
        registry: Option<&'r TemplateRegistry>,
    ) -> Result<DeductionResult, DeductionError> {
        Self::deduce_with_explicit(template_params, &[], fn_params, arg_types, interner, registry)
    }

    /// Deduction with a leading run of explicit arguments.
    pub fn deduce_with_explicit(
        template_params: &[TemplateParam],
        explicit_args: &[TemplateArg],
        fn_params: &[TypeSpec],
        arg_types: &[TypeSpec],
        _interner: &SymbolInterner,
        registry: Option<&'r TemplateRegistry>,
    ) -> Result<DeductionResult, DeductionError> {
        let mut deducer = Self::new(registry);
        let mut packs: FxHashMap<Symbol, Vec<TemplateArg>> = FxHashMap::default();
        let mut values: FxHashMap<Symbol, TemplateArg> = FxHashMap::default();

        for (i, explicit) in explicit_args.iter().enumerate() {
            if let Some(param) = template_params.get(i) {
                match explicit {
                    TemplateArg::Type(spec) => {
                        deducer.deductions.insert(param.name, spec.clone());
                    }
                    value @ TemplateArg::Value { .. } => {
                        values.insert(param.name, value.clone());
                    }
                }
                deducer.explicit_params.insert(param.name);
            }
        }

        let pack_param = template_params.iter().find(|p| p.is_pack).map(|p| p.name);
        // Packs bind even when empty, so `sizeof...` and empty folds
        // substitute to 0 / identity instead of surviving unresolved.
        for param_ty in fn_params {
            if let TypeSpecKind::Pack(pack_name) = &param_ty.kind {
                packs.entry(*pack_name).or_default();
            }
        }

        for (i, param_ty) in fn_params.iter().enumerate() {
            if let TypeSpecKind::Pack(pack_name) = &param_ty.kind {
                // A trailing pack parameter absorbs every remaining argument.
                let rest = packs.entry(*pack_name).or_default();
                for arg in arg_types.iter().skip(i) {
                    rest.push(TemplateArg::Type(strip_toplevel(arg)));
                }
                break;
            }
            if let Some(arg_ty) = arg_types.get(i) {
                deducer.unify(param_ty, arg_ty)?;
            }
        }

        // Fill trailing parameters from their defaults, substituting earlier
        // deductions into dependent default specs.
        for param in template_params {
            if deducer.deductions.contains_key(&param.name)
                || values.contains_key(&param.name)
                || Some(param.name) == pack_param
            {
                continue;
            }
            if let cinder_ast::TemplateParamKind::Type {
                default: Some(default_spec),
            } = &param.kind
            {
                let resolved = deducer.resolve_default(default_spec);
                deducer.deductions.insert(param.name, resolved);
            }
        }

        let missing: Vec<Symbol> = template_params
            .iter()
            .filter(|p| {
                !p.is_pack
                    && !deducer.deductions.contains_key(&p.name)
                    && !values.contains_key(&p.name)
            })
            .map(|p| p.name)
            .collect();
        if !missing.is_empty() {
            return Err(DeductionError::InsufficientArguments { missing });
        }

        let args = template_params
            .iter()
            .filter(|p| !p.is_pack)
            .map(|p| {
                values.get(&p.name).cloned().unwrap_or_else(|| {
                    TemplateArg::Type(deducer.deductions[&p.name].clone())
                })
            })
            .collect();

        Ok(DeductionResult { args, packs })
    }

    fn unify(&mut self, param: &TypeSpec, arg: &TypeSpec) -> Result<(), DeductionError> {
        match &param.kind {
            TypeSpecKind::TemplateParam(name) => {
                // Forwarding reference: T&& bound to an lvalue deduces T = U&.
                let deduced = if param.is_rvalue_reference && param.pointer_depth == 0 {
                    if arg.is_reference || arg.place_like() {
                        let mut d = strip_toplevel(arg);
                        d.is_reference = true;
                        d
                    } else {
                        strip_toplevel(arg)
                    }
                } else if param.is_reference || param.is_rvalue_reference {
                    // const T& / T&: deduce the referent, const dropped when
                    // the parameter spells it.
                    let mut d = strip_toplevel(arg);
                    if param.is_const {
                        d.is_const = false;
                    }
                    d
                } else if param.pointer_depth > 0 {
                    // T* / T**: peel the parameter's pointer levels off.
                    if arg.pointer_depth < param.pointer_depth {
                        return Err(DeductionError::TypeMismatch {
                            expected: param.clone(),
                            got: arg.clone(),
                        });
                    }
                    let mut d = strip_toplevel(arg);
                    d.pointer_depth = arg.pointer_depth - param.pointer_depth;
                    d
                } else if param.array_size.is_some() {
                    let mut d = strip_toplevel(arg);
                    d.array_size = None;
                    d
                } else {
                    strip_toplevel(arg)
                };
                self.record(*name, deduced)
            }
            // Container<T> against an instantiated Container<int>: match the
            // base template, then unify each pattern argument.
            TypeSpecKind::TemplateId { template, args } => {
                let arg_idx = match &arg.kind {
                    TypeSpecKind::Indexed(idx) => *idx,
                    _ => {
                        return Err(DeductionError::TypeMismatch {
                            expected: param.clone(),
                            got: arg.clone(),
                        })
                    }
                };
                let provenance = self
                    .registry
                    .and_then(|r| r.provenance(arg_idx))
                    .cloned();
                let (arg_template, arg_args) = match provenance {
                    Some(p) => p,
                    None => {
                        return Err(DeductionError::TypeMismatch {
                            expected: param.clone(),
                            got: arg.clone(),
                        })
                    }
                };
                if arg_template != *template || args.len() != arg_args.len() {
                    return Err(DeductionError::TypeMismatch {
                        expected: param.clone(),
                        got: arg.clone(),
                    });
                }
                for (pat, concrete) in args.iter().zip(arg_args.iter()) {
                    match (pat, concrete) {
                        (TemplateArg::Type(p), TemplateArg::Type(a)) => self.unify(p, a)?,
                        (a, b) if a == b => {}
                        _ => {
                            return Err(DeductionError::TypeMismatch {
                                expected: param.clone(),
                                got: arg.clone(),
                            })
                        }
                    }
                }
                Ok(())
            }

            // Non-dependent parameter: shapes must agree.
            _ if !param.is_dependent() => {
                let p = strip_toplevel(param);
                let a = strip_toplevel(arg);
                if p.kind == a.kind && p.pointer_depth == a.pointer_depth {
                    Ok(())
                } else if compatible_builtin(&p, &a) {
                    Ok(())
                } else {
                    Err(DeductionError::TypeMismatch {
                        expected: param.clone(),
                        got: arg.clone(),
                    })
                }
            }
            // Dependent (typename T::x): nothing to deduce through.
            _ => Ok(()),
        }
    }

    fn record(&mut self, name: Symbol, deduced: TypeSpec) -> Result<(), DeductionError> {
        if self.explicit_params.contains(&name) {
            return Ok(());
        }
        if let Some(existing) = self.deductions.get(&name) {
            if *existing != deduced {
                return Err(DeductionError::Conflict {
                    param: name,
                    first: existing.clone(),
                    second: deduced,
                });
            }
            return Ok(());
        }
        self.deductions.insert(name, deduced);
        Ok(())
    }

    fn resolve_default(&self, default_spec: &TypeSpec) -> TypeSpec {
        match &default_spec.kind {
            TypeSpecKind::TemplateParam(earlier) => {
                let mut resolved = self
                    .deductions
                    .get(earlier)
                    .cloned()
                    .unwrap_or_else(|| default_spec.clone());
                resolved.pointer_depth += default_spec.pointer_depth;
                resolved.is_reference |= default_spec.is_reference;
                resolved
            }
            _ => default_spec.clone(),
        }
    }
}

/// Drop declarator decoration, keeping the base kind.
fn strip_toplevel(spec: &TypeSpec) -> TypeSpec {
    let mut s = spec.clone();
    s.is_reference = false;
    s.is_rvalue_reference = false;
    s.is_const = false;
    s
}

fn compatible_builtin(param: &TypeSpec, arg: &TypeSpec) -> bool {
    use cinder_ast::ValueType::*;
    match (&param.kind, &arg.kind) {
        (TypeSpecKind::Builtin(p), TypeSpecKind::Builtin(a)) => matches!(
            (p, a),
            (Int, Char) | (Int, Short) | (Int, Bool) | (Double, Float)
        ),
        _ => false,
    }
}

trait PlaceLike {
    fn place_like(&self) -> bool;
}

impl PlaceLike for TypeSpec {
    /// Whether an argument spec describes an lvalue at the call site. The
    /// parser marks lvalue arguments by keeping their reference bit set.
    fn place_like(&self) -> bool {
        self.is_reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{TemplateParamKind, ValueType};

    fn tparam(interner: &mut SymbolInterner, name: &str) -> TemplateParam {
        TemplateParam {
            name: interner.intern(name),
            kind: TemplateParamKind::Type { default: None },
            is_pack: false,
        }
    }

    #[test]
    fn deduce_t_from_int() {
        // template<typename T> T identity(T x);  identity(42) → T = int
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let t_spec = TypeSpec::template_param(t.name);
        let result = TypeDeducer::deduce(
            &[t],
            &[t_spec],
            &[TypeSpec::builtin(ValueType::Int)],
            &interner,
            None,
        )
        .unwrap();
        assert_eq!(
            result.args,
            vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Int))]
        );
    }

    #[test]
    fn conflicting_deduction_is_an_error() {
        // template<typename T> T max(T a, T b);  max(1, 3.14) → conflict
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let t_spec = TypeSpec::template_param(t.name);
        let result = TypeDeducer::deduce(
            &[t],
            &[t_spec.clone(), t_spec],
            &[
                TypeSpec::builtin(ValueType::Int),
                TypeSpec::builtin(ValueType::Double),
            ],
            &interner,
            None,
        );
        assert!(matches!(result, Err(DeductionError::Conflict { .. })));
    }

    #[test]
    fn pointer_parameter_peels_a_level() {
        // template<typename T> void process(T* p);  process(&x) → T = int
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let param = TypeSpec::template_param(t.name).with_pointer(1);
        let arg = TypeSpec::builtin(ValueType::Int).with_pointer(1);
        let result = TypeDeducer::deduce(&[t], &[param], &[arg], &interner, None).unwrap();
        assert_eq!(
            result.args,
            vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Int))]
        );
    }

    #[test]
    fn const_ref_parameter_strips_const() {
        // template<typename T> void print(const T& x);  print(x) → T = int
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let param = TypeSpec::template_param(t.name)
            .with_reference()
            .with_const();
        let arg = TypeSpec::builtin(ValueType::Int);
        let result = TypeDeducer::deduce(&[t], &[param], &[arg], &interner, None).unwrap();
        assert_eq!(
            result.args,
            vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Int))]
        );
    }

    #[test]
    fn forwarding_reference_deduces_lvalue_as_reference() {
        // template<typename T> void fwd(T&& x); lvalue int → T = int&
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let mut param = TypeSpec::template_param(t.name);
        param.is_rvalue_reference = true;
        let lvalue_arg = TypeSpec::builtin(ValueType::Int).with_reference();
        let result = TypeDeducer::deduce(&[t], &[param], &[lvalue_arg], &interner, None).unwrap();
        let expected = TypeSpec::builtin(ValueType::Int).with_reference();
        assert_eq!(result.args, vec![TemplateArg::Type(expected)]);
    }

    #[test]
    fn forwarding_reference_deduces_rvalue_plain() {
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let mut param = TypeSpec::template_param(t.name);
        param.is_rvalue_reference = true;
        let rvalue_arg = TypeSpec::builtin(ValueType::Int);
        let result = TypeDeducer::deduce(&[t], &[param], &[rvalue_arg], &interner, None).unwrap();
        assert_eq!(
            result.args,
            vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Int))]
        );
    }

    #[test]
    fn explicit_argument_wins_over_deduction() {
        // template<typename T> T identity(T x); identity<double>(42) → T = double
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let t_spec = TypeSpec::template_param(t.name);
        let result = TypeDeducer::deduce_with_explicit(
            &[t],
            &[TemplateArg::Type(TypeSpec::builtin(ValueType::Double))],
            &[t_spec],
            &[TypeSpec::builtin(ValueType::Int)],
            &interner,
            None,
        )
        .unwrap();
        assert_eq!(
            result.args,
            vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Double))]
        );
    }

    #[test]
    fn undeducible_parameter_reports_missing() {
        // template<typename T, typename U> T convert(U x); convert(3.14)
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let u = tparam(&mut interner, "U");
        let u_spec = TypeSpec::template_param(u.name);
        let result = TypeDeducer::deduce(
            &[t, u],
            &[u_spec],
            &[TypeSpec::builtin(ValueType::Double)],
            &interner,
            None,
        );
        assert!(matches!(
            result,
            Err(DeductionError::InsufficientArguments { .. })
        ));
    }

    #[test]
    fn default_fills_missing_trailing_parameter() {
        // template<typename T, typename U = T> void pair_up(T a);
        let mut interner = SymbolInterner::new();
        let t = tparam(&mut interner, "T");
        let u_name = interner.intern("U");
        let u = TemplateParam {
            name: u_name,
            kind: TemplateParamKind::Type {
                default: Some(TypeSpec::template_param(t.name)),
            },
            is_pack: false,
        };
        let t_spec = TypeSpec::template_param(t.name);
        let result = TypeDeducer::deduce(
            &[t, u],
            &[t_spec],
            &[TypeSpec::builtin(ValueType::Int)],
            &interner,
            None,
        )
        .unwrap();
        assert_eq!(result.args.len(), 2);
        assert_eq!(
            result.args[1],
            TemplateArg::Type(TypeSpec::builtin(ValueType::Int))
        );
    }

    #[test]
    fn trailing_pack_absorbs_remaining_arguments() {
        // template<typename... Args> int count(Args... args);
        let mut interner = SymbolInterner::new();
        let pack_name = interner.intern("Args");
        let pack = TemplateParam {
            name: pack_name,
            kind: TemplateParamKind::Type { default: None },
            is_pack: true,
        };
        let mut pack_spec = TypeSpec::template_param(pack_name);
        pack_spec.kind = TypeSpecKind::Pack(pack_name);
        let result = TypeDeducer::deduce(
            &[pack],
            &[pack_spec],
            &[
                TypeSpec::builtin(ValueType::Int),
                TypeSpec::builtin(ValueType::Double),
                TypeSpec::builtin(ValueType::Bool),
            ],
            &interner,
            None,
        )
        .unwrap();
        assert_eq!(result.packs[&pack_name].len(), 3);
    }
}
