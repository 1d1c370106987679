use cinder_ast::{
    Arenas, DeclId, DeclKind, TypeRegistry, TypeSpec, TypeSpecKind, ValueType,
};
use cinder_common::Token;
use thiserror::Error;

/// Quality of one argument-to-parameter conversion, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionRank {
    Exact,
    /// Integral promotion or `float` → `double`.
    Promotion,
    /// Any other standard conversion (arithmetic, pointer decay, bool).
    Conversion,
    NoMatch,
}

#[derive(Debug, Clone, Error)]
pub enum OverloadError {
    #[error("no matching overload for call")]
    NoMatch { token: Token },
    #[error("ambiguous call: two candidates rank equally")]
    Ambiguous {
        token: Token,
        first: DeclId,
        second: DeclId,
    },
}

/// Rank how `arg` converts to parameter type `param`.
pub fn conversion_rank(types: &TypeRegistry, param: &TypeSpec, arg: &TypeSpec) -> ConversionRank {
    // References bind to the referent type; const-ness is not tracked per
    // value category here, so `const T&` accepts a `T` argument as exact.
    let mut p = param.clone();
    p.is_reference = false;
    p.is_rvalue_reference = false;
    p.is_const = false;
    let mut a = arg.clone();
    a.is_reference = false;
    a.is_rvalue_reference = false;
    a.is_const = false;
    // Array-to-pointer decay.
    if a.array_size.is_some() {
        a.array_size = None;
        a.pointer_depth += 1;
    }

    if p == a {
        return ConversionRank::Exact;
    }

    if p.pointer_depth != a.pointer_depth {
        // Literal zero / nullptr handled by the caller; anything else fails.
        return ConversionRank::NoMatch;
    }

    if p.pointer_depth > 0 {
        // void* accepts any pointer at Conversion rank.
        if matches!(p.kind, TypeSpecKind::Builtin(ValueType::Void)) {
            return ConversionRank::Conversion;
        }
        // Derived* → Base* conversion.
        if let (TypeSpecKind::Indexed(base), TypeSpecKind::Indexed(derived)) = (&p.kind, &a.kind) {
            if is_base_of(types, *base, *derived) {
                return ConversionRank::Conversion;
            }
        }
        return ConversionRank::NoMatch;
    }

    let (pv, av) = (value_of(types, &p), value_of(types, &a));
    match (pv, av) {
        (Some(pv), Some(av)) if pv.is_arithmetic() && av.is_arithmetic() => {
            if is_promotion(av, pv) {
                ConversionRank::Promotion
            } else {
                ConversionRank::Conversion
            }
        }
        _ => ConversionRank::NoMatch,
    }
}

fn value_of(types: &TypeRegistry, spec: &TypeSpec) -> Option<ValueType> {
    match spec.kind {
        TypeSpecKind::Builtin(vt) => Some(vt),
        TypeSpecKind::Indexed(idx) => {
            let idx = types.resolve_alias(idx);
            match types.get(idx).kind {
                cinder_ast::TypeKind::Builtin(vt) => Some(vt),
                cinder_ast::TypeKind::Enum => Some(ValueType::Enum),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_promotion(from: ValueType, to: ValueType) -> bool {
    use ValueType::*;
    matches!(
        (from, to),
        (Bool | Char | UnsignedChar | Short | UnsignedShort, Int) | (Float, Double)
    )
}

fn is_base_of(types: &TypeRegistry, base: cinder_ast::TypeIndex, derived: cinder_ast::TypeIndex) -> bool {
    let base = types.resolve_alias(base);
    let mut work = vec![types.resolve_alias(derived)];
    while let Some(idx) = work.pop() {
        if idx == base {
            return true;
        }
        if let Some(info) = types.struct_info(idx) {
            work.extend(info.bases.iter().map(|b| b.type_index));
        }
    }
    false
}

fn candidate_params<'a>(arenas: &'a Arenas, decl: DeclId) -> Option<Vec<&'a TypeSpec>> {
    match &arenas.decl(decl).kind {
        DeclKind::Function(f) => Some(f.params.iter().map(|p| &p.ty).collect()),
        _ => None,
    }
}

/// Pick the best viable candidate for `arg_types`.
///
/// Template candidates must already be instantiated by the caller and passed
/// as ordinary function declarations. A candidate is better when every
/// per-argument rank is at least as good and one is strictly better; two
/// incomparable best candidates are an ambiguity error.
pub fn resolve_overload(
    arenas: &Arenas,
    types: &TypeRegistry,
    candidates: &[DeclId],
    arg_types: &[TypeSpec],
    token: Token,
) -> Result<DeclId, OverloadError> {
    let mut viable: Vec<(DeclId, Vec<ConversionRank>)> = Vec::new();

    'next: for &cand in candidates {
        let params = match candidate_params(arenas, cand) {
            Some(p) => p,
            None => continue,
        };
        let variadic = matches!(
            &arenas.decl(cand).kind,
            DeclKind::Function(f) if f.is_variadic
        );
        let defaults_from = params
            .len()
            .min(count_defaults_start(arenas, cand).unwrap_or(params.len()));
        if arg_types.len() > params.len() && !variadic {
            continue;
        }
        if arg_types.len() < defaults_from {
            continue;
        }
        let mut ranks = Vec::with_capacity(arg_types.len());
        for (i, arg) in arg_types.iter().enumerate() {
            match params.get(i) {
                Some(param) => {
                    let rank = conversion_rank(types, param, arg);
                    if rank == ConversionRank::NoMatch {
                        continue 'next;
                    }
                    ranks.push(rank);
                }
                // Extra args consumed by `...` rank worst.
                None => ranks.push(ConversionRank::Conversion),
            }
        }
        viable.push((cand, ranks));
    }

    // Keep the non-dominated set under the per-argument partial order.
    let mut best: Vec<(DeclId, Vec<ConversionRank>)> = Vec::new();
    for (cand, ranks) in viable {
        let mut dominated = false;
        best.retain(|(_, kept)| match compare_sequences(&ranks, kept) {
            SeqOrder::Better => false,
            SeqOrder::Worse => {
                dominated = true;
                true
            }
            SeqOrder::Incomparable => true,
        });
        if !dominated {
            best.push((cand, ranks));
        }
    }
    match best.len() {
        0 => Err(OverloadError::NoMatch { token }),
        1 => Ok(best[0].0),
        _ => Err(OverloadError::Ambiguous {
            token,
            first: best[0].0,
            second: best[1].0,
        }),
    }
}

fn count_defaults_start(arenas: &Arenas, decl: DeclId) -> Option<usize> {
    match &arenas.decl(decl).kind {
        DeclKind::Function(f) => Some(
            f.params
                .iter()
                .position(|p| p.default.is_some())
                .unwrap_or(f.params.len()),
        ),
        _ => None,
    }
}

enum SeqOrder {
    Better,
    Worse,
    Incomparable,
}

fn compare_sequences(a: &[ConversionRank], b: &[ConversionRank]) -> SeqOrder {
    let mut a_better = false;
    let mut b_better = false;
    for (x, y) in a.iter().zip(b.iter()) {
        if x < y {
            a_better = true;
        } else if y < x {
            b_better = true;
        }
    }
    match (a_better, b_better) {
        (true, false) => SeqOrder::Better,
        (false, true) => SeqOrder::Worse,
        (false, false) => SeqOrder::Incomparable,
        (true, true) => SeqOrder::Incomparable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{
        DataModel, Decl, FunctionDecl, Linkage, NamespaceHandle, ParamDecl,
    };
    use cinder_common::{SourceMap, SymbolInterner, TokenKind};

    struct Fixture {
        interner: SymbolInterner,
        arenas: Arenas,
        types: TypeRegistry,
        token: Token,
    }

    impl Fixture {
        fn new() -> Self {
            let mut interner = SymbolInterner::new();
            let mut sources = SourceMap::new();
            let file = sources.add_file("ovl.cpp");
            let token = Token::new(TokenKind::Identifier, interner.intern("f"), file, 1, 1);
            let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
            Self {
                interner,
                arenas: Arenas::new(),
                types,
                token,
            }
        }

        fn function(&mut self, name: &str, params: &[TypeSpec]) -> DeclId {
            let sym = self.interner.intern(name);
            let params = params
                .iter()
                .map(|ty| ParamDecl {
                    name: sym,
                    ty: ty.clone(),
                    default: None,
                    from_pack: false,
                })
                .collect();
            self.arenas.alloc_decl(Decl::new(
                DeclKind::Function(FunctionDecl {
                    name: sym,
                    params,
                    return_type: TypeSpec::builtin(ValueType::Void),
                    body: None,
                    linkage: Linkage::CPlusPlus,
                    is_variadic: false,
                    namespace: NamespaceHandle::GLOBAL,
                    member_of: None,
                    is_static: false,
                    is_const: false,
                    operator_symbol: None,
                    mangled_name: None,
                }),
                self.token,
            ))
        }
    }

    #[test]
    fn exact_match_beats_conversion() {
        // void f(int); void f(double);  f(1) → f(int)
        let mut fx = Fixture::new();
        let f_int = fx.function("f", &[TypeSpec::builtin(ValueType::Int)]);
        let f_dbl = fx.function("f", &[TypeSpec::builtin(ValueType::Double)]);
        let picked = resolve_overload(
            &fx.arenas,
            &fx.types,
            &[f_int, f_dbl],
            &[TypeSpec::builtin(ValueType::Int)],
            fx.token,
        )
        .unwrap();
        assert_eq!(picked, f_int);
    }

    #[test]
    fn promotion_beats_conversion() {
        // void f(int); void f(long);  f(short) → f(int) by promotion
        let mut fx = Fixture::new();
        let f_int = fx.function("f", &[TypeSpec::builtin(ValueType::Int)]);
        let f_long = fx.function("f", &[TypeSpec::builtin(ValueType::Long)]);
        let picked = resolve_overload(
            &fx.arenas,
            &fx.types,
            &[f_int, f_long],
            &[TypeSpec::builtin(ValueType::Short)],
            fx.token,
        )
        .unwrap();
        assert_eq!(picked, f_int);
    }

    #[test]
    fn equal_ranks_are_ambiguous() {
        // void f(long); void f(double);  f(1) is ambiguous: both Conversion
        let mut fx = Fixture::new();
        let f_long = fx.function("f", &[TypeSpec::builtin(ValueType::Long)]);
        let f_dbl = fx.function("f", &[TypeSpec::builtin(ValueType::Double)]);
        let result = resolve_overload(
            &fx.arenas,
            &fx.types,
            &[f_long, f_dbl],
            &[TypeSpec::builtin(ValueType::Int)],
            fx.token,
        );
        assert!(matches!(result, Err(OverloadError::Ambiguous { .. })));
    }

    #[test]
    fn arity_mismatch_is_not_viable() {
        let mut fx = Fixture::new();
        let f = fx.function("f", &[TypeSpec::builtin(ValueType::Int)]);
        let result = resolve_overload(
            &fx.arenas,
            &fx.types,
            &[f],
            &[
                TypeSpec::builtin(ValueType::Int),
                TypeSpec::builtin(ValueType::Int),
            ],
            fx.token,
        );
        assert!(matches!(result, Err(OverloadError::NoMatch { .. })));
    }

    #[test]
    fn reference_parameter_binds_exactly() {
        // void f(const int&);  f(int) → exact
        let mut fx = Fixture::new();
        let param = TypeSpec::builtin(ValueType::Int).with_reference().with_const();
        let f = fx.function("f", &[param]);
        let picked = resolve_overload(
            &fx.arenas,
            &fx.types,
            &[f],
            &[TypeSpec::builtin(ValueType::Int)],
            fx.token,
        )
        .unwrap();
        assert_eq!(picked, f);
    }
}
