//! Concept and `requires`-clause evaluation.
//!
//! A constraint expression is substituted with the candidate bindings and
//! then interpreted: boolean connectives fold, type traits ask the registry,
//! `requires` bodies check that their requirements still resolve after
//! substitution. Failure is never a hard error here; the result is `false`
//! and the caller (deduction, overload choice, `static_assert`) decides.

use crate::substitute::{Bindings, Substituter};
use cinder_ast::{
    Arenas, BinaryOp, DeclKind, ExprId, ExprKind, Requirement, TemplateArg, TypeRegistry, UnaryOp,
};
use cinder_common::SymbolInterner;
use cinder_sema::{ConstEvalError, ConstEvaluator, ConstValue};

/// Everything constraint evaluation needs to borrow.
pub struct ConstraintContext<'a> {
    pub arenas: &'a mut Arenas,
    pub types: &'a TypeRegistry,
    pub interner: &'a mut SymbolInterner,
}

/// Evaluate `constraint` under `bindings`; `true` means satisfied.
pub fn evaluate_constraint(
    ctx: &mut ConstraintContext<'_>,
    constraint: ExprId,
    bindings: &Bindings,
) -> bool {
    let substituted = {
        let mut sub = Substituter::new(ctx.arenas, ctx.interner, bindings);
        match sub.substitute_expr(constraint) {
            Ok(e) => e,
            Err(_) => return false,
        }
    };
    eval(ctx, substituted, bindings)
}

fn eval(ctx: &mut ConstraintContext<'_>, expr: ExprId, bindings: &Bindings) -> bool {
    let kind = ctx.arenas.expr(expr).kind.clone();
    match kind {
        ExprKind::Binary {
            op: BinaryOp::LogicalAnd,
            lhs,
            rhs,
        } => eval(ctx, lhs, bindings) && eval(ctx, rhs, bindings),

        ExprKind::Binary {
            op: BinaryOp::LogicalOr,
            lhs,
            rhs,
        } => eval(ctx, lhs, bindings) || eval(ctx, rhs, bindings),

        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
            ..
        } => !eval(ctx, operand, bindings),

        ExprKind::Requires(clause) => clause.requirements.iter().all(|req| match req {
            Requirement::Expression(e) => expression_resolves(ctx, *e),
            Requirement::Type(spec) => !spec.is_dependent(),
            Requirement::Compound { expr, .. } => expression_resolves(ctx, *expr),
        }),

        ExprKind::ConceptApplication { concept_decl, args } => {
            let (params, constraint) = match &ctx.arenas.decl(concept_decl).kind {
                DeclKind::Concept {
                    params, constraint, ..
                } => (params.clone(), *constraint),
                _ => return false,
            };
            // Arguments may themselves mention the outer bindings.
            let resolved: Vec<TemplateArg> = args
                .iter()
                .map(|a| match a {
                    TemplateArg::Type(spec) => {
                        let sub = Substituter::new(ctx.arenas, ctx.interner, bindings);
                        TemplateArg::Type(sub.substitute_spec(spec))
                    }
                    v => v.clone(),
                })
                .collect();
            let inner = Bindings::from_args(&params, &resolved);
            evaluate_constraint(ctx, constraint, &inner)
        }

        // Everything else is a boolean constant expression.
        _ => {
            let mut evaluator = ConstEvaluator::new(ctx.arenas, ctx.types);
            for (name, (value, _ty)) in &bindings.values {
                evaluator.bind(*name, ConstValue::Int(*value));
            }
            for (name, elems) in &bindings.packs {
                evaluator.pack_sizes.insert(*name, elems.len());
            }
            match evaluator.evaluate(expr) {
                Ok(v) => v.as_bool(),
                Err(_) => false,
            }
        }
    }
}

/// After substitution, does this expression still name things that exist?
///
/// Unsubstituted parameter references and dependent specs mean the
/// requirement cannot hold; an expression that merely is not a constant
/// (say, a member call on a value) still counts as resolving.
fn expression_resolves(ctx: &mut ConstraintContext<'_>, expr: ExprId) -> bool {
    if has_dependent_leftovers(ctx.arenas, expr) {
        return false;
    }
    let evaluator = ConstEvaluator::new(ctx.arenas, ctx.types);
    match evaluator.evaluate(expr) {
        Ok(_) => true,
        Err(ConstEvalError::UnknownIdentifier { .. }) => false,
        Err(_) => true,
    }
}

fn has_dependent_leftovers(arenas: &Arenas, expr: ExprId) -> bool {
    match &arenas.expr(expr).kind {
        ExprKind::TemplateParameterReference { .. } => true,
        ExprKind::Sizeof(cinder_ast::SizeofArg::Type(spec)) | ExprKind::Alignof(spec) => {
            spec.is_dependent()
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            has_dependent_leftovers(arenas, *lhs) || has_dependent_leftovers(arenas, *rhs)
        }
        ExprKind::Unary { operand, .. } => has_dependent_leftovers(arenas, *operand),
        ExprKind::MemberAccess { object, .. } => has_dependent_leftovers(arenas, *object),
        ExprKind::MemberFunctionCall { object, args, .. } => {
            has_dependent_leftovers(arenas, *object)
                || args.iter().any(|a| has_dependent_leftovers(arenas, *a))
        }
        ExprKind::FunctionCall { args, .. } => {
            args.iter().any(|a| has_dependent_leftovers(arenas, *a))
        }
        ExprKind::Cast { target, operand, .. } => {
            target.is_dependent() || has_dependent_leftovers(arenas, *operand)
        }
        ExprKind::TypeTraitExpr { type_args, .. } => type_args.iter().any(|s| s.is_dependent()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{
        DataModel, Expr, TemplateParam, TemplateParamKind, TypeSpec, TypeTrait, ValueType,
    };
    use cinder_common::{SourceMap, Token, TokenKind};

    struct Fixture {
        arenas: Arenas,
        types: TypeRegistry,
        interner: SymbolInterner,
        token: Token,
    }

    impl Fixture {
        fn new() -> Self {
            let mut interner = SymbolInterner::new();
            let mut sources = SourceMap::new();
            let file = sources.add_file("concepts.cpp");
            let token = Token::new(TokenKind::Identifier, interner.intern("C"), file, 1, 1);
            let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
            Self {
                arenas: Arenas::new(),
                types,
                interner,
                token,
            }
        }

        fn ctx(&mut self) -> ConstraintContext<'_> {
            ConstraintContext {
                arenas: &mut self.arenas,
                types: &self.types,
                interner: &mut self.interner,
            }
        }
    }

    #[test]
    fn is_integral_constraint_on_int_and_double() {
        // concept Integral = __is_integral(T);
        let mut fx = Fixture::new();
        let t = fx.interner.intern("T");
        let trait_expr = fx.arenas.alloc_expr(Expr::new(
            ExprKind::TypeTraitExpr {
                trait_kind: TypeTrait::IsIntegral,
                type_args: vec![TypeSpec::template_param(t)],
            },
            fx.token,
        ));

        let mut int_bindings = Bindings::default();
        int_bindings.types.insert(t, TypeSpec::builtin(ValueType::Int));
        assert!(evaluate_constraint(&mut fx.ctx(), trait_expr, &int_bindings));

        let mut dbl_bindings = Bindings::default();
        dbl_bindings
            .types
            .insert(t, TypeSpec::builtin(ValueType::Double));
        assert!(!evaluate_constraint(&mut fx.ctx(), trait_expr, &dbl_bindings));
    }

    #[test]
    fn conjunction_needs_both_sides() {
        let mut fx = Fixture::new();
        let t = fx.interner.intern("T");
        let integral = fx.arenas.alloc_expr(Expr::new(
            ExprKind::TypeTraitExpr {
                trait_kind: TypeTrait::IsIntegral,
                type_args: vec![TypeSpec::template_param(t)],
            },
            fx.token,
        ));
        let signed_check = fx.arenas.alloc_expr(Expr::new(
            ExprKind::TypeTraitExpr {
                trait_kind: TypeTrait::IsSigned,
                type_args: vec![TypeSpec::template_param(t)],
            },
            fx.token,
        ));
        let both = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::LogicalAnd,
                lhs: integral,
                rhs: signed_check,
            },
            fx.token,
        ));

        let mut uint_bindings = Bindings::default();
        uint_bindings
            .types
            .insert(t, TypeSpec::builtin(ValueType::UnsignedInt));
        assert!(!evaluate_constraint(&mut fx.ctx(), both, &uint_bindings));

        let mut int_bindings = Bindings::default();
        int_bindings.types.insert(t, TypeSpec::builtin(ValueType::Int));
        assert!(evaluate_constraint(&mut fx.ctx(), both, &int_bindings));
    }

    #[test]
    fn requires_with_dependent_type_requirement_fails_unbound() {
        // requires { typename T::value_type; } with T unbound → false
        let mut fx = Fixture::new();
        let dep = fx.interner.intern("T::value_type");
        let clause = cinder_ast::RequiresClause {
            params: vec![],
            requirements: vec![Requirement::Type(TypeSpec {
                kind: cinder_ast::TypeSpecKind::Dependent(dep),
                pointer_depth: 0,
                is_reference: false,
                is_rvalue_reference: false,
                is_const: false,
                array_size: None,
            })],
        };
        let req = fx
            .arenas
            .alloc_expr(Expr::new(ExprKind::Requires(Box::new(clause)), fx.token));
        let bindings = Bindings::default();
        assert!(!evaluate_constraint(&mut fx.ctx(), req, &bindings));
    }

    #[test]
    fn nttp_comparison_constraint() {
        // N > 0 with N = 3 → satisfied; N = 0 → not
        let mut fx = Fixture::new();
        let n = fx.interner.intern("N");
        let n_ref = fx.arenas.alloc_expr(Expr::new(
            ExprKind::TemplateParameterReference {
                name: n,
                is_pack: false,
            },
            fx.token,
        ));
        let zero = fx.arenas.alloc_expr(Expr::new(
            ExprKind::IntLiteral {
                value: 0,
                ty: ValueType::Int,
            },
            fx.token,
        ));
        let cmp = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Gt,
                lhs: n_ref,
                rhs: zero,
            },
            fx.token,
        ));

        let mut three = Bindings::default();
        three.values.insert(n, (3, ValueType::Int));
        assert!(evaluate_constraint(&mut fx.ctx(), cmp, &three));

        let mut zero_binding = Bindings::default();
        zero_binding.values.insert(n, (0, ValueType::Int));
        assert!(!evaluate_constraint(&mut fx.ctx(), cmp, &zero_binding));
    }

    #[test]
    fn concept_application_recurses() {
        // concept Small = sizeof(T) <= 4;  Small<int> true, Small<double> false
        let mut fx = Fixture::new();
        let t = fx.interner.intern("T");
        let sizeof_t = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Sizeof(cinder_ast::SizeofArg::Type(TypeSpec::template_param(t))),
            fx.token,
        ));
        let four = fx.arenas.alloc_expr(Expr::new(
            ExprKind::IntLiteral {
                value: 4,
                ty: ValueType::Int,
            },
            fx.token,
        ));
        let le = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Le,
                lhs: sizeof_t,
                rhs: four,
            },
            fx.token,
        ));
        let concept_name = fx.interner.intern("Small");
        let concept_decl = fx.arenas.alloc_decl(cinder_ast::Decl::new(
            DeclKind::Concept {
                name: concept_name,
                params: vec![TemplateParam {
                    name: t,
                    kind: TemplateParamKind::Type { default: None },
                    is_pack: false,
                }],
                constraint: le,
            },
            fx.token,
        ));
        let application = fx.arenas.alloc_expr(Expr::new(
            ExprKind::ConceptApplication {
                concept_decl,
                args: vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Int))],
            },
            fx.token,
        ));
        let empty = Bindings::default();
        assert!(evaluate_constraint(&mut fx.ctx(), application, &empty));

        let dbl_application = fx.arenas.alloc_expr(Expr::new(
            ExprKind::ConceptApplication {
                concept_decl,
                args: vec![TemplateArg::Type(TypeSpec::builtin(ValueType::Double))],
            },
            fx.token,
        ));
        assert!(!evaluate_constraint(&mut fx.ctx(), dbl_application, &empty));
    }
}
