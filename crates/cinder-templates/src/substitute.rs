//! Substitution: rewriting a template body with concrete bindings.
//!
//! The substituter clones AST subtrees into the arena, replacing template
//! parameter references, expanding packs and fold expressions, and rewriting
//! dependent type specs. Nodes of the pattern are never mutated; an
//! instantiation allocates fresh ids.

use cinder_ast::{
    Arenas, BinaryOp, Expr, ExprId, ExprKind, FoldForm, FunctionDecl, ParamDecl, Requirement,
    RequiresClause, SizeofArg, Stmt, StmtId, StmtKind, TemplateArg, TemplateParam,
    TemplateParamKind, TypeSpec, TypeSpecKind, ValueType, VariableDecl,
};
use cinder_common::{Symbol, SymbolInterner, Token};
use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SubstituteError {
    #[error("unary fold over an empty pack is ill-formed for this operator")]
    EmptyFold { token: Token },
}

/// Concrete bindings for one instantiation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub types: FxHashMap<Symbol, TypeSpec>,
    pub values: FxHashMap<Symbol, (i64, ValueType)>,
    pub packs: FxHashMap<Symbol, Vec<TemplateArg>>,
}

impl Bindings {
    /// Pair formal parameters with an argument list in order.
    pub fn from_args(params: &[TemplateParam], args: &[TemplateArg]) -> Self {
        let mut bindings = Self::default();
        let mut arg_iter = args.iter();
        for param in params {
            if param.is_pack {
                continue;
            }
            match (&param.kind, arg_iter.next()) {
                (TemplateParamKind::Type { .. }, Some(TemplateArg::Type(spec))) => {
                    bindings.types.insert(param.name, spec.clone());
                }
                (TemplateParamKind::NonType { .. }, Some(TemplateArg::Value { value, ty })) => {
                    bindings.values.insert(param.name, (*value, *ty));
                }
                // Mismatched shapes surface later as deduction failures.
                _ => {}
            }
        }
        bindings
    }

    pub fn with_pack(mut self, name: Symbol, elems: Vec<TemplateArg>) -> Self {
        self.packs.insert(name, elems);
        self
    }
}

pub struct Substituter<'a> {
    arenas: &'a mut Arenas,
    interner: &'a mut SymbolInterner,
    bindings: &'a Bindings,
    /// Identifier renames active during pack-element expansion.
    renames: FxHashMap<Symbol, Symbol>,
}

impl<'a> Substituter<'a> {
    pub fn new(
        arenas: &'a mut Arenas,
        interner: &'a mut SymbolInterner,
        bindings: &'a Bindings,
    ) -> Self {
        Self {
            arenas,
            interner,
            bindings,
            renames: FxHashMap::default(),
        }
    }

    /// Rewrite a type spec, merging declarator decoration from the use site
    /// onto the bound argument (reference collapsing included).
    pub fn substitute_spec(&self, spec: &TypeSpec) -> TypeSpec {
        match &spec.kind {
            TypeSpecKind::TemplateParam(name) | TypeSpecKind::Dependent(name) => {
                match self.bindings.types.get(name) {
                    Some(bound) => merge_spec(bound, spec),
                    None => spec.clone(),
                }
            }
            TypeSpecKind::Pack(name) => match self.bindings.packs.get(name) {
                Some(elems) => match elems.first() {
                    Some(TemplateArg::Type(first)) => merge_spec(first, spec),
                    _ => spec.clone(),
                },
                None => spec.clone(),
            },
            TypeSpecKind::TemplateId { template, args } => {
                let mut out = spec.clone();
                out.kind = TypeSpecKind::TemplateId {
                    template: *template,
                    args: args
                        .iter()
                        .map(|a| match a {
                            TemplateArg::Type(s) => TemplateArg::Type(self.substitute_spec(s)),
                            v => v.clone(),
                        })
                        .collect(),
                };
                out
            }
            _ => spec.clone(),
        }
    }

    pub fn substitute_expr(&mut self, id: ExprId) -> Result<ExprId, SubstituteError> {
        let node = self.arenas.expr(id).clone();
        let token = node.token;
        let kind = match node.kind {
            ExprKind::TemplateParameterReference { name, is_pack } => {
                if let Some((value, ty)) = self.bindings.values.get(&name) {
                    ExprKind::IntLiteral {
                        value: *value as u64,
                        ty: *ty,
                    }
                } else if let Some(renamed) = self.renames.get(&name) {
                    ExprKind::Identifier { name: *renamed }
                } else {
                    ExprKind::TemplateParameterReference { name, is_pack }
                }
            }

            ExprKind::Identifier { name } => match self.renames.get(&name) {
                Some(renamed) => ExprKind::Identifier { name: *renamed },
                None => match self.bindings.values.get(&name) {
                    Some((value, ty)) => ExprKind::IntLiteral {
                        value: *value as u64,
                        ty: *ty,
                    },
                    None => ExprKind::Identifier { name },
                },
            },

            ExprKind::Sizeof(SizeofArg::Pack(name)) => {
                match self.bindings.packs.get(&name) {
                    Some(elems) => ExprKind::IntLiteral {
                        value: elems.len() as u64,
                        ty: ValueType::UnsignedLongLong,
                    },
                    None => ExprKind::Sizeof(SizeofArg::Pack(name)),
                }
            }

            ExprKind::Sizeof(SizeofArg::Type(spec)) => {
                ExprKind::Sizeof(SizeofArg::Type(self.substitute_spec(&spec)))
            }

            ExprKind::Sizeof(SizeofArg::Expr(e)) => {
                ExprKind::Sizeof(SizeofArg::Expr(self.substitute_expr(e)?))
            }

            ExprKind::Alignof(spec) => ExprKind::Alignof(self.substitute_spec(&spec)),

            ExprKind::Fold {
                form,
                op,
                pack,
                init,
            } => return self.expand_fold(form, op, pack, init, token),

            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: self.substitute_expr(lhs)?,
                rhs: self.substitute_expr(rhs)?,
            },

            ExprKind::Unary {
                op,
                operand,
                is_builtin_addressof,
            } => ExprKind::Unary {
                op,
                operand: self.substitute_expr(operand)?,
                is_builtin_addressof,
            },

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => ExprKind::Ternary {
                cond: self.substitute_expr(cond)?,
                then_expr: self.substitute_expr(then_expr)?,
                else_expr: self.substitute_expr(else_expr)?,
            },

            ExprKind::FunctionCall {
                callee,
                args,
                template_args,
                mangled_name,
            } => ExprKind::FunctionCall {
                callee,
                args: self.substitute_args(&args)?,
                template_args: template_args.map(|targs| {
                    targs
                        .iter()
                        .map(|a| match a {
                            TemplateArg::Type(s) => TemplateArg::Type(self.substitute_spec(s)),
                            v => v.clone(),
                        })
                        .collect()
                }),
                mangled_name,
            },

            ExprKind::IndirectCall { callee, args } => ExprKind::IndirectCall {
                callee: self.substitute_expr(callee)?,
                args: self.substitute_args(&args)?,
            },

            ExprKind::MemberAccess {
                object,
                member,
                is_arrow,
            } => ExprKind::MemberAccess {
                object: self.substitute_expr(object)?,
                member,
                is_arrow,
            },

            ExprKind::MemberFunctionCall {
                object,
                method,
                args,
                is_arrow,
                mangled_name,
            } => ExprKind::MemberFunctionCall {
                object: self.substitute_expr(object)?,
                method,
                args: self.substitute_args(&args)?,
                is_arrow,
                mangled_name,
            },

            ExprKind::ArraySubscript { array, index } => ExprKind::ArraySubscript {
                array: self.substitute_expr(array)?,
                index: self.substitute_expr(index)?,
            },

            ExprKind::TypeConstruction { ty, args } => ExprKind::TypeConstruction {
                ty: self.substitute_spec(&ty),
                args: self.substitute_args(&args)?,
            },

            ExprKind::Cast {
                kind,
                target,
                operand,
            } => ExprKind::Cast {
                kind,
                target: self.substitute_spec(&target),
                operand: self.substitute_expr(operand)?,
            },

            ExprKind::New {
                ty,
                count,
                args,
                placement,
                is_global,
            } => ExprKind::New {
                ty: self.substitute_spec(&ty),
                count: count.map(|c| self.substitute_expr(c)).transpose()?,
                args: self.substitute_args(&args)?,
                placement: self.substitute_args(&placement)?,
                is_global,
            },

            ExprKind::Delete {
                operand,
                is_array,
                is_global,
            } => ExprKind::Delete {
                operand: self.substitute_expr(operand)?,
                is_array,
                is_global,
            },

            ExprKind::TypeTraitExpr {
                trait_kind,
                type_args,
            } => ExprKind::TypeTraitExpr {
                trait_kind,
                type_args: type_args.iter().map(|s| self.substitute_spec(s)).collect(),
            },

            ExprKind::Noexcept(e) => ExprKind::Noexcept(self.substitute_expr(e)?),

            ExprKind::VaArg { va, ty } => ExprKind::VaArg {
                va: self.substitute_expr(va)?,
                ty: self.substitute_spec(&ty),
            },

            ExprKind::Throw { operand } => ExprKind::Throw {
                operand: operand.map(|e| self.substitute_expr(e)).transpose()?,
            },

            ExprKind::Requires(clause) => {
                let mut requirements = Vec::with_capacity(clause.requirements.len());
                for req in &clause.requirements {
                    requirements.push(match req {
                        Requirement::Expression(e) => {
                            Requirement::Expression(self.substitute_expr(*e)?)
                        }
                        Requirement::Type(spec) => Requirement::Type(self.substitute_spec(spec)),
                        Requirement::Compound { expr, constraint } => Requirement::Compound {
                            expr: self.substitute_expr(*expr)?,
                            constraint: *constraint,
                        },
                    });
                }
                ExprKind::Requires(Box::new(RequiresClause {
                    params: clause
                        .params
                        .iter()
                        .map(|(n, s)| (*n, self.substitute_spec(s)))
                        .collect(),
                    requirements,
                }))
            }

            // Leaves and already-concrete nodes clone through untouched.
            other => other,
        };
        Ok(self.arenas.alloc_expr(Expr::new(kind, token)))
    }

    /// Substitute a call-site argument list, expanding `pattern...` slots
    /// into `pack_size` arguments named `<pack>_0 .. <pack>_{n-1}`.
    pub fn substitute_args(&mut self, args: &[ExprId]) -> Result<Vec<ExprId>, SubstituteError> {
        let mut out = Vec::with_capacity(args.len());
        for &arg in args {
            let node = self.arenas.expr(arg).clone();
            if let ExprKind::PackExpansion { pattern, pack } = node.kind {
                let count = self.bindings.packs.get(&pack).map(|p| p.len()).unwrap_or(0);
                for i in 0..count {
                    let element = self.pack_element_name(pack, i);
                    self.renames.insert(pack, element);
                    out.push(self.substitute_expr(pattern)?);
                }
                self.renames.remove(&pack);
            } else {
                out.push(self.substitute_expr(arg)?);
            }
        }
        Ok(out)
    }

    pub fn substitute_stmt(&mut self, id: StmtId) -> Result<StmtId, SubstituteError> {
        let node = self.arenas.stmt(id).clone();
        let token = node.token;
        let kind = match node.kind {
            StmtKind::Expr(e) => StmtKind::Expr(self.substitute_expr(e)?),
            StmtKind::Return(e) => StmtKind::Return(e.map(|e| self.substitute_expr(e)).transpose()?),
            StmtKind::Block(stmts) => {
                let mut out = Vec::with_capacity(stmts.len());
                for s in stmts {
                    out.push(self.substitute_stmt(s)?);
                }
                StmtKind::Block(out)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => StmtKind::If {
                cond: self.substitute_expr(cond)?,
                then_branch: self.substitute_stmt(then_branch)?,
                else_branch: else_branch.map(|s| self.substitute_stmt(s)).transpose()?,
            },
            StmtKind::While { cond, body } => StmtKind::While {
                cond: self.substitute_expr(cond)?,
                body: self.substitute_stmt(body)?,
            },
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => StmtKind::For {
                init: init.map(|s| self.substitute_stmt(s)).transpose()?,
                cond: cond.map(|e| self.substitute_expr(e)).transpose()?,
                step: step.map(|e| self.substitute_expr(e)).transpose()?,
                body: self.substitute_stmt(body)?,
            },
            StmtKind::VarDecl(decl) => {
                let d = self.arenas.decl(decl).clone();
                let new_kind = match d.kind {
                    cinder_ast::DeclKind::Variable(v) => {
                        cinder_ast::DeclKind::Variable(VariableDecl {
                            ty: self.substitute_spec(&v.ty),
                            init: v.init.map(|e| self.substitute_expr(e)).transpose()?,
                            ..v
                        })
                    }
                    other => other,
                };
                let new_decl = self
                    .arenas
                    .alloc_decl(cinder_ast::Decl::new(new_kind, d.token));
                StmtKind::VarDecl(new_decl)
            }
            other => other,
        };
        Ok(self.arenas.alloc_stmt(Stmt::new(kind, token)))
    }

    /// Instantiate a function pattern: parameters (packs expanded into
    /// indexed parameters), return type, and body.
    pub fn substitute_function(
        &mut self,
        pattern: &FunctionDecl,
    ) -> Result<FunctionDecl, SubstituteError> {
        let mut params = Vec::with_capacity(pattern.params.len());
        for p in &pattern.params {
            if let TypeSpecKind::Pack(pack_name) = &p.ty.kind {
                let elems = self
                    .bindings
                    .packs
                    .get(pack_name)
                    .cloned()
                    .unwrap_or_default();
                for (i, elem) in elems.iter().enumerate() {
                    let name = self.pack_element_name(*pack_name, i);
                    let ty = match elem {
                        TemplateArg::Type(spec) => spec.clone(),
                        TemplateArg::Value { ty, .. } => TypeSpec::builtin(*ty),
                    };
                    params.push(ParamDecl {
                        name,
                        ty,
                        default: None,
                        from_pack: true,
                    });
                }
            } else {
                params.push(ParamDecl {
                    name: p.name,
                    ty: self.substitute_spec(&p.ty),
                    default: p.default.map(|e| self.substitute_expr(e)).transpose()?,
                    from_pack: false,
                });
            }
        }
        let body = pattern
            .body
            .map(|b| self.substitute_stmt(b))
            .transpose()?;
        Ok(FunctionDecl {
            params,
            return_type: self.substitute_spec(&pattern.return_type),
            body,
            ..pattern.clone()
        })
    }

    fn pack_element_name(&mut self, pack: Symbol, index: usize) -> Symbol {
        let base = self.interner.view(pack).to_string();
        self.interner.intern(&format!("{base}_{index}"))
    }

    /// Expand a fold expression against the bound pack.
    fn expand_fold(
        &mut self,
        form: FoldForm,
        op: BinaryOp,
        pack: Symbol,
        init: Option<ExprId>,
        token: Token,
    ) -> Result<ExprId, SubstituteError> {
        let count = self.bindings.packs.get(&pack).map(|p| p.len()).unwrap_or(0);
        let mut elements = Vec::with_capacity(count);
        for i in 0..count {
            let name = self.pack_element_name(pack, i);
            elements.push(
                self.arenas
                    .alloc_expr(Expr::new(ExprKind::Identifier { name }, token)),
            );
        }
        let init = init.map(|e| self.substitute_expr(e)).transpose()?;

        if elements.is_empty() {
            return match (init, op) {
                (Some(init), _) => Ok(init),
                (None, BinaryOp::LogicalAnd) => {
                    Ok(self
                        .arenas
                        .alloc_expr(Expr::new(ExprKind::BoolLiteral(true), token)))
                }
                (None, BinaryOp::LogicalOr) => {
                    Ok(self
                        .arenas
                        .alloc_expr(Expr::new(ExprKind::BoolLiteral(false), token)))
                }
                (None, _) => Err(SubstituteError::EmptyFold { token }),
            };
        }

        let fold_left = |s: &mut Self, seed: ExprId, rest: &[ExprId]| {
            rest.iter().fold(seed, |acc, &e| {
                s.arenas
                    .alloc_expr(Expr::new(ExprKind::Binary { op, lhs: acc, rhs: e }, token))
            })
        };
        let fold_right = |s: &mut Self, seed: ExprId, rest: &[ExprId]| {
            rest.iter().rev().fold(seed, |acc, &e| {
                s.arenas
                    .alloc_expr(Expr::new(ExprKind::Binary { op, lhs: e, rhs: acc }, token))
            })
        };

        Ok(match form {
            // (... op pack) and (init op ... op pack) associate left.
            FoldForm::UnaryLeft => fold_left(self, elements[0], &elements[1..]),
            FoldForm::BinaryLeft => match init {
                Some(init) => fold_left(self, init, &elements),
                None => fold_left(self, elements[0], &elements[1..]),
            },
            // (pack op ...) and (pack op ... op init) associate right.
            FoldForm::UnaryRight => {
                let last = *elements.last().expect("non-empty");
                fold_right(self, last, &elements[..elements.len() - 1])
            }
            FoldForm::BinaryRight => match init {
                Some(init) => fold_right(self, init, &elements),
                None => {
                    let last = *elements.last().expect("non-empty");
                    fold_right(self, last, &elements[..elements.len() - 1])
                }
            },
        })
    }
}

fn merge_spec(bound: &TypeSpec, use_site: &TypeSpec) -> TypeSpec {
    let mut merged = bound.clone();
    merged.pointer_depth += use_site.pointer_depth;
    merged.is_const |= use_site.is_const;
    if use_site.array_size.is_some() {
        merged.array_size = use_site.array_size;
    }
    // Reference collapsing: & wins over &&.
    if use_site.is_reference || bound.is_reference {
        merged.is_reference = true;
        merged.is_rvalue_reference = false;
    } else if use_site.is_rvalue_reference {
        merged.is_rvalue_reference = true;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::{SourceMap, TokenKind};

    struct Fixture {
        arenas: Arenas,
        interner: SymbolInterner,
        token: Token,
    }

    impl Fixture {
        fn new() -> Self {
            let mut interner = SymbolInterner::new();
            let mut sources = SourceMap::new();
            let file = sources.add_file("subst.cpp");
            let token = Token::new(TokenKind::Identifier, interner.intern("x"), file, 1, 1);
            Self {
                arenas: Arenas::new(),
                interner,
                token,
            }
        }
    }

    #[test]
    fn type_param_spec_substitutes_with_decoration() {
        // T* with T = int becomes int*
        let mut fx = Fixture::new();
        let t = fx.interner.intern("T");
        let mut bindings = Bindings::default();
        bindings.types.insert(t, TypeSpec::builtin(ValueType::Int));
        let sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        let spec = TypeSpec::template_param(t).with_pointer(1);
        let result = sub.substitute_spec(&spec);
        assert_eq!(result.kind, TypeSpecKind::Builtin(ValueType::Int));
        assert_eq!(result.pointer_depth, 1);
    }

    #[test]
    fn reference_collapsing_keeps_lvalue() {
        // T&& with T = int& collapses to int&
        let mut fx = Fixture::new();
        let t = fx.interner.intern("T");
        let mut bindings = Bindings::default();
        bindings
            .types
            .insert(t, TypeSpec::builtin(ValueType::Int).with_reference());
        let sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        let mut spec = TypeSpec::template_param(t);
        spec.is_rvalue_reference = true;
        let result = sub.substitute_spec(&spec);
        assert!(result.is_reference);
        assert!(!result.is_rvalue_reference);
    }

    #[test]
    fn nontype_reference_becomes_literal() {
        let mut fx = Fixture::new();
        let n = fx.interner.intern("N");
        let refnode = fx.arenas.alloc_expr(Expr::new(
            ExprKind::TemplateParameterReference {
                name: n,
                is_pack: false,
            },
            fx.token,
        ));
        let mut bindings = Bindings::default();
        bindings.values.insert(n, (7, ValueType::Int));
        let mut sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        let out = sub.substitute_expr(refnode).unwrap();
        assert!(matches!(
            fx.arenas.expr(out).kind,
            ExprKind::IntLiteral { value: 7, .. }
        ));
    }

    #[test]
    fn fold_over_three_elements_associates_left() {
        // (args + ...) with pack size 3 → ((args_0 + args_1) + args_2)
        let mut fx = Fixture::new();
        let pack = fx.interner.intern("args");
        let fold = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Fold {
                form: FoldForm::UnaryLeft,
                op: BinaryOp::Add,
                pack,
                init: None,
            },
            fx.token,
        ));
        let bindings = Bindings::default().with_pack(
            pack,
            vec![
                TemplateArg::Type(TypeSpec::builtin(ValueType::Int)),
                TemplateArg::Type(TypeSpec::builtin(ValueType::Int)),
                TemplateArg::Type(TypeSpec::builtin(ValueType::Int)),
            ],
        );
        let mut sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        let out = sub.substitute_expr(fold).unwrap();

        // Root must be `+` whose lhs is another `+` over args_0/args_1.
        let (lhs, rhs) = match fx.arenas.expr(out).kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } => (lhs, rhs),
            ref other => panic!("expected Add at root, got {other:?}"),
        };
        let args_2 = fx.interner.intern("args_2");
        assert!(matches!(
            fx.arenas.expr(rhs).kind,
            ExprKind::Identifier { name } if name == args_2
        ));
        assert!(matches!(
            fx.arenas.expr(lhs).kind,
            ExprKind::Binary { op: BinaryOp::Add, .. }
        ));
    }

    #[test]
    fn empty_and_fold_is_true_empty_or_fold_is_false() {
        let mut fx = Fixture::new();
        let pack = fx.interner.intern("args");
        let and_fold = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Fold {
                form: FoldForm::UnaryRight,
                op: BinaryOp::LogicalAnd,
                pack,
                init: None,
            },
            fx.token,
        ));
        let or_fold = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Fold {
                form: FoldForm::UnaryRight,
                op: BinaryOp::LogicalOr,
                pack,
                init: None,
            },
            fx.token,
        ));
        let bindings = Bindings::default().with_pack(pack, vec![]);
        let mut sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        let and_out = sub.substitute_expr(and_fold).unwrap();
        let or_out = sub.substitute_expr(or_fold).unwrap();
        assert!(matches!(fx.arenas.expr(and_out).kind, ExprKind::BoolLiteral(true)));
        assert!(matches!(fx.arenas.expr(or_out).kind, ExprKind::BoolLiteral(false)));
    }

    #[test]
    fn empty_plus_fold_is_ill_formed() {
        let mut fx = Fixture::new();
        let pack = fx.interner.intern("args");
        let fold = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Fold {
                form: FoldForm::UnaryLeft,
                op: BinaryOp::Add,
                pack,
                init: None,
            },
            fx.token,
        ));
        let bindings = Bindings::default().with_pack(pack, vec![]);
        let mut sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        assert!(matches!(
            sub.substitute_expr(fold),
            Err(SubstituteError::EmptyFold { .. })
        ));
    }

    #[test]
    fn pack_expansion_in_call_arguments() {
        // f(args...) with pack size 2 → f(args_0, args_1)
        let mut fx = Fixture::new();
        let pack = fx.interner.intern("args");
        let pattern = fx.arenas.alloc_expr(Expr::new(
            ExprKind::TemplateParameterReference {
                name: pack,
                is_pack: true,
            },
            fx.token,
        ));
        let expansion = fx
            .arenas
            .alloc_expr(Expr::new(ExprKind::PackExpansion { pattern, pack }, fx.token));
        let bindings = Bindings::default().with_pack(
            pack,
            vec![
                TemplateArg::Type(TypeSpec::builtin(ValueType::Int)),
                TemplateArg::Type(TypeSpec::builtin(ValueType::Int)),
            ],
        );
        let mut sub = Substituter::new(&mut fx.arenas, &mut fx.interner, &bindings);
        let out = sub.substitute_args(&[expansion]).unwrap();
        assert_eq!(out.len(), 2);
        let args_0 = fx.interner.intern("args_0");
        let args_1 = fx.interner.intern("args_1");
        assert!(matches!(
            fx.arenas.expr(out[0]).kind,
            ExprKind::Identifier { name } if name == args_0
        ));
        assert!(matches!(
            fx.arenas.expr(out[1]).kind,
            ExprKind::Identifier { name } if name == args_1
        ));
    }
}
