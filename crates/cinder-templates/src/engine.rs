//! Lazy template instantiation.
//!
//! Class templates move through three phases on demand: *Declaration*
//! (canonical name registered, layout unknown), *Layout* (members
//! substituted, offsets computed), *Definition* (a member function body
//! substituted). Function and variable templates instantiate in one step.
//! Every entry point is memoized and returns `None` on failure; hard-error
//! policy belongs to the caller.

use crate::concepts::{evaluate_constraint, ConstraintContext};
use crate::deduce::TypeDeducer;
use crate::naming;
use crate::registry::{InstantiationPhase, TemplateRegistry};
use crate::substitute::{Bindings, Substituter};
use cinder_ast::{
    AccessSpecifier, Arenas, Decl, DeclId, DeclKind, MemberFunction, StaticMember, StructMember,
    StructTypeInfo, TemplateArg, TemplateParam, TemplateParamKind, TypeIndex, TypeKind,
    TypeRegistry, TypeSpec, TypeSpecKind, ValueType, VariableDecl,
};
use cinder_common::{Symbol, SymbolInterner};
use cinder_mangle::{
    mangle_function, mangle_variable, FunctionSignature, ManglingStyle, VariableSignature,
};
use cinder_sema::{ConstEvaluator, ConstValue};

pub struct InstantiationEngine<'a> {
    pub arenas: &'a mut Arenas,
    pub types: &'a mut TypeRegistry,
    pub templates: &'a mut TemplateRegistry,
    pub interner: &'a mut SymbolInterner,
    pub style: ManglingStyle,
}

impl<'a> InstantiationEngine<'a> {
    pub fn new(
        arenas: &'a mut Arenas,
        types: &'a mut TypeRegistry,
        templates: &'a mut TemplateRegistry,
        interner: &'a mut SymbolInterner,
        style: ManglingStyle,
    ) -> Self {
        Self {
            arenas,
            types,
            templates,
            interner,
            style,
        }
    }

    /// Canonical instantiation name, interned.
    pub fn get_instantiated_class_name(&mut self, name: Symbol, args: &[TemplateArg]) -> Symbol {
        let base = self.interner.view(name).to_string();
        let rendered = naming::get_instantiated_class_name(&base, args, self.types, self.interner);
        self.interner.intern(&rendered)
    }

    /// Declaration-phase class instantiation: register the canonical name
    /// and an incomplete `StructTypeInfo`; compute nothing else.
    pub fn try_instantiate_class_template(
        &mut self,
        name: Symbol,
        args: &[TemplateArg],
    ) -> Option<TypeIndex> {
        let def = self.templates.definition(name)?;
        let (params, constraint) = match &self.arenas.decl(def).kind {
            DeclKind::TemplateClass {
                params, constraint, ..
            } => (params.clone(), *constraint),
            _ => return None,
        };

        let filled = self.fill_default_args(&params, naming::canonical_args(args))?;
        let canonical = self.get_instantiated_class_name(name, &filled);
        if let Some(idx) = self.templates.class_for_name(canonical) {
            return Some(idx);
        }

        if let Some(c) = constraint {
            let bindings = self.bindings_for(&params, &filled);
            if !self.check_constraint(c, &bindings) {
                return None;
            }
        }

        let idx = self.types.get_or_create(canonical, TypeKind::Struct);
        self.types.get_mut(idx).struct_info = Some(StructTypeInfo {
            is_template_instantiation: true,
            base_template_name: Some(name),
            is_incomplete_instantiation: true,
            ..Default::default()
        });
        self.templates.record_class(canonical, idx, name, filled);
        Some(idx)
    }

    /// Layout-phase transition: substitute members, compute offsets.
    /// Triggered by `sizeof`, member access, or use as a member type.
    pub fn ensure_layout(&mut self, idx: TypeIndex) -> Option<()> {
        match self.templates.phase(idx) {
            // Not a template instantiation; layout came from the parser.
            None => return Some(()),
            Some(p) if p >= InstantiationPhase::Layout => return Some(()),
            Some(_) => {}
        }
        let (name, args) = self.templates.provenance(idx)?.clone();
        let def = self.templates.definition(name)?;
        let (params, body) = match &self.arenas.decl(def).kind {
            DeclKind::TemplateClass { params, body, .. } => (params.clone(), body.clone()),
            _ => return None,
        };
        let bindings = self.bindings_for(&params, &args);

        let mut members = Vec::with_capacity(body.members.len());
        for pm in &body.members {
            let spec = {
                let sub = Substituter::new(self.arenas, self.interner, &bindings);
                sub.substitute_spec(&pm.ty)
            };
            let spec = self.resolve_spec(spec)?;
            members.push(self.member_from_spec(pm.name, &spec, pm.access)?);
        }

        let class_name = self.interner.view(self.types.get(idx).name).to_string();
        let mut statics = Vec::with_capacity(body.static_members.len());
        for (sname, sspec, init) in &body.static_members {
            let spec = {
                let sub = Substituter::new(self.arenas, self.interner, &bindings);
                sub.substitute_spec(sspec)
            };
            let spec = self.resolve_spec(spec)?;
            let (vt, tidx) = self.spec_category(&spec);
            let var_name = self.interner.view(*sname).to_string();
            let mangled = mangle_variable(
                self.style,
                &VariableSignature {
                    name: &var_name,
                    namespace: &[],
                    class_name: Some(&class_name),
                    enclosing_function: None,
                    ty: &spec,
                },
                self.types,
                self.interner,
            );
            statics.push(StaticMember {
                name: *sname,
                ty: vt,
                type_index: tidx,
                pointer_depth: spec.pointer_depth,
                mangled_name: self.interner.intern(&mangled),
                initializer: *init,
            });
        }

        let info = self.types.get_mut(idx).struct_info.as_mut()?;
        info.members = members;
        info.static_members = statics;
        self.types.finish_layout(idx).ok()?;
        self.templates.advance_phase(idx, InstantiationPhase::Layout);
        Some(())
    }

    /// Definition-phase transition for one member function. Returns the
    /// instantiated declaration; idempotent per `(class, member)`.
    pub fn ensure_member_defined(&mut self, idx: TypeIndex, member: Symbol) -> Option<DeclId> {
        self.ensure_layout(idx)?;
        if self.templates.member_defined(idx, member) {
            return self
                .types
                .struct_info(idx)?
                .member_function(member)
                .map(|f| f.decl);
        }
        let (name, args) = self.templates.provenance(idx)?.clone();
        let def = self.templates.definition(name)?;
        let (params, body) = match &self.arenas.decl(def).kind {
            DeclKind::TemplateClass { params, body, .. } => (params.clone(), body.clone()),
            _ => return None,
        };
        let pattern_decl = body.methods.iter().copied().find(|&m| {
            matches!(&self.arenas.decl(m).kind, DeclKind::Function(f) if f.name == member)
        })?;
        let (pattern_fn, pattern_token) = match &self.arenas.decl(pattern_decl).kind {
            DeclKind::Function(f) => (f.clone(), self.arenas.decl(pattern_decl).token),
            _ => return None,
        };

        let bindings = self.bindings_for(&params, &args);
        let mut instantiated = {
            let mut sub = Substituter::new(self.arenas, self.interner, &bindings);
            sub.substitute_function(&pattern_fn).ok()?
        };
        instantiated.member_of = Some(idx);

        let class_name = self.interner.view(self.types.get(idx).name).to_string();
        let fn_name = self.interner.view(instantiated.name).to_string();
        let op_symbol = instantiated
            .operator_symbol
            .map(|s| self.interner.view(s).to_string());
        let param_specs: Vec<TypeSpec> =
            instantiated.params.iter().map(|p| p.ty.clone()).collect();
        let mangled = mangle_function(
            self.style,
            &FunctionSignature {
                name: &fn_name,
                namespace: &[],
                class_name: Some(&class_name),
                is_const_member: instantiated.is_const,
                is_static_member: instantiated.is_static,
                params: &param_specs,
                return_type: &instantiated.return_type,
                template_params: &[],
                template_args: None,
                linkage: instantiated.linkage,
                is_variadic: instantiated.is_variadic,
                operator_symbol: op_symbol.as_deref(),
            },
            self.types,
            self.interner,
        );
        let mangled_sym = self.interner.intern(&mangled);
        instantiated.mangled_name = Some(mangled_sym);

        let is_operator = instantiated.operator_symbol.is_some();
        let operator_symbol = instantiated.operator_symbol;
        let is_static = instantiated.is_static;
        let is_const = instantiated.is_const;
        let decl = self
            .arenas
            .alloc_decl(Decl::new(DeclKind::Function(instantiated), pattern_token));

        let info = self.types.get_mut(idx).struct_info.as_mut()?;
        info.member_functions.push(MemberFunction {
            name: member,
            decl,
            is_static,
            is_virtual: false,
            is_const,
            is_operator_overload: is_operator,
            operator_symbol,
            mangled_name: Some(mangled_sym),
        });
        self.templates.mark_member_defined(idx, member);
        self.templates
            .advance_phase(idx, InstantiationPhase::Definition);
        Some(decl)
    }

    /// Function-template instantiation with argument deduction.
    pub fn try_instantiate_template(
        &mut self,
        name: Symbol,
        deduced_arg_types: &[TypeSpec],
    ) -> Option<DeclId> {
        self.instantiate_function(name, &[], deduced_arg_types)
    }

    /// Function-template instantiation from explicit arguments only.
    pub fn try_instantiate_template_explicit(
        &mut self,
        name: Symbol,
        explicit_args: &[TemplateArg],
    ) -> Option<DeclId> {
        self.instantiate_function(name, explicit_args, &[])
    }

    /// Function-template instantiation with both explicit arguments and
    /// call-site argument types.
    pub fn instantiate_function(
        &mut self,
        name: Symbol,
        explicit_args: &[TemplateArg],
        arg_types: &[TypeSpec],
    ) -> Option<DeclId> {
        let def = self.templates.definition(name)?;
        let (params, pattern, constraint) = match &self.arenas.decl(def).kind {
            DeclKind::TemplateFunction {
                params,
                pattern,
                constraint,
                ..
            } => (params.clone(), *pattern, *constraint),
            _ => return None,
        };
        let (pattern_fn, pattern_token) = match &self.arenas.decl(pattern).kind {
            DeclKind::Function(f) => (f.clone(), self.arenas.decl(pattern).token),
            _ => return None,
        };

        let fn_param_specs: Vec<TypeSpec> = pattern_fn.params.iter().map(|p| p.ty.clone()).collect();
        let explicit = naming::canonical_args(explicit_args);
        let result = TypeDeducer::deduce_with_explicit(
            &params,
            &explicit,
            &fn_param_specs,
            arg_types,
            self.interner,
            Some(&*self.templates),
        )
        .ok()?;

        // Cache key covers the pack elements too: count<int> and
        // count<int,int> are distinct instantiations of the same pattern.
        let mut key_args = naming::canonical_args(&result.args);
        for spec in &fn_param_specs {
            if let TypeSpecKind::Pack(pack_name) = &spec.kind {
                if let Some(elems) = result.packs.get(pack_name) {
                    key_args.extend(naming::canonical_args(elems));
                }
            }
        }
        if let Some(cached) = self.templates.cached(name, &key_args) {
            return Some(cached);
        }

        let mut bindings = self.bindings_for(&params, &result.args);
        for (pack, elems) in &result.packs {
            bindings.packs.insert(*pack, elems.clone());
        }

        if let Some(c) = constraint {
            if !self.check_constraint(c, &bindings) {
                return None;
            }
        }

        let mut instantiated = {
            let mut sub = Substituter::new(self.arenas, self.interner, &bindings);
            sub.substitute_function(&pattern_fn).ok()?
        };

        // Mangle against the pattern so parameter references compress the
        // way a host toolchain would.
        let fn_name = self.interner.view(name).to_string();
        let tparam_names: Vec<String> = params
            .iter()
            .map(|p| self.interner.view(p.name).to_string())
            .collect();
        let tparam_refs: Vec<&str> = tparam_names.iter().map(String::as_str).collect();
        let mangled = mangle_function(
            self.style,
            &FunctionSignature {
                name: &fn_name,
                namespace: &[],
                class_name: None,
                is_const_member: false,
                is_static_member: false,
                params: &fn_param_specs,
                return_type: &pattern_fn.return_type,
                template_params: &tparam_refs,
                template_args: Some(&key_args),
                linkage: instantiated.linkage,
                is_variadic: instantiated.is_variadic,
                operator_symbol: None,
            },
            self.types,
            self.interner,
        );
        instantiated.mangled_name = Some(self.interner.intern(&mangled));

        let decl = self
            .arenas
            .alloc_decl(Decl::new(DeclKind::Function(instantiated), pattern_token));
        self.templates.insert_cached(name, key_args, decl);
        Some(decl)
    }

    /// Variable-template instantiation: `zero<int>`.
    pub fn try_instantiate_variable_template(
        &mut self,
        name: Symbol,
        args: &[TemplateArg],
    ) -> Option<DeclId> {
        let def = self.templates.definition(name)?;
        let (params, pattern) = match &self.arenas.decl(def).kind {
            DeclKind::TemplateVariable {
                params, pattern, ..
            } => (params.clone(), *pattern),
            _ => return None,
        };
        let (pattern_var, pattern_token) = match &self.arenas.decl(pattern).kind {
            DeclKind::Variable(v) => (v.clone(), self.arenas.decl(pattern).token),
            _ => return None,
        };

        let filled = self.fill_default_args(&params, naming::canonical_args(args))?;
        if let Some(cached) = self.templates.cached(name, &filled) {
            return Some(cached);
        }
        let bindings = self.bindings_for(&params, &filled);

        let canonical = self.get_instantiated_class_name(name, &filled);
        let (ty, init) = {
            let mut sub = Substituter::new(self.arenas, self.interner, &bindings);
            let ty = sub.substitute_spec(&pattern_var.ty);
            let init = pattern_var.init.map(|e| sub.substitute_expr(e)).transpose().ok()?;
            (ty, init)
        };
        let ty = self.resolve_spec(ty)?;

        let var_name = self.interner.view(canonical).to_string();
        let mangled = mangle_variable(
            self.style,
            &VariableSignature {
                name: &var_name,
                namespace: &[],
                class_name: None,
                enclosing_function: None,
                ty: &ty,
            },
            self.types,
            self.interner,
        );
        let mangled_sym = self.interner.intern(&mangled);

        let decl = self.arenas.alloc_decl(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: canonical,
                ty,
                init,
                mangled_name: Some(mangled_sym),
                ..pattern_var
            }),
            pattern_token,
        ));
        self.templates.insert_cached(name, filled, decl);
        Some(decl)
    }

    /// Alias-template resolution: `Ref<int>` → `int&`. Cheap, not cached.
    pub fn resolve_alias_template(
        &mut self,
        name: Symbol,
        args: &[TemplateArg],
    ) -> Option<TypeSpec> {
        let def = self.templates.definition(name)?;
        let (params, target) = match &self.arenas.decl(def).kind {
            DeclKind::TemplateAlias { params, target, .. } => (params.clone(), target.clone()),
            _ => return None,
        };
        let filled = self.fill_default_args(&params, naming::canonical_args(args))?;
        let bindings = self.bindings_for(&params, &filled);
        let sub = Substituter::new(self.arenas, self.interner, &bindings);
        let spec = sub.substitute_spec(&target);
        self.resolve_spec(spec)
    }

    /// Resolve any nested template-ids left in a substituted spec by
    /// instantiating them (through Layout, so sizes are known).
    pub fn resolve_spec(&mut self, spec: TypeSpec) -> Option<TypeSpec> {
        match &spec.kind {
            TypeSpecKind::TemplateId { template, args } => {
                let (template, args) = (*template, args.clone());
                let idx = self.try_instantiate_class_template(template, &args)?;
                self.ensure_layout(idx)?;
                let mut out = spec;
                out.kind = TypeSpecKind::Indexed(idx);
                Some(out)
            }
            _ if spec.is_dependent() => None,
            _ => Some(spec),
        }
    }

    fn bindings_for(&self, params: &[TemplateParam], args: &[TemplateArg]) -> Bindings {
        Bindings::from_args(params, args)
    }

    fn check_constraint(&mut self, constraint: cinder_ast::ExprId, bindings: &Bindings) -> bool {
        let mut ctx = ConstraintContext {
            arenas: &mut *self.arenas,
            types: &*self.types,
            interner: &mut *self.interner,
        };
        evaluate_constraint(&mut ctx, constraint, bindings)
    }

    /// Fill missing trailing arguments from parameter defaults.
    fn fill_default_args(
        &mut self,
        params: &[TemplateParam],
        mut args: Vec<TemplateArg>,
    ) -> Option<Vec<TemplateArg>> {
        let positional: Vec<&TemplateParam> = params.iter().filter(|p| !p.is_pack).collect();
        while args.len() < positional.len() {
            let param = positional[args.len()];
            let partial = Bindings::from_args(params, &args);
            match &param.kind {
                TemplateParamKind::Type {
                    default: Some(spec),
                } => {
                    let resolved = {
                        let sub = Substituter::new(self.arenas, self.interner, &partial);
                        sub.substitute_spec(spec)
                    };
                    let resolved = self.resolve_spec(resolved)?;
                    args.push(TemplateArg::Type(resolved));
                }
                TemplateParamKind::NonType {
                    ty,
                    default: Some(expr),
                } => {
                    let substituted = {
                        let mut sub = Substituter::new(self.arenas, self.interner, &partial);
                        sub.substitute_expr(*expr).ok()?
                    };
                    let mut evaluator = ConstEvaluator::new(self.arenas, self.types);
                    for (n, (v, _)) in &partial.values {
                        evaluator.bind(*n, ConstValue::Int(*v));
                    }
                    let value = evaluator.evaluate(substituted).ok()?;
                    args.push(TemplateArg::Value {
                        value: value.as_i64(),
                        ty: ty.value_type(),
                    });
                }
                _ => return None,
            }
        }
        Some(args)
    }

    // Base category of a spec; pointer depth is carried separately.
    fn spec_category(&self, spec: &TypeSpec) -> (ValueType, TypeIndex) {
        match spec.kind {
            TypeSpecKind::Builtin(vt) => (vt, TypeIndex::VOID),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.types.resolve_alias(idx);
                match self.types.get(idx).kind {
                    TypeKind::Builtin(vt) => (vt, idx),
                    TypeKind::Enum => (ValueType::Enum, idx),
                    _ => (ValueType::Struct, idx),
                }
            }
            _ => (ValueType::Void, TypeIndex::VOID),
        }
    }

    fn member_from_spec(
        &mut self,
        name: Symbol,
        spec: &TypeSpec,
        access: AccessSpecifier,
    ) -> Option<StructMember> {
        let (vt, tidx) = self.spec_category(spec);
        if vt == ValueType::Struct && spec.pointer_depth == 0 {
            // Nested struct members need their own layout first.
            self.ensure_layout(tidx)?;
            if self.types.struct_info(tidx)?.is_incomplete_instantiation {
                return None;
            }
        }
        let size_bits = if spec.pointer_depth > 0 || spec.is_reference || spec.is_rvalue_reference
        {
            64
        } else {
            self.types.size_bits(vt, tidx)
        };
        Some(StructMember {
            name,
            ty: vt,
            type_index: tidx,
            offset: 0,
            size_bits,
            pointer_depth: spec.pointer_depth,
            is_reference: spec.is_reference || spec.is_rvalue_reference,
            access,
            array_count: spec.array_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{
        ClassPattern, DataModel, Expr, ExprKind, FunctionDecl, Linkage, NamespaceHandle, ParamDecl,
        StmtKind,
    };
    use cinder_common::{SourceMap, Token, TokenKind};

    struct Fixture {
        arenas: Arenas,
        types: TypeRegistry,
        templates: TemplateRegistry,
        interner: SymbolInterner,
        token: Token,
    }

    impl Fixture {
        fn new() -> Self {
            let mut interner = SymbolInterner::new();
            let mut sources = SourceMap::new();
            let file = sources.add_file("tmpl.cpp");
            let token = Token::new(TokenKind::Identifier, interner.intern("T"), file, 1, 1);
            let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
            Self {
                arenas: Arenas::new(),
                types,
                templates: TemplateRegistry::new(),
                interner,
                token,
            }
        }

        fn engine(&mut self) -> InstantiationEngine<'_> {
            InstantiationEngine::new(
                &mut self.arenas,
                &mut self.types,
                &mut self.templates,
                &mut self.interner,
                ManglingStyle::Itanium,
            )
        }

        /// template<typename T> struct Box { T value; int tag; };
        fn define_box_template(&mut self) -> Symbol {
            let t = self.interner.intern("T");
            let name = self.interner.intern("Box");
            let body = ClassPattern {
                members: vec![
                    cinder_ast::PatternMember {
                        name: self.interner.intern("value"),
                        ty: TypeSpec::template_param(t),
                        access: AccessSpecifier::Public,
                    },
                    cinder_ast::PatternMember {
                        name: self.interner.intern("tag"),
                        ty: TypeSpec::builtin(ValueType::Int),
                        access: AccessSpecifier::Public,
                    },
                ],
                methods: vec![],
                static_members: vec![],
            };
            let decl = self.arenas.alloc_decl(Decl::new(
                DeclKind::TemplateClass {
                    name,
                    params: vec![TemplateParam {
                        name: t,
                        kind: TemplateParamKind::Type { default: None },
                        is_pack: false,
                    }],
                    body,
                    constraint: None,
                },
                self.token,
            ));
            self.templates.define(name, decl);
            name
        }

        /// template<typename T> T identity(T x) { return x; }
        fn define_identity_template(&mut self) -> Symbol {
            let t = self.interner.intern("T");
            let name = self.interner.intern("identity");
            let x = self.interner.intern("x");
            let x_ref = self
                .arenas
                .alloc_expr(Expr::new(ExprKind::Identifier { name: x }, self.token));
            let ret = self
                .arenas
                .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Return(Some(x_ref)), self.token));
            let body = self
                .arenas
                .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Block(vec![ret]), self.token));
            let pattern = self.arenas.alloc_decl(Decl::new(
                DeclKind::Function(FunctionDecl {
                    name,
                    params: vec![ParamDecl {
                        name: x,
                        ty: TypeSpec::template_param(t),
                        default: None,
                        from_pack: false,
                    }],
                    return_type: TypeSpec::template_param(t),
                    body: Some(body),
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
            ));
            let decl = self.arenas.alloc_decl(Decl::new(
                DeclKind::TemplateFunction {
                    name,
                    params: vec![TemplateParam {
                        name: t,
                        kind: TemplateParamKind::Type { default: None },
                        is_pack: false,
                    }],
                    pattern,
                    constraint: None,
                },
                self.token,
            ));
            self.templates.define(name, decl);
            name
        }
    }

    #[test]
    fn class_instantiation_is_lazy_then_laid_out() {
        let mut fx = Fixture::new();
        let name = fx.define_box_template();
        let int_arg = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];

        let idx = fx.engine().try_instantiate_class_template(name, &int_arg).unwrap();
        // Declaration phase: registered but incomplete.
        assert!(fx.types.struct_info(idx).unwrap().is_incomplete_instantiation);

        fx.engine().ensure_layout(idx).unwrap();
        let info = fx.types.struct_info(idx).unwrap();
        assert!(!info.is_incomplete_instantiation);
        assert_eq!(info.members.len(), 2);
        assert_eq!(info.total_size, 8);
        assert_eq!(info.members[1].offset, 4);
    }

    #[test]
    fn class_instantiation_is_idempotent() {
        let mut fx = Fixture::new();
        let name = fx.define_box_template();
        let int_arg = [TemplateArg::Type(TypeSpec::builtin(ValueType::Int))];
        let a = fx.engine().try_instantiate_class_template(name, &int_arg).unwrap();
        let b = fx.engine().try_instantiate_class_template(name, &int_arg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signed_int_and_int_share_an_instantiation() {
        // Box<int> and Box<signed int>: the parser folds both spellings to
        // ValueType::Int, so the canonical names collide by construction.
        let mut fx = Fixture::new();
        let name = fx.define_box_template();
        let a = fx
            .engine()
            .try_instantiate_class_template(
                name,
                &[TemplateArg::Type(TypeSpec::builtin(ValueType::Int))],
            )
            .unwrap();
        let b = fx
            .engine()
            .try_instantiate_class_template(
                name,
                &[TemplateArg::Type(TypeSpec::builtin(ValueType::Int).with_const())],
            )
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn function_instantiation_deduces_and_mangles() {
        let mut fx = Fixture::new();
        let name = fx.define_identity_template();
        let decl = fx
            .engine()
            .try_instantiate_template(name, &[TypeSpec::builtin(ValueType::Int)])
            .unwrap();
        match &fx.arenas.decl(decl).kind {
            DeclKind::Function(f) => {
                assert_eq!(f.params.len(), 1);
                assert_eq!(f.params[0].ty, TypeSpec::builtin(ValueType::Int));
                assert_eq!(f.return_type, TypeSpec::builtin(ValueType::Int));
                let mangled = fx.interner.view(f.mangled_name.unwrap());
                assert_eq!(mangled, "_Z8identityIiET_S0_");
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn function_instantiation_is_cached() {
        let mut fx = Fixture::new();
        let name = fx.define_identity_template();
        let int_spec = [TypeSpec::builtin(ValueType::Int)];
        let a = fx.engine().try_instantiate_template(name, &int_spec).unwrap();
        let b = fx.engine().try_instantiate_template(name, &int_spec).unwrap();
        assert_eq!(a, b);
        let c = fx
            .engine()
            .try_instantiate_template(name, &[TypeSpec::builtin(ValueType::Double)])
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn unknown_template_is_none_not_error() {
        let mut fx = Fixture::new();
        let missing = fx.interner.intern("phantom");
        assert!(fx
            .engine()
            .try_instantiate_template(missing, &[TypeSpec::builtin(ValueType::Int)])
            .is_none());
    }
}
