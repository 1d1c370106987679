use crate::session::Session;
use cinder_ast::{
    AccessSpecifier, Arenas, ClassPattern, Decl, DeclId, DeclKind, EnumTypeInfo, Enumerator, Expr,
    ExprId, ExprKind, FunctionDecl, LambdaCapture, Linkage, NamespaceHandle, ParamDecl,
    PatternMember, StmtId, StmtKind, StorageClass, StructMember, StructTypeInfo, TemplateParam,
    TemplateParamKind, TypeIndex, TypeKind, TypeSpec, TypeSpecKind, ValueType, VariableDecl,
};
use cinder_common::{
    CompileError, ErrorKind, Symbol, Token, TokenKind, TokenStream,
};
use cinder_mangle::{mangle_function, mangle_variable, FunctionSignature, VariableSignature};
use cinder_sema::{ConstEvaluator, ScopeStack, UsingDeclaration, UsingDirective};
use rustc_hash::FxHashMap;

pub type ParseResult<T> = Result<T, CompileError>;

/// What `<` means right now; see the disambiguation rules in `primary.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExprContext {
    Normal,
    TemplateArgument,
    Decltype,
}

/// Everything the parser produced for one translation unit.
#[derive(Debug, Default)]
pub struct ParsedUnit {
    /// Top-level declarations in source order.
    pub decls: Vec<DeclId>,
    /// Global name bindings (functions, globals) for the lowering pass.
    pub globals: FxHashMap<Symbol, DeclId>,
    /// Overload sets for free functions.
    pub functions: FxHashMap<Symbol, Vec<DeclId>>,
}

/// One active lambda body being parsed.
pub(crate) struct LambdaScope {
    pub captures: Vec<LambdaCapture>,
    pub default_by_value: bool,
    pub default_by_reference: bool,
    pub is_mutable: bool,
    /// Scope depth when the lambda opened; shallower bindings are captures.
    pub depth_at_entry: usize,
}

pub struct Parser<'s> {
    pub sess: &'s mut Session,
    pub tokens: TokenStream,
    pub scopes: ScopeStack,
    pub errors: Vec<CompileError>,
    pub(crate) functions: FxHashMap<Symbol, Vec<DeclId>>,
    pub(crate) current_namespace: NamespaceHandle,
    pub(crate) current_struct: Option<TypeIndex>,
    pub(crate) current_function: Option<Symbol>,
    /// SFINAE mode: resolution failures demote to soft constraint errors.
    pub(crate) sfinae_mode: bool,
    pub(crate) parsing_template_body: bool,
    /// Names of the template parameters currently in scope (name → is_pack).
    pub(crate) template_param_names: FxHashMap<Symbol, bool>,
    pub(crate) lambda_stack: Vec<LambdaScope>,
    pub(crate) lambda_counter: u32,
}

impl<'s> Parser<'s> {
    pub fn new(sess: &'s mut Session, tokens: TokenStream) -> Self {
        Self {
            sess,
            tokens,
            scopes: ScopeStack::new(),
            errors: Vec::new(),
            functions: FxHashMap::default(),
            current_namespace: NamespaceHandle::GLOBAL,
            current_struct: None,
            current_function: None,
            sfinae_mode: false,
            parsing_template_body: false,
            template_param_names: FxHashMap::default(),
            lambda_stack: Vec::new(),
            lambda_counter: 0,
        }
    }

    // ---- token helpers -------------------------------------------------

    pub(crate) fn peek(&self) -> Token {
        self.tokens.peek()
    }

    pub(crate) fn view(&self, tok: Token) -> &str {
        self.sess.interner.view(tok.value)
    }

    pub(crate) fn at(&self, lexeme: &str) -> bool {
        self.view(self.peek()) == lexeme && !self.peek().is_eof()
    }

    pub(crate) fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn nth_is(&self, n: usize, lexeme: &str) -> bool {
        let t = self.tokens.nth(n);
        !t.is_eof() && self.sess.interner.view(t.value) == lexeme
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.tokens.advance()
    }

    pub(crate) fn eat(&mut self, lexeme: &str) -> bool {
        if self.at(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, lexeme: &str) -> ParseResult<Token> {
        if self.at(lexeme) {
            Ok(self.advance())
        } else {
            Err(self.error_here(ErrorKind::Syntax, format!("expected `{lexeme}`")))
        }
    }

    pub(crate) fn error_here(&self, kind: ErrorKind, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, message, self.peek())
    }

    pub(crate) fn error_at(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        token: Token,
    ) -> CompileError {
        CompileError::new(kind, message, token)
    }

    /// Resolution failure, demoted to a soft constraint error in SFINAE
    /// mode so the enclosing `requires` reads it as "not satisfied".
    pub(crate) fn resolution_error(
        &self,
        message: impl Into<String>,
        token: Token,
    ) -> CompileError {
        if self.sfinae_mode {
            CompileError::new(ErrorKind::Template, "constraint not satisfied", token)
        } else {
            CompileError::new(ErrorKind::Resolution, message, token)
        }
    }

    pub(crate) fn alloc_expr(&mut self, kind: ExprKind, token: Token) -> ExprId {
        self.sess.arenas.alloc_expr(Expr::new(kind, token))
    }

    pub(crate) fn arenas(&self) -> &Arenas {
        &self.sess.arenas
    }

    // ---- translation unit ----------------------------------------------

    pub fn parse_translation_unit(&mut self) -> ParsedUnit {
        let mut decls = Vec::new();
        while !self.tokens.at_eof() {
            let before = self.tokens.position();
            match self.parse_top_level() {
                Ok(mut parsed) => decls.append(&mut parsed),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_boundary();
                }
            }
            if self.tokens.position() == before && !self.tokens.at_eof() {
                // Make forward progress no matter what.
                self.advance();
            }
        }
        let mut globals = FxHashMap::default();
        for &d in &decls {
            globals.insert(self.sess.arenas.decl(d).name(), d);
        }
        ParsedUnit {
            decls,
            globals,
            functions: self.functions.clone(),
        }
    }

    /// Skip to the next statement/declaration boundary after an error.
    pub(crate) fn recover_to_boundary(&mut self) {
        let mut depth = 0i32;
        while !self.tokens.at_eof() {
            let text = self.view(self.peek()).to_string();
            match text.as_str() {
                ";" if depth == 0 => {
                    self.advance();
                    return;
                }
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth <= 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_top_level(&mut self) -> ParseResult<Vec<DeclId>> {
        if self.at(";") {
            self.advance();
            return Ok(vec![]);
        }
        if self.at("namespace") {
            return self.parse_namespace();
        }
        if self.at("using") {
            self.parse_using()?;
            return Ok(vec![]);
        }
        if self.at("template") {
            return Ok(vec![self.parse_template_declaration()?]);
        }
        if self.at("struct") || self.at("class") {
            return Ok(vec![self.parse_struct_definition()?]);
        }
        if self.at("enum") {
            return Ok(vec![self.parse_enum_definition()?]);
        }
        if self.at("static_assert") {
            self.parse_static_assert()?;
            return Ok(vec![]);
        }
        if self.at("extern") && self.nth_is(1, "\"C\"") {
            self.advance();
            self.advance();
            if self.eat("{") {
                let mut out = Vec::new();
                while !self.at("}") && !self.tokens.at_eof() {
                    out.extend(self.parse_function_or_variable(Linkage::C)?);
                }
                self.expect("}")?;
                return Ok(out);
            }
            return self.parse_function_or_variable(Linkage::C);
        }
        self.parse_function_or_variable(Linkage::CPlusPlus)
    }

    fn parse_namespace(&mut self) -> ParseResult<Vec<DeclId>> {
        self.expect("namespace")?;
        let name_tok = self.advance();
        let mut ns = self
            .sess
            .namespaces
            .get_or_create(self.current_namespace, name_tok.value);
        // namespace a::b { ... }
        while self.eat("::") {
            let seg = self.advance();
            ns = self.sess.namespaces.get_or_create(ns, seg.value);
        }
        self.expect("{")?;
        let saved = self.current_namespace;
        self.current_namespace = ns;
        let mut out = Vec::new();
        while !self.at("}") && !self.tokens.at_eof() {
            match self.parse_top_level() {
                Ok(mut d) => out.append(&mut d),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_boundary();
                }
            }
        }
        self.expect("}")?;
        self.current_namespace = saved;
        Ok(out)
    }

    fn parse_using(&mut self) -> ParseResult<()> {
        self.expect("using")?;
        if self.eat("namespace") {
            // using namespace a::b;
            let mut segments = vec![self.advance().value];
            while self.eat("::") {
                segments.push(self.advance().value);
            }
            let target = self
                .sess
                .namespaces
                .resolve_path(self.current_namespace, false, &segments)
                .ok_or_else(|| self.error_here(ErrorKind::Resolution, "undefined namespace"))?;
            self.sess.namespaces.add_directive(UsingDirective {
                target,
                scope: self.current_namespace,
            });
            self.scopes.add_using_directive(target);
            self.expect(";")?;
            return Ok(());
        }

        let first = self.advance();
        if self.eat("=") {
            // using Alias = type;
            let target = self.parse_type_specifier()?;
            let idx = self
                .sess
                .types
                .get_or_create(first.value, TypeKind::Alias { target });
            let _ = idx;
            self.expect(";")?;
            return Ok(());
        }

        // using ns::name;
        let mut segments = vec![first.value];
        while self.eat("::") {
            segments.push(self.advance().value);
        }
        let name = *segments.last().expect("nonempty path");
        let path = &segments[..segments.len() - 1];
        let source = self
            .sess
            .namespaces
            .resolve_path(self.current_namespace, false, path)
            .ok_or_else(|| self.error_here(ErrorKind::Resolution, "undefined namespace"))?;
        self.sess.namespaces.add_declaration(UsingDeclaration {
            source,
            name,
            scope: self.current_namespace,
        });
        if let Some(decl) = self.sess.namespaces.lookup_in(source, name) {
            self.scopes.add_using_declaration(name, decl);
        }
        self.expect(";")?;
        Ok(())
    }

    fn parse_static_assert(&mut self) -> ParseResult<()> {
        let tok = self.expect("static_assert")?;
        self.expect("(")?;
        let cond = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
        if self.eat(",") {
            // Message string; kept for diagnostics only.
            self.advance();
        }
        self.expect(")")?;
        self.expect(";")?;
        let mut evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
        self.bind_constants(&mut evaluator);
        match evaluator.evaluate(cond) {
            Ok(v) if v.as_bool() => Ok(()),
            Ok(_) => Err(self.error_at(ErrorKind::Type, "static assertion failed", tok)),
            Err(_) if self.parsing_template_body => Ok(()),
            Err(_) => Err(self.error_at(
                ErrorKind::Type,
                "static assertion condition is not constant",
                tok,
            )),
        }
    }

    /// Enumerators and other compile-time names visible for evaluation.
    pub(crate) fn bind_constants(&self, evaluator: &mut ConstEvaluator<'_>) {
        for i in 0..self.sess.types.len() {
            if let Some(info) = self.sess.types.enum_info(TypeIndex(i as u32)) {
                if !info.is_scoped {
                    for e in &info.enumerators {
                        evaluator.bind(e.name, cinder_sema::ConstValue::Int(e.value));
                    }
                }
            }
        }
    }

    // ---- enums ---------------------------------------------------------

    fn parse_enum_definition(&mut self) -> ParseResult<DeclId> {
        let kw = self.expect("enum")?;
        let is_scoped = self.eat("class") || self.eat("struct");
        let name_tok = self.advance();
        let underlying = if self.eat(":") {
            self.parse_type_specifier()?.value_type()
        } else {
            ValueType::Int
        };
        self.expect("{")?;
        let mut enumerators: Vec<Enumerator> = Vec::new();
        let mut next_value = 0i64;
        while !self.at("}") && !self.tokens.at_eof() {
            let e_name = self.advance();
            if self.eat("=") {
                let expr = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
                let mut evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
                for e in enumerators.iter() {
                    evaluator.bind(e.name, cinder_sema::ConstValue::Int(e.value));
                }
                next_value = evaluator
                    .evaluate(expr)
                    .map_err(|_| {
                        self.error_at(ErrorKind::Type, "enumerator value is not constant", e_name)
                    })?
                    .as_i64();
            }
            enumerators.push(Enumerator {
                name: e_name.value,
                value: next_value,
            });
            next_value += 1;
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        self.expect(";")?;

        let idx = self.sess.types.get_or_create(name_tok.value, TypeKind::Enum);
        self.sess.types.get_mut(idx).enum_info = Some(EnumTypeInfo {
            enumerators,
            underlying,
            is_scoped,
        });
        if let Some(owner) = self.current_struct {
            if let Some(info) = self.sess.types.get_mut(owner).struct_info.as_mut() {
                info.nested_enums.push(idx);
            }
        }
        let decl = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Struct {
                name: name_tok.value,
                type_index: idx,
                namespace: self.current_namespace,
            },
            kw,
        ));
        Ok(decl)
    }

    // ---- structs -------------------------------------------------------

    pub(crate) fn parse_struct_definition(&mut self) -> ParseResult<DeclId> {
        let kw = self.advance(); // struct | class
        let is_class = self.sess.interner.view(kw.value) == "class";
        let name_tok = self.advance();
        let idx = self.sess.types.get_or_create(name_tok.value, TypeKind::Struct);
        self.sess.types.get_mut(idx).struct_info = Some(StructTypeInfo::default());

        // Base clause.
        if self.eat(":") {
            loop {
                let mut access = if is_class {
                    AccessSpecifier::Private
                } else {
                    AccessSpecifier::Public
                };
                if self.eat("public") {
                    access = AccessSpecifier::Public;
                } else if self.eat("protected") {
                    access = AccessSpecifier::Protected;
                } else if self.eat("private") {
                    access = AccessSpecifier::Private;
                }
                let base_tok = self.advance();
                let base_idx = self
                    .sess
                    .types
                    .lookup(base_tok.value)
                    .ok_or_else(|| {
                        self.error_at(ErrorKind::Resolution, "unknown base class", base_tok)
                    })?;
                if let Some(info) = self.sess.types.get_mut(idx).struct_info.as_mut() {
                    info.bases.push(cinder_ast::BaseClass {
                        type_index: base_idx,
                        offset: 0,
                        access,
                    });
                }
                if !self.eat(",") {
                    break;
                }
            }
        }

        self.expect("{")?;
        let saved_struct = self.current_struct;
        self.current_struct = Some(idx);
        let mut access = if is_class {
            AccessSpecifier::Private
        } else {
            AccessSpecifier::Public
        };
        let mut pending_layout = true;

        while !self.at("}") && !self.tokens.at_eof() {
            if self.eat("public") {
                self.expect(":")?;
                access = AccessSpecifier::Public;
                continue;
            }
            if self.eat("private") {
                self.expect(":")?;
                access = AccessSpecifier::Private;
                continue;
            }
            if self.eat("protected") {
                self.expect(":")?;
                access = AccessSpecifier::Protected;
                continue;
            }
            if self.at("enum") {
                self.parse_enum_definition()?;
                continue;
            }
            if self.at("static_assert") {
                self.parse_static_assert()?;
                continue;
            }
            let is_virtual = self.eat("virtual");
            let is_static = self.eat("static");
            if is_virtual {
                if let Some(info) = self.sess.types.get_mut(idx).struct_info.as_mut() {
                    info.has_vtable = true;
                }
            }

            // Destructor: ~Name() {...}
            if self.at("~") {
                self.advance();
                self.advance(); // class name
                self.expect("(")?;
                self.expect(")")?;
                self.skip_braced_or_semi()?;
                continue;
            }

            let member_ty = self.parse_type_specifier()?;
            // operator overload?
            if self.at("operator") {
                self.parse_member_function(idx, name_tok.value, member_ty, access, is_static, is_virtual)?;
                continue;
            }
            let member_name = self.advance();
            if self.at("(") {
                // Member function. Layout must be final before bodies run.
                if pending_layout {
                    self.sess.types.finish_layout(idx).map_err(|_| {
                        self.error_at(ErrorKind::Type, "cannot lay out incomplete type", name_tok)
                    })?;
                    pending_layout = false;
                }
                self.parse_member_function_named(
                    idx,
                    name_tok.value,
                    member_ty,
                    member_name,
                    access,
                    is_static,
                    is_virtual,
                )?;
                continue;
            }
            if is_static {
                // Static data member.
                let init = if self.eat("=") {
                    Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?)
                } else {
                    None
                };
                self.expect(";")?;
                self.register_static_member(idx, name_tok.value, member_name.value, &member_ty, init);
                continue;
            }
            // Plain data member, possibly an array.
            let array_count = if self.eat("[") {
                let bound = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
                self.expect("]")?;
                let evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
                Some(
                    evaluator
                        .evaluate(bound)
                        .map_err(|_| {
                            self.error_at(ErrorKind::Type, "array bound is not constant", member_name)
                        })?
                        .as_i64() as u32,
                )
            } else {
                None
            };
            self.expect(";")?;
            let member = self.struct_member_from_spec(member_name.value, &member_ty, access, array_count)?;
            if let Some(info) = self.sess.types.get_mut(idx).struct_info.as_mut() {
                info.members.push(member);
            }
        }
        self.expect("}")?;
        self.expect(";")?;
        self.current_struct = saved_struct;

        if pending_layout {
            self.sess.types.finish_layout(idx).map_err(|_| {
                self.error_at(ErrorKind::Type, "cannot lay out incomplete type", name_tok)
            })?;
        }

        let decl = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Struct {
                name: name_tok.value,
                type_index: idx,
                namespace: self.current_namespace,
            },
            kw,
        ));
        self.scopes.declare_global(name_tok.value, decl);
        Ok(decl)
    }

    pub(crate) fn struct_member_from_spec(
        &mut self,
        name: Symbol,
        spec: &TypeSpec,
        access: AccessSpecifier,
        array_count: Option<u32>,
    ) -> ParseResult<StructMember> {
        let (vt, tidx) = self.spec_category(spec);
        let size_bits = if spec.pointer_depth > 0 || spec.is_reference || spec.is_rvalue_reference {
            64
        } else {
            self.sess.types.size_bits(vt, tidx)
        };
        Ok(StructMember {
            name,
            ty: vt,
            type_index: tidx,
            offset: 0,
            size_bits,
            pointer_depth: spec.pointer_depth,
            is_reference: spec.is_reference || spec.is_rvalue_reference,
            access,
            array_count: array_count.or(spec.array_size),
        })
    }

    fn register_static_member(
        &mut self,
        owner: TypeIndex,
        class_name: Symbol,
        name: Symbol,
        spec: &TypeSpec,
        init: Option<ExprId>,
    ) {
        let class_text = self.sess.interner.view(class_name).to_string();
        let name_text = self.sess.interner.view(name).to_string();
        let mangled = mangle_variable(
            self.sess.context.mangling,
            &VariableSignature {
                name: &name_text,
                namespace: &[],
                class_name: Some(&class_text),
                enclosing_function: None,
                ty: spec,
            },
            &self.sess.types,
            &self.sess.interner,
        );
        let mangled_sym = self.sess.interner.intern(&mangled);
        let (vt, tidx) = self.spec_category(spec);
        if let Some(info) = self.sess.types.get_mut(owner).struct_info.as_mut() {
            info.static_members.push(cinder_ast::StaticMember {
                name,
                ty: vt,
                type_index: tidx,
                pointer_depth: spec.pointer_depth,
                mangled_name: mangled_sym,
                initializer: init,
            });
        }
    }

    fn parse_member_function(
        &mut self,
        owner: TypeIndex,
        class_name: Symbol,
        return_type: TypeSpec,
        access: AccessSpecifier,
        is_static: bool,
        is_virtual: bool,
    ) -> ParseResult<()> {
        // operator<sym>(params) ...
        self.expect("operator")?;
        let sym_tok = self.peek();
        let tok = self.advance();
        let mut op_text = self.view(tok).to_string();
        // operator[] and operator() come in two tokens.
        if (op_text == "[" && self.at("]")) || (op_text == "(" && self.at(")")) {
            let tok = self.advance();
            op_text.push_str(self.view(tok));
        }
        let fn_name = self.sess.interner.intern(&format!("operator{op_text}"));
        let op_sym = self.sess.interner.intern(&op_text);
        let name_tok = Token::new(TokenKind::Identifier, fn_name, sym_tok.file, sym_tok.line, sym_tok.column);
        self.parse_member_function_body(
            owner,
            class_name,
            return_type,
            name_tok,
            Some(op_sym),
            access,
            is_static,
            is_virtual,
        )
    }

    fn parse_member_function_named(
        &mut self,
        owner: TypeIndex,
        class_name: Symbol,
        return_type: TypeSpec,
        name_tok: Token,
        access: AccessSpecifier,
        is_static: bool,
        is_virtual: bool,
    ) -> ParseResult<()> {
        self.parse_member_function_body(
            owner,
            class_name,
            return_type,
            name_tok,
            None,
            access,
            is_static,
            is_virtual,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_member_function_body(
        &mut self,
        owner: TypeIndex,
        class_name: Symbol,
        return_type: TypeSpec,
        name_tok: Token,
        operator_symbol: Option<Symbol>,
        _access: AccessSpecifier,
        is_static: bool,
        is_virtual: bool,
    ) -> ParseResult<()> {
        let params = self.parse_parameter_list()?;
        let is_const = self.eat("const");
        let _ = self.eat("noexcept");

        let class_text = self.sess.interner.view(class_name).to_string();
        let fn_text = self.sess.interner.view(name_tok.value).to_string();
        let op_text = operator_symbol.map(|s| self.sess.interner.view(s).to_string());
        let param_specs: Vec<TypeSpec> = params.0.iter().map(|p| p.ty.clone()).collect();
        let mangled = mangle_function(
            self.sess.context.mangling,
            &FunctionSignature {
                name: &fn_text,
                namespace: &[],
                class_name: Some(&class_text),
                is_const_member: is_const,
                is_static_member: is_static,
                params: &param_specs,
                return_type: &return_type,
                template_params: &[],
                template_args: None,
                linkage: Linkage::CPlusPlus,
                is_variadic: params.1,
                operator_symbol: op_text.as_deref(),
            },
            &self.sess.types,
            &self.sess.interner,
        );
        let mangled_sym = self.sess.interner.intern(&mangled);

        // Register the member before the body so recursion resolves.
        let placeholder = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Placeholder {
                name: name_tok.value,
                ty: return_type.clone(),
            },
            name_tok,
        ));
        if let Some(info) = self.sess.types.get_mut(owner).struct_info.as_mut() {
            info.member_functions.push(cinder_ast::MemberFunction {
                name: name_tok.value,
                decl: placeholder,
                is_static,
                is_virtual,
                is_const,
                is_operator_overload: operator_symbol.is_some(),
                operator_symbol,
                mangled_name: Some(mangled_sym),
            });
        }

        let body = if self.at("{") {
            let saved_fn = self.current_function;
            self.current_function = Some(name_tok.value);
            self.scopes.push_scope();
            for p in &params.0 {
                let d = self.sess.arenas.alloc_decl(Decl::new(
                    DeclKind::Variable(VariableDecl {
                        name: p.name,
                        ty: p.ty.clone(),
                        init: None,
                        storage: StorageClass::Local,
                        namespace: self.current_namespace,
                        mangled_name: None,
                    }),
                    name_tok,
                ));
                self.scopes.declare(p.name, d);
            }
            let b = self.parse_block()?;
            self.scopes.pop_scope();
            self.current_function = saved_fn;
            Some(b)
        } else {
            self.expect(";")?;
            None
        };

        let func = FunctionDecl {
            name: name_tok.value,
            params: params.0,
            return_type,
            body,
            linkage: Linkage::CPlusPlus,
            is_variadic: params.1,
            namespace: self.current_namespace,
            member_of: Some(owner),
            is_static,
            is_const,
            operator_symbol,
            mangled_name: Some(mangled_sym),
        };
        self.sess
            .arenas
            .replace_decl(placeholder, Decl::new(DeclKind::Function(func), name_tok));
        Ok(())
    }

    pub(crate) fn skip_braced_or_semi(&mut self) -> ParseResult<()> {
        if self.eat(";") {
            return Ok(());
        }
        self.expect("{")?;
        let mut depth = 1;
        while depth > 0 && !self.tokens.at_eof() {
            if self.at("{") {
                depth += 1;
            } else if self.at("}") {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    // ---- functions and globals -----------------------------------------

    /// `(params) [-> variadic flag]`
    pub(crate) fn parse_parameter_list(&mut self) -> ParseResult<(Vec<ParamDecl>, bool)> {
        self.expect("(")?;
        let mut params = Vec::new();
        let mut variadic = false;
        while !self.at(")") && !self.tokens.at_eof() {
            if self.eat("...") {
                variadic = true;
                break;
            }
            let ty = self.parse_type_specifier()?;
            // Pack parameter: `Args... args`
            let mut ty = if self.eat("...") {
                match ty.kind {
                    TypeSpecKind::TemplateParam(name) if self.is_pack_param(name) => {
                        let mut pack = ty.clone();
                        pack.kind = TypeSpecKind::Pack(name);
                        pack
                    }
                    _ => {
                        variadic = true;
                        ty
                    }
                }
            } else {
                ty
            };
            let name = if self.at_kind(TokenKind::Identifier) {
                self.advance().value
            } else {
                self.sess.interner.intern("")
            };
            // The body names the pack by its value parameter (`args`, not
            // `Args`); rekey so folds, `sizeof...`, and expansion all agree.
            if matches!(ty.kind, TypeSpecKind::Pack(_))
                && !self.sess.interner.view(name).is_empty()
            {
                ty.kind = TypeSpecKind::Pack(name);
            }
            let default = if self.eat("=") {
                Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?)
            } else {
                None
            };
            params.push(ParamDecl {
                name,
                ty,
                default,
                from_pack: false,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok((params, variadic))
    }

    pub(crate) fn is_pack_param(&self, name: Symbol) -> bool {
        self.template_param_names.get(&name).copied().unwrap_or(false)
    }

    fn parse_function_or_variable(&mut self, linkage: Linkage) -> ParseResult<Vec<DeclId>> {
        let is_static = self.eat("static");
        let _ = self.eat("inline");
        let _ = self.eat("constexpr");
        let ty = self.parse_type_specifier()?;
        let name_tok = self.advance();
        if name_tok.kind != TokenKind::Identifier {
            return Err(self.error_at(ErrorKind::Syntax, "expected a declarator name", name_tok));
        }

        if self.at("(") {
            return Ok(vec![self.parse_function_definition(ty, name_tok, linkage)?]);
        }

        // Global variable, possibly an array.
        let array_count = if self.eat("[") {
            let bound = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
            self.expect("]")?;
            let evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
            Some(
                evaluator
                    .evaluate(bound)
                    .map_err(|_| self.error_at(ErrorKind::Type, "array bound is not constant", name_tok))?
                    .as_i64() as u32,
            )
        } else {
            None
        };
        let mut ty = ty;
        if array_count.is_some() {
            ty.array_size = array_count;
        }
        let init = if self.eat("=") {
            Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?)
        } else {
            None
        };
        self.expect(";")?;

        let ns_path = self.namespace_path_strings();
        let ns_refs: Vec<&str> = ns_path.iter().map(String::as_str).collect();
        let name_text = self.sess.interner.view(name_tok.value).to_string();
        let mangled = if linkage == Linkage::C {
            name_text.clone()
        } else {
            mangle_variable(
                self.sess.context.mangling,
                &VariableSignature {
                    name: &name_text,
                    namespace: &ns_refs,
                    class_name: None,
                    enclosing_function: None,
                    ty: &ty,
                },
                &self.sess.types,
                &self.sess.interner,
            )
        };
        let mangled_sym = self.sess.interner.intern(&mangled);
        let decl = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name_tok.value,
                ty,
                init,
                storage: StorageClass::Global,
                namespace: self.current_namespace,
                mangled_name: Some(mangled_sym),
            }),
            name_tok,
        ));
        self.scopes.declare_global(name_tok.value, decl);
        self.sess
            .namespaces
            .declare(self.current_namespace, name_tok.value, decl);
        Ok(vec![decl])
    }

    pub(crate) fn namespace_path_strings(&self) -> Vec<String> {
        self.sess
            .namespaces
            .path(self.current_namespace)
            .iter()
            .map(|s| self.sess.interner.view(*s).to_string())
            .collect()
    }

    pub(crate) fn parse_function_definition(
        &mut self,
        return_type: TypeSpec,
        name_tok: Token,
        linkage: Linkage,
    ) -> ParseResult<DeclId> {
        let params = self.parse_parameter_list()?;
        let _ = self.eat("noexcept");

        let name_text = self.sess.interner.view(name_tok.value).to_string();
        let ns_path = self.namespace_path_strings();
        let ns_refs: Vec<&str> = ns_path.iter().map(String::as_str).collect();
        let param_specs: Vec<TypeSpec> = params.0.iter().map(|p| p.ty.clone()).collect();
        let effective_linkage = if name_text == "main" { Linkage::C } else { linkage };
        let mangled = mangle_function(
            self.sess.context.mangling,
            &FunctionSignature {
                name: &name_text,
                namespace: &ns_refs,
                class_name: None,
                is_const_member: false,
                is_static_member: false,
                params: &param_specs,
                return_type: &return_type,
                template_params: &[],
                template_args: None,
                linkage: effective_linkage,
                is_variadic: params.1,
                operator_symbol: None,
            },
            &self.sess.types,
            &self.sess.interner,
        );
        let mangled_sym = self.sess.interner.intern(&mangled);

        // Forward-declare before the body so recursion resolves.
        let placeholder = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Placeholder {
                name: name_tok.value,
                ty: return_type.clone(),
            },
            name_tok,
        ));
        self.scopes.declare_global(name_tok.value, placeholder);
        self.sess
            .namespaces
            .declare(self.current_namespace, name_tok.value, placeholder);

        let body = if self.at("{") {
            let saved_fn = self.current_function;
            self.current_function = Some(name_tok.value);
            self.scopes.push_scope();
            for p in &params.0 {
                let d = self.sess.arenas.alloc_decl(Decl::new(
                    DeclKind::Variable(VariableDecl {
                        name: p.name,
                        ty: p.ty.clone(),
                        init: None,
                        storage: StorageClass::Local,
                        namespace: self.current_namespace,
                        mangled_name: None,
                    }),
                    name_tok,
                ));
                self.scopes.declare(p.name, d);
            }
            let b = self.parse_block()?;
            self.scopes.pop_scope();
            self.current_function = saved_fn;
            Some(b)
        } else {
            self.expect(";")?;
            None
        };

        let func = FunctionDecl {
            name: name_tok.value,
            params: params.0,
            return_type,
            body,
            linkage: effective_linkage,
            is_variadic: params.1,
            namespace: self.current_namespace,
            member_of: None,
            is_static: false,
            is_const: false,
            operator_symbol: None,
            mangled_name: Some(mangled_sym),
        };
        self.sess
            .arenas
            .replace_decl(placeholder, Decl::new(DeclKind::Function(func), name_tok));
        self.functions
            .entry(name_tok.value)
            .or_default()
            .push(placeholder);
        Ok(placeholder)
    }

    // ---- templates -----------------------------------------------------

    fn parse_template_declaration(&mut self) -> ParseResult<DeclId> {
        let kw = self.expect("template")?;
        let params = self.parse_template_parameter_list()?;

        let saved_names: Vec<(Symbol, bool)> = params.iter().map(|p| (p.name, p.is_pack)).collect();
        for (n, pack) in &saved_names {
            self.template_param_names.insert(*n, *pack);
        }
        let was_template_body = self.parsing_template_body;
        self.parsing_template_body = true;

        // requires-clause before the declaration.
        let mut constraint = if self.at("requires") {
            self.advance();
            Some(self.parse_expression(crate::expr::PREC_LOGICAL_OR, ExprContext::Normal)?)
        } else {
            None
        };

        let result = if self.at("concept") {
            self.advance();
            let name_tok = self.advance();
            self.expect("=")?;
            let expr = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
            self.expect(";")?;
            let decl = self.sess.arenas.alloc_decl(Decl::new(
                DeclKind::Concept {
                    name: name_tok.value,
                    params: params.clone(),
                    constraint: expr,
                },
                kw,
            ));
            self.sess.templates.define(name_tok.value, decl);
            self.scopes.declare_global(name_tok.value, decl);
            Ok(decl)
        } else if self.at("struct") || self.at("class") {
            self.parse_class_template(kw, params.clone(), constraint.take())
        } else if self.at("using") {
            // template<typename T> using Alias = T&;
            self.advance();
            let name_tok = self.advance();
            self.expect("=")?;
            let target = self.parse_type_specifier()?;
            self.expect(";")?;
            let decl = self.sess.arenas.alloc_decl(Decl::new(
                DeclKind::TemplateAlias {
                    name: name_tok.value,
                    params: params.clone(),
                    target,
                },
                kw,
            ));
            self.sess.templates.define(name_tok.value, decl);
            Ok(decl)
        } else {
            self.parse_function_or_variable_template(kw, params.clone(), constraint.take())
        };

        self.parsing_template_body = was_template_body;
        if !was_template_body {
            for (n, _) in &saved_names {
                self.template_param_names.remove(n);
            }
        }
        result
    }

    fn parse_template_parameter_list(&mut self) -> ParseResult<Vec<TemplateParam>> {
        self.expect("<")?;
        let mut params = Vec::new();
        while !self.at(">") && !self.tokens.at_eof() {
            if self.eat("typename") || self.eat("class") {
                let is_pack = self.eat("...");
                let name = self.advance().value;
                // Names must be visible while parsing the remaining
                // parameters (defaults may reference earlier ones).
                self.template_param_names.insert(name, is_pack);
                let default = if self.eat("=") {
                    Some(self.parse_type_specifier()?)
                } else {
                    None
                };
                params.push(TemplateParam {
                    name,
                    kind: TemplateParamKind::Type { default },
                    is_pack,
                });
            } else if self.eat("template") {
                // template<typename> class C
                self.expect("<")?;
                while !self.at(">") && !self.tokens.at_eof() {
                    self.advance();
                }
                self.expect(">")?;
                let _ = self.eat("class") || self.eat("typename");
                let name = self.advance().value;
                self.template_param_names.insert(name, false);
                params.push(TemplateParam {
                    name,
                    kind: TemplateParamKind::Template,
                    is_pack: false,
                });
            } else {
                // Non-type parameter: `int N`, `bool B = true`.
                let ty = self.parse_type_specifier()?;
                let is_pack = self.eat("...");
                let name = self.advance().value;
                self.template_param_names.insert(name, is_pack);
                let default = if self.eat("=") {
                    Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::TemplateArgument)?)
                } else {
                    None
                };
                params.push(TemplateParam {
                    name,
                    kind: TemplateParamKind::NonType { ty, default },
                    is_pack,
                });
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">")?;
        Ok(params)
    }

    fn parse_class_template(
        &mut self,
        kw: Token,
        params: Vec<TemplateParam>,
        constraint: Option<ExprId>,
    ) -> ParseResult<DeclId> {
        self.advance(); // struct | class
        let name_tok = self.advance();
        self.expect("{")?;

        let mut body = ClassPattern::default();
        let mut access = AccessSpecifier::Public;
        while !self.at("}") && !self.tokens.at_eof() {
            if self.eat("public") {
                self.expect(":")?;
                access = AccessSpecifier::Public;
                continue;
            }
            if self.eat("private") {
                self.expect(":")?;
                access = AccessSpecifier::Private;
                continue;
            }
            if self.eat("protected") {
                self.expect(":")?;
                access = AccessSpecifier::Protected;
                continue;
            }
            let is_static = self.eat("static");
            let ty = self.parse_type_specifier()?;
            let member_tok = self.advance();
            if self.at("(") {
                // Method pattern: parse but defer; bodies substitute later.
                let method_params = self.parse_parameter_list()?;
                let is_const = self.eat("const");
                let body_stmt = if self.at("{") {
                    self.scopes.push_scope();
                    for p in &method_params.0 {
                        let d = self.sess.arenas.alloc_decl(Decl::new(
                            DeclKind::Variable(VariableDecl {
                                name: p.name,
                                ty: p.ty.clone(),
                                init: None,
                                storage: StorageClass::Local,
                                namespace: self.current_namespace,
                                mangled_name: None,
                            }),
                            member_tok,
                        ));
                        self.scopes.declare(p.name, d);
                    }
                    let b = self.parse_block()?;
                    self.scopes.pop_scope();
                    Some(b)
                } else {
                    self.expect(";")?;
                    None
                };
                let pattern = self.sess.arenas.alloc_decl(Decl::new(
                    DeclKind::Function(FunctionDecl {
                        name: member_tok.value,
                        params: method_params.0,
                        return_type: ty,
                        body: body_stmt,
                        linkage: Linkage::CPlusPlus,
                        is_variadic: method_params.1,
                        namespace: self.current_namespace,
                        member_of: None,
                        is_static,
                        is_const,
                        operator_symbol: None,
                        mangled_name: None,
                    }),
                    member_tok,
                ));
                body.methods.push(pattern);
                continue;
            }
            if is_static {
                let init = if self.eat("=") {
                    Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?)
                } else {
                    None
                };
                self.expect(";")?;
                body.static_members.push((member_tok.value, ty, init));
                continue;
            }
            self.expect(";")?;
            body.members.push(PatternMember {
                name: member_tok.value,
                ty,
                access,
            });
        }
        self.expect("}")?;
        self.expect(";")?;

        let decl = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::TemplateClass {
                name: name_tok.value,
                params,
                body,
                constraint,
            },
            kw,
        ));
        self.sess.templates.define(name_tok.value, decl);
        Ok(decl)
    }

    fn parse_function_or_variable_template(
        &mut self,
        kw: Token,
        params: Vec<TemplateParam>,
        constraint: Option<ExprId>,
    ) -> ParseResult<DeclId> {
        let _ = self.eat("constexpr");
        let ty = self.parse_type_specifier()?;
        let name_tok = self.advance();

        if self.at("(") {
            let fn_params = self.parse_parameter_list()?;
            // Value-level pack names must disambiguate folds and `...`
            // expansions while the body parses.
            let mut pack_value_names = Vec::new();
            for p in &fn_params.0 {
                if matches!(p.ty.kind, TypeSpecKind::Pack(_))
                    && self.template_param_names.insert(p.name, true).is_none()
                {
                    pack_value_names.push(p.name);
                }
            }
            let constraint = if self.at("requires") {
                self.advance();
                Some(self.parse_expression(crate::expr::PREC_LOGICAL_OR, ExprContext::Normal)?)
            } else {
                constraint
            };
            let body = if self.at("{") {
                let saved_fn = self.current_function;
                self.current_function = Some(name_tok.value);
                self.scopes.push_scope();
                for p in &fn_params.0 {
                    let d = self.sess.arenas.alloc_decl(Decl::new(
                        DeclKind::Variable(VariableDecl {
                            name: p.name,
                            ty: p.ty.clone(),
                            init: None,
                            storage: StorageClass::Local,
                            namespace: self.current_namespace,
                            mangled_name: None,
                        }),
                        name_tok,
                    ));
                    self.scopes.declare(p.name, d);
                }
                let b = self.parse_block()?;
                self.scopes.pop_scope();
                self.current_function = saved_fn;
                Some(b)
            } else {
                self.expect(";")?;
                None
            };
            for n in pack_value_names {
                self.template_param_names.remove(&n);
            }
            let pattern = self.sess.arenas.alloc_decl(Decl::new(
                DeclKind::Function(FunctionDecl {
                    name: name_tok.value,
                    params: fn_params.0,
                    return_type: ty,
                    body,
                    linkage: Linkage::CPlusPlus,
                    is_variadic: fn_params.1,
                    namespace: self.current_namespace,
                    member_of: None,
                    is_static: false,
                    is_const: false,
                    operator_symbol: None,
                    mangled_name: None,
                }),
                name_tok,
            ));
            let decl = self.sess.arenas.alloc_decl(Decl::new(
                DeclKind::TemplateFunction {
                    name: name_tok.value,
                    params,
                    pattern,
                    constraint,
                },
                kw,
            ));
            self.sess.templates.define(name_tok.value, decl);
            return Ok(decl);
        }

        // Variable template: `template<typename T> T zero = T();`
        let init = if self.eat("=") {
            Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?)
        } else {
            None
        };
        self.expect(";")?;
        let pattern = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name_tok.value,
                ty,
                init,
                storage: StorageClass::Global,
                namespace: self.current_namespace,
                mangled_name: None,
            }),
            name_tok,
        ));
        let decl = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::TemplateVariable {
                name: name_tok.value,
                params,
                pattern,
            },
            kw,
        ));
        self.sess.templates.define(name_tok.value, decl);
        Ok(decl)
    }

    // ---- statements ----------------------------------------------------

    pub(crate) fn parse_block(&mut self) -> ParseResult<StmtId> {
        let open = self.expect("{")?;
        let mut stmts = Vec::new();
        while !self.at("}") && !self.tokens.at_eof() {
            match self.parse_statement() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.errors.push(e);
                    self.recover_to_boundary();
                }
            }
        }
        self.expect("}")?;
        Ok(self
            .sess
            .arenas
            .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Block(stmts), open)))
    }

    pub(crate) fn parse_statement(&mut self) -> ParseResult<StmtId> {
        let tok = self.peek();
        let text = self.view(tok).to_string();
        match text.as_str() {
            "{" => {
                self.scopes.push_scope();
                let b = self.parse_block();
                self.scopes.pop_scope();
                b
            }
            ";" => {
                self.advance();
                Ok(self
                    .sess
                    .arenas
                    .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Empty, tok)))
            }
            "return" => {
                self.advance();
                let value = if self.at(";") {
                    None
                } else {
                    Some(self.parse_expression(crate::expr::PREC_COMMA, ExprContext::Normal)?)
                };
                self.expect(";")?;
                Ok(self
                    .sess
                    .arenas
                    .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Return(value), tok)))
            }
            "if" => {
                self.advance();
                self.expect("(")?;
                let cond = self.parse_expression(crate::expr::PREC_COMMA, ExprContext::Normal)?;
                self.expect(")")?;
                let then_branch = self.parse_statement()?;
                let else_branch = if self.eat("else") {
                    Some(self.parse_statement()?)
                } else {
                    None
                };
                Ok(self.sess.arenas.alloc_stmt(cinder_ast::Stmt::new(
                    StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    tok,
                )))
            }
            "while" => {
                self.advance();
                self.expect("(")?;
                let cond = self.parse_expression(crate::expr::PREC_COMMA, ExprContext::Normal)?;
                self.expect(")")?;
                let body = self.parse_statement()?;
                Ok(self
                    .sess
                    .arenas
                    .alloc_stmt(cinder_ast::Stmt::new(StmtKind::While { cond, body }, tok)))
            }
            "for" => {
                self.advance();
                self.expect("(")?;
                self.scopes.push_scope();
                let init = if self.at(";") {
                    self.advance();
                    None
                } else {
                    Some(self.parse_statement()?)
                };
                let cond = if self.at(";") {
                    None
                } else {
                    Some(self.parse_expression(crate::expr::PREC_COMMA, ExprContext::Normal)?)
                };
                self.expect(";")?;
                let step = if self.at(")") {
                    None
                } else {
                    Some(self.parse_expression(crate::expr::PREC_COMMA, ExprContext::Normal)?)
                };
                self.expect(")")?;
                let body = self.parse_statement()?;
                self.scopes.pop_scope();
                Ok(self.sess.arenas.alloc_stmt(cinder_ast::Stmt::new(
                    StmtKind::For {
                        init,
                        cond,
                        step,
                        body,
                    },
                    tok,
                )))
            }
            "break" => {
                self.advance();
                self.expect(";")?;
                Ok(self
                    .sess
                    .arenas
                    .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Break, tok)))
            }
            "continue" => {
                self.advance();
                self.expect(";")?;
                Ok(self
                    .sess
                    .arenas
                    .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Continue, tok)))
            }
            "static_assert" => {
                self.parse_static_assert()?;
                Ok(self
                    .sess
                    .arenas
                    .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Empty, tok)))
            }
            _ => self.parse_declaration_or_expression_statement(),
        }
    }

    /// Statement-start disambiguation: try a declaration first, restore on
    /// failure, and fall back to an expression statement.
    fn parse_declaration_or_expression_statement(&mut self) -> ParseResult<StmtId> {
        let tok = self.peek();
        let is_static_local = self.at("static");

        let save = self.tokens.save_position();
        if is_static_local {
            self.advance();
        }
        let _ = self.eat("const");
        if let Ok(ty) = self.try_parse_type() {
            if self.at_kind(TokenKind::Identifier)
                && (self.nth_is(1, "=")
                    || self.nth_is(1, ";")
                    || self.nth_is(1, "[")
                    || self.nth_is(1, "(")
                    || self.nth_is(1, "{"))
            {
                self.tokens.discard_saved(save);
                return self.parse_variable_declaration(ty, is_static_local, tok);
            }
        }
        self.tokens.restore_position(save);

        let expr = self.parse_expression(crate::expr::PREC_COMMA, ExprContext::Normal)?;
        self.expect(";")?;
        Ok(self
            .sess
            .arenas
            .alloc_stmt(cinder_ast::Stmt::new(StmtKind::Expr(expr), tok)))
    }

    fn parse_variable_declaration(
        &mut self,
        mut ty: TypeSpec,
        is_static_local: bool,
        tok: Token,
    ) -> ParseResult<StmtId> {
        let name_tok = self.advance();

        if self.eat("[") {
            let bound = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
            self.expect("]")?;
            let mut evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
            self.bind_constants(&mut evaluator);
            ty.array_size = Some(
                evaluator
                    .evaluate(bound)
                    .map_err(|_| {
                        self.error_at(ErrorKind::Type, "array bound is not constant", name_tok)
                    })?
                    .as_i64() as u32,
            );
        }

        let init = if self.eat("=") {
            if self.at("{") {
                Some(self.parse_braced_init(&ty, name_tok)?)
            } else {
                Some(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?)
            }
        } else if self.at("(") {
            // Direct initialization `T x(args)`.
            Some(self.parse_direct_init(&ty, name_tok)?)
        } else if self.at("{") {
            Some(self.parse_braced_init(&ty, name_tok)?)
        } else {
            None
        };
        self.expect(";")?;

        let mangled = if is_static_local {
            let func = self
                .current_function
                .map(|f| self.sess.interner.view(f).to_string())
                .unwrap_or_default();
            let name_text = self.sess.interner.view(name_tok.value).to_string();
            let mangled = mangle_variable(
                self.sess.context.mangling,
                &VariableSignature {
                    name: &name_text,
                    namespace: &[],
                    class_name: None,
                    enclosing_function: Some(&func),
                    ty: &ty,
                },
                &self.sess.types,
                &self.sess.interner,
            );
            Some(self.sess.interner.intern(&mangled))
        } else {
            None
        };

        let decl = self.sess.arenas.alloc_decl(Decl::new(
            DeclKind::Variable(VariableDecl {
                name: name_tok.value,
                ty,
                init,
                storage: if is_static_local {
                    StorageClass::StaticLocal
                } else {
                    StorageClass::Local
                },
                namespace: self.current_namespace,
                mangled_name: mangled,
            }),
            name_tok,
        ));
        self.scopes.declare(name_tok.value, decl);
        Ok(self
            .sess
            .arenas
            .alloc_stmt(cinder_ast::Stmt::new(StmtKind::VarDecl(decl), tok)))
    }

    fn parse_direct_init(&mut self, ty: &TypeSpec, name_tok: Token) -> ParseResult<ExprId> {
        self.expect("(")?;
        let mut args = Vec::new();
        while !self.at(")") && !self.tokens.at_eof() {
            args.push(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?);
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        self.construction_expr(ty, args, name_tok)
    }

    fn parse_braced_init(&mut self, ty: &TypeSpec, name_tok: Token) -> ParseResult<ExprId> {
        self.expect("{")?;
        let mut args = Vec::new();
        while !self.at("}") && !self.tokens.at_eof() {
            args.push(self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?);
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        if ty.array_size.is_some() {
            // Array aggregate init; the lowering stores element by element.
            return Ok(self.alloc_expr(
                ExprKind::InitializerListConstruction {
                    type_index: TypeIndex::VOID,
                    args,
                },
                name_tok,
            ));
        }
        if let TypeSpecKind::Indexed(idx) = ty.kind {
            if self.sess.types.struct_info(idx).is_some() {
                return Ok(self.alloc_expr(
                    ExprKind::InitializerListConstruction {
                        type_index: idx,
                        args,
                    },
                    name_tok,
                ));
            }
        }
        if args.len() == 1 {
            return Ok(args[0]);
        }
        self.construction_expr(ty, args, name_tok)
    }

    pub(crate) fn construction_expr(
        &mut self,
        ty: &TypeSpec,
        args: Vec<ExprId>,
        tok: Token,
    ) -> ParseResult<ExprId> {
        match &ty.kind {
            TypeSpecKind::Indexed(idx) if self.sess.types.struct_info(*idx).is_some() => {
                Ok(self.alloc_expr(
                    ExprKind::ConstructorCall {
                        type_index: *idx,
                        args,
                    },
                    tok,
                ))
            }
            _ if args.len() == 1 => Ok(self.alloc_expr(
                ExprKind::Cast {
                    kind: cinder_ast::CastKind::Functional,
                    target: ty.clone(),
                    operand: args[0],
                },
                tok,
            )),
            _ if args.is_empty() => {
                // Value initialization: T() → zero of T.
                Ok(self.alloc_expr(
                    ExprKind::IntLiteral {
                        value: 0,
                        ty: ty.value_type(),
                    },
                    tok,
                ))
            }
            _ => Err(self.error_at(
                ErrorKind::Type,
                "too many initializer arguments for scalar type",
                tok,
            )),
        }
    }

    // ---- misc helpers --------------------------------------------------

    /// Base category of a spec for member/size computation.
    pub(crate) fn spec_category(&self, spec: &TypeSpec) -> (ValueType, TypeIndex) {
        match spec.kind {
            TypeSpecKind::Builtin(vt) => (vt, TypeIndex::VOID),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.sess.types.resolve_alias(idx);
                match self.sess.types.get(idx).kind {
                    TypeKind::Builtin(vt) => (vt, idx),
                    TypeKind::Enum => (ValueType::Enum, idx),
                    _ => (ValueType::Struct, idx),
                }
            }
            _ => (ValueType::Void, TypeIndex::VOID),
        }
    }

    pub(crate) fn fresh_lambda_name(&mut self) -> Symbol {
        self.lambda_counter += 1;
        let name = format!("__lambda_{}", self.lambda_counter);
        self.sess.interner.intern(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;
    use crate::session::{CompileContext, Session};

    fn parse(source: &str) -> (Session, ParsedUnit, Vec<CompileError>) {
        let mut sess = Session::new(CompileContext::default());
        let file = sess.sources.add_file("parse.cpp");
        let tokens = tokenize(source, file, &mut sess.interner);
        let mut parser = Parser::new(&mut sess, tokens);
        let unit = parser.parse_translation_unit();
        let errors = std::mem::take(&mut parser.errors);
        drop(parser);
        (sess, unit, errors)
    }

    #[test]
    fn less_than_on_non_template_stays_a_comparison() {
        let (_, unit, errors) = parse("bool lt(int a, int b) { return a < b; }");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(unit.decls.len(), 1);
    }

    #[test]
    fn template_id_wins_over_comparison_for_known_templates() {
        let source = r#"
            template<typename T> struct Box { T value; };
            unsigned long long size_probe() { return sizeof(Box<int>); }
        "#;
        let (_, _, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn c_style_cast_commits_only_before_a_unary_start() {
        // `(int)x` is a cast; `(x)` alone is a parenthesized expression.
        let (_, _, errors) = parse("long both(int x) { return (long)x + (x); }");
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn recovery_resumes_at_the_next_declaration() {
        let (_, unit, errors) = parse("int broken( ; int fine() { return 1; }");
        assert!(!errors.is_empty());
        assert!(unit.decls.len() >= 1);
    }

    #[test]
    fn qualified_names_resolve_through_namespaces() {
        let source = r#"
            namespace math {
                int twice(int x) { return x + x; }
            }
            int user() { return math::twice(21); }
        "#;
        let (_, _, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn scoped_enum_requires_qualification() {
        let source = r#"
            enum class Mode { Off, On };
            int scoped() { return static_cast<int>(Mode::On); }
        "#;
        let (_, _, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
    }
}
