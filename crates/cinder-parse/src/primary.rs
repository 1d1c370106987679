//! Primary-expression parsing: the largest subroutine in the parser.
//!
//! Every syntactic shape a primary expression can take is recognized here,
//! committing to a unique AST variant. Speculative parses bracket
//! themselves with token save/restore; the identifier decision tree
//! performs immediate symbol resolution and triggers template
//! instantiation on demand.

use crate::expr::{PREC_ASSIGN, PREC_COMMA};
use crate::lex::{decode_quoted, float_literal_parts, integer_literal_parts};
use crate::parser::{ExprContext, LambdaScope, ParseResult, Parser};
use cinder_ast::{
    CaptureKind, CastKind, CharEncoding, DeclKind, ExprId, ExprKind, FoldForm, FunctionDecl,
    LambdaCapture, LambdaInfo, Linkage, MemberFunction, NamespaceHandle, ParamDecl, Requirement,
    RequiresClause, SizeofArg, StorageClass, StructTypeInfo, TemplateArg, TypeIndex, TypeKind,
    TypeSpec, TypeSpecKind, TypeTrait, UnaryOp, ValueType, VariableDecl,
};
use cinder_common::{ErrorKind, Symbol, Token, TokenKind};
use cinder_mangle::{mangle_function, FunctionSignature};
use cinder_sema::{resolve_overload, ConstEvaluator};

impl Parser<'_> {
    pub(crate) fn parse_primary(&mut self, ctx: ExprContext) -> ParseResult<ExprId> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::IntegerLiteral => {
                self.advance();
                Ok(self.int_literal_expr(tok))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let (value, is_single) = float_literal_parts(self.sess.interner.view(tok.value));
                let ty = if is_single {
                    ValueType::Float
                } else {
                    ValueType::Double
                };
                Ok(self.alloc_expr(ExprKind::FloatLiteral { value, ty }, tok))
            }
            TokenKind::CharLiteral => {
                self.advance();
                let (prefix, body) = decode_quoted(self.sess.interner.view(tok.value));
                let encoding = encoding_from_prefix(prefix);
                let value = body.chars().next().map(|c| c as u32).unwrap_or(0);
                Ok(self.alloc_expr(ExprKind::CharLiteral { value, encoding }, tok))
            }
            TokenKind::StringLiteral => self.parse_string_literal_run(),
            TokenKind::Keyword => self.parse_keyword_primary(ctx, tok),
            TokenKind::Identifier => self.parse_identifier_expression(ctx),
            _ => {
                let text = self.view(tok).to_string();
                match text.as_str() {
                    "(" => self.parse_paren_cast_or_fold(ctx),
                    "[" => self.parse_lambda(),
                    "::" => {
                        self.advance();
                        if self.at("new") {
                            self.advance();
                            return self.parse_new_expression(tok, true);
                        }
                        if self.at("delete") {
                            self.advance();
                            return self.parse_delete_expression(tok, true);
                        }
                        let first = self.advance();
                        self.parse_qualified_identifier(first, true, ctx)
                    }
                    _ => Err(self.error_at(
                        ErrorKind::Syntax,
                        format!("expected expression, found `{text}`"),
                        tok,
                    )),
                }
            }
        }
    }

    fn parse_keyword_primary(&mut self, ctx: ExprContext, tok: Token) -> ParseResult<ExprId> {
        let text = self.view(tok).to_string();
        match text.as_str() {
            "true" => {
                self.advance();
                Ok(self.alloc_expr(ExprKind::BoolLiteral(true), tok))
            }
            "false" => {
                self.advance();
                Ok(self.alloc_expr(ExprKind::BoolLiteral(false), tok))
            }
            "nullptr" => {
                self.advance();
                Ok(self.alloc_expr(ExprKind::NullptrLiteral, tok))
            }
            "this" => {
                self.advance();
                Ok(self.alloc_expr(ExprKind::This, tok))
            }
            "sizeof" => self.parse_sizeof(tok),
            "alignof" => {
                self.advance();
                self.expect("(")?;
                let spec = self.parse_type_specifier()?;
                self.expect(")")?;
                Ok(self.alloc_expr(ExprKind::Alignof(spec), tok))
            }
            "noexcept" => {
                self.advance();
                self.expect("(")?;
                let inner = self.parse_expression(PREC_COMMA, ctx)?;
                self.expect(")")?;
                Ok(self.alloc_expr(ExprKind::Noexcept(inner), tok))
            }
            "typeid" => {
                self.advance();
                self.expect("(")?;
                let save = self.tokens.save_position();
                let arg = match self.try_parse_type() {
                    Ok(spec) if self.at(")") => {
                        self.tokens.discard_saved(save);
                        SizeofArg::Type(spec)
                    }
                    _ => {
                        self.tokens.restore_position(save);
                        SizeofArg::Expr(self.parse_expression(PREC_COMMA, ctx)?)
                    }
                };
                self.expect(")")?;
                Ok(self.alloc_expr(ExprKind::Typeid { arg }, tok))
            }
            "new" => {
                self.advance();
                self.parse_new_expression(tok, false)
            }
            "delete" => {
                self.advance();
                self.parse_delete_expression(tok, false)
            }
            "static_cast" => self.parse_cpp_cast_expression(CastKind::Static, tok),
            "dynamic_cast" => self.parse_cpp_cast_expression(CastKind::Dynamic, tok),
            "const_cast" => self.parse_cpp_cast_expression(CastKind::Const, tok),
            "reinterpret_cast" => self.parse_cpp_cast_expression(CastKind::Reinterpret, tok),
            "throw" => {
                self.advance();
                let operand = if self.at(";") || self.at(")") || self.at(",") {
                    None
                } else {
                    Some(self.parse_expression(PREC_ASSIGN, ctx)?)
                };
                Ok(self.alloc_expr(ExprKind::Throw { operand }, tok))
            }
            "requires" => self.parse_requires_expression(tok),
            "typename" => {
                // typename T::name, optionally constructed: typename T::X(args)
                let spec = self.parse_type_specifier()?;
                if self.at("(") {
                    let args = self.parse_call_arguments()?;
                    return Ok(self.alloc_expr(ExprKind::TypeConstruction { ty: spec, args }, tok));
                }
                Err(self.error_at(
                    ErrorKind::Syntax,
                    "expected `(` after dependent type name",
                    tok,
                ))
            }
            "operator" => {
                // `operator+` used as a name (e.g. &Class::operator+).
                self.advance();
                let op_tok = self.advance();
                let mut op_text = self.view(op_tok).to_string();
                if (op_text == "[" && self.at("]")) || (op_text == "(" && self.at(")")) {
                    let op_tok = self.advance();
                    op_text.push_str(self.view(op_tok));
                }
                let name = self.sess.interner.intern(&format!("operator{op_text}"));
                Ok(self.alloc_expr(ExprKind::Identifier { name }, tok))
            }
            // A builtin type keyword starting a functional cast: `int(x)`.
            "void" | "bool" | "char" | "short" | "int" | "long" | "float" | "double"
            | "signed" | "unsigned" => {
                let spec = self.parse_type_specifier()?;
                if self.at("(") {
                    let args = self.parse_call_arguments()?;
                    return self.construction_expr(&spec, args, tok);
                }
                Err(self.error_at(ErrorKind::Syntax, "expected `(` in functional cast", tok))
            }
            other => Err(self.error_at(
                ErrorKind::Syntax,
                format!("unexpected keyword `{other}` in expression"),
                tok,
            )),
        }
    }

    fn int_literal_expr(&mut self, tok: Token) -> ExprId {
        let (value, unsigned, longs) = integer_literal_parts(self.sess.interner.view(tok.value));
        let ty = match (unsigned, longs) {
            (false, 0) => {
                if value > i32::MAX as u64 {
                    ValueType::LongLong
                } else {
                    ValueType::Int
                }
            }
            (true, 0) => ValueType::UnsignedInt,
            (false, 1) => ValueType::Long,
            (true, 1) => ValueType::UnsignedLong,
            (false, _) => ValueType::LongLong,
            (true, _) => ValueType::UnsignedLongLong,
        };
        self.alloc_expr(ExprKind::IntLiteral { value, ty }, tok)
    }

    /// Adjacent string literals concatenate; a prefixed literal lends its
    /// encoding to the whole run.
    fn parse_string_literal_run(&mut self) -> ParseResult<ExprId> {
        let tok = self.peek();
        let mut encoding = CharEncoding::Plain;
        let mut combined = String::new();
        while self.at_kind(TokenKind::StringLiteral) {
            let t = self.advance();
            let (prefix, body) = decode_quoted(self.sess.interner.view(t.value));
            if encoding == CharEncoding::Plain {
                encoding = encoding_from_prefix(prefix);
            }
            combined.push_str(&body);
        }
        let value = self.sess.interner.intern(&combined);
        Ok(self.alloc_expr(ExprKind::StringLiteral { value, encoding }, tok))
    }

    fn parse_sizeof(&mut self, tok: Token) -> ParseResult<ExprId> {
        self.advance();
        if self.eat("...") {
            self.expect("(")?;
            let pack = self.advance().value;
            self.expect(")")?;
            return Ok(self.alloc_expr(ExprKind::Sizeof(SizeofArg::Pack(pack)), tok));
        }
        if self.at("(") {
            let save = self.tokens.save_position();
            self.advance();
            if let Ok(spec) = self.try_parse_type() {
                if self.at(")") {
                    self.advance();
                    self.tokens.discard_saved(save);
                    let arg = SizeofArg::Type(spec);
                    self.force_layout_for_sizeof(&arg);
                    return Ok(self.alloc_expr(ExprKind::Sizeof(arg), tok));
                }
            }
            self.tokens.restore_position(save);
        }
        let operand = self.parse_unary(ExprContext::Normal)?;
        Ok(self.alloc_expr(ExprKind::Sizeof(SizeofArg::Expr(operand)), tok))
    }

    /// Shared routine for the four named casts.
    fn parse_cpp_cast_expression(&mut self, kind: CastKind, tok: Token) -> ParseResult<ExprId> {
        self.advance();
        self.expect("<")?;
        let target = self.parse_type_specifier()?;
        self.expect(">")?;
        self.expect("(")?;
        let operand = self.parse_expression(PREC_COMMA, ExprContext::Normal)?;
        self.expect(")")?;
        Ok(self.alloc_expr(
            ExprKind::Cast {
                kind,
                target,
                operand,
            },
            tok,
        ))
    }

    fn parse_new_expression(&mut self, tok: Token, is_global: bool) -> ParseResult<ExprId> {
        // Placement arguments come first: new (addr) T(args).
        let mut placement = Vec::new();
        if self.at("(") {
            let save = self.tokens.save_position();
            self.advance();
            match self.try_parse_type() {
                Ok(_) if self.at(")") => {
                    // `new (T)` — parenthesized type, not placement.
                    self.tokens.restore_position(save);
                }
                _ => {
                    self.tokens.restore_position(save);
                    self.advance();
                    while !self.at(")") && !self.tokens.at_eof() {
                        placement.push(self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?);
                        if !self.eat(",") {
                            break;
                        }
                    }
                    self.expect(")")?;
                }
            }
        }

        let parenthesized_type = self.eat("(");
        let ty = self.parse_type_specifier()?;
        if parenthesized_type {
            self.expect(")")?;
        }

        let mut count = None;
        let mut args = Vec::new();
        if self.eat("[") {
            count = Some(self.parse_expression(PREC_COMMA, ExprContext::Normal)?);
            self.expect("]")?;
        } else if self.at("(") {
            args = self.parse_call_arguments()?;
        } else if self.eat("{") {
            while !self.at("}") && !self.tokens.at_eof() {
                args.push(self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?);
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("}")?;
        }

        Ok(self.alloc_expr(
            ExprKind::New {
                ty,
                count,
                args,
                placement,
                is_global,
            },
            tok,
        ))
    }

    fn parse_delete_expression(&mut self, tok: Token, is_global: bool) -> ParseResult<ExprId> {
        let is_array = if self.at("[") {
            self.advance();
            self.expect("]")?;
            true
        } else {
            false
        };
        let operand = self.parse_unary(ExprContext::Normal)?;
        Ok(self.alloc_expr(
            ExprKind::Delete {
                operand,
                is_array,
                is_global,
            },
            tok,
        ))
    }

    /// `(` starts a parenthesized expression, a C-style cast, or a fold.
    fn parse_paren_cast_or_fold(&mut self, ctx: ExprContext) -> ParseResult<ExprId> {
        let tok = self.peek();
        self.expect("(")?;

        // (... op pack)
        if self.at("...") {
            self.advance();
            let op_tok = self.advance();
            let op = fold_operator(self.view(op_tok))
                .ok_or_else(|| self.error_at(ErrorKind::Syntax, "invalid fold operator", op_tok))?;
            let pack = self.advance().value;
            self.expect(")")?;
            return Ok(self.alloc_expr(
                ExprKind::Fold {
                    form: FoldForm::UnaryLeft,
                    op,
                    pack,
                    init: None,
                },
                tok,
            ));
        }

        // C-style cast: type-parse first, commit only when the closing `)`
        // is followed by a legal unary-expression start.
        let save = self.tokens.save_position();
        if let Ok(target) = self.try_parse_type() {
            if self.at(")") {
                self.advance();
                if self.starts_unary_expression() {
                    self.tokens.discard_saved(save);
                    let operand = self.parse_unary(ctx)?;
                    return Ok(self.alloc_expr(
                        ExprKind::Cast {
                            kind: CastKind::CStyle,
                            target,
                            operand,
                        },
                        tok,
                    ));
                }
            }
        }
        self.tokens.restore_position(save);

        let inner = self.parse_expression(PREC_COMMA, ExprContext::Normal)?;

        // (pack op ...) / (pack op ... op init) / (init op ... op pack)
        if self.peek().kind == TokenKind::Operator && self.nth_is(1, "...") {
            let op_tok = self.peek();
            if let Some(op) = fold_operator(self.view(op_tok)) {
                self.advance(); // op
                self.advance(); // ...
                if self.at(")") {
                    self.advance();
                    let pack = self
                        .expr_pack_name(inner)
                        .ok_or_else(|| self.error_at(ErrorKind::Syntax, "expected pack", tok))?;
                    return Ok(self.alloc_expr(
                        ExprKind::Fold {
                            form: FoldForm::UnaryRight,
                            op,
                            pack,
                            init: None,
                        },
                        tok,
                    ));
                }
                // binary fold: second operator must match.
                let second = self.advance();
                if fold_operator(self.view(second)) != Some(op) {
                    return Err(self.error_at(
                        ErrorKind::Syntax,
                        "mismatched operators in binary fold",
                        second,
                    ));
                }
                let trailing = self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?;
                self.expect(")")?;
                return Ok(match self.expr_pack_name(inner) {
                    // (pack op ... op init)
                    Some(pack) => self.alloc_expr(
                        ExprKind::Fold {
                            form: FoldForm::BinaryRight,
                            op,
                            pack,
                            init: Some(trailing),
                        },
                        tok,
                    ),
                    // (init op ... op pack)
                    None => {
                        let pack = self.expr_pack_name(trailing).ok_or_else(|| {
                            self.error_at(ErrorKind::Syntax, "expected pack in fold", tok)
                        })?;
                        self.alloc_expr(
                            ExprKind::Fold {
                                form: FoldForm::BinaryLeft,
                                op,
                                pack,
                                init: Some(inner),
                            },
                            tok,
                        )
                    }
                });
            }
        }

        self.expect(")")?;
        Ok(inner)
    }

    fn expr_pack_name(&self, expr: ExprId) -> Option<Symbol> {
        match &self.arenas().expr(expr).kind {
            ExprKind::TemplateParameterReference { name, is_pack: true } => Some(*name),
            ExprKind::Identifier { name } if self.is_pack_param(*name) => Some(*name),
            _ => None,
        }
    }

    fn starts_unary_expression(&self) -> bool {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Identifier
            | TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::CharLiteral
            | TokenKind::StringLiteral => true,
            TokenKind::Keyword => matches!(
                self.sess.interner.view(tok.value),
                "true" | "false" | "nullptr" | "this" | "sizeof" | "new" | "delete"
                    | "static_cast" | "dynamic_cast" | "const_cast" | "reinterpret_cast"
            ),
            _ => matches!(
                self.sess.interner.view(tok.value),
                "(" | "*" | "&" | "-" | "+" | "!" | "~" | "++" | "--" | "[" | "::"
            ),
        }
    }

    // ---- requires expressions ------------------------------------------

    fn parse_requires_expression(&mut self, tok: Token) -> ParseResult<ExprId> {
        self.expect("requires")?;
        let mut params = Vec::new();
        if self.at("(") {
            let (list, _) = self.parse_parameter_list()?;
            params = list.into_iter().map(|p| (p.name, p.ty)).collect();
        }
        self.expect("{")?;

        // The body parses under SFINAE: unresolved names become soft
        // failures the constraint evaluator reads as `false`.
        let was_sfinae = self.sfinae_mode;
        self.sfinae_mode = true;
        let mut requirements = Vec::new();
        let result = loop {
            if self.at("}") || self.tokens.at_eof() {
                break Ok(());
            }
            if self.eat("typename") {
                let spec = match self.parse_type_specifier() {
                    Ok(s) => s,
                    Err(e) => break Err(e),
                };
                if let Err(e) = self.expect(";") {
                    break Err(e);
                }
                requirements.push(Requirement::Type(spec));
                continue;
            }
            if self.eat("{") {
                let expr = match self.parse_expression(PREC_COMMA, ExprContext::Normal) {
                    Ok(e) => e,
                    Err(e) => break Err(e),
                };
                if let Err(e) = self.expect("}") {
                    break Err(e);
                }
                let constraint = if self.eat("->") {
                    match self.parse_expression(PREC_ASSIGN, ExprContext::Normal) {
                        Ok(c) => Some(c),
                        Err(e) => break Err(e),
                    }
                } else {
                    None
                };
                if let Err(e) = self.expect(";") {
                    break Err(e);
                }
                requirements.push(Requirement::Compound { expr, constraint });
                continue;
            }
            match self.parse_expression(PREC_COMMA, ExprContext::Normal) {
                Ok(expr) => {
                    if let Err(e) = self.expect(";") {
                        break Err(e);
                    }
                    requirements.push(Requirement::Expression(expr));
                }
                Err(e) if e.kind == ErrorKind::Template => {
                    // Requirement not satisfiable: record a poisoned type
                    // requirement and resynchronize to the `;`.
                    let poisoned = self.sess.interner.intern("<unsatisfied>");
                    let mut spec = TypeSpec::builtin(ValueType::Void);
                    spec.kind = TypeSpecKind::Dependent(poisoned);
                    requirements.push(Requirement::Type(spec));
                    while !self.at(";") && !self.at("}") && !self.tokens.at_eof() {
                        self.advance();
                    }
                    let _ = self.eat(";");
                }
                Err(e) => break Err(e),
            }
        };
        self.sfinae_mode = was_sfinae;
        result?;
        self.expect("}")?;

        Ok(self.alloc_expr(
            ExprKind::Requires(Box::new(RequiresClause {
                params,
                requirements,
            })),
            tok,
        ))
    }

    // ---- lambdas -------------------------------------------------------

    fn parse_lambda(&mut self) -> ParseResult<ExprId> {
        let tok = self.expect("[")?;
        let mut scope = LambdaScope {
            captures: Vec::new(),
            default_by_value: false,
            default_by_reference: false,
            is_mutable: false,
            depth_at_entry: self.scopes.depth(),
        };
        while !self.at("]") && !self.tokens.at_eof() {
            if self.eat("=") {
                scope.default_by_value = true;
            } else if self.at("&") && (self.nth_is(1, ",") || self.nth_is(1, "]")) {
                self.advance();
                scope.default_by_reference = true;
            } else if self.eat("&") {
                let name = self.advance().value;
                let ty = self.captured_type(name);
                scope.captures.push(LambdaCapture {
                    name,
                    kind: CaptureKind::ByReference,
                    ty,
                });
            } else if self.eat("*") {
                self.expect("this")?;
                let this = self.sess.interner.intern("this");
                scope.captures.push(LambdaCapture {
                    name: this,
                    kind: CaptureKind::CopyThis,
                    ty: TypeSpec::builtin(ValueType::Void).with_pointer(1),
                });
            } else if self.eat("this") {
                let this = self.sess.interner.intern("this");
                scope.captures.push(LambdaCapture {
                    name: this,
                    kind: CaptureKind::This,
                    ty: TypeSpec::builtin(ValueType::Void).with_pointer(1),
                });
            } else {
                let name = self.advance().value;
                let ty = self.captured_type(name);
                scope.captures.push(LambdaCapture {
                    name,
                    kind: CaptureKind::ByValue,
                    ty,
                });
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("]")?;

        let (params, _) = if self.at("(") {
            self.parse_parameter_list()?
        } else {
            (Vec::new(), false)
        };
        let is_mutable = self.eat("mutable");
        let return_type = if self.eat("->") {
            Some(self.parse_type_specifier()?)
        } else {
            None
        };

        // Parse the body with the lambda scope active so free names record
        // themselves as captures under a default capture.
        self.lambda_stack.push(LambdaScope {
            is_mutable,
            ..scope
        });
        self.scopes.push_scope();
        for p in &params {
            let d = self.sess.arenas.alloc_decl(cinder_ast::Decl::new(
                DeclKind::Variable(VariableDecl {
                    name: p.name,
                    ty: p.ty.clone(),
                    init: None,
                    storage: StorageClass::Local,
                    namespace: NamespaceHandle::GLOBAL,
                    mangled_name: None,
                }),
                tok,
            ));
            self.scopes.declare(p.name, d);
        }
        let body = self.parse_block()?;
        self.scopes.pop_scope();
        let scope = self.lambda_stack.pop().expect("lambda scope pushed above");

        // Synthesize the closure struct: one field per capture.
        let closure_name = self.fresh_lambda_name();
        let closure_type = self
            .sess
            .types
            .get_or_create(closure_name, TypeKind::Struct);
        let mut info = StructTypeInfo::default();
        for cap in &scope.captures {
            let member = self.struct_member_from_spec(
                cap.name,
                &capture_field_spec(cap),
                cinder_ast::AccessSpecifier::Public,
                None,
            )?;
            info.members.push(member);
        }
        self.sess.types.get_mut(closure_type).struct_info = Some(info);
        self.sess.types.finish_layout(closure_type).map_err(|_| {
            self.error_at(ErrorKind::Type, "cannot lay out closure type", tok)
        })?;

        // operator() on the closure, plus a static __invoke thunk when the
        // lambda captures nothing (so unary + can decay it).
        let op_name = self.sess.interner.intern("operator()");
        let op_symbol = self.sess.interner.intern("()");
        let closure_text = self.sess.interner.view(closure_name).to_string();
        let param_specs: Vec<TypeSpec> = params.iter().map(|p| p.ty.clone()).collect();
        let ret = return_type
            .clone()
            .unwrap_or_else(|| TypeSpec::builtin(ValueType::Int));
        let mangled = mangle_function(
            self.sess.context.mangling,
            &FunctionSignature {
                name: "operator()",
                namespace: &[],
                class_name: Some(&closure_text),
                is_const_member: !is_mutable,
                is_static_member: false,
                params: &param_specs,
                return_type: &ret,
                template_params: &[],
                template_args: None,
                linkage: Linkage::CPlusPlus,
                is_variadic: false,
                operator_symbol: Some("()"),
            },
            &self.sess.types,
            &self.sess.interner,
        );
        let mangled_sym = self.sess.interner.intern(&mangled);
        let call_operator = self.sess.arenas.alloc_decl(cinder_ast::Decl::new(
            DeclKind::Function(FunctionDecl {
                name: op_name,
                params: params
                    .iter()
                    .map(|p| ParamDecl {
                        name: p.name,
                        ty: p.ty.clone(),
                        default: None,
                        from_pack: false,
                    })
                    .collect(),
                return_type: ret.clone(),
                body: Some(body),
                linkage: Linkage::CPlusPlus,
                is_variadic: false,
                namespace: NamespaceHandle::GLOBAL,
                member_of: Some(closure_type),
                is_static: false,
                is_const: !is_mutable,
                operator_symbol: Some(op_symbol),
                mangled_name: Some(mangled_sym),
            }),
            tok,
        ));
        if let Some(struct_info) = self.sess.types.get_mut(closure_type).struct_info.as_mut() {
            struct_info.member_functions.push(MemberFunction {
                name: op_name,
                decl: call_operator,
                is_static: false,
                is_virtual: false,
                is_const: !is_mutable,
                is_operator_overload: true,
                operator_symbol: Some(op_symbol),
                mangled_name: Some(mangled_sym),
            });
            if scope.captures.is_empty() {
                let invoke = self.sess.interner.intern("__invoke");
                struct_info.member_functions.push(MemberFunction {
                    name: invoke,
                    decl: call_operator,
                    is_static: true,
                    is_virtual: false,
                    is_const: false,
                    is_operator_overload: false,
                    operator_symbol: None,
                    mangled_name: Some(mangled_sym),
                });
            }
        }

        Ok(self.alloc_expr(
            ExprKind::Lambda(Box::new(LambdaInfo {
                captures: scope.captures,
                params: params.into_iter().map(|p| (p.name, p.ty)).collect(),
                return_type,
                is_mutable,
                body,
                closure_type,
                call_operator,
            })),
            tok,
        ))
    }

    fn captured_type(&mut self, name: Symbol) -> TypeSpec {
        self.scopes
            .lookup(name)
            .and_then(|d| self.decl_spec(d))
            .unwrap_or_else(|| TypeSpec::builtin(ValueType::Int))
    }

    // ---- the identifier decision tree ----------------------------------

    pub(crate) fn parse_identifier_expression(&mut self, ctx: ExprContext) -> ParseResult<ExprId> {
        let tok = self.advance();
        let name = tok.value;
        let text = self.view(tok).to_string();

        // 1. Compiler-synthesized function-name literals.
        if text == "__func__" {
            return Ok(self.alloc_expr(ExprKind::FunctionNameLiteral { pretty: false }, tok));
        }
        if text == "__PRETTY_FUNCTION__" {
            return Ok(self.alloc_expr(ExprKind::FunctionNameLiteral { pretty: true }, tok));
        }

        // 2. Type-trait intrinsics.
        if let Some(trait_kind) = type_trait_from_name(&text) {
            if self.at("(") {
                self.advance();
                let mut type_args = vec![self.parse_type_specifier()?];
                while self.eat(",") {
                    type_args.push(self.parse_type_specifier()?);
                }
                self.expect(")")?;
                return Ok(self.alloc_expr(
                    ExprKind::TypeTraitExpr {
                        trait_kind,
                        type_args,
                    },
                    tok,
                ));
            }
        }

        // offsetof and the __builtin_* family.
        if (text == "offsetof" || text == "__builtin_offsetof") && self.at("(") {
            self.advance();
            let spec = self.parse_type_specifier()?;
            let idx = match spec.kind {
                TypeSpecKind::Indexed(idx) => idx,
                _ => {
                    return Err(self.error_at(ErrorKind::Type, "offsetof needs a class type", tok))
                }
            };
            self.expect(",")?;
            let mut members = vec![self.advance().value];
            while self.eat(".") {
                members.push(self.advance().value);
            }
            self.expect(")")?;
            return Ok(self.alloc_expr(
                ExprKind::Offsetof {
                    type_index: idx,
                    members,
                },
                tok,
            ));
        }
        if text == "__builtin_addressof" && self.at("(") {
            self.advance();
            let operand = self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?;
            self.expect(")")?;
            return Ok(self.alloc_expr(
                ExprKind::Unary {
                    op: UnaryOp::AddrOf,
                    operand,
                    is_builtin_addressof: true,
                },
                tok,
            ));
        }
        if text == "__builtin_va_arg" && self.at("(") {
            self.advance();
            let va = self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?;
            self.expect(",")?;
            let ty = self.parse_type_specifier()?;
            self.expect(")")?;
            return Ok(self.alloc_expr(ExprKind::VaArg { va, ty }, tok));
        }
        if text.starts_with("__builtin_") && self.at("(") {
            return self.builtin_call(tok);
        }
        if text == "__alignof__" && self.at("(") {
            self.advance();
            let spec = self.parse_type_specifier()?;
            self.expect(")")?;
            return Ok(self.alloc_expr(ExprKind::Alignof(spec), tok));
        }

        // 3. Template parameter reference, possibly constructed.
        if let Some(&is_pack) = self.template_param_names.get(&name) {
            if self.at("(") {
                let args = self.parse_call_arguments()?;
                let ty = TypeSpec::template_param(name);
                return Ok(self.alloc_expr(ExprKind::TypeConstruction { ty, args }, tok));
            }
            if self.at("{") {
                self.advance();
                let mut args = Vec::new();
                while !self.at("}") && !self.tokens.at_eof() {
                    args.push(self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?);
                    if !self.eat(",") {
                        break;
                    }
                }
                self.expect("}")?;
                let ty = TypeSpec::template_param(name);
                return Ok(self.alloc_expr(ExprKind::TypeConstruction { ty, args }, tok));
            }
            return Ok(self.alloc_expr(
                ExprKind::TemplateParameterReference { name, is_pack },
                tok,
            ));
        }

        // 4. Template-id: only attempt `<` as an argument list when the
        // name is known to be a template; otherwise it compares.
        if self.at("<") && self.sess.templates.is_template(name) {
            let save = self.tokens.save_position();
            match self.parse_template_argument_list() {
                Ok(args) => {
                    self.tokens.discard_saved(save);
                    return self.template_id_expression(tok, args, ctx);
                }
                Err(_) => {
                    self.tokens.restore_position(save);
                }
            }
        }

        // 5. Known type name: functional cast / constructor call, or a
        // qualified path into the type.
        if let Some(idx) = self.sess.types.lookup(name) {
            let resolved = self.sess.types.resolve_alias(idx);
            if self.at("(") || self.at("{") {
                let braced = self.at("{");
                let spec = match self.sess.types.get(resolved).kind {
                    TypeKind::Builtin(vt) => TypeSpec::builtin(vt),
                    _ => TypeSpec::indexed(resolved),
                };
                let args = if braced {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.at("}") && !self.tokens.at_eof() {
                        args.push(self.parse_expression(PREC_ASSIGN, ExprContext::Normal)?);
                        if !self.eat(",") {
                            break;
                        }
                    }
                    self.expect("}")?;
                    args
                } else {
                    self.parse_call_arguments()?
                };
                if braced {
                    if let TypeSpecKind::Indexed(sidx) = spec.kind {
                        if self.sess.types.struct_info(sidx).is_some() {
                            return Ok(self.alloc_expr(
                                ExprKind::InitializerListConstruction {
                                    type_index: sidx,
                                    args,
                                },
                                tok,
                            ));
                        }
                    }
                }
                return self.construction_expr(&spec, args, tok);
            }
            if self.at("::") {
                self.advance();
                return self.qualified_into_type(resolved, tok, ctx);
            }
        }

        // 6. Qualified path through namespaces.
        if self.at("::") {
            self.advance();
            return self.parse_qualified_identifier(tok, false, ctx);
        }

        // 7. Lambda captures: names bound outside the lambda body register
        // themselves under the active default capture.
        if !self.lambda_stack.is_empty() {
            if let Some((_, depth)) = self.scopes.lookup_with_depth(name) {
                let entry_depth = self.lambda_stack.last().map(|l| l.depth_at_entry);
                if let Some(entry) = entry_depth {
                    if depth < entry && depth > 0 {
                        self.note_capture(name);
                    }
                }
            }
        }

        // 8/9. Members and statics of the enclosing struct.
        if self.scopes.is_local(name) {
            // Locals shadow members; fall through to the plain lookup.
        } else if let Some(owner) = self.current_struct {
            let is_member = self
                .sess
                .types
                .struct_info(owner)
                .map(|i| i.member(name).is_some())
                .unwrap_or(false);
            if is_member {
                let this = self.alloc_expr(ExprKind::This, tok);
                if self.at("(") {
                    let args = self.parse_call_arguments()?;
                    return self.alloc_member_call(this, name, args, tok);
                }
                return Ok(self.alloc_expr(
                    ExprKind::MemberAccess {
                        object: this,
                        member: name,
                        is_arrow: true,
                    },
                    tok,
                ));
            }
            let is_method = self
                .sess
                .types
                .struct_info(owner)
                .map(|i| i.member_function(name).is_some())
                .unwrap_or(false);
            if is_method && self.at("(") {
                let this = self.alloc_expr(ExprKind::This, tok);
                let args = self.parse_call_arguments()?;
                return self.alloc_member_call(this, name, args, tok);
            }
            let is_static_member = self
                .sess
                .types
                .struct_info(owner)
                .map(|i| i.static_member(name).is_some())
                .unwrap_or(false);
            if is_static_member {
                return Ok(self.alloc_expr(
                    ExprKind::StaticMemberAccess {
                        type_index: owner,
                        member: name,
                    },
                    tok,
                ));
            }
        }

        // 9. Scoped lookup cascade: locals → globals → using declarations
        // → namespace chain.
        let found = self
            .scopes
            .lookup(name)
            .or_else(|| self.scopes.lookup_using_declaration(name))
            .or_else(|| {
                self.scopes
                    .visible_using_directives()
                    .into_iter()
                    .find_map(|ns| self.sess.namespaces.lookup_in(ns, name))
            })
            .or_else(|| {
                self.sess
                    .namespaces
                    .lookup_via_declarations(self.current_namespace, name)
            })
            .or_else(|| {
                self.sess
                    .namespaces
                    .lookup_from(self.current_namespace, name)
            });

        if let Some(decl) = found {
            if self.at("(") {
                let args = self.parse_call_arguments()?;
                return self.resolved_call(tok, Some(decl), args, None);
            }
            return Ok(self.alloc_expr(ExprKind::Identifier { name }, tok));
        }

        // Unscoped enumerators leak into the enclosing scope.
        if let Some(value) = self.lookup_enumerator(name) {
            return Ok(self.alloc_expr(
                ExprKind::IntLiteral {
                    value: value as u64,
                    ty: ValueType::Int,
                },
                tok,
            ));
        }

        // Function templates called without explicit arguments.
        if self.sess.templates.is_template(name) && self.at("(") {
            let args = self.parse_call_arguments()?;
            return self.resolved_call(tok, None, args, None);
        }

        // 10. Unknown name followed by `(`: forward declaration.
        if self.at("(") {
            let args = self.parse_call_arguments()?;
            let placeholder = self.sess.arenas.alloc_decl(cinder_ast::Decl::new(
                DeclKind::Placeholder {
                    name,
                    ty: TypeSpec::builtin(ValueType::Int),
                },
                tok,
            ));
            self.scopes.declare_global(name, placeholder);
            return Ok(self.alloc_expr(
                ExprKind::FunctionCall {
                    callee: placeholder,
                    args,
                    template_args: None,
                    mangled_name: Some(name),
                },
                tok,
            ));
        }

        // Dependent names survive template bodies for later substitution.
        if self.parsing_template_body {
            return Ok(self.alloc_expr(ExprKind::Identifier { name }, tok));
        }

        Err(self.resolution_error(
            format!("use of undeclared identifier '{text}'"),
            tok,
        ))
    }

    fn note_capture(&mut self, name: Symbol) {
        let ty = self.captured_type(name);
        let lambda = self.lambda_stack.last_mut().expect("active lambda");
        if lambda.captures.iter().any(|c| c.name == name) {
            return;
        }
        let kind = if lambda.default_by_reference {
            CaptureKind::ByReference
        } else {
            CaptureKind::ByValue
        };
        lambda.captures.push(LambdaCapture { name, kind, ty });
    }

    fn alloc_member_call(
        &mut self,
        this: ExprId,
        method: Symbol,
        args: Vec<ExprId>,
        tok: Token,
    ) -> ParseResult<ExprId> {
        let mangled = self.member_call_mangled(this, method);
        Ok(self.alloc_expr(
            ExprKind::MemberFunctionCall {
                object: this,
                method,
                args,
                is_arrow: true,
                mangled_name: mangled,
            },
            tok,
        ))
    }

    fn lookup_enumerator(&self, name: Symbol) -> Option<i64> {
        // Nested enums of the enclosing struct take precedence.
        if let Some(owner) = self.current_struct {
            if let Some(info) = self.sess.types.struct_info(owner) {
                for &nested in &info.nested_enums {
                    if let Some(e) = self.sess.types.enum_info(nested) {
                        if let Some(v) = e.enumerator(name) {
                            return Some(v);
                        }
                    }
                }
            }
        }
        for i in 1..self.sess.types.len() {
            if let Some(info) = self.sess.types.enum_info(TypeIndex(i as u32)) {
                if !info.is_scoped {
                    if let Some(v) = info.enumerator(name) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    fn builtin_call(&mut self, tok: Token) -> ParseResult<ExprId> {
        let name = tok.value;
        let args = self.parse_call_arguments()?;
        let placeholder = self.sess.arenas.alloc_decl(cinder_ast::Decl::new(
            DeclKind::Placeholder {
                name,
                ty: TypeSpec::builtin(ValueType::Int),
            },
            tok,
        ));
        Ok(self.alloc_expr(
            ExprKind::FunctionCall {
                callee: placeholder,
                args,
                template_args: None,
                mangled_name: Some(name),
            },
            tok,
        ))
    }

    // ---- template arguments and template-id expressions ----------------

    /// `<arg, ...>` with the closing `>`. Errors leave the caller to
    /// restore; success consumes the whole list.
    pub(crate) fn parse_template_argument_list(&mut self) -> ParseResult<Vec<TemplateArg>> {
        self.expect("<")?;
        let mut args = Vec::new();
        while !self.at(">") && !self.tokens.at_eof() {
            // A type argument if the tokens parse as a type followed by a
            // list delimiter; otherwise a constant expression.
            let save = self.tokens.save_position();
            let mut parsed = None;
            if let Ok(spec) = self.try_parse_type() {
                if self.at(">") || self.at(",") {
                    parsed = Some(TemplateArg::Type(spec));
                }
            }
            match parsed {
                Some(arg) => {
                    self.tokens.discard_saved(save);
                    args.push(arg);
                }
                None => {
                    self.tokens.restore_position(save);
                    let expr =
                        self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::TemplateArgument)?;
                    let mut evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
                    self.bind_constants(&mut evaluator);
                    let value = evaluator.evaluate(expr).map_err(|_| {
                        self.error_here(ErrorKind::Template, "non-type argument is not constant")
                    })?;
                    args.push(TemplateArg::Value {
                        value: value.as_i64(),
                        ty: ValueType::Int,
                    });
                }
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">")?;
        Ok(args)
    }

    /// An identifier followed by a successfully parsed argument list.
    fn template_id_expression(
        &mut self,
        name_tok: Token,
        args: Vec<TemplateArg>,
        ctx: ExprContext,
    ) -> ParseResult<ExprId> {
        let name = name_tok.value;
        let def = self
            .sess
            .templates
            .definition(name)
            .ok_or_else(|| self.resolution_error("unknown template", name_tok))?;

        match self.sess.arenas.decl(def).kind.clone() {
            DeclKind::Concept { .. } => Ok(self.alloc_expr(
                ExprKind::ConceptApplication {
                    concept_decl: def,
                    args,
                },
                name_tok,
            )),

            DeclKind::TemplateClass { .. } => {
                let dependent = args.iter().any(|a| match a {
                    TemplateArg::Type(s) => s.is_dependent(),
                    _ => false,
                });
                if dependent {
                    let mut ty = TypeSpec::builtin(ValueType::Void);
                    ty.kind = TypeSpecKind::TemplateId {
                        template: name,
                        args,
                    };
                    if self.at("(") {
                        let call_args = self.parse_call_arguments()?;
                        return Ok(self.alloc_expr(
                            ExprKind::TypeConstruction { ty, args: call_args },
                            name_tok,
                        ));
                    }
                    return Err(self.resolution_error("dependent template-id", name_tok));
                }
                let idx = self
                    .sess
                    .engine()
                    .try_instantiate_class_template(name, &args)
                    .ok_or_else(|| {
                        self.resolution_error("class template instantiation failed", name_tok)
                    })?;
                if self.at("(") {
                    let call_args = self.parse_call_arguments()?;
                    let _ = self.sess.engine().ensure_layout(idx);
                    return Ok(self.alloc_expr(
                        ExprKind::ConstructorCall {
                            type_index: idx,
                            args: call_args,
                        },
                        name_tok,
                    ));
                }
                if self.eat("::") {
                    return self.qualified_into_type(idx, name_tok, ctx);
                }
                Err(self.error_at(
                    ErrorKind::Syntax,
                    "expected `(` or `::` after template-id",
                    name_tok,
                ))
            }

            DeclKind::TemplateFunction { .. } => {
                if !self.at("(") {
                    return Err(self.error_at(
                        ErrorKind::Syntax,
                        "expected call after function template-id",
                        name_tok,
                    ));
                }
                let call_args = self.parse_call_arguments()?;
                self.resolved_call(name_tok, None, call_args, Some(args))
            }

            DeclKind::TemplateVariable { .. } => {
                let decl = self
                    .sess
                    .engine()
                    .try_instantiate_variable_template(name, &args)
                    .ok_or_else(|| {
                        self.resolution_error("variable template instantiation failed", name_tok)
                    })?;
                let inst_name = self.sess.arenas.decl(decl).name();
                self.scopes.declare_global(inst_name, decl);
                Ok(self.alloc_expr(ExprKind::Identifier { name: inst_name }, name_tok))
            }

            DeclKind::TemplateAlias { .. } => {
                let spec = self
                    .sess
                    .engine()
                    .resolve_alias_template(name, &args)
                    .ok_or_else(|| self.resolution_error("alias substitution failed", name_tok))?;
                if self.at("(") {
                    let call_args = self.parse_call_arguments()?;
                    return self.construction_expr(&spec, call_args, name_tok);
                }
                Err(self.error_at(
                    ErrorKind::Syntax,
                    "expected `(` after alias template-id",
                    name_tok,
                ))
            }

            _ => Err(self.resolution_error("not a template", name_tok)),
        }
    }

    // ---- qualified identifiers -----------------------------------------

    /// `X::Y::Z` where the first segment has already been consumed. Each
    /// segment may name a namespace, struct, enum, or template; resolution
    /// walks left to right.
    pub(crate) fn parse_qualified_identifier(
        &mut self,
        first: Token,
        absolute: bool,
        ctx: ExprContext,
    ) -> ParseResult<ExprId> {
        // Type first: scoped enums and struct statics.
        if !absolute {
            if let Some(idx) = self.sess.types.lookup(first.value) {
                return self.qualified_into_type(self.sess.types.resolve_alias(idx), first, ctx);
            }
        }

        // Namespace walk.
        let mut ns = if absolute {
            NamespaceHandle::GLOBAL
        } else {
            self.sess
                .namespaces
                .resolve_path(self.current_namespace, false, &[first.value])
                .ok_or_else(|| self.resolution_error("undefined namespace", first))?
        };
        if absolute {
            // The consumed token was the first segment after `::`.
            match self.sess.namespaces.child(NamespaceHandle::GLOBAL, first.value) {
                Some(h) => ns = h,
                None => {
                    // `::name` directly names a global.
                    return self.qualified_terminal(NamespaceHandle::GLOBAL, first, ctx);
                }
            }
            if !self.at("::") {
                return Err(self.error_at(ErrorKind::Syntax, "expected `::`", first));
            }
        }

        loop {
            self.expect("::")?;
            let seg = self.advance();
            // Another namespace level?
            if self.at("::") {
                if let Some(child) = self.sess.namespaces.child(ns, seg.value) {
                    ns = child;
                    continue;
                }
                // A type nested in the namespace.
                if let Some(idx) = self.sess.types.lookup(seg.value) {
                    self.expect("::")?;
                    return self.qualified_into_type(self.sess.types.resolve_alias(idx), seg, ctx);
                }
                return Err(self.resolution_error("undefined namespace", seg));
            }
            return self.qualified_terminal_with(ns, seg, ctx);
        }
    }

    fn qualified_terminal(
        &mut self,
        ns: NamespaceHandle,
        name_tok: Token,
        ctx: ExprContext,
    ) -> ParseResult<ExprId> {
        self.qualified_terminal_with(ns, name_tok, ctx)
    }

    fn qualified_terminal_with(
        &mut self,
        ns: NamespaceHandle,
        name_tok: Token,
        _ctx: ExprContext,
    ) -> ParseResult<ExprId> {
        let name = name_tok.value;
        if self.at("(") {
            let decl = self.sess.namespaces.lookup_in(ns, name);
            let args = self.parse_call_arguments()?;
            return self.resolved_call(name_tok, decl, args, None);
        }
        if self.sess.namespaces.lookup_in(ns, name).is_some() {
            return Ok(self.alloc_expr(
                ExprKind::QualifiedIdentifier {
                    namespace: ns,
                    name,
                },
                name_tok,
            ));
        }
        // A type in this namespace: `ns::Enum::A`, `ns::S::static_m`.
        if let Some(idx) = self.sess.types.lookup(name) {
            if self.eat("::") {
                return self.qualified_into_type(
                    self.sess.types.resolve_alias(idx),
                    name_tok,
                    _ctx,
                );
            }
        }
        Err(self.resolution_error(
            format!(
                "no member named '{}' in this namespace",
                self.sess.interner.view(name)
            ),
            name_tok,
        ))
    }

    /// Path into a struct or enum: enumerators fold to constants, statics
    /// and member names become qualified member references.
    pub(crate) fn qualified_into_type(
        &mut self,
        idx: TypeIndex,
        type_tok: Token,
        _ctx: ExprContext,
    ) -> ParseResult<ExprId> {
        let member_tok = self.advance();
        let member = member_tok.value;

        if let Some(info) = self.sess.types.enum_info(idx) {
            if let Some(value) = info.enumerator(member) {
                let underlying = info.underlying;
                return Ok(self.alloc_expr(
                    ExprKind::IntLiteral {
                        value: value as u64,
                        ty: underlying,
                    },
                    member_tok,
                ));
            }
            return Err(self.resolution_error("no such enumerator", member_tok));
        }

        // Nested enum of the struct: S::Color::Red or S::Red.
        if let Some(info) = self.sess.types.struct_info(idx) {
            for &nested in &info.nested_enums {
                if self.sess.types.get(nested).name == member {
                    self.expect("::")?;
                    return self.qualified_into_type(nested, member_tok, _ctx);
                }
                if let Some(e) = self.sess.types.enum_info(nested) {
                    if let Some(value) = e.enumerator(member) {
                        let underlying = e.underlying;
                        return Ok(self.alloc_expr(
                            ExprKind::IntLiteral {
                                value: value as u64,
                                ty: underlying,
                            },
                            member_tok,
                        ));
                    }
                }
            }
        }

        // Static member function call: S::f(args).
        if self.at("(") {
            let is_static_fn = self
                .sess
                .types
                .struct_info(idx)
                .and_then(|i| i.member_function(member))
                .map(|f| f.is_static)
                .unwrap_or(false);
            if is_static_fn {
                let mangled = self
                    .sess
                    .types
                    .struct_info(idx)
                    .and_then(|i| i.member_function(member))
                    .and_then(|f| f.mangled_name);
                let decl = self
                    .sess
                    .types
                    .struct_info(idx)
                    .and_then(|i| i.member_function(member))
                    .map(|f| f.decl)
                    .ok_or_else(|| self.resolution_error("no such member", member_tok))?;
                let args = self.parse_call_arguments()?;
                return Ok(self.alloc_expr(
                    ExprKind::FunctionCall {
                        callee: decl,
                        args,
                        template_args: None,
                        mangled_name: mangled,
                    },
                    member_tok,
                ));
            }
        }

        let known = self
            .sess
            .types
            .struct_info(idx)
            .map(|i| {
                i.static_member(member).is_some()
                    || i.member(member).is_some()
                    || i.member_function(member).is_some()
            })
            .unwrap_or(false);
        if known {
            return Ok(self.alloc_expr(
                ExprKind::StaticMemberAccess {
                    type_index: idx,
                    member,
                },
                member_tok,
            ));
        }
        let _ = type_tok;
        Err(self.resolution_error("no such member", member_tok))
    }

    // ---- resolved calls ------------------------------------------------

    /// Build a `FunctionCall` for a named callee: collect the candidate
    /// set (declarations plus an instantiated template when one applies),
    /// rank by conversion sequences, and stamp the mangled name.
    pub(crate) fn resolved_call(
        &mut self,
        name_tok: Token,
        direct: Option<cinder_ast::DeclId>,
        args: Vec<ExprId>,
        explicit_template_args: Option<Vec<TemplateArg>>,
    ) -> ParseResult<ExprId> {
        let name = name_tok.value;
        let arg_types: Vec<TypeSpec> = args
            .iter()
            .map(|&a| {
                self.infer_type(a, true)
                    .unwrap_or_else(|| TypeSpec::builtin(ValueType::Int))
            })
            .collect();

        let mut candidates: Vec<cinder_ast::DeclId> = Vec::new();
        if let Some(set) = self.functions.get(&name) {
            candidates.extend(set.iter().copied());
        }
        if candidates.is_empty() {
            if let Some(d) = direct {
                candidates.push(d);
            }
        }
        // Template candidate, instantiated on demand.
        if self.sess.templates.is_template(name) {
            let explicit = explicit_template_args.clone().unwrap_or_default();
            if let Some(d) = self
                .sess
                .engine()
                .instantiate_function(name, &explicit, &arg_types)
            {
                candidates.push(d);
            }
        }

        let chosen = match candidates.len() {
            0 => {
                return Err(self.resolution_error(
                    format!(
                        "no matching function for call to '{}'",
                        self.sess.interner.view(name)
                    ),
                    name_tok,
                ))
            }
            1 => candidates[0],
            _ => resolve_overload(
                &self.sess.arenas,
                &self.sess.types,
                &candidates,
                &arg_types,
                name_tok,
            )
            .map_err(|e| {
                self.error_at(ErrorKind::Resolution, e.to_string(), name_tok)
            })?,
        };

        let mangled = match &self.sess.arenas.decl(chosen).kind {
            DeclKind::Function(f) => f.mangled_name,
            DeclKind::Placeholder { name, .. } => Some(*name),
            _ => None,
        };
        Ok(self.alloc_expr(
            ExprKind::FunctionCall {
                callee: chosen,
                args,
                template_args: explicit_template_args,
                mangled_name: mangled,
            },
            name_tok,
        ))
    }
}

/// How a capture is stored in the closure struct: by-value captures embed
/// the value, by-reference captures (and `this`) store a pointer.
fn capture_field_spec(cap: &LambdaCapture) -> TypeSpec {
    let mut ty = cap.ty.clone();
    ty.is_reference = false;
    ty.is_rvalue_reference = false;
    match cap.kind {
        CaptureKind::ByReference | CaptureKind::This => {
            ty.pointer_depth += 1;
        }
        CaptureKind::CopyThis | CaptureKind::ByValue => {}
    }
    ty
}

fn encoding_from_prefix(prefix: &str) -> CharEncoding {
    match prefix {
        "L" => CharEncoding::Wide,
        "u8" => CharEncoding::Utf8,
        "u" => CharEncoding::Utf16,
        "U" => CharEncoding::Utf32,
        _ => CharEncoding::Plain,
    }
}

fn fold_operator(text: &str) -> Option<cinder_ast::BinaryOp> {
    use cinder_ast::BinaryOp::*;
    Some(match text {
        "+" => Add,
        "-" => Sub,
        "*" => Mul,
        "/" => Div,
        "%" => Rem,
        "&" => BitAnd,
        "|" => BitOr,
        "^" => BitXor,
        "<<" => Shl,
        ">>" => Shr,
        "&&" => LogicalAnd,
        "||" => LogicalOr,
        "," => Comma,
        _ => return None,
    })
}

fn type_trait_from_name(name: &str) -> Option<TypeTrait> {
    Some(match name {
        "__is_integral" => TypeTrait::IsIntegral,
        "__is_signed" => TypeTrait::IsSigned,
        "__is_unsigned" => TypeTrait::IsUnsigned,
        "__is_floating_point" => TypeTrait::IsFloatingPoint,
        "__is_arithmetic" => TypeTrait::IsArithmetic,
        "__is_scalar" => TypeTrait::IsScalar,
        "__is_pointer" => TypeTrait::IsPointer,
        "__is_reference" => TypeTrait::IsReference,
        "__is_lvalue_reference" => TypeTrait::IsLvalueReference,
        "__is_rvalue_reference" => TypeTrait::IsRvalueReference,
        "__is_enum" => TypeTrait::IsEnum,
        "__is_class" => TypeTrait::IsClass,
        "__is_empty" => TypeTrait::IsEmpty,
        "__is_polymorphic" => TypeTrait::IsPolymorphic,
        "__is_trivially_copyable" => TypeTrait::IsTriviallyCopyable,
        "__is_trivially_destructible" => TypeTrait::IsTriviallyDestructible,
        "__is_same" | "__is_same_as" => TypeTrait::IsSame,
        "__is_base_of" => TypeTrait::IsBaseOf,
        "__is_convertible" | "__is_convertible_to" => TypeTrait::IsConvertible,
        "__has_unique_object_representations" => TypeTrait::HasUniqueObjectRepresentations,
        _ => return None,
    })
}
