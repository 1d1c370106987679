//! Type-specifier parsing and expression type inference.
//!
//! `decltype` follows the C++20 rules: an unparenthesized id-expression
//! yields the declared type; any other lvalue expression yields `T&`.

use crate::expr::PREC_COMMA;
use crate::parser::{ExprContext, ParseResult, Parser};
use cinder_ast::{
    BinaryOp, DeclKind, ExprId, ExprKind, SizeofArg, TemplateArg, TypeKind, TypeSpec, TypeSpecKind,
    UnaryOp, ValueType,
};
use cinder_common::{ErrorKind, TokenKind};

impl Parser<'_> {
    /// Attempt a type parse; the caller owns save/restore around it.
    pub(crate) fn try_parse_type(&mut self) -> ParseResult<TypeSpec> {
        match self.peek().kind {
            TokenKind::Identifier | TokenKind::Keyword => self.parse_type_specifier(),
            _ => Err(self.error_here(ErrorKind::Syntax, "not a type")),
        }
    }

    /// Parse a full type: cv, base, template arguments, declarator suffix.
    pub(crate) fn parse_type_specifier(&mut self) -> ParseResult<TypeSpec> {
        let mut is_const = self.eat("const");
        let tok = self.peek();
        let mut spec = self.parse_base_type()?;
        // East const: `int const`.
        is_const |= self.eat("const");

        loop {
            if self.eat("*") {
                spec.pointer_depth += 1;
                let _ = self.eat("const");
                continue;
            }
            if self.at("&&") {
                self.advance();
                spec.is_rvalue_reference = true;
                break;
            }
            if self.at("&") && !self.nth_is(1, "&") {
                self.advance();
                spec.is_reference = true;
                break;
            }
            break;
        }
        spec.is_const |= is_const;
        if spec.value_type() == ValueType::Void
            && spec.pointer_depth == 0
            && !matches!(
                spec.kind,
                TypeSpecKind::Builtin(ValueType::Void)
                    | TypeSpecKind::TemplateParam(_)
                    | TypeSpecKind::Pack(_)
                    | TypeSpecKind::Dependent(_)
                    | TypeSpecKind::TemplateId { .. }
            )
        {
            return Err(self.error_at(ErrorKind::Syntax, "not a type", tok));
        }
        Ok(spec)
    }

    fn parse_base_type(&mut self) -> ParseResult<TypeSpec> {
        let tok = self.peek();
        let text = self.view(tok).to_string();

        // Multi-word builtin spellings fold to one ValueType, so `signed
        // int` and `int` canonicalize identically by construction.
        match text.as_str() {
            "void" => {
                self.advance();
                return Ok(TypeSpec::builtin(ValueType::Void));
            }
            "bool" => {
                self.advance();
                return Ok(TypeSpec::builtin(ValueType::Bool));
            }
            "float" => {
                self.advance();
                return Ok(TypeSpec::builtin(ValueType::Float));
            }
            "double" => {
                self.advance();
                return Ok(TypeSpec::builtin(ValueType::Double));
            }
            "signed" | "unsigned" => {
                let unsigned = text == "unsigned";
                self.advance();
                let base = self.parse_int_spelling(ValueType::Int);
                return Ok(TypeSpec::builtin(if unsigned {
                    base.unsigned_counterpart()
                } else {
                    base
                }));
            }
            "char" | "short" | "int" | "long" => {
                let base = self.parse_int_spelling(ValueType::Int);
                return Ok(TypeSpec::builtin(base));
            }
            "wchar_t" => {
                self.advance();
                return Ok(TypeSpec::builtin(ValueType::UnsignedShort));
            }
            "decltype" => {
                self.advance();
                self.expect("(")?;
                let inner = self.parse_expression(PREC_COMMA, ExprContext::Decltype)?;
                self.expect(")")?;
                let parenthesized = matches!(
                    self.arenas().expr(inner).kind,
                    ExprKind::Binary { .. } | ExprKind::Unary { .. } | ExprKind::Ternary { .. }
                ) || self.expr_is_parenthesized(inner);
                let declared = !parenthesized
                    && matches!(
                        self.arenas().expr(inner).kind,
                        ExprKind::Identifier { .. }
                            | ExprKind::QualifiedIdentifier { .. }
                            | ExprKind::MemberAccess { .. }
                    );
                let spec = self
                    .infer_type(inner, !declared)
                    .ok_or_else(|| self.error_at(ErrorKind::Type, "cannot deduce decltype", tok))?;
                return Ok(spec);
            }
            "typename" => {
                // typename T::name — dependent until instantiation.
                self.advance();
                let mut path = String::new();
                loop {
                    let seg = self.advance();
                    path.push_str(self.view(seg));
                    if self.eat("::") {
                        path.push_str("::");
                    } else {
                        break;
                    }
                }
                let sym = self.sess.interner.intern(&path);
                let mut spec = TypeSpec::builtin(ValueType::Void);
                spec.kind = TypeSpecKind::Dependent(sym);
                return Ok(spec);
            }
            "auto" => {
                return Err(self.error_at(ErrorKind::Syntax, "auto is not supported here", tok));
            }
            "struct" | "class" | "enum" => {
                // Elaborated specifier: `struct S x`.
                self.advance();
            }
            _ => {}
        }

        if self.peek().kind != TokenKind::Identifier {
            return Err(self.error_here(ErrorKind::Syntax, "not a type"));
        }
        let name_tok = self.advance();

        // Template parameter used as a type.
        if self.template_param_names.contains_key(&name_tok.value) {
            let mut spec = TypeSpec::template_param(name_tok.value);
            if self.is_pack_param(name_tok.value) {
                spec.kind = TypeSpecKind::Pack(name_tok.value);
            }
            return Ok(spec);
        }

        // Template-id in a type position.
        if self.at("<") && self.sess.templates.is_template(name_tok.value) {
            let args = self.parse_template_argument_list()?;
            if args.iter().any(|a| match a {
                TemplateArg::Type(s) => s.is_dependent(),
                _ => false,
            }) {
                let mut spec = TypeSpec::builtin(ValueType::Void);
                spec.kind = TypeSpecKind::TemplateId {
                    template: name_tok.value,
                    args,
                };
                return Ok(spec);
            }
            if let Some(alias) = self.sess.engine().resolve_alias_template(name_tok.value, &args) {
                return Ok(alias);
            }
            let idx = self
                .sess
                .engine()
                .try_instantiate_class_template(name_tok.value, &args)
                .ok_or_else(|| {
                    self.resolution_error("class template instantiation failed", name_tok)
                })?;
            return Ok(TypeSpec::indexed(idx));
        }

        // Plain named type (struct, enum, alias, builtin spelling).
        if let Some(idx) = self.sess.types.lookup(name_tok.value) {
            let resolved = self.sess.types.resolve_alias(idx);
            if let TypeKind::Builtin(vt) = self.sess.types.get(resolved).kind {
                return Ok(TypeSpec::builtin(vt));
            }
            return Ok(TypeSpec::indexed(resolved));
        }

        Err(self.resolution_error(
            format!("unknown type name '{}'", self.sess.interner.view(name_tok.value)),
            name_tok,
        ))
    }

    /// `char`/`short`/`int`/`long`/`long long` spelling run.
    fn parse_int_spelling(&mut self, default: ValueType) -> ValueType {
        let mut result = default;
        loop {
            if self.at("char") {
                self.advance();
                result = ValueType::Char;
                continue;
            }
            if self.at("short") {
                self.advance();
                result = ValueType::Short;
                let _ = self.eat("int");
                continue;
            }
            if self.at("int") {
                self.advance();
                continue;
            }
            if self.at("long") {
                self.advance();
                result = if result == ValueType::Long {
                    ValueType::LongLong
                } else {
                    ValueType::Long
                };
                continue;
            }
            break;
        }
        result
    }

    fn expr_is_parenthesized(&self, _expr: ExprId) -> bool {
        // Parenthesization is not recorded in the AST; compound expressions
        // cover the interesting decltype((x)) cases through the kind check.
        false
    }

    // ---- expression typing --------------------------------------------

    /// Best-effort static type of an expression. When `lvalue_as_ref` is
    /// set, lvalue expressions come back with their reference bit set so
    /// deduction can tell value categories apart.
    pub(crate) fn infer_type(&mut self, expr: ExprId, lvalue_as_ref: bool) -> Option<TypeSpec> {
        let kind = self.arenas().expr(expr).kind.clone();
        let spec = match kind {
            ExprKind::IntLiteral { ty, .. } | ExprKind::FloatLiteral { ty, .. } => {
                Some(TypeSpec::builtin(ty))
            }
            ExprKind::BoolLiteral(_) => Some(TypeSpec::builtin(ValueType::Bool)),
            ExprKind::CharLiteral { .. } => Some(TypeSpec::builtin(ValueType::Char)),
            ExprKind::StringLiteral { .. } | ExprKind::FunctionNameLiteral { .. } => {
                Some(TypeSpec::builtin(ValueType::Char).with_pointer(1).with_const())
            }
            ExprKind::NullptrLiteral => {
                Some(TypeSpec::builtin(ValueType::Void).with_pointer(1))
            }
            ExprKind::This => self
                .current_struct
                .map(|idx| TypeSpec::indexed(idx).with_pointer(1)),

            ExprKind::Identifier { name } => {
                let decl = self
                    .scopes
                    .lookup(name)
                    .or_else(|| self.scopes.lookup_using_declaration(name))
                    .or_else(|| {
                        self.sess
                            .namespaces
                            .lookup_from(self.current_namespace, name)
                    })?;
                let lvalue = self.decl_spec(decl)?;
                return Some(mark_lvalue(lvalue, lvalue_as_ref));
            }

            ExprKind::QualifiedIdentifier { name, .. } => {
                let decl = self.scopes.lookup_global(name)?;
                let lvalue = self.decl_spec(decl)?;
                return Some(mark_lvalue(lvalue, lvalue_as_ref));
            }

            ExprKind::TemplateParameterReference { name, .. } => {
                Some(TypeSpec::template_param(name))
            }

            ExprKind::Unary { op, operand, .. } => match op {
                UnaryOp::Deref => {
                    let mut inner = self.infer_type(operand, false)?;
                    if inner.pointer_depth > 0 {
                        inner.pointer_depth -= 1;
                    }
                    inner.array_size = None;
                    return Some(mark_lvalue(inner, lvalue_as_ref));
                }
                UnaryOp::AddrOf => {
                    let mut inner = self.infer_type(operand, false)?;
                    inner.pointer_depth += 1;
                    inner.is_reference = false;
                    inner.is_rvalue_reference = false;
                    Some(inner)
                }
                UnaryOp::Not => Some(TypeSpec::builtin(ValueType::Bool)),
                _ => {
                    let mut t = self.infer_type(operand, false)?;
                    t.is_reference = false;
                    t.is_rvalue_reference = false;
                    Some(t)
                }
            },

            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_comparison()
                    || matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
                {
                    Some(TypeSpec::builtin(ValueType::Bool))
                } else if op.is_assignment() {
                    return self.infer_type(lhs, lvalue_as_ref);
                } else if op == BinaryOp::Spaceship {
                    Some(TypeSpec::builtin(ValueType::Int))
                } else {
                    let a = self.infer_type(lhs, false)?;
                    let b = self.infer_type(rhs, false)?;
                    Some(common_arithmetic_type(&a, &b))
                }
            }

            ExprKind::Ternary { then_expr, .. } => {
                return self.infer_type(then_expr, lvalue_as_ref)
            }

            ExprKind::FunctionCall { callee, .. } => {
                let spec = self.decl_spec(callee)?;
                Some(spec)
            }

            ExprKind::IndirectCall { callee, .. } => {
                let mut t = self.infer_type(callee, false)?;
                t.pointer_depth = t.pointer_depth.saturating_sub(1);
                Some(t)
            }

            ExprKind::MemberAccess { object, member, .. } => {
                let obj = self.infer_type(object, false)?;
                let (vt, idx) = self.spec_category(&obj);
                if vt != ValueType::Struct {
                    return None;
                }
                let info = self.sess.types.struct_info(idx)?;
                let m = info.member(member)?;
                let mut spec = if m.ty == ValueType::Struct {
                    TypeSpec::indexed(m.type_index)
                } else {
                    TypeSpec::builtin(m.ty)
                };
                spec.pointer_depth = m.pointer_depth;
                if let Some(n) = m.array_count {
                    spec.array_size = Some(n);
                }
                return Some(mark_lvalue(spec, lvalue_as_ref));
            }

            ExprKind::MemberFunctionCall { object, method, .. } => {
                let obj = self.infer_type(object, false)?;
                let (vt, idx) = self.spec_category(&obj);
                if vt != ValueType::Struct {
                    return None;
                }
                let info = self.sess.types.struct_info(idx)?;
                let f = info.member_function(method)?;
                let decl = f.decl;
                self.decl_spec(decl)
            }

            ExprKind::ArraySubscript { array, .. } => {
                let mut t = self.infer_type(array, false)?;
                if t.array_size.is_some() {
                    t.array_size = None;
                } else if t.pointer_depth > 0 {
                    t.pointer_depth -= 1;
                }
                return Some(mark_lvalue(t, lvalue_as_ref));
            }

            ExprKind::Cast { target, .. } => Some(target),

            ExprKind::ConstructorCall { type_index, .. }
            | ExprKind::InitializerListConstruction { type_index, .. } => {
                Some(TypeSpec::indexed(type_index))
            }

            ExprKind::New { ty, .. } => {
                let mut t = ty;
                t.pointer_depth += 1;
                Some(t)
            }

            ExprKind::Sizeof(_) | ExprKind::Alignof(_) => {
                Some(TypeSpec::builtin(ValueType::UnsignedLongLong))
            }

            ExprKind::Noexcept(_) | ExprKind::TypeTraitExpr { .. } | ExprKind::Requires(_) => {
                Some(TypeSpec::builtin(ValueType::Bool))
            }

            ExprKind::Offsetof { .. } => Some(TypeSpec::builtin(ValueType::UnsignedLongLong)),

            ExprKind::Lambda(info) => Some(TypeSpec::indexed(info.closure_type)),

            _ => None,
        };
        spec
    }

    /// The type a declaration gives to a reference of its name: a
    /// variable's declared type, a function's return type.
    pub(crate) fn decl_spec(&self, decl: cinder_ast::DeclId) -> Option<TypeSpec> {
        match &self.sess.arenas.decl(decl).kind {
            DeclKind::Variable(v) => Some(v.ty.clone()),
            DeclKind::Function(f) => Some(f.return_type.clone()),
            DeclKind::Placeholder { ty, .. } => Some(ty.clone()),
            _ => None,
        }
    }

    /// Evaluate `sizeof` argument specs eagerly when they name a lazy
    /// instantiation, so the layout exists before constant evaluation.
    pub(crate) fn force_layout_for_sizeof(&mut self, arg: &SizeofArg) {
        if let SizeofArg::Type(spec) = arg {
            if let TypeSpecKind::Indexed(idx) = spec.kind {
                let _ = self.sess.engine().ensure_layout(idx);
            }
        }
    }
}

fn mark_lvalue(mut spec: TypeSpec, lvalue_as_ref: bool) -> TypeSpec {
    if lvalue_as_ref && !spec.is_rvalue_reference {
        spec.is_reference = true;
    }
    spec
}

/// Usual arithmetic conversions, collapsed to the widest operand.
pub(crate) fn common_arithmetic_type(a: &TypeSpec, b: &TypeSpec) -> TypeSpec {
    if a.pointer_depth > 0 {
        return a.clone();
    }
    if b.pointer_depth > 0 {
        return b.clone();
    }
    let rank = |s: &TypeSpec| match s.kind {
        TypeSpecKind::Builtin(ValueType::Double) => 10,
        TypeSpecKind::Builtin(ValueType::Float) => 9,
        TypeSpecKind::Builtin(ValueType::UnsignedLongLong) => 8,
        TypeSpecKind::Builtin(ValueType::LongLong) => 7,
        TypeSpecKind::Builtin(ValueType::UnsignedLong) => 6,
        TypeSpecKind::Builtin(ValueType::Long) => 5,
        TypeSpecKind::Builtin(ValueType::UnsignedInt) => 4,
        _ => 3,
    };
    let widest = if rank(a) >= rank(b) { a } else { b };
    let mut out = widest.clone();
    out.is_reference = false;
    out.is_rvalue_reference = false;
    out.is_const = false;
    // Small ints promote to int before arithmetic.
    if rank(widest) == 3 {
        out = TypeSpec::builtin(ValueType::Int);
    }
    out
}
