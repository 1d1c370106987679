use cinder_ast::{
    Arenas, BinaryOp, CastKind, ExprId, ExprKind, SizeofArg, TypeRegistry, TypeSpec, TypeSpecKind,
    TypeTrait, UnaryOp, ValueType,
};
use cinder_common::{Symbol, Token};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// A compile-time value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Bool(bool),
    Float(f64),
}

impl ConstValue {
    pub fn as_i64(self) -> i64 {
        match self {
            ConstValue::Int(v) => v,
            ConstValue::UInt(v) => v as i64,
            ConstValue::Bool(b) => b as i64,
            ConstValue::Float(f) => f as i64,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            ConstValue::Int(v) => v != 0,
            ConstValue::UInt(v) => v != 0,
            ConstValue::Bool(b) => b,
            ConstValue::Float(f) => f != 0.0,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, ConstValue::Float(_))
    }

    fn is_unsigned(self) -> bool {
        matches!(self, ConstValue::UInt(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ConstEvalError {
    #[error("expression is not a constant expression")]
    NotConstant { token: Token },
    #[error("division by zero in constant expression")]
    DivideByZero { token: Token },
    #[error("use of unknown identifier in constant expression")]
    UnknownIdentifier { token: Token, name: Symbol },
}

/// Evaluates constant expressions: non-type template arguments, array
/// bounds, enumerator initializers, `static_assert` conditions, `sizeof`,
/// and the type-trait intrinsics.
pub struct ConstEvaluator<'a> {
    arenas: &'a Arenas,
    types: &'a TypeRegistry,
    /// Named compile-time bindings: enumerators, non-type template
    /// parameters, constexpr variables already folded.
    pub bindings: FxHashMap<Symbol, ConstValue>,
    /// Active pack sizes for `sizeof...`.
    pub pack_sizes: FxHashMap<Symbol, usize>,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(arenas: &'a Arenas, types: &'a TypeRegistry) -> Self {
        Self {
            arenas,
            types,
            bindings: FxHashMap::default(),
            pack_sizes: FxHashMap::default(),
        }
    }

    pub fn bind(&mut self, name: Symbol, value: ConstValue) {
        self.bindings.insert(name, value);
    }

    pub fn evaluate(&self, expr: ExprId) -> Result<ConstValue, ConstEvalError> {
        let node = self.arenas.expr(expr);
        let token = node.token;
        match &node.kind {
            ExprKind::IntLiteral { value, ty } => Ok(if ty.is_signed() {
                ConstValue::Int(*value as i64)
            } else {
                ConstValue::UInt(*value)
            }),
            ExprKind::FloatLiteral { value, .. } => Ok(ConstValue::Float(*value)),
            ExprKind::BoolLiteral(b) => Ok(ConstValue::Bool(*b)),
            ExprKind::CharLiteral { value, .. } => Ok(ConstValue::Int(*value as i64)),
            ExprKind::NullptrLiteral => Ok(ConstValue::UInt(0)),

            ExprKind::Identifier { name }
            | ExprKind::QualifiedIdentifier { name, .. }
            | ExprKind::TemplateParameterReference { name, .. } => self
                .bindings
                .get(name)
                .copied()
                .ok_or(ConstEvalError::UnknownIdentifier { token, name: *name }),

            ExprKind::Binary { op, lhs, rhs } => {
                // Logical connectives short-circuit so `B || undefined` folds.
                if *op == BinaryOp::LogicalAnd {
                    let l = self.evaluate(*lhs)?;
                    if !l.as_bool() {
                        return Ok(ConstValue::Bool(false));
                    }
                    return Ok(ConstValue::Bool(self.evaluate(*rhs)?.as_bool()));
                }
                if *op == BinaryOp::LogicalOr {
                    let l = self.evaluate(*lhs)?;
                    if l.as_bool() {
                        return Ok(ConstValue::Bool(true));
                    }
                    return Ok(ConstValue::Bool(self.evaluate(*rhs)?.as_bool()));
                }
                let l = self.evaluate(*lhs)?;
                let r = self.evaluate(*rhs)?;
                self.binary(*op, l, r, token)
            }

            ExprKind::Unary { op, operand, .. } => {
                let v = self.evaluate(*operand)?;
                match op {
                    UnaryOp::Plus => Ok(v),
                    UnaryOp::Neg => Ok(match v {
                        ConstValue::Float(f) => ConstValue::Float(-f),
                        other => ConstValue::Int(-other.as_i64()),
                    }),
                    UnaryOp::Not => Ok(ConstValue::Bool(!v.as_bool())),
                    UnaryOp::BitNot => Ok(match v {
                        ConstValue::UInt(u) => ConstValue::UInt(!u),
                        other => ConstValue::Int(!other.as_i64()),
                    }),
                    _ => Err(ConstEvalError::NotConstant { token }),
                }
            }

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.evaluate(*cond)?.as_bool() {
                    self.evaluate(*then_expr)
                } else {
                    self.evaluate(*else_expr)
                }
            }

            ExprKind::Sizeof(arg) => self.sizeof_value(arg, token),

            ExprKind::Alignof(spec) => {
                if spec.is_dependent() {
                    return Err(ConstEvalError::NotConstant { token });
                }
                if spec.pointer_depth > 0 || spec.is_reference {
                    return Ok(ConstValue::UInt(8));
                }
                let (vt, idx) = self.spec_parts(spec);
                Ok(ConstValue::UInt(self.types.align_bytes(vt, idx) as u64))
            }

            ExprKind::Offsetof {
                type_index,
                members,
            } => self
                .types
                .offset_of_path(*type_index, members)
                .map(|o| ConstValue::UInt(o as u64))
                .ok_or(ConstEvalError::NotConstant { token }),

            ExprKind::TypeTraitExpr {
                trait_kind,
                type_args,
            } => self.type_trait(*trait_kind, type_args, token),

            ExprKind::Noexcept(inner) => Ok(ConstValue::Bool(!self.potentially_throwing(*inner))),

            ExprKind::Cast {
                kind: CastKind::Static | CastKind::CStyle | CastKind::Functional,
                target,
                operand,
            } => {
                let v = self.evaluate(*operand)?;
                Ok(self.convert(v, target))
            }

            _ => Err(ConstEvalError::NotConstant { token }),
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        l: ConstValue,
        r: ConstValue,
        token: Token,
    ) -> Result<ConstValue, ConstEvalError> {
        use BinaryOp::*;
        if l.is_float() || r.is_float() {
            let (a, b) = (to_f64(l), to_f64(r));
            return Ok(match op {
                Add => ConstValue::Float(a + b),
                Sub => ConstValue::Float(a - b),
                Mul => ConstValue::Float(a * b),
                Div => ConstValue::Float(a / b),
                Eq => ConstValue::Bool(a == b),
                Ne => ConstValue::Bool(a != b),
                Lt => ConstValue::Bool(a < b),
                Le => ConstValue::Bool(a <= b),
                Gt => ConstValue::Bool(a > b),
                Ge => ConstValue::Bool(a >= b),
                _ => return Err(ConstEvalError::NotConstant { token }),
            });
        }
        let unsigned = l.is_unsigned() || r.is_unsigned();
        let (a, b) = (l.as_i64(), r.as_i64());
        if matches!(op, Div | Rem) && b == 0 {
            return Err(ConstEvalError::DivideByZero { token });
        }
        let int = |v: i64| {
            if unsigned {
                ConstValue::UInt(v as u64)
            } else {
                ConstValue::Int(v)
            }
        };
        Ok(match op {
            Add => int(a.wrapping_add(b)),
            Sub => int(a.wrapping_sub(b)),
            Mul => int(a.wrapping_mul(b)),
            Div => {
                if unsigned {
                    ConstValue::UInt((a as u64) / (b as u64))
                } else {
                    int(a.wrapping_div(b))
                }
            }
            Rem => {
                if unsigned {
                    ConstValue::UInt((a as u64) % (b as u64))
                } else {
                    int(a.wrapping_rem(b))
                }
            }
            BitAnd => int(a & b),
            BitOr => int(a | b),
            BitXor => int(a ^ b),
            Shl => int(a.wrapping_shl(b as u32)),
            Shr => {
                if unsigned {
                    ConstValue::UInt((a as u64).wrapping_shr(b as u32))
                } else {
                    int(a.wrapping_shr(b as u32))
                }
            }
            Eq => ConstValue::Bool(a == b),
            Ne => ConstValue::Bool(a != b),
            Lt => cmp(unsigned, a, b, |x, y| x < y, |x, y| x < y),
            Le => cmp(unsigned, a, b, |x, y| x <= y, |x, y| x <= y),
            Gt => cmp(unsigned, a, b, |x, y| x > y, |x, y| x > y),
            Ge => cmp(unsigned, a, b, |x, y| x >= y, |x, y| x >= y),
            Spaceship => ConstValue::Int((a - b).signum()),
            Comma => ConstValue::Int(b),
            _ => return Err(ConstEvalError::NotConstant { token }),
        })
    }

    fn sizeof_value(&self, arg: &SizeofArg, token: Token) -> Result<ConstValue, ConstEvalError> {
        match arg {
            SizeofArg::Type(spec) => {
                if spec.is_dependent() {
                    return Err(ConstEvalError::NotConstant { token });
                }
                let bits = self.types.spec_size_bits(spec);
                if bits == 0 {
                    return Err(ConstEvalError::NotConstant { token });
                }
                Ok(ConstValue::UInt((bits / 8) as u64))
            }
            SizeofArg::Expr(e) => {
                let v = self.evaluate(*e)?;
                Ok(ConstValue::UInt(match v {
                    ConstValue::Bool(_) => 1,
                    ConstValue::Int(_) | ConstValue::UInt(_) => 4,
                    ConstValue::Float(_) => 8,
                }))
            }
            SizeofArg::Pack(name) => self
                .pack_sizes
                .get(name)
                .map(|n| ConstValue::UInt(*n as u64))
                .ok_or(ConstEvalError::NotConstant { token }),
        }
    }

    fn type_trait(
        &self,
        trait_kind: TypeTrait,
        args: &[TypeSpec],
        token: Token,
    ) -> Result<ConstValue, ConstEvalError> {
        let first = args.first().ok_or(ConstEvalError::NotConstant { token })?;
        match trait_kind {
            TypeTrait::IsSame => {
                let second = args.get(1).ok_or(ConstEvalError::NotConstant { token })?;
                Ok(ConstValue::Bool(canonical(first) == canonical(second)))
            }
            TypeTrait::IsBaseOf => {
                let second = args.get(1).ok_or(ConstEvalError::NotConstant { token })?;
                Ok(ConstValue::Bool(self.is_base_of(first, second)))
            }
            TypeTrait::IsConvertible => {
                let second = args.get(1).ok_or(ConstEvalError::NotConstant { token })?;
                Ok(ConstValue::Bool(self.is_convertible(first, second)))
            }
            other => {
                let props = self
                    .types
                    .properties(first)
                    .ok_or(ConstEvalError::NotConstant { token })?;
                Ok(ConstValue::Bool(match other {
                    TypeTrait::IsIntegral => props.is_integral,
                    TypeTrait::IsSigned => props.is_signed && props.is_integral,
                    TypeTrait::IsUnsigned => props.is_integral && !props.is_signed,
                    TypeTrait::IsFloatingPoint => props.is_floating_point,
                    TypeTrait::IsArithmetic => props.is_integral || props.is_floating_point,
                    TypeTrait::IsScalar => props.is_scalar,
                    TypeTrait::IsPointer => props.is_pointer,
                    TypeTrait::IsReference => props.is_reference,
                    TypeTrait::IsLvalueReference => {
                        first.is_reference && !first.is_rvalue_reference
                    }
                    TypeTrait::IsRvalueReference => first.is_rvalue_reference,
                    TypeTrait::IsEnum => props.is_enum,
                    TypeTrait::IsClass => props.is_class,
                    TypeTrait::IsEmpty => props.is_empty,
                    TypeTrait::IsPolymorphic => props.is_polymorphic,
                    TypeTrait::IsTriviallyCopyable => props.is_trivially_copyable,
                    TypeTrait::IsTriviallyDestructible => props.is_trivially_destructible,
                    TypeTrait::HasUniqueObjectRepresentations => {
                        props.is_integral && !matches!(first.kind, TypeSpecKind::Builtin(ValueType::Bool))
                    }
                    _ => return Err(ConstEvalError::NotConstant { token }),
                }))
            }
        }
    }

    fn is_base_of(&self, base: &TypeSpec, derived: &TypeSpec) -> bool {
        let (base_idx, derived_idx) = match (&base.kind, &derived.kind) {
            (TypeSpecKind::Indexed(b), TypeSpecKind::Indexed(d)) => {
                (self.types.resolve_alias(*b), self.types.resolve_alias(*d))
            }
            _ => return false,
        };
        if base_idx == derived_idx {
            return true;
        }
        let mut work = vec![derived_idx];
        while let Some(idx) = work.pop() {
            if let Some(info) = self.types.struct_info(idx) {
                for b in &info.bases {
                    if b.type_index == base_idx {
                        return true;
                    }
                    work.push(b.type_index);
                }
            }
        }
        false
    }

    fn is_convertible(&self, from: &TypeSpec, to: &TypeSpec) -> bool {
        if canonical(from) == canonical(to) {
            return true;
        }
        let (fp, tp) = match (self.types.properties(from), self.types.properties(to)) {
            (Some(f), Some(t)) => (f, t),
            _ => return false,
        };
        if (fp.is_integral || fp.is_floating_point) && (tp.is_integral || tp.is_floating_point) {
            return true;
        }
        if fp.is_pointer && tp.is_pointer {
            return self.is_base_of(&deref_spec(to), &deref_spec(from))
                || matches!(to.kind, TypeSpecKind::Builtin(ValueType::Void));
        }
        if fp.is_pointer && matches!(to.kind, TypeSpecKind::Builtin(ValueType::Bool)) {
            return to.pointer_depth == 0;
        }
        false
    }

    fn convert(&self, v: ConstValue, target: &TypeSpec) -> ConstValue {
        let vt = match target.kind {
            TypeSpecKind::Builtin(vt) if target.pointer_depth == 0 => vt,
            _ => return v,
        };
        if vt.is_floating_point() {
            return ConstValue::Float(to_f64(v));
        }
        if vt == ValueType::Bool {
            return ConstValue::Bool(v.as_bool());
        }
        let raw = v.as_i64();
        let bits = vt.size_bits(self.types.data_model());
        let masked = if bits >= 64 {
            raw
        } else {
            let mask = (1i64 << bits) - 1;
            let m = raw & mask;
            if vt.is_signed() && (m & (1i64 << (bits - 1))) != 0 {
                m | !mask
            } else {
                m
            }
        };
        if vt.is_signed() {
            ConstValue::Int(masked)
        } else {
            ConstValue::UInt(masked as u64)
        }
    }

    /// Conservative "can this throw" walk for `noexcept(expr)`.
    fn potentially_throwing(&self, expr: ExprId) -> bool {
        match &self.arenas.expr(expr).kind {
            ExprKind::Throw { .. } | ExprKind::New { .. } => true,
            ExprKind::Cast { kind, operand, .. } => {
                *kind == CastKind::Dynamic || self.potentially_throwing(*operand)
            }
            ExprKind::FunctionCall { .. }
            | ExprKind::MemberFunctionCall { .. }
            | ExprKind::IndirectCall { .. } => true,
            ExprKind::Binary { lhs, rhs, .. } => {
                self.potentially_throwing(*lhs) || self.potentially_throwing(*rhs)
            }
            ExprKind::Unary { operand, .. } => self.potentially_throwing(*operand),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.potentially_throwing(*cond)
                    || self.potentially_throwing(*then_expr)
                    || self.potentially_throwing(*else_expr)
            }
            _ => false,
        }
    }

    fn spec_parts(&self, spec: &TypeSpec) -> (ValueType, cinder_ast::TypeIndex) {
        match spec.kind {
            TypeSpecKind::Builtin(vt) => (vt, cinder_ast::TypeIndex::VOID),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.types.resolve_alias(idx);
                match self.types.get(idx).kind {
                    cinder_ast::TypeKind::Builtin(vt) => (vt, idx),
                    cinder_ast::TypeKind::Enum => (ValueType::Enum, idx),
                    _ => (ValueType::Struct, idx),
                }
            }
            _ => (ValueType::Void, cinder_ast::TypeIndex::VOID),
        }
    }
}

fn cmp(
    unsigned: bool,
    a: i64,
    b: i64,
    signed_op: fn(i64, i64) -> bool,
    unsigned_op: fn(u64, u64) -> bool,
) -> ConstValue {
    ConstValue::Bool(if unsigned {
        unsigned_op(a as u64, b as u64)
    } else {
        signed_op(a, b)
    })
}

fn to_f64(v: ConstValue) -> f64 {
    match v {
        ConstValue::Float(f) => f,
        ConstValue::Int(i) => i as f64,
        ConstValue::UInt(u) => u as f64,
        ConstValue::Bool(b) => b as u8 as f64,
    }
}

/// Canonical form for type comparison: top-level const is dropped on
/// by-value specs, so `const T&` and `T const&` land identically and
/// `const int` compares equal to `int` by value.
fn canonical(spec: &TypeSpec) -> TypeSpec {
    let mut c = spec.clone();
    if !c.is_reference && !c.is_rvalue_reference && c.pointer_depth == 0 {
        c.is_const = false;
    }
    c
}

fn deref_spec(spec: &TypeSpec) -> TypeSpec {
    let mut s = spec.clone();
    s.pointer_depth = s.pointer_depth.saturating_sub(1);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::{DataModel, Expr, StructMember, StructTypeInfo, TypeKind};
    use cinder_common::{SourceMap, SymbolInterner, Token, TokenKind};

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
            let file = sources.add_file("const.cpp");
            let token = Token::new(TokenKind::Operator, interner.intern("+"), file, 1, 1);
            let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
            Self {
                interner,
                arenas: Arenas::new(),
                types,
                token,
            }
        }

        fn int(&mut self, v: i64) -> ExprId {
            self.arenas.alloc_expr(Expr::new(
                ExprKind::IntLiteral {
                    value: v as u64,
                    ty: ValueType::Int,
                },
                self.token,
            ))
        }

        fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> ExprId {
            self.arenas
                .alloc_expr(Expr::new(ExprKind::Binary { op, lhs, rhs }, self.token))
        }
    }

    #[test]
    fn arithmetic_folds() {
        let mut fx = Fixture::new();
        let a = fx.int(6);
        let b = fx.int(7);
        let mul = fx.binary(BinaryOp::Mul, a, b);
        let eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        assert_eq!(eval.evaluate(mul).unwrap(), ConstValue::Int(42));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut fx = Fixture::new();
        let a = fx.int(1);
        let b = fx.int(0);
        let div = fx.binary(BinaryOp::Div, a, b);
        let eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        assert!(matches!(
            eval.evaluate(div),
            Err(ConstEvalError::DivideByZero { .. })
        ));
    }

    #[test]
    fn logical_or_short_circuits_past_unknowns() {
        let mut fx = Fixture::new();
        let t = fx
            .arenas
            .alloc_expr(Expr::new(ExprKind::BoolLiteral(true), fx.token));
        let unknown_name = fx.interner.intern("mystery");
        let unknown = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Identifier { name: unknown_name },
            fx.token,
        ));
        let or = fx.binary(BinaryOp::LogicalOr, t, unknown);
        let eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        assert_eq!(eval.evaluate(or).unwrap(), ConstValue::Bool(true));
    }

    #[test]
    fn sizeof_struct_matches_registry_layout() {
        let mut fx = Fixture::new();
        let idx = fx
            .types
            .get_or_create(fx.interner.intern("Pair"), TypeKind::Struct);
        fx.types.get_mut(idx).struct_info = Some(StructTypeInfo {
            members: vec![
                StructMember {
                    name: fx.interner.intern("a"),
                    ty: ValueType::Int,
                    type_index: cinder_ast::TypeIndex::VOID,
                    offset: 0,
                    size_bits: 32,
                    pointer_depth: 0,
                    is_reference: false,
                    access: cinder_ast::AccessSpecifier::Public,
                    array_count: None,
                },
                StructMember {
                    name: fx.interner.intern("b"),
                    ty: ValueType::Int,
                    type_index: cinder_ast::TypeIndex::VOID,
                    offset: 0,
                    size_bits: 32,
                    pointer_depth: 0,
                    is_reference: false,
                    access: cinder_ast::AccessSpecifier::Public,
                    array_count: None,
                },
            ],
            ..Default::default()
        });
        fx.types.finish_layout(idx).unwrap();

        let spec = TypeSpec::indexed(idx);
        let sizeof = fx
            .arenas
            .alloc_expr(Expr::new(ExprKind::Sizeof(SizeofArg::Type(spec)), fx.token));
        let eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        let total = fx.types.struct_info(idx).unwrap().total_size as u64;
        assert_eq!(eval.evaluate(sizeof).unwrap(), ConstValue::UInt(total));
    }

    #[test]
    fn sizeof_pack_uses_active_binding() {
        let mut fx = Fixture::new();
        let pack = fx.interner.intern("args");
        let e = fx
            .arenas
            .alloc_expr(Expr::new(ExprKind::Sizeof(SizeofArg::Pack(pack)), fx.token));
        let mut eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        eval.pack_sizes.insert(pack, 0);
        assert_eq!(eval.evaluate(e).unwrap(), ConstValue::UInt(0));
        eval.pack_sizes.insert(pack, 3);
        assert_eq!(eval.evaluate(e).unwrap(), ConstValue::UInt(3));
    }

    #[test]
    fn is_same_folds_const_spelling() {
        let fx = Fixture::new();
        let plain = TypeSpec::builtin(ValueType::Int);
        let constant = TypeSpec::builtin(ValueType::Int).with_const();
        let eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        let result = eval
            .type_trait(TypeTrait::IsSame, &[plain, constant], fx.token)
            .unwrap();
        assert_eq!(result, ConstValue::Bool(true));
    }

    #[test]
    fn enumerator_binding_resolves() {
        let mut fx = Fixture::new();
        let name = fx.interner.intern("Red");
        let e = fx
            .arenas
            .alloc_expr(Expr::new(ExprKind::Identifier { name }, fx.token));
        let mut eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        eval.bind(name, ConstValue::Int(2));
        assert_eq!(eval.evaluate(e).unwrap(), ConstValue::Int(2));
    }

    #[test]
    fn static_cast_truncates() {
        let mut fx = Fixture::new();
        let big = fx.int(0x1_0000_0001);
        let cast = fx.arenas.alloc_expr(Expr::new(
            ExprKind::Cast {
                kind: CastKind::Static,
                target: TypeSpec::builtin(ValueType::Int),
                operand: big,
            },
            fx.token,
        ));
        let eval = ConstEvaluator::new(&fx.arenas, &fx.types);
        assert_eq!(eval.evaluate(cast).unwrap(), ConstValue::Int(1));
    }
}
