use crate::arena::{DeclId, ExprId, StmtId};
use crate::types::{NamespaceHandle, TypeIndex, TypeSpec, ValueType};
use cinder_common::{Symbol, Token};

/// Binary operators, including compound assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `<=>`
    Spaceship,
    LogicalAnd,
    LogicalOr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    Comma,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::RemAssign
                | BinaryOp::AndAssign
                | BinaryOp::OrAssign
                | BinaryOp::XorAssign
                | BinaryOp::ShlAssign
                | BinaryOp::ShrAssign
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// The arithmetic op a compound assignment performs, if any.
    pub fn compound_base(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::AddAssign => BinaryOp::Add,
            BinaryOp::SubAssign => BinaryOp::Sub,
            BinaryOp::MulAssign => BinaryOp::Mul,
            BinaryOp::DivAssign => BinaryOp::Div,
            BinaryOp::RemAssign => BinaryOp::Rem,
            BinaryOp::AndAssign => BinaryOp::BitAnd,
            BinaryOp::OrAssign => BinaryOp::BitOr,
            BinaryOp::XorAssign => BinaryOp::BitXor,
            BinaryOp::ShlAssign => BinaryOp::Shl,
            BinaryOp::ShrAssign => BinaryOp::Shr,
            _ => return None,
        })
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Deref,
    AddrOf,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

/// Encoding prefix of a character or string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharEncoding {
    #[default]
    Plain,
    Wide,    // L
    Utf8,    // u8
    Utf16,   // u
    Utf32,   // U
}

/// The four C++ named casts plus the two syntactic cast forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Static,
    Dynamic,
    Const,
    Reinterpret,
    CStyle,
    /// `T(expr)` on a builtin `T`.
    Functional,
}

/// Shapes of a fold expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldForm {
    /// `(... op pack)`
    UnaryLeft,
    /// `(pack op ...)`
    UnaryRight,
    /// `(init op ... op pack)`
    BinaryLeft,
    /// `(pack op ... op init)`
    BinaryRight,
}

/// How a lambda captures one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    ByValue,
    ByReference,
    /// `[this]`
    This,
    /// `[*this]`
    CopyThis,
}

#[derive(Debug, Clone)]
pub struct LambdaCapture {
    pub name: Symbol,
    pub kind: CaptureKind,
    /// The captured variable's type, recorded at capture time.
    pub ty: TypeSpec,
}

/// A lambda body plus its synthesized closure type.
#[derive(Debug, Clone)]
pub struct LambdaInfo {
    pub captures: Vec<LambdaCapture>,
    pub params: Vec<(Symbol, TypeSpec)>,
    pub return_type: Option<TypeSpec>,
    pub is_mutable: bool,
    pub body: StmtId,
    /// Registry slot of the `__lambda_<n>` closure struct.
    pub closure_type: TypeIndex,
    /// `operator()` declaration on the closure type.
    pub call_operator: DeclId,
}

/// Argument of `sizeof` / `alignof`.
#[derive(Debug, Clone)]
pub enum SizeofArg {
    Type(TypeSpec),
    Expr(ExprId),
    /// `sizeof...(pack)`
    Pack(Symbol),
}

/// A template argument as parsed: a type or a constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateArg {
    Type(TypeSpec),
    Value { value: i64, ty: ValueType },
}

/// The type-trait intrinsics the constant evaluator answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTrait {
    IsIntegral,
    IsSigned,
    IsUnsigned,
    IsFloatingPoint,
    IsArithmetic,
    IsScalar,
    IsPointer,
    IsReference,
    IsLvalueReference,
    IsRvalueReference,
    IsEnum,
    IsClass,
    IsEmpty,
    IsPolymorphic,
    IsTriviallyCopyable,
    IsTriviallyDestructible,
    IsSame,
    IsBaseOf,
    IsConvertible,
    HasUniqueObjectRepresentations,
}

/// One requirement inside a `requires { ... }` body.
#[derive(Debug, Clone)]
pub enum Requirement {
    /// `expr;` — the expression must parse and resolve.
    Expression(ExprId),
    /// `typename T::name;` — the type must exist.
    Type(TypeSpec),
    /// `{ expr } -> concept;` — compound requirement.
    Compound { expr: ExprId, constraint: Option<ExprId> },
}

/// A parsed `requires` expression; evaluated by the constraint evaluator.
#[derive(Debug, Clone)]
pub struct RequiresClause {
    pub params: Vec<(Symbol, TypeSpec)>,
    pub requirements: Vec<Requirement>,
}

/// An expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub token: Token,
}

impl Expr {
    pub fn new(kind: ExprKind, token: Token) -> Self {
        Self { kind, token }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Integer literal; the suffix has already chosen the type.
    IntLiteral { value: u64, ty: ValueType },

    FloatLiteral { value: f64, ty: ValueType },

    BoolLiteral(bool),

    CharLiteral { value: u32, encoding: CharEncoding },

    /// Escape-processed bytes, adjacent literals already concatenated.
    StringLiteral { value: Symbol, encoding: CharEncoding },

    NullptrLiteral,

    This,

    /// `__func__` / `__PRETTY_FUNCTION__`; text synthesized at lowering.
    FunctionNameLiteral { pretty: bool },

    Identifier { name: Symbol },

    QualifiedIdentifier {
        namespace: NamespaceHandle,
        name: Symbol,
    },

    /// A name bound to an in-scope template parameter.
    TemplateParameterReference { name: Symbol, is_pack: bool },

    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },

    Unary {
        op: UnaryOp,
        operand: ExprId,
        /// `__builtin_addressof`: suppress `operator&` lookup.
        is_builtin_addressof: bool,
    },

    Ternary {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },

    FunctionCall {
        /// Resolved callee, or a placeholder decl for forward references.
        callee: DeclId,
        args: Vec<ExprId>,
        template_args: Option<Vec<TemplateArg>>,
        mangled_name: Option<Symbol>,
    },

    /// Call through an expression (function pointer, lambda value).
    IndirectCall {
        callee: ExprId,
        args: Vec<ExprId>,
    },

    MemberAccess {
        object: ExprId,
        member: Symbol,
        is_arrow: bool,
    },

    MemberFunctionCall {
        object: ExprId,
        method: Symbol,
        args: Vec<ExprId>,
        is_arrow: bool,
        mangled_name: Option<Symbol>,
    },

    ArraySubscript {
        array: ExprId,
        index: ExprId,
    },

    /// `T(args)` / `T{args}` for a user-defined `T`.
    ConstructorCall {
        type_index: TypeIndex,
        args: Vec<ExprId>,
    },

    /// `T(args)` where `T` is still dependent (a template parameter or
    /// template-id); resolved to a constructor call or a conversion after
    /// substitution.
    TypeConstruction {
        ty: TypeSpec,
        args: Vec<ExprId>,
    },

    /// `Class::member` naming a static member, a member function, or (for
    /// pointer-to-member formation) a non-static data member.
    StaticMemberAccess {
        type_index: TypeIndex,
        member: Symbol,
    },

    /// `T{a, b, c}` aggregate construction from a braced list.
    InitializerListConstruction {
        type_index: TypeIndex,
        args: Vec<ExprId>,
    },

    New {
        ty: TypeSpec,
        /// `new T[count]`
        count: Option<ExprId>,
        args: Vec<ExprId>,
        placement: Vec<ExprId>,
        is_global: bool,
    },

    Delete {
        operand: ExprId,
        is_array: bool,
        is_global: bool,
    },

    Cast {
        kind: CastKind,
        target: TypeSpec,
        operand: ExprId,
    },

    Sizeof(SizeofArg),

    Alignof(TypeSpec),

    Noexcept(ExprId),

    Offsetof {
        type_index: TypeIndex,
        /// Nested member path: `offsetof(S, a.b)` keeps both names.
        members: Vec<Symbol>,
    },

    Typeid {
        arg: SizeofArg,
    },

    TypeTraitExpr {
        trait_kind: TypeTrait,
        type_args: Vec<TypeSpec>,
    },

    Lambda(Box<LambdaInfo>),

    Fold {
        form: FoldForm,
        op: BinaryOp,
        pack: Symbol,
        init: Option<ExprId>,
    },

    /// `pattern...` inside a call argument list.
    PackExpansion {
        pattern: ExprId,
        pack: Symbol,
    },

    /// `obj.~T()` on a non-class `T`: evaluates the object, does nothing.
    PseudoDestructorCall {
        object: ExprId,
    },

    /// `obj.*ptm` / `obj->*ptm`.
    PointerToMemberAccess {
        object: ExprId,
        pointer: ExprId,
        is_arrow: bool,
    },

    Throw {
        operand: Option<ExprId>,
    },

    /// `__builtin_va_arg(va, T)`; the second operand is a type.
    VaArg {
        va: ExprId,
        ty: TypeSpec,
    },

    Requires(Box<RequiresClause>),

    /// A concept applied to arguments: `Integral<T>`.
    ConceptApplication {
        concept_decl: DeclId,
        args: Vec<TemplateArg>,
    },
}
