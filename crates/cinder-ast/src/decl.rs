use crate::arena::{DeclId, ExprId, StmtId};
use crate::types::{NamespaceHandle, TypeIndex, TypeSpec};
use cinder_common::{Symbol, Token};

/// Member access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSpecifier {
    Public,
    Protected,
    Private,
}

/// Whether a declaration participates in C++ name mangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    /// `extern "C"`: the symbol is the plain name.
    C,
    #[default]
    CPlusPlus,
}

/// Storage duration and placement of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Local,
    Global,
    /// Function-local `static`; storage is a mangled global.
    StaticLocal,
    StaticMember,
}

/// A function parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Symbol,
    pub ty: TypeSpec,
    pub default: Option<ExprId>,
    /// True when this parameter came from expanding a pack at instantiation.
    pub from_pack: bool,
}

/// Kind of one template parameter.
#[derive(Debug, Clone)]
pub enum TemplateParamKind {
    /// `typename T` / `class T`, optionally defaulted.
    Type { default: Option<TypeSpec> },
    /// `int N` etc., optionally defaulted.
    NonType {
        ty: TypeSpec,
        default: Option<ExprId>,
    },
    /// `template<typename> class C`.
    Template,
}

/// One formal template parameter.
#[derive(Debug, Clone)]
pub struct TemplateParam {
    pub name: Symbol,
    pub kind: TemplateParamKind,
    pub is_pack: bool,
}

/// A data member of a class-template pattern; the spec may be dependent.
#[derive(Debug, Clone)]
pub struct PatternMember {
    pub name: Symbol,
    pub ty: TypeSpec,
    pub access: AccessSpecifier,
}

/// The body of a class template before instantiation. Members and methods
/// are parsed against the template parameter names and substituted per
/// instantiation; nothing here touches the type registry.
#[derive(Debug, Clone, Default)]
pub struct ClassPattern {
    pub members: Vec<PatternMember>,
    /// Method patterns: `FunctionDecl` declarations with dependent specs.
    pub methods: Vec<DeclId>,
    pub static_members: Vec<(Symbol, TypeSpec, Option<ExprId>)>,
}

/// A declaration node.
#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub token: Token,
}

impl Decl {
    pub fn new(kind: DeclKind, token: Token) -> Self {
        Self { kind, token }
    }

    pub fn name(&self) -> Symbol {
        match &self.kind {
            DeclKind::Placeholder { name, .. } => *name,
            DeclKind::Function(f) => f.name,
            DeclKind::Variable(v) => v.name,
            DeclKind::Struct { name, .. } => *name,
            DeclKind::TemplateFunction { name, .. } => *name,
            DeclKind::TemplateClass { name, .. } => *name,
            DeclKind::TemplateVariable { name, .. } => *name,
            DeclKind::TemplateAlias { name, .. } => *name,
            DeclKind::Concept { name, .. } => *name,
        }
    }
}

/// A function declaration (free, member, or instantiated template).
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Symbol,
    pub params: Vec<ParamDecl>,
    pub return_type: TypeSpec,
    pub body: Option<StmtId>,
    pub linkage: Linkage,
    pub is_variadic: bool,
    pub namespace: NamespaceHandle,
    /// The owning struct for member functions.
    pub member_of: Option<TypeIndex>,
    pub is_static: bool,
    pub is_const: bool,
    /// `Some("==")` for `operator==` and friends.
    pub operator_symbol: Option<Symbol>,
    pub mangled_name: Option<Symbol>,
}

/// A variable declaration.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: Symbol,
    pub ty: TypeSpec,
    pub init: Option<ExprId>,
    pub storage: StorageClass,
    pub namespace: NamespaceHandle,
    pub mangled_name: Option<Symbol>,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    /// Forward reference created when a call names an unknown function; the
    /// slot is completed if a definition appears later.
    Placeholder { name: Symbol, ty: TypeSpec },

    Function(FunctionDecl),

    Variable(VariableDecl),

    /// A struct/class definition; layout and members live in the type
    /// registry under `type_index`.
    Struct {
        name: Symbol,
        type_index: TypeIndex,
        namespace: NamespaceHandle,
    },

    /// An uninstantiated function template: the pattern declaration plus its
    /// parameter list. The pattern body contains parameter-reference nodes.
    TemplateFunction {
        name: Symbol,
        params: Vec<TemplateParam>,
        pattern: DeclId,
        /// `requires` clause or concept constraint, checked at instantiation.
        constraint: Option<ExprId>,
    },

    /// An uninstantiated class template. Members are parsed against the
    /// parameter names and substituted per instantiation.
    TemplateClass {
        name: Symbol,
        params: Vec<TemplateParam>,
        body: ClassPattern,
        constraint: Option<ExprId>,
    },

    /// `template<typename T> constexpr T zero = T{};`
    TemplateVariable {
        name: Symbol,
        params: Vec<TemplateParam>,
        pattern: DeclId,
    },

    /// `template<typename T> using Ref = T&;`
    TemplateAlias {
        name: Symbol,
        params: Vec<TemplateParam>,
        target: TypeSpec,
    },

    /// `template<typename T> concept C = <constraint-expr>;`
    Concept {
        name: Symbol,
        params: Vec<TemplateParam>,
        constraint: ExprId,
    },
}
