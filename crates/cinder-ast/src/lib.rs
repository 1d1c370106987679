//! Sum-typed AST and the type registry for the Cinder front end.
//!
//! Nodes live in append-only arenas and are addressed by copyable ids; an
//! arena is freed wholesale at the end of a compilation. Expression nodes are
//! a single tagged enum dispatched by pattern match, not a class hierarchy.

mod arena;
mod decl;
mod expr;
mod layout;
mod stmt;
mod types;

pub use arena::{Arenas, DeclId, ExprId, StmtId};
pub use decl::{
    AccessSpecifier, ClassPattern, Decl, DeclKind, FunctionDecl, Linkage, ParamDecl, PatternMember,
    StorageClass, TemplateParam, TemplateParamKind, VariableDecl,
};
pub use expr::{
    BinaryOp, CaptureKind, CastKind, CharEncoding, Expr, ExprKind, FoldForm, LambdaCapture,
    LambdaInfo, RequiresClause, Requirement, SizeofArg, TemplateArg, TypeTrait, UnaryOp,
};
pub use layout::{align_to, LayoutError};
pub use stmt::{Stmt, StmtKind};
pub use types::{
    BaseClass, DataModel, EnumTypeInfo, Enumerator, MemberFunction, NamespaceHandle, StaticMember,
    StructMember, StructTypeInfo, TypeIndex, TypeInfo, TypeKind, TypeProperties, TypeRegistry,
    TypeSpec, TypeSpecKind, ValueType,
};
