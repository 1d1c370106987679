use crate::arena::{DeclId, ExprId, StmtId};
use cinder_common::Token;

/// A statement node.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub token: Token,
}

impl Stmt {
    pub fn new(kind: StmtKind, token: Token) -> Self {
        Self { kind, token }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(ExprId),

    /// A local variable (or static local) declaration.
    VarDecl(DeclId),

    Block(Vec<StmtId>),

    Return(Option<ExprId>),

    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },

    While {
        cond: ExprId,
        body: StmtId,
    },

    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    },

    Break,

    Continue,

    /// `static_assert(cond, "msg")` — checked at parse time.
    StaticAssert {
        cond: ExprId,
    },

    Empty,
}
