use crate::decl::Decl;
use crate::expr::Expr;
use crate::stmt::Stmt;

/// Id of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

/// Id of a declaration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(u32);

/// Id of a statement node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl StmtId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Append-only node storage for one compilation.
///
/// Nodes are never moved or freed individually; ids stay valid until the
/// arenas are dropped at the end of the compilation.
#[derive(Debug, Default)]
pub struct Arenas {
    exprs: Vec<Expr>,
    decls: Vec<Decl>,
    stmts: Vec<Stmt>,
}

impl Arenas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn alloc_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    /// Replace a declaration in place. Used when a forward placeholder is
    /// later completed by a real definition; the id stays stable.
    pub fn replace_decl(&mut self, id: DeclId, decl: Decl) {
        self.decls[id.index()] = decl;
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;
    use cinder_common::{SourceMap, Symbol, SymbolInterner, Token, TokenKind};

    fn dummy_token(interner: &mut SymbolInterner) -> Token {
        let mut sources = SourceMap::new();
        let file = sources.add_file("arena.cpp");
        Token::new(TokenKind::Identifier, interner.intern("x"), file, 1, 1)
    }

    #[test]
    fn ids_are_stable_across_growth() {
        let mut interner = SymbolInterner::new();
        let tok = dummy_token(&mut interner);
        let mut arenas = Arenas::new();
        let first = arenas.alloc_expr(Expr::new(ExprKind::BoolLiteral(true), tok));
        for _ in 0..100 {
            arenas.alloc_expr(Expr::new(ExprKind::BoolLiteral(false), tok));
        }
        assert!(matches!(arenas.expr(first).kind, ExprKind::BoolLiteral(true)));
        assert_eq!(arenas.expr_count(), 101);
    }

    #[test]
    fn identifier_round_trips() {
        let mut interner = SymbolInterner::new();
        let tok = dummy_token(&mut interner);
        let name: Symbol = tok.value;
        let mut arenas = Arenas::new();
        let id = arenas.alloc_expr(Expr::new(ExprKind::Identifier { name }, tok));
        match arenas.expr(id).kind {
            ExprKind::Identifier { name: n } => assert_eq!(n, name),
            _ => panic!("wrong variant"),
        }
    }
}
