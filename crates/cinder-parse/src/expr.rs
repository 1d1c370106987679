//! Binary / ternary / assignment layers of the expression grammar.
//!
//! A precedence climber over the unary layer. `ExprContext` decides whether
//! `>` closes a template argument list or compares.

use crate::parser::{ExprContext, ParseResult, Parser};
use cinder_ast::{BinaryOp, ExprKind, UnaryOp};
use cinder_common::TokenKind;

pub(crate) const PREC_COMMA: u8 = 1;
pub(crate) const PREC_ASSIGN: u8 = 2;
const PREC_TERNARY: u8 = 3;
pub(crate) const PREC_LOGICAL_OR: u8 = 4;

/// `(precedence, right_associative, op)`
fn binary_op(text: &str) -> Option<(u8, bool, BinaryOp)> {
    Some(match text {
        "," => (PREC_COMMA, false, BinaryOp::Comma),
        "=" => (PREC_ASSIGN, true, BinaryOp::Assign),
        "+=" => (PREC_ASSIGN, true, BinaryOp::AddAssign),
        "-=" => (PREC_ASSIGN, true, BinaryOp::SubAssign),
        "*=" => (PREC_ASSIGN, true, BinaryOp::MulAssign),
        "/=" => (PREC_ASSIGN, true, BinaryOp::DivAssign),
        "%=" => (PREC_ASSIGN, true, BinaryOp::RemAssign),
        "&=" => (PREC_ASSIGN, true, BinaryOp::AndAssign),
        "|=" => (PREC_ASSIGN, true, BinaryOp::OrAssign),
        "^=" => (PREC_ASSIGN, true, BinaryOp::XorAssign),
        "<<=" => (PREC_ASSIGN, true, BinaryOp::ShlAssign),
        ">>=" => (PREC_ASSIGN, true, BinaryOp::ShrAssign),
        "||" => (PREC_LOGICAL_OR, false, BinaryOp::LogicalOr),
        "&&" => (5, false, BinaryOp::LogicalAnd),
        "|" => (6, false, BinaryOp::BitOr),
        "^" => (7, false, BinaryOp::BitXor),
        "&" => (8, false, BinaryOp::BitAnd),
        "==" => (9, false, BinaryOp::Eq),
        "!=" => (9, false, BinaryOp::Ne),
        "<" => (10, false, BinaryOp::Lt),
        "<=" => (10, false, BinaryOp::Le),
        ">" => (10, false, BinaryOp::Gt),
        ">=" => (10, false, BinaryOp::Ge),
        "<=>" => (11, false, BinaryOp::Spaceship),
        "<<" => (12, false, BinaryOp::Shl),
        ">>" => (12, false, BinaryOp::Shr),
        "+" => (13, false, BinaryOp::Add),
        "-" => (13, false, BinaryOp::Sub),
        "*" => (14, false, BinaryOp::Mul),
        "/" => (14, false, BinaryOp::Div),
        "%" => (14, false, BinaryOp::Rem),
        _ => return None,
    })
}

impl Parser<'_> {
    /// Pratt layer: parse at or above `min_prec` in the given context.
    pub(crate) fn parse_expression(
        &mut self,
        min_prec: u8,
        ctx: ExprContext,
    ) -> ParseResult<cinder_ast::ExprId> {
        let mut lhs = self.parse_unary(ctx)?;

        loop {
            let tok = self.peek();
            if tok.kind != TokenKind::Operator {
                break;
            }
            let text = self.view(tok).to_string();

            // Inside a template argument list, `>` closes the list and `,`
            // separates arguments; neither is an operator here.
            if ctx == ExprContext::TemplateArgument && matches!(text.as_str(), ">" | ">>" | ",") {
                break;
            }

            if text == "?" && PREC_TERNARY >= min_prec {
                self.advance();
                let then_expr = self.parse_expression(PREC_COMMA, ctx)?;
                self.expect(":")?;
                let else_expr = self.parse_expression(PREC_ASSIGN, ctx)?;
                lhs = self.alloc_expr(
                    ExprKind::Ternary {
                        cond: lhs,
                        then_expr,
                        else_expr,
                    },
                    tok,
                );
                continue;
            }

            let Some((prec, right_assoc, op)) = binary_op(&text) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            // `op ...` begins a fold; the parenthesis parser owns it.
            if self.nth_is(1, "...") {
                break;
            }
            self.advance();
            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_expression(next_min, ctx)?;
            lhs = self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, tok);
        }
        Ok(lhs)
    }

    /// Prefix operators, then the postfix-wrapped primary.
    pub(crate) fn parse_unary(&mut self, ctx: ExprContext) -> ParseResult<cinder_ast::ExprId> {
        let tok = self.peek();
        let text = self.view(tok).to_string();
        let op = match text.as_str() {
            "+" => Some(UnaryOp::Plus),
            "-" => Some(UnaryOp::Neg),
            "!" => Some(UnaryOp::Not),
            "~" => Some(UnaryOp::BitNot),
            "*" => Some(UnaryOp::Deref),
            "&" => Some(UnaryOp::AddrOf),
            "++" => Some(UnaryOp::PreIncrement),
            "--" => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary(ctx)?;
            return Ok(self.alloc_expr(
                ExprKind::Unary {
                    op,
                    operand,
                    is_builtin_addressof: false,
                },
                tok,
            ));
        }
        let primary = self.parse_primary(ctx)?;
        self.parse_postfix_chain(primary, ctx)
    }
}
