//! The postfix layer: subscripts, calls, member access, pseudo-destructor
//! calls, increment/decrement, and pointer-to-member access, applied
//! iteratively to the primary result.

use crate::parser::{ExprContext, ParseResult, Parser};
use cinder_ast::{ExprId, ExprKind, TypeSpecKind, UnaryOp, ValueType};
use cinder_common::TokenKind;

impl Parser<'_> {
    pub(crate) fn parse_postfix_chain(
        &mut self,
        mut expr: ExprId,
        ctx: ExprContext,
    ) -> ParseResult<ExprId> {
        loop {
            let tok = self.peek();
            let text = self.view(tok).to_string();
            match text.as_str() {
                "[" => {
                    self.advance();
                    let index = self.parse_expression(crate::expr::PREC_COMMA, ctx)?;
                    self.expect("]")?;
                    expr = self.alloc_expr(ExprKind::ArraySubscript { array: expr, index }, tok);
                }
                "(" => {
                    let args = self.parse_call_arguments()?;
                    expr = self.finish_postfix_call(expr, args, tok)?;
                }
                "." | "->" => {
                    let is_arrow = text == "->";
                    self.advance();
                    if self.at("~") {
                        // Pseudo-destructor call: obj.~T()
                        self.advance();
                        self.advance(); // type name
                        self.expect("(")?;
                        self.expect(")")?;
                        expr = self.alloc_expr(
                            ExprKind::PseudoDestructorCall { object: expr },
                            tok,
                        );
                        continue;
                    }
                    let member_tok = self.advance();
                    if member_tok.kind != TokenKind::Identifier {
                        return Err(self.error_at(
                            cinder_common::ErrorKind::Syntax,
                            "expected member name",
                            member_tok,
                        ));
                    }
                    if self.at("(") {
                        let args = self.parse_call_arguments()?;
                        let mangled = self.member_call_mangled(expr, member_tok.value);
                        expr = self.alloc_expr(
                            ExprKind::MemberFunctionCall {
                                object: expr,
                                method: member_tok.value,
                                args,
                                is_arrow,
                                mangled_name: mangled,
                            },
                            tok,
                        );
                    } else {
                        expr = self.alloc_expr(
                            ExprKind::MemberAccess {
                                object: expr,
                                member: member_tok.value,
                                is_arrow,
                            },
                            tok,
                        );
                    }
                }
                ".*" | "->*" => {
                    let is_arrow = text == "->*";
                    self.advance();
                    let pointer = self.parse_unary(ctx)?;
                    expr = self.alloc_expr(
                        ExprKind::PointerToMemberAccess {
                            object: expr,
                            pointer,
                            is_arrow,
                        },
                        tok,
                    );
                }
                "++" => {
                    self.advance();
                    expr = self.alloc_expr(
                        ExprKind::Unary {
                            op: UnaryOp::PostIncrement,
                            operand: expr,
                            is_builtin_addressof: false,
                        },
                        tok,
                    );
                }
                "--" => {
                    self.advance();
                    expr = self.alloc_expr(
                        ExprKind::Unary {
                            op: UnaryOp::PostDecrement,
                            operand: expr,
                            is_builtin_addressof: false,
                        },
                        tok,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    pub(crate) fn parse_call_arguments(&mut self) -> ParseResult<Vec<ExprId>> {
        self.expect("(")?;
        let mut args = Vec::new();
        while !self.at(")") && !self.tokens.at_eof() {
            let arg = self.parse_expression(crate::expr::PREC_ASSIGN, ExprContext::Normal)?;
            // Pack expansion in the argument list: `f(args...)`.
            if self.at("...") {
                self.advance();
                let pack = self.pack_name_of(arg);
                if let Some(pack) = pack {
                    let expansion =
                        self.alloc_expr(ExprKind::PackExpansion { pattern: arg, pack }, self.peek());
                    args.push(expansion);
                } else {
                    args.push(arg);
                }
            } else {
                args.push(arg);
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok(args)
    }

    /// The pack a pattern expression expands over, if any.
    fn pack_name_of(&self, expr: ExprId) -> Option<cinder_common::Symbol> {
        match &self.arenas().expr(expr).kind {
            ExprKind::TemplateParameterReference { name, is_pack: true } => Some(*name),
            ExprKind::Identifier { name } if self.is_pack_param(*name) => Some(*name),
            ExprKind::Unary { operand, .. } => self.pack_name_of(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.pack_name_of(*lhs).or_else(|| self.pack_name_of(*rhs))
            }
            ExprKind::FunctionCall { args, .. } => {
                args.iter().find_map(|a| self.pack_name_of(*a))
            }
            _ => None,
        }
    }

    /// A call applied to an already-parsed postfix expression: member
    /// function calls keep their member shape; everything else goes through
    /// the callee value (function pointer, lambda).
    fn finish_postfix_call(
        &mut self,
        callee: ExprId,
        args: Vec<ExprId>,
        tok: cinder_common::Token,
    ) -> ParseResult<ExprId> {
        let kind = self.arenas().expr(callee).kind.clone();
        match kind {
            ExprKind::MemberAccess {
                object,
                member,
                is_arrow,
            } => {
                let mangled = self.member_call_mangled(object, member);
                Ok(self.alloc_expr(
                    ExprKind::MemberFunctionCall {
                        object,
                        method: member,
                        args,
                        is_arrow,
                        mangled_name: mangled,
                    },
                    tok,
                ))
            }
            _ => Ok(self.alloc_expr(ExprKind::IndirectCall { callee, args }, tok)),
        }
    }

    /// Resolve the mangled name of a member call when the object type is
    /// already known; lazy instantiations define the member on demand.
    pub(crate) fn member_call_mangled(
        &mut self,
        object: ExprId,
        method: cinder_common::Symbol,
    ) -> Option<cinder_common::Symbol> {
        let obj_ty = self.infer_type(object, false)?;
        let idx = match obj_ty.kind {
            TypeSpecKind::Indexed(idx) => idx,
            _ => return None,
        };
        let (vt, idx) = self.spec_category(&cinder_ast::TypeSpec::indexed(idx));
        if vt != ValueType::Struct {
            return None;
        }
        if self
            .sess
            .types
            .struct_info(idx)
            .map(|i| i.is_template_instantiation)
            .unwrap_or(false)
        {
            // Member call on a lazy instantiation defines that member.
            self.sess.engine().ensure_member_defined(idx, method);
        }
        self.sess
            .types
            .struct_info(idx)?
            .member_function(method)?
            .mangled_name
    }
}
