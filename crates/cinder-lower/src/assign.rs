//! Assignment lowering.
//!
//! Every lvalue the expression visitor produces carries a `Place`; plain and
//! compound assignment both dispatch on it:
//!
//! ```text
//! Local    -> Assignment(target = slot)
//! Global   -> GlobalStore(mangled name)
//! Member   -> MemberStore(object, offset)
//! Indirect -> DereferenceStore(pointer temp)
//! ```

use crate::lower::{LowerContext, Lowerer, LowerResult};
use cinder_ast::{BinaryOp as AstBinOp, ExprId, ValueType};
use cinder_common::{CompileError, ErrorKind, Token};
use cinder_ir::{
    AssignmentOp, BinaryOp, DereferenceStoreOp, GlobalStoreOp, IrOpcode, IrPayload, LoweredValue,
    MemberStoreOp, Operand, Place, TypedValue,
};

impl Lowerer<'_> {
    pub(crate) fn lower_assignment(
        &mut self,
        op: AstBinOp,
        lhs: ExprId,
        rhs: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        if op == AstBinOp::Assign {
            return self.lower_plain_assignment(lhs, rhs, token);
        }
        self.lower_compound_assignment(op, lhs, rhs, token)
    }

    fn lower_plain_assignment(
        &mut self,
        lhs: ExprId,
        rhs: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let target = self.visit_expression(lhs, LowerContext::LValueAddress)?;
        let place = target.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "assignment target is not an lvalue", token)
        })?;
        let value = self.visit_expression(rhs, LowerContext::Load)?;
        let converted = self.convert_for_store(&value, &target.spec, token)?;
        self.store_to_place(&place, converted, token)?;

        let mut out = target;
        out.typed = converted;
        out.place = Some(place);
        Ok(out)
    }

    fn lower_compound_assignment(
        &mut self,
        op: AstBinOp,
        lhs: ExprId,
        rhs: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let base = op.compound_base().ok_or_else(|| {
            CompileError::new(ErrorKind::Internal, "not a compound assignment", token)
        })?;

        // Class operands resolve `operator+=` and friends.
        if let Some(idx) = self.struct_operand_index(lhs) {
            return self.lower_overloaded_binary_on(op, idx, lhs, rhs, token);
        }

        let current = self.visit_expression(lhs, LowerContext::Load)?;
        let place = current.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "assignment target is not an lvalue", token)
        })?;

        // `ptr += n` / `ptr -= n` scale by the element size before storing.
        if current.typed.ty == ValueType::Pointer {
            if !matches!(base, AstBinOp::Add | AstBinOp::Sub) {
                return Err(CompileError::new(
                    ErrorKind::Type,
                    "invalid compound operator on a pointer",
                    token,
                ));
            }
            let amount = self.visit_expression(rhs, LowerContext::Load)?;
            let scaled = self.scale_by_element(&current, amount.typed, token);
            let opcode = if base == AstBinOp::Add {
                IrOpcode::Add
            } else {
                IrOpcode::Subtract
            };
            let updated = self.vars.next();
            self.emit(
                opcode,
                IrPayload::Binary(BinaryOp {
                    lhs: current.typed,
                    rhs: scaled,
                    result: updated,
                }),
                token,
            );
            let mut stored = current.typed;
            stored.value = Operand::Temp(updated);
            self.store_to_place(&place, stored, token)?;
            let mut out = current;
            out.typed = stored;
            out.place = Some(place);
            return Ok(out);
        }

        let rhs_value = self.visit_expression(rhs, LowerContext::Load)?;
        let rhs_conv = self.convert_numeric(
            rhs_value.typed,
            current.typed.ty,
            current.typed.size_bits,
            token,
        );

        // Named local slots take the dedicated compound opcodes; the slot
        // itself holds the updated value afterwards.
        if let Place::Local { name } = &place {
            let name = *name;
            self.emit(
                compound_opcode(op),
                IrPayload::Assignment(AssignmentOp {
                    target: Operand::Var(name),
                    value: rhs_conv,
                }),
                token,
            );
            let mut out = current;
            out.typed.value = Operand::Var(name);
            out.place = Some(Place::Local { name });
            return Ok(out);
        }

        // Everything else computes, then stores through the place.
        let opcode = self.arith_opcode(base, current.typed.ty, token)?;
        let updated = self.vars.next();
        self.emit(
            opcode,
            IrPayload::Binary(BinaryOp {
                lhs: current.typed,
                rhs: rhs_conv,
                result: updated,
            }),
            token,
        );
        let mut stored = current.typed;
        stored.value = Operand::Temp(updated);
        self.store_to_place(&place, stored, token)?;
        let mut out = current;
        out.typed = stored;
        out.place = Some(place);
        Ok(out)
    }

    /// The terminal action of the assignment state machine.
    pub(crate) fn store_to_place(
        &mut self,
        place: &Place,
        value: TypedValue,
        token: Token,
    ) -> LowerResult<()> {
        match place {
            Place::Local { name } => {
                self.emit(
                    IrOpcode::Assignment,
                    IrPayload::Assignment(AssignmentOp {
                        target: Operand::Var(*name),
                        value,
                    }),
                    token,
                );
            }
            Place::Global { name } => {
                self.emit(
                    IrOpcode::GlobalStore,
                    IrPayload::GlobalStore(GlobalStoreOp { name: *name, value }),
                    token,
                );
            }
            Place::Member {
                base,
                member,
                offset,
                ..
            } => {
                let through_pointer = self.member_base_is_pointer(*base);
                self.emit(
                    IrOpcode::MemberStore,
                    IrPayload::MemberStore(MemberStoreOp {
                        object: *base,
                        member: *member,
                        offset: *offset,
                        through_pointer,
                        value,
                    }),
                    token,
                );
            }
            Place::Indirect { pointer } => {
                self.emit(
                    IrOpcode::DereferenceStore,
                    IrPayload::DereferenceStore(DereferenceStoreOp {
                        pointer: Operand::Temp(*pointer),
                        value,
                    }),
                    token,
                );
            }
        }
        Ok(())
    }

    /// A member base is a pointer when it is a computed temp or the implicit
    /// `this`; a named object slot is stored into directly.
    pub(crate) fn member_base_is_pointer(&self, base: Operand) -> bool {
        match base {
            Operand::Temp(_) => true,
            Operand::Var(name) => self.sess.interner.view(name) == "this",
            _ => false,
        }
    }
}

fn compound_opcode(op: AstBinOp) -> IrOpcode {
    match op {
        AstBinOp::AddAssign => IrOpcode::AddAssign,
        AstBinOp::SubAssign => IrOpcode::SubtractAssign,
        AstBinOp::MulAssign => IrOpcode::MultiplyAssign,
        AstBinOp::DivAssign => IrOpcode::DivideAssign,
        AstBinOp::RemAssign => IrOpcode::ModuloAssign,
        AstBinOp::AndAssign => IrOpcode::AndAssign,
        AstBinOp::OrAssign => IrOpcode::OrAssign,
        AstBinOp::XorAssign => IrOpcode::XorAssign,
        AstBinOp::ShlAssign => IrOpcode::ShlAssign,
        _ => IrOpcode::ShrAssign,
    }
}
