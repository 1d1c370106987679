//! `__builtin_*` lowering.
//!
//! The integer abs family compiles branchless (shift out the sign, xor,
//! subtract); the float family clears the sign bit with a width-specific
//! mask. Hint builtins vanish here or pass their argument through.

use crate::lower::{LowerContext, Lowerer, LowerResult};
use cinder_ast::{ExprId, TypeSpec, ValueType};
use cinder_common::{Symbol, Token};
use cinder_ir::{BinaryOp, IrOpcode, IrPayload, LoweredValue, Operand, TypedValue};

impl Lowerer<'_> {
    pub(crate) fn lower_builtin(
        &mut self,
        name: Symbol,
        args: &[ExprId],
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let text = self.sess.interner.view(name).to_string();
        match text.as_str() {
            "__builtin_va_start" => self.lower_va_start(args, token),
            "__builtin_va_end" => Ok(void_value()),
            "__builtin_va_copy" => self.lower_va_copy(args, token),

            // Pass-through hints.
            "__builtin_expect" | "__builtin_launder" => match args.first() {
                Some(&first) => self.visit_expression(first, LowerContext::Load),
                None => Ok(void_value()),
            },

            // Pure optimizer hints: nothing at this layer, operands are not
            // evaluated.
            "__builtin_unreachable" | "__builtin_assume" => Ok(void_value()),

            "__builtin_abs" => self.lower_integer_abs(args, 32, token),
            "__builtin_labs" | "__builtin_llabs" => self.lower_integer_abs(args, 64, token),

            "__builtin_fabs" => self.lower_float_abs(args, ValueType::Double, token),
            "__builtin_fabsf" => self.lower_float_abs(args, ValueType::Float, token),

            // Anything else stays an external call under its own name.
            _ => {
                let argv = self.lower_call_arguments(None, args, token)?;
                self.finish_call(
                    Operand::Var(name),
                    TypeSpec::builtin(ValueType::Int),
                    false,
                    argv,
                    token,
                )
            }
        }
    }

    /// Branchless `abs`: `t = x >> (bits-1); (x ^ t) - t`.
    fn lower_integer_abs(
        &mut self,
        args: &[ExprId],
        bits: u32,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let first = args.first().copied().ok_or_else(|| {
            cinder_common::CompileError::new(
                cinder_common::ErrorKind::Type,
                "abs takes one argument",
                token,
            )
        })?;
        let value = self.visit_expression(first, LowerContext::Load)?;
        let ty = if bits == 64 {
            ValueType::LongLong
        } else {
            ValueType::Int
        };
        let x = self.convert_numeric(value.typed, ty, bits, token);

        let mask = self.vars.next();
        self.emit(
            IrOpcode::ShiftRight,
            IrPayload::Binary(BinaryOp {
                lhs: x,
                rhs: TypedValue::imm(ty, bits, (bits - 1) as u64),
                result: mask,
            }),
            token,
        );
        let mask_value = TypedValue::new(ty, bits, Operand::Temp(mask));
        let flipped = self.vars.next();
        self.emit(
            IrOpcode::BitwiseXor,
            IrPayload::Binary(BinaryOp {
                lhs: x,
                rhs: mask_value,
                result: flipped,
            }),
            token,
        );
        let result = self.vars.next();
        self.emit(
            IrOpcode::Subtract,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::new(ty, bits, Operand::Temp(flipped)),
                rhs: mask_value,
                result,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::new(
            ty,
            bits,
            Operand::Temp(result),
        )))
    }

    /// Clear the sign bit with the width-specific mask.
    fn lower_float_abs(
        &mut self,
        args: &[ExprId],
        ty: ValueType,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let first = args.first().copied().ok_or_else(|| {
            cinder_common::CompileError::new(
                cinder_common::ErrorKind::Type,
                "fabs takes one argument",
                token,
            )
        })?;
        let value = self.visit_expression(first, LowerContext::Load)?;
        let bits = ty.size_bits(self.sess.types.data_model());
        let converted = self.convert_numeric(value.typed, ty, bits, token);
        let mask: u64 = if bits == 64 {
            0x7FFF_FFFF_FFFF_FFFF
        } else {
            0x7FFF_FFFF
        };
        let result = self.vars.next();
        self.emit(
            IrOpcode::BitwiseAnd,
            IrPayload::Binary(BinaryOp {
                lhs: converted,
                rhs: TypedValue::imm(ty, bits, mask),
                result,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::new(
            ty,
            bits,
            Operand::Temp(result),
        )))
    }
}

fn void_value() -> LoweredValue {
    LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0))
}
