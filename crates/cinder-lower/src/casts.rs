//! Cast lowering and the numeric-conversion primitive shared by the
//! arithmetic, assignment, and call paths.
//!
//! Conversion rules: same size and kind is a retag with no instruction;
//! widening picks sign or zero extension from the source's signedness;
//! narrowing truncates; int/float crossings get the dedicated opcodes.
//! Literal operands fold at compile time instead of emitting anything.

use crate::lower::{LowerContext, Lowerer, LowerResult};
use cinder_ast::{CastKind, ExprId, TypeSpec, ValueType};
use cinder_common::{CompileError, ErrorKind, Token};
use cinder_ir::{
    BinaryOp, CallOp, ConversionOp, IrOpcode, IrPayload, LoweredValue, Operand, TypedValue,
};

impl Lowerer<'_> {
    pub(crate) fn lower_cast(
        &mut self,
        kind: CastKind,
        target: &TypeSpec,
        operand: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let target = self.resolve_target_spec(target, token)?;
        let value = self.visit_expression(operand, LowerContext::Load)?;

        match kind {
            CastKind::Dynamic => self.lower_dynamic_cast(&target, value, token),

            // cv qualification only; the value is untouched.
            CastKind::Const => {
                let mut lv = self.value_of_slot_spec(value.typed.value, &target);
                lv.place = value.place;
                Ok(lv)
            }

            CastKind::Reinterpret => {
                // Bit reinterpretation: no instruction when the sizes match.
                let to_bits = self.target_bits(&target);
                if value.typed.size_bits == to_bits {
                    let mut lv = self.value_of_slot_spec(value.typed.value, &target);
                    lv.place = None;
                    return Ok(lv);
                }
                let typed = self.convert_numeric(
                    value.typed,
                    unsigned_of_bits(to_bits),
                    to_bits,
                    token,
                );
                let mut lv = self.value_of_slot_spec(typed.value, &target);
                lv.place = None;
                Ok(lv)
            }

            CastKind::Static | CastKind::CStyle | CastKind::Functional => {
                let typed = self.convert_for_store(&value, &target, token)?;
                let mut lv = self.value_of_slot_spec(typed.value, &target);
                lv.place = None;
                Ok(lv)
            }
        }
    }

    fn resolve_target_spec(&mut self, target: &TypeSpec, token: Token) -> LowerResult<TypeSpec> {
        if !target.is_dependent() {
            return Ok(target.clone());
        }
        self.sess
            .engine()
            .resolve_spec(target.clone())
            .ok_or_else(|| {
                CompileError::new(ErrorKind::Template, "cast target type is unresolved", token)
            })
    }

    fn target_bits(&self, spec: &TypeSpec) -> u32 {
        if spec.pointer_depth > 0 {
            return 64;
        }
        self.sess.types.spec_size_bits(spec)
    }

    /// RTTI-backed downcast; the runtime collaborator supplies
    /// `__dynamic_cast`.
    fn lower_dynamic_cast(
        &mut self,
        target: &TypeSpec,
        value: LoweredValue,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let callee = self.sess.interner.intern("__dynamic_cast");
        let result = self.vars.next();
        self.emit(
            IrOpcode::FunctionCall,
            IrPayload::Call(CallOp {
                function: Operand::Var(callee),
                args: vec![value.typed],
                return_type: ValueType::Pointer,
                return_size_bits: 64,
                result: Some(result),
                return_slot: None,
                is_variadic: false,
            }),
            token,
        );
        let mut lv = self.value_of_slot_spec(Operand::Temp(result), target);
        lv.place = None;
        Ok(lv)
    }

    /// Convert `value` so it can be stored into (or passed as) `target`.
    pub(crate) fn convert_for_store(
        &mut self,
        value: &LoweredValue,
        target: &TypeSpec,
        token: Token,
    ) -> LowerResult<TypedValue> {
        let target = self.resolve_target_spec(target, token)?;

        if target.pointer_depth > 0 || target.array_size.is_some() {
            let depth = target.pointer_depth + u32::from(target.array_size.is_some());
            let mut typed = if value.typed.size_bits < 64 {
                self.convert_numeric(value.typed, ValueType::UnsignedLongLong, 64, token)
            } else {
                value.typed
            };
            typed.ty = ValueType::Pointer;
            typed.pointer_depth = depth;
            typed.size_bits = 64;
            return Ok(typed);
        }

        let (vt, idx) = self.spec_category(&target);
        match vt {
            // Struct stores copy the whole object; the backend block-copies.
            ValueType::Struct => Ok(value.typed),
            ValueType::Enum => {
                let bits = self.sess.types.size_bits(ValueType::Enum, idx);
                Ok(self.convert_numeric(value.typed, ValueType::Enum, bits, token))
            }
            ValueType::Void => Ok(value.typed),
            other => {
                let bits = other.size_bits(self.sess.types.data_model());
                Ok(self.convert_numeric(value.typed, other, bits, token))
            }
        }
    }

    /// The scalar conversion kernel. Folds immediates; otherwise emits at
    /// most one conversion instruction.
    pub(crate) fn convert_numeric(
        &mut self,
        value: TypedValue,
        to_ty: ValueType,
        to_bits: u32,
        token: Token,
    ) -> TypedValue {
        if value.ty == to_ty && value.size_bits == to_bits {
            return value;
        }

        // Literal conversions fold at compile time.
        match value.value {
            Operand::Imm(v) if to_ty.is_floating_point() => {
                let f = if value.ty.is_signed() {
                    v as i64 as f64
                } else {
                    v as f64
                };
                return TypedValue {
                    ty: to_ty,
                    size_bits: to_bits,
                    pointer_depth: 0,
                    value: Operand::FloatImm(f),
                    is_reference: false,
                };
            }
            Operand::Imm(v) => {
                let folded = if to_bits >= 64 {
                    v
                } else {
                    v & ((1u64 << to_bits) - 1)
                };
                return TypedValue {
                    ty: to_ty,
                    size_bits: to_bits,
                    pointer_depth: if to_ty == ValueType::Pointer { 1 } else { 0 },
                    value: Operand::Imm(folded),
                    is_reference: false,
                };
            }
            Operand::FloatImm(f) if !to_ty.is_floating_point() => {
                return TypedValue {
                    ty: to_ty,
                    size_bits: to_bits,
                    pointer_depth: 0,
                    value: Operand::Imm(f as i64 as u64),
                    is_reference: false,
                };
            }
            Operand::FloatImm(_) => {
                let mut out = value;
                out.ty = to_ty;
                out.size_bits = to_bits;
                return out;
            }
            _ => {}
        }

        // Any scalar narrowed to bool becomes a `!= 0` test.
        if to_ty == ValueType::Bool && value.ty != ValueType::Bool {
            return self.normalize_to_bool(value, token);
        }

        let from_float = value.ty.is_floating_point();
        let to_float = to_ty.is_floating_point();
        let opcode = if from_float && to_float {
            IrOpcode::FloatToFloat
        } else if from_float {
            IrOpcode::FloatToInt
        } else if to_float {
            IrOpcode::IntToFloat
        } else if to_bits > value.size_bits {
            if value.ty.is_signed() {
                IrOpcode::SignExtend
            } else {
                IrOpcode::ZeroExtend
            }
        } else if to_bits < value.size_bits {
            IrOpcode::Truncate
        } else {
            // Same width, different signedness or kind: a retag.
            let mut out = value;
            out.ty = to_ty;
            return out;
        };

        let result = self.vars.next();
        self.emit(
            opcode,
            IrPayload::Conversion(ConversionOp {
                value,
                to_ty,
                to_size_bits: to_bits,
                result,
            }),
            token,
        );
        TypedValue {
            ty: to_ty,
            size_bits: to_bits,
            pointer_depth: if to_ty == ValueType::Pointer { 1 } else { 0 },
            value: Operand::Temp(result),
            is_reference: false,
        }
    }

    /// `v != 0` as a bool-8, unless `v` already is one.
    pub(crate) fn normalize_to_bool(&mut self, value: TypedValue, token: Token) -> TypedValue {
        if value.ty == ValueType::Bool && value.size_bits == 8 {
            return value;
        }
        let opcode = if value.ty.is_floating_point() {
            IrOpcode::FloatNotEqual
        } else {
            IrOpcode::NotEqual
        };
        let zero = if value.ty.is_floating_point() {
            TypedValue {
                ty: value.ty,
                size_bits: value.size_bits,
                pointer_depth: 0,
                value: Operand::FloatImm(0.0),
                is_reference: false,
            }
        } else {
            TypedValue::imm(value.ty, value.size_bits, 0)
        };
        let result = self.vars.next();
        self.emit(
            opcode,
            IrPayload::Binary(BinaryOp {
                lhs: value,
                rhs: zero,
                result,
            }),
            token,
        );
        TypedValue::new(ValueType::Bool, 8, Operand::Temp(result))
    }
}

fn unsigned_of_bits(bits: u32) -> ValueType {
    match bits {
        8 => ValueType::UnsignedChar,
        16 => ValueType::UnsignedShort,
        32 => ValueType::UnsignedInt,
        _ => ValueType::UnsignedLongLong,
    }
}
