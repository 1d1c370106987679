//! Variadic-argument intrinsics for both target ABIs.
//!
//! The two `va_list` shapes live side by side here so their rules cannot
//! drift apart:
//!
//! - *pointer-typed* (`typedef char* va_list`, and everything on Win64): the
//!   list is a cursor that starts at `&last_fixed + 8` and advances 8 bytes
//!   per slot.
//! - *struct-typed* (System V): the prologue fills a compiler-generated
//!   `__varargs_va_list_struct__` with `gp_offset`, `fp_offset`,
//!   `overflow_arg_area`, `reg_save_area`; `va_arg` reads from the register
//!   save area while the offsets stay under their limits, then falls over to
//!   the overflow area.

use crate::lower::{LowerContext, Lowerer, LowerResult};
use cinder_ast::{ExprId, TypeSpec, ValueType};
use cinder_common::{CompileError, ErrorKind, Symbol, Token};
use cinder_ir::{
    AddressOfOp, AssignmentOp, BinaryOp, DereferenceOp, IrOpcode, IrPayload, LoweredValue,
    MemberLoadOp, MemberStoreOp, Operand, TempVar, TypedValue,
};
use cinder_parse::TargetAbi;

/// System V va_list field offsets (bytes).
const GP_OFFSET: u32 = 0;
const FP_OFFSET: u32 = 4;
const OVERFLOW_ARG_AREA: u32 = 8;
const REG_SAVE_AREA: u32 = 16;

/// Register save area limits: 6 GP registers, 8 FP registers of 16 bytes.
const GP_LIMIT: u64 = 48;
const FP_LIMIT: u64 = 176;

impl Lowerer<'_> {
    /// `__builtin_va_start(va, last_fixed)`.
    pub(crate) fn lower_va_start(
        &mut self,
        args: &[ExprId],
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let (&va, &last) = match args {
            [va, last] => (va, last),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Type,
                    "va_start takes the list and the last fixed parameter",
                    token,
                ))
            }
        };

        let target = self.visit_expression(va, LowerContext::LValueAddress)?;
        let place = target.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "va_start target is not an lvalue", token)
        })?;

        let pointer = if self.va_list_is_pointer(va) {
            // Cursor starts one slot past the last fixed parameter.
            let last_value = self.visit_expression(last, LowerContext::LValueAddress)?;
            let last_place = last_value.place.clone().ok_or_else(|| {
                CompileError::new(ErrorKind::Type, "va_start needs a named parameter", token)
            })?;
            let addr = self.address_of_place(&last_place, token)?;
            let cursor = self.vars.next();
            self.emit(
                IrOpcode::Add,
                IrPayload::Binary(BinaryOp {
                    lhs: TypedValue::pointer(Operand::Temp(addr), 1),
                    rhs: TypedValue::imm(ValueType::UnsignedLongLong, 64, 8),
                    result: cursor,
                }),
                token,
            );
            cursor
        } else {
            // The prologue already filled the va_list struct; the list
            // variable just points at it.
            let va_struct = self.sess.interner.intern("__varargs_va_list_struct__");
            let addr = self.vars.next();
            self.emit(
                IrOpcode::AddressOf,
                IrPayload::AddressOf(AddressOfOp {
                    source: Operand::Var(va_struct),
                    offset: 0,
                    result: addr,
                }),
                token,
            );
            addr
        };

        self.store_to_place(&place, TypedValue::pointer(Operand::Temp(pointer), 1), token)?;
        Ok(LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0)))
    }

    /// `__builtin_va_copy(dst, src)`: the list value copies as one slot.
    pub(crate) fn lower_va_copy(
        &mut self,
        args: &[ExprId],
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let (&dst, &src) = match args {
            [dst, src] => (dst, src),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Type,
                    "va_copy takes a destination and a source list",
                    token,
                ))
            }
        };
        let target = self.visit_expression(dst, LowerContext::LValueAddress)?;
        let place = target.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "va_copy target is not an lvalue", token)
        })?;
        let source = self.visit_expression(src, LowerContext::Load)?;
        self.store_to_place(&place, source.typed, token)?;
        Ok(LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0)))
    }

    /// `__builtin_va_arg(va, T)`.
    pub(crate) fn lower_va_arg(
        &mut self,
        va: ExprId,
        ty: &TypeSpec,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let ty = if ty.is_dependent() {
            self.sess.engine().resolve_spec(ty.clone()).ok_or_else(|| {
                CompileError::new(ErrorKind::Template, "va_arg type is unresolved", token)
            })?
        } else {
            ty.clone()
        };
        let (vt, idx) = self.spec_category(&ty);
        let bits = if ty.pointer_depth > 0 {
            64
        } else {
            self.sess.types.spec_size_bits(&ty).max(8)
        };

        if self.va_list_is_pointer(va) {
            self.lower_va_arg_cursor(va, vt, idx, bits, token)
        } else {
            self.lower_va_arg_sysv(va, vt, idx, bits, token)
        }
    }

    /// Pointer-typed list: read at the cursor, advance by one 8-byte slot.
    /// Structs wider than a slot are passed by pointer and need a second
    /// dereference.
    fn lower_va_arg_cursor(
        &mut self,
        va: ExprId,
        vt: ValueType,
        idx: cinder_ast::TypeIndex,
        bits: u32,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let cursor = self.visit_expression(va, LowerContext::Load)?;
        let place = cursor.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "va_arg list is not an lvalue", token)
        })?;

        let value = if vt == ValueType::Struct && bits > 64 {
            let boxed = self.vars.next();
            self.emit(
                IrOpcode::Dereference,
                IrPayload::Dereference(DereferenceOp {
                    pointer: TypedValue::pointer(cursor.typed.value, 1),
                    size_bits: 64,
                    result: boxed,
                }),
                token,
            );
            let result = self.vars.next();
            self.emit(
                IrOpcode::Dereference,
                IrPayload::Dereference(DereferenceOp {
                    pointer: TypedValue::pointer(Operand::Temp(boxed), 1),
                    size_bits: bits,
                    result,
                }),
                token,
            );
            result
        } else {
            let result = self.vars.next();
            self.emit(
                IrOpcode::Dereference,
                IrPayload::Dereference(DereferenceOp {
                    pointer: TypedValue::pointer(cursor.typed.value, 1),
                    size_bits: bits,
                    result,
                }),
                token,
            );
            result
        };

        let advanced = self.vars.next();
        self.emit(
            IrOpcode::Add,
            IrPayload::Binary(BinaryOp {
                lhs: cursor.typed,
                rhs: TypedValue::imm(ValueType::UnsignedLongLong, 64, 8),
                result: advanced,
            }),
            token,
        );
        let mut stored = cursor.typed;
        stored.value = Operand::Temp(advanced);
        self.store_to_place(&place, stored, token)?;

        Ok(LoweredValue::prvalue(TypedValue::new(vt, bits, Operand::Temp(value)))
            .with_type_index(idx))
    }

    /// Struct-typed System V list: branch on the saved-register offset.
    fn lower_va_arg_sysv(
        &mut self,
        va: ExprId,
        vt: ValueType,
        idx: cinder_ast::TypeIndex,
        bits: u32,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let list = self.visit_expression(va, LowerContext::Load)?;
        let list_ptr = list.typed.value;
        let is_float = vt.is_floating_point();
        let (field_name, field_offset, limit, advance) = if is_float {
            ("fp_offset", FP_OFFSET, FP_LIMIT, 16u64)
        } else {
            ("gp_offset", GP_OFFSET, GP_LIMIT, 8u64)
        };
        let field = self.sess.interner.intern(field_name);

        let offset = self.load_va_field(list_ptr, field, field_offset, ValueType::UnsignedInt, 32, token);
        let in_registers = self.vars.next();
        self.emit(
            IrOpcode::UnsignedLessThan,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::new(ValueType::UnsignedInt, 32, Operand::Temp(offset)),
                rhs: TypedValue::imm(ValueType::UnsignedInt, 32, limit),
                result: in_registers,
            }),
            token,
        );

        let reg_label = self.fresh_label("va_reg");
        let mem_label = self.fresh_label("va_mem");
        let end_label = self.fresh_label("va_end");
        let result = self.vars.next();
        self.emit_cond_branch(
            TypedValue::new(ValueType::Bool, 8, Operand::Temp(in_registers)),
            reg_label,
            mem_label,
            token,
        );

        // Register path: read reg_save_area + offset, advance the offset.
        self.emit_label(reg_label, token);
        let save_area_field = self.sess.interner.intern("reg_save_area");
        let save_area = self.load_va_field(
            list_ptr,
            save_area_field,
            REG_SAVE_AREA,
            ValueType::Pointer,
            64,
            token,
        );
        let slot = self.vars.next();
        self.emit(
            IrOpcode::Add,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::pointer(Operand::Temp(save_area), 1),
                rhs: TypedValue::new(ValueType::UnsignedInt, 32, Operand::Temp(offset)),
                result: slot,
            }),
            token,
        );
        let reg_value = self.vars.next();
        self.emit(
            IrOpcode::Dereference,
            IrPayload::Dereference(DereferenceOp {
                pointer: TypedValue::pointer(Operand::Temp(slot), 1),
                size_bits: bits,
                result: reg_value,
            }),
            token,
        );
        self.emit(
            IrOpcode::Assignment,
            IrPayload::Assignment(AssignmentOp {
                target: Operand::Temp(result),
                value: TypedValue::new(vt, bits, Operand::Temp(reg_value)),
            }),
            token,
        );
        let advanced = self.vars.next();
        self.emit(
            IrOpcode::Add,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::new(ValueType::UnsignedInt, 32, Operand::Temp(offset)),
                rhs: TypedValue::imm(ValueType::UnsignedInt, 32, advance),
                result: advanced,
            }),
            token,
        );
        self.store_va_field(
            list_ptr,
            field,
            field_offset,
            TypedValue::new(ValueType::UnsignedInt, 32, Operand::Temp(advanced)),
            token,
        );
        self.emit_branch(end_label, token);

        // Overflow path: read the stack area, bump it one slot.
        self.emit_label(mem_label, token);
        let overflow_field = self.sess.interner.intern("overflow_arg_area");
        let overflow = self.load_va_field(
            list_ptr,
            overflow_field,
            OVERFLOW_ARG_AREA,
            ValueType::Pointer,
            64,
            token,
        );
        let mem_value = self.vars.next();
        self.emit(
            IrOpcode::Dereference,
            IrPayload::Dereference(DereferenceOp {
                pointer: TypedValue::pointer(Operand::Temp(overflow), 1),
                size_bits: bits,
                result: mem_value,
            }),
            token,
        );
        self.emit(
            IrOpcode::Assignment,
            IrPayload::Assignment(AssignmentOp {
                target: Operand::Temp(result),
                value: TypedValue::new(vt, bits, Operand::Temp(mem_value)),
            }),
            token,
        );
        let bumped = self.vars.next();
        self.emit(
            IrOpcode::Add,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::pointer(Operand::Temp(overflow), 1),
                rhs: TypedValue::imm(ValueType::UnsignedLongLong, 64, 8),
                result: bumped,
            }),
            token,
        );
        self.store_va_field(
            list_ptr,
            overflow_field,
            OVERFLOW_ARG_AREA,
            TypedValue::pointer(Operand::Temp(bumped), 1),
            token,
        );
        self.emit_branch(end_label, token);
        self.emit_label(end_label, token);

        Ok(LoweredValue::prvalue(TypedValue::new(vt, bits, Operand::Temp(result)))
            .with_type_index(idx))
    }

    fn load_va_field(
        &mut self,
        list: Operand,
        member: Symbol,
        offset: u32,
        ty: ValueType,
        bits: u32,
        token: Token,
    ) -> TempVar {
        let result = self.vars.next();
        self.emit(
            IrOpcode::MemberAccess,
            IrPayload::MemberLoad(MemberLoadOp {
                object: list,
                member,
                offset,
                ty,
                size_bits: bits,
                pointer_depth: u32::from(ty == ValueType::Pointer),
                through_pointer: true,
                result,
            }),
            token,
        );
        result
    }

    fn store_va_field(
        &mut self,
        list: Operand,
        member: Symbol,
        offset: u32,
        value: TypedValue,
        token: Token,
    ) {
        self.emit(
            IrOpcode::MemberStore,
            IrPayload::MemberStore(MemberStoreOp {
                object: list,
                member,
                offset,
                through_pointer: true,
                value,
            }),
            token,
        );
    }

    /// Pointer-typed `va_list` (user `typedef char*`, or anything on the
    /// Win64 ABI) takes the cursor path; the System V struct list branches
    /// on saved-register offsets.
    fn va_list_is_pointer(&self, va: ExprId) -> bool {
        if self.sess.context.abi == TargetAbi::Win64 {
            return true;
        }
        self.static_type_of(va)
            .map(|spec| spec.pointer_depth > 0)
            .unwrap_or(false)
    }
}
