//! Binary, unary, and comparison lowering.
//!
//! Pointer arithmetic runs before common-type promotion so the pointer side
//! never gets truncated; class operands divert to operator-overload calls
//! before any of the scalar machinery sees them.

use crate::lower::{LowerContext, Lowerer, LowerResult};
use cinder_ast::{
    BinaryOp as AstBinOp, DeclKind, ExprId, ExprKind, TypeIndex, TypeSpecKind, UnaryOp, ValueType,
};
use cinder_common::{CompileError, ErrorKind, Token};
use cinder_ir::{
    AssignmentOp, BinaryOp, FunctionAddressOp, IrOpcode, IrPayload, LoweredValue, Operand, Place,
    TypedValue, UnaryOp as IrUnaryOp,
};

impl Lowerer<'_> {
    pub(crate) fn lower_binary(
        &mut self,
        op: AstBinOp,
        lhs: ExprId,
        rhs: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        if op.is_assignment() {
            return self.lower_assignment(op, lhs, rhs, token);
        }
        if op == AstBinOp::Comma {
            self.visit_expression(lhs, LowerContext::Load)?;
            return self.visit_expression(rhs, LowerContext::Load);
        }

        // Operator overloads exist only for class operands; builtin types
        // always take the primitive path.
        if let Some(idx) = self.struct_operand_index(lhs) {
            return self.lower_overloaded_binary_on(op, idx, lhs, rhs, token);
        }

        let lhs_value = self.visit_expression(lhs, LowerContext::Load)?;
        let rhs_value = self.visit_expression(rhs, LowerContext::Load)?;
        let lt = lhs_value.typed;
        let rt = rhs_value.typed;

        // Pointer arithmetic, before promotion would 32-bit the pointer.
        let l_ptr = lt.ty == ValueType::Pointer;
        let r_ptr = rt.ty == ValueType::Pointer;
        match op {
            AstBinOp::Add if l_ptr && rt.ty.is_integral() => {
                return self.lower_pointer_offset(lhs_value, rt, IrOpcode::Add, token);
            }
            AstBinOp::Add if r_ptr && lt.ty.is_integral() => {
                return self.lower_pointer_offset(rhs_value, lt, IrOpcode::Add, token);
            }
            AstBinOp::Sub if l_ptr && rt.ty.is_integral() => {
                return self.lower_pointer_offset(lhs_value, rt, IrOpcode::Subtract, token);
            }
            AstBinOp::Sub if l_ptr && r_ptr => {
                return self.lower_pointer_difference(lhs_value, rhs_value, token);
            }
            _ => {}
        }

        if matches!(op, AstBinOp::LogicalAnd | AstBinOp::LogicalOr) {
            let l = self.normalize_to_bool(lt, token);
            let r = self.normalize_to_bool(rt, token);
            let opcode = if op == AstBinOp::LogicalAnd {
                IrOpcode::LogicalAnd
            } else {
                IrOpcode::LogicalOr
            };
            let result = self.vars.next();
            self.emit(
                opcode,
                IrPayload::Binary(BinaryOp {
                    lhs: l,
                    rhs: r,
                    result,
                }),
                token,
            );
            return Ok(LoweredValue::prvalue(TypedValue::new(
                ValueType::Bool,
                8,
                Operand::Temp(result),
            )));
        }

        if op.is_comparison() {
            return self.lower_comparison(op, lt, rt, token);
        }

        if op == AstBinOp::Spaceship {
            return self.lower_scalar_spaceship(lt, rt, token);
        }

        // Plain arithmetic and bitwise: promote, emit, mark PRValue.
        let (cvt, cbits) = common_arithmetic_type(lt, rt);
        let l = self.convert_numeric(lt, cvt, cbits, token);
        let r = self.convert_numeric(rt, cvt, cbits, token);
        let opcode = self.arith_opcode(op, cvt, token)?;
        let result = self.vars.next();
        self.emit(
            opcode,
            IrPayload::Binary(BinaryOp {
                lhs: l,
                rhs: r,
                result,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::new(
            cvt,
            cbits,
            Operand::Temp(result),
        )))
    }

    /// `ptr + n` / `ptr - n`: scale the integer by `sizeof(*ptr)`.
    fn lower_pointer_offset(
        &mut self,
        pointer: LoweredValue,
        amount: TypedValue,
        opcode: IrOpcode,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let scaled = self.scale_by_element(&pointer, amount, token);
        let result = self.vars.next();
        self.emit(
            opcode,
            IrPayload::Binary(BinaryOp {
                lhs: pointer.typed,
                rhs: scaled,
                result,
            }),
            token,
        );
        let mut out = pointer;
        out.typed.value = Operand::Temp(result);
        out.place = None;
        Ok(out)
    }

    /// Multiply `amount` by the byte size of the pointer's element.
    pub(crate) fn scale_by_element(
        &mut self,
        pointer: &LoweredValue,
        amount: TypedValue,
        token: Token,
    ) -> TypedValue {
        let element_bytes = (self.element_size_bits(&pointer.spec) / 8).max(1) as u64;
        let widened = self.convert_numeric(amount, ValueType::UnsignedLongLong, 64, token);
        if element_bytes == 1 {
            return widened;
        }
        if let Operand::Imm(n) = widened.value {
            return TypedValue::imm(ValueType::UnsignedLongLong, 64, n * element_bytes);
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::Multiply,
            IrPayload::Binary(BinaryOp {
                lhs: widened,
                rhs: TypedValue::imm(ValueType::UnsignedLongLong, 64, element_bytes),
                result,
            }),
            token,
        );
        TypedValue::new(ValueType::UnsignedLongLong, 64, Operand::Temp(result))
    }

    /// `ptr - ptr`: address difference divided by the element size, as
    /// `ptrdiff_t`.
    fn lower_pointer_difference(
        &mut self,
        lhs: LoweredValue,
        rhs: LoweredValue,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let diff = self.vars.next();
        self.emit(
            IrOpcode::Subtract,
            IrPayload::Binary(BinaryOp {
                lhs: lhs.typed,
                rhs: rhs.typed,
                result: diff,
            }),
            token,
        );
        let element_bytes = (self.element_size_bits(&lhs.spec) / 8).max(1) as u64;
        if element_bytes == 1 {
            return Ok(LoweredValue::prvalue(TypedValue::new(
                ValueType::LongLong,
                64,
                Operand::Temp(diff),
            )));
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::Divide,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::new(ValueType::LongLong, 64, Operand::Temp(diff)),
                rhs: TypedValue::imm(ValueType::LongLong, 64, element_bytes),
                result,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::new(
            ValueType::LongLong,
            64,
            Operand::Temp(result),
        )))
    }

    /// Comparisons return bool-8. Pointers compare as unsigned 64-bit;
    /// floats take the float opcodes.
    fn lower_comparison(
        &mut self,
        op: AstBinOp,
        lt: TypedValue,
        rt: TypedValue,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let any_float = lt.ty.is_floating_point() || rt.ty.is_floating_point();
        let any_pointer = lt.ty == ValueType::Pointer || rt.ty == ValueType::Pointer;

        let (l, r, float, unsigned) = if any_float {
            let (cvt, cbits) = common_arithmetic_type(lt, rt);
            (
                self.convert_numeric(lt, cvt, cbits, token),
                self.convert_numeric(rt, cvt, cbits, token),
                true,
                false,
            )
        } else if any_pointer {
            let mut l = self.convert_numeric(lt, ValueType::UnsignedLongLong, 64, token);
            let mut r = self.convert_numeric(rt, ValueType::UnsignedLongLong, 64, token);
            l.ty = ValueType::UnsignedLongLong;
            r.ty = ValueType::UnsignedLongLong;
            (l, r, false, true)
        } else {
            let (cvt, cbits) = common_arithmetic_type(lt, rt);
            (
                self.convert_numeric(lt, cvt, cbits, token),
                self.convert_numeric(rt, cvt, cbits, token),
                false,
                !cvt.is_signed(),
            )
        };

        let opcode = comparison_opcode(op, float, unsigned);
        let result = self.vars.next();
        self.emit(
            opcode,
            IrPayload::Binary(BinaryOp {
                lhs: l,
                rhs: r,
                result,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::new(
            ValueType::Bool,
            8,
            Operand::Temp(result),
        )))
    }

    /// Builtin `<=>` yields `(l > r) - (l < r)` as an int.
    fn lower_scalar_spaceship(
        &mut self,
        lt: TypedValue,
        rt: TypedValue,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let gt = self.lower_comparison(AstBinOp::Gt, lt, rt, token)?;
        let lt_cmp = self.lower_comparison(AstBinOp::Lt, lt, rt, token)?;
        let g = self.convert_numeric(gt.typed, ValueType::Int, 32, token);
        let l = self.convert_numeric(lt_cmp.typed, ValueType::Int, 32, token);
        let result = self.vars.next();
        self.emit(
            IrOpcode::Subtract,
            IrPayload::Binary(BinaryOp {
                lhs: g,
                rhs: l,
                result,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::new(
            ValueType::Int,
            32,
            Operand::Temp(result),
        )))
    }

    pub(crate) fn arith_opcode(
        &self,
        op: AstBinOp,
        vt: ValueType,
        token: Token,
    ) -> LowerResult<IrOpcode> {
        let unsigned = !vt.is_signed();
        if vt.is_floating_point() {
            return match op {
                AstBinOp::Add => Ok(IrOpcode::FloatAdd),
                AstBinOp::Sub => Ok(IrOpcode::FloatSubtract),
                AstBinOp::Mul => Ok(IrOpcode::FloatMultiply),
                AstBinOp::Div => Ok(IrOpcode::FloatDivide),
                _ => Err(CompileError::new(
                    ErrorKind::Type,
                    "invalid operands to binary expression",
                    token,
                )),
            };
        }
        Ok(match op {
            AstBinOp::Add => IrOpcode::Add,
            AstBinOp::Sub => IrOpcode::Subtract,
            AstBinOp::Mul => IrOpcode::Multiply,
            AstBinOp::Div if unsigned => IrOpcode::UnsignedDivide,
            AstBinOp::Div => IrOpcode::Divide,
            AstBinOp::Rem if unsigned => IrOpcode::UnsignedModulo,
            AstBinOp::Rem => IrOpcode::Modulo,
            AstBinOp::BitAnd => IrOpcode::BitwiseAnd,
            AstBinOp::BitOr => IrOpcode::BitwiseOr,
            AstBinOp::BitXor => IrOpcode::BitwiseXor,
            AstBinOp::Shl => IrOpcode::ShiftLeft,
            AstBinOp::Shr if unsigned => IrOpcode::UnsignedShiftRight,
            AstBinOp::Shr => IrOpcode::ShiftRight,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Type,
                    "invalid operands to binary expression",
                    token,
                ))
            }
        })
    }

    // ---- operator overloads --------------------------------------------

    /// Static peek at the class type of an operand, without emitting IR.
    pub(crate) fn struct_operand_index(&self, e: ExprId) -> Option<TypeIndex> {
        match &self.sess.arenas.expr(e).kind {
            ExprKind::ConstructorCall { type_index, .. }
            | ExprKind::InitializerListConstruction { type_index, .. } => {
                self.sess.types.struct_info(*type_index).map(|_| *type_index)
            }
            ExprKind::Lambda(info) => Some(info.closure_type),
            _ => {
                let spec = self.static_type_of(e)?;
                if spec.pointer_depth > 0 || spec.array_size.is_some() {
                    return None;
                }
                match spec.kind {
                    TypeSpecKind::Indexed(idx) => {
                        let idx = self.sess.types.resolve_alias(idx);
                        self.sess.types.struct_info(idx).map(|_| idx)
                    }
                    _ => None,
                }
            }
        }
    }

    /// `a <op> b` on a class `a`: a member call on the overload, LHS passed
    /// as `this`, RHS by value or by address per the parameter.
    pub(crate) fn lower_overloaded_binary_on(
        &mut self,
        op: AstBinOp,
        idx: TypeIndex,
        lhs: ExprId,
        rhs: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let symbol = self.sess.interner.intern(operator_text(op));
        let mf = self
            .sess
            .types
            .struct_info(idx)
            .and_then(|i| i.operator_overload(symbol))
            .cloned()
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::Resolution,
                    format!(
                        "no match for operator '{}' on class operands",
                        operator_text(op)
                    ),
                    token,
                )
            })?;
        let func = match &self.sess.arenas.decl(mf.decl).kind {
            DeclKind::Function(f) => f.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    "operator overload is not a function",
                    token,
                ))
            }
        };

        let object = self.visit_expression(lhs, LowerContext::LValueAddress)?;
        let place = object.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "operator call needs an addressable object", token)
        })?;
        let this_addr = self.address_of_place(&place, token)?;
        let this_value = TypedValue::pointer(Operand::Temp(this_addr), 1);

        let pass_by_address = func
            .params
            .first()
            .map(|p| p.ty.is_reference || p.ty.is_rvalue_reference)
            .unwrap_or(false);
        let rhs_value = if pass_by_address {
            self.argument_address(rhs, token)?
        } else {
            self.visit_expression(rhs, LowerContext::Load)?.typed
        };

        let name = mf.mangled_name.or(func.mangled_name).unwrap_or(func.name);
        let mut out = self.emit_direct_call(name, Some(&func), vec![this_value, rhs_value], token)?;
        // `<=>` yields an ordering consumed as a plain int.
        if op == AstBinOp::Spaceship {
            out.typed.ty = ValueType::Int;
            out.typed.size_bits = 32;
        }
        Ok(out)
    }

    // ---- unary ---------------------------------------------------------

    pub(crate) fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: ExprId,
        is_builtin_addressof: bool,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        match op {
            UnaryOp::PreIncrement
            | UnaryOp::PostIncrement
            | UnaryOp::PreDecrement
            | UnaryOp::PostDecrement => self.lower_incdec(op, operand, token),

            UnaryOp::Plus => {
                // Unary plus decays a captureless lambda to its function
                // pointer.
                if let ExprKind::Lambda(info) = self.sess.arenas.expr(operand).kind.clone() {
                    if info.captures.is_empty() {
                        return self.lower_lambda_decay(&info, token);
                    }
                }
                self.visit_expression(operand, ctx)
            }

            UnaryOp::Neg => {
                let value = self.visit_expression(operand, LowerContext::Load)?;
                let opcode = if value.typed.ty.is_floating_point() {
                    IrOpcode::FloatNegate
                } else {
                    IrOpcode::Negate
                };
                let result = self.vars.next();
                self.emit(
                    opcode,
                    IrPayload::Unary(IrUnaryOp {
                        operand: value.typed,
                        result,
                    }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::new(
                    value.typed.ty,
                    value.typed.size_bits,
                    Operand::Temp(result),
                )))
            }

            UnaryOp::Not => {
                let value = self.visit_expression(operand, LowerContext::Load)?;
                let normalized = self.normalize_to_bool(value.typed, token);
                let result = self.vars.next();
                self.emit(
                    IrOpcode::LogicalNot,
                    IrPayload::Unary(IrUnaryOp {
                        operand: normalized,
                        result,
                    }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::new(
                    ValueType::Bool,
                    8,
                    Operand::Temp(result),
                )))
            }

            UnaryOp::BitNot => {
                let value = self.visit_expression(operand, LowerContext::Load)?;
                let result = self.vars.next();
                self.emit(
                    IrOpcode::BitwiseNot,
                    IrPayload::Unary(IrUnaryOp {
                        operand: value.typed,
                        result,
                    }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::new(
                    value.typed.ty,
                    value.typed.size_bits,
                    Operand::Temp(result),
                )))
            }

            UnaryOp::Deref => self.lower_deref(operand, token, ctx),

            UnaryOp::AddrOf => self.lower_addressof(operand, is_builtin_addressof, token),
        }
    }

    /// `*e`: the pointee size comes from the pointer depth — one level
    /// above a scalar loads the scalar, deeper levels stay 64-bit.
    fn lower_deref(
        &mut self,
        operand: ExprId,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let value = self.visit_expression(operand, LowerContext::Load)?;
        if value.typed.ty != ValueType::Pointer {
            return Err(CompileError::new(
                ErrorKind::Type,
                "cannot dereference a non-pointer",
                token,
            ));
        }
        let mut element = value.spec.clone();
        if element.array_size.is_some() {
            element.array_size = None;
        } else if element.pointer_depth > 0 {
            element.pointer_depth -= 1;
        }

        // The pointer must live in a temp so the place survives to the
        // assignment dispatch.
        let pointer = match value.typed.value {
            Operand::Temp(t) => t,
            other => {
                let t = self.vars.next();
                self.emit(
                    IrOpcode::Assignment,
                    IrPayload::Assignment(AssignmentOp {
                        target: Operand::Temp(t),
                        value: TypedValue::pointer(other, value.typed.pointer_depth.max(1)),
                    }),
                    token,
                );
                t
            }
        };

        let mut lv = self.value_of_slot_spec(Operand::Temp(pointer), &element);
        lv.place = Some(Place::Indirect { pointer });
        if ctx == LowerContext::LValueAddress {
            lv.typed.value = Operand::Temp(pointer);
            return Ok(lv);
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::Dereference,
            IrPayload::Dereference(cinder_ir::DereferenceOp {
                pointer: TypedValue::pointer(Operand::Temp(pointer), 1),
                size_bits: lv.typed.size_bits,
                result,
            }),
            token,
        );
        lv.typed.value = Operand::Temp(result);
        Ok(lv)
    }

    /// `&e`: pointer-to-member constants, `operator&` overloads, the
    /// one-pass address analyzer, then the per-step legacy fallback.
    fn lower_addressof(
        &mut self,
        operand: ExprId,
        is_builtin_addressof: bool,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        // `&Class::member` on a non-static data member is the member
        // offset as an integer constant.
        if let ExprKind::StaticMemberAccess { type_index, member } =
            self.sess.arenas.expr(operand).kind
        {
            if let Some(m) = self
                .sess
                .types
                .struct_info(type_index)
                .and_then(|i| i.member(member))
            {
                return Ok(LoweredValue::prvalue(TypedValue::imm(
                    ValueType::LongLong,
                    64,
                    m.offset as u64,
                )));
            }
        }

        // `operator&` overloads, unless `__builtin_addressof` bypasses.
        if !is_builtin_addressof {
            if let Some(idx) = self.struct_operand_index(operand) {
                let symbol = self.sess.interner.intern("&");
                if let Some(mf) = self
                    .sess
                    .types
                    .struct_info(idx)
                    .and_then(|i| i.operator_overload(symbol))
                    .cloned()
                {
                    return self.lower_overloaded_addressof(mf, operand, token);
                }
            }
        }

        // One-pass flattening of `&a.b[i].c` into a single ComputeAddress.
        if let Some(plan) = self.plan_address(operand) {
            return self.emit_compute_address(plan, token);
        }

        // Legacy per-step path.
        let value = self.visit_expression(operand, LowerContext::LValueAddress)?;
        let place = value.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "cannot take the address of a prvalue", token)
        })?;
        let addr = self.address_of_place(&place, token)?;
        let mut spec = value.spec.clone();
        spec.array_size = None;
        spec.pointer_depth = value.spec.pointer_depth + 1;
        let mut lv = LoweredValue::prvalue(TypedValue::pointer(
            Operand::Temp(addr),
            spec.pointer_depth,
        ))
        .with_type_index(value.type_index);
        lv.spec = spec;
        Ok(lv)
    }

    fn lower_overloaded_addressof(
        &mut self,
        mf: cinder_ast::MemberFunction,
        operand: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let func = match &self.sess.arenas.decl(mf.decl).kind {
            DeclKind::Function(f) => f.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    "operator overload is not a function",
                    token,
                ))
            }
        };
        let object = self.visit_expression(operand, LowerContext::LValueAddress)?;
        let place = object.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "operator call needs an addressable object", token)
        })?;
        let this_addr = self.address_of_place(&place, token)?;
        let name = mf.mangled_name.or(func.mangled_name).unwrap_or(func.name);
        self.emit_direct_call(
            name,
            Some(&func),
            vec![TypedValue::pointer(Operand::Temp(this_addr), 1)],
            token,
        )
    }

    fn lower_lambda_decay(
        &mut self,
        info: &cinder_ast::LambdaInfo,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        self.queue_lambda_body(info, token)?;
        let op_decl = match &self.sess.arenas.decl(info.call_operator).kind {
            DeclKind::Function(f) => f.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    "closure has no call operator",
                    token,
                ))
            }
        };
        let function = op_decl.mangled_name.unwrap_or(op_decl.name);
        let result = self.vars.next();
        self.emit(
            IrOpcode::FunctionAddress,
            IrPayload::FunctionAddress(FunctionAddressOp { function, result }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::pointer(
            Operand::Temp(result),
            1,
        )))
    }
}

/// Usual arithmetic conversions, reduced to the IR's scalar categories.
pub(crate) fn common_arithmetic_type(a: TypedValue, b: TypedValue) -> (ValueType, u32) {
    let a_float = a.ty.is_floating_point();
    let b_float = b.ty.is_floating_point();
    if a_float || b_float {
        if (a_float && a.size_bits == 64) || (b_float && b.size_bits == 64) {
            return (ValueType::Double, 64);
        }
        return (ValueType::Float, 32);
    }

    let bits = a.size_bits.max(b.size_bits).max(32);
    let a_unsigned = !a.ty.is_signed() && a.size_bits >= bits;
    let b_unsigned = !b.ty.is_signed() && b.size_bits >= bits;
    let unsigned = a_unsigned || b_unsigned;
    match (bits, unsigned) {
        (64, true) => (ValueType::UnsignedLongLong, 64),
        (64, false) => (ValueType::LongLong, 64),
        (_, true) => (ValueType::UnsignedInt, 32),
        (_, false) => (ValueType::Int, 32),
    }
}

fn comparison_opcode(op: AstBinOp, float: bool, unsigned: bool) -> IrOpcode {
    if float {
        return match op {
            AstBinOp::Eq => IrOpcode::FloatEqual,
            AstBinOp::Ne => IrOpcode::FloatNotEqual,
            AstBinOp::Lt => IrOpcode::FloatLessThan,
            AstBinOp::Le => IrOpcode::FloatLessEqual,
            AstBinOp::Gt => IrOpcode::FloatGreaterThan,
            _ => IrOpcode::FloatGreaterEqual,
        };
    }
    if unsigned {
        return match op {
            AstBinOp::Eq => IrOpcode::Equal,
            AstBinOp::Ne => IrOpcode::NotEqual,
            AstBinOp::Lt => IrOpcode::UnsignedLessThan,
            AstBinOp::Le => IrOpcode::UnsignedLessEqual,
            AstBinOp::Gt => IrOpcode::UnsignedGreaterThan,
            _ => IrOpcode::UnsignedGreaterEqual,
        };
    }
    match op {
        AstBinOp::Eq => IrOpcode::Equal,
        AstBinOp::Ne => IrOpcode::NotEqual,
        AstBinOp::Lt => IrOpcode::LessThan,
        AstBinOp::Le => IrOpcode::LessEqual,
        AstBinOp::Gt => IrOpcode::GreaterThan,
        _ => IrOpcode::GreaterEqual,
    }
}

/// Source spelling of an overloadable operator, for member-function lookup.
pub(crate) fn operator_text(op: AstBinOp) -> &'static str {
    match op {
        AstBinOp::Add => "+",
        AstBinOp::Sub => "-",
        AstBinOp::Mul => "*",
        AstBinOp::Div => "/",
        AstBinOp::Rem => "%",
        AstBinOp::BitAnd => "&",
        AstBinOp::BitOr => "|",
        AstBinOp::BitXor => "^",
        AstBinOp::Shl => "<<",
        AstBinOp::Shr => ">>",
        AstBinOp::Eq => "==",
        AstBinOp::Ne => "!=",
        AstBinOp::Lt => "<",
        AstBinOp::Le => "<=",
        AstBinOp::Gt => ">",
        AstBinOp::Ge => ">=",
        AstBinOp::Spaceship => "<=>",
        AstBinOp::LogicalAnd => "&&",
        AstBinOp::LogicalOr => "||",
        AstBinOp::Assign => "=",
        AstBinOp::AddAssign => "+=",
        AstBinOp::SubAssign => "-=",
        AstBinOp::MulAssign => "*=",
        AstBinOp::DivAssign => "/=",
        AstBinOp::RemAssign => "%=",
        AstBinOp::AndAssign => "&=",
        AstBinOp::OrAssign => "|=",
        AstBinOp::XorAssign => "^=",
        AstBinOp::ShlAssign => "<<=",
        AstBinOp::ShrAssign => ">>=",
        AstBinOp::Comma => ",",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv(ty: ValueType, bits: u32) -> TypedValue {
        TypedValue::imm(ty, bits, 0)
    }

    #[test]
    fn int_operands_promote_to_int() {
        let (vt, bits) = common_arithmetic_type(tv(ValueType::Char, 8), tv(ValueType::Short, 16));
        assert_eq!(vt, ValueType::Int);
        assert_eq!(bits, 32);
    }

    #[test]
    fn wider_operand_wins() {
        let (vt, bits) =
            common_arithmetic_type(tv(ValueType::Int, 32), tv(ValueType::LongLong, 64));
        assert_eq!(vt, ValueType::LongLong);
        assert_eq!(bits, 64);
    }

    #[test]
    fn unsigned_wins_at_equal_width() {
        let (vt, _) = common_arithmetic_type(tv(ValueType::Int, 32), tv(ValueType::UnsignedInt, 32));
        assert_eq!(vt, ValueType::UnsignedInt);
    }

    #[test]
    fn mixed_int_float_converts_to_float() {
        let (vt, bits) = common_arithmetic_type(tv(ValueType::Int, 32), tv(ValueType::Float, 32));
        assert_eq!(vt, ValueType::Float);
        assert_eq!(bits, 32);
        let (vt, _) = common_arithmetic_type(tv(ValueType::Int, 32), tv(ValueType::Double, 64));
        assert_eq!(vt, ValueType::Double);
    }

    #[test]
    fn unsigned_comparison_picks_unsigned_opcode() {
        assert_eq!(
            comparison_opcode(AstBinOp::Lt, false, true),
            IrOpcode::UnsignedLessThan
        );
        assert_eq!(
            comparison_opcode(AstBinOp::Lt, true, false),
            IrOpcode::FloatLessThan
        );
        assert_eq!(comparison_opcode(AstBinOp::Lt, false, false), IrOpcode::LessThan);
    }
}
