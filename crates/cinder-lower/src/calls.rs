//! Call lowering: direct calls, member calls, calls through pointers and
//! closure objects, and the shared argument/return-slot machinery.

use crate::lower::{LocalSlot, LowerContext, Lowerer, LowerResult};
use cinder_ast::{
    DeclId, DeclKind, ExprId, FunctionDecl, StorageClass, TypeIndex, TypeKind, TypeSpec,
    TypeSpecKind, ValueType,
};
use cinder_common::{CompileError, ErrorKind, Symbol, Token};
use cinder_ir::{
    AddressOfOp, AssignmentOp, CallOp, IrOpcode, IrPayload, LoweredValue, Operand, Place,
    TypedValue,
};

impl Lowerer<'_> {
    pub(crate) fn lower_function_call(
        &mut self,
        callee: DeclId,
        args: &[ExprId],
        mangled_name: Option<Symbol>,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let kind = self.sess.arenas.decl(callee).kind.clone();
        match kind {
            DeclKind::Function(f) => {
                let name = mangled_name.or(f.mangled_name).unwrap_or(f.name);
                let argv = self.lower_call_arguments(Some(&f), args, token)?;
                self.emit_direct_call(name, Some(&f), argv, token)
            }

            DeclKind::Placeholder { name, .. } => {
                if self.sess.interner.view(name).starts_with("__builtin_") {
                    return self.lower_builtin(name, args, token);
                }
                // Forward reference: unknown signature, int return.
                let argv = self.lower_call_arguments(None, args, token)?;
                self.finish_call(
                    Operand::Var(mangled_name.unwrap_or(name)),
                    TypeSpec::builtin(ValueType::Int),
                    false,
                    argv,
                    token,
                )
            }

            _ => Err(CompileError::new(
                ErrorKind::Resolution,
                "callee is not a function",
                token,
            )),
        }
    }

    pub(crate) fn lower_member_call(
        &mut self,
        object: ExprId,
        method: Symbol,
        args: &[ExprId],
        is_arrow: bool,
        mangled_name: Option<Symbol>,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let obj = if is_arrow {
            self.visit_expression(object, LowerContext::Load)?
        } else {
            self.visit_expression(object, LowerContext::LValueAddress)?
        };
        let idx = if obj.type_index != TypeIndex::VOID {
            obj.type_index
        } else {
            let (vt, idx) = self.spec_category(&obj.spec);
            if vt != ValueType::Struct {
                return Err(CompileError::new(
                    ErrorKind::Type,
                    "member call on non-class type",
                    token,
                ));
            }
            idx
        };

        // A call is what moves an instantiated member from Layout to
        // Definition.
        let _ = self.sess.engine().ensure_member_defined(idx, method);

        let mf = self
            .sess
            .types
            .struct_info(idx)
            .and_then(|i| i.member_function(method))
            .cloned()
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::Resolution,
                    format!(
                        "no member function named '{}'",
                        self.sess.interner.view(method)
                    ),
                    token,
                )
            })?;
        let func = match &self.sess.arenas.decl(mf.decl).kind {
            DeclKind::Function(f) => f.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    "member function entry has no declaration",
                    token,
                ))
            }
        };

        let mut argv = Vec::with_capacity(args.len() + 1);
        if !mf.is_static {
            let this_value = if is_arrow {
                obj.typed
            } else {
                let place = obj.place.clone().ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::Type,
                        "member call needs an addressable object",
                        token,
                    )
                })?;
                TypedValue::pointer(Operand::Temp(self.address_of_place(&place, token)?), 1)
            };
            argv.push(this_value);
        }
        argv.extend(self.lower_call_arguments(Some(&func), args, token)?);

        let name = mangled_name
            .or(mf.mangled_name)
            .or(func.mangled_name)
            .unwrap_or(method);
        self.finish_call(
            Operand::Var(name),
            func.return_type.clone(),
            func.is_variadic,
            argv,
            token,
        )
    }

    /// Call through an expression: a closure object's `operator()` or a
    /// function pointer.
    pub(crate) fn lower_indirect_call(
        &mut self,
        callee: ExprId,
        args: &[ExprId],
        token: Token,
    ) -> LowerResult<LoweredValue> {
        if let Some(idx) = self.struct_operand_index(callee) {
            let call_op = self.sess.interner.intern("()");
            if self
                .sess
                .types
                .struct_info(idx)
                .and_then(|i| i.operator_overload(call_op))
                .is_some()
            {
                return self.lower_call_operator(callee, idx, args, token);
            }
        }

        let fp = self.visit_expression(callee, LowerContext::Load)?;
        // A registered function type on the pointer gives the signature;
        // otherwise assume int.
        let return_type = match fp.spec.kind {
            TypeSpecKind::Indexed(i) => match &self.sess.types.get(i).kind {
                TypeKind::Function { return_type, .. } => return_type.clone(),
                _ => TypeSpec::builtin(ValueType::Int),
            },
            _ => TypeSpec::builtin(ValueType::Int),
        };
        let argv = self.lower_call_arguments(None, args, token)?;
        self.finish_call(fp.typed.value, return_type, false, argv, token)
    }

    fn lower_call_operator(
        &mut self,
        callee: ExprId,
        idx: TypeIndex,
        args: &[ExprId],
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let call_op = self.sess.interner.intern("()");
        let mf = self
            .sess
            .types
            .struct_info(idx)
            .and_then(|i| i.operator_overload(call_op))
            .cloned()
            .ok_or_else(|| {
                CompileError::new(ErrorKind::Resolution, "object is not callable", token)
            })?;
        let func = match &self.sess.arenas.decl(mf.decl).kind {
            DeclKind::Function(f) => f.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    "call operator has no declaration",
                    token,
                ))
            }
        };

        let obj = self.visit_expression(callee, LowerContext::LValueAddress)?;
        let place = obj.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "call needs an addressable object", token)
        })?;
        let this_addr = self.address_of_place(&place, token)?;

        let mut argv = vec![TypedValue::pointer(Operand::Temp(this_addr), 1)];
        argv.extend(self.lower_call_arguments(Some(&func), args, token)?);
        let name = mf.mangled_name.or(func.mangled_name).unwrap_or(func.name);
        self.finish_call(
            Operand::Var(name),
            func.return_type.clone(),
            func.is_variadic,
            argv,
            token,
        )
    }

    /// Arguments evaluate left to right. Reference parameters receive an
    /// address; value parameters convert to the parameter type; arguments
    /// past the formal list take the default variadic promotions.
    pub(crate) fn lower_call_arguments(
        &mut self,
        decl: Option<&FunctionDecl>,
        args: &[ExprId],
        token: Token,
    ) -> LowerResult<Vec<TypedValue>> {
        let mut out = Vec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            let param_ty = decl.and_then(|f| f.params.get(i)).map(|p| p.ty.clone());
            match param_ty {
                Some(ty) if ty.is_reference || ty.is_rvalue_reference => {
                    out.push(self.argument_address(arg, token)?);
                }
                Some(ty) => {
                    let value = self.visit_expression(arg, LowerContext::Load)?;
                    out.push(self.convert_for_store(&value, &ty, token)?);
                }
                None => {
                    let value = self.visit_expression(arg, LowerContext::Load)?;
                    out.push(self.promote_variadic(value.typed, token));
                }
            }
        }
        Ok(out)
    }

    /// Address of an argument bound to a reference parameter. Prvalues get
    /// materialized into a temporary slot first.
    pub(crate) fn argument_address(&mut self, arg: ExprId, token: Token) -> LowerResult<TypedValue> {
        let value = self.visit_expression(arg, LowerContext::LValueAddress)?;
        let place = match value.place.clone() {
            Some(p) => p,
            None => {
                let name = self.fresh_temp_name("ref_tmp");
                self.locals.insert(
                    name,
                    LocalSlot {
                        ty: value.spec.clone(),
                        storage: StorageClass::Local,
                        mangled: None,
                    },
                );
                self.emit(
                    IrOpcode::Assignment,
                    IrPayload::Assignment(AssignmentOp {
                        target: Operand::Var(name),
                        value: value.typed,
                    }),
                    token,
                );
                Place::Local { name }
            }
        };
        let addr = self.address_of_place(&place, token)?;
        Ok(TypedValue::pointer(Operand::Temp(addr), 1).with_reference())
    }

    /// Default argument promotions for the variadic tail: float widens to
    /// double, sub-int integers widen to int.
    pub(crate) fn promote_variadic(&mut self, value: TypedValue, token: Token) -> TypedValue {
        if value.ty == ValueType::Float {
            return self.convert_numeric(value, ValueType::Double, 64, token);
        }
        if value.ty.is_integral() && value.size_bits < 32 {
            let to = if value.ty.is_signed() {
                ValueType::Int
            } else {
                ValueType::UnsignedInt
            };
            return self.convert_numeric(value, to, 32, token);
        }
        value
    }

    pub(crate) fn emit_direct_call(
        &mut self,
        name: Symbol,
        decl: Option<&FunctionDecl>,
        args: Vec<TypedValue>,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let (return_type, is_variadic) = match decl {
            Some(f) => (f.return_type.clone(), f.is_variadic),
            None => (TypeSpec::builtin(ValueType::Int), false),
        };
        self.finish_call(Operand::Var(name), return_type, is_variadic, args, token)
    }

    /// Emit the call instruction, routing large struct returns through a
    /// hidden return slot.
    pub(crate) fn finish_call(
        &mut self,
        function: Operand,
        return_type: TypeSpec,
        is_variadic: bool,
        args: Vec<TypedValue>,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let return_type = if return_type.is_dependent() {
            self.sess
                .engine()
                .resolve_spec(return_type.clone())
                .unwrap_or(return_type)
        } else {
            return_type
        };
        let (vt, idx) = self.spec_category(&return_type);
        let is_pointer = return_type.pointer_depth > 0;
        let bits = if is_pointer {
            64
        } else {
            self.sess.types.spec_size_bits(&return_type)
        };

        if vt == ValueType::Void && !is_pointer {
            self.emit(
                IrOpcode::FunctionCall,
                IrPayload::Call(CallOp {
                    function,
                    args,
                    return_type: ValueType::Void,
                    return_size_bits: 0,
                    result: None,
                    return_slot: None,
                    is_variadic,
                }),
                token,
            );
            return Ok(LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0)));
        }

        // Large struct returns write through a caller-allocated slot passed
        // as a hidden first argument.
        if vt == ValueType::Struct && !is_pointer && bits / 8 > self.sess.context.return_slot_threshold()
        {
            let slot_name = self.fresh_temp_name("sret");
            self.locals.insert(
                slot_name,
                LocalSlot {
                    ty: return_type.clone(),
                    storage: StorageClass::Local,
                    mangled: None,
                },
            );
            let slot_addr = self.vars.next();
            self.emit(
                IrOpcode::AddressOf,
                IrPayload::AddressOf(AddressOfOp {
                    source: Operand::Var(slot_name),
                    offset: 0,
                    result: slot_addr,
                }),
                token,
            );
            self.emit(
                IrOpcode::FunctionCall,
                IrPayload::Call(CallOp {
                    function,
                    args,
                    return_type: ValueType::Struct,
                    return_size_bits: bits,
                    result: None,
                    return_slot: Some(slot_addr),
                    is_variadic,
                }),
                token,
            );
            let mut lv = self.value_of_slot(slot_name, &return_type);
            lv.place = Some(Place::Local { name: slot_name });
            lv.type_index = idx;
            return Ok(lv);
        }

        let result = self.vars.next();
        let call_return_type = if is_pointer { ValueType::Pointer } else { vt };
        self.emit(
            IrOpcode::FunctionCall,
            IrPayload::Call(CallOp {
                function,
                args,
                return_type: call_return_type,
                return_size_bits: bits,
                result: Some(result),
                return_slot: None,
                is_variadic,
            }),
            token,
        );
        let mut lv = self.value_of_slot_spec(Operand::Temp(result), &return_type);
        lv.place = None;
        Ok(lv)
    }
}
