//! The expression visitor: `visit_expression(node, Load | LValueAddress)`.

use crate::lower::{LocalSlot, LowerContext, Lowerer, LowerResult, LoweredFunction};
use cinder_ast::{
    CaptureKind, CastKind, DeclKind, ExprId, ExprKind, LambdaInfo, SizeofArg, StorageClass,
    TypeIndex, TypeSpec, TypeSpecKind, UnaryOp, ValueType,
};
use cinder_common::{CompileError, ErrorKind, Symbol, Token};
use cinder_ir::{
    ArrayElementAddressOp, AssignmentOp, BinaryOp, CallOp, ComputeAddressOp, DereferenceOp,
    FunctionAddressOp, GlobalLoadOp, IncDecOp, IrOpcode, IrPayload, LoweredValue, MemberLoadOp,
    MemberStoreOp, Operand, Place, StringLiteralOp, TempVar, TypedValue, AddressOfOp,
};
use cinder_sema::{ConstEvaluator, ConstValue};

impl Lowerer<'_> {
    /// Lower one expression. The result always has a well-formed typed
    /// operand; `place` is set exactly when the expression names storage.
    pub fn visit_expression(&mut self, e: ExprId, ctx: LowerContext) -> LowerResult<LoweredValue> {
        let node = self.sess.arenas.expr(e).clone();
        let token = node.token;
        match node.kind {
            ExprKind::IntLiteral { value, ty } => {
                let size = ty.size_bits(self.sess.types.data_model());
                Ok(LoweredValue::prvalue(TypedValue::imm(ty, size, value)))
            }
            ExprKind::FloatLiteral { value, ty } => {
                let size = ty.size_bits(self.sess.types.data_model());
                Ok(LoweredValue::prvalue(TypedValue::new(
                    ty,
                    size,
                    Operand::FloatImm(value),
                )))
            }
            ExprKind::BoolLiteral(b) => Ok(LoweredValue::prvalue(TypedValue::imm(
                ValueType::Bool,
                8,
                b as u64,
            ))),
            ExprKind::CharLiteral { value, .. } => Ok(LoweredValue::prvalue(TypedValue::imm(
                ValueType::Char,
                8,
                value as u64,
            ))),
            ExprKind::NullptrLiteral => Ok(LoweredValue::prvalue(TypedValue::pointer(
                Operand::Imm(0),
                1,
            ))),

            ExprKind::StringLiteral { value, .. } => {
                let result = self.vars.next();
                self.emit(
                    IrOpcode::StringLiteral,
                    IrPayload::StringLiteral(StringLiteralOp { value, result }),
                    token,
                );
                let mut lv = LoweredValue::prvalue(TypedValue::pointer(Operand::Temp(result), 1));
                lv.spec = TypeSpec::builtin(ValueType::Char).with_pointer(1).with_const();
                Ok(lv)
            }

            ExprKind::FunctionNameLiteral { pretty } => {
                let text = self
                    .current_function_name
                    .map(|f| self.sess.interner.view(f).to_string())
                    .unwrap_or_default();
                let rendered = if pretty { format!("{text}()") } else { text };
                let value = self.sess.interner.intern(&rendered);
                self.sess.aux_strings.push(value);
                let result = self.vars.next();
                self.emit(
                    IrOpcode::StringLiteral,
                    IrPayload::StringLiteral(StringLiteralOp { value, result }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::pointer(
                    Operand::Temp(result),
                    1,
                )))
            }

            ExprKind::This => {
                let this = self.sess.interner.intern("this");
                let idx = self.current_struct.unwrap_or(TypeIndex::VOID);
                let mut lv =
                    LoweredValue::prvalue(TypedValue::pointer(Operand::Var(this), 1))
                        .with_type_index(idx);
                lv.spec = TypeSpec::indexed(idx).with_pointer(1);
                Ok(lv)
            }

            ExprKind::Identifier { name } => self.lower_identifier(name, token, ctx),
            ExprKind::QualifiedIdentifier { namespace, name } => {
                if let Some(decl) = self.sess.namespaces.lookup_in(namespace, name) {
                    self.lower_known_decl(decl, token, ctx)
                } else {
                    self.lower_identifier(name, token, ctx)
                }
            }

            ExprKind::StaticMemberAccess { type_index, member } => {
                self.lower_static_member(type_index, member, token, ctx)
            }

            ExprKind::TemplateParameterReference { .. } => Err(CompileError::new(
                ErrorKind::Template,
                "unsubstituted template parameter in lowering",
                token,
            )),

            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(op, lhs, rhs, token),

            ExprKind::Unary {
                op,
                operand,
                is_builtin_addressof,
            } => self.lower_unary(op, operand, is_builtin_addressof, token, ctx),

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => self.lower_ternary(cond, then_expr, else_expr, token),

            ExprKind::FunctionCall {
                callee,
                args,
                mangled_name,
                ..
            } => self.lower_function_call(callee, &args, mangled_name, token),

            ExprKind::MemberFunctionCall {
                object,
                method,
                args,
                is_arrow,
                mangled_name,
            } => self.lower_member_call(object, method, &args, is_arrow, mangled_name, token),

            ExprKind::IndirectCall { callee, args } => self.lower_indirect_call(callee, &args, token),

            ExprKind::MemberAccess {
                object,
                member,
                is_arrow,
            } => self.lower_member_access(object, member, is_arrow, token, ctx),

            ExprKind::ArraySubscript { array, index } => {
                self.lower_subscript(array, index, token, ctx)
            }

            ExprKind::Cast {
                kind,
                target,
                operand,
            } => self.lower_cast(kind, &target, operand, token),

            ExprKind::Sizeof(arg) => self.lower_sizeof(&arg, token),

            ExprKind::Alignof(_)
            | ExprKind::Offsetof { .. }
            | ExprKind::TypeTraitExpr { .. }
            | ExprKind::Noexcept(_) => self.lower_constant_expr(e, token),

            ExprKind::Typeid { .. } => {
                // RTTI descriptor address; the backend patches the symbol.
                let result = self.vars.next();
                let name = self.sess.interner.intern("__type_info");
                self.emit(
                    IrOpcode::FunctionAddress,
                    IrPayload::FunctionAddress(FunctionAddressOp {
                        function: name,
                        result,
                    }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::pointer(
                    Operand::Temp(result),
                    1,
                )))
            }

            ExprKind::PseudoDestructorCall { object } => {
                // Evaluate for side effects; destruction of a scalar is a
                // no-op at this layer.
                self.visit_expression(object, LowerContext::Load)?;
                Ok(LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0)))
            }

            ExprKind::PointerToMemberAccess {
                object,
                pointer,
                is_arrow,
            } => self.lower_pointer_to_member(object, pointer, is_arrow, token, ctx),

            ExprKind::Throw { operand } => {
                let mut args = Vec::new();
                if let Some(op) = operand {
                    args.push(self.visit_expression(op, LowerContext::Load)?.typed);
                }
                let callee = self.sess.interner.intern("__cxa_throw");
                self.emit(
                    IrOpcode::FunctionCall,
                    IrPayload::Call(CallOp {
                        function: Operand::Var(callee),
                        args,
                        return_type: ValueType::Void,
                        return_size_bits: 0,
                        result: None,
                        return_slot: None,
                        is_variadic: false,
                    }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0)))
            }

            ExprKind::New {
                ty,
                count,
                args,
                placement,
                ..
            } => self.lower_new(&ty, count, &args, &placement, token),

            ExprKind::Delete {
                operand, is_array, ..
            } => self.lower_delete(operand, is_array, token),

            ExprKind::ConstructorCall { type_index, args }
            | ExprKind::InitializerListConstruction { type_index, args } => {
                let name = self.fresh_temp_name("ctor_tmp");
                let spec = TypeSpec::indexed(type_index);
                self.locals.insert(
                    name,
                    LocalSlot {
                        ty: spec.clone(),
                        storage: StorageClass::Local,
                        mangled: None,
                    },
                );
                let init = self
                    .sess
                    .arenas
                    .alloc_expr(cinder_ast::Expr::new(
                        ExprKind::InitializerListConstruction { type_index, args },
                        token,
                    ));
                self.lower_construct_into(name, &spec, init, token)?;
                let size = self.sess.types.size_bits(ValueType::Struct, type_index);
                let mut lv = LoweredValue::prvalue(TypedValue::new(
                    ValueType::Struct,
                    size,
                    Operand::Var(name),
                ))
                .with_type_index(type_index)
                .with_place(Place::Local { name });
                lv.spec = spec;
                Ok(lv)
            }

            ExprKind::TypeConstruction { ty, args } => {
                let resolved = self
                    .sess
                    .engine()
                    .resolve_spec(ty)
                    .ok_or_else(|| {
                        CompileError::new(ErrorKind::Template, "unresolved constructed type", token)
                    })?;
                match resolved.kind {
                    TypeSpecKind::Indexed(idx)
                        if self.sess.types.struct_info(idx).is_some() =>
                    {
                        let ctor = self.sess.arenas.alloc_expr(cinder_ast::Expr::new(
                            ExprKind::ConstructorCall {
                                type_index: idx,
                                args,
                            },
                            token,
                        ));
                        self.visit_expression(ctor, ctx)
                    }
                    _ if args.len() == 1 => {
                        let cast = self.sess.arenas.alloc_expr(cinder_ast::Expr::new(
                            ExprKind::Cast {
                                kind: CastKind::Functional,
                                target: resolved,
                                operand: args[0],
                            },
                            token,
                        ));
                        self.visit_expression(cast, ctx)
                    }
                    _ => Ok(LoweredValue::prvalue(TypedValue::imm(
                        resolved.value_type(),
                        self.sess.types.spec_size_bits(&resolved),
                        0,
                    ))),
                }
            }

            ExprKind::Lambda(info) => self.lower_lambda(&info, token),

            ExprKind::VaArg { va, ty } => self.lower_va_arg(va, &ty, token),

            ExprKind::Requires(_) | ExprKind::ConceptApplication { .. } => {
                self.lower_constant_expr(e, token)
            }

            ExprKind::Fold { .. } | ExprKind::PackExpansion { .. } => Err(CompileError::new(
                ErrorKind::Template,
                "unexpanded pack reached lowering",
                token,
            )),
        }
    }

    // ---- identifiers ---------------------------------------------------

    /// The §-resolution cascade: captures → static locals → locals →
    /// globals → namespace chain → members of the enclosing struct →
    /// enumerators.
    fn lower_identifier(
        &mut self,
        name: Symbol,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        // Captured variables load through the implicit closure `this`.
        if let Some(kind) = self.captures.get(&name).copied() {
            return self.lower_capture(name, kind, token, ctx);
        }

        if let Some(slot) = self.local_slot(name).cloned() {
            if slot.storage == StorageClass::StaticLocal {
                let mangled = slot.mangled.unwrap_or(name);
                return self.lower_global_slot(mangled, &slot.ty, token, ctx);
            }
            // Reference locals hold a pointer; reads dereference it.
            if slot.ty.is_reference || slot.ty.is_rvalue_reference {
                return self.lower_reference_slot(name, &slot.ty, token, ctx);
            }
            return Ok(self.value_of_slot(name, &slot.ty).with_place(Place::Local { name }));
        }

        if let Some(&decl) = self.unit.globals.get(&name) {
            return self.lower_known_decl(decl, token, ctx);
        }

        // Member or static member of the enclosing struct.
        if let Some(owner) = self.current_struct {
            let member = self
                .sess
                .types
                .struct_info(owner)
                .and_then(|i| i.member(name))
                .cloned();
            if member.is_some() {
                let this_expr = self
                    .sess
                    .arenas
                    .alloc_expr(cinder_ast::Expr::new(ExprKind::This, token));
                let object = self.visit_expression(this_expr, LowerContext::Load)?;
                return self.member_load_from(object, name, true, token, ctx);
            }
            let static_member = self
                .sess
                .types
                .struct_info(owner)
                .and_then(|i| i.static_member(name))
                .cloned();
            if let Some(sm) = static_member {
                let mut spec = if sm.ty == ValueType::Struct {
                    TypeSpec::indexed(sm.type_index)
                } else {
                    TypeSpec::builtin(sm.ty)
                };
                spec.pointer_depth = sm.pointer_depth;
                return self.lower_global_slot(sm.mangled_name, &spec, token, ctx);
            }
        }

        // Enumerator constant: the value directly, no instruction.
        if let Some(value) = self.lookup_enumerator(name) {
            return Ok(LoweredValue::prvalue(TypedValue::imm(
                ValueType::Int,
                32,
                value as u64,
            )));
        }

        Err(CompileError::new(
            ErrorKind::Resolution,
            format!(
                "use of unresolved identifier '{}'",
                self.sess.interner.view(name)
            ),
            token,
        ))
    }

    fn lookup_enumerator(&self, name: Symbol) -> Option<i64> {
        if let Some(owner) = self.current_struct {
            if let Some(info) = self.sess.types.struct_info(owner) {
                for &nested in &info.nested_enums {
                    if let Some(e) = self.sess.types.enum_info(nested) {
                        if let Some(v) = e.enumerator(name) {
                            return Some(v);
                        }
                    }
                }
            }
        }
        for i in 1..self.sess.types.len() {
            if let Some(info) = self.sess.types.enum_info(TypeIndex(i as u32)) {
                if !info.is_scoped {
                    if let Some(v) = info.enumerator(name) {
                        return Some(v);
                    }
                }
            }
        }
        None
    }

    fn lower_known_decl(
        &mut self,
        decl: cinder_ast::DeclId,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        match &self.sess.arenas.decl(decl).kind {
            DeclKind::Variable(v) => {
                let v = v.clone();
                let mangled = v.mangled_name.unwrap_or(v.name);
                self.lower_global_slot(mangled, &v.ty, token, ctx)
            }
            DeclKind::Function(f) => {
                // Function name used as a value: a 64-bit code pointer.
                let function = f.mangled_name.unwrap_or(f.name);
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
            DeclKind::Placeholder { name, .. } => {
                let name = *name;
                let result = self.vars.next();
                self.emit(
                    IrOpcode::FunctionAddress,
                    IrPayload::FunctionAddress(FunctionAddressOp {
                        function: name,
                        result,
                    }),
                    token,
                );
                Ok(LoweredValue::prvalue(TypedValue::pointer(
                    Operand::Temp(result),
                    1,
                )))
            }
            _ => Err(CompileError::new(
                ErrorKind::Resolution,
                "declaration is not usable as a value",
                token,
            )),
        }
    }

    /// Global / static-local storage: load in `Load` context, bare name for
    /// the assignment path in `LValueAddress` context.
    pub(crate) fn lower_global_slot(
        &mut self,
        mangled: Symbol,
        spec: &TypeSpec,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let mut lv = self.value_of_slot(mangled, spec);
        lv.place = Some(Place::Global { name: mangled });
        if ctx == LowerContext::LValueAddress {
            return Ok(lv);
        }
        let (vt, size) = (lv.typed.ty, lv.typed.size_bits);
        let result = self.vars.next();
        self.emit(
            IrOpcode::GlobalLoad,
            IrPayload::GlobalLoad(GlobalLoadOp {
                name: mangled,
                ty: vt,
                size_bits: size,
                result,
            }),
            token,
        );
        lv.typed.value = Operand::Temp(result);
        Ok(lv)
    }

    fn lower_reference_slot(
        &mut self,
        name: Symbol,
        spec: &TypeSpec,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        // The slot holds a pointer; materialize it, then dereference.
        let pointer = self.vars.next();
        self.emit(
            IrOpcode::Assignment,
            IrPayload::Assignment(AssignmentOp {
                target: Operand::Temp(pointer),
                value: TypedValue::pointer(Operand::Var(name), 1),
            }),
            token,
        );
        let mut referent = spec.clone();
        referent.is_reference = false;
        referent.is_rvalue_reference = false;
        let mut lv = self.value_of_slot(name, &referent);
        lv.place = Some(Place::Indirect { pointer });
        if ctx == LowerContext::LValueAddress {
            lv.typed.value = Operand::Temp(pointer);
            return Ok(lv);
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::Dereference,
            IrPayload::Dereference(DereferenceOp {
                pointer: TypedValue::pointer(Operand::Temp(pointer), 1),
                size_bits: lv.typed.size_bits,
                result,
            }),
            token,
        );
        lv.typed.value = Operand::Temp(result);
        Ok(lv)
    }

    fn lower_capture(
        &mut self,
        name: Symbol,
        kind: CaptureKind,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let this = self.sess.interner.intern("this");
        let owner = self.current_struct.ok_or_else(|| {
            CompileError::new(ErrorKind::Internal, "capture outside closure", token)
        })?;
        let member = self
            .sess
            .types
            .struct_info(owner)
            .and_then(|i| i.member(name))
            .cloned()
            .ok_or_else(|| {
                CompileError::new(ErrorKind::Internal, "capture missing from closure", token)
            })?;

        match kind {
            CaptureKind::ByValue | CaptureKind::CopyThis => {
                if ctx == LowerContext::LValueAddress {
                    let mut lv = self.member_value(&member);
                    lv.place = Some(Place::Member {
                        base: Operand::Var(this),
                        member: name,
                        offset: member.offset,
                        is_pointer_to_member: false,
                    });
                    return Ok(lv);
                }
                let result = self.vars.next();
                self.emit(
                    IrOpcode::MemberAccess,
                    IrPayload::MemberLoad(MemberLoadOp {
                        object: Operand::Var(this),
                        member: name,
                        offset: member.offset,
                        ty: member.ty,
                        size_bits: member.size_bits,
                        pointer_depth: member.pointer_depth,
                        through_pointer: true,
                        result,
                    }),
                    token,
                );
                let mut lv = self.member_value(&member);
                lv.typed.value = Operand::Temp(result);
                lv.place = Some(Place::Member {
                    base: Operand::Var(this),
                    member: name,
                    offset: member.offset,
                    is_pointer_to_member: false,
                });
                Ok(lv)
            }
            CaptureKind::ByReference | CaptureKind::This => {
                // Load the captured pointer, then go through it.
                let pointer = self.vars.next();
                self.emit(
                    IrOpcode::MemberAccess,
                    IrPayload::MemberLoad(MemberLoadOp {
                        object: Operand::Var(this),
                        member: name,
                        offset: member.offset,
                        ty: ValueType::Pointer,
                        size_bits: 64,
                        pointer_depth: member.pointer_depth.max(1),
                        through_pointer: true,
                        result: pointer,
                    }),
                    token,
                );
                let mut referent = member.clone();
                referent.pointer_depth = referent.pointer_depth.saturating_sub(1);
                let mut lv = self.member_value(&referent);
                lv.place = Some(Place::Indirect { pointer });
                if ctx == LowerContext::LValueAddress {
                    lv.typed.value = Operand::Temp(pointer);
                    return Ok(lv);
                }
                let result = self.vars.next();
                self.emit(
                    IrOpcode::Dereference,
                    IrPayload::Dereference(DereferenceOp {
                        pointer: TypedValue::pointer(Operand::Temp(pointer), 1),
                        size_bits: lv.typed.size_bits,
                        result,
                    }),
                    token,
                );
                lv.typed.value = Operand::Temp(result);
                Ok(lv)
            }
        }
    }

    fn lower_static_member(
        &mut self,
        type_index: TypeIndex,
        member: Symbol,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let static_member = self
            .sess
            .types
            .struct_info(type_index)
            .and_then(|i| i.static_member(member))
            .cloned();
        if let Some(sm) = static_member {
            let info = self.sess.types.struct_info(type_index);
            if info.map(|i| i.is_incomplete_instantiation).unwrap_or(false) {
                return Err(CompileError::new(
                    ErrorKind::Template,
                    "static member of incomplete instantiation",
                    token,
                ));
            }
            let mut spec = if sm.ty == ValueType::Struct {
                TypeSpec::indexed(sm.type_index)
            } else {
                TypeSpec::builtin(sm.ty)
            };
            spec.pointer_depth = sm.pointer_depth;
            return self.lower_global_slot(sm.mangled_name, &spec, token, ctx);
        }
        // Non-static member: only meaningful under `&` (pointer-to-member
        // formation); that path intercepts before lowering gets here.
        Err(CompileError::new(
            ErrorKind::Resolution,
            "member reference requires an object",
            token,
        ))
    }

    // ---- members and subscripts ---------------------------------------

    pub(crate) fn member_value(&self, member: &cinder_ast::StructMember) -> LoweredValue {
        let mut spec = if member.ty == ValueType::Struct {
            TypeSpec::indexed(member.type_index)
        } else {
            TypeSpec::builtin(member.ty)
        };
        spec.pointer_depth = member.pointer_depth;
        spec.array_size = member.array_count;
        self.value_of_slot_spec(Operand::Imm(0), &spec)
            .with_type_index(member.type_index)
    }

    /// Typed value shape of a named slot with a given spec.
    pub(crate) fn value_of_slot(&self, name: Symbol, spec: &TypeSpec) -> LoweredValue {
        self.value_of_slot_spec(Operand::Var(name), spec)
    }

    pub(crate) fn value_of_slot_spec(&self, operand: Operand, spec: &TypeSpec) -> LoweredValue {
        let (vt, idx) = self.spec_category(spec);
        let typed = if spec.pointer_depth > 0 || spec.array_size.is_some() {
            let depth = spec.pointer_depth + u32::from(spec.array_size.is_some());
            TypedValue {
                ty: ValueType::Pointer,
                size_bits: 64,
                pointer_depth: depth,
                value: operand,
                is_reference: false,
            }
        } else {
            TypedValue::new(vt, self.sess.types.size_bits(vt, idx), operand)
        };
        let mut lv = LoweredValue::prvalue(typed).with_type_index(idx);
        lv.spec = spec.clone();
        lv
    }

    pub(crate) fn spec_category(&self, spec: &TypeSpec) -> (ValueType, TypeIndex) {
        match spec.kind {
            TypeSpecKind::Builtin(vt) => (vt, TypeIndex::VOID),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.sess.types.resolve_alias(idx);
                match self.sess.types.get(idx).kind {
                    cinder_ast::TypeKind::Builtin(vt) => (vt, idx),
                    cinder_ast::TypeKind::Enum => (ValueType::Enum, idx),
                    _ => (ValueType::Struct, idx),
                }
            }
            _ => (ValueType::Void, TypeIndex::VOID),
        }
    }

    fn lower_member_access(
        &mut self,
        object: ExprId,
        member: Symbol,
        is_arrow: bool,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let object_value = if is_arrow {
            self.visit_expression(object, LowerContext::Load)?
        } else {
            self.visit_expression(object, LowerContext::LValueAddress)?
        };
        self.member_load_from(object_value, member, is_arrow, token, ctx)
    }

    /// Shared member-load: resolve the member against the object's struct,
    /// flatten nested member bases into one offset, and either load or hand
    /// back the place.
    pub(crate) fn member_load_from(
        &mut self,
        object: LoweredValue,
        member: Symbol,
        through_pointer: bool,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let struct_idx = if object.type_index != TypeIndex::VOID {
            object.type_index
        } else {
            let (vt, idx) = self.spec_category(&object.spec);
            if vt != ValueType::Struct {
                return Err(CompileError::new(
                    ErrorKind::Type,
                    "member access on non-class type",
                    token,
                ));
            }
            idx
        };
        // Member access moves a lazy instantiation to its layout phase.
        let _ = self.sess.engine().ensure_layout(struct_idx);
        let m = self
            .sess
            .types
            .struct_info(struct_idx)
            .and_then(|i| i.member(member))
            .cloned()
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::Resolution,
                    format!("no member named '{}'", self.sess.interner.view(member)),
                    token,
                )
            })?;

        // Flatten `a.b.c`: a member base that is itself a member with a
        // non-pointer base accumulates offsets.
        let (base, extra_offset, base_is_pointer) = match (&object.place, through_pointer) {
            (_, true) => (object.typed.value, 0, true),
            (Some(Place::Local { name }), false) => (Operand::Var(*name), 0, false),
            (Some(Place::Global { name }), false) => (Operand::Var(*name), 0, false),
            (
                Some(Place::Member {
                    base,
                    offset,
                    is_pointer_to_member: false,
                    ..
                }),
                false,
            ) => (*base, *offset, false),
            (Some(Place::Indirect { pointer }), false) => (Operand::Temp(*pointer), 0, true),
            _ => (object.typed.value, 0, false),
        };
        let offset = extra_offset + m.offset;
        let place = Place::Member {
            base,
            member,
            offset,
            is_pointer_to_member: false,
        };

        let mut lv = self.member_value(&m);
        lv.place = Some(place);
        if ctx == LowerContext::LValueAddress {
            lv.typed.value = base;
            return Ok(lv);
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::MemberAccess,
            IrPayload::MemberLoad(MemberLoadOp {
                object: base,
                member,
                offset,
                ty: m.ty,
                size_bits: m.size_bits,
                pointer_depth: m.pointer_depth,
                through_pointer: base_is_pointer,
                result,
            }),
            token,
        );
        lv.typed.value = Operand::Temp(result);
        Ok(lv)
    }

    fn lower_subscript(
        &mut self,
        array: ExprId,
        index: ExprId,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let base = self.visit_expression(array, LowerContext::Load)?;
        let index_value = self.visit_expression(index, LowerContext::Load)?;

        let mut element = base.spec.clone();
        if element.array_size.is_some() {
            element.array_size = None;
        } else if element.pointer_depth > 0 {
            element.pointer_depth -= 1;
        }
        let element_bits = self.element_size_bits(&base.spec);

        let addr = self.vars.next();
        self.emit(
            IrOpcode::ArrayElementAddress,
            IrPayload::ArrayElementAddress(ArrayElementAddressOp {
                base: base.typed.value,
                index: index_value.typed,
                element_size_bits: element_bits,
                result: addr,
            }),
            token,
        );

        let mut lv = self.value_of_slot_spec(Operand::Temp(addr), &element);
        lv.place = Some(Place::Indirect { pointer: addr });
        if ctx == LowerContext::LValueAddress {
            lv.typed.value = Operand::Temp(addr);
            return Ok(lv);
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::Dereference,
            IrPayload::Dereference(DereferenceOp {
                pointer: TypedValue::pointer(Operand::Temp(addr), 1),
                size_bits: lv.typed.size_bits,
                result,
            }),
            token,
        );
        lv.typed.value = Operand::Temp(result);
        Ok(lv)
    }

    /// Size in bits of the element one indirection below `spec`.
    pub(crate) fn element_size_bits(&self, spec: &TypeSpec) -> u32 {
        let mut element = spec.clone();
        if element.array_size.is_some() {
            element.array_size = None;
        } else if element.pointer_depth > 0 {
            element.pointer_depth -= 1;
        }
        if element.pointer_depth > 0 {
            return 64;
        }
        let bits = self.sess.types.spec_size_bits(&element);
        bits.max(8)
    }

    // ---- ternary -------------------------------------------------------

    /// `cond ? a : b`: branches assign the shared result temp; the true
    /// label's instructions come strictly before the false label's.
    fn lower_ternary(
        &mut self,
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let cond_value = self.visit_expression(cond, LowerContext::Load)?;
        let true_label = self.fresh_label("ternary_true");
        let false_label = self.fresh_label("ternary_false");
        let end_label = self.fresh_label("ternary_end");
        let result = self.vars.next();

        self.emit_cond_branch(cond_value.typed, true_label, false_label, token);

        self.emit_label(true_label, token);
        let then_value = self.visit_expression(then_expr, LowerContext::Load)?;
        self.emit(
            IrOpcode::Assignment,
            IrPayload::Assignment(AssignmentOp {
                target: Operand::Temp(result),
                value: then_value.typed,
            }),
            token,
        );
        self.emit_branch(end_label, token);

        self.emit_label(false_label, token);
        let else_value = self.visit_expression(else_expr, LowerContext::Load)?;
        self.emit(
            IrOpcode::Assignment,
            IrPayload::Assignment(AssignmentOp {
                target: Operand::Temp(result),
                value: else_value.typed,
            }),
            token,
        );
        self.emit_branch(end_label, token);
        self.emit_label(end_label, token);

        let mut lv = then_value.clone();
        lv.typed.value = Operand::Temp(result);
        lv.place = None;
        Ok(lv)
    }

    // ---- constant-foldable expressions ---------------------------------

    pub(crate) fn lower_constant_expr(
        &mut self,
        e: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let mut evaluator = ConstEvaluator::new(&self.sess.arenas, &self.sess.types);
        bind_session_enumerators(&mut evaluator, self.sess);
        match evaluator.evaluate(e) {
            Ok(ConstValue::Bool(b)) => Ok(LoweredValue::prvalue(TypedValue::imm(
                ValueType::Bool,
                8,
                b as u64,
            ))),
            Ok(ConstValue::Float(f)) => Ok(LoweredValue::prvalue(TypedValue::new(
                ValueType::Double,
                64,
                Operand::FloatImm(f),
            ))),
            Ok(v) => Ok(LoweredValue::prvalue(TypedValue::imm(
                ValueType::UnsignedLongLong,
                64,
                v.as_i64() as u64,
            ))),
            Err(_) => Err(CompileError::new(
                ErrorKind::Type,
                "expression is not a constant",
                token,
            )),
        }
    }

    fn lower_sizeof(&mut self, arg: &SizeofArg, token: Token) -> LowerResult<LoweredValue> {
        match arg {
            SizeofArg::Type(spec) => {
                if let TypeSpecKind::Indexed(idx) = spec.kind {
                    // sizeof triggers the layout phase of instantiations.
                    let _ = self.sess.engine().ensure_layout(idx);
                }
                let bits = self.sess.types.spec_size_bits(spec);
                if bits == 0 {
                    // Runtime sizeof only exists for VLAs, which this core
                    // does not support.
                    return Err(CompileError::new(
                        ErrorKind::Type,
                        "sizeof of incomplete type",
                        token,
                    ));
                }
                Ok(LoweredValue::prvalue(TypedValue::imm(
                    ValueType::UnsignedLongLong,
                    64,
                    (bits / 8) as u64,
                )))
            }
            SizeofArg::Expr(inner) => {
                let spec = self.static_type_of(*inner).ok_or_else(|| {
                    CompileError::new(ErrorKind::Type, "cannot compute sizeof of expression", token)
                })?;
                let bits = if spec.pointer_depth > 0 {
                    64
                } else {
                    self.sess.types.spec_size_bits(&spec)
                };
                Ok(LoweredValue::prvalue(TypedValue::imm(
                    ValueType::UnsignedLongLong,
                    64,
                    (bits.max(8) / 8) as u64,
                )))
            }
            SizeofArg::Pack(_) => Err(CompileError::new(
                ErrorKind::Template,
                "sizeof... survives only inside templates",
                token,
            )),
        }
    }

    /// Unevaluated-operand typing for `sizeof expr`: no IR may be emitted.
    pub(crate) fn static_type_of(&self, e: ExprId) -> Option<TypeSpec> {
        match &self.sess.arenas.expr(e).kind {
            ExprKind::IntLiteral { ty, .. } | ExprKind::FloatLiteral { ty, .. } => {
                Some(TypeSpec::builtin(*ty))
            }
            ExprKind::BoolLiteral(_) => Some(TypeSpec::builtin(ValueType::Bool)),
            ExprKind::CharLiteral { .. } => Some(TypeSpec::builtin(ValueType::Char)),
            ExprKind::Identifier { name } => {
                if let Some(slot) = self.local_slot(*name) {
                    return Some(slot.ty.clone());
                }
                match self.unit.globals.get(name).map(|&d| &self.sess.arenas.decl(d).kind) {
                    Some(DeclKind::Variable(v)) => Some(v.ty.clone()),
                    _ => None,
                }
            }
            ExprKind::This => {
                let idx = self.current_struct?;
                Some(TypeSpec::indexed(idx).with_pointer(1))
            }
            ExprKind::Cast { target, .. } if !target.is_dependent() => Some(target.clone()),
            ExprKind::FunctionCall { callee, .. } => {
                match &self.sess.arenas.decl(*callee).kind {
                    DeclKind::Function(f) => Some(f.return_type.clone()),
                    _ => None,
                }
            }
            ExprKind::MemberFunctionCall { object, method, .. } => {
                let mut obj = self.static_type_of(*object)?;
                obj.pointer_depth = 0;
                let (vt, idx) = self.spec_category(&obj);
                if vt != ValueType::Struct {
                    return None;
                }
                let mf = self.sess.types.struct_info(idx)?.member_function(*method)?;
                match &self.sess.arenas.decl(mf.decl).kind {
                    DeclKind::Function(f) => Some(f.return_type.clone()),
                    _ => None,
                }
            }
            ExprKind::ArraySubscript { array, .. } => {
                let mut t = self.static_type_of(*array)?;
                if t.array_size.is_some() {
                    t.array_size = None;
                } else {
                    t.pointer_depth = t.pointer_depth.checked_sub(1)?;
                }
                Some(t)
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
                ..
            } => {
                let mut t = self.static_type_of(*operand)?;
                t.pointer_depth = t.pointer_depth.saturating_sub(1);
                Some(t)
            }
            ExprKind::MemberAccess { object, member, .. } => {
                let obj = self.static_type_of(*object)?;
                let (vt, idx) = self.spec_category(&obj);
                if vt != ValueType::Struct {
                    return None;
                }
                let m = self.sess.types.struct_info(idx)?.member(*member)?;
                let mut spec = if m.ty == ValueType::Struct {
                    TypeSpec::indexed(m.type_index)
                } else {
                    TypeSpec::builtin(m.ty)
                };
                spec.pointer_depth = m.pointer_depth;
                Some(spec)
            }
            _ => None,
        }
    }

    // ---- lambdas -------------------------------------------------------

    /// A lambda expression materializes its closure object and queues the
    /// `operator()` body as an extra function.
    fn lower_lambda(&mut self, info: &LambdaInfo, token: Token) -> LowerResult<LoweredValue> {
        let obj = self.fresh_temp_name("lambda_obj");
        let spec = TypeSpec::indexed(info.closure_type);
        self.locals.insert(
            obj,
            LocalSlot {
                ty: spec.clone(),
                storage: StorageClass::Local,
                mangled: None,
            },
        );

        // Fill one field per capture.
        let members: Vec<cinder_ast::StructMember> = self
            .sess
            .types
            .struct_info(info.closure_type)
            .map(|i| i.members.clone())
            .unwrap_or_default();
        for cap in &info.captures {
            let member = match members.iter().find(|m| m.name == cap.name) {
                Some(m) => m.clone(),
                None => continue,
            };
            let value = match cap.kind {
                CaptureKind::ByValue => {
                    self.visit_expression_of_name(cap.name, token)?
                }
                CaptureKind::ByReference => {
                    let target = self
                        .visit_name_place(cap.name, token)?;
                    let addr = self.address_of_place(&target, token)?;
                    TypedValue::pointer(Operand::Temp(addr), 1)
                }
                CaptureKind::This | CaptureKind::CopyThis => {
                    let this = self.sess.interner.intern("this");
                    TypedValue::pointer(Operand::Var(this), 1)
                }
            };
            self.emit(
                IrOpcode::MemberStore,
                IrPayload::MemberStore(MemberStoreOp {
                    object: Operand::Var(obj),
                    member: cap.name,
                    offset: member.offset,
                    through_pointer: false,
                    value,
                }),
                token,
            );
        }

        self.queue_lambda_body(info, token)?;

        let size = self
            .sess
            .types
            .size_bits(ValueType::Struct, info.closure_type);
        let mut lv = LoweredValue::prvalue(TypedValue::new(
            ValueType::Struct,
            size,
            Operand::Var(obj),
        ))
        .with_type_index(info.closure_type)
        .with_place(Place::Local { name: obj });
        lv.spec = spec;
        Ok(lv)
    }

    fn visit_expression_of_name(&mut self, name: Symbol, token: Token) -> LowerResult<TypedValue> {
        let e = self
            .sess
            .arenas
            .alloc_expr(cinder_ast::Expr::new(ExprKind::Identifier { name }, token));
        Ok(self.visit_expression(e, LowerContext::Load)?.typed)
    }

    fn visit_name_place(&mut self, name: Symbol, token: Token) -> LowerResult<Place> {
        let e = self
            .sess
            .arenas
            .alloc_expr(cinder_ast::Expr::new(ExprKind::Identifier { name }, token));
        self.visit_expression(e, LowerContext::LValueAddress)?
            .place
            .ok_or_else(|| {
                CompileError::new(ErrorKind::Type, "cannot capture a non-lvalue", token)
            })
    }

    /// Lower the closure's `operator()` with a fresh function context.
    pub(crate) fn queue_lambda_body(&mut self, info: &LambdaInfo, token: Token) -> LowerResult<()> {
        let op_decl = match &self.sess.arenas.decl(info.call_operator).kind {
            DeclKind::Function(f) => f.clone(),
            _ => return Ok(()),
        };
        let body = match op_decl.body {
            Some(b) => b,
            None => return Ok(()),
        };

        let saved_ir = std::mem::take(&mut self.ir);
        let saved_locals = std::mem::take(&mut self.locals);
        let saved_captures = std::mem::take(&mut self.captures);
        let saved_struct = self.current_struct;
        let saved_name = self.current_function_name;
        let saved_vars = std::mem::replace(&mut self.vars, cinder_ir::VarCounter::new());

        self.current_struct = Some(info.closure_type);
        self.current_function_name = Some(op_decl.name);
        for p in &op_decl.params {
            self.locals.insert(
                p.name,
                LocalSlot {
                    ty: p.ty.clone(),
                    storage: StorageClass::Local,
                    mangled: None,
                },
            );
        }
        for cap in &info.captures {
            self.captures.insert(cap.name, cap.kind);
        }

        let result = self.lower_statement(body);
        if !matches!(self.ir.last().map(|i| i.opcode), Some(IrOpcode::Return)) {
            self.emit(
                IrOpcode::Return,
                IrPayload::Return(cinder_ir::ReturnOp { value: None }),
                token,
            );
        }
        let instructions = std::mem::take(&mut self.ir);

        self.ir = saved_ir;
        self.locals = saved_locals;
        self.captures = saved_captures;
        self.current_struct = saved_struct;
        self.current_function_name = saved_name;
        self.vars = saved_vars;
        result?;

        let name = op_decl.mangled_name.unwrap_or(op_decl.name);
        self.extra_functions.push(LoweredFunction { name, instructions });
        Ok(())
    }

    // ---- construction --------------------------------------------------

    /// Aggregate-construct `init` into the local `name` member by member.
    pub(crate) fn lower_construct_into(
        &mut self,
        name: Symbol,
        ty: &TypeSpec,
        init: ExprId,
        token: Token,
    ) -> LowerResult<()> {
        let (type_index, args) = match &self.sess.arenas.expr(init).kind {
            ExprKind::ConstructorCall { type_index, args }
            | ExprKind::InitializerListConstruction { type_index, args } => {
                (*type_index, args.clone())
            }
            _ => {
                let value = self.visit_expression(init, LowerContext::Load)?;
                self.emit(
                    IrOpcode::Assignment,
                    IrPayload::Assignment(AssignmentOp {
                        target: Operand::Var(name),
                        value: value.typed,
                    }),
                    token,
                );
                return Ok(());
            }
        };
        let _ = ty;
        let members: Vec<cinder_ast::StructMember> = self
            .sess
            .types
            .struct_info(type_index)
            .map(|i| i.members.clone())
            .unwrap_or_default();
        for (member, &arg) in members.iter().zip(args.iter()) {
            let value = self.visit_expression(arg, LowerContext::Load)?;
            self.emit(
                IrOpcode::MemberStore,
                IrPayload::MemberStore(MemberStoreOp {
                    object: Operand::Var(name),
                    member: member.name,
                    offset: member.offset,
                    through_pointer: false,
                    value: value.typed,
                }),
                token,
            );
        }
        Ok(())
    }

    /// `T arr[N] = {a, b, c};` — element-wise stores through computed
    /// addresses.
    pub(crate) fn lower_array_init(
        &mut self,
        ty: &TypeSpec,
        name: Symbol,
        init: ExprId,
        token: Token,
    ) -> LowerResult<()> {
        let args = match &self.sess.arenas.expr(init).kind {
            ExprKind::InitializerListConstruction { args, .. } => args.clone(),
            _ => return Ok(()),
        };
        let element_bits = self.element_size_bits(ty);
        for (i, &arg) in args.iter().enumerate() {
            let value = self.visit_expression(arg, LowerContext::Load)?;
            let addr = self.vars.next();
            self.emit(
                IrOpcode::ArrayElementAddress,
                IrPayload::ArrayElementAddress(ArrayElementAddressOp {
                    base: Operand::Var(name),
                    index: TypedValue::imm(ValueType::UnsignedLongLong, 64, i as u64),
                    element_size_bits: element_bits,
                    result: addr,
                }),
                token,
            );
            self.emit(
                IrOpcode::DereferenceStore,
                IrPayload::DereferenceStore(cinder_ir::DereferenceStoreOp {
                    pointer: Operand::Temp(addr),
                    value: value.typed,
                }),
                token,
            );
        }
        Ok(())
    }

    // ---- pointer-to-member ---------------------------------------------

    fn lower_pointer_to_member(
        &mut self,
        object: ExprId,
        pointer: ExprId,
        is_arrow: bool,
        token: Token,
        ctx: LowerContext,
    ) -> LowerResult<LoweredValue> {
        let base = if is_arrow {
            self.visit_expression(object, LowerContext::Load)?
        } else {
            let place = self
                .visit_expression(object, LowerContext::LValueAddress)?
                .place
                .ok_or_else(|| {
                    CompileError::new(ErrorKind::Type, "pointer-to-member needs an lvalue", token)
                })?;
            let addr = self.address_of_place(&place, token)?;
            LoweredValue::prvalue(TypedValue::pointer(Operand::Temp(addr), 1))
        };
        let ptm = self.visit_expression(pointer, LowerContext::Load)?;

        // address = object + member offset
        let addr = self.vars.next();
        self.emit(
            IrOpcode::Add,
            IrPayload::Binary(BinaryOp {
                lhs: TypedValue::pointer(base.typed.value, 1),
                rhs: TypedValue::new(ValueType::UnsignedLongLong, 64, ptm.typed.value),
                result: addr,
            }),
            token,
        );
        let mut lv = LoweredValue::prvalue(TypedValue::new(
            ValueType::LongLong,
            64,
            Operand::Temp(addr),
        ));
        lv.place = Some(Place::Indirect { pointer: addr });
        if ctx == LowerContext::LValueAddress {
            return Ok(lv);
        }
        let result = self.vars.next();
        self.emit(
            IrOpcode::Dereference,
            IrPayload::Dereference(DereferenceOp {
                pointer: TypedValue::pointer(Operand::Temp(addr), 1),
                size_bits: 64,
                result,
            }),
            token,
        );
        lv.typed.value = Operand::Temp(result);
        Ok(lv)
    }

    // ---- new/delete ----------------------------------------------------

    fn lower_new(
        &mut self,
        ty: &TypeSpec,
        count: Option<ExprId>,
        args: &[ExprId],
        placement: &[ExprId],
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let element_bits = {
            let mut base = ty.clone();
            base.pointer_depth = 0;
            self.sess.types.spec_size_bits(&base).max(8)
        };

        let address = if let Some(&first) = placement.first() {
            // Placement new: no allocation, construct at the given address.
            self.visit_expression(first, LowerContext::Load)?.typed
        } else {
            let size_value = match count {
                Some(c) => {
                    let n = self.visit_expression(c, LowerContext::Load)?;
                    let scaled = self.vars.next();
                    self.emit(
                        IrOpcode::Multiply,
                        IrPayload::Binary(BinaryOp {
                            lhs: n.typed,
                            rhs: TypedValue::imm(
                                ValueType::UnsignedLongLong,
                                64,
                                (element_bits / 8) as u64,
                            ),
                            result: scaled,
                        }),
                        token,
                    );
                    TypedValue::new(ValueType::UnsignedLongLong, 64, Operand::Temp(scaled))
                }
                None => TypedValue::imm(ValueType::UnsignedLongLong, 64, (element_bits / 8) as u64),
            };
            let operator_new = self.sess.interner.intern("_Znwm");
            let result = self.vars.next();
            self.emit(
                IrOpcode::FunctionCall,
                IrPayload::Call(CallOp {
                    function: Operand::Var(operator_new),
                    args: vec![size_value],
                    return_type: ValueType::Pointer,
                    return_size_bits: 64,
                    result: Some(result),
                    return_slot: None,
                    is_variadic: false,
                }),
                token,
            );
            TypedValue::pointer(Operand::Temp(result), 1)
        };

        // Constructor arguments store through the fresh object.
        if !args.is_empty() {
            if let TypeSpecKind::Indexed(idx) = ty.kind {
                let members: Vec<cinder_ast::StructMember> = self
                    .sess
                    .types
                    .struct_info(idx)
                    .map(|i| i.members.clone())
                    .unwrap_or_default();
                for (member, &arg) in members.iter().zip(args.iter()) {
                    let value = self.visit_expression(arg, LowerContext::Load)?;
                    self.emit(
                        IrOpcode::MemberStore,
                        IrPayload::MemberStore(MemberStoreOp {
                            object: address.value,
                            member: member.name,
                            offset: member.offset,
                            through_pointer: true,
                            value: value.typed,
                        }),
                        token,
                    );
                }
            }
        }

        let mut out_spec = ty.clone();
        out_spec.pointer_depth += 1;
        let mut lv = LoweredValue::prvalue(TypedValue::pointer(address.value, out_spec.pointer_depth));
        lv.spec = out_spec;
        if let TypeSpecKind::Indexed(idx) = ty.kind {
            lv.type_index = idx;
        }
        Ok(lv)
    }

    fn lower_delete(
        &mut self,
        operand: ExprId,
        _is_array: bool,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let value = self.visit_expression(operand, LowerContext::Load)?;
        let operator_delete = self.sess.interner.intern("_ZdlPv");
        self.emit(
            IrOpcode::FunctionCall,
            IrPayload::Call(CallOp {
                function: Operand::Var(operator_delete),
                args: vec![value.typed],
                return_type: ValueType::Void,
                return_size_bits: 0,
                result: None,
                return_slot: None,
                is_variadic: false,
            }),
            token,
        );
        Ok(LoweredValue::prvalue(TypedValue::imm(ValueType::Void, 0, 0)))
    }

    // ---- inc/dec -------------------------------------------------------

    pub(crate) fn lower_incdec(
        &mut self,
        op: UnaryOp,
        operand: ExprId,
        token: Token,
    ) -> LowerResult<LoweredValue> {
        let value = self.visit_expression(operand, LowerContext::Load)?;
        let place = value.place.clone().ok_or_else(|| {
            CompileError::new(ErrorKind::Type, "increment target is not an lvalue", token)
        })?;

        // Pointers advance by the element size and store back.
        if value.typed.ty == ValueType::Pointer {
            let element_bytes = (self.element_size_bits(&value.spec) / 8).max(1) as u64;
            let delta = TypedValue::imm(ValueType::UnsignedLongLong, 64, element_bytes);
            let arith_opcode = match op {
                UnaryOp::PreIncrement | UnaryOp::PostIncrement => IrOpcode::Add,
                _ => IrOpcode::Subtract,
            };
            let updated = self.vars.next();
            self.emit(
                arith_opcode,
                IrPayload::Binary(BinaryOp {
                    lhs: value.typed,
                    rhs: delta,
                    result: updated,
                }),
                token,
            );
            let mut stored = value.typed;
            stored.value = Operand::Temp(updated);
            self.store_to_place(&place, stored, token)?;
            let result_value = match op {
                UnaryOp::PostIncrement | UnaryOp::PostDecrement => value.typed,
                _ => stored,
            };
            let mut lv = value.clone();
            lv.typed = result_value;
            lv.place = None;
            return Ok(lv);
        }

        match &place {
            Place::Local { name } => {
                let opcode = match op {
                    UnaryOp::PreIncrement => IrOpcode::PreIncrement,
                    UnaryOp::PostIncrement => IrOpcode::PostIncrement,
                    UnaryOp::PreDecrement => IrOpcode::PreDecrement,
                    _ => IrOpcode::PostDecrement,
                };
                let result = self.vars.next();
                self.emit(
                    opcode,
                    IrPayload::IncDec(IncDecOp {
                        target: Operand::Var(*name),
                        ty: value.typed.ty,
                        size_bits: value.typed.size_bits,
                        result,
                    }),
                    token,
                );
                let mut lv = value.clone();
                lv.typed.value = Operand::Temp(result);
                lv.place = None;
                Ok(lv)
            }
            // Members, globals, and indirect targets load-compute-store.
            _ => {
                let one = TypedValue::imm(value.typed.ty, value.typed.size_bits, 1);
                let arith_opcode = match op {
                    UnaryOp::PreIncrement | UnaryOp::PostIncrement => IrOpcode::Add,
                    _ => IrOpcode::Subtract,
                };
                let updated = self.vars.next();
                self.emit(
                    arith_opcode,
                    IrPayload::Binary(BinaryOp {
                        lhs: value.typed,
                        rhs: one,
                        result: updated,
                    }),
                    token,
                );
                let mut stored = value.typed;
                stored.value = Operand::Temp(updated);
                self.store_to_place(&place, stored, token)?;
                let result_value = match op {
                    UnaryOp::PostIncrement | UnaryOp::PostDecrement => value.typed,
                    _ => stored,
                };
                let mut lv = value.clone();
                lv.typed = result_value;
                lv.place = None;
                Ok(lv)
            }
        }
    }

    // ---- addresses -----------------------------------------------------

    /// A temp holding the address of a place.
    pub(crate) fn address_of_place(&mut self, place: &Place, token: Token) -> LowerResult<TempVar> {
        match place {
            Place::Local { name } => {
                let result = self.vars.next();
                self.emit(
                    IrOpcode::AddressOf,
                    IrPayload::AddressOf(AddressOfOp {
                        source: Operand::Var(*name),
                        offset: 0,
                        result,
                    }),
                    token,
                );
                Ok(result)
            }
            Place::Global { name } => {
                let result = self.vars.next();
                self.emit(
                    IrOpcode::AddressOf,
                    IrPayload::AddressOf(AddressOfOp {
                        source: Operand::Var(*name),
                        offset: 0,
                        result,
                    }),
                    token,
                );
                Ok(result)
            }
            Place::Member { base, offset, .. } => match base {
                Operand::Var(name) => {
                    let result = self.vars.next();
                    self.emit(
                        IrOpcode::AddressOf,
                        IrPayload::AddressOf(AddressOfOp {
                            source: Operand::Var(*name),
                            offset: *offset,
                            result,
                        }),
                        token,
                    );
                    Ok(result)
                }
                other => {
                    let result = self.vars.next();
                    self.emit(
                        IrOpcode::ComputeAddress,
                        IrPayload::ComputeAddress(ComputeAddressOp {
                            base: *other,
                            array_indices: Vec::new(),
                            member_offset: *offset,
                            result,
                        }),
                        token,
                    );
                    Ok(result)
                }
            },
            Place::Indirect { pointer } => Ok(*pointer),
        }
    }
}

pub(crate) fn bind_session_enumerators(
    evaluator: &mut ConstEvaluator<'_>,
    sess: &cinder_parse::Session,
) {
    for i in 1..sess.types.len() {
        if let Some(info) = sess.types.enum_info(TypeIndex(i as u32)) {
            if !info.is_scoped {
                for e in &info.enumerators {
                    evaluator.bind(e.name, ConstValue::Int(e.value));
                }
            }
        }
    }
}
