use cinder_ast::{
    CaptureKind, DeclId, DeclKind, ExprKind, StmtId, StmtKind, StorageClass, TypeIndex, TypeSpec,
    TypeSpecKind, ValueType,
};
use cinder_common::{CompileError, ErrorKind, Symbol, Token};
use cinder_ir::{
    AssignmentOp, BranchOp, ConditionalBranchOp, IrInstruction, IrOpcode, IrPayload, LabelOp,
    LoweredValue, Operand, ReturnOp, TypedValue, VarCounter,
};
use cinder_parse::{ParsedUnit, Session};
use rustc_hash::FxHashMap;

pub type LowerResult<T> = Result<T, CompileError>;

/// How the caller wants the expression's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerContext {
    /// Produce the value itself.
    Load,
    /// Produce addressable storage for a following store.
    LValueAddress,
}

/// One lowered function body.
#[derive(Debug)]
pub struct LoweredFunction {
    /// Mangled symbol the backend emits.
    pub name: Symbol,
    pub instructions: Vec<IrInstruction>,
}

/// A local variable visible to the function being lowered.
#[derive(Debug, Clone)]
pub(crate) struct LocalSlot {
    pub ty: TypeSpec,
    pub storage: StorageClass,
    /// Mangled global name for static locals.
    pub mangled: Option<Symbol>,
}

pub struct Lowerer<'s> {
    pub sess: &'s mut Session,
    pub unit: &'s ParsedUnit,
    pub(crate) ir: Vec<IrInstruction>,
    pub(crate) vars: VarCounter,
    label_counter: u32,
    temp_name_counter: u32,
    pub(crate) locals: FxHashMap<Symbol, LocalSlot>,
    /// The struct whose member function is being lowered, if any.
    pub(crate) current_struct: Option<TypeIndex>,
    pub(crate) current_function_name: Option<Symbol>,
    /// Captures of the closure whose `operator()` is being lowered.
    pub(crate) captures: FxHashMap<Symbol, CaptureKind>,
    /// Break/continue targets, innermost last.
    loop_stack: Vec<(Symbol, Symbol)>,
    /// Lambda bodies discovered while lowering; emitted as extra functions.
    pub(crate) extra_functions: Vec<LoweredFunction>,
}

impl<'s> Lowerer<'s> {
    pub fn new(sess: &'s mut Session, unit: &'s ParsedUnit) -> Self {
        Self {
            sess,
            unit,
            ir: Vec::new(),
            vars: VarCounter::new(),
            label_counter: 0,
            temp_name_counter: 0,
            locals: FxHashMap::default(),
            current_struct: None,
            current_function_name: None,
            captures: FxHashMap::default(),
            loop_stack: Vec::new(),
            extra_functions: Vec::new(),
        }
    }

    /// Lower one function declaration to its instruction list, plus any
    /// closures synthesized inside it.
    pub fn lower_function(&mut self, decl: DeclId) -> LowerResult<Vec<LoweredFunction>> {
        let (func, token) = match &self.sess.arenas.decl(decl).kind {
            DeclKind::Function(f) => (f.clone(), self.sess.arenas.decl(decl).token),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    "not a function declaration",
                    self.sess.arenas.decl(decl).token,
                ))
            }
        };
        let body = match func.body {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };

        self.ir.clear();
        self.vars = VarCounter::new();
        self.locals.clear();
        self.loop_stack.clear();
        self.current_struct = func.member_of;
        self.current_function_name = Some(func.name);

        for p in &func.params {
            self.locals.insert(
                p.name,
                LocalSlot {
                    ty: p.ty.clone(),
                    storage: StorageClass::Local,
                    mangled: None,
                },
            );
        }
        // System V variadic prologue fills a compiler-generated va_list
        // struct; make its name visible to `va_start`.
        if func.is_variadic {
            let va_struct = self.sess.interner.intern("__varargs_va_list_struct__");
            self.locals.insert(
                va_struct,
                LocalSlot {
                    ty: TypeSpec::builtin(ValueType::Void),
                    storage: StorageClass::Local,
                    mangled: None,
                },
            );
        }

        self.lower_statement(body)?;

        // Fall off the end of a void function.
        let needs_return = !matches!(
            self.ir.last().map(|i| i.opcode),
            Some(IrOpcode::Return)
        );
        if needs_return {
            self.ir.push(IrInstruction::new(
                IrOpcode::Return,
                IrPayload::Return(ReturnOp { value: None }),
                token,
            ));
        }

        let name = func
            .mangled_name
            .unwrap_or(func.name);
        let mut out = vec![LoweredFunction {
            name,
            instructions: std::mem::take(&mut self.ir),
        }];
        out.append(&mut self.extra_functions);
        Ok(out)
    }

    pub(crate) fn emit(&mut self, opcode: IrOpcode, payload: IrPayload, token: Token) {
        self.ir.push(IrInstruction::new(opcode, payload, token));
    }

    pub(crate) fn fresh_label(&mut self, stem: &str) -> Symbol {
        self.label_counter += 1;
        let name = format!(".L{}_{}", stem, self.label_counter);
        self.sess.interner.intern(&name)
    }

    pub(crate) fn fresh_temp_name(&mut self, stem: &str) -> Symbol {
        self.temp_name_counter += 1;
        let name = format!("__{}_{}", stem, self.temp_name_counter);
        self.sess.interner.intern(&name)
    }

    pub(crate) fn emit_label(&mut self, label: Symbol, token: Token) {
        self.emit(IrOpcode::Label, IrPayload::Label(LabelOp { name: label }), token);
    }

    pub(crate) fn emit_branch(&mut self, target: Symbol, token: Token) {
        self.emit(IrOpcode::Branch, IrPayload::Branch(BranchOp { target }), token);
    }

    pub(crate) fn emit_cond_branch(
        &mut self,
        condition: TypedValue,
        true_label: Symbol,
        false_label: Symbol,
        token: Token,
    ) {
        self.emit(
            IrOpcode::ConditionalBranch,
            IrPayload::ConditionalBranch(ConditionalBranchOp {
                condition,
                true_label,
                false_label,
            }),
            token,
        );
    }

    // ---- statements ----------------------------------------------------

    pub(crate) fn lower_statement(&mut self, stmt: StmtId) -> LowerResult<()> {
        let node = self.sess.arenas.stmt(stmt).clone();
        let token = node.token;
        match node.kind {
            StmtKind::Empty | StmtKind::StaticAssert { .. } => Ok(()),

            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.lower_statement(s)?;
                }
                Ok(())
            }

            StmtKind::Expr(e) => {
                self.visit_expression(e, LowerContext::Load)?;
                Ok(())
            }

            StmtKind::VarDecl(decl) => self.lower_var_decl(decl, token),

            StmtKind::Return(value) => {
                let typed = match value {
                    Some(e) => Some(self.visit_expression(e, LowerContext::Load)?.typed),
                    None => None,
                };
                self.emit(
                    IrOpcode::Return,
                    IrPayload::Return(ReturnOp { value: typed }),
                    token,
                );
                Ok(())
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_value = self.visit_expression(cond, LowerContext::Load)?;
                let then_label = self.fresh_label("then");
                let else_label = self.fresh_label("else");
                let end_label = self.fresh_label("endif");
                let false_target = if else_branch.is_some() {
                    else_label
                } else {
                    end_label
                };
                self.emit_cond_branch(cond_value.typed, then_label, false_target, token);
                self.emit_label(then_label, token);
                self.lower_statement(then_branch)?;
                self.emit_branch(end_label, token);
                if let Some(else_branch) = else_branch {
                    self.emit_label(else_label, token);
                    self.lower_statement(else_branch)?;
                    self.emit_branch(end_label, token);
                }
                self.emit_label(end_label, token);
                Ok(())
            }

            StmtKind::While { cond, body } => {
                let cond_label = self.fresh_label("while_cond");
                let body_label = self.fresh_label("while_body");
                let end_label = self.fresh_label("while_end");
                self.emit_branch(cond_label, token);
                self.emit_label(cond_label, token);
                let cond_value = self.visit_expression(cond, LowerContext::Load)?;
                self.emit_cond_branch(cond_value.typed, body_label, end_label, token);
                self.emit_label(body_label, token);
                self.loop_stack.push((end_label, cond_label));
                self.lower_statement(body)?;
                self.loop_stack.pop();
                self.emit_branch(cond_label, token);
                self.emit_label(end_label, token);
                Ok(())
            }

            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.lower_statement(init)?;
                }
                let cond_label = self.fresh_label("for_cond");
                let body_label = self.fresh_label("for_body");
                let step_label = self.fresh_label("for_step");
                let end_label = self.fresh_label("for_end");
                self.emit_branch(cond_label, token);
                self.emit_label(cond_label, token);
                match cond {
                    Some(c) => {
                        let cond_value = self.visit_expression(c, LowerContext::Load)?;
                        self.emit_cond_branch(cond_value.typed, body_label, end_label, token);
                    }
                    None => self.emit_branch(body_label, token),
                }
                self.emit_label(body_label, token);
                self.loop_stack.push((end_label, step_label));
                self.lower_statement(body)?;
                self.loop_stack.pop();
                self.emit_branch(step_label, token);
                self.emit_label(step_label, token);
                if let Some(step) = step {
                    self.visit_expression(step, LowerContext::Load)?;
                }
                self.emit_branch(cond_label, token);
                self.emit_label(end_label, token);
                Ok(())
            }

            StmtKind::Break => {
                let (end, _) = *self.loop_stack.last().ok_or_else(|| {
                    CompileError::new(ErrorKind::Syntax, "break outside of loop", token)
                })?;
                self.emit_branch(end, token);
                Ok(())
            }

            StmtKind::Continue => {
                let (_, next) = *self.loop_stack.last().ok_or_else(|| {
                    CompileError::new(ErrorKind::Syntax, "continue outside of loop", token)
                })?;
                self.emit_branch(next, token);
                Ok(())
            }
        }
    }

    fn lower_var_decl(&mut self, decl: DeclId, token: Token) -> LowerResult<()> {
        let var = match &self.sess.arenas.decl(decl).kind {
            DeclKind::Variable(v) => v.clone(),
            _ => return Ok(()),
        };
        // A local of class type needs the layout for its slot size.
        if let TypeSpecKind::Indexed(idx) = var.ty.kind {
            let _ = self.sess.engine().ensure_layout(idx);
        }
        self.locals.insert(
            var.name,
            LocalSlot {
                ty: var.ty.clone(),
                storage: var.storage,
                mangled: var.mangled_name,
            },
        );
        let init = match var.init {
            Some(e) => e,
            None => return Ok(()),
        };

        // Static locals are backend-emitted globals; their initializer is a
        // data-section concern, not per-call code.
        if var.storage == StorageClass::StaticLocal {
            return Ok(());
        }

        // Aggregate array initialization stores element by element.
        if var.ty.array_size.is_some() {
            return self.lower_array_init(&var.ty, var.name, init, token);
        }

        // Struct construction writes through the object's address.
        if let ExprKind::ConstructorCall { .. } | ExprKind::InitializerListConstruction { .. } =
            self.sess.arenas.expr(init).kind
        {
            if matches!(var.ty.kind, TypeSpecKind::Indexed(_)) && var.ty.pointer_depth == 0 {
                return self.lower_construct_into(var.name, &var.ty, init, token);
            }
        }

        let mut value = self.visit_expression(init, LowerContext::Load)?;
        // Reference locals bind to an address: the slot holds a pointer.
        if var.ty.is_reference || var.ty.is_rvalue_reference {
            let place = value.place.clone().ok_or_else(|| {
                CompileError::new(ErrorKind::Type, "reference must bind to an lvalue", token)
            })?;
            let addr = self.address_of_place(&place, token)?;
            value = LoweredValue::prvalue(TypedValue::pointer(Operand::Temp(addr), 1));
        } else {
            value.typed = self.convert_for_store(&value, &var.ty, token)?;
        }
        self.emit(
            IrOpcode::Assignment,
            IrPayload::Assignment(AssignmentOp {
                target: Operand::Var(var.name),
                value: value.typed,
            }),
            token,
        );
        Ok(())
    }

    pub(crate) fn local_slot(&self, name: Symbol) -> Option<&LocalSlot> {
        self.locals.get(&name)
    }
}
