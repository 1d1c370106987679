use crate::value::{Operand, TempVar, TypedValue};
use cinder_ast::ValueType;
use cinder_common::{Symbol, Token};

/// The opcode enumeration. This is the wire contract with the backend and
/// must stay bit-stable: append only, never reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum IrOpcode {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    UnsignedDivide,
    Modulo,
    UnsignedModulo,
    Negate,
    FloatAdd,
    FloatSubtract,
    FloatMultiply,
    FloatDivide,
    FloatNegate,
    // Bitwise
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    UnsignedLessThan,
    UnsignedLessEqual,
    UnsignedGreaterThan,
    UnsignedGreaterEqual,
    FloatEqual,
    FloatNotEqual,
    FloatLessThan,
    FloatLessEqual,
    FloatGreaterThan,
    FloatGreaterEqual,
    // Logical
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    // Assignment
    Assignment,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    // Memory
    GlobalLoad,
    GlobalStore,
    MemberAccess,
    MemberStore,
    Dereference,
    DereferenceStore,
    AddressOf,
    AddressOfMember,
    ArrayElementAddress,
    ComputeAddress,
    // Control
    Label,
    Branch,
    ConditionalBranch,
    FunctionCall,
    Return,
    // Conversion
    SignExtend,
    ZeroExtend,
    Truncate,
    IntToFloat,
    FloatToInt,
    FloatToFloat,
    // Miscellaneous
    FunctionAddress,
    StringLiteral,
    DestructorCall,
    PreIncrement,
    PostIncrement,
    PreDecrement,
    PostDecrement,
    SehGetExceptionCode,
    SehAbnormalTermination,
    SehGetExceptionInfo,
    SehGetExceptionCodeBody,
}

/// Two-operand arithmetic/comparison/bitwise payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    pub lhs: TypedValue,
    pub rhs: TypedValue,
    pub result: TempVar,
}

/// One-operand payload (`Negate`, `BitwiseNot`, `LogicalNot`).
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOp {
    pub operand: TypedValue,
    pub result: TempVar,
}

/// Store into a named local slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOp {
    pub target: Operand,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalLoadOp {
    pub name: Symbol,
    pub ty: ValueType,
    pub size_bits: u32,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStoreOp {
    pub name: Symbol,
    pub value: TypedValue,
}

/// Load of a member (`MemberAccess` opcode).
#[derive(Debug, Clone, PartialEq)]
pub struct MemberLoadOp {
    pub object: Operand,
    pub member: Symbol,
    pub offset: u32,
    pub ty: ValueType,
    pub size_bits: u32,
    pub pointer_depth: u32,
    /// True when `object` is a pointer (arrow access / `this`).
    pub through_pointer: bool,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberStoreOp {
    pub object: Operand,
    pub member: Symbol,
    pub offset: u32,
    pub through_pointer: bool,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DereferenceOp {
    pub pointer: TypedValue,
    /// Size of the loaded value.
    pub size_bits: u32,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DereferenceStoreOp {
    pub pointer: Operand,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressOfOp {
    pub source: Operand,
    /// Byte offset folded into the address (member address-of).
    pub offset: u32,
    pub result: TempVar,
}

/// One scaled index inside a `ComputeAddress`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayIndex {
    pub index: TypedValue,
    pub element_size_bits: u32,
}

/// `base + sum(index_i * size_i) + member_offset` in one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeAddressOp {
    pub base: Operand,
    pub array_indices: Vec<ArrayIndex>,
    pub member_offset: u32,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayElementAddressOp {
    pub base: Operand,
    pub index: TypedValue,
    pub element_size_bits: u32,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOp {
    pub value: TypedValue,
    pub to_ty: ValueType,
    pub to_size_bits: u32,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallOp {
    /// Mangled callee name, or the pointer temp for indirect calls.
    pub function: Operand,
    pub args: Vec<TypedValue>,
    pub return_type: ValueType,
    pub return_size_bits: u32,
    pub result: Option<TempVar>,
    /// Hidden first argument holding the address of a large-struct return.
    pub return_slot: Option<TempVar>,
    pub is_variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranchOp {
    pub condition: TypedValue,
    pub true_label: Symbol,
    pub false_label: Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelOp {
    pub name: Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchOp {
    pub target: Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnOp {
    pub value: Option<TypedValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionAddressOp {
    pub function: Symbol,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteralOp {
    /// Escape-processed bytes, interned.
    pub value: Symbol,
    pub result: TempVar,
}

/// Pre/post increment/decrement of an integer slot.
#[derive(Debug, Clone, PartialEq)]
pub struct IncDecOp {
    pub target: Operand,
    pub ty: ValueType,
    pub size_bits: u32,
    pub result: TempVar,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrPayload {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Assignment(AssignmentOp),
    GlobalLoad(GlobalLoadOp),
    GlobalStore(GlobalStoreOp),
    MemberLoad(MemberLoadOp),
    MemberStore(MemberStoreOp),
    Dereference(DereferenceOp),
    DereferenceStore(DereferenceStoreOp),
    AddressOf(AddressOfOp),
    ComputeAddress(ComputeAddressOp),
    ArrayElementAddress(ArrayElementAddressOp),
    Conversion(ConversionOp),
    Call(CallOp),
    ConditionalBranch(ConditionalBranchOp),
    Label(LabelOp),
    Branch(BranchOp),
    Return(ReturnOp),
    FunctionAddress(FunctionAddressOp),
    StringLiteral(StringLiteralOp),
    IncDec(IncDecOp),
    /// Opcode-only instructions (SEH intrinsics, destructor calls).
    None,
}

/// One IR instruction: opcode, typed payload, and originating token.
#[derive(Debug, Clone, PartialEq)]
pub struct IrInstruction {
    pub opcode: IrOpcode,
    pub payload: IrPayload,
    pub token: Token,
}

impl IrInstruction {
    pub fn new(opcode: IrOpcode, payload: IrPayload, token: Token) -> Self {
        Self {
            opcode,
            payload,
            token,
        }
    }

    /// The temp this instruction defines, if any.
    pub fn defined_temp(&self) -> Option<TempVar> {
        match &self.payload {
            IrPayload::Binary(op) => Some(op.result),
            IrPayload::Unary(op) => Some(op.result),
            IrPayload::GlobalLoad(op) => Some(op.result),
            IrPayload::MemberLoad(op) => Some(op.result),
            IrPayload::Dereference(op) => Some(op.result),
            IrPayload::AddressOf(op) => Some(op.result),
            IrPayload::ComputeAddress(op) => Some(op.result),
            IrPayload::ArrayElementAddress(op) => Some(op.result),
            IrPayload::Conversion(op) => Some(op.result),
            IrPayload::Call(op) => op.result,
            IrPayload::FunctionAddress(op) => Some(op.result),
            IrPayload::StringLiteral(op) => Some(op.result),
            IrPayload::IncDec(op) => Some(op.result),
            IrPayload::Assignment(op) => op.target.as_temp(),
            _ => None,
        }
    }

    /// All temps this instruction reads.
    pub fn used_temps(&self) -> Vec<TempVar> {
        fn operand(out: &mut Vec<TempVar>, op: Operand) {
            if let Operand::Temp(t) = op {
                out.push(t);
            }
        }
        fn typed(out: &mut Vec<TempVar>, tv: &TypedValue) {
            operand(out, tv.value);
        }
        let mut out = Vec::new();
        match &self.payload {
            IrPayload::Binary(op) => {
                typed(&mut out, &op.lhs);
                typed(&mut out, &op.rhs);
            }
            IrPayload::Unary(op) => typed(&mut out, &op.operand),
            IrPayload::Assignment(op) => typed(&mut out, &op.value),
            IrPayload::GlobalStore(op) => typed(&mut out, &op.value),
            IrPayload::MemberLoad(op) => operand(&mut out, op.object),
            IrPayload::MemberStore(op) => {
                operand(&mut out, op.object);
                typed(&mut out, &op.value);
            }
            IrPayload::Dereference(op) => typed(&mut out, &op.pointer),
            IrPayload::DereferenceStore(op) => {
                operand(&mut out, op.pointer);
                typed(&mut out, &op.value);
            }
            IrPayload::AddressOf(op) => operand(&mut out, op.source),
            IrPayload::ComputeAddress(op) => {
                operand(&mut out, op.base);
                for idx in &op.array_indices {
                    typed(&mut out, &idx.index);
                }
            }
            IrPayload::ArrayElementAddress(op) => {
                operand(&mut out, op.base);
                typed(&mut out, &op.index);
            }
            IrPayload::Conversion(op) => typed(&mut out, &op.value),
            IrPayload::Call(op) => {
                operand(&mut out, op.function);
                for arg in &op.args {
                    typed(&mut out, arg);
                }
            }
            IrPayload::ConditionalBranch(op) => typed(&mut out, &op.condition),
            IrPayload::Return(op) => {
                if let Some(v) = &op.value {
                    typed(&mut out, v);
                }
            }
            IrPayload::IncDec(op) => operand(&mut out, op.target),
            IrPayload::GlobalLoad(_)
            | IrPayload::Label(_)
            | IrPayload::Branch(_)
            | IrPayload::FunctionAddress(_)
            | IrPayload::StringLiteral(_)
            | IrPayload::None => {}
        }
        out
    }
}
