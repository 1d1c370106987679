//! Debug rendering of IR instructions.
//!
//! The textual form is for logs and tests only; the typed payloads are the
//! wire contract.

use crate::instr::{IrInstruction, IrPayload};
use crate::value::{Operand, TypedValue};
use std::fmt;

struct Op(Operand);

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Temp(t) => write!(f, "t{}", t.number()),
            Operand::Var(s) => write!(f, "%{}", s.as_u32()),
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::FloatImm(v) => write!(f, "{v}"),
        }
    }
}

struct Tv<'a>(&'a TypedValue);

impl fmt::Display for Tv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{} {}", self.0.ty, self.0.size_bits, Op(self.0.value))
    }
}

impl fmt::Display for IrInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.opcode)?;
        match &self.payload {
            IrPayload::Binary(op) => {
                write!(f, " t{} <- {}, {}", op.result.number(), Tv(&op.lhs), Tv(&op.rhs))
            }
            IrPayload::Unary(op) => {
                write!(f, " t{} <- {}", op.result.number(), Tv(&op.operand))
            }
            IrPayload::Assignment(op) => write!(f, " {} <- {}", Op(op.target), Tv(&op.value)),
            IrPayload::GlobalLoad(op) => {
                write!(f, " t{} <- @{}", op.result.number(), op.name.as_u32())
            }
            IrPayload::GlobalStore(op) => {
                write!(f, " @{} <- {}", op.name.as_u32(), Tv(&op.value))
            }
            IrPayload::MemberLoad(op) => write!(
                f,
                " t{} <- {}.+{}",
                op.result.number(),
                Op(op.object),
                op.offset
            ),
            IrPayload::MemberStore(op) => {
                write!(f, " {}.+{} <- {}", Op(op.object), op.offset, Tv(&op.value))
            }
            IrPayload::Dereference(op) => {
                write!(f, " t{} <- *{}", op.result.number(), Tv(&op.pointer))
            }
            IrPayload::DereferenceStore(op) => {
                write!(f, " *{} <- {}", Op(op.pointer), Tv(&op.value))
            }
            IrPayload::AddressOf(op) => write!(
                f,
                " t{} <- &{} +{}",
                op.result.number(),
                Op(op.source),
                op.offset
            ),
            IrPayload::ComputeAddress(op) => {
                write!(f, " t{} <- &{}", op.result.number(), Op(op.base))?;
                for idx in &op.array_indices {
                    write!(f, " [{} x {}b]", Op(idx.index.value), idx.element_size_bits)?;
                }
                write!(f, " +{}", op.member_offset)
            }
            IrPayload::ArrayElementAddress(op) => write!(
                f,
                " t{} <- &{}[{} x {}b]",
                op.result.number(),
                Op(op.base),
                Op(op.index.value),
                op.element_size_bits
            ),
            IrPayload::Conversion(op) => write!(
                f,
                " t{} <- {} as {:?}:{}",
                op.result.number(),
                Tv(&op.value),
                op.to_ty,
                op.to_size_bits
            ),
            IrPayload::Call(op) => {
                match op.result {
                    Some(r) => write!(f, " t{} <- {}(", r.number(), Op(op.function))?,
                    None => write!(f, " {}(", Op(op.function))?,
                }
                for (i, arg) in op.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Tv(arg))?;
                }
                write!(f, ")")
            }
            IrPayload::ConditionalBranch(op) => write!(
                f,
                " {} ? L{} : L{}",
                Tv(&op.condition),
                op.true_label.as_u32(),
                op.false_label.as_u32()
            ),
            IrPayload::Label(op) => write!(f, " L{}:", op.name.as_u32()),
            IrPayload::Branch(op) => write!(f, " -> L{}", op.target.as_u32()),
            IrPayload::Return(op) => match &op.value {
                Some(v) => write!(f, " {}", Tv(v)),
                None => Ok(()),
            },
            IrPayload::FunctionAddress(op) => {
                write!(f, " t{} <- &fn {}", op.result.number(), op.function.as_u32())
            }
            IrPayload::StringLiteral(op) => {
                write!(f, " t{} <- str {}", op.result.number(), op.value.as_u32())
            }
            IrPayload::IncDec(op) => write!(f, " t{} <- {}", op.result.number(), Op(op.target)),
            IrPayload::None => Ok(()),
        }
    }
}
