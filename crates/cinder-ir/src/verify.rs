use crate::instr::IrInstruction;
use crate::value::TempVar;
use rustc_hash::FxHashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IrVerifyError {
    #[error("temp t{} defined more than once", .0.number())]
    Redefined(TempVar),
    #[error("temp t{} used before definition", .0.number())]
    UsedBeforeDefinition(TempVar),
}

/// Check the single-definition discipline: every temp is defined exactly once
/// and every use is preceded by its definition.
///
/// Ternary lowering assigns the shared result temp on both branches; a temp
/// re-assigned by an `Assignment` whose target is that same temp is allowed.
pub fn verify_temp_discipline(instrs: &[IrInstruction]) -> Result<(), IrVerifyError> {
    let mut defined: FxHashSet<TempVar> = FxHashSet::default();
    for instr in instrs {
        for used in instr.used_temps() {
            if !defined.contains(&used) {
                return Err(IrVerifyError::UsedBeforeDefinition(used));
            }
        }
        if let Some(def) = instr.defined_temp() {
            let is_branch_merge = matches!(&instr.payload, crate::instr::IrPayload::Assignment(_));
            if !defined.insert(def) && !is_branch_merge {
                return Err(IrVerifyError::Redefined(def));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{BinaryOp, IrOpcode, IrPayload};
    use crate::value::{Operand, TypedValue, VarCounter};
    use cinder_ast::ValueType;
    use cinder_common::{SourceMap, SymbolInterner, Token, TokenKind};

    fn token() -> Token {
        let mut interner = SymbolInterner::new();
        let mut sources = SourceMap::new();
        let file = sources.add_file("ir.cpp");
        Token::new(TokenKind::Operator, interner.intern("+"), file, 1, 1)
    }

    fn add(result: crate::TempVar, lhs: TypedValue, rhs: TypedValue) -> IrInstruction {
        IrInstruction::new(
            IrOpcode::Add,
            IrPayload::Binary(BinaryOp { lhs, rhs, result }),
            token(),
        )
    }

    #[test]
    fn well_formed_chain_passes() {
        let mut counter = VarCounter::new();
        let t0 = counter.next();
        let t1 = counter.next();
        let five = TypedValue::imm(ValueType::Int, 32, 5);
        let instrs = vec![
            add(t0, five, five),
            add(t1, TypedValue::new(ValueType::Int, 32, Operand::Temp(t0)), five),
        ];
        assert!(verify_temp_discipline(&instrs).is_ok());
    }

    #[test]
    fn use_before_definition_is_rejected() {
        let mut counter = VarCounter::new();
        let t0 = counter.next();
        let t1 = counter.next();
        let use_t1 = TypedValue::new(ValueType::Int, 32, Operand::Temp(t1));
        let instrs = vec![add(t0, use_t1, use_t1)];
        assert_eq!(
            verify_temp_discipline(&instrs),
            Err(IrVerifyError::UsedBeforeDefinition(t1))
        );
    }

    #[test]
    fn double_definition_is_rejected() {
        let mut counter = VarCounter::new();
        let t0 = counter.next();
        let five = TypedValue::imm(ValueType::Int, 32, 5);
        let instrs = vec![add(t0, five, five), add(t0, five, five)];
        assert_eq!(
            verify_temp_discipline(&instrs),
            Err(IrVerifyError::Redefined(t0))
        );
    }
}
