//! One-pass address computation.
//!
//! `&a.b[i].c` lowered step by step costs a temp and a load per link. The
//! planner walks the chain once, accumulating the member offset and the
//! scaled indices, so the whole thing becomes a single `ComputeAddress`:
//! `base + sum(index_i * size_i) + member_offset`.
//!
//! Shapes the planner rejects (arrow access, pointer subscripts that need a
//! load, anything but a named local base) fall back to the per-step path in
//! the caller.

use crate::lower::{LowerContext, Lowerer, LowerResult};
use cinder_ast::{ExprId, ExprKind, StorageClass, TypeSpec, TypeSpecKind};
use cinder_common::Symbol;
use cinder_ir::{
    ArrayIndex, ComputeAddressOp, IrOpcode, IrPayload, LoweredValue, Operand, TypedValue,
};

/// One link of a planned address chain.
pub(crate) enum AddrStep {
    /// `.member` on a by-value struct: a constant byte offset.
    Member { offset: u32 },
    /// `[index]` into a direct array: a scaled index, evaluated at emission.
    Index { index: ExprId, element_bits: u32 },
}

/// A flattened `&base.b[i].c` chain, ready to emit as one instruction.
pub(crate) struct AddressPlan {
    pub base: Symbol,
    pub steps: Vec<AddrStep>,
    /// Type of the addressed element.
    pub result_spec: TypeSpec,
}

impl Lowerer<'_> {
    /// Plan the address of `e` without emitting IR. `None` means the shape
    /// needs the legacy per-step lowering.
    pub(crate) fn plan_address(&self, e: ExprId) -> Option<AddressPlan> {
        let (base, steps, result_spec) = self.plan_walk(e)?;
        // A bare local needs no flattening; the fallback handles it with a
        // plain AddressOf.
        if steps.is_empty() {
            return None;
        }
        Some(AddressPlan {
            base,
            steps,
            result_spec,
        })
    }

    fn plan_walk(&self, e: ExprId) -> Option<(Symbol, Vec<AddrStep>, TypeSpec)> {
        match &self.sess.arenas.expr(e).kind {
            ExprKind::Identifier { name } => {
                let slot = self.local_slot(*name)?;
                if slot.storage == StorageClass::StaticLocal
                    || slot.ty.is_reference
                    || slot.ty.is_rvalue_reference
                {
                    return None;
                }
                Some((*name, Vec::new(), slot.ty.clone()))
            }

            ExprKind::MemberAccess {
                object,
                member,
                is_arrow: false,
            } => {
                let (base, mut steps, spec) = self.plan_walk(*object)?;
                if spec.pointer_depth > 0 || spec.array_size.is_some() {
                    return None;
                }
                let idx = match spec.kind {
                    TypeSpecKind::Indexed(idx) => self.sess.types.resolve_alias(idx),
                    _ => return None,
                };
                let m = self.sess.types.struct_info(idx)?.member(*member)?.clone();
                steps.push(AddrStep::Member { offset: m.offset });
                let mut member_spec = match m.ty {
                    cinder_ast::ValueType::Struct => TypeSpec::indexed(m.type_index),
                    other => TypeSpec::builtin(other),
                };
                member_spec.pointer_depth = m.pointer_depth;
                member_spec.array_size = m.array_count;
                Some((base, steps, member_spec))
            }

            ExprKind::ArraySubscript { array, index } => {
                let (base, mut steps, spec) = self.plan_walk(*array)?;
                // Only direct arrays flatten; a pointer base needs a load
                // first, which the one-instruction form cannot express.
                spec.array_size?;
                let element_bits = self.element_size_bits(&spec);
                let mut element = spec;
                element.array_size = None;
                steps.push(AddrStep::Index {
                    index: *index,
                    element_bits,
                });
                Some((base, steps, element))
            }

            _ => None,
        }
    }

    /// Evaluate the planned indices in source order and emit the single
    /// `ComputeAddress`.
    pub(crate) fn emit_compute_address(
        &mut self,
        plan: AddressPlan,
        token: cinder_common::Token,
    ) -> LowerResult<LoweredValue> {
        let mut member_offset = 0u32;
        let mut array_indices = Vec::new();
        for step in &plan.steps {
            match step {
                AddrStep::Member { offset } => member_offset += offset,
                AddrStep::Index {
                    index,
                    element_bits,
                } => {
                    let value = self.visit_expression(*index, LowerContext::Load)?;
                    array_indices.push(ArrayIndex {
                        index: value.typed,
                        element_size_bits: *element_bits,
                    });
                }
            }
        }

        let result = self.vars.next();
        self.emit(
            IrOpcode::ComputeAddress,
            IrPayload::ComputeAddress(ComputeAddressOp {
                base: Operand::Var(plan.base),
                array_indices,
                member_offset,
                result,
            }),
            token,
        );

        let mut spec = plan.result_spec.clone();
        spec.array_size = None;
        spec.pointer_depth += 1;
        let (_, idx) = self.spec_category(&plan.result_spec);
        let mut lv = LoweredValue::prvalue(TypedValue::pointer(
            Operand::Temp(result),
            spec.pointer_depth,
        ))
        .with_type_index(idx);
        lv.spec = spec;
        Ok(lv)
    }
}
