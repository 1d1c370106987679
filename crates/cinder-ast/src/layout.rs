use crate::types::{TypeIndex, TypeRegistry, ValueType};
use cinder_common::Symbol;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout of incomplete type")]
    IncompleteType { name: Symbol },
    #[error("type has no struct info")]
    NotAStruct { name: Symbol },
}

pub fn align_to(offset: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

impl TypeRegistry {
    /// Compute byte offsets, total size, and alignment for a struct whose
    /// members and bases have been registered. Base subobjects come first in
    /// declaration order; a vtable pointer, when present, occupies offset 0.
    ///
    /// Members of an instantiation still marked incomplete are an error.
    pub fn finish_layout(&mut self, idx: TypeIndex) -> Result<(), LayoutError> {
        let name = self.get(idx).name;
        let mut info = self
            .get_mut(idx)
            .struct_info
            .take()
            .ok_or(LayoutError::NotAStruct { name })?;

        let mut offset: u32 = 0;
        let mut align: u32 = 1;

        if info.has_vtable {
            offset = 8;
            align = 8;
        }

        for base in &mut info.bases {
            let base_info = self
                .struct_info(base.type_index)
                .ok_or(LayoutError::IncompleteType { name })?;
            if base_info.is_incomplete_instantiation {
                return Err(LayoutError::IncompleteType {
                    name: self.get(base.type_index).name,
                });
            }
            let base_align = base_info.alignment.max(1);
            let base_size = base_info.total_size;
            offset = align_to(offset, base_align);
            base.offset = offset;
            offset += base_size;
            align = align.max(base_align);
        }

        for member in &mut info.members {
            let member_align = if member.is_reference || member.pointer_depth > 0 {
                8
            } else {
                self.align_bytes(member.ty, member.type_index).max(1)
            };
            // size_bits of an array member is the element size; expand here.
            let member_size = match member.array_count {
                Some(n) => (member.size_bits / 8) * n,
                None => member.size_bits / 8,
            };
            offset = align_to(offset, member_align);
            member.offset = offset;
            offset += member_size.max(1);
            align = align.max(member_align);
        }

        info.alignment = align;
        info.total_size = align_to(offset.max(1), align);
        info.is_incomplete_instantiation = false;
        self.get_mut(idx).struct_info = Some(info);
        Ok(())
    }

    /// Byte offset of a member reached through a dotted path, for
    /// `offsetof(S, a.b)`. Walks nested struct members.
    pub fn offset_of_path(&self, idx: TypeIndex, path: &[Symbol]) -> Option<u32> {
        let mut current = self.resolve_alias(idx);
        let mut total = 0u32;
        for (i, name) in path.iter().enumerate() {
            let info = self.struct_info(current)?;
            let member = info.member(*name)?;
            total += member.offset;
            if i + 1 < path.len() {
                if member.ty != ValueType::Struct || member.pointer_depth > 0 {
                    return None;
                }
                current = self.resolve_alias(member.type_index);
            }
        }
        Some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::AccessSpecifier;
    use crate::types::{
        BaseClass, DataModel, StructMember, StructTypeInfo, TypeKind,
    };
    use cinder_common::SymbolInterner;

    fn member(
        interner: &mut SymbolInterner,
        name: &str,
        ty: ValueType,
        size_bits: u32,
    ) -> StructMember {
        StructMember {
            name: interner.intern(name),
            ty,
            type_index: TypeIndex::VOID,
            offset: 0,
            size_bits,
            pointer_depth: 0,
            is_reference: false,
            access: AccessSpecifier::Public,
            array_count: None,
        }
    }

    fn fresh() -> (SymbolInterner, TypeRegistry) {
        let mut interner = SymbolInterner::new();
        let reg = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
        (interner, reg)
    }

    #[test]
    fn char_then_int_pads_to_alignment() {
        // struct S { char c; int i; };  → c@0, i@4, size 8, align 4
        let (mut interner, mut reg) = fresh();
        let idx = reg.get_or_create(interner.intern("S"), TypeKind::Struct);
        let info = StructTypeInfo {
            members: vec![
                member(&mut interner, "c", ValueType::Char, 8),
                member(&mut interner, "i", ValueType::Int, 32),
            ],
            ..Default::default()
        };
        reg.get_mut(idx).struct_info = Some(info);
        reg.finish_layout(idx).unwrap();

        let info = reg.struct_info(idx).unwrap();
        assert_eq!(info.members[0].offset, 0);
        assert_eq!(info.members[1].offset, 4);
        assert_eq!(info.total_size, 8);
        assert_eq!(info.alignment, 4);
        assert_eq!(info.total_size % info.alignment, 0);
    }

    #[test]
    fn base_subobject_precedes_members() {
        // struct B { int x; }; struct D : B { int y; };  → y@4, size 8
        let (mut interner, mut reg) = fresh();
        let base = reg.get_or_create(interner.intern("B"), TypeKind::Struct);
        reg.get_mut(base).struct_info = Some(StructTypeInfo {
            members: vec![member(&mut interner, "x", ValueType::Int, 32)],
            ..Default::default()
        });
        reg.finish_layout(base).unwrap();

        let derived = reg.get_or_create(interner.intern("D"), TypeKind::Struct);
        reg.get_mut(derived).struct_info = Some(StructTypeInfo {
            members: vec![member(&mut interner, "y", ValueType::Int, 32)],
            bases: vec![BaseClass {
                type_index: base,
                offset: 0,
                access: AccessSpecifier::Public,
            }],
            ..Default::default()
        });
        reg.finish_layout(derived).unwrap();

        let info = reg.struct_info(derived).unwrap();
        assert_eq!(info.bases[0].offset, 0);
        assert_eq!(info.members[0].offset, 4);
        assert_eq!(info.total_size, 8);
    }

    #[test]
    fn vtable_pointer_claims_offset_zero() {
        let (mut interner, mut reg) = fresh();
        let idx = reg.get_or_create(interner.intern("V"), TypeKind::Struct);
        reg.get_mut(idx).struct_info = Some(StructTypeInfo {
            members: vec![member(&mut interner, "n", ValueType::Int, 32)],
            has_vtable: true,
            ..Default::default()
        });
        reg.finish_layout(idx).unwrap();

        let info = reg.struct_info(idx).unwrap();
        assert_eq!(info.members[0].offset, 8);
        assert_eq!(info.alignment, 8);
        assert_eq!(info.total_size, 16);
    }

    #[test]
    fn array_member_expands_by_count() {
        // struct A { int v[3]; char tail; };  → v@0 (12 bytes), tail@12, size 16
        let (mut interner, mut reg) = fresh();
        let idx = reg.get_or_create(interner.intern("A"), TypeKind::Struct);
        let mut arr = member(&mut interner, "v", ValueType::Int, 32);
        arr.array_count = Some(3);
        reg.get_mut(idx).struct_info = Some(StructTypeInfo {
            members: vec![arr, member(&mut interner, "tail", ValueType::Char, 8)],
            ..Default::default()
        });
        reg.finish_layout(idx).unwrap();

        let info = reg.struct_info(idx).unwrap();
        assert_eq!(info.members[0].offset, 0);
        assert_eq!(info.members[1].offset, 12);
        assert_eq!(info.total_size, 16);
    }

    #[test]
    fn offsetof_nested_path() {
        // struct In { char c; int i; }; struct Out { long pad; In inner; };
        let (mut interner, mut reg) = fresh();
        let inner = reg.get_or_create(interner.intern("In"), TypeKind::Struct);
        reg.get_mut(inner).struct_info = Some(StructTypeInfo {
            members: vec![
                member(&mut interner, "c", ValueType::Char, 8),
                member(&mut interner, "i", ValueType::Int, 32),
            ],
            ..Default::default()
        });
        reg.finish_layout(inner).unwrap();

        let outer = reg.get_or_create(interner.intern("Out"), TypeKind::Struct);
        let mut inner_member = member(&mut interner, "inner", ValueType::Struct, 64);
        inner_member.type_index = inner;
        reg.get_mut(outer).struct_info = Some(StructTypeInfo {
            members: vec![member(&mut interner, "pad", ValueType::Long, 64), inner_member],
            ..Default::default()
        });
        reg.finish_layout(outer).unwrap();

        let path = [interner.intern("inner"), interner.intern("i")];
        assert_eq!(reg.offset_of_path(outer, &path), Some(12));
    }
}
