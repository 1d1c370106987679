use crate::arena::{DeclId, ExprId};
use crate::decl::AccessSpecifier;
use cinder_common::Symbol;
use rustc_hash::FxHashMap;

/// Handle into the namespace registry (the registry itself lives in the
/// semantic-analysis crate). Handle 0 is the global namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceHandle(pub u32);

impl NamespaceHandle {
    pub const GLOBAL: NamespaceHandle = NamespaceHandle(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pointer-size data model of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataModel {
    /// Linux/macOS: `long` is 64-bit.
    #[default]
    Lp64,
    /// Windows: `long` is 32-bit.
    Llp64,
}

/// The scalar category of a value as the IR sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    Bool,
    Char,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    Pointer,
    Struct,
    Enum,
    Function,
}

impl ValueType {
    pub fn size_bits(self, model: DataModel) -> u32 {
        match self {
            ValueType::Void => 0,
            ValueType::Bool | ValueType::Char | ValueType::UnsignedChar => 8,
            ValueType::Short | ValueType::UnsignedShort => 16,
            ValueType::Int | ValueType::UnsignedInt | ValueType::Float => 32,
            ValueType::Long | ValueType::UnsignedLong => match model {
                DataModel::Lp64 => 64,
                DataModel::Llp64 => 32,
            },
            ValueType::LongLong | ValueType::UnsignedLongLong | ValueType::Double => 64,
            ValueType::Pointer | ValueType::Function => 64,
            // Struct/enum sizes come from the registry, not the scalar kind.
            ValueType::Struct => 0,
            ValueType::Enum => 32,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            ValueType::Bool
                | ValueType::Char
                | ValueType::UnsignedChar
                | ValueType::Short
                | ValueType::UnsignedShort
                | ValueType::Int
                | ValueType::UnsignedInt
                | ValueType::Long
                | ValueType::UnsignedLong
                | ValueType::LongLong
                | ValueType::UnsignedLongLong
                | ValueType::Enum
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ValueType::Char
                | ValueType::Short
                | ValueType::Int
                | ValueType::Long
                | ValueType::LongLong
                | ValueType::Enum
                | ValueType::Float
                | ValueType::Double
        )
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, ValueType::Float | ValueType::Double)
    }

    pub fn is_arithmetic(self) -> bool {
        self.is_integral() || self.is_floating_point()
    }

    /// Canonical spelling-synonym folding: `signed int` and `int` are the
    /// same `ValueType`, so canonicalization is identity here; the parser
    /// performs the folding when it maps spellings to `ValueType`.
    pub fn unsigned_counterpart(self) -> ValueType {
        match self {
            ValueType::Char => ValueType::UnsignedChar,
            ValueType::Short => ValueType::UnsignedShort,
            ValueType::Int => ValueType::UnsignedInt,
            ValueType::Long => ValueType::UnsignedLong,
            ValueType::LongLong => ValueType::UnsignedLongLong,
            other => other,
        }
    }
}

/// Index into the session's type table. Index 0 is the void/placeholder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(pub u32);

impl TypeIndex {
    pub const VOID: TypeIndex = TypeIndex(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A parsed type as written in source: base kind plus declarator wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSpec {
    pub kind: TypeSpecKind,
    pub pointer_depth: u32,
    pub is_reference: bool,
    pub is_rvalue_reference: bool,
    pub is_const: bool,
    /// `Some(n)` for `T[n]`; `Some(0)` for an unsized `T[]`.
    pub array_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSpecKind {
    Builtin(ValueType),
    /// A struct/enum/alias resolved to a registry slot.
    Indexed(TypeIndex),
    /// Reference to an in-scope template parameter, resolved at instantiation.
    TemplateParam(Symbol),
    /// A parameter pack (`Args...`), expanded at instantiation.
    Pack(Symbol),
    /// `typename T::name` and friends: unresolved until instantiation.
    Dependent(Symbol),
    /// A template-id whose arguments still mention template parameters
    /// (`Container<T>`); the instantiation engine resolves it to `Indexed`.
    TemplateId {
        template: Symbol,
        args: Vec<crate::expr::TemplateArg>,
    },
}

impl TypeSpec {
    pub fn builtin(vt: ValueType) -> Self {
        Self {
            kind: TypeSpecKind::Builtin(vt),
            pointer_depth: 0,
            is_reference: false,
            is_rvalue_reference: false,
            is_const: false,
            array_size: None,
        }
    }

    pub fn indexed(idx: TypeIndex) -> Self {
        Self {
            kind: TypeSpecKind::Indexed(idx),
            pointer_depth: 0,
            is_reference: false,
            is_rvalue_reference: false,
            is_const: false,
            array_size: None,
        }
    }

    pub fn template_param(name: Symbol) -> Self {
        Self {
            kind: TypeSpecKind::TemplateParam(name),
            pointer_depth: 0,
            is_reference: false,
            is_rvalue_reference: false,
            is_const: false,
            array_size: None,
        }
    }

    pub fn with_pointer(mut self, depth: u32) -> Self {
        self.pointer_depth = depth;
        self
    }

    pub fn with_reference(mut self) -> Self {
        self.is_reference = true;
        self
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn is_dependent(&self) -> bool {
        matches!(
            self.kind,
            TypeSpecKind::TemplateParam(_)
                | TypeSpecKind::Pack(_)
                | TypeSpecKind::Dependent(_)
                | TypeSpecKind::TemplateId { .. }
        )
    }

    /// The scalar category this spec lowers to.
    pub fn value_type(&self) -> ValueType {
        if self.pointer_depth > 0 || self.array_size.is_some() {
            return ValueType::Pointer;
        }
        match self.kind {
            TypeSpecKind::Builtin(vt) => vt,
            TypeSpecKind::Indexed(_) => ValueType::Struct,
            // Dependent specs have no category until substitution.
            _ => ValueType::Void,
        }
    }
}

/// What a registry entry describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Builtin(ValueType),
    Struct,
    Enum,
    /// A function signature registered for function-pointer typing.
    Function {
        return_type: TypeSpec,
        params: Vec<TypeSpec>,
        is_variadic: bool,
    },
    /// An alias produced by `using`/`typedef`; resolves to `target`.
    Alias { target: TypeSpec },
}

/// One entry in the type table.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: Symbol,
    pub kind: TypeKind,
    pub struct_info: Option<StructTypeInfo>,
    pub enum_info: Option<EnumTypeInfo>,
}

/// A non-static data member with its computed layout.
#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: Symbol,
    pub ty: ValueType,
    pub type_index: TypeIndex,
    /// Byte offset inside the most-derived object.
    pub offset: u32,
    pub size_bits: u32,
    pub pointer_depth: u32,
    pub is_reference: bool,
    pub access: AccessSpecifier,
    /// `Some(n)` when the member is an array `T[n]`.
    pub array_count: Option<u32>,
}

/// A member function entry. The declaration node carries the signature and
/// body; the registry entry carries what lookup and overload selection need.
#[derive(Debug, Clone)]
pub struct MemberFunction {
    pub name: Symbol,
    pub decl: DeclId,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_const: bool,
    pub is_operator_overload: bool,
    pub operator_symbol: Option<Symbol>,
    pub mangled_name: Option<Symbol>,
}

/// A static data member; storage is a mangled global.
#[derive(Debug, Clone)]
pub struct StaticMember {
    pub name: Symbol,
    pub ty: ValueType,
    pub type_index: TypeIndex,
    pub pointer_depth: u32,
    pub mangled_name: Symbol,
    pub initializer: Option<ExprId>,
}

/// A direct base class subobject.
#[derive(Debug, Clone)]
pub struct BaseClass {
    pub type_index: TypeIndex,
    /// Byte offset of the base subobject.
    pub offset: u32,
    pub access: AccessSpecifier,
}

/// Everything the registry knows about a struct/class.
#[derive(Debug, Clone, Default)]
pub struct StructTypeInfo {
    pub members: Vec<StructMember>,
    pub bases: Vec<BaseClass>,
    pub member_functions: Vec<MemberFunction>,
    pub static_members: Vec<StaticMember>,
    pub nested_enums: Vec<TypeIndex>,
    pub total_size: u32,
    pub alignment: u32,
    pub has_vtable: bool,
    pub is_template_instantiation: bool,
    pub base_template_name: Option<Symbol>,
    /// Declaration-phase instantiation: size queries and static-member access
    /// are invalid until layout runs.
    pub is_incomplete_instantiation: bool,
}

impl StructTypeInfo {
    pub fn member(&self, name: Symbol) -> Option<&StructMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn static_member(&self, name: Symbol) -> Option<&StaticMember> {
        self.static_members.iter().find(|m| m.name == name)
    }

    pub fn member_function(&self, name: Symbol) -> Option<&MemberFunction> {
        self.member_functions.iter().find(|f| f.name == name)
    }

    pub fn operator_overload(&self, symbol: Symbol) -> Option<&MemberFunction> {
        self.member_functions
            .iter()
            .find(|f| f.is_operator_overload && f.operator_symbol == Some(symbol))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enumerator {
    pub name: Symbol,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct EnumTypeInfo {
    pub enumerators: Vec<Enumerator>,
    pub underlying: ValueType,
    pub is_scoped: bool,
}

impl EnumTypeInfo {
    pub fn enumerator(&self, name: Symbol) -> Option<i64> {
        self.enumerators
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value)
    }
}

/// Answers for the `__is_*` type-trait intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeProperties {
    pub is_integral: bool,
    pub is_signed: bool,
    pub is_floating_point: bool,
    pub is_scalar: bool,
    pub is_pointer: bool,
    pub is_reference: bool,
    pub is_enum: bool,
    pub is_class: bool,
    pub is_trivially_copyable: bool,
    pub is_trivially_destructible: bool,
    pub is_empty: bool,
    pub is_polymorphic: bool,
}

/// Central indexed store of every type in a session.
///
/// Append-only: entries are never removed, so a `TypeIndex` handed out stays
/// valid for the whole compilation. Creation is idempotent keyed by name.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    by_name: FxHashMap<Symbol, TypeIndex>,
    model: DataModel,
}

impl TypeRegistry {
    pub fn new(void_name: Symbol, model: DataModel) -> Self {
        let placeholder = TypeInfo {
            name: void_name,
            kind: TypeKind::Builtin(ValueType::Void),
            struct_info: None,
            enum_info: None,
        };
        let mut by_name = FxHashMap::default();
        by_name.insert(void_name, TypeIndex::VOID);
        Self {
            types: vec![placeholder],
            by_name,
            model,
        }
    }

    pub fn data_model(&self) -> DataModel {
        self.model
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, idx: TypeIndex) -> &TypeInfo {
        &self.types[idx.index()]
    }

    pub fn get_mut(&mut self, idx: TypeIndex) -> &mut TypeInfo {
        &mut self.types[idx.index()]
    }

    pub fn lookup(&self, name: Symbol) -> Option<TypeIndex> {
        self.by_name.get(&name).copied()
    }

    /// Register a new type, or return the existing slot for `name`.
    pub fn get_or_create(&mut self, name: Symbol, kind: TypeKind) -> TypeIndex {
        if let Some(&idx) = self.by_name.get(&name) {
            return idx;
        }
        let idx = TypeIndex(self.types.len() as u32);
        self.types.push(TypeInfo {
            name,
            kind,
            struct_info: None,
            enum_info: None,
        });
        self.by_name.insert(name, idx);
        idx
    }

    /// Resolve an alias chain to its ultimate target spec.
    pub fn resolve_alias(&self, idx: TypeIndex) -> TypeIndex {
        let mut current = idx;
        // Alias chains are short; a cycle would be a registration bug.
        for _ in 0..self.types.len() {
            match &self.get(current).kind {
                TypeKind::Alias { target } => match target.kind {
                    TypeSpecKind::Indexed(next) if next != current => current = next,
                    _ => return current,
                },
                _ => return current,
            }
        }
        current
    }

    pub fn struct_info(&self, idx: TypeIndex) -> Option<&StructTypeInfo> {
        self.types[idx.index()].struct_info.as_ref()
    }

    pub fn enum_info(&self, idx: TypeIndex) -> Option<&EnumTypeInfo> {
        self.types[idx.index()].enum_info.as_ref()
    }

    /// Size of a type in bits. Struct sizes require a completed layout.
    pub fn size_bits(&self, ty: ValueType, idx: TypeIndex) -> u32 {
        match ty {
            ValueType::Struct => self
                .struct_info(idx)
                .map(|s| s.total_size * 8)
                .unwrap_or(0),
            ValueType::Enum => self
                .enum_info(idx)
                .map(|e| e.underlying.size_bits(self.model))
                .unwrap_or(32),
            other => other.size_bits(self.model),
        }
    }

    /// Alignment of a type in bytes.
    pub fn align_bytes(&self, ty: ValueType, idx: TypeIndex) -> u32 {
        match ty {
            ValueType::Struct => self.struct_info(idx).map(|s| s.alignment).unwrap_or(1),
            ValueType::Enum => self
                .enum_info(idx)
                .map(|e| e.underlying.size_bits(self.model) / 8)
                .unwrap_or(4),
            ValueType::Void => 1,
            other => other.size_bits(self.model).max(8) / 8,
        }
    }

    /// Size in bits of a full type spec (pointers and references are 64-bit
    /// slots; arrays report the element count times element size).
    pub fn spec_size_bits(&self, spec: &TypeSpec) -> u32 {
        if spec.is_reference || spec.is_rvalue_reference || spec.pointer_depth > 0 {
            return 64;
        }
        let base = match spec.kind {
            TypeSpecKind::Builtin(vt) => vt.size_bits(self.model),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.resolve_alias(idx);
                match self.get(idx).kind {
                    TypeKind::Builtin(vt) => vt.size_bits(self.model),
                    TypeKind::Enum => self.size_bits(ValueType::Enum, idx),
                    _ => self.size_bits(ValueType::Struct, idx),
                }
            }
            _ => 0,
        };
        match spec.array_size {
            Some(n) => base * n,
            None => base,
        }
    }

    /// Trait answers for a concrete type. Dependent specs have no answer.
    pub fn properties(&self, spec: &TypeSpec) -> Option<TypeProperties> {
        if spec.is_dependent() {
            return None;
        }
        if spec.is_reference || spec.is_rvalue_reference {
            return Some(TypeProperties {
                is_reference: true,
                is_trivially_destructible: true,
                ..EMPTY_PROPERTIES
            });
        }
        if spec.pointer_depth > 0 {
            return Some(TypeProperties {
                is_scalar: true,
                is_pointer: true,
                is_trivially_copyable: true,
                is_trivially_destructible: true,
                ..EMPTY_PROPERTIES
            });
        }
        let (kind, idx) = match spec.kind {
            TypeSpecKind::Builtin(vt) => (TypeKind::Builtin(vt), TypeIndex::VOID),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.resolve_alias(idx);
                (self.get(idx).kind.clone(), idx)
            }
            _ => return None,
        };
        Some(match kind {
            TypeKind::Builtin(vt) => TypeProperties {
                is_integral: vt.is_integral(),
                is_signed: vt.is_signed(),
                is_floating_point: vt.is_floating_point(),
                is_scalar: vt.is_arithmetic(),
                is_trivially_copyable: true,
                is_trivially_destructible: true,
                ..EMPTY_PROPERTIES
            },
            TypeKind::Enum => TypeProperties {
                is_integral: false,
                is_scalar: true,
                is_enum: true,
                is_trivially_copyable: true,
                is_trivially_destructible: true,
                ..EMPTY_PROPERTIES
            },
            TypeKind::Struct => {
                let info = self.struct_info(idx);
                TypeProperties {
                    is_class: true,
                    is_empty: info.map(|s| s.members.is_empty() && s.bases.is_empty())
                        .unwrap_or(false),
                    is_polymorphic: info.map(|s| s.has_vtable).unwrap_or(false),
                    is_trivially_copyable: info
                        .map(|s| !s.has_vtable)
                        .unwrap_or(false),
                    is_trivially_destructible: true,
                    ..EMPTY_PROPERTIES
                }
            }
            TypeKind::Function { .. } => EMPTY_PROPERTIES,
            TypeKind::Alias { .. } => return None,
        })
    }
}

const EMPTY_PROPERTIES: TypeProperties = TypeProperties {
    is_integral: false,
    is_signed: false,
    is_floating_point: false,
    is_scalar: false,
    is_pointer: false,
    is_reference: false,
    is_enum: false,
    is_class: false,
    is_trivially_copyable: false,
    is_trivially_destructible: false,
    is_empty: false,
    is_polymorphic: false,
};

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::SymbolInterner;

    fn registry(interner: &mut SymbolInterner) -> TypeRegistry {
        TypeRegistry::new(interner.intern("void"), DataModel::Lp64)
    }

    #[test]
    fn index_zero_is_void_placeholder() {
        let mut interner = SymbolInterner::new();
        let reg = registry(&mut interner);
        assert_eq!(reg.get(TypeIndex::VOID).kind, TypeKind::Builtin(ValueType::Void));
    }

    #[test]
    fn creation_is_idempotent_by_name() {
        let mut interner = SymbolInterner::new();
        let mut reg = registry(&mut interner);
        let name = interner.intern("Widget");
        let a = reg.get_or_create(name, TypeKind::Struct);
        let b = reg.get_or_create(name, TypeKind::Struct);
        assert_eq!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn long_size_follows_data_model() {
        assert_eq!(ValueType::Long.size_bits(DataModel::Lp64), 64);
        assert_eq!(ValueType::Long.size_bits(DataModel::Llp64), 32);
        assert_eq!(ValueType::LongLong.size_bits(DataModel::Llp64), 64);
    }

    #[test]
    fn alias_chain_resolves_to_target() {
        let mut interner = SymbolInterner::new();
        let mut reg = registry(&mut interner);
        let widget = reg.get_or_create(interner.intern("Widget"), TypeKind::Struct);
        let alias = reg.get_or_create(
            interner.intern("WidgetAlias"),
            TypeKind::Alias {
                target: TypeSpec::indexed(widget),
            },
        );
        assert_eq!(reg.resolve_alias(alias), widget);
    }

    #[test]
    fn pointer_spec_properties() {
        let mut interner = SymbolInterner::new();
        let reg = registry(&mut interner);
        let spec = TypeSpec::builtin(ValueType::Int).with_pointer(1);
        let props = reg.properties(&spec).unwrap();
        assert!(props.is_pointer);
        assert!(props.is_scalar);
        assert!(!props.is_integral);
    }

    #[test]
    fn dependent_spec_has_no_properties() {
        let mut interner = SymbolInterner::new();
        let reg = registry(&mut interner);
        let t = interner.intern("T");
        assert!(reg.properties(&TypeSpec::template_param(t)).is_none());
    }
}
