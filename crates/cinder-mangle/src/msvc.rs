//! MSVC mangling (`?name@…@@` forms) for the subset the front end emits.
//!
//! Identifier back-references compress repeated names the way the Microsoft
//! scheme does: the first ten source names get slots 0-9 and later mentions
//! emit the digit.

use crate::{FunctionSignature, VariableSignature};
use cinder_ast::{TypeKind, TypeRegistry, TypeSpec, TypeSpecKind, ValueType};
use cinder_common::SymbolInterner;

struct Mangler<'a> {
    types: &'a TypeRegistry,
    interner: &'a SymbolInterner,
    names: Vec<String>,
}

impl<'a> Mangler<'a> {
    fn new(types: &'a TypeRegistry, interner: &'a SymbolInterner) -> Self {
        Self {
            types,
            interner,
            names: Vec::new(),
        }
    }

    /// `name@`, or the back-reference digit when already seen.
    fn emit_name(&mut self, name: &str) -> String {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            if i < 10 {
                return i.to_string();
            }
        }
        if self.names.len() < 10 {
            self.names.push(name.to_string());
        }
        format!("{name}@")
    }

    fn encode_type(&mut self, spec: &TypeSpec) -> String {
        let mut out = String::new();
        let depth = spec.pointer_depth + u32::from(spec.array_size.is_some());
        if spec.is_reference || spec.is_rvalue_reference {
            out.push_str(if spec.is_const { "AEB" } else { "AEA" });
        }
        for _ in 0..depth {
            out.push_str(if spec.is_const { "PEB" } else { "PEA" });
        }
        out.push_str(&self.base_code(spec));
        out
    }

    fn base_code(&mut self, spec: &TypeSpec) -> String {
        match &spec.kind {
            TypeSpecKind::Builtin(vt) => builtin_code(*vt).to_string(),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.types.resolve_alias(*idx);
                let name = self.interner.view(self.types.get(idx).name).to_string();
                match self.types.get(idx).kind {
                    TypeKind::Builtin(vt) => builtin_code(vt).to_string(),
                    TypeKind::Enum => format!("W4{}@", self.emit_name(&name)),
                    _ => format!("U{}@", self.emit_name(&name)),
                }
            }
            TypeSpecKind::TemplateParam(name)
            | TypeSpecKind::Pack(name)
            | TypeSpecKind::Dependent(name) => {
                let text = self.interner.view(*name).to_string();
                format!("U{}@", self.emit_name(&text))
            }
            TypeSpecKind::TemplateId { template, .. } => {
                let text = self.interner.view(*template).to_string();
                format!("U{}@", self.emit_name(&text))
            }
        }
    }
}

fn builtin_code(vt: ValueType) -> &'static str {
    match vt {
        ValueType::Void => "X",
        ValueType::Bool => "_N",
        ValueType::Char => "D",
        ValueType::UnsignedChar => "E",
        ValueType::Short => "F",
        ValueType::UnsignedShort => "G",
        ValueType::Int => "H",
        ValueType::UnsignedInt => "I",
        ValueType::Long => "J",
        ValueType::UnsignedLong => "K",
        ValueType::LongLong => "_J",
        ValueType::UnsignedLongLong => "_K",
        ValueType::Float => "M",
        ValueType::Double => "N",
        ValueType::Pointer | ValueType::Struct | ValueType::Enum | ValueType::Function => "X",
    }
}

fn operator_code(symbol: &str) -> Option<&'static str> {
    Some(match symbol {
        "=" => "?4",
        ">>" => "?5",
        "<<" => "?6",
        "!" => "?7",
        "==" => "?8",
        "!=" => "?9",
        "[]" => "?A",
        "->" => "?C",
        "*" => "?D",
        "++" => "?E",
        "--" => "?F",
        "-" => "?G",
        "+" => "?H",
        "&" => "?I",
        "->*" => "?J",
        "/" => "?K",
        "%" => "?L",
        "<" => "?M",
        "<=" => "?N",
        ">" => "?O",
        ">=" => "?P",
        "," => "?Q",
        "()" => "?R",
        "~" => "?S",
        "^" => "?T",
        "|" => "?U",
        "&&" => "?V",
        "||" => "?W",
        "*=" => "?X",
        "+=" => "?Y",
        "-=" => "?Z",
        "/=" => "?_0",
        "%=" => "?_1",
        ">>=" => "?_2",
        "<<=" => "?_3",
        "&=" => "?_4",
        "|=" => "?_5",
        "^=" => "?_6",
        "<=>" => "?__M",
        "new" => "?2",
        "delete" => "?3",
        _ => return None,
    })
}

pub(crate) fn mangle_function(
    sig: &FunctionSignature<'_>,
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    let mut m = Mangler::new(types, interner);
    let mut out = String::from("?");

    match sig.operator_symbol.and_then(operator_code) {
        Some(code) => out.push_str(code),
        None => out.push_str(&m.emit_name(sig.name)),
    }

    // Qualifiers, innermost first.
    if let Some(class) = sig.class_name {
        out.push_str(&m.emit_name(class));
    }
    for ns in sig.namespace.iter().rev() {
        out.push_str(&m.emit_name(ns));
    }
    out.push('@');

    if sig.class_name.is_some() {
        if sig.is_static_member {
            out.push_str("SA");
        } else if sig.is_const_member {
            out.push_str("QEBA");
        } else {
            out.push_str("QEAA");
        }
    } else {
        out.push_str("YA");
    }

    out.push_str(&m.encode_type(sig.return_type));

    if sig.params.is_empty() {
        out.push_str("XZ");
    } else {
        for param in sig.params {
            out.push_str(&m.encode_type(param));
        }
        out.push_str(if sig.is_variadic { "ZZ" } else { "@Z" });
    }
    out
}

pub(crate) fn mangle_variable(
    sig: &VariableSignature<'_>,
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    let mut m = Mangler::new(types, interner);
    let ty = m.encode_type(sig.ty);
    if let Some(func) = sig.enclosing_function {
        return format!("?{}@?1??{}@@9@4{}A", sig.name, func, ty);
    }
    let mut out = String::from("?");
    out.push_str(&m.emit_name(sig.name));
    if let Some(class) = sig.class_name {
        out.push_str(&m.emit_name(class));
        out.push_str("@2");
    } else {
        for ns in sig.namespace.iter().rev() {
            out.push_str(&m.emit_name(ns));
        }
        out.push_str("@3");
    }
    out.push_str(&ty);
    out.push('A');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_ast::DataModel;

    fn fixture() -> (SymbolInterner, TypeRegistry) {
        let mut interner = SymbolInterner::new();
        let types = TypeRegistry::new(interner.intern("void"), DataModel::Lp64);
        (interner, types)
    }

    #[test]
    fn free_function_two_ints() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let params = [int.clone(), int.clone()];
        let sig = FunctionSignature::free("add", &params, &int);
        assert_eq!(mangle_function(&sig, &types, &interner), "?add@@YAHHH@Z");
    }

    #[test]
    fn zero_params_use_void_list() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let sig = FunctionSignature::free("answer", &[], &int);
        assert_eq!(mangle_function(&sig, &types, &interner), "?answer@@YAHXZ");
    }

    #[test]
    fn const_member_operator_eq() {
        // struct P { bool operator==(const P&) const; };
        let (mut interner, mut types) = fixture();
        let p = types.get_or_create(interner.intern("P"), cinder_ast::TypeKind::Struct);
        let p_ref = TypeSpec::indexed(p).with_reference().with_const();
        let params = [p_ref];
        let ret = TypeSpec::builtin(ValueType::Bool);
        let mut sig = FunctionSignature::free("operator==", &params, &ret);
        sig.class_name = Some("P");
        sig.is_const_member = true;
        sig.operator_symbol = Some("==");
        // `P` is source-name slot 0, so the parameter back-references it.
        assert_eq!(
            mangle_function(&sig, &types, &interner),
            "??8P@@QEBA_NAEBU0@@Z"
        );
    }

    #[test]
    fn global_variable() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let sig = VariableSignature {
            name: "counter",
            namespace: &[],
            class_name: None,
            enclosing_function: None,
            ty: &int,
        };
        assert_eq!(mangle_variable(&sig, &types, &interner), "?counter@@3HA");
    }

    #[test]
    fn static_member_variable() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let sig = VariableSignature {
            name: "instances",
            namespace: &[],
            class_name: Some("Widget"),
            enclosing_function: None,
            ty: &int,
        };
        assert_eq!(
            mangle_variable(&sig, &types, &interner),
            "?instances@Widget@@2HA"
        );
    }
}
