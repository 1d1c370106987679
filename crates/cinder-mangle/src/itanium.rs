//! Itanium C++ ABI mangling (`_ZN…E` forms) for the subset the front end
//! emits: free and member functions, operators, function-template
//! instantiations, statics, and globals. Substitution compression follows
//! the ABI's component rules.

use crate::{FunctionSignature, VariableSignature};
use cinder_ast::{TemplateArg, TypeKind, TypeRegistry, TypeSpec, TypeSpecKind, ValueType};
use cinder_common::SymbolInterner;

struct Mangler<'a> {
    types: &'a TypeRegistry,
    interner: &'a SymbolInterner,
    template_params: &'a [&'a str],
    subs: Vec<String>,
}

impl<'a> Mangler<'a> {
    fn new(
        types: &'a TypeRegistry,
        interner: &'a SymbolInterner,
        template_params: &'a [&'a str],
    ) -> Self {
        Self {
            types,
            interner,
            template_params,
            subs: Vec::new(),
        }
    }

    /// Emit `key` or its substitution reference; registers on first sight.
    fn maybe_sub(&mut self, key: &str, emit: String) -> String {
        if let Some(i) = self.subs.iter().position(|s| s == key) {
            seq_id(i)
        } else {
            self.subs.push(key.to_string());
            emit
        }
    }

    fn register(&mut self, key: &str) {
        if !self.subs.iter().any(|s| s == key) {
            self.subs.push(key.to_string());
        }
    }

    fn source_name(&self, name: &str) -> String {
        format!("{}{}", name.len(), name)
    }

    /// (canonical key, substitutable) for the undecorated base type.
    fn base_encoding(&self, spec: &TypeSpec) -> (String, bool) {
        match &spec.kind {
            TypeSpecKind::Builtin(vt) => (builtin_code(*vt).to_string(), false),
            TypeSpecKind::Indexed(idx) => {
                let idx = self.types.resolve_alias(*idx);
                match self.types.get(idx).kind {
                    TypeKind::Builtin(vt) => (builtin_code(vt).to_string(), false),
                    _ => {
                        let name = self.interner.view(self.types.get(idx).name);
                        (self.source_name(name), true)
                    }
                }
            }
            TypeSpecKind::TemplateParam(name) => {
                let text = self.interner.view(*name);
                let pos = self
                    .template_params
                    .iter()
                    .position(|p| *p == text)
                    .unwrap_or(0);
                let enc = if pos == 0 {
                    "T_".to_string()
                } else {
                    format!("T{}_", pos - 1)
                };
                (enc, true)
            }
            TypeSpecKind::Pack(name) | TypeSpecKind::Dependent(name) => {
                let text = self.interner.view(*name);
                (self.source_name(text), true)
            }
            TypeSpecKind::TemplateId { template, .. } => {
                let text = self.interner.view(*template);
                (self.source_name(text), true)
            }
        }
    }

    fn encode_type(&mut self, spec: &TypeSpec) -> String {
        let (mut canonical, substitutable) = self.base_encoding(spec);
        let mut emitted = if substitutable {
            self.maybe_sub(&canonical.clone(), canonical.clone())
        } else {
            canonical.clone()
        };
        // Array parameters decay to pointers.
        let depth = spec.pointer_depth + u32::from(spec.array_size.is_some());
        if spec.is_const && (depth > 0 || spec.is_reference || spec.is_rvalue_reference) {
            canonical = format!("K{canonical}");
            let emit = format!("K{emitted}");
            emitted = self.maybe_sub(&canonical.clone(), emit);
        }
        for _ in 0..depth {
            canonical = format!("P{canonical}");
            let emit = format!("P{emitted}");
            emitted = self.maybe_sub(&canonical.clone(), emit);
        }
        if spec.is_rvalue_reference {
            canonical = format!("O{canonical}");
            let emit = format!("O{emitted}");
            emitted = self.maybe_sub(&canonical.clone(), emit);
        } else if spec.is_reference {
            canonical = format!("R{canonical}");
            let emit = format!("R{emitted}");
            emitted = self.maybe_sub(&canonical.clone(), emit);
        }
        emitted
    }

    fn encode_template_args(&mut self, args: &[TemplateArg]) -> String {
        let mut out = String::from("I");
        for arg in args {
            match arg {
                TemplateArg::Type(spec) => out.push_str(&self.encode_type(spec)),
                TemplateArg::Value { value, ty } => {
                    out.push('L');
                    out.push_str(builtin_code(*ty));
                    if *value < 0 {
                        out.push('n');
                        out.push_str(&value.unsigned_abs().to_string());
                    } else {
                        out.push_str(&value.to_string());
                    }
                    out.push('E');
                }
            }
        }
        out.push('E');
        out
    }
}

fn seq_id(i: usize) -> String {
    if i == 0 {
        return "S_".to_string();
    }
    // S0_, S1_, … S9_, SA_, …; base 36 on the remaining index.
    let mut n = i - 1;
    let mut digits = Vec::new();
    loop {
        let d = (n % 36) as u32;
        let c = char::from_digit(d, 36).unwrap_or('0').to_ascii_uppercase();
        digits.push(c);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.reverse();
    let body: String = digits.into_iter().collect();
    format!("S{body}_")
}

fn builtin_code(vt: ValueType) -> &'static str {
    match vt {
        ValueType::Void => "v",
        ValueType::Bool => "b",
        ValueType::Char => "c",
        ValueType::UnsignedChar => "h",
        ValueType::Short => "s",
        ValueType::UnsignedShort => "t",
        ValueType::Int => "i",
        ValueType::UnsignedInt => "j",
        ValueType::Long => "l",
        ValueType::UnsignedLong => "m",
        ValueType::LongLong => "x",
        ValueType::UnsignedLongLong => "y",
        ValueType::Float => "f",
        ValueType::Double => "d",
        // Pointer/struct/enum go through the full encoder.
        ValueType::Pointer | ValueType::Struct | ValueType::Enum | ValueType::Function => "v",
    }
}

fn operator_code(symbol: &str) -> Option<&'static str> {
    Some(match symbol {
        "==" => "eq",
        "!=" => "ne",
        "<" => "lt",
        "<=" => "le",
        ">" => "gt",
        ">=" => "ge",
        "<=>" => "ss",
        "+" => "pl",
        "-" => "mi",
        "*" => "ml",
        "/" => "dv",
        "%" => "rm",
        "&" => "an",
        "|" => "or",
        "^" => "eo",
        "<<" => "ls",
        ">>" => "rs",
        "=" => "aS",
        "+=" => "pL",
        "-=" => "mI",
        "*=" => "mL",
        "/=" => "dV",
        "%=" => "rM",
        "&=" => "aN",
        "|=" => "oR",
        "^=" => "eO",
        "<<=" => "lS",
        ">>=" => "rS",
        "++" => "pp",
        "--" => "mm",
        "()" => "cl",
        "[]" => "ix",
        "->" => "pt",
        "->*" => "pm",
        "!" => "nt",
        "~" => "co",
        "&&" => "aa",
        "||" => "oo",
        "," => "cm",
        "new" => "nw",
        "new[]" => "na",
        "delete" => "dl",
        "delete[]" => "da",
        _ => return None,
    })
}

pub(crate) fn mangle_function(
    sig: &FunctionSignature<'_>,
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    let mut m = Mangler::new(types, interner, sig.template_params);
    let mut out = String::from("_Z");

    let name_part = match sig.operator_symbol.and_then(operator_code) {
        Some(code) => code.to_string(),
        None => m.source_name(sig.name),
    };

    let nested = sig.class_name.is_some() || !sig.namespace.is_empty();
    if nested {
        out.push('N');
        if sig.is_const_member && !sig.is_static_member {
            out.push('K');
        }
        let mut prefix_key = String::new();
        for ns in sig.namespace {
            let comp = m.source_name(ns);
            prefix_key.push_str(&comp);
            m.register(&prefix_key.clone());
            out.push_str(&comp);
        }
        if let Some(class) = sig.class_name {
            let comp = m.source_name(class);
            m.register(&comp);
            out.push_str(&comp);
        }
        out.push_str(&name_part);
        if let Some(args) = sig.template_args {
            m.register(&name_part);
            out.push_str(&m.encode_template_args(args));
        }
        out.push('E');
    } else {
        out.push_str(&name_part);
        if let Some(args) = sig.template_args {
            m.register(&name_part);
            out.push_str(&m.encode_template_args(args));
        }
    }

    // Template instantiations encode the return type before the parameters.
    if sig.template_args.is_some() {
        out.push_str(&m.encode_type(sig.return_type));
    }

    if sig.params.is_empty() {
        out.push('v');
    } else {
        for param in sig.params {
            out.push_str(&m.encode_type(param));
        }
    }
    if sig.is_variadic {
        out.push('z');
    }
    out
}

pub(crate) fn mangle_variable(
    sig: &VariableSignature<'_>,
    types: &TypeRegistry,
    interner: &SymbolInterner,
) -> String {
    let m = Mangler::new(types, interner, &[]);
    if let Some(func) = sig.enclosing_function {
        // Static local: scoped to its function.
        return format!("_ZZ{}vE{}", m.source_name(func), m.source_name(sig.name));
    }
    if sig.class_name.is_none() && sig.namespace.is_empty() {
        // Globals at the global namespace keep their plain name.
        return sig.name.to_string();
    }
    let mut out = String::from("_ZN");
    for ns in sig.namespace {
        out.push_str(&m.source_name(ns));
    }
    if let Some(class) = sig.class_name {
        out.push_str(&m.source_name(class));
    }
    out.push_str(&m.source_name(sig.name));
    out.push('E');
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
    fn free_function_with_params() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let params = [int.clone(), int.clone()];
        let sig = FunctionSignature::free("add", &params, &int);
        assert_eq!(mangle_function(&sig, &types, &interner), "_Z3addii");
    }

    #[test]
    fn no_parameters_encode_void() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let sig = FunctionSignature::free("answer", &[], &int);
        assert_eq!(mangle_function(&sig, &types, &interner), "_Z6answerv");
    }

    #[test]
    fn namespaced_function_is_nested() {
        let (interner, types) = fixture();
        let ns = ["util"];
        let int = TypeSpec::builtin(ValueType::Int);
        let params = [int.clone()];
        let mut sig = FunctionSignature::free("clamp", &params, &int);
        sig.namespace = &ns;
        assert_eq!(mangle_function(&sig, &types, &interner), "_ZN4util5clampEi");
    }

    #[test]
    fn variadic_appends_ellipsis_code() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let params = [int.clone()];
        let mut sig = FunctionSignature::free("sum", &params, &int);
        sig.is_variadic = true;
        assert_eq!(mangle_function(&sig, &types, &interner), "_Z3sumiz");
    }

    #[test]
    fn repeated_class_param_uses_substitution() {
        // void take(Widget, Widget) → second Widget is S_
        let (mut interner, mut types) = fixture();
        let w = types.get_or_create(interner.intern("Widget"), cinder_ast::TypeKind::Struct);
        let spec = TypeSpec::indexed(w);
        let params = [spec.clone(), spec];
        let void = TypeSpec::builtin(ValueType::Void);
        let sig = FunctionSignature::free("take", &params, &void);
        assert_eq!(mangle_function(&sig, &types, &interner), "_Z4take6WidgetS_");
    }

    #[test]
    fn static_local_is_function_scoped() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let sig = VariableSignature {
            name: "counter",
            namespace: &[],
            class_name: None,
            enclosing_function: Some("tick"),
            ty: &int,
        };
        assert_eq!(mangle_variable(&sig, &types, &interner), "_ZZ4tickvE7counter");
    }

    #[test]
    fn static_member_is_class_scoped() {
        let (interner, types) = fixture();
        let int = TypeSpec::builtin(ValueType::Int);
        let sig = VariableSignature {
            name: "instances",
            namespace: &[],
            class_name: Some("Widget"),
            enclosing_function: None,
            ty: &int,
        };
        assert_eq!(mangle_variable(&sig, &types, &interner), "_ZN6Widget9instancesE");
    }
}
