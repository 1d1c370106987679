//! The compilation driver: source text in, lowered IR and the populated
//! registries out.
//!
//! The driver owns error collection. Parsing already resynchronizes at
//! statement and declaration boundaries; a lowering error poisons only the
//! function it occurred in, and the remaining functions still lower. The
//! collected errors render as `<file>:<line>:<col>: <kind>: <message>`.

use cinder_ast::{DeclId, DeclKind, StmtId, StmtKind, StorageClass, ValueType};
use cinder_common::{CompileError, Diagnostic, Symbol};
use cinder_ir::IrInstruction;
use cinder_lower::{LoweredFunction, Lowerer};
use cinder_parse::{tokenize, ParsedUnit, Parser, Session};
use cinder_sema::ConstEvaluator;

pub use cinder_parse::{CompileContext, TargetAbi};

/// One static or global variable the backend must emit storage for.
#[derive(Debug, Clone)]
pub struct EmittedGlobal {
    /// Mangled symbol.
    pub name: Symbol,
    pub ty: ValueType,
    pub size_bits: u32,
    /// Constant initial value, when the initializer folds.
    pub initializer: Option<i64>,
}

/// Everything a compilation produces. The session rides along so callers
/// (the backend, the test suites) can consult the type registry and the
/// interner behind the emitted names.
pub struct CompileOutput {
    pub session: Session,
    pub unit: ParsedUnit,
    pub functions: Vec<LoweredFunction>,
    pub globals: Vec<EmittedGlobal>,
    pub errors: Vec<CompileError>,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// Find a lowered function whose (mangled) name contains `fragment`.
    pub fn function(&self, fragment: &str) -> Option<&LoweredFunction> {
        self.functions
            .iter()
            .find(|f| self.session.interner.view(f.name).contains(fragment))
    }

    pub fn instructions(&self, fragment: &str) -> &[IrInstruction] {
        self.function(fragment)
            .map(|f| f.instructions.as_slice())
            .unwrap_or(&[])
    }

    /// User-visible error lines, in source order of occurrence.
    pub fn rendered_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| e.render(&self.session.sources))
            .collect()
    }
}

/// Compile one translation unit. Never panics on bad input; everything
/// user-caused lands in `errors`.
pub fn compile(source: &str, file_name: &str, context: CompileContext) -> CompileOutput {
    let mut session = Session::new(context);
    let file = session.sources.add_file(file_name);
    let tokens = tokenize(source, file, &mut session.interner);

    let mut parser = Parser::new(&mut session, tokens);
    let unit = parser.parse_translation_unit();
    let mut errors = std::mem::take(&mut parser.errors);
    drop(parser);

    // Parsed functions first, then member functions of parsed classes, then
    // the template instantiations the parse demanded, in instantiation order.
    let mut to_lower = unit.decls.clone();
    for &decl in &unit.decls {
        if let DeclKind::Struct { type_index, .. } = session.arenas.decl(decl).kind {
            if let Some(info) = session.types.struct_info(type_index) {
                to_lower.extend(info.member_functions.iter().map(|mf| mf.decl));
            }
        }
    }
    to_lower.extend(session.templates.instantiated_decls());

    let mut functions = Vec::new();
    {
        let mut lowerer = Lowerer::new(&mut session, &unit);
        for decl in to_lower {
            if !matches!(lowerer.sess.arenas.decl(decl).kind, DeclKind::Function(_)) {
                continue;
            }
            match lowerer.lower_function(decl) {
                Ok(mut lowered) => functions.append(&mut lowered),
                // A bad body poisons one function, not the unit.
                Err(e) => errors.push(e),
            }
        }
    }

    let globals = collect_globals(&session, &unit);

    CompileOutput {
        session,
        unit,
        functions,
        globals,
        errors,
    }
}

/// Strict boundary for embedders: any recorded error fails the compilation
/// with a rendered diagnostic.
pub fn compile_strict(
    source: &str,
    file_name: &str,
    context: CompileContext,
) -> miette::Result<CompileOutput> {
    let output = compile(source, file_name, context);
    if output.succeeded() {
        return Ok(output);
    }
    let rendered = output.rendered_errors().join("\n");
    Err(Diagnostic::error(rendered)
        .with_help("compilation stopped after the listed errors")
        .into())
}

/// Namespace-scope variables plus the static locals found inside function
/// bodies; both are backend-emitted storage under their mangled names.
fn collect_globals(session: &Session, unit: &ParsedUnit) -> Vec<EmittedGlobal> {
    let mut out = Vec::new();
    for &decl in &unit.decls {
        match &session.arenas.decl(decl).kind {
            DeclKind::Variable(v)
                if matches!(v.storage, StorageClass::Global | StorageClass::StaticMember) =>
            {
                out.push(emitted_global(session, decl));
            }
            DeclKind::Function(f) => {
                if let Some(body) = f.body {
                    collect_static_locals(session, body, &mut out);
                }
            }
            _ => {}
        }
    }
    out
}

fn collect_static_locals(session: &Session, stmt: StmtId, out: &mut Vec<EmittedGlobal>) {
    match &session.arenas.stmt(stmt).kind {
        StmtKind::Block(stmts) => {
            for &s in stmts {
                collect_static_locals(session, s, out);
            }
        }
        StmtKind::VarDecl(decl) => {
            if let DeclKind::Variable(v) = &session.arenas.decl(*decl).kind {
                if v.storage == StorageClass::StaticLocal {
                    out.push(emitted_global(session, *decl));
                }
            }
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_static_locals(session, *then_branch, out);
            if let Some(e) = else_branch {
                collect_static_locals(session, *e, out);
            }
        }
        StmtKind::While { body, .. } => collect_static_locals(session, *body, out),
        StmtKind::For { init, body, .. } => {
            if let Some(i) = init {
                collect_static_locals(session, *i, out);
            }
            collect_static_locals(session, *body, out);
        }
        _ => {}
    }
}

fn emitted_global(session: &Session, decl: DeclId) -> EmittedGlobal {
    let v = match &session.arenas.decl(decl).kind {
        DeclKind::Variable(v) => v,
        _ => unreachable!("caller checked the declaration kind"),
    };
    let ty = v.ty.value_type();
    let size_bits = if v.ty.pointer_depth > 0 {
        64
    } else {
        session.types.spec_size_bits(&v.ty)
    };
    let initializer = v.init.and_then(|init| {
        let evaluator = ConstEvaluator::new(&session.arenas, &session.types);
        evaluator.evaluate(init).ok().map(|c| c.as_i64())
    });
    EmittedGlobal {
        name: v.mangled_name.unwrap_or(v.name),
        ty,
        size_bits,
        initializer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_unit_compiles_clean() {
        let out = compile("", "empty.cpp", CompileContext::default());
        assert!(out.succeeded());
        assert!(out.functions.is_empty());
        assert!(out.globals.is_empty());
    }

    #[test]
    fn syntax_error_is_recorded_with_position() {
        let out = compile("int broken( { }", "bad.cpp", CompileContext::default());
        assert!(!out.succeeded());
        let rendered = out.rendered_errors();
        assert!(rendered[0].starts_with("bad.cpp:1:"));
    }

    #[test]
    fn error_recovery_keeps_later_functions() {
        // The first function is malformed; the second still lowers.
        let source = r#"
            int bad() { return unknown_name; }
            int good() { return 3; }
        "#;
        let out = compile(source, "recover.cpp", CompileContext::default());
        assert!(!out.succeeded());
        assert!(out.function("good").is_some());
    }

    #[test]
    fn constant_global_initializer_folds() {
        let out = compile("int limit = 4 * 8 + 1;", "globals.cpp", CompileContext::default());
        assert!(out.succeeded());
        assert_eq!(out.globals.len(), 1);
        assert_eq!(out.globals[0].initializer, Some(33));
    }

    #[test]
    fn static_local_lands_in_global_table() {
        let source = r#"
            int counter() {
                static int hits = 0;
                hits = hits + 1;
                return hits;
            }
        "#;
        let out = compile(source, "statics.cpp", CompileContext::default());
        assert!(out.succeeded(), "{:?}", out.rendered_errors());
        assert_eq!(out.globals.len(), 1);
        assert_eq!(out.globals[0].size_bits, 32);
    }

    #[test]
    fn strict_boundary_reports_through_miette() {
        let err = compile_strict("int x = ;", "strict.cpp", CompileContext::default());
        assert!(err.is_err());
    }
}
