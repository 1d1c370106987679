//! Template instantiation behavior observed through the driver: caching,
//! pack boundaries, lazy class layout, and constraint rejection.

use cinder_ast::ValueType;
use cinder_driver::{compile, CompileContext, CompileOutput};
use cinder_ir::{IrPayload, Operand};

fn build(source: &str) -> CompileOutput {
    let out = compile(source, "templates.cpp", CompileContext::default());
    assert!(
        out.succeeded(),
        "unexpected errors: {:?}",
        out.rendered_errors()
    );
    out
}

fn returned_imm(out: &CompileOutput, fragment: &str) -> u64 {
    let instrs = out.instructions(fragment);
    let ret = instrs
        .iter()
        .rev()
        .find_map(|i| match &i.payload {
            IrPayload::Return(r) => r.value.as_ref(),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no value-returning Return in {fragment}"));
    match ret.value {
        Operand::Imm(v) => v,
        other => panic!("expected an immediate return, got {other:?}"),
    }
}

/// Two syntactically identical call sites share one instantiation.
#[test]
fn instantiation_is_idempotent() {
    let out = build(
        r#"
        template<typename T>
        T identity(T x) { return x; }

        int first_use() { return identity(7); }
        int second_use() { return identity(9); }
    "#,
    );
    let instantiations = out
        .functions
        .iter()
        .filter(|f| out.session.interner.view(f.name).contains("8identity"))
        .count();
    assert_eq!(instantiations, 1);
}

/// Distinct argument types are distinct instantiations.
#[test]
fn distinct_arguments_instantiate_separately() {
    let out = build(
        r#"
        template<typename T>
        T identity(T x) { return x; }

        int int_use() { return identity(7); }
        double double_use() { return identity(1.5); }
    "#,
    );
    let instantiations = out
        .functions
        .iter()
        .filter(|f| out.session.interner.view(f.name).contains("8identity"))
        .count();
    assert_eq!(instantiations, 2);
}

/// Empty-pack folds: `(a && ...)` is true, `(a || ...)` is false.
#[test]
fn empty_pack_fold_boundaries() {
    let out = build(
        r#"
        template<typename... A>
        bool all_of(A... a) { return (a && ...); }

        template<typename... A>
        bool any_of(A... a) { return (a || ...); }

        bool empty_and() { return all_of(); }
        bool empty_or() { return any_of(); }
    "#,
    );
    assert_eq!(returned_imm(&out, "6all_of"), 1);
    assert_eq!(returned_imm(&out, "6any_of"), 0);
}

/// `sizeof...` counts the bound pack; zero for the empty pack.
#[test]
fn sizeof_pack_counts_arguments() {
    let out = build(
        r#"
        template<typename... A>
        unsigned long long arity(A... a) { return sizeof...(a); }

        unsigned long long none() { return arity(); }
        unsigned long long three() { return arity(1, 2, 3); }
    "#,
    );
    let counts: Vec<u64> = out
        .functions
        .iter()
        .filter(|f| out.session.interner.view(f.name).contains("5arity"))
        .map(|f| {
            f.instructions
                .iter()
                .find_map(|i| match &i.payload {
                    IrPayload::Return(r) => r.value.as_ref().and_then(|v| match v.value {
                        Operand::Imm(n) => Some(n),
                        _ => None,
                    }),
                    _ => None,
                })
                .expect("arity instantiation returns an immediate")
        })
        .collect();
    assert_eq!(counts.len(), 2);
    assert!(counts.contains(&0));
    assert!(counts.contains(&3));
}

/// A left fold over a three-element pack associates left.
#[test]
fn binary_fold_with_init() {
    let out = build(
        r#"
        template<typename... A>
        int total(A... a) { return (0 + ... + a); }

        int site() { return total(1, 2, 3); }
    "#,
    );
    let instantiated = out
        .functions
        .iter()
        .find(|f| out.session.interner.view(f.name).contains("5total"))
        .expect("instantiation missing");
    let adds = instantiated
        .instructions
        .iter()
        .filter(|i| i.opcode == cinder_ir::IrOpcode::Add)
        .count();
    assert_eq!(adds, 3);
}

/// `sizeof(Box<T>)` forces the layout phase; the size matches the
/// substituted member.
#[test]
fn class_template_layout_on_demand() {
    let out = build(
        r#"
        template<typename T>
        struct Box { T value; };

        unsigned long long int_size() { return sizeof(Box<int>); }
        unsigned long long double_size() { return sizeof(Box<double>); }
    "#,
    );
    assert_eq!(returned_imm(&out, "int_size"), 4);
    assert_eq!(returned_imm(&out, "double_size"), 8);
}

/// Members of an instantiated class template read and write like any
/// other struct members.
#[test]
fn instantiated_member_access() {
    let out = build(
        r#"
        template<typename T>
        struct Box { T value; };

        int round_trip() {
            Box<int> b;
            b.value = 7;
            return b.value;
        }
    "#,
    );
    let instrs = out.instructions("round_trip");
    let store = instrs
        .iter()
        .find(|i| {
            matches!(&i.payload, IrPayload::MemberStore(m)
                if out.session.interner.view(m.member) == "value"
                    && matches!(m.value.value, Operand::Imm(7)))
        })
        .is_some();
    assert!(store, "expected a MemberStore into Box<int>::value");
    let load = instrs
        .iter()
        .any(|i| matches!(&i.payload, IrPayload::MemberLoad(m)
            if out.session.interner.view(m.member) == "value"));
    assert!(load, "expected a MemberLoad of Box<int>::value");
}

/// A `requires` clause that evaluates false rejects the instantiation;
/// the failure surfaces as a resolution error, not a crash, and the rest
/// of the unit still compiles.
#[test]
fn unsatisfied_constraint_rejects_candidate() {
    let source = r#"
        template<typename T> concept Small = sizeof(T) <= 4;

        template<typename T> requires Small<T>
        int fits(T x) { return 1; }

        int accepted() { return fits(3); }
        int rejected() { return fits(2.5); }
    "#;
    let out = compile(source, "templates.cpp", CompileContext::default());
    assert!(!out.succeeded());
    assert!(out
        .rendered_errors()
        .iter()
        .any(|e| e.contains("no matching function")));
    // The satisfied call still instantiated and lowered.
    assert!(out
        .functions
        .iter()
        .any(|f| out.session.interner.view(f.name).contains("4fits")));
    assert!(out.function("accepted").is_some());
}

/// Non-type arguments participate in instantiation and substitution.
#[test]
fn non_type_argument_substitutes() {
    let out = build(
        r#"
        template<int N>
        int scaled(int x) { return x * N; }

        int site() { return scaled<3>(10); }
    "#,
    );
    let instantiated = out
        .functions
        .iter()
        .find(|f| out.session.interner.view(f.name).contains("6scaled"))
        .expect("instantiation missing");
    let has_mul_by_3 = instantiated.instructions.iter().any(|i| {
        matches!(&i.payload, IrPayload::Binary(b)
            if matches!(b.rhs.value, Operand::Imm(3)) || matches!(b.lhs.value, Operand::Imm(3)))
    });
    assert!(has_mul_by_3, "N should substitute to the literal 3");
}

/// Type-trait intrinsics fold during constant evaluation.
#[test]
fn type_traits_fold_in_static_assert() {
    let out = build(
        r#"
        static_assert(__is_integral(int));
        static_assert(!__is_integral(double));
        static_assert(__is_same(int, signed int));

        int anchor() { return 0; }
    "#,
    );
    assert!(out.function("anchor").is_some());
}

/// Enum sizes and scoped-enum qualification behave across lowering.
#[test]
fn enumerators_fold_to_immediates() {
    let out = build(
        r#"
        enum Color { Red, Green, Blue };

        int pick() { return Blue; }
    "#,
    );
    let instrs = out.instructions("pick");
    let ret = instrs
        .iter()
        .find_map(|i| match &i.payload {
            IrPayload::Return(r) => r.value.as_ref(),
            _ => None,
        })
        .expect("pick returns a value");
    assert!(matches!(ret.value, Operand::Imm(2)));
    assert_eq!(ret.ty, ValueType::Int);
}
