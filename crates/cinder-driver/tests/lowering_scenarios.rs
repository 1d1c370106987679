//! End-to-end lowering tests: C++ source in, IR shape assertions out.

use cinder_ast::ValueType;
use cinder_driver::{compile, CompileContext, CompileOutput};
use cinder_ir::{IrInstruction, IrOpcode, IrPayload, Operand};

fn build(source: &str) -> CompileOutput {
    let out = compile(source, "test.cpp", CompileContext::default());
    assert!(
        out.succeeded(),
        "unexpected errors: {:?}",
        out.rendered_errors()
    );
    out
}

fn var_is(out: &CompileOutput, operand: Operand, name: &str) -> bool {
    matches!(operand, Operand::Var(s) if out.session.interner.view(s) == name)
}

fn position_of(instrs: &[IrInstruction], pred: impl Fn(&IrInstruction) -> bool) -> usize {
    instrs
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("expected instruction not found"))
}

/// Local arithmetic: `x + 3` becomes one typed Add into a fresh temp, and
/// `y` is initialized from that temp.
#[test]
fn local_add_produces_typed_binary_op() {
    let out = build(
        r#"
        int add_example() {
            int x = 5;
            int y = x + 3;
            return y;
        }
    "#,
    );
    let instrs = out.instructions("add_example");

    let init_x = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Assignment(a)
            if var_is(&out, a.target, "x") && matches!(a.value.value, Operand::Imm(5)))
    });

    let add = position_of(instrs, |i| {
        i.opcode == IrOpcode::Add
            && matches!(&i.payload, IrPayload::Binary(b)
                if var_is(&out, b.lhs.value, "x")
                    && b.lhs.ty == ValueType::Int
                    && b.lhs.size_bits == 32
                    && matches!(b.rhs.value, Operand::Imm(3)))
    });
    let add_result = match &instrs[add].payload {
        IrPayload::Binary(b) => b.result,
        _ => unreachable!(),
    };

    let init_y = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Assignment(a)
            if var_is(&out, a.target, "y") && a.value.value == Operand::Temp(add_result))
    });

    assert!(init_x < add && add < init_y);
}

/// `&arr[1]` flattens to a single ComputeAddress; `*p = 42` stores through
/// the copied pointer temp with a DereferenceStore.
#[test]
fn address_analyzer_and_indirect_store() {
    let out = build(
        r#"
        int deref_example() {
            int arr[3] = {1, 2, 3};
            int *p = &arr[1];
            *p = 42;
            return arr[1];
        }
    "#,
    );
    let instrs = out.instructions("deref_example");

    let compute = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::ComputeAddress(c)
            if var_is(&out, c.base, "arr")
                && c.member_offset == 0
                && c.array_indices.len() == 1
                && matches!(c.array_indices[0].index.value, Operand::Imm(1))
                && c.array_indices[0].element_size_bits == 32)
    });

    let store = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::DereferenceStore(d)
            if matches!(d.value.value, Operand::Imm(42)))
    });
    // The pointer the store goes through is a temp, not the named slot.
    match &instrs[store].payload {
        IrPayload::DereferenceStore(d) => {
            assert!(matches!(d.pointer, Operand::Temp(_)));
        }
        _ => unreachable!(),
    }
    assert!(compute < store);
}

/// `p + n` then `*` reaches the same address as `p[n]`: both scale the
/// index by the element size.
#[test]
fn pointer_arithmetic_scales_by_element_size() {
    let out = build(
        r#"
        int scale_example(int *p) {
            return *(p + 2);
        }
    "#,
    );
    let instrs = out.instructions("scale_example");

    // 2 scaled by sizeof(int) folds to an immediate 8.
    let add = position_of(instrs, |i| {
        i.opcode == IrOpcode::Add
            && matches!(&i.payload, IrPayload::Binary(b)
                if var_is(&out, b.lhs.value, "p") && matches!(b.rhs.value, Operand::Imm(8)))
    });
    let deref = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Dereference(d) if d.size_bits == 32)
    });
    assert!(add < deref);
}

/// Deduction instantiates `identity<int>` once and the call site uses the
/// Itanium-mangled instantiation name.
#[test]
fn template_deduction_call_site() {
    let out = build(
        r#"
        template<typename T>
        T identity(T x) { return x; }

        int call_identity() {
            int r = identity(7);
            return r;
        }
    "#,
    );

    // The instantiated body was lowered under its mangled name.
    let instantiated = out
        .function("_Z8identityIiET_S0_")
        .expect("instantiation missing");
    assert!(!instantiated.instructions.is_empty());

    let instrs = out.instructions("call_identity");
    let call = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Call(c)
            if var_is(&out, c.function, "_Z8identityIiET_S0_"))
    });
    match &instrs[call].payload {
        IrPayload::Call(c) => {
            assert_eq!(c.return_type, ValueType::Int);
            assert_eq!(c.return_size_bits, 32);
            assert!(c.result.is_some());
            assert_eq!(c.args.len(), 1);
            assert!(matches!(c.args[0].value, Operand::Imm(7)));
        }
        _ => unreachable!(),
    }
}

/// `a == b` on a class resolves `operator==`: address-of both operands
/// (the parameter is a const reference), then a call returning bool-8.
#[test]
fn operator_overload_call() {
    let out = build(
        r#"
        struct P {
            int x;
            int y;
            bool operator==(const P& o) const { return x == o.x && y == o.y; }
        };

        bool compare_points() {
            P a{1, 2};
            P b{1, 2};
            bool r = a == b;
            return r;
        }
    "#,
    );
    let instrs = out.instructions("compare_points");

    let call = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Call(c)
            if matches!(c.function, Operand::Var(s)
                if out.session.interner.view(s).contains("1Peq")))
    });
    match &instrs[call].payload {
        IrPayload::Call(c) => {
            assert_eq!(c.return_type, ValueType::Bool);
            assert_eq!(c.return_size_bits, 8);
            assert_eq!(c.args.len(), 2);
            assert_eq!(c.args[0].ty, ValueType::Pointer);
            assert_eq!(c.args[1].ty, ValueType::Pointer);
        }
        _ => unreachable!(),
    }

    // Both operand addresses are taken before the call.
    let addr_count = instrs[..call]
        .iter()
        .filter(|i| i.opcode == IrOpcode::AddressOf)
        .count();
    assert!(addr_count >= 2, "expected AddressOf for both operands");

    // The operator body itself lowered as a member function.
    assert!(out.function("1Peq").is_some());
}

/// System V varargs with a struct-typed list: va_start points the list at
/// the prologue-filled struct, va_arg branches on gp_offset < 48.
#[test]
fn sysv_va_arg_register_path() {
    let out = build(
        r#"
        using va_list = unsigned long;

        int sum(int n, ...) {
            va_list va;
            __builtin_va_start(va, n);
            int s = 0;
            for (int i = 0; i < n; ++i)
                s += __builtin_va_arg(va, int);
            __builtin_va_end(va);
            return s;
        }
    "#,
    );
    let instrs = out.instructions("sum");

    // va_start: address of the compiler-generated va_list struct into va.
    let start = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::AddressOf(a)
            if var_is(&out, a.source, "__varargs_va_list_struct__"))
    });

    // va_arg: gp_offset load (offset 0), compare against 48, branch.
    let gp_load = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::MemberLoad(m)
            if out.session.interner.view(m.member) == "gp_offset"
                && m.offset == 0
                && m.through_pointer)
    });
    let compare = position_of(instrs, |i| {
        i.opcode == IrOpcode::UnsignedLessThan
            && matches!(&i.payload, IrPayload::Binary(b)
                if matches!(b.rhs.value, Operand::Imm(48)))
    });
    // The loop itself branches earlier; the va_arg branch follows its
    // compare directly.
    let branch = compare
        + instrs[compare..]
            .iter()
            .position(|i| i.opcode == IrOpcode::ConditionalBranch)
            .expect("va_arg conditional branch missing");

    // Register path: reg_save_area at offset 16, gp_offset advanced by 8.
    let save_area = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::MemberLoad(m)
            if out.session.interner.view(m.member) == "reg_save_area" && m.offset == 16)
    });
    let advance = position_of(instrs, |i| {
        i.opcode == IrOpcode::Add
            && matches!(&i.payload, IrPayload::Binary(b)
                if b.lhs.size_bits == 32 && matches!(b.rhs.value, Operand::Imm(8)))
    });
    let gp_store = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::MemberStore(m)
            if out.session.interner.view(m.member) == "gp_offset")
    });

    // Overflow path: overflow_arg_area at offset 8.
    let overflow = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::MemberLoad(m)
            if out.session.interner.view(m.member) == "overflow_arg_area" && m.offset == 8)
    });

    assert!(start < gp_load);
    assert!(gp_load < compare && compare < branch && branch < save_area);
    assert!(save_area < advance && advance <= gp_store);
    assert!(gp_store < overflow);
}

/// Win64 varargs: the list is a cursor starting at `&last_fixed + 8`,
/// advanced 8 bytes per `va_arg`.
#[test]
fn win64_va_arg_cursor_path() {
    let source = r#"
        int sum(int n, ...) {
            char *va;
            __builtin_va_start(va, n);
            int first = __builtin_va_arg(va, int);
            return first;
        }
    "#;
    let out = compile(source, "test.cpp", CompileContext::windows());
    assert!(out.succeeded(), "{:?}", out.rendered_errors());
    let instrs = out.instructions("sum");

    // va_start: &n + 8 stored into va.
    let n_addr = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::AddressOf(a) if var_is(&out, a.source, "n"))
    });
    let bump = position_of(instrs, |i| {
        i.opcode == IrOpcode::Add
            && matches!(&i.payload, IrPayload::Binary(b)
                if b.lhs.ty == ValueType::Pointer && matches!(b.rhs.value, Operand::Imm(8)))
    });
    assert!(n_addr < bump);

    // va_arg: dereference the cursor, then advance it by one slot.
    let read = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Dereference(d) if d.size_bits == 32)
    });
    let advance = instrs[read..]
        .iter()
        .position(|i| {
            i.opcode == IrOpcode::Add
                && matches!(&i.payload, IrPayload::Binary(b)
                    if matches!(b.rhs.value, Operand::Imm(8)))
        })
        .expect("cursor advance missing");
    assert!(advance > 0);
}

/// `(args + ...)` over a three-element pack lowers to exactly two Adds.
#[test]
fn fold_expression_expands_to_adds() {
    let out = build(
        r#"
        template<typename... Args>
        int total(Args... args) { return (args + ...); }

        int fold_site() { return total(1, 2, 3); }
    "#,
    );

    let instantiated = out.function("total").expect("instantiation missing");
    let adds = instantiated
        .instructions
        .iter()
        .filter(|i| i.opcode == IrOpcode::Add)
        .count();
    assert_eq!(adds, 2);

    // The call site passes all three expanded arguments.
    let site = out.instructions("fold_site");
    let call = position_of(site, |i| matches!(&i.payload, IrPayload::Call(_)));
    match &site[call].payload {
        IrPayload::Call(c) => assert_eq!(c.args.len(), 3),
        _ => unreachable!(),
    }
}

/// Ternary lowering: condition branch, both arms assign the shared result
/// temp, true label strictly before the false label.
#[test]
fn ternary_branch_ordering() {
    let out = build(
        r#"
        int pick(int c) {
            int r = c ? 10 : 20;
            return r;
        }
    "#,
    );
    let instrs = out.instructions("pick");
    let branch = position_of(instrs, |i| i.opcode == IrOpcode::ConditionalBranch);
    let true_store = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Assignment(a)
            if matches!(a.value.value, Operand::Imm(10)))
    });
    let false_store = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Assignment(a)
            if matches!(a.value.value, Operand::Imm(20)))
    });
    assert!(branch < true_store && true_store < false_store);

    // Both arms target the same result temp.
    let (t1, t2) = match (&instrs[true_store].payload, &instrs[false_store].payload) {
        (IrPayload::Assignment(a), IrPayload::Assignment(b)) => (a.target, b.target),
        _ => unreachable!(),
    };
    assert_eq!(t1, t2);
}

/// Assignment evaluation order: the RHS instructions precede the store.
#[test]
fn assignment_stores_after_rhs() {
    let out = build(
        r#"
        int order(int a, int b) {
            int r = 0;
            r = a * b + 1;
            return r;
        }
    "#,
    );
    let instrs = out.instructions("order");
    let mul = position_of(instrs, |i| i.opcode == IrOpcode::Multiply);
    let add = position_of(instrs, |i| i.opcode == IrOpcode::Add);
    let store = position_of(instrs, |i| {
        matches!(&i.payload, IrPayload::Assignment(a)
            if var_is(&out, a.target, "r") && matches!(a.value.value, Operand::Temp(_)))
    });
    assert!(mul < add && add < store);
}

/// Compound assignment on a named local takes the dedicated opcode.
#[test]
fn compound_assignment_on_local_slot() {
    let out = build(
        r#"
        int bump(int x) {
            x += 5;
            return x;
        }
    "#,
    );
    let instrs = out.instructions("bump");
    let compound = position_of(instrs, |i| i.opcode == IrOpcode::AddAssign);
    match &instrs[compound].payload {
        IrPayload::Assignment(a) => {
            assert!(var_is(&out, a.target, "x"));
            assert!(matches!(a.value.value, Operand::Imm(5)));
        }
        _ => unreachable!(),
    }
}

/// Comparisons yield bool-8; unsigned operands pick the unsigned opcode.
#[test]
fn comparison_opcode_selection() {
    let out = build(
        r#"
        bool cmp(unsigned int a, unsigned int b) {
            return a < b;
        }
    "#,
    );
    let instrs = out.instructions("cmp");
    let less = position_of(instrs, |i| i.opcode == IrOpcode::UnsignedLessThan);
    match &instrs[less].payload {
        IrPayload::Binary(b) => {
            assert!(var_is(&out, b.lhs.value, "a"));
            assert!(var_is(&out, b.rhs.value, "b"));
        }
        _ => unreachable!(),
    }
}

/// Every returned operand vector keeps the conventional
/// `[type, size, value, extra]` shape at the lowering boundary.
#[test]
fn temp_discipline_holds_for_lowered_functions() {
    let out = build(
        r#"
        int discipline(int a) {
            int arr[2] = {a, a + 1};
            int *p = &arr[0];
            *p = a * 3;
            return arr[0] + *p;
        }
    "#,
    );
    for function in &out.functions {
        cinder_ir::verify_temp_discipline(&function.instructions)
            .unwrap_or_else(|e| panic!("temp discipline violated: {e}"));
    }
}
