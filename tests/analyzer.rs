mod common;

use std::sync::Arc;

use common::{arch, check_fragment, global, run_fragment, ISA};
use idlc::{
    build_global_scope, parse_expression, parse_fragment, parse_isa, ArchConfig, CheckerConfig,
    CsrInfo, CsrLength, Session, TypeKind, Value,
};

fn rejects(source: &str, needle: &str) {
    match check_fragment(&global(), source) {
        Ok(()) => panic!("accepted:\n{source}"),
        Err(message) => assert!(
            message.contains(needle),
            "expected '{needle}' in '{message}'"
        ),
    }
}

#[test]
fn accepts_typical_instruction_body() {
    let source = "
Bits<64> imm = 64'd12;
XReg base = 0;
XReg addr = base + imm;
if (implemented?(ExtensionName::F)) {
  Bits<32> word = addr[31:0];
} else {
  addr = 0;
}
";
    assert_eq!(check_fragment(&global(), source), Ok(()));
}

#[test]
fn reports_location_of_undefined_symbols() {
    let program = parse_fragment("add.idl", "Bits<8> a = 1;\nBits<8> b = a + missing;\n").unwrap();
    let mut session = Session::new(global());
    let err = session.type_check(&program).unwrap_err();
    let type_error = err.as_type_error().unwrap();
    assert_eq!(&*type_error.file, "add.idl");
    assert_eq!(type_error.line, 2);
    assert!(type_error.message.contains("undefined symbol 'missing'"));
}

#[test]
fn rejects_type_mismatches() {
    rejects("Boolean b = 8'd1;", "cannot initialize 'b'");
    rejects("Bits<8> a = 1; a = true;", "cannot assign");
    rejects("Bits<8> a = 1; Boolean b = a && true;", "needs Boolean operands");
    rejects("if (8'd1) { }", "condition must be Boolean");
    rejects("Bits<4> x = 4'd20;", "does not fit in 4 bits");
    rejects("Bits<8> a = 0; Bits<1> b = a[8];", "out of range");
    rejects("Bits<8> a = 0; Bits<4> b = a[2:5];", "is invalid");
}

#[test]
fn rejects_redeclaration_in_the_same_scope() {
    rejects("Bits<8> a = 1; Bits<8> a = 2;", "already defined");
    // A nested block may not shadow either.
    rejects("Bits<8> a = 1; if (a == 1) { Bits<8> a = 2; }", "already defined");
}

#[test]
fn block_scopes_end_with_the_block() {
    rejects("if (1 == 1) { Bits<8> t = 1; } t = 2;", "undefined symbol 't'");
    assert_eq!(
        check_fragment(&global(), "for (Bits<8> i = 0; i < 4; i++) { } Bits<8> i = 9;"),
        Ok(())
    );
}

#[test]
fn constants_need_values_and_cannot_be_written() {
    rejects("Bits<8> MASK;", "must be initialized");
    rejects("Bits<8> MASK = 8'hff; MASK = 0;", "cannot assign to constant 'MASK'");
    rejects("Bits<8> a = 1; Bits<8> COPY = a;", "known at compile time");
    rejects("LIMIT = 3;", "cannot assign to global constant 'LIMIT'");
}

#[test]
fn template_parameters_cannot_be_written() {
    let isa = parse_isa(
        "isa.idl",
        "
function bump {
  template Bits<8> N
  returns Bits<8>
  body {
    N = 1;
    return N;
  }
}
",
    )
    .unwrap();
    let global =
        build_global_scope(Arc::new(arch(Some(64))), Some(&isa), CheckerConfig::default()).unwrap();
    let err = check_fragment(&global, "Bits<8> a = bump<3>();").unwrap_err();
    assert!(err.contains("cannot assign to template parameter 'N'"), "{err}");
}

#[test]
fn bits_width_must_be_a_positive_compile_time_integer() {
    rejects("Bits<8> w = 8; Bits<w> v = 0;", "known at compile time");
    rejects("Bits<(1 - 1)> v = 0;", "must be positive");
    // A parameter the configuration leaves open gives an unknown width.
    assert_eq!(check_fragment(&global(), "Bits<PHYS_ADDR_WIDTH> pa = 0;"), Ok(()));
}

#[test]
fn array_sizes_must_be_compile_time_constants() {
    rejects("Bits<8> n; Bits<8> arr[n];", "array size must be known at compile time");

    let session = run_fragment(&global(), "Bits<8> arr[4]; Bits<8> cells[LIMIT];");
    let arr = session.symtab().get_var("arr").unwrap();
    match &arr.ty().kind {
        TypeKind::Array { len, elem } => {
            assert_eq!(*len, 4);
            assert_eq!(elem.known_width(), Some(8));
        }
        other => panic!("expected an array, got {other:?}"),
    }
    assert!(matches!(
        session.symtab().get_var("cells").unwrap().ty().kind,
        TypeKind::Array { len: 200, .. }
    ));
}

#[test]
fn widths_past_the_limit_are_type_errors() {
    rejects("Bits<8> a = {4294967295{8'd1}};", "width exceeds");
    rejects("Bits<4294967295> a; Bits<8> b = {a, a};", "width exceeds");
    rejects("Bits<4294967295> a; Bits<8> b = a `+ a;", "width exceeds");
    rejects("Bits<4294967295> a; Bits<8> b = a `* 2'd1;", "width exceeds");
    rejects("Bits<4294967295> a; Bits<8> b = a << 1;", "width exceeds");
}

#[test]
fn left_shift_by_an_unknown_amount_keeps_the_operand_width() {
    let mut session = Session::new(global());
    session.add_decode_var("q", 3).unwrap();
    session
        .type_check(&parse_fragment("f.idl", "Bits<8> a = 8'h81;").unwrap())
        .unwrap();

    let unknown = parse_expression("e.idl", "a << q").unwrap();
    session.type_check(&unknown).unwrap();
    assert_eq!(session.type_of(&unknown, unknown.root).unwrap().known_width(), Some(8));

    let known = parse_expression("e.idl", "a << 2").unwrap();
    session.type_check(&known).unwrap();
    assert_eq!(session.type_of(&known, known.root).unwrap().known_width(), Some(10));
}

#[test]
fn scope_depth_is_restored_after_checking_blocks() {
    let isa = format!(
        "{ISA}
function broken {{
  returns Bits<8>
  body {{
    Bits<8> t = 1;
    return t + missing;
  }}
}}
"
    );
    let isa = parse_isa("isa.idl", &isa).unwrap();
    let global =
        build_global_scope(Arc::new(arch(Some(64))), Some(&isa), CheckerConfig::default()).unwrap();
    let mut session = Session::new(global);
    session.add_decode_var("rd", 5).unwrap();
    let depth = session.symtab().levels();

    let cases = [
        ("if (rd == 0) { Bits<8> t = 1; } else { Bits<8> u = 2; }", true),
        ("if (rd == 0) { Bits<8> t = true; }", false),
        ("for (Bits<8> i = 0; i < 4; i++) { Bits<8> t = i; }", true),
        ("for (Bits<8> i = 0; i < 4; i++) { Boolean t = i; }", false),
        ("Bits<8> x = add_one(1);", true),
        ("Bits<8> y = broken();", false),
    ];
    for (source, ok) in cases {
        let program = parse_fragment("f.idl", source).unwrap();
        let result = session.type_check(&program);
        assert_eq!(result.is_ok(), ok, "{source}: {result:?}");
        if let Err(err) = result {
            assert!(err.as_type_error().is_some(), "{source}: {err}");
        }
        assert_eq!(session.symtab().levels(), depth, "{source}");
    }
}

#[test]
fn csr_use_in_a_body_is_checked_against_the_configuration_at_call_time() {
    let isa = parse_isa(
        "isa.idl",
        "
function read_hidden {
  returns Bits<64>
  body {
    return CSR[mhidden].sw_read();
  }
}

function read_absent {
  returns Bits<64>
  body {
    return CSR[mabsent].sw_read();
  }
}

function one {
  returns Bits<8>
  body {
    return 8'd1;
  }
}
",
    )
    .unwrap();
    let config = |implemented: bool| {
        let hidden = CsrInfo::new("mhidden", 0x7c0, CsrLength::Xlen);
        let hidden = if implemented { hidden } else { hidden.unimplemented() };
        ArchConfig::builder().xlen(64).csr(hidden).build()
    };

    let without = build_global_scope(Arc::new(config(false)), Some(&isa), CheckerConfig::default())
        .expect("bodies are not checked while building the global scope");
    assert_eq!(check_fragment(&without, "Bits<8> a = one();"), Ok(()));
    let err = check_fragment(&without, "Bits<64> a = read_hidden();").unwrap_err();
    assert!(err.contains("CSR 'mhidden' is not implemented"), "{err}");
    let err = check_fragment(&without, "Bits<64> a = read_absent();").unwrap_err();
    assert!(err.contains("undefined CSR 'mabsent'"), "{err}");

    let with =
        build_global_scope(Arc::new(config(true)), Some(&isa), CheckerConfig::default()).unwrap();
    assert_eq!(check_fragment(&with, "Bits<64> a = read_hidden();"), Ok(()));
}

#[test]
fn decode_variables_are_read_only() {
    let mut session = Session::new(global());
    session.add_decode_var("rs1", 5).unwrap();
    assert!(session.add_decode_var("rs1", 5).is_err());

    let ok = parse_fragment("f.idl", "Bits<5> r = rs1;").unwrap();
    session.type_check(&ok).unwrap();

    let bad = parse_fragment("f.idl", "rs1 = 0;").unwrap();
    let err = session.type_check(&bad).unwrap_err();
    assert!(err.to_string().contains("decode variable 'rs1'"));

    // Decode variables survive a reset; earlier bindings do not.
    session.reset();
    let again = parse_fragment("f.idl", "Bits<5> r = rs1 + 1;").unwrap();
    session.type_check(&again).unwrap();
}

#[test]
fn csr_fields_check_access_and_implementation() {
    assert_eq!(check_fragment(&global(), "CSR[mstatus].MIE = 1;"), Ok(()));
    rejects("CSR[misa].MXL = 1;", "read-only (RO)");
    rejects("Bits<26> e = CSR[misa].EXT;", "not implemented");
    rejects("Bits<1> x = CSR[mstatus].NOPE;", "has no field 'NOPE'");
    rejects("Bits<1> x = CSR[nope].MIE;", "nope");
    assert_eq!(check_fragment(&global(), "Bits<2> mxl = CSR[misa].MXL;"), Ok(()));
}

#[test]
fn register_index_must_be_in_range() {
    assert_eq!(check_fragment(&global(), "X[1] = X[2] + 1;"), Ok(()));
    rejects("X[32] = 0;", "out of range");
}

#[test]
fn bitfields_expose_their_fields() {
    assert_eq!(
        check_fragment(&global(), "Entry e = 16'h1234; Bits<12> ppn = e.PPN; e.FLAGS = 4'd3;"),
        Ok(())
    );
    rejects("Entry e = 0; Bits<1> x = e.NOPE;", "no field 'NOPE'");
}

#[test]
fn function_calls_check_arity_and_argument_types() {
    rejects("Bits<8> a = add_one();", "expects 1 argument(s), 0 given");
    rejects("Bits<8> a = add_one(true);", "argument 1 of 'add_one'");
    rejects("Bits<8> a = ones();", "expects 1 template argument(s), 0 given");
    rejects("Bits<8> n = 3; Bits<8> a = ones<n>();", "known at compile time");
    rejects("Bits<8> a = nothing(1);", "undefined function 'nothing'");
    rejects("add_one;", "no effect");
}

#[test]
fn multi_assignment_matches_return_arity() {
    assert_eq!(
        check_fragment(&global(), "Bits<4> hi; Bits<4> lo; (hi, lo) = split(8'hA5);"),
        Ok(())
    );
    rejects(
        "Bits<4> hi; Bits<4> lo; Bits<4> x; (hi, lo, x) = split(8'hA5);",
        "2 values assigned to 3 targets",
    );
    rejects("Bits<4> hi; Bits<4> lo; (hi, lo) = add_one(1);", "multi-value");
}

#[test]
fn return_is_only_valid_inside_functions() {
    rejects("return 1;", "return outside of a function body");
}

#[test]
fn function_bodies_are_checked_once_per_instantiation() {
    let program = parse_fragment(
        "f.idl",
        "Bits<4> a = ones<4>(); Bits<4> b = ones<4>(); \
         Bits<8> c = ones<8>(); Bits<8> d = add_one(c);",
    )
    .unwrap();
    let mut session = Session::new(global());
    session.type_check(&program).unwrap();
    assert_eq!(session.instantiation_count(), 3);
}

#[test]
fn function_body_errors_surface_at_the_first_call() {
    let isa = format!(
        "{ISA}
function broken {{
  returns Bits<8>
  body {{
    return undefined_name;
  }}
}}
"
    );
    let isa = parse_isa("isa.idl", &isa).unwrap();
    let global = build_global_scope(Arc::new(arch(Some(64))), Some(&isa), CheckerConfig::default())
        .expect("bodies are not checked while building the global scope");

    assert_eq!(check_fragment(&global, "Bits<8> a = add_one(1);"), Ok(()));
    let err = check_fragment(&global, "Bits<8> a = broken();").unwrap_err();
    assert!(err.starts_with("isa.idl:"), "{err}");
    assert!(err.contains("undefined symbol 'undefined_name'"));
}

#[test]
fn recursion_is_rejected() {
    let isa = parse_isa(
        "isa.idl",
        "
function down {
  returns Bits<8>
  arguments Bits<8> n
  body {
    return 0 if (n == 0);
    return down(n - 1);
  }
}
",
    )
    .unwrap();
    let global =
        build_global_scope(Arc::new(arch(Some(64))), Some(&isa), CheckerConfig::default()).unwrap();
    let err = check_fragment(&global, "Bits<8> a = down(3);").unwrap_err();
    assert!(err.contains("recursive call to 'down'"), "{err}");
}

#[test]
fn global_definitions_are_validated() {
    let build = |source: &str| {
        let isa = parse_isa("isa.idl", source).unwrap();
        build_global_scope(Arc::new(arch(Some(64))), Some(&isa), CheckerConfig::default())
            .map(|_| ())
            .map_err(|e| e.to_string())
    };

    assert!(build("Bits<8> lower = 1;").unwrap_err().contains("uppercase"));
    assert!(build("enum E { A B A }").unwrap_err().contains("A"));
    assert!(build("bitfield (8) B { X 7-0 Y 3-0 }").is_err());
    assert!(build("bitfield (4) B { X 7-0 }").is_err());
    assert!(build("enum E { A } enum E { B }").unwrap_err().contains("already defined"));
    assert!(build("Bits<8> A = 1; Bits<8> B = A + 1;").is_ok());
    assert!(build("function f { returns Undefined body { } }")
        .unwrap_err()
        .contains("undefined type"));
}

#[test]
fn enum_members_default_to_the_next_value() {
    let isa = parse_isa("isa.idl", "enum Level { LOW 4 MID HIGH 10 TOP }").unwrap();
    let global =
        build_global_scope(Arc::new(arch(Some(64))), Some(&isa), CheckerConfig::default()).unwrap();
    let program = parse_expression("e.idl", "{Level::MID, Level::TOP}").unwrap();
    let mut session = Session::new(global);
    // Enum references are not bit vectors.
    assert!(session.type_check(&program).is_err());

    let mid = parse_expression("e.idl", "$enum_to_a(Level)").unwrap();
    session.type_check(&mid).unwrap();
    assert_eq!(
        session.value(&mid).unwrap(),
        Value::Array(vec![Value::Int(4), Value::Int(5), Value::Int(10), Value::Int(11)])
    );
}

#[test]
fn short_circuit_skips_the_dead_operand_unless_strict() {
    let source = "Boolean b = false && missing == 1;";
    assert_eq!(check_fragment(&global(), source), Ok(()));

    let strict = CheckerConfig {
        strict_short_circuit: true,
        ..CheckerConfig::default()
    };
    let program = parse_fragment("f.idl", source).unwrap();
    let mut session = Session::with_config(global(), strict);
    let err = session.type_check(&program).unwrap_err();
    assert!(err.to_string().contains("undefined symbol 'missing'"));
}

#[test]
fn statically_dead_branches_are_not_checked() {
    assert_eq!(
        check_fragment(
            &global(),
            "if (XLEN == 32) { Bits<8> a = missing; } else { Bits<8> b = 1; }"
        ),
        Ok(())
    );
    assert_eq!(check_fragment(&global(), "missing = 1 if (XLEN == 32);"), Ok(()));
}

#[test]
fn executing_a_fragment_tracks_known_values() {
    let session = run_fragment(
        &global(),
        "
Bits<8> a = 5;
Bits<8> b = a + 3;
Bits<8> c;
c[3:0] = 4'hf;
Bits<4> hi;
Bits<4> lo;
(hi, lo) = split(8'hA5);
Entry e = 0;
e.PPN = 12'h123;
Bits<8> n = 0;
for (Bits<8> i = 0; i < 10; i++) {
  n = n + 2;
}
a++;
",
    );
    assert_eq!(session.var_value("a"), Some(Value::Int(6)));
    assert_eq!(session.var_value("b"), Some(Value::Int(8)));
    assert_eq!(session.var_value("c"), Some(Value::Int(15)));
    assert_eq!(session.var_value("hi"), Some(Value::Int(0xA)));
    assert_eq!(session.var_value("lo"), Some(Value::Int(0x5)));
    assert_eq!(session.var_value("e"), Some(Value::Int(0x1230)));
    assert_eq!(session.var_value("n"), Some(Value::Int(20)));
}

#[test]
fn unknown_conditions_forget_assigned_values() {
    let mut session = Session::new(global());
    session.add_decode_var("rd", 5).unwrap();
    let program = parse_fragment(
        "f.idl",
        "
Bits<8> a = 1;
Bits<8> b = 2;
Bits<8> c = 3;
if (rd == 0) {
  a = 7;
} else {
  b = 7;
}
c = 9 if (rd == 1);
Bits<8> d = rd;
",
    )
    .unwrap();
    session.type_check(&program).unwrap();
    session.execute(&program).unwrap();

    assert_eq!(session.var_value("a"), None);
    assert_eq!(session.var_value("b"), None);
    assert_eq!(session.var_value("c"), None);
    assert_eq!(session.var_value("d"), None);
}

#[test]
fn values_need_a_prior_type_check() {
    let program = parse_expression("e.idl", "1 + 1").unwrap();
    let mut session = Session::new(global());
    let err = session.value(&program).unwrap_err();
    assert!(err.is_internal());
    assert!(err.to_string().contains("before type_check"));
}
