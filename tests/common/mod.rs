#![allow(dead_code)]

use std::sync::Arc;

use idlc::types::BitRange;
use idlc::{
    build_global_scope, parse_expression, parse_fragment, parse_isa, ArchConfig, CheckerConfig,
    CsrField, CsrInfo, CsrLength, FieldAccess, FieldLocation, GlobalScope, IdlError, Session, Type,
    Value,
};

pub const ISA: &str = r#"
enum Mode {
  M 3
  S 1
  U 0
}

bitfield (16) Entry {
  PPN 15-4
  FLAGS 3-0
}

Bits<8> LIMIT = 200;
Bits<16> PAGE = LIMIT `* 2;

function add_one {
  returns Bits<8>
  arguments Bits<8> x
  description {
    Increments its argument, wrapping at 8 bits.
  }
  body {
    return x + 1;
  }
}

function ones {
  template Bits<8> N
  returns Bits<N>
  body {
    return {N{1'b1}};
  }
}

function split {
  returns Bits<4>, Bits<4>
  arguments Bits<8> x
  body {
    return x[7:4], x[3:0];
  }
}

function sum_below {
  returns Bits<16>
  arguments Bits<8> n
  body {
    Bits<16> sum = 0;
    for (Bits<8> i = 0; i < n; i++) {
      sum = sum + i;
    }
    return sum;
  }
}

function clamp {
  returns Bits<8>
  arguments Bits<8> x
  body {
    return LIMIT if (x > LIMIT);
    return x;
  }
}

builtin function read_memory {
  returns Bits<64>
  arguments Bits<64> addr
}
"#;

pub fn arch(xlen: Option<u32>) -> ArchConfig {
    let mut builder = ArchConfig::builder()
        .param("NUM_PMP", Type::bits(7), Value::Int(16))
        .open_param("PHYS_ADDR_WIDTH", Type::bits(7))
        .extension("F", Some(true))
        .extension("V", None)
        .extension("H", Some(false))
        .exception_code("IllegalInstruction", 2)
        .interrupt_code("MachineTimer", 7)
        .csr(
            CsrInfo::new("mstatus", 0x300, CsrLength::Xlen).field(CsrField::new(
                "MIE",
                FieldLocation::Fixed(BitRange::single(3)),
                FieldAccess::ReadWrite,
            )),
        )
        .csr(
            CsrInfo::new("misa", 0x301, CsrLength::Xlen)
                .field(CsrField::new(
                    "MXL",
                    FieldLocation::PerBase {
                        rv32: BitRange::try_new(31, 30).unwrap(),
                        rv64: BitRange::try_new(63, 62).unwrap(),
                    },
                    FieldAccess::ReadOnly,
                ))
                .field(
                    CsrField::new(
                        "EXT",
                        FieldLocation::Fixed(BitRange::try_new(25, 0).unwrap()),
                        FieldAccess::ReadWriteR,
                    )
                    .unimplemented(),
                ),
        );
    if let Some(xlen) = xlen {
        builder = builder.xlen(xlen);
    }
    builder.build()
}

pub fn global_for(xlen: Option<u32>) -> Arc<GlobalScope> {
    let isa = parse_isa("isa.idl", ISA).unwrap();
    build_global_scope(Arc::new(arch(xlen)), Some(&isa), CheckerConfig::default()).unwrap()
}

pub fn global() -> Arc<GlobalScope> {
    global_for(Some(64))
}

/// Type-checks and evaluates an expression in a fresh session.
pub fn eval_in(global: &Arc<GlobalScope>, source: &str) -> Result<Value, IdlError> {
    let program = parse_expression("expr.idl", source)?;
    let mut session = Session::new(Arc::clone(global));
    session.type_check(&program)?;
    session.value(&program)
}

pub fn eval(source: &str) -> Result<Value, IdlError> {
    eval_in(&global(), source)
}

pub fn int(source: &str) -> i128 {
    match eval(source) {
        Ok(Value::Int(v)) => v,
        other => panic!("{source}: expected an integer, got {other:?}"),
    }
}

/// Type-checks a fragment, returning the first error message.
pub fn check_fragment(global: &Arc<GlobalScope>, source: &str) -> Result<(), String> {
    let program = parse_fragment("frag.idl", source).map_err(|e| e.to_string())?;
    let mut session = Session::new(Arc::clone(global));
    session.type_check(&program).map_err(|e| e.to_string())
}

/// Checks and executes a fragment, returning the session for inspection.
pub fn run_fragment(global: &Arc<GlobalScope>, source: &str) -> Session {
    let program = parse_fragment("frag.idl", source).unwrap();
    let mut session = Session::new(Arc::clone(global));
    session.type_check(&program).unwrap();
    session.execute(&program).unwrap();
    session
}
