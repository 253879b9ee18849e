mod common;

use common::{eval, eval_in, global_for, int};
use idlc::Value;

#[test]
fn arithmetic_wraps_to_operand_width() {
    assert_eq!(int("8'd200 + 8'd100"), 44);
    assert_eq!(int("8'd200 `+ 8'd100"), 300);
    assert_eq!(int("8'd3 - 8'd5"), 254);
    assert_eq!(int("8'd20 `* 8'd20"), 400);
    assert_eq!(int("8'd7 % 8'd3"), 1);
}

#[test]
fn negation_and_inversion_keep_twos_complement_patterns() {
    assert_eq!(int("-4'sd13"), 3);
    assert_eq!(int("-8'd1"), 255);
    assert_eq!(int("~4'b0101"), 10);
    assert_eq!(int("$signed(4'b1111)"), -1);
    assert_eq!(int("$bits(4'sd15)"), 15);
}

#[test]
fn shifts_follow_operand_width() {
    assert_eq!(int("8'hf0 >> 4"), 15);
    assert_eq!(int("4'sb1000 >>> 1"), -4);
    assert_eq!(int("4'b1000 >>> 1"), 12);
    // A known shift amount widens the result.
    assert_eq!(int("1 << 3"), 8);
    assert_eq!(int("4'b1111 << 4"), 240);
}

#[test]
fn subtraction_chains_associate_left() {
    assert_eq!(int("8'd20 - 8'd5 - 8'd3"), 12);
    assert_eq!(int("8'd64 / 8'd4 / 8'd2"), 8);
}

#[test]
fn concatenation_and_replication_build_bit_patterns() {
    assert_eq!(int("{4'hA, 4'h5}"), 0xA5);
    assert_eq!(int("{2{2'b10}}"), 0b1010);
    assert_eq!(int("{1'b1, {3{1'b0}}}"), 8);
}

#[test]
fn comparisons_and_logic_produce_booleans() {
    assert_eq!(eval("8'd5 == 8'd5").unwrap(), Value::Bool(true));
    assert_eq!(eval("4'd3 < 4'd5").unwrap(), Value::Bool(true));
    assert_eq!(eval("4'd3 >= 4'd5").unwrap(), Value::Bool(false));
    assert_eq!(eval("!(1 == 1) || 2 != 3").unwrap(), Value::Bool(true));
    assert_eq!(int("true ? 8'd1 : 8'd2"), 1);
}

#[test]
fn division_by_zero_is_not_a_compile_time_value() {
    assert!(eval("8'd7 / 8'd0").unwrap_err().is_value_error());
    assert!(eval("8'd7 % 8'd0").unwrap_err().is_value_error());
}

#[test]
fn global_constants_and_parameters() {
    assert_eq!(int("LIMIT"), 200);
    assert_eq!(int("PAGE"), 400);
    assert_eq!(int("NUM_PMP"), 16);
    assert_eq!(int("XLEN"), 64);
    assert!(eval("PHYS_ADDR_WIDTH").unwrap_err().is_value_error());
}

#[test]
fn enums_and_builtins() {
    assert_eq!(int("Mode::M"), 3);
    assert_eq!(int("$enum_size(Mode)"), 3);
    assert_eq!(int("$enum_element_size(Mode)"), 2);
    assert_eq!(int("$enum(Mode, 1)"), 1);
    assert!(eval("$enum(Mode, 2)").unwrap_err().is_value_error());
    assert_eq!(
        eval("$enum_to_a(Mode)").unwrap(),
        Value::Array(vec![Value::Int(3), Value::Int(1), Value::Int(0)])
    );
    assert_eq!(int("ExceptionCode::IllegalInstruction"), 2);
}

#[test]
fn extension_support_comes_from_the_configuration() {
    assert_eq!(eval("implemented?(ExtensionName::F)").unwrap(), Value::Bool(true));
    assert_eq!(eval("implemented?(ExtensionName::H)").unwrap(), Value::Bool(false));
    assert!(eval("implemented?(ExtensionName::V)").unwrap_err().is_value_error());
}

#[test]
fn function_calls_run_at_compile_time() {
    assert_eq!(int("add_one(8'd41)"), 42);
    assert_eq!(int("add_one(8'd255)"), 0);
    assert_eq!(int("ones<4>()"), 15);
    assert_eq!(int("ones<(4'd2 + 4'd3)>()"), 31);
    assert_eq!(int("sum_below(8'd5)"), 10);
    assert_eq!(int("clamp(8'd250)"), 200);
    assert_eq!(int("clamp(8'd7)"), 7);
    assert_eq!(
        eval("split(8'hA5)").unwrap(),
        Value::Tuple(vec![Value::Int(0xA), Value::Int(0x5)])
    );
}

#[test]
fn builtin_functions_and_machine_state_are_unknown() {
    assert!(eval("read_memory(64'd0)").unwrap_err().is_value_error());
    assert!(eval("CSR[mstatus].MIE").unwrap_err().is_value_error());
    assert!(eval("X[1]").unwrap_err().is_value_error());
    assert_eq!(int("CSR[mstatus].address()"), 0x300);
}

#[test]
fn xlen_literals_depend_on_the_configuration() {
    let open = global_for(None);
    assert!(eval_in(&open, "XLEN").unwrap_err().is_value_error());
    assert_eq!(eval_in(&open, "XLEN'd5").unwrap(), Value::Int(5));
    assert!(eval_in(&open, "XLEN'sd5").unwrap_err().is_value_error());

    let rv32 = global_for(Some(32));
    assert_eq!(eval_in(&rv32, "XLEN'hffffffff + 1").unwrap(), Value::Int(0));
}

#[test]
fn values_wider_than_the_evaluator_are_unknown() {
    assert!(eval("{64'd1, 64'd1}").unwrap_err().is_value_error());
    assert_eq!(int("{63'd0, 64'd1}"), 1);
}
