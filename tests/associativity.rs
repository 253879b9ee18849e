mod common;

use idlc::{parse_expression, parse_fragment, PrettyPrinter, PrintConfig};
use proptest::prelude::*;

fn parenthesized(source: &str) -> String {
    let program = parse_expression("p.idl", source).unwrap();
    let config = PrintConfig {
        parenthesize_binary: true,
        ..PrintConfig::default()
    };
    PrettyPrinter::with_config(&program.pool, config).print_node(program.root)
}

fn additive_op() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("+"), Just("-")]
}

proptest! {
    #[test]
    fn same_precedence_chains_fold_left(
        first in 0u16..1000,
        rest in prop::collection::vec((additive_op(), 0u16..1000), 1..8),
    ) {
        let mut source = format!("16'd{first}");
        let mut expected = format!("16'd{first}");
        let mut value = first;
        for (op, operand) in &rest {
            source.push_str(&format!(" {op} 16'd{operand}"));
            expected = format!("({expected} {op} 16'd{operand})");
            value = match *op {
                "+" => value.wrapping_add(*operand),
                _ => value.wrapping_sub(*operand),
            };
        }

        prop_assert_eq!(parenthesized(&source), expected);
        prop_assert_eq!(common::int(&source), i128::from(value));
    }

    #[test]
    fn printed_fragments_reparse_to_the_same_text(
        values in prop::collection::vec(0u8..=255, 1..6),
    ) {
        let mut source = String::new();
        for (i, v) in values.iter().enumerate() {
            source.push_str(&format!("Bits<8> v{i} = {v} - v{i} >> 1;\n"));
        }
        let printed = parse_fragment("p.idl", &source).unwrap().to_string();
        let reprinted = parse_fragment("p.idl", &printed).unwrap().to_string();
        prop_assert_eq!(printed, reprinted);
    }
}

#[test]
fn precedence_levels_nest_correctly() {
    assert_eq!(parenthesized("a + b * c"), "(a + (b * c))");
    assert_eq!(parenthesized("a | b ^ c & d"), "(a | (b ^ (c & d)))");
    assert_eq!(parenthesized("a == b && c < d"), "((a == b) && (c < d))");
    assert_eq!(parenthesized("a << 1 >> 2"), "((a << 1) >> 2)");
    assert_eq!(parenthesized("(a - b) - (c - d)"), "(((a - b)) - ((c - d)))");
}
