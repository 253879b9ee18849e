//! Left-recursion fix-up.
//!
//! The grammar writes every binary precedence level as a flat chain
//! `a op b op c`. This pass folds each chain left to right into nested
//! [`RawKind::Binary`] nodes, giving `((a op b) op c)`, and collapses
//! single-operand chains into their operand. It is a pure transform: the
//! input tree is consumed and a new one returned.

use super::error::{error_with_location, Result};
use super::raw::{RawKind, RawNode};
use crate::ast::BinaryOp;

pub fn normalize(node: RawNode, input: &str) -> Result<RawNode> {
    let RawNode {
        kind,
        text,
        span,
        children,
    } = node;

    let children = children
        .into_iter()
        .map(|child| normalize(child, input))
        .collect::<Result<Vec<_>>>()?;

    let node = RawNode {
        kind,
        text,
        span,
        children,
    };

    if node.is_chain() {
        fold_chain(node, input)
    } else {
        Ok(node)
    }
}

/// True when no operator chain is left anywhere in the tree.
pub fn is_normalized(node: &RawNode) -> bool {
    !node.is_chain() && node.children.iter().all(is_normalized)
}

fn fold_chain(node: RawNode, input: &str) -> Result<RawNode> {
    let span = node.span;
    let mut parts = node.children.into_iter();

    let mut acc = parts
        .next()
        .ok_or_else(|| error_with_location(input, span, "Operator chain has no operands"))?;

    while let Some(op) = parts.next() {
        let binary_op = BinaryOp::from_symbol(&op.text).ok_or_else(|| {
            error_with_location(input, op.span, &format!("Unknown operator '{}'", op.text))
        })?;

        let rhs = parts.next().ok_or_else(|| {
            error_with_location(
                input,
                op.span,
                &format!("Operator '{}' is missing its right operand", op.text),
            )
        })?;

        acc = RawNode {
            kind: RawKind::Binary(binary_op),
            text: String::new(),
            span: acc.span,
            children: vec![acc, rhs],
        };
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use pest::Parser;

    use super::*;
    use crate::parser::parser::{IdlParser, Rule};

    fn raw(input: &str) -> RawNode {
        let pair = IdlParser::parse(Rule::expression_fragment, input)
            .unwrap()
            .next()
            .unwrap();
        RawNode::from_pair(pair)
    }

    fn binary_shape(node: &RawNode) -> String {
        match &node.kind {
            RawKind::Binary(op) => format!(
                "({} {} {})",
                binary_shape(&node.children[0]),
                op.symbol(),
                binary_shape(&node.children[1])
            ),
            _ if node.children.len() == 1 => binary_shape(&node.children[0]),
            _ => node.text.clone(),
        }
    }

    #[test]
    fn subtraction_folds_left() {
        let tree = normalize(raw("4 - 3 - 1"), "4 - 3 - 1").unwrap();
        assert_eq!(binary_shape(&tree.children[0]), "((4 - 3) - 1)");
    }

    #[test]
    fn precedence_levels_nest() {
        let input = "a + b * c << 2";
        let tree = normalize(raw(input), input).unwrap();
        assert_eq!(binary_shape(&tree.children[0]), "((a + (b * c)) << 2)");
    }

    #[test]
    fn operands_are_normalized_first() {
        let input = "(8 - 4 - 2) - 1";
        let tree = normalize(raw(input), input).unwrap();
        assert!(is_normalized(&tree));
    }

    #[test]
    fn raw_tree_is_not_normalized() {
        assert!(!is_normalized(&raw("1 - 2")));
    }

    #[test]
    fn normalization_reaches_a_fixed_point() {
        let input = "1 - 2 - 3 == 4 && 5 | 6";
        let once = normalize(raw(input), input).unwrap();
        let twice = normalize(once.clone(), input).unwrap();
        assert_eq!(once, twice);
    }
}
