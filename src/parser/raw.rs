use std::fmt;

use pest::iterators::Pair;

use super::parser::Rule;
use crate::ast::{BinaryOp, Span};

/// Node of the raw parse tree, before any typing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawKind {
    Rule(Rule),
    /// Produced by normalization from an operator chain.
    Binary(BinaryOp),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    pub kind: RawKind,
    /// Source text, kept for leaves only.
    pub text: String,
    pub span: Span,
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn from_pair(pair: Pair<'_, Rule>) -> Self {
        let (line, column) = pair.line_col();
        let rule = pair.as_rule();
        let text = pair.as_str();
        let children: Vec<RawNode> = pair.into_inner().map(RawNode::from_pair).collect();
        let text = if children.is_empty() {
            text.to_string()
        } else {
            String::new()
        };

        RawNode {
            kind: RawKind::Rule(rule),
            text,
            span: Span {
                line: line as u32,
                column: column as u32,
            },
            children,
        }
    }

    pub fn rule(&self) -> Option<Rule> {
        match self.kind {
            RawKind::Rule(rule) => Some(rule),
            RawKind::Binary(_) => None,
        }
    }

    pub fn is_rule(&self, rule: Rule) -> bool {
        self.rule() == Some(rule)
    }

    pub fn is_chain(&self) -> bool {
        self.rule().is_some_and(is_chain_rule)
    }
}

/// Operator-precedence levels written as `operand (op operand)*`.
pub fn is_chain_rule(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::logical_or
            | Rule::logical_and
            | Rule::bit_or
            | Rule::bit_xor
            | Rule::bit_and
            | Rule::equality
            | Rule::relational
            | Rule::shift
            | Rule::additive
            | Rule::multiplicative
    )
}

impl fmt::Display for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RawKind::Rule(rule) if self.children.is_empty() => {
                return write!(f, "{rule:?}({})", self.text);
            }
            RawKind::Rule(rule) => write!(f, "{rule:?}")?,
            RawKind::Binary(op) => write!(f, "`{}`", op.symbol())?,
        }
        if self.children.is_empty() {
            return Ok(());
        }
        write!(f, "[")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, "]")
    }
}
