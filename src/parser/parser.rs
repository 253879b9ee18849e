use pest::Parser;
use pest_derive::Parser;
use tracing::trace;

use super::error::ParserError;
use super::lower::Lowerer;
use super::normalize::normalize;
use super::raw::RawNode;
use crate::ast::{AstIdx, Program};
use crate::error::Result;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct IdlParser;

/// Raw parse tree for `rule`, before normalization.
pub fn parse_raw(rule: Rule, input: &str) -> std::result::Result<RawNode, ParserError> {
    let mut pairs = IdlParser::parse(rule, input)?;
    let pair = pairs.next().ok_or(ParserError::UnexpectedRule(rule))?;
    Ok(RawNode::from_pair(pair))
}

/// Global definitions: enums, bitfields, functions and constants.
pub fn parse_isa(file: &str, input: &str) -> Result<Program> {
    parse_with(file, input, Rule::isa, Lowerer::lower_isa)
}

/// Statement list, such as an instruction's operation or a CSR field's
/// behavior.
pub fn parse_fragment(file: &str, input: &str) -> Result<Program> {
    parse_with(file, input, Rule::fragment, Lowerer::lower_fragment)
}

pub fn parse_expression(file: &str, input: &str) -> Result<Program> {
    parse_with(
        file,
        input,
        Rule::expression_fragment,
        Lowerer::lower_expression_fragment,
    )
}

fn parse_with<'i>(
    file: &str,
    input: &'i str,
    rule: Rule,
    lower: impl FnOnce(&mut Lowerer<'i>, &RawNode) -> Result<AstIdx>,
) -> Result<Program> {
    let raw = parse_raw(rule, input)?;
    let normalized = normalize(raw, input)?;

    let mut lowerer = Lowerer::new(file, input);
    let root = lower(&mut lowerer, &normalized)?;
    let pool = lowerer.finish();

    trace!(file, nodes = pool.len(), "parsed {rule:?}");
    Ok(Program::new(pool, root))
}
