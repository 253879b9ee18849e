use pest::error::Error as PestError;
use thiserror::Error;

use super::parser::Rule;
use crate::ast::literal::LiteralError;
use crate::ast::Span;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Syntax error: {0}")]
    PestError(#[from] Box<PestError<Rule>>),

    #[error("Invalid literal '{text}' at line {line}, column {column}: {source}")]
    InvalidLiteral {
        text: String,
        line: u32,
        column: u32,
        source: LiteralError,
    },

    #[error(
        "Cannot assign to {0} - only variables, bit/range extractions, fields, CSR fields and \
         X registers are writable"
    )]
    InvalidAssignmentTarget(&'static str),

    #[error("Unexpected syntax element: {0:?}")]
    UnexpectedRule(Rule),

    #[error("Parsing error at line {line}, column {column}: {message}")]
    CustomError {
        line: u32,
        column: u32,
        message: String,
    },
}

impl From<PestError<Rule>> for ParserError {
    fn from(err: PestError<Rule>) -> Self {
        ParserError::PestError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ParserError>;

/// Builds an error message that quotes the offending source line with a
/// caret under the column.
pub fn error_with_location(input: &str, span: Span, message: &str) -> ParserError {
    let line = span.line.max(1);
    let column = span.column.max(1);
    let error_line = input.lines().nth(line as usize - 1).unwrap_or("");
    let pointer = " ".repeat(column as usize - 1) + "^";

    let detailed_message = format!("{message}\nIn line {line}:\n{error_line}\n{pointer}\n");

    ParserError::CustomError {
        line,
        column,
        message: detailed_message,
    }
}
