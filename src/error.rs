use std::borrow::Cow;
use std::sync::Arc;

use thiserror::Error;

use crate::parser::error::ParserError;

/// User-facing static error: undefined symbols, shape and width mismatches,
/// illegal redeclaration, writes to read-only targets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{file}:{line}:{column}: {message}")]
pub struct TypeError {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// "Not known at compile time." Raised constantly while checking and caught
/// wherever a fallback exists, so it carries no location and no allocation in
/// the common case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value not known at compile time: {reason}")]
pub struct ValueError {
    pub reason: Cow<'static, str>,
}

impl ValueError {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A contract violation inside the analyzer or evaluator. Never the user's
/// fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("internal error: {0}")]
pub struct InternalError(pub String);

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug)]
pub enum IdlError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Internal(#[from] InternalError),

    #[error(transparent)]
    Parse(#[from] ParserError),
}

impl IdlError {
    pub fn is_type_error(&self) -> bool {
        matches!(self, IdlError::Type(_))
    }

    pub fn is_value_error(&self) -> bool {
        matches!(self, IdlError::Value(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, IdlError::Internal(_))
    }

    pub fn as_type_error(&self) -> Option<&TypeError> {
        match self {
            IdlError::Type(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IdlError>;

/// Turns "not known at compile time" into `None` and passes every other
/// outcome through.
pub fn value_try<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(IdlError::Value(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_try_only_swallows_value_errors() {
        assert_eq!(value_try(Ok::<_, IdlError>(3)).unwrap(), Some(3));

        let unknown: Result<u8> = Err(ValueError::new("x").into());
        assert_eq!(value_try(unknown).unwrap(), None);

        let internal: Result<u8> = Err(InternalError::new("boom").into());
        assert!(value_try(internal).unwrap_err().is_internal());
    }

    #[test]
    fn type_error_display_carries_location() {
        let err = TypeError {
            file: "inst.idl".into(),
            line: 3,
            column: 7,
            message: "undefined symbol 'foo'".to_string(),
        };
        assert_eq!(err.to_string(), "inst.idl:3:7: undefined symbol 'foo'");
    }
}
