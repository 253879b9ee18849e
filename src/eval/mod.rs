//! Compile-time evaluation.
//!
//! `value` computes the value of an rvalue or fails with a `ValueError`,
//! `execute` applies a statement to the current scope and `return_value`
//! runs a function body until it produces a result. All three assume the
//! subtree has already passed `type_check` under an equivalent scope.

pub mod expr;
pub mod stmt;

use crate::ast::{AstIdx, Capabilities};
use crate::checker::Context;
use crate::error::{InternalError, Result};
use crate::types::{Type, TypeKind, Width};
use crate::value::{truncate, Value, MAX_EVAL_WIDTH};

/// Wraps `value` into the representable range of `ty`.
pub fn coerce(value: Value, ty: &Type) -> Value {
    match (value, &ty.kind) {
        (Value::Int(v), TypeKind::Bits(Width::Known(w))) if *w <= MAX_EVAL_WIDTH => {
            Value::Int(truncate(v, *w, ty.is_signed()))
        }
        (Value::Int(v), TypeKind::Bitfield(def)) if def.width <= MAX_EVAL_WIDTH => {
            Value::Int(truncate(v, def.width, false))
        }
        (Value::Array(items), TypeKind::Array { elem, .. }) => {
            Value::Array(items.into_iter().map(|item| coerce(item, elem)).collect())
        }
        (value, _) => value,
    }
}

fn require(ctx: &Context<'_>, at: AstIdx, capability: Capabilities, what: &str) -> Result<()> {
    let node = ctx.node(at);
    if !node.capabilities().contains(capability) {
        return Err(InternalError::new(format!("{} is not {what}", node.kind_name())).into());
    }
    if !ctx.is_checked(at) {
        return Err(InternalError::new(format!(
            "{} evaluated before type_check",
            node.kind_name()
        ))
        .into());
    }
    Ok(())
}

/// Nodes with a type and, possibly, a compile-time value.
pub trait Rvalue {
    fn type_in(self, ctx: &mut Context<'_>) -> Result<Type>;
    fn value_in(self, ctx: &mut Context<'_>) -> Result<Value>;
}

/// Statements that update the scope they run in.
pub trait Executable {
    fn execute_in(self, ctx: &mut Context<'_>) -> Result<()>;
}

/// Statements that may end a function body with a value.
pub trait Returns {
    fn return_value_in(self, ctx: &mut Context<'_>) -> Result<Option<Value>>;
}

impl Rvalue for AstIdx {
    fn type_in(self, ctx: &mut Context<'_>) -> Result<Type> {
        require(ctx, self, Capabilities::RVALUE, "an rvalue")?;
        ctx.type_of(self)
    }

    fn value_in(self, ctx: &mut Context<'_>) -> Result<Value> {
        require(ctx, self, Capabilities::RVALUE, "an rvalue")?;
        ctx.value(self)
    }
}

impl Executable for AstIdx {
    fn execute_in(self, ctx: &mut Context<'_>) -> Result<()> {
        require(ctx, self, Capabilities::EXECUTABLE, "executable")?;
        ctx.execute(self)
    }
}

impl Returns for AstIdx {
    fn return_value_in(self, ctx: &mut Context<'_>) -> Result<Option<Value>> {
        require(ctx, self, Capabilities::RETURNS, "a returning statement")?;
        ctx.return_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Qualifiers;

    #[test]
    fn coerce_wraps_to_declared_width() {
        assert_eq!(coerce(Value::Int(300), &Type::bits(8)), Value::Int(44));
        let signed = Type::bits(4).qualify(Qualifiers::SIGNED);
        assert_eq!(coerce(Value::Int(13), &signed), Value::Int(-3));
        assert_eq!(coerce(Value::Int(-1), &Type::bits(4)), Value::Int(15));
    }

    #[test]
    fn coerce_recurses_into_arrays() {
        let ty = Type::array(Type::bits(2), 2);
        let value = Value::Array(vec![Value::Int(5), Value::Int(2)]);
        assert_eq!(
            coerce(value, &ty),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn coerce_leaves_other_values_alone() {
        assert_eq!(coerce(Value::Bool(true), &Type::boolean()), Value::Bool(true));
        assert_eq!(
            coerce(Value::Int(1 << 40), &Type::bits_of(Width::Unknown)),
            Value::Int(1 << 40)
        );
    }
}
