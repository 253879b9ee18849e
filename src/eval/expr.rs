use std::cmp::Ordering;

use tracing::trace;

use super::coerce;
use crate::ast::literal::bit_length;
use crate::ast::{
    AstIdx, BinaryOp, BuiltinFunc, CsrMethod, Literal, LiteralWidth, NameIdx, Node, UnaryOp,
};
use crate::checker::expr::bits_width;
use crate::checker::Context;
use crate::error::{value_try, IdlError, InternalError, Result, ValueError};
use crate::symtab::{Symbol, Var, VarKind};
use crate::types::{Type, TypeKind, Width};
use crate::value::{
    extract, from_bits, shift_right_arithmetic, to_bits, truncate, Value, MAX_EVAL_WIDTH,
};

pub(crate) fn unknown(reason: &'static str) -> IdlError {
    ValueError::new(reason).into()
}

pub(crate) fn expect_int(value: Value) -> Result<i128> {
    match value {
        Value::Int(v) => Ok(v),
        other => Err(InternalError::new(format!("expected an integer, found {other}")).into()),
    }
}

pub(crate) fn expect_bool(value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(InternalError::new(format!("expected a Boolean, found {other}")).into()),
    }
}

/// Known width that the evaluator can fold.
pub(crate) fn eval_width(width: Width) -> Result<u32> {
    match width {
        Width::Known(w) if w <= MAX_EVAL_WIDTH => Ok(w),
        Width::Known(_) => Err(unknown("value is wider than 127 bits")),
        Width::Unknown => Err(unknown("width depends on the configuration")),
    }
}

fn shift_amount(amount: i128) -> Result<u32> {
    u32::try_from(amount).map_err(|_| unknown("negative shift amount"))
}

impl Context<'_> {
    /// Compile-time value of the rvalue at `at`, or a `ValueError` when it
    /// depends on something only known at run time.
    pub fn value(&mut self, at: AstIdx) -> Result<Value> {
        match self.node(at) {
            Node::IntLiteral(lit) => self.literal_value(lit),
            Node::BoolLiteral(b) => Ok(Value::Bool(*b)),
            Node::StringLiteral(s) => Ok(Value::String(self.name(*s).to_string())),
            Node::Id(name) => self.id_value(at, *name),
            Node::Paren(inner) => self.value(*inner),
            Node::Unary { op, operand } => self.unary_value(at, *op, *operand),
            Node::Binary { op, lhs, rhs } => self.binary_value(at, *op, *lhs, *rhs),
            Node::Ternary {
                cond,
                if_true,
                if_false,
            } => {
                if expect_bool(self.value(*cond)?)? {
                    self.value(*if_true)
                } else {
                    self.value(*if_false)
                }
            }
            Node::Concat(items) => {
                let mut bits = 0u128;
                let mut total = 0u32;
                for item in items {
                    let ty = self.type_of(*item)?;
                    let w = eval_width(bits_width(&ty))?;
                    let v = expect_int(self.value(*item)?)?;
                    total += w;
                    if total > MAX_EVAL_WIDTH {
                        return Err(unknown("value is wider than 127 bits"));
                    }
                    bits = (bits << w) | to_bits(v, w);
                }
                Ok(Value::Int(bits as i128))
            }
            Node::Replicate { count, expr } => {
                let n = expect_int(self.value(*count)?)?;
                let ty = self.type_of(*expr)?;
                let w = eval_width(bits_width(&ty))?;
                let v = to_bits(expect_int(self.value(*expr)?)?, w);
                let n = u32::try_from(n).map_err(|_| unknown("invalid replication count"))?;
                if u64::from(w) * u64::from(n) > u64::from(MAX_EVAL_WIDTH) {
                    return Err(unknown("value is wider than 127 bits"));
                }
                let bits = (0..n).fold(0u128, |acc, _| (acc << w) | v);
                Ok(Value::Int(bits as i128))
            }
            Node::BitExtract { expr, index } => self.bit_value(*expr, *index),
            Node::RangeExtract { expr, msb, lsb } => {
                let m = expect_int(self.value(*msb)?)?;
                let l = expect_int(self.value(*lsb)?)?;
                let ty = self.type_of(*expr)?;
                let w = eval_width(bits_width(&ty))?;
                let v = expect_int(self.value(*expr)?)?;
                let (m, l) = match (u32::try_from(m), u32::try_from(l)) {
                    (Ok(m), Ok(l)) if m >= l && m < w => (m, l),
                    _ => return Err(unknown("bit range out of bounds")),
                };
                Ok(Value::Int(extract(to_bits(v, w), m, l) as i128))
            }
            Node::FieldAccess { expr, field } => {
                let ty = self.type_of(*expr)?;
                let TypeKind::Bitfield(def) = &ty.kind else {
                    return Err(InternalError::new("field access on a non-bitfield").into());
                };
                let range = def
                    .field(self.name(*field))
                    .ok_or_else(|| InternalError::new("unknown bitfield field"))?;
                let v = expect_int(self.value(*expr)?)?;
                Ok(Value::Int(extract(to_bits(v, def.width), range.msb, range.lsb) as i128))
            }
            Node::EnumRef { enum_name, member } => {
                let def = self.enum_named(at, *enum_name)?;
                let value = def
                    .value_of(self.name(*member))
                    .ok_or_else(|| InternalError::new("unknown enum member"))?;
                Ok(Value::Int(i128::from(value)))
            }
            Node::Call {
                name,
                template_args,
                args,
            } => self.call_value(at, *name, template_args, args),
            Node::Builtin { func, args } => self.builtin_value(*func, args),
            Node::Implemented(ext) => {
                let ty = self.type_of(*ext)?;
                let TypeKind::EnumRef(def) = &ty.kind else {
                    return Err(InternalError::new("implemented? on a non-enum").into());
                };
                let index = expect_int(self.value(*ext)?)?;
                let name = u64::try_from(index)
                    .ok()
                    .and_then(|i| def.member_of(i))
                    .ok_or_else(|| unknown("not a known extension"))?;
                let arch = self.symtab().global().arch();
                match arch.extension(name).and_then(|ext| ext.implemented) {
                    Some(b) => Ok(Value::Bool(b)),
                    None => Err(unknown("extension support is left open by the configuration")),
                }
            }
            Node::XReg(_) => Err(unknown("register file contents are not known at compile time")),
            Node::Csr(_) | Node::CsrField { .. } => {
                Err(unknown("CSR contents are not known at compile time"))
            }
            Node::CsrMethodCall { csr, method, .. } => match method {
                CsrMethod::Address => {
                    let (info, _) = self.csr_of(*csr)?;
                    Ok(Value::Int(i128::from(info.address)))
                }
                CsrMethod::SwRead | CsrMethod::SwWrite => {
                    Err(unknown("CSR contents are not known at compile time"))
                }
            },
            other => Err(InternalError::new(format!("{} has no value", other.kind_name())).into()),
        }
    }

    fn literal_value(&self, lit: &Literal) -> Result<Value> {
        let width = match lit.width {
            LiteralWidth::Explicit(w) | LiteralWidth::Minimal(w) => w,
            LiteralWidth::Xlen => match self.symtab().xlen() {
                Some(w) => w,
                None if lit.signed => {
                    return Err(unknown("sign of an XLEN literal depends on the configuration"))
                }
                None => {
                    return i128::try_from(lit.magnitude)
                        .map(Value::Int)
                        .map_err(|_| unknown("value is wider than 127 bits"))
                }
            },
        };
        if width > MAX_EVAL_WIDTH && bit_length(lit.magnitude) > MAX_EVAL_WIDTH {
            return Err(unknown("value is wider than 127 bits"));
        }
        Ok(Value::Int(from_bits(lit.magnitude, width.min(128), lit.signed)))
    }

    fn id_value(&self, at: AstIdx, name: NameIdx) -> Result<Value> {
        let name = self.name(name);
        match self.symtab().get(name) {
            Some(Symbol::Var(var)) => var
                .value()
                .cloned()
                .ok_or_else(|| unknown("variable value is not known at compile time")),
            Some(_) => Err(unknown("symbol has no value")),
            None => Err(self.type_error(at, format!("undefined symbol '{name}'"))),
        }
    }

    fn unary_value(&mut self, at: AstIdx, op: UnaryOp, operand: AstIdx) -> Result<Value> {
        let v = self.value(operand)?;
        if op == UnaryOp::Not {
            return Ok(Value::Bool(!expect_bool(v)?));
        }

        let ty = self.type_of(at)?;
        let w = eval_width(bits_width(&ty))?;
        let v = expect_int(v)?;
        let result = match op {
            UnaryOp::Neg => v.checked_neg().ok_or_else(|| unknown("arithmetic overflow"))?,
            _ => !v,
        };
        Ok(Value::Int(truncate(result, w, ty.is_signed())))
    }

    fn binary_value(
        &mut self,
        at: AstIdx,
        op: BinaryOp,
        lhs: AstIdx,
        rhs: AstIdx,
    ) -> Result<Value> {
        if op.is_logical() {
            let l = expect_bool(self.value(lhs)?)?;
            return match (op, l) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(expect_bool(self.value(rhs)?)?)),
            };
        }

        let l = self.value(lhs)?;
        let r = self.value(rhs)?;

        if op.is_equality() {
            let equal = l == r;
            return Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }));
        }
        if op.is_relational() {
            let ordering = expect_int(l)?.cmp(&expect_int(r)?);
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }

        let ty = self.type_of(at)?;
        let w = eval_width(bits_width(&ty))?;
        let signed = ty.is_signed();
        let (a, b) = (expect_int(l)?, expect_int(r)?);
        let overflow = || unknown("arithmetic overflow");

        let result = match op {
            BinaryOp::Add | BinaryOp::WideAdd => a.checked_add(b).ok_or_else(overflow)?,
            BinaryOp::Sub | BinaryOp::WideSub => a.checked_sub(b).ok_or_else(overflow)?,
            BinaryOp::Mul | BinaryOp::WideMul => a.checked_mul(b).ok_or_else(overflow)?,
            BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                trace!(line = self.pool.span(at).line, "division by zero folded to unknown");
                return Err(unknown("division by zero"));
            }
            BinaryOp::Div => a.checked_div(b).ok_or_else(overflow)?,
            BinaryOp::Rem => a.checked_rem(b).ok_or_else(overflow)?,
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            BinaryOp::BitXor => a ^ b,
            BinaryOp::Shl | BinaryOp::WideShl => {
                let amount = shift_amount(b)?;
                if amount >= w {
                    0
                } else {
                    ((a as u128) << amount) as i128
                }
            }
            BinaryOp::Shr => {
                let amount = shift_amount(b)?;
                if amount >= w {
                    0
                } else {
                    (to_bits(a, w) >> amount) as i128
                }
            }
            BinaryOp::Sar => {
                let amount = shift_amount(b)?;
                from_bits(shift_right_arithmetic(to_bits(a, w), w, amount), w, signed)
            }
            _ => {
                return Err(
                    InternalError::new(format!("unexpected operator {}", op.symbol())).into()
                );
            }
        };
        Ok(Value::Int(truncate(result, w, signed)))
    }

    fn bit_value(&mut self, expr: AstIdx, index: AstIdx) -> Result<Value> {
        let i = expect_int(self.value(index)?)?;
        let ty = self.type_of(expr)?;
        let base = self.value(expr)?;

        if let Value::Array(items) = base {
            return usize::try_from(i)
                .ok()
                .and_then(|i| items.into_iter().nth(i))
                .ok_or_else(|| unknown("array index out of range"));
        }

        let w = eval_width(bits_width(&ty))?;
        let bit = u32::try_from(i)
            .ok()
            .filter(|bit| *bit < w)
            .ok_or_else(|| unknown("bit index out of range"))?;
        Ok(Value::Int(extract(to_bits(expect_int(base)?, w), bit, bit) as i128))
    }

    fn builtin_value(&mut self, func: BuiltinFunc, args: &[AstIdx]) -> Result<Value> {
        let arg = *args
            .first()
            .ok_or_else(|| InternalError::new(format!("{} without arguments", func.name())))?;

        match func {
            BuiltinFunc::Bits => {
                let ty = self.type_of(arg)?;
                let w = eval_width(bits_width(&ty))?;
                let v = expect_int(self.value(arg)?)?;
                Ok(Value::Int(to_bits(v, w) as i128))
            }
            BuiltinFunc::Signed => {
                let ty = self.type_of(arg)?;
                let w = eval_width(bits_width(&ty))?;
                let v = expect_int(self.value(arg)?)?;
                Ok(Value::Int(from_bits(to_bits(v, w), w, true)))
            }
            BuiltinFunc::EnumSize => {
                let ty = self.type_of(arg)?;
                let TypeKind::Enum(def) = &ty.kind else {
                    return Err(InternalError::new("$enum_size of a non-enum").into());
                };
                Ok(Value::Int(def.members.len() as i128))
            }
            BuiltinFunc::EnumElementSize => {
                let ty = self.type_of(arg)?;
                let TypeKind::Enum(def) = &ty.kind else {
                    return Err(InternalError::new("$enum_element_size of a non-enum").into());
                };
                Ok(Value::Int(i128::from(def.width())))
            }
            BuiltinFunc::Enum => {
                let ty = self.type_of(arg)?;
                let TypeKind::Enum(def) = &ty.kind else {
                    return Err(InternalError::new("$enum of a non-enum").into());
                };
                let value = *args
                    .get(1)
                    .ok_or_else(|| InternalError::new("$enum without a value"))?;
                let v = expect_int(self.value(value)?)?;
                match u64::try_from(v).ok().and_then(|v| def.member_of(v)) {
                    Some(_) => Ok(Value::Int(v)),
                    None => Err(unknown("value is not a member of the enum")),
                }
            }
            BuiltinFunc::ArraySize => {
                let ty = self.type_of(arg)?;
                match &ty.kind {
                    TypeKind::Array { len, .. } => Ok(Value::Int(*len as i128)),
                    _ => Err(InternalError::new("$array_size of a non-array").into()),
                }
            }
            BuiltinFunc::EnumToA => {
                let ty = self.type_of(arg)?;
                let TypeKind::Enum(def) = &ty.kind else {
                    return Err(InternalError::new("$enum_to_a of a non-enum").into());
                };
                Ok(Value::Array(
                    def.members
                        .iter()
                        .map(|(_, v)| Value::Int(i128::from(*v)))
                        .collect(),
                ))
            }
        }
    }

    /// Runs a user function at compile time. Arguments whose value is not
    /// known are bound as unknown, so the call only fails when the result
    /// actually depends on them.
    fn call_value(
        &mut self,
        at: AstIdx,
        name: NameIdx,
        template_args: &[AstIdx],
        args: &[AstIdx],
    ) -> Result<Value> {
        let def = self.lookup_function(at, name)?;
        let Some(body) = &def.body else {
            return Err(unknown("builtin functions have no compile-time value"));
        };

        let template = self.template_values(at, &def, template_args)?;
        let sig = self.instantiate(&def, &template)?;

        let mut arg_values = Vec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(&sig.args) {
            arg_values.push(value_try(self.value(*arg))?.map(|v| coerce(v, ty)));
        }

        let mut symtab = self.symtab().global_clone();
        symtab.push();
        let result = self.with_symtab(symtab, |ctx| {
            let mut inner = ctx.over(&def.pool);
            inner.bind_template(&def, &template)?;
            for ((arg, ty), value) in def.arguments.iter().zip(&sig.args).zip(arg_values) {
                let var = Var::new(inner.name(arg.name), ty.clone(), value)
                    .with_kind(VarKind::Argument);
                inner.declare(arg.ty, var)?;
            }
            inner.return_value_block(body)
        })?;

        match (result, sig.returns.as_slice()) {
            (None, []) | (Some(Value::Void), []) => Ok(Value::Void),
            (None, _) => Err(unknown("function did not reach a return")),
            (Some(Value::Tuple(values)), returns) if returns.len() > 1 => Ok(Value::Tuple(
                values
                    .into_iter()
                    .zip(returns)
                    .map(|(v, ty)| coerce(v, ty))
                    .collect(),
            )),
            (Some(value), [ty]) => Ok(coerce(value, ty)),
            (Some(value), _) => Err(InternalError::new(format!(
                "function '{}' returned {value}, which does not match its signature",
                def.name
            ))
            .into()),
        }
    }
}

/// Bits of `value` as stored in a location of type `ty`.
pub(crate) fn stored_bits(value: i128, ty: &Type) -> Result<u128> {
    let w = eval_width(bits_width(ty))?;
    Ok(to_bits(value, w))
}
