use std::sync::Arc;

use tracing::trace;

use super::Context;
use crate::arch::CsrInfo;
use crate::ast::literal::bit_length;
use crate::ast::{
    AstIdx, BinaryOp, BuiltinFunc, CsrMethod, CsrSelector, Literal, LiteralWidth, NameIdx, Node,
    UnaryOp,
};
use crate::error::{value_try, IdlError, InternalError, Result};
use crate::symtab::Symbol;
use crate::types::{EnumDef, Qualifiers, Type, TypeKind, Width};
use crate::value::Value;

/// Width of a bit-vector-like type, unknown for anything else.
pub(crate) fn bits_width(ty: &Type) -> Width {
    ty.width().unwrap_or(Width::Unknown)
}

fn is_orderable(ty: &Type) -> bool {
    ty.is_integral() || ty.is_bits_like()
}

fn const_if(cond: bool) -> Qualifiers {
    if cond {
        Qualifiers::CONST
    } else {
        Qualifiers::empty()
    }
}

impl Context<'_> {
    pub(crate) fn check_expr(&mut self, at: AstIdx) -> Result<()> {
        match self.node(at) {
            Node::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
            } => self.check_logical(*op, *lhs, *rhs)?,
            Node::Ternary {
                cond,
                if_true,
                if_false,
            } => match self.check_condition(*cond)? {
                Some(true) => self.type_check(*if_true)?,
                Some(false) => self.type_check(*if_false)?,
                None => {
                    self.type_check(*if_true)?;
                    self.type_check(*if_false)?;
                }
            },
            Node::Call {
                name,
                template_args,
                args,
            } => self.check_call(at, *name, template_args, args)?,
            _ => {
                for child in self.pool.children(at) {
                    self.type_check(child)?;
                }
            }
        }
        self.type_of(at).map(|_| ())
    }

    fn check_logical(&mut self, op: BinaryOp, lhs: AstIdx, rhs: AstIdx) -> Result<()> {
        self.require_boolean(lhs, op)?;

        if !self.config().strict_short_circuit {
            let decided = match value_try(self.value(lhs))?.and_then(|v| v.as_bool()) {
                Some(b) => (op == BinaryOp::And && !b) || (op == BinaryOp::Or && b),
                None => false,
            };
            if decided {
                trace!(
                    line = self.pool.span(rhs).line,
                    op = op.symbol(),
                    "short-circuit: right operand not checked"
                );
                return Ok(());
            }
        }

        self.require_boolean(rhs, op)
    }

    fn require_boolean(&mut self, operand: AstIdx, op: BinaryOp) -> Result<()> {
        self.type_check(operand)?;
        let ty = self.type_of(operand)?;
        if ty.is_boolean() {
            Ok(())
        } else {
            Err(self.type_error(
                operand,
                format!("operator '{}' needs Boolean operands, found {ty}", op.symbol()),
            ))
        }
    }

    /// Type of an rvalue. Assumes its children have been checked.
    pub fn type_of(&mut self, at: AstIdx) -> Result<Type> {
        match self.node(at) {
            Node::IntLiteral(lit) => self.literal_type(at, lit),
            Node::BoolLiteral(_) => Ok(Type::boolean().make_const()),
            Node::StringLiteral(_) => Ok(Type::string().make_const()),
            Node::Id(name) => self.id_type(at, *name),
            Node::Paren(inner) => self.type_of(*inner),
            Node::Unary { op, operand } => self.unary_type(at, *op, *operand),
            Node::Binary { op, lhs, rhs } => self.binary_type(at, *op, *lhs, *rhs),
            Node::Ternary {
                cond,
                if_true,
                if_false,
            } => self.ternary_type(at, *cond, *if_true, *if_false),
            Node::Concat(items) => {
                let mut width = Width::Known(0);
                for item in items {
                    let ty = self.type_of(*item)?;
                    if !ty.is_bits_like() {
                        return Err(self.type_error(
                            *item,
                            format!("concatenation needs bit vectors, found {ty}"),
                        ));
                    }
                    width = width
                        .try_zip_with(bits_width(&ty), u32::checked_add)
                        .ok_or_else(|| self.width_overflow(at))?;
                }
                Ok(Type::bits_of(width))
            }
            Node::Replicate { count, expr } => self.replicate_type(*count, *expr),
            Node::BitExtract { expr, index } => self.index_type(at, *expr, *index),
            Node::RangeExtract { expr, msb, lsb } => self.range_type(at, *expr, *msb, *lsb),
            Node::FieldAccess { expr, field } => {
                let base = self.type_of(*expr)?;
                let field = self.name(*field);
                match &base.kind {
                    TypeKind::Bitfield(def) => match def.field(field) {
                        Some(range) => Ok(Type::bits(range.width())),
                        None => Err(self.type_error(
                            at,
                            format!("bitfield {} has no field '{field}'", def.name),
                        )),
                    },
                    _ => Err(self.type_error(at, format!("a value of type {base} has no fields"))),
                }
            }
            Node::EnumRef { enum_name, member } => {
                let def = self.enum_named(at, *enum_name)?;
                let member = self.name(*member);
                if def.value_of(member).is_none() {
                    return Err(self.type_error(
                        at,
                        format!("enum {} has no member '{member}'", def.name),
                    ));
                }
                Ok(Type::enum_ref(def).make_const())
            }
            Node::Call {
                name,
                template_args,
                ..
            } => self.call_type(at, *name, template_args),
            Node::Builtin { func, args } => self.builtin_type(at, *func, args),
            Node::Implemented(ext) => {
                let ty = self.type_of(*ext)?;
                match &ty.kind {
                    TypeKind::EnumRef(def) if def.name == "ExtensionName" => Ok(Type::boolean()),
                    _ => Err(self.type_error(
                        *ext,
                        format!("implemented? expects an ExtensionName, found {ty}"),
                    )),
                }
            }
            Node::XReg(index) => {
                let ty = self.type_of(*index)?;
                if !ty.is_bits_like() {
                    return Err(self.type_error(
                        *index,
                        format!("register index must be a bit vector, found {ty}"),
                    ));
                }
                if let Some(Value::Int(i)) = value_try(self.value(*index))? {
                    if !(0..32).contains(&i) {
                        return Err(self.type_error(
                            *index,
                            format!("register index {i} is out of range"),
                        ));
                    }
                }
                Ok(Type::bits_of(self.xlen_width()))
            }
            Node::Csr(selector) => {
                let info = self.csr_info(at, selector)?;
                let width = match info.width(self.symtab().xlen()) {
                    Some(w) => Width::Known(w),
                    None => Width::Unknown,
                };
                Ok(Type::new(TypeKind::Csr { info, width }))
            }
            Node::CsrField { csr, field } => {
                let (info, _) = self.csr_of(*csr)?;
                let field_name = self.name(*field);
                let Some(field) = info.get_field(field_name) else {
                    return Err(self.type_error(
                        at,
                        format!("CSR {} has no field '{field_name}'", info.name),
                    ));
                };
                if !field.implemented {
                    return Err(self.type_error(
                        at,
                        format!(
                            "CSR field {}.{field_name} is not implemented in this configuration",
                            info.name
                        ),
                    ));
                }
                let range = field.location.resolve(self.symtab().xlen());
                Ok(Type::bits(range.width()))
            }
            Node::CsrMethodCall { csr, method, args } => {
                let (_, width) = self.csr_of(*csr)?;
                match method {
                    CsrMethod::Address => Ok(Type::bits(12).make_const()),
                    CsrMethod::SwRead => Ok(Type::bits_of(width)),
                    CsrMethod::SwWrite => {
                        let value = args.first().copied().ok_or_else(|| {
                            InternalError::new("sw_write without an argument")
                        })?;
                        let ty = self.type_of(value)?;
                        if !ty.is_bits_like() {
                            return Err(self.type_error(
                                value,
                                format!("sw_write needs a bit vector, found {ty}"),
                            ));
                        }
                        Ok(Type::void())
                    }
                }
            }
            other => Err(InternalError::new(format!("{} has no type", other.kind_name())).into()),
        }
    }

    pub(crate) fn xlen_width(&self) -> Width {
        match self.symtab().xlen() {
            Some(w) => Width::Known(w),
            None => Width::Unknown,
        }
    }

    fn literal_type(&self, at: AstIdx, lit: &Literal) -> Result<Type> {
        let width = match lit.width {
            LiteralWidth::Explicit(w) | LiteralWidth::Minimal(w) => Width::Known(w),
            LiteralWidth::Xlen => self.xlen_width(),
        };
        if let Width::Known(w) = width {
            if bit_length(lit.magnitude) > w {
                return Err(self.type_error(
                    at,
                    format!("literal value {} does not fit in {w} bits", lit.magnitude),
                ));
            }
        }
        let ty = Type::bits_of(width).make_const();
        Ok(if lit.signed { ty.make_signed() } else { ty })
    }

    fn id_type(&self, at: AstIdx, name: NameIdx) -> Result<Type> {
        let name = self.name(name);
        match self.symtab().get(name) {
            Some(Symbol::Var(var)) => Ok(var.ty().clone()),
            Some(Symbol::Type(ty)) if matches!(ty.kind, TypeKind::Enum(_)) => Ok(ty.clone()),
            Some(Symbol::Type(_)) => Err(self.type_error(
                at,
                format!("'{name}' is a type, not a value"),
            )),
            Some(Symbol::Function(_)) => Err(self.type_error(
                at,
                format!("function '{name}' used without an argument list"),
            )),
            None => Err(self.type_error(at, format!("undefined symbol '{name}'"))),
        }
    }

    fn unary_type(&mut self, at: AstIdx, op: UnaryOp, operand: AstIdx) -> Result<Type> {
        let ty = self.type_of(operand)?;
        let keep = ty.qualifiers & Qualifiers::CONST;
        match op {
            UnaryOp::Not if ty.is_boolean() => Ok(Type::boolean().qualify(keep)),
            UnaryOp::Neg | UnaryOp::BitNot if ty.is_bits_like() => Ok(Type::bits_of(bits_width(&ty))
                .qualify(ty.qualifiers & (Qualifiers::CONST | Qualifiers::SIGNED))),
            _ => Err(self.type_error(
                at,
                format!("operator '{}' cannot be applied to {ty}", op.symbol()),
            )),
        }
    }

    fn binary_type(&mut self, at: AstIdx, op: BinaryOp, lhs: AstIdx, rhs: AstIdx) -> Result<Type> {
        if op.is_logical() {
            return Ok(Type::boolean());
        }

        let lt = self.type_of(lhs)?;
        let rt = self.type_of(rhs)?;
        let konst = const_if(lt.is_const() && rt.is_const());

        if op.is_equality() {
            if !(lt.convertable_to(&rt) || rt.convertable_to(&lt)) {
                return Err(self.type_error(at, format!("cannot compare {lt} with {rt}")));
            }
            return Ok(Type::boolean().qualify(konst));
        }

        if op.is_relational() {
            if !(is_orderable(&lt) && is_orderable(&rt) && lt.comparable_to(&rt)) {
                return Err(self.type_error(
                    at,
                    format!("operator '{}' cannot compare {lt} with {rt}", op.symbol()),
                ));
            }
            return Ok(Type::boolean().qualify(konst));
        }

        if !lt.is_bits_like() || !rt.is_bits_like() {
            return Err(self.type_error(
                at,
                format!(
                    "operator '{}' needs bit-vector operands, found {lt} and {rt}",
                    op.symbol()
                ),
            ));
        }

        let lw = bits_width(&lt);
        let rw = bits_width(&rt);
        let width = match op {
            BinaryOp::Shl | BinaryOp::WideShl => match value_try(self.value(rhs))? {
                Some(Value::Int(amount)) => {
                    let amount = u32::try_from(amount).map_err(|_| {
                        self.type_error(
                            rhs,
                            format!("shift amount {amount} is negative or too large"),
                        )
                    })?;
                    match lw {
                        Width::Known(w) => Width::Known(
                            w.checked_add(amount).ok_or_else(|| self.width_overflow(at))?,
                        ),
                        Width::Unknown => Width::Unknown,
                    }
                }
                Some(other) => {
                    return Err(self.type_error(rhs, format!("invalid shift amount {other}")))
                }
                None if op == BinaryOp::WideShl => {
                    return Err(self.type_error(
                        rhs,
                        "widening shift amount must be known at compile time",
                    ))
                }
                None => lw,
            },
            BinaryOp::Shr | BinaryOp::Sar => lw,
            BinaryOp::WideAdd | BinaryOp::WideSub => lw
                .try_zip_with(rw, |a, b| a.max(b).checked_add(1))
                .ok_or_else(|| self.width_overflow(at))?,
            BinaryOp::WideMul => lw
                .try_zip_with(rw, u32::checked_add)
                .ok_or_else(|| self.width_overflow(at))?,
            _ => lw.zip_with(rw, u32::max),
        };

        let signed = if op.is_shift() {
            lt.is_signed()
        } else {
            lt.is_signed() && rt.is_signed()
        };
        let mut qualifiers = konst;
        if signed {
            qualifiers |= Qualifiers::SIGNED;
        }
        Ok(Type::bits_of(width).qualify(qualifiers))
    }

    fn ternary_type(
        &mut self,
        at: AstIdx,
        cond: AstIdx,
        if_true: AstIdx,
        if_false: AstIdx,
    ) -> Result<Type> {
        match value_try(self.value(cond))?.and_then(|v| v.as_bool()) {
            Some(true) => return self.type_of(if_true),
            Some(false) => return self.type_of(if_false),
            None => {}
        }

        let t = self.type_of(if_true)?;
        let f = self.type_of(if_false)?;
        if t.is_bits_like() && f.is_bits_like() {
            let width = bits_width(&t).zip_with(bits_width(&f), u32::max);
            let ty = Type::bits_of(width);
            return Ok(if t.is_signed() && f.is_signed() {
                ty.make_signed()
            } else {
                ty
            });
        }
        if t.convertable_to(&f) && f.convertable_to(&t) {
            return Ok(t.unqualified());
        }
        Err(self.type_error(
            at,
            format!("branches of '?:' have incompatible types {t} and {f}"),
        ))
    }

    fn width_overflow(&self, at: AstIdx) -> IdlError {
        self.type_error(at, format!("width exceeds {} bits", u32::MAX))
    }

    fn replicate_type(&mut self, count: AstIdx, expr: AstIdx) -> Result<Type> {
        let count_ty = self.type_of(count)?;
        if !count_ty.is_integral() {
            return Err(self.type_error(
                count,
                format!("replication count must be an integer, found {count_ty}"),
            ));
        }
        let n = match value_try(self.value(count))? {
            Some(Value::Int(n)) => match u32::try_from(n) {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(self.type_error(
                        count,
                        format!("replication count must be positive, found {n}"),
                    ));
                }
            },
            Some(other) => {
                return Err(self.type_error(count, format!("invalid replication count {other}")));
            }
            None => {
                return Err(self.type_error(
                    count,
                    "replication count must be known at compile time",
                ));
            }
        };

        let ty = self.type_of(expr)?;
        if !ty.is_bits_like() {
            return Err(self.type_error(
                expr,
                format!("replication needs a bit vector, found {ty}"),
            ));
        }
        let width = match bits_width(&ty) {
            Width::Known(w) => {
                Width::Known(w.checked_mul(n).ok_or_else(|| self.width_overflow(expr))?)
            }
            Width::Unknown => Width::Unknown,
        };
        Ok(Type::bits_of(width))
    }

    fn index_type(&mut self, at: AstIdx, expr: AstIdx, index: AstIdx) -> Result<Type> {
        let base = self.type_of(expr)?;
        let index_ty = self.type_of(index)?;
        if !index_ty.is_integral() {
            return Err(self.type_error(
                index,
                format!("index must be an integer, found {index_ty}"),
            ));
        }
        let known = value_try(self.value(index))?.and_then(|v| v.as_int());

        if let TypeKind::Array { len, elem } = &base.kind {
            if let Some(i) = known {
                if i < 0 || i as u128 >= *len as u128 {
                    return Err(self.type_error(
                        index,
                        format!("index {i} is out of range for an array of {len}"),
                    ));
                }
            }
            return Ok(elem.qualify(base.qualifiers & Qualifiers::CONST));
        }

        if !base.is_bits_like() {
            return Err(self.type_error(at, format!("cannot index a value of type {base}")));
        }
        if let (Some(i), Width::Known(w)) = (known, bits_width(&base)) {
            if i < 0 || i >= i128::from(w) {
                return Err(self.type_error(
                    index,
                    format!("bit {i} is out of range for {base}"),
                ));
            }
        }
        Ok(Type::bits(1))
    }

    fn range_type(&mut self, at: AstIdx, expr: AstIdx, msb: AstIdx, lsb: AstIdx) -> Result<Type> {
        let base = self.type_of(expr)?;
        if !base.is_bits_like() {
            return Err(self.type_error(at, format!("cannot take a bit range of {base}")));
        }
        for bound in [msb, lsb] {
            let ty = self.type_of(bound)?;
            if !ty.is_integral() {
                return Err(self.type_error(
                    bound,
                    format!("range bound must be an integer, found {ty}"),
                ));
            }
        }

        let m = value_try(self.value(msb))?.and_then(|v| v.as_int());
        let l = value_try(self.value(lsb))?.and_then(|v| v.as_int());
        let (Some(m), Some(l)) = (m, l) else {
            return Ok(Type::bits_of(bits_width(&base)));
        };

        if l < 0 || m < l {
            return Err(self.type_error(at, format!("bit range [{m}:{l}] is invalid")));
        }
        if let Width::Known(w) = bits_width(&base) {
            if m >= i128::from(w) {
                return Err(self.type_error(
                    at,
                    format!("bit range [{m}:{l}] exceeds the {w}-bit operand"),
                ));
            }
        }
        let width = u32::try_from(m - l + 1)
            .map_err(|_| self.type_error(at, format!("bit range [{m}:{l}] is too wide")))?;
        Ok(Type::bits(width))
    }

    fn builtin_type(&mut self, at: AstIdx, func: BuiltinFunc, args: &[AstIdx]) -> Result<Type> {
        let arg = *args
            .first()
            .ok_or_else(|| InternalError::new(format!("{} without arguments", func.name())))?;

        match func {
            BuiltinFunc::Bits => {
                let ty = self.type_of(arg)?;
                let konst = ty.qualifiers & Qualifiers::CONST;
                match &ty.kind {
                    TypeKind::EnumRef(def) => Ok(Type::bits(def.width()).qualify(konst)),
                    TypeKind::Bits(_) | TypeKind::Bitfield(_) | TypeKind::Csr { .. } => {
                        Ok(Type::bits_of(bits_width(&ty)).qualify(konst))
                    }
                    _ => Err(self.type_error(arg, format!("$bits cannot convert {ty}"))),
                }
            }
            BuiltinFunc::Signed => {
                let ty = self.type_of(arg)?;
                if !ty.is_bits_like() {
                    return Err(self.type_error(
                        arg,
                        format!("$signed needs a bit vector, found {ty}"),
                    ));
                }
                Ok(Type::bits_of(bits_width(&ty))
                    .qualify(ty.qualifiers & Qualifiers::CONST)
                    .make_signed())
            }
            BuiltinFunc::EnumSize => {
                let def = self.enum_arg(arg)?;
                Ok(Type::bits(bit_length(def.members.len() as u128)).make_const())
            }
            BuiltinFunc::EnumElementSize => {
                let def = self.enum_arg(arg)?;
                Ok(Type::bits(bit_length(u128::from(def.width()))).make_const())
            }
            BuiltinFunc::Enum => {
                let def = self.enum_arg(arg)?;
                let value = *args
                    .get(1)
                    .ok_or_else(|| InternalError::new("$enum without a value"))?;
                let ty = self.type_of(value)?;
                if !ty.is_bits_like() {
                    return Err(self.type_error(
                        value,
                        format!("$enum needs a bit vector, found {ty}"),
                    ));
                }
                if let Some(Value::Int(v)) = value_try(self.value(value))? {
                    let member = u64::try_from(v).ok().and_then(|v| def.member_of(v));
                    if member.is_none() {
                        return Err(self.type_error(
                            at,
                            format!("{v} is not a value of enum {}", def.name),
                        ));
                    }
                }
                Ok(Type::enum_ref(def))
            }
            BuiltinFunc::ArraySize => {
                let ty = self.type_of(arg)?;
                match &ty.kind {
                    TypeKind::Array { len, .. } => {
                        Ok(Type::bits(bit_length(*len as u128)).make_const())
                    }
                    _ => Err(self.type_error(
                        arg,
                        format!("$array_size needs an array, found {ty}"),
                    )),
                }
            }
            BuiltinFunc::EnumToA => {
                let def = self.enum_arg(arg)?;
                Ok(Type::array(Type::bits(def.width()), def.members.len()).make_const())
            }
        }
    }

    fn enum_arg(&mut self, arg: AstIdx) -> Result<Arc<EnumDef>> {
        let ty = self.type_of(arg)?;
        match ty.kind {
            TypeKind::Enum(def) => Ok(def),
            _ => Err(self.type_error(arg, format!("expected an enum type name, found {ty}"))),
        }
    }

    pub(crate) fn enum_named(&self, at: AstIdx, name: NameIdx) -> Result<Arc<EnumDef>> {
        let name = self.name(name);
        match self.symtab().get(name).and_then(Symbol::as_type) {
            Some(Type {
                kind: TypeKind::Enum(def),
                ..
            }) => Ok(Arc::clone(def)),
            Some(_) => Err(self.type_error(at, format!("'{name}' is not an enum"))),
            None => Err(self.type_error(at, format!("undefined enum '{name}'"))),
        }
    }

    /// CSR selected by a `CSR[...]` node, which must exist and be
    /// implemented.
    pub(crate) fn csr_info(&mut self, at: AstIdx, selector: &CsrSelector) -> Result<Arc<CsrInfo>> {
        let info = match selector {
            CsrSelector::Name(name) => {
                let name = self.name(*name);
                self.symtab()
                    .csr(name)
                    .cloned()
                    .ok_or_else(|| self.type_error(at, format!("undefined CSR '{name}'")))?
            }
            CsrSelector::Address(addr) => {
                let ty = self.type_of(*addr)?;
                if !ty.is_bits_like() {
                    return Err(self.type_error(
                        *addr,
                        format!("CSR address must be a bit vector, found {ty}"),
                    ));
                }
                let Some(Value::Int(address)) = value_try(self.value(*addr))? else {
                    return Err(self.type_error(*addr, "CSR address must be known at compile time"));
                };
                u16::try_from(address)
                    .ok()
                    .and_then(|a| self.symtab().csr_at(a).cloned())
                    .ok_or_else(|| self.type_error(at, format!("no CSR at address {address:#x}")))?
            }
        };

        if !info.implemented {
            return Err(self.type_error(
                at,
                format!("CSR '{}' is not implemented in this configuration", info.name),
            ));
        }
        Ok(info)
    }

    pub(crate) fn csr_of(&mut self, csr: AstIdx) -> Result<(Arc<CsrInfo>, Width)> {
        let ty = self.type_of(csr)?;
        match ty.kind {
            TypeKind::Csr { info, width } => Ok((info, width)),
            _ => Err(self.type_error(csr, format!("expected a CSR, found {ty}"))),
        }
    }
}
