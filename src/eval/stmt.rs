use tracing::trace;

use super::coerce;
use super::expr::{expect_bool, expect_int, stored_bits, unknown};
use crate::ast::{AstIdx, Capabilities, ElseIf, NameIdx, Node, StepOp};
use crate::checker::{is_const_name, Context};
use crate::error::{value_try, InternalError, Result};
use crate::symtab::{Symbol, Var};
use crate::types::{Qualifiers, Type, TypeKind};
use crate::value::{from_bits, insert, Value};

impl Context<'_> {
    /// Applies a statement to the current scope. Values that cannot be
    /// computed are recorded as unknown rather than failing.
    pub fn execute(&mut self, at: AstIdx) -> Result<()> {
        match self.node(at) {
            Node::Declaration {
                ty,
                names,
                array_len,
            } => {
                let decl_ty = self.declared_type(*ty, *array_len)?;
                for name in names {
                    let var = Var::new(self.name(*name), decl_ty.clone(), decl_ty.default_value());
                    self.bind(at, var)?;
                }
                Ok(())
            }
            Node::DeclarationInit {
                ty,
                name,
                array_len,
                init,
            } => {
                let mut decl_ty = self.declared_type(*ty, *array_len)?;
                let name = self.name(*name);
                if is_const_name(name) {
                    decl_ty = decl_ty.qualify(Qualifiers::CONST);
                }
                let value = value_try(self.value(*init))?.map(|v| coerce(v, &decl_ty));
                self.bind(at, Var::new(name, decl_ty, value))
            }
            Node::Assign { target, value } => {
                let value = value_try(self.value(*value))?;
                self.assign(*target, value)
            }
            Node::MultiAssign { targets, value } => match value_try(self.value(*value))? {
                Some(Value::Tuple(values)) if values.len() == targets.len() => targets
                    .iter()
                    .zip(values)
                    .try_for_each(|(target, value)| self.assign(*target, Some(value))),
                Some(other) => Err(InternalError::new(format!(
                    "multi-assignment of {other}"
                ))
                .into()),
                None => targets.iter().try_for_each(|target| self.assign(*target, None)),
            },
            Node::Step { target, op } => {
                let current = value_try(self.value(*target))?.map(expect_int).transpose()?;
                let next = current.and_then(|v| match op {
                    StepOp::Increment => v.checked_add(1),
                    StepOp::Decrement => v.checked_sub(1),
                });
                self.assign(*target, next.map(Value::Int))
            }
            // Calls cannot change caller state; their effects on the machine
            // are not tracked.
            Node::CallStatement(_) => Ok(()),
            Node::Conditional { stmt, cond } => match self.known_condition(*cond)? {
                Some(true) => self.execute(*stmt),
                Some(false) => Ok(()),
                None => {
                    self.forget_assigned(std::slice::from_ref(stmt));
                    Ok(())
                }
            },
            Node::If {
                cond,
                then_body,
                else_ifs,
                else_body,
            } => self.execute_if(*cond, then_body, else_ifs, else_body.as_deref()),
            Node::For {
                init,
                cond,
                update,
                body,
            } => self.scoped(|ctx| ctx.execute_for(*init, *cond, *update, body)),
            Node::Fragment(items) => items.iter().try_for_each(|item| self.execute(*item)),
            other => {
                Err(InternalError::new(format!("{} cannot be executed", other.kind_name())).into())
            }
        }
    }

    fn bind(&mut self, at: AstIdx, var: Var) -> Result<()> {
        let name = var.name().to_string();
        self.state
            .symtab
            .add(name, Symbol::Var(var))
            .map_err(|err| self.symtab_error(at, err))
    }

    fn known_condition(&mut self, cond: AstIdx) -> Result<Option<bool>> {
        value_try(self.value(cond))?.map(expect_bool).transpose()
    }

    fn execute_block(&mut self, body: &[AstIdx]) -> Result<()> {
        self.scoped(|ctx| body.iter().try_for_each(|stmt| ctx.execute(*stmt)))
    }

    fn execute_if(
        &mut self,
        cond: AstIdx,
        then_body: &[AstIdx],
        else_ifs: &[ElseIf],
        else_body: Option<&[AstIdx]>,
    ) -> Result<()> {
        let mut arms: Vec<(AstIdx, &[AstIdx])> = vec![(cond, then_body)];
        arms.extend(else_ifs.iter().map(|arm| (arm.cond, arm.body.as_slice())));

        for (i, (cond, body)) in arms.iter().enumerate() {
            match self.known_condition(*cond)? {
                Some(true) => return self.execute_block(body),
                Some(false) => continue,
                None => {
                    // Any remaining arm may run.
                    trace!(
                        line = self.pool.span(*cond).line,
                        "if condition not known, forgetting assigned values"
                    );
                    for (_, body) in &arms[i..] {
                        self.forget_assigned(body);
                    }
                    if let Some(body) = else_body {
                        self.forget_assigned(body);
                    }
                    return Ok(());
                }
            }
        }

        match else_body {
            Some(body) => self.execute_block(body),
            None => Ok(()),
        }
    }

    fn execute_for(
        &mut self,
        init: AstIdx,
        cond: AstIdx,
        update: AstIdx,
        body: &[AstIdx],
    ) -> Result<()> {
        self.execute(init)?;
        let limit = self.config().max_loop_iterations;
        let mut iterations = 0u64;
        loop {
            match self.known_condition(cond)? {
                Some(true) => {}
                Some(false) => return Ok(()),
                None => {
                    self.forget_assigned(body);
                    self.forget_assigned(std::slice::from_ref(&update));
                    return Ok(());
                }
            }
            iterations += 1;
            if iterations > limit {
                return Err(unknown("loop exceeds the compile-time iteration limit"));
            }
            self.execute_block(body)?;
            self.execute(update)?;
        }
    }

    /// Stores `value` into an assignable location. `None` marks the
    /// location, or the whole variable holding it, as unknown.
    fn assign(&mut self, target: AstIdx, value: Option<Value>) -> Result<()> {
        match self.node(target) {
            Node::Id(name) => {
                let name = self.name(*name);
                let Some(var) = self.symtab().get_var(name) else {
                    return Err(InternalError::new(format!("'{name}' is not a variable")).into());
                };
                let ty = var.ty().clone();
                let value = value.map(|v| coerce(v, &ty));
                if !self.symtab_mut().set_value(name, value) {
                    return Err(InternalError::new(format!("'{name}' is not writable")).into());
                }
                Ok(())
            }
            Node::BitExtract { expr, index } => {
                let base_ty = self.type_of(*expr)?;
                let index = value_try(self.value(*index))?.map(expect_int).transpose()?;
                let base = value_try(self.value(*expr))?;
                let updated = match (&base_ty.kind, base, index, value) {
                    (TypeKind::Array { .. }, Some(Value::Array(mut items)), Some(i), Some(v)) => {
                        usize::try_from(i)
                            .ok()
                            .filter(|i| *i < items.len())
                            .map(|i| {
                                items[i] = v;
                                Value::Array(items)
                            })
                    }
                    (TypeKind::Array { .. }, ..) => None,
                    (_, Some(Value::Int(b)), Some(i), Some(Value::Int(v))) => {
                        let bit = u32::try_from(i).ok();
                        match bit {
                            Some(bit) => value_try(self.splice(&base_ty, b, bit, bit, v))?,
                            None => None,
                        }
                    }
                    _ => None,
                };
                self.assign(*expr, updated)
            }
            Node::RangeExtract { expr, msb, lsb } => {
                let base_ty = self.type_of(*expr)?;
                let msb = value_try(self.value(*msb))?.map(expect_int).transpose()?;
                let lsb = value_try(self.value(*lsb))?.map(expect_int).transpose()?;
                let base = value_try(self.value(*expr))?;
                let updated = match (base, msb, lsb, value) {
                    (Some(Value::Int(b)), Some(m), Some(l), Some(Value::Int(v))) => {
                        match (u32::try_from(m), u32::try_from(l)) {
                            (Ok(m), Ok(l)) if m >= l => {
                                value_try(self.splice(&base_ty, b, m, l, v))?
                            }
                            _ => None,
                        }
                    }
                    _ => None,
                };
                self.assign(*expr, updated)
            }
            Node::FieldAccess { expr, field } => {
                let base_ty = self.type_of(*expr)?;
                let TypeKind::Bitfield(def) = &base_ty.kind else {
                    return Err(InternalError::new("field write on a non-bitfield").into());
                };
                let range = def
                    .field(self.name(*field))
                    .ok_or_else(|| InternalError::new("unknown bitfield field"))?;
                let base = value_try(self.value(*expr))?;
                let updated = match (base, value) {
                    (Some(Value::Int(b)), Some(Value::Int(v))) => {
                        value_try(self.splice(&base_ty, b, range.msb, range.lsb, v))?
                    }
                    _ => None,
                };
                self.assign(*expr, updated)
            }
            // Machine state is not modelled.
            Node::XReg(_) | Node::CsrField { .. } => Ok(()),
            other => {
                Err(InternalError::new(format!("cannot assign to a {}", other.kind_name())).into())
            }
        }
    }

    fn splice(&self, ty: &Type, base: i128, msb: u32, lsb: u32, field: i128) -> Result<Value> {
        let bits = stored_bits(base, ty)?;
        let width = ty
            .known_width()
            .ok_or_else(|| unknown("width depends on the configuration"))?;
        if msb >= width {
            return Err(unknown("bit range out of bounds"));
        }
        let bits = insert(bits, msb, lsb, field as u128);
        Ok(Value::Int(from_bits(bits, width, ty.is_signed())))
    }

    /// Marks every variable a statement list may assign as unknown.
    fn forget_assigned(&mut self, body: &[AstIdx]) {
        let mut names = Vec::new();
        for stmt in body {
            self.collect_assigned(*stmt, &mut names);
        }
        for name in names {
            let name = self.name(name);
            self.symtab_mut().set_value(name, None);
        }
    }

    fn collect_assigned(&self, at: AstIdx, names: &mut Vec<NameIdx>) {
        match self.node(at) {
            Node::Assign { target, .. } | Node::Step { target, .. } => {
                names.extend(self.root_name(*target));
            }
            Node::MultiAssign { targets, .. } => {
                names.extend(targets.iter().filter_map(|t| self.root_name(*t)));
            }
            Node::Conditional { stmt, .. } => self.collect_assigned(*stmt, names),
            Node::If {
                then_body,
                else_ifs,
                else_body,
                ..
            } => {
                let bodies = std::iter::once(then_body)
                    .chain(else_ifs.iter().map(|arm| &arm.body))
                    .chain(else_body.iter());
                for body in bodies {
                    for stmt in body {
                        self.collect_assigned(*stmt, names);
                    }
                }
            }
            Node::For { update, body, .. } => {
                self.collect_assigned(*update, names);
                for stmt in body {
                    self.collect_assigned(*stmt, names);
                }
            }
            _ => {}
        }
    }

    fn root_name(&self, target: AstIdx) -> Option<NameIdx> {
        match self.node(target) {
            Node::Id(name) => Some(*name),
            Node::BitExtract { expr, .. }
            | Node::RangeExtract { expr, .. }
            | Node::FieldAccess { expr, .. } => self.root_name(*expr),
            _ => None,
        }
    }

    // ------------------------------------------------------------ returns

    /// Runs a statement inside a function body. `Some` once a `return` is
    /// reached; control flow needs known conditions.
    pub fn return_value(&mut self, at: AstIdx) -> Result<Option<Value>> {
        match self.node(at) {
            Node::Return(values) => self.return_values(values).map(Some),
            Node::ConditionalReturn { values, cond } => {
                if expect_bool(self.value(*cond)?)? {
                    self.return_values(values).map(Some)
                } else {
                    Ok(None)
                }
            }
            Node::If {
                cond,
                then_body,
                else_ifs,
                else_body,
            } => {
                let arms = std::iter::once((*cond, then_body))
                    .chain(else_ifs.iter().map(|arm| (arm.cond, &arm.body)));
                for (cond, body) in arms {
                    if expect_bool(self.value(cond)?)? {
                        return self.return_value_block(body);
                    }
                }
                match else_body {
                    Some(body) => self.return_value_block(body),
                    None => Ok(None),
                }
            }
            Node::For {
                init,
                cond,
                update,
                body,
            } => self.scoped(|ctx| {
                ctx.execute(*init)?;
                let limit = ctx.config().max_loop_iterations;
                let mut iterations = 0u64;
                while expect_bool(ctx.value(*cond)?)? {
                    iterations += 1;
                    if iterations > limit {
                        return Err(unknown("loop exceeds the compile-time iteration limit"));
                    }
                    if let Some(value) = ctx.return_value_block(body)? {
                        return Ok(Some(value));
                    }
                    ctx.execute(*update)?;
                }
                Ok(None)
            }),
            Node::Conditional { stmt, cond } => {
                if expect_bool(self.value(*cond)?)? {
                    self.return_value(*stmt)
                } else {
                    Ok(None)
                }
            }
            node if node.capabilities().contains(Capabilities::EXECUTABLE) => {
                self.execute(at).map(|_| None)
            }
            other => Err(InternalError::new(format!(
                "{} cannot appear in a function body",
                other.kind_name()
            ))
            .into()),
        }
    }

    pub(crate) fn return_value_block(&mut self, body: &[AstIdx]) -> Result<Option<Value>> {
        self.scoped(|ctx| {
            for stmt in body {
                if let Some(value) = ctx.return_value(*stmt)? {
                    return Ok(Some(value));
                }
            }
            Ok(None)
        })
    }

    fn return_values(&mut self, values: &[AstIdx]) -> Result<Value> {
        let mut results = values
            .iter()
            .map(|v| self.value(*v))
            .collect::<Result<Vec<_>>>()?;
        Ok(match results.len() {
            0 => Value::Void,
            1 => results.remove(0),
            _ => Value::Tuple(results),
        })
    }
}
